//! SqliteRemoteStore
//! -----------------
//! Per-user document store standing in for the hosted remote tier. Each
//! authenticated user owns one row in `documents`, addressed by
//! [`DocumentPath`]; writes are full overwrites that bump the row's version
//! and are fanned out to subscribers through a [`ChangeFeed`].
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use common::logger::warn_if_slow;
use session::UserKey;

use super::schema;
use super::{ChangeFeed, RemoteEvent, RemoteWatchlistStore, Subscription};
use crate::error::StoreError;
use crate::model::{DocumentPath, WatchlistDocument};

pub struct SqliteRemoteStore {
    pool: SqlitePool,
    app_id: String,
    feed: ChangeFeed,
}

impl SqliteRemoteStore {
    pub async fn from_pool(
        pool: SqlitePool,
        app_id: impl Into<String>,
        feed: ChangeFeed,
    ) -> Result<Self, StoreError> {
        schema::migrate_remote(&pool).await?;
        Ok(Self {
            pool,
            app_id: app_id.into(),
            feed,
        })
    }

    pub async fn connect(url: &str, app_id: &str, feed: ChangeFeed) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;

        Self::from_pool(pool, app_id, feed).await
    }

    pub fn path_for(&self, user: &UserKey) -> DocumentPath {
        DocumentPath::for_user(&self.app_id, user)
    }
}

#[async_trait]
impl RemoteWatchlistStore for SqliteRemoteStore {
    #[instrument(skip(self), target = "store", fields(user = %user))]
    async fn get(&self, user: &UserKey) -> Result<Option<WatchlistDocument>, StoreError> {
        let path = self.path_for(user);

        let row = warn_if_slow("remote_get", Duration::from_millis(200), async {
            sqlx::query("SELECT body, version FROM documents WHERE path = ?")
                .bind(path.as_str())
                .fetch_optional(&self.pool)
                .await
        })
        .await?;

        let Some(row) = row else {
            debug!(%path, "remote document absent");
            return Ok(None);
        };

        let body: String = row.get("body");
        let version: i64 = row.get("version");
        let doc: WatchlistDocument = serde_json::from_str(&body)?;
        Ok(Some(doc.with_version(version as u64)))
    }

    #[instrument(skip(self, doc), target = "store", fields(user = %user, count = doc.entries.len()))]
    async fn put(&self, user: &UserKey, doc: &WatchlistDocument) -> Result<u64, StoreError> {
        let path = self.path_for(user);
        let body = serde_json::to_string(doc)?;

        let version: i64 = warn_if_slow("remote_put", Duration::from_millis(200), async {
            sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO documents (path, body, version, updated_at_ms)
                VALUES (?, ?, 1, ?)
                ON CONFLICT(path) DO UPDATE SET
                    body = excluded.body,
                    version = documents.version + 1,
                    updated_at_ms = excluded.updated_at_ms
                RETURNING version;
            "#,
            )
            .bind(path.as_str())
            .bind(body)
            .bind(chrono::Utc::now().timestamp_millis())
            .fetch_one(&self.pool)
            .await
        })
        .await?;
        let version = version as u64;

        let notified = self
            .feed
            .publish(&path, doc.clone().with_version(version));
        debug!(notified, version, "remote document written");
        Ok(version)
    }

    async fn subscribe(
        &self,
        user: &UserKey,
        sink: mpsc::Sender<RemoteEvent>,
    ) -> Result<Subscription, StoreError> {
        let path = self.path_for(user);
        Ok(self.feed.subscribe(user, &path, sink))
    }
}
