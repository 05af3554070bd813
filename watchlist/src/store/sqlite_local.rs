//! SqliteLocalStore
//! ----------------
//! Durable local cache for signed-out and anonymous users. The whole
//! watchlist lives in a single named slot of the `kv_slots` table as a JSON
//! array of entries; no row means an empty watchlist.
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

use common::logger::warn_if_slow;

use super::LocalWatchlistStore;
use super::schema;
use crate::error::StoreError;
use crate::model::WatchlistEntry;

pub const DEFAULT_SLOT: &str = "watchlist";

pub struct SqliteLocalStore {
    pool: SqlitePool,
    slot: String,
}

impl SqliteLocalStore {
    /// Wraps an existing pool and ensures the schema exists.
    pub async fn from_pool(pool: SqlitePool, slot: impl Into<String>) -> Result<Self, StoreError> {
        schema::migrate_local(&pool).await?;
        Ok(Self {
            pool,
            slot: slot.into(),
        })
    }

    /// Opens (creating if needed) the database at `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;

        Self::from_pool(pool, DEFAULT_SLOT).await
    }

    pub fn slot(&self) -> &str {
        &self.slot
    }
}

#[async_trait]
impl LocalWatchlistStore for SqliteLocalStore {
    #[instrument(skip(self), target = "store", fields(slot = %self.slot))]
    async fn get(&self) -> Result<Option<Vec<WatchlistEntry>>, StoreError> {
        let row = warn_if_slow("local_get", Duration::from_millis(50), async {
            sqlx::query("SELECT value FROM kv_slots WHERE slot = ?")
                .bind(&self.slot)
                .fetch_optional(&self.pool)
                .await
        })
        .await?;

        let Some(row) = row else {
            debug!("local slot absent");
            return Ok(None);
        };

        let value: String = row.get("value");
        let entries: Vec<WatchlistEntry> = serde_json::from_str(&value)?;
        debug!(count = entries.len(), "local slot loaded");
        Ok(Some(entries))
    }

    #[instrument(skip(self, entries), target = "store", fields(slot = %self.slot, count = entries.len()))]
    async fn put(&self, entries: &[WatchlistEntry]) -> Result<(), StoreError> {
        let value = serde_json::to_string(entries)?;

        warn_if_slow("local_put", Duration::from_millis(50), async {
            sqlx::query(
                r#"
                INSERT INTO kv_slots (slot, value, updated_at_ms)
                VALUES (?, ?, ?)
                ON CONFLICT(slot) DO UPDATE SET
                    value = excluded.value,
                    updated_at_ms = excluded.updated_at_ms;
            "#,
            )
            .bind(&self.slot)
            .bind(value)
            .bind(chrono::Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await
        })
        .await?;

        Ok(())
    }

    #[instrument(skip(self), target = "store", fields(slot = %self.slot))]
    async fn clear(&self) -> Result<(), StoreError> {
        warn_if_slow("local_clear", Duration::from_millis(50), async {
            sqlx::query("DELETE FROM kv_slots WHERE slot = ?")
                .bind(&self.slot)
                .execute(&self.pool)
                .await
        })
        .await?;

        debug!("local slot cleared");
        Ok(())
    }
}
