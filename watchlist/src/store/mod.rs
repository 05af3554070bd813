//! Contracts for the two storage tiers and their sqlite implementations.

pub mod feed;
pub mod schema;
pub mod sqlite_local;
pub mod sqlite_remote;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use session::UserKey;

use crate::error::StoreError;
use crate::model::{WatchlistDocument, WatchlistEntry};

pub use feed::ChangeFeed;
pub use sqlite_local::SqliteLocalStore;
pub use sqlite_remote::SqliteRemoteStore;

/// Private cache used while the user is not authenticated.
///
/// A single named slot; an absent slot is an empty watchlist.
#[async_trait]
pub trait LocalWatchlistStore: Send + Sync {
    async fn get(&self) -> Result<Option<Vec<WatchlistEntry>>, StoreError>;

    async fn put(&self, entries: &[WatchlistEntry]) -> Result<(), StoreError>;

    /// Removes the slot entirely.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// One document per authenticated user, with push notification of changes.
#[async_trait]
pub trait RemoteWatchlistStore: Send + Sync {
    async fn get(&self, user: &UserKey) -> Result<Option<WatchlistDocument>, StoreError>;

    /// Full-document overwrite. Returns the version the document now carries;
    /// subscribers of `user` see the new entries tagged with it.
    async fn put(&self, user: &UserKey, doc: &WatchlistDocument) -> Result<u64, StoreError>;

    /// Delivers the full entry sequence into `sink` on every later change of
    /// `user`'s document until the returned handle is dropped.
    async fn subscribe(
        &self,
        user: &UserKey,
        sink: mpsc::Sender<RemoteEvent>,
    ) -> Result<Subscription, StoreError>;
}

/// Message pushed by the remote tier.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    /// Full document after a committed write, including this process's own.
    Snapshot {
        user: UserKey,
        version: u64,
        entries: Vec<WatchlistEntry>,
    },
    /// Channel trouble; the subscription keeps running, data is not lost.
    Error { user: UserKey, message: String },
}

impl RemoteEvent {
    pub fn user(&self) -> &UserKey {
        match self {
            RemoteEvent::Snapshot { user, .. } | RemoteEvent::Error { user, .. } => user,
        }
    }
}

/// Live subscription; aborted on `unsubscribe` or drop.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn unsubscribe(self) {
        // Drop does the work
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
