use thiserror::Error;

use crate::context::Tier;
use session::AuthError;

/// Failure of a single tier operation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Tier is transiently unreachable; never to be read as "no data".
    #[error("tier not ready")]
    NotReady,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt watchlist payload: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// Engine-level failures. All are recoverable; none roll back an in-memory
/// mutation that already happened.
#[derive(Error, Debug)]
pub enum WatchlistError {
    #[error("{0}")]
    Validation(String),

    #[error("{tier} storage unavailable: {source}")]
    StorageUnavailable {
        tier: Tier,
        #[source]
        source: StoreError,
    },

    #[error("authentication failed: {0}")]
    AuthFailure(#[from] AuthError),

    #[error("sync channel error: {0}")]
    TransientSync(String),
}

impl WatchlistError {
    pub fn storage(tier: Tier, source: StoreError) -> Self {
        WatchlistError::StorageUnavailable { tier, source }
    }
}
