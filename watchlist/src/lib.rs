pub mod context;
pub mod engine;
pub mod error;
pub mod merge;
pub mod migration;
pub mod model;
pub mod service;
pub mod store;

pub use context::Tier;
pub use engine::{CommitOutcome, LoadOutcome, ReconciliationEngine, RefreshTicket};
pub use error::{StoreError, WatchlistError};
pub use migration::{MigrationOutcome, MigrationState};
pub use model::{DocumentPath, WatchlistDocument, WatchlistEntry, normalize_symbol};
pub use service::{Status, StatusKind, WatchlistService};
