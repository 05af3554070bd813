use std::fmt;

use session::Identity;

use crate::migration::MigrationState;
use crate::model::WatchlistEntry;
use crate::store::Subscription;

/// One of the two storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Local,
    Remote,
}

impl Tier {
    /// Tier that owns the watchlist for `identity`.
    pub fn authoritative_for(identity: &Identity) -> Self {
        if identity.is_authenticated() {
            Tier::Remote
        } else {
            Tier::Local
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::Local => "local",
            Tier::Remote => "remote",
        })
    }
}

/// Everything the engine mutates, guarded by one lock.
///
/// `generation` moves on every identity transition; `revision` moves on every
/// accepted change to `entries` (user mutation, committed refresh, remote push).
/// Async work is tagged with both and dropped when either has moved on.
///
/// `remote_version` is the newest remote document version already reflected
/// in `entries`, whether loaded, written by this engine or pushed. Pushes at
/// or below it are echoes or reordered deliveries and carry nothing new.
pub struct SyncContext {
    /// `None` until the first identity has been observed.
    pub identity: Option<Identity>,
    pub generation: u64,
    pub revision: u64,
    pub remote_version: u64,
    pub entries: Vec<WatchlistEntry>,
    pub migration: MigrationState,
    /// Remote read failed for the current identity; retry before mutating.
    pub remote_pending: bool,
    pub subscription: Option<Subscription>,
}

impl SyncContext {
    pub fn new() -> Self {
        Self {
            identity: None,
            generation: 0,
            revision: 0,
            remote_version: 0,
            entries: Vec::new(),
            migration: MigrationState::Idle,
            remote_pending: false,
            subscription: None,
        }
    }

    pub fn tier(&self) -> Tier {
        self.identity
            .as_ref()
            .map(Tier::authoritative_for)
            .unwrap_or(Tier::Local)
    }

    /// Starts a new identity epoch: drops the old subscription and any pending
    /// migration offer.
    pub fn enter(&mut self, identity: Identity) {
        self.identity = Some(identity);
        self.generation += 1;
        self.revision += 1;
        self.remote_version = 0;
        self.entries.clear();
        self.migration = MigrationState::Idle;
        self.remote_pending = false;
        if let Some(sub) = self.subscription.take() {
            sub.unsubscribe();
        }
    }

    pub fn replace_entries(&mut self, entries: Vec<WatchlistEntry>) {
        self.entries = entries;
        self.revision += 1;
    }

    /// Records a remote version this context now reflects. Returns false when
    /// it is not newer than what was already seen.
    pub fn observe_remote_version(&mut self, version: u64) -> bool {
        if version <= self.remote_version {
            return false;
        }
        self.remote_version = version;
        true
    }

    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.entries.iter().any(|e| e.symbol.eq_ignore_ascii_case(symbol))
    }
}

impl Default for SyncContext {
    fn default() -> Self {
        Self::new()
    }
}
