use std::fmt;

use serde::{Deserialize, Serialize};

use market::Quote;
use session::UserKey;

/// A quote the user is tracking. `symbol` is the natural key within one
/// watchlist; `id` rides along through merges.
pub type WatchlistEntry = Quote;

/// Body of the remote per-user document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchlistDocument {
    #[serde(default)]
    pub entries: Vec<WatchlistEntry>,
    /// Assigned by the remote tier on every committed write, starting at 1.
    /// Kept beside the stored body, never inside it.
    #[serde(skip)]
    pub version: u64,
}

impl WatchlistDocument {
    pub fn new(entries: Vec<WatchlistEntry>) -> Self {
        Self {
            entries,
            version: 0,
        }
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }
}

/// Canonical form of a user-typed symbol: trimmed, upper-cased.
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Stable address of one user's remote document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath(String);

impl DocumentPath {
    pub fn for_user(app_id: &str, user: &UserKey) -> Self {
        Self(format!("artifacts/{app_id}/users/{user}/watchlist/entries"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
