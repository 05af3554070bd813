use session::UserKey;

/// One-time local → remote migration offer.
///
/// `Idle → Offered → (Migrated | Declined)`. Terminal states make further
/// accept/decline calls no-ops and fall back to `Idle` on the next identity
/// transition.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MigrationState {
    #[default]
    Idle,
    Offered {
        user: UserKey,
    },
    Migrated,
    Declined,
}

impl MigrationState {
    pub fn is_offered(&self) -> bool {
        matches!(self, MigrationState::Offered { .. })
    }
}

/// Result of an accept/decline call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Local entries copied to the remote document; local slot cleared.
    Migrated { entries: usize },
    /// Local slot cleared without copying.
    Declined,
    /// No offer was pending.
    NothingPending,
}
