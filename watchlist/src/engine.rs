//! Reconciliation engine.
//!
//! Responsibilities:
//! - Decide which tier is authoritative for the current identity and load from it.
//! - Merge freshly generated quotes into the tracked entries (by symbol).
//! - Write every accepted mutation through to the authoritative tier.
//! - Drive the one-time local → remote migration offer.
//! - Apply remote push notifications as the new authoritative value, skipping
//!   any whose document version is already reflected (own-write echoes).
//!
//! All state sits in one [`SyncContext`] behind a single async mutex. Refreshes
//! can be split into `prepare_refresh` / `commit_refresh`; the ticket carries
//! the context's generation and revision, and a ticket that has been overtaken
//! by an identity transition or any newer change is discarded on commit.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{Instrument, debug, field, info, instrument, warn};

use common::logger::child_span;
use market::{Catalog, MarketSnapshot, Quote, QuoteGenerator, RandomSource, analyze};
use session::{Identity, UserKey};

use crate::context::{SyncContext, Tier};
use crate::error::{StoreError, WatchlistError};
use crate::merge::{RefreshMode, merge_quotes};
use crate::migration::{MigrationOutcome, MigrationState};
use crate::model::{WatchlistDocument, WatchlistEntry, normalize_symbol};
use crate::store::{LocalWatchlistStore, RemoteEvent, RemoteWatchlistStore};

const MIGRATION_PENDING: &str =
    "Accept or decline the pending migration of your local watchlist first.";

/// Result of processing an identity observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub identity: Identity,
    pub generation: u64,
    pub entries: usize,
    pub migration_offered: bool,
    /// False when the identity was already current (idempotent no-op).
    pub changed: bool,
}

/// A refresh computed against a specific context state.
#[derive(Debug, Clone)]
pub struct RefreshTicket {
    generation: u64,
    revision: u64,
    entries: Vec<WatchlistEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied { entries: usize, persisted: bool },
    /// The ticket was stale; nothing changed.
    Discarded,
}

pub struct ReconciliationEngine {
    catalog: Arc<Catalog>,
    generator: parking_lot::Mutex<QuoteGenerator<Box<dyn RandomSource>>>,
    local: Arc<dyn LocalWatchlistStore>,
    remote: Option<Arc<dyn RemoteWatchlistStore>>,
    remote_tx: mpsc::Sender<RemoteEvent>,
    ctx: Mutex<SyncContext>,
}

impl ReconciliationEngine {
    /// Builds the engine and returns the receiving end of remote push events,
    /// which the caller feeds back through [`Self::apply_remote`].
    ///
    /// `remote = None` runs local-only; authenticated identities then stay in
    /// the remote-pending state.
    pub fn new(
        catalog: Arc<Catalog>,
        rng: Box<dyn RandomSource>,
        local: Arc<dyn LocalWatchlistStore>,
        remote: Option<Arc<dyn RemoteWatchlistStore>>,
        event_capacity: usize,
    ) -> (Self, mpsc::Receiver<RemoteEvent>) {
        let (remote_tx, remote_rx) = mpsc::channel(event_capacity.max(1));

        let engine = Self {
            catalog,
            generator: parking_lot::Mutex::new(QuoteGenerator::new(rng)),
            local,
            remote,
            remote_tx,
            ctx: Mutex::new(SyncContext::new()),
        };
        (engine, remote_rx)
    }

    // =========================
    // Identity transitions
    // =========================

    /// Loads the watchlist for `identity` from its authoritative tier.
    ///
    /// Repeating the current identity is a no-op. Authenticated identities are
    /// subscribed to their remote document even when the initial read failed,
    /// so a later push can still deliver the truth.
    #[instrument(skip(self, identity), target = "engine", fields(identity = %identity))]
    pub async fn on_identity(&self, identity: Identity) -> Result<LoadOutcome, WatchlistError> {
        let mut ctx = self.ctx.lock().await;

        if ctx.identity.as_ref() == Some(&identity) {
            debug!("identity already current; nothing to do");
            return Ok(LoadOutcome {
                identity,
                generation: ctx.generation,
                entries: ctx.entries.len(),
                migration_offered: ctx.migration.is_offered(),
                changed: false,
            });
        }

        ctx.enter(identity.clone());
        info!(
            generation = ctx.generation,
            tier = %ctx.tier(),
            "entering identity"
        );

        let loaded = self.load_into(&mut ctx, &identity).await;

        if let Some(user) = identity.remote_owner() {
            self.subscribe_if_needed(&mut ctx, user).await;
        }

        loaded?;

        Ok(LoadOutcome {
            identity,
            generation: ctx.generation,
            entries: ctx.entries.len(),
            migration_offered: ctx.migration.is_offered(),
            changed: true,
        })
    }

    async fn load_into(
        &self,
        ctx: &mut SyncContext,
        identity: &Identity,
    ) -> Result<(), WatchlistError> {
        let Some(user) = identity.remote_owner() else {
            return match self.local.get().await {
                Ok(stored) => {
                    let stored = stored.unwrap_or_default();
                    debug!(count = stored.len(), "loaded local watchlist");
                    ctx.replace_entries(self.populate(&stored));
                    Ok(())
                }
                Err(e) => {
                    warn!(error = %e, "local tier unreadable; starting from catalog");
                    ctx.replace_entries(self.populate(&[]));
                    Err(WatchlistError::storage(Tier::Local, e))
                }
            };
        };

        let remote = match self.remote_tier() {
            Ok(r) => r,
            Err(e) => {
                ctx.remote_pending = true;
                return Err(e);
            }
        };

        match remote.get(user).await {
            Ok(Some(doc)) => {
                ctx.remote_pending = false;
                ctx.observe_remote_version(doc.version);
                debug!(
                    count = doc.entries.len(),
                    version = doc.version,
                    "remote document is authoritative"
                );
                ctx.replace_entries(self.populate(&doc.entries));
                Ok(())
            }
            Ok(None) => {
                ctx.remote_pending = false;
                match self.local.get().await {
                    Ok(Some(local)) if !local.is_empty() => {
                        info!(count = local.len(), "no remote document; offering migration");
                        ctx.migration = MigrationState::Offered { user: user.clone() };
                        ctx.replace_entries(self.populate(&local));
                        Ok(())
                    }
                    Ok(_) => {
                        ctx.replace_entries(self.populate(&[]));
                        Ok(())
                    }
                    Err(e) => {
                        warn!(error = %e, "local tier unreadable; migration not offered");
                        ctx.replace_entries(self.populate(&[]));
                        Err(WatchlistError::storage(Tier::Local, e))
                    }
                }
            }
            Err(e) => {
                // transient: never read as "absent", never migrate on it
                warn!(error = %e, "remote tier not ready; load deferred");
                ctx.remote_pending = true;
                ctx.replace_entries(Vec::new());
                Err(WatchlistError::storage(Tier::Remote, e))
            }
        }
    }

    async fn subscribe_if_needed(&self, ctx: &mut SyncContext, user: &UserKey) {
        if ctx.subscription.is_some() {
            return;
        }
        let Ok(remote) = self.remote_tier() else {
            return;
        };

        match remote.subscribe(user, self.remote_tx.clone()).await {
            Ok(sub) => {
                debug!(user = %user, "subscribed to remote document");
                ctx.subscription = Some(sub);
            }
            Err(e) => warn!(user = %user, error = %e, "remote subscription failed"),
        }
    }

    /// Retries a deferred remote load before a user operation touches state.
    async fn ensure_loaded(&self, ctx: &mut SyncContext) -> Result<(), WatchlistError> {
        if !ctx.remote_pending {
            return Ok(());
        }
        let Some(identity) = ctx.identity.clone() else {
            return Ok(());
        };

        info!("retrying deferred remote load");
        self.load_into(ctx, &identity).await?;
        if let Some(user) = identity.remote_owner() {
            self.subscribe_if_needed(ctx, user).await;
        }
        Ok(())
    }

    // =========================
    // Quote refresh
    // =========================

    /// Computes a steady-state refresh of the current entries.
    pub async fn prepare_refresh(&self) -> Result<RefreshTicket, WatchlistError> {
        let mut ctx = self.ctx.lock().await;
        self.ensure_loaded(&mut ctx).await?;

        let fresh = self.catalog_quotes();
        Ok(RefreshTicket {
            generation: ctx.generation,
            revision: ctx.revision,
            entries: merge_quotes(&ctx.entries, &fresh, RefreshMode::Steady),
        })
    }

    /// Applies a prepared refresh unless it has been overtaken.
    ///
    /// While a migration offer is pending the refreshed quotes stay in memory;
    /// otherwise they are written through to the authoritative tier.
    #[instrument(skip(self, ticket), target = "engine", fields(generation = ticket.generation))]
    pub async fn commit_refresh(
        &self,
        ticket: RefreshTicket,
    ) -> Result<CommitOutcome, WatchlistError> {
        let mut ctx = self.ctx.lock().await;

        if ticket.generation != ctx.generation || ticket.revision != ctx.revision {
            info!(
                ticket_revision = ticket.revision,
                current_revision = ctx.revision,
                "discarding stale refresh"
            );
            return Ok(CommitOutcome::Discarded);
        }

        let count = ticket.entries.len();
        ctx.replace_entries(ticket.entries);

        if ctx.migration.is_offered() {
            debug!("migration pending; refresh kept in memory");
            return Ok(CommitOutcome::Applied {
                entries: count,
                persisted: false,
            });
        }

        self.write_through(&mut ctx).await?;
        Ok(CommitOutcome::Applied {
            entries: count,
            persisted: true,
        })
    }

    pub async fn refresh_all(&self) -> Result<CommitOutcome, WatchlistError> {
        let ticket = self.prepare_refresh().await?;
        self.commit_refresh(ticket).await
    }

    // =========================
    // User mutations
    // =========================

    /// Tracks `symbol` (trimmed, upper-cased). Catalog symbols get a generated
    /// quote, anything else a generic one.
    ///
    /// On a write-through failure the entry stays tracked in memory and
    /// `StorageUnavailable` is returned.
    #[instrument(skip(self), target = "engine")]
    pub async fn add_instrument(&self, symbol: &str) -> Result<WatchlistEntry, WatchlistError> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(WatchlistError::Validation(
                "Please enter an instrument symbol.".into(),
            ));
        }

        let mut ctx = self.ctx.lock().await;
        self.ensure_loaded(&mut ctx).await?;

        if ctx.migration.is_offered() {
            return Err(WatchlistError::Validation(MIGRATION_PENDING.into()));
        }
        if ctx.contains_symbol(&symbol) {
            return Err(WatchlistError::Validation(format!(
                "{symbol} is already in your list."
            )));
        }

        let entry = {
            let mut generator = self.generator.lock();
            match self.catalog.find(&symbol) {
                Some(def) => generator.generate(def),
                None => generator.generate_generic(&symbol),
            }
        };

        let mut entries = ctx.entries.clone();
        entries.push(entry.clone());
        ctx.replace_entries(entries);
        info!(symbol = %entry.symbol, id = %entry.id, "instrument added");

        self.write_through(&mut ctx).await?;
        Ok(entry)
    }

    /// Stops tracking every entry carrying `id`; returns the first one removed.
    #[instrument(skip(self), target = "engine")]
    pub async fn remove_instrument(&self, id: &str) -> Result<WatchlistEntry, WatchlistError> {
        let mut ctx = self.ctx.lock().await;
        self.ensure_loaded(&mut ctx).await?;

        if ctx.migration.is_offered() {
            return Err(WatchlistError::Validation(MIGRATION_PENDING.into()));
        }

        let Some(removed) = ctx.entries.iter().find(|e| e.id == id).cloned() else {
            return Err(WatchlistError::Validation(format!(
                "No instrument with id {id} in your list."
            )));
        };

        let remaining: Vec<WatchlistEntry> =
            ctx.entries.iter().filter(|e| e.id != id).cloned().collect();
        ctx.replace_entries(remaining);
        info!(symbol = %removed.symbol, "instrument removed");

        self.write_through(&mut ctx).await?;
        Ok(removed)
    }

    // =========================
    // Migration
    // =========================

    /// Copies the local slot verbatim into the user's remote document, then
    /// clears the local slot. A failed remote write keeps the offer open.
    #[instrument(skip(self), target = "engine")]
    pub async fn accept_migration(&self) -> Result<MigrationOutcome, WatchlistError> {
        let mut ctx = self.ctx.lock().await;

        let MigrationState::Offered { user } = ctx.migration.clone() else {
            debug!(state = ?ctx.migration, "no migration pending");
            return Ok(MigrationOutcome::NothingPending);
        };

        let remote = self.remote_tier()?;
        let local_entries = self
            .local
            .get()
            .await
            .map_err(|e| WatchlistError::storage(Tier::Local, e))?
            .unwrap_or_default();

        let version = remote
            .put(&user, &WatchlistDocument::new(local_entries.clone()))
            .await
            .map_err(|e| {
                warn!(error = %e, "migration write failed; offer kept");
                WatchlistError::storage(Tier::Remote, e)
            })?;

        let count = local_entries.len();
        ctx.observe_remote_version(version);
        ctx.migration = MigrationState::Migrated;
        ctx.replace_entries(local_entries);
        info!(count, "local watchlist migrated");

        self.local
            .clear()
            .await
            .map_err(|e| WatchlistError::storage(Tier::Local, e))?;

        Ok(MigrationOutcome::Migrated { entries: count })
    }

    /// Discards the local slot without copying it; the remote document is left
    /// untouched.
    #[instrument(skip(self), target = "engine")]
    pub async fn decline_migration(&self) -> Result<MigrationOutcome, WatchlistError> {
        let mut ctx = self.ctx.lock().await;

        if !ctx.migration.is_offered() {
            debug!(state = ?ctx.migration, "no migration pending");
            return Ok(MigrationOutcome::NothingPending);
        }

        self.local
            .clear()
            .await
            .map_err(|e| WatchlistError::storage(Tier::Local, e))?;

        ctx.migration = MigrationState::Declined;
        ctx.replace_entries(Vec::new());
        info!("migration declined; local watchlist discarded");

        Ok(MigrationOutcome::Declined)
    }

    // =========================
    // Remote push
    // =========================

    /// Applies a push notification. Returns `Ok(false)` when the event belongs
    /// to a user that is no longer current, or carries a document version the
    /// context already reflects. The latter covers the echo of every write this
    /// engine made itself, so an older echo can never roll back a newer change.
    #[instrument(skip(self, event), target = "engine", fields(user = %event.user()))]
    pub async fn apply_remote(&self, event: RemoteEvent) -> Result<bool, WatchlistError> {
        let mut ctx = self.ctx.lock().await;

        let owner = ctx
            .identity
            .as_ref()
            .and_then(Identity::remote_owner)
            .cloned();
        if owner.as_ref() != Some(event.user()) {
            debug!("remote event for inactive user ignored");
            return Ok(false);
        }

        match event {
            RemoteEvent::Snapshot {
                version, entries, ..
            } => {
                if !ctx.observe_remote_version(version) {
                    debug!(
                        version,
                        seen = ctx.remote_version,
                        "remote snapshot already reflected; ignored"
                    );
                    return Ok(false);
                }
                debug!(version, count = entries.len(), "remote snapshot applied");
                ctx.remote_pending = false;
                ctx.replace_entries(entries);
                Ok(true)
            }
            RemoteEvent::Error { message, .. } => {
                warn!(%message, "remote sync channel error");
                Err(WatchlistError::TransientSync(message))
            }
        }
    }

    // =========================
    // Queries
    // =========================

    pub async fn entries(&self) -> Vec<WatchlistEntry> {
        self.ctx.lock().await.entries.clone()
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.ctx.lock().await.identity.clone()
    }

    pub async fn migration_state(&self) -> MigrationState {
        self.ctx.lock().await.migration.clone()
    }

    pub async fn tier(&self) -> Tier {
        self.ctx.lock().await.tier()
    }

    pub async fn is_remote_pending(&self) -> bool {
        self.ctx.lock().await.remote_pending
    }

    /// Top gainer / loser of the current entries.
    pub async fn snapshot(&self) -> MarketSnapshot {
        analyze(&self.ctx.lock().await.entries)
    }

    // =========================
    // Internals
    // =========================

    fn catalog_quotes(&self) -> Vec<Quote> {
        let mut generator = self.generator.lock();
        self.catalog.iter().map(|d| generator.generate(d)).collect()
    }

    /// Initial population: refresh tracked entries and offer untracked catalog
    /// instruments as candidates.
    fn populate(&self, entries: &[WatchlistEntry]) -> Vec<WatchlistEntry> {
        let fresh = self.catalog_quotes();
        merge_quotes(entries, &fresh, RefreshMode::InitialPopulation)
    }

    fn remote_tier(&self) -> Result<&Arc<dyn RemoteWatchlistStore>, WatchlistError> {
        self.remote.as_ref().ok_or_else(|| {
            WatchlistError::storage(
                Tier::Remote,
                StoreError::Unavailable("no remote tier configured".into()),
            )
        })
    }

    /// Persists the current entries to the authoritative tier. A remote write
    /// records the version it produced, so its own echo is recognised later.
    async fn write_through(&self, ctx: &mut SyncContext) -> Result<(), WatchlistError> {
        let owner = ctx.identity.as_ref().and_then(Identity::remote_owner).cloned();
        let entries = ctx.entries.clone();
        let span = child_span("write_through");
        span.record("tier", field::display(ctx.tier()));

        let result = async {
            match &owner {
                Some(user) => match self.remote_tier() {
                    Ok(remote) => remote
                        .put(user, &WatchlistDocument::new(entries))
                        .await
                        .map(Some)
                        .map_err(|e| WatchlistError::storage(Tier::Remote, e)),
                    Err(e) => Err(e),
                },
                None => self
                    .local
                    .put(&entries)
                    .await
                    .map(|()| None)
                    .map_err(|e| WatchlistError::storage(Tier::Local, e)),
            }
        }
        .instrument(span)
        .await;

        match result {
            Ok(Some(version)) => {
                ctx.observe_remote_version(version);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => {
                warn!(error = %e, "write-through failed; keeping in-memory watchlist");
                Err(e)
            }
        }
    }
}
