//! User-facing operations and the event loop that feeds identity transitions
//! and remote pushes into the engine, one message at a time.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{Instrument, Span, info, warn};

use common::logger::{TraceId, root_span};
use session::{IdentityTransition, SessionController};

use crate::context::Tier;
use crate::engine::{CommitOutcome, ReconciliationEngine};
use crate::error::WatchlistError;
use crate::migration::MigrationOutcome;
use crate::model::normalize_symbol;
use crate::store::RemoteEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    Info,
    Error,
}

/// Transient, user-visible outcome of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub kind: StatusKind,
    pub text: String,
}

impl Status {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == StatusKind::Error
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.kind {
            StatusKind::Success => "ok",
            StatusKind::Info => "info",
            StatusKind::Error => "error",
        };
        write!(f, "[{tag}] {}", self.text)
    }
}

pub struct WatchlistService {
    engine: Arc<ReconciliationEngine>,
    session: Arc<SessionController>,
    identity_rx: Mutex<mpsc::UnboundedReceiver<IdentityTransition>>,
    remote_rx: Mutex<mpsc::Receiver<RemoteEvent>>,
}

impl WatchlistService {
    pub fn new(
        engine: Arc<ReconciliationEngine>,
        remote_rx: mpsc::Receiver<RemoteEvent>,
        session: Arc<SessionController>,
        identity_rx: mpsc::UnboundedReceiver<IdentityTransition>,
    ) -> Self {
        Self {
            engine,
            session,
            identity_rx: Mutex::new(identity_rx),
            remote_rx: Mutex::new(remote_rx),
        }
    }

    pub fn engine(&self) -> &Arc<ReconciliationEngine> {
        &self.engine
    }

    pub fn session(&self) -> &Arc<SessionController> {
        &self.session
    }

    // =========================
    // User operations
    // =========================

    pub async fn add_instrument(&self, symbol: &str) -> Status {
        let symbol = normalize_symbol(symbol);
        let span = root_span("add_instrument", &TraceId::default());

        async {
            match self.engine.add_instrument(&symbol).await {
                Ok(entry) => match self.engine.tier().await {
                    Tier::Remote => Status::success(format!("{} added and saved to cloud!", entry.symbol)),
                    Tier::Local => {
                        Status::success(format!("{} added locally. Log in to save.", entry.symbol))
                    }
                },
                Err(WatchlistError::StorageUnavailable { tier, .. }) => {
                    Status::error(format!("Failed to save {symbol} to {}.", tier_label(tier)))
                }
                Err(e) => Status::error(e.to_string()),
            }
        }
        .instrument(span)
        .await
    }

    pub async fn remove_instrument(&self, id: &str) -> Status {
        let span = root_span("remove_instrument", &TraceId::default());

        async {
            let label = self
                .engine
                .entries()
                .await
                .into_iter()
                .find(|e| e.id == id)
                .map(|e| e.symbol)
                .unwrap_or_else(|| id.to_string());

            match self.engine.remove_instrument(id).await {
                Ok(entry) => match self.engine.tier().await {
                    Tier::Remote => Status::success(format!("{} removed from cloud!", entry.symbol)),
                    Tier::Local => Status::success(format!(
                        "{} removed locally. Log in to save.",
                        entry.symbol
                    )),
                },
                Err(WatchlistError::StorageUnavailable { tier, .. }) => Status::error(format!(
                    "Failed to remove {label} from {}.",
                    tier_label(tier)
                )),
                Err(e) => Status::error(e.to_string()),
            }
        }
        .instrument(span)
        .await
    }

    pub async fn refresh_all(&self) -> Status {
        let span = root_span("refresh_all", &TraceId::default());

        async {
            match self.engine.refresh_all().await {
                Ok(CommitOutcome::Applied { entries, .. }) => {
                    Status::success(format!("Refreshed {entries} quotes."))
                }
                Ok(CommitOutcome::Discarded) => {
                    Status::info("Refresh superseded by newer data.")
                }
                Err(WatchlistError::StorageUnavailable { tier, .. }) => Status::error(format!(
                    "Quotes refreshed but could not be saved to {}.",
                    tier_label(tier)
                )),
                Err(e) => Status::error(format!("Failed to refresh quotes: {e}")),
            }
        }
        .instrument(span)
        .await
    }

    /// Publishes the new identity; the engine reloads when the event loop
    /// picks the transition up.
    pub async fn sign_in(&self) -> Status {
        match self.session.sign_in().await {
            Ok(_) => Status::success("Signed in!"),
            Err(e) => Status::error(format!("Sign-in failed: {e}")),
        }
    }

    pub async fn sign_in_anonymously(&self) -> Status {
        match self.session.sign_in_anonymously().await {
            Ok(_) => Status::success("Signed in anonymously."),
            Err(e) => Status::error(format!("Anonymous sign-in failed: {e}")),
        }
    }

    pub async fn sign_out(&self) -> Status {
        match self.session.sign_out().await {
            Ok(()) => Status::success("Signed out successfully!"),
            Err(e) => Status::error(format!("Sign out failed: {e}")),
        }
    }

    pub async fn accept_migration(&self) -> Status {
        let span = root_span("accept_migration", &TraceId::default());

        async {
            match self.engine.accept_migration().await {
                Ok(MigrationOutcome::Migrated { .. }) => {
                    Status::success("Local data migrated to your account!")
                }
                Ok(_) => Status::info("No local data waiting to be migrated."),
                Err(e) => {
                    warn!(error = %e, "migration failed");
                    Status::error("Failed to migrate local data to cloud.")
                }
            }
        }
        .instrument(span)
        .await
    }

    pub async fn decline_migration(&self) -> Status {
        let span = root_span("decline_migration", &TraceId::default());

        async {
            match self.engine.decline_migration().await {
                Ok(MigrationOutcome::Declined) => {
                    Status::success("Local data discarded. Starting fresh in the cloud.")
                }
                Ok(_) => Status::info("No local data waiting to be migrated."),
                Err(e) => Status::error(format!("Failed to discard local data: {e}")),
            }
        }
        .instrument(span)
        .await
    }

    // =========================
    // Event processing
    // =========================

    /// Processes every queued event, identity transitions first.
    pub async fn drain_events(&self) -> Vec<Status> {
        let mut out = Vec::new();

        loop {
            let transition = self.identity_rx.lock().await.try_recv().ok();
            if let Some(t) = transition {
                out.extend(self.handle_identity(t).await);
                continue;
            }

            let event = self.remote_rx.lock().await.try_recv().ok();
            if let Some(ev) = event {
                out.extend(self.handle_remote(ev).await);
                continue;
            }

            break;
        }

        out
    }

    /// Long-running loop; statuses produced by events go to `status_tx`.
    ///
    /// Holds both receivers for its lifetime, so `drain_events` must not be
    /// used while it runs.
    pub async fn run(self: Arc<Self>, status_tx: mpsc::Sender<Status>) {
        let mut identity_rx = self.identity_rx.lock().await;
        let mut remote_rx = self.remote_rx.lock().await;
        info!("watchlist event loop started");

        loop {
            let status = tokio::select! {
                biased;
                Some(t) = identity_rx.recv() => self.handle_identity(t).await,
                Some(ev) = remote_rx.recv() => self.handle_remote(ev).await,
                else => break,
            };

            if let Some(s) = status {
                if status_tx.send(s).await.is_err() {
                    break;
                }
            }
        }

        info!("watchlist event loop stopped");
    }

    async fn handle_identity(&self, transition: IdentityTransition) -> Option<Status> {
        let trace_id = TraceId::default();
        let span = root_span("identity_transition", &trace_id);
        if let Some(user) = transition.current.user() {
            span.record("user", tracing::field::display(user));
        }

        async {
            let result = self.engine.on_identity(transition.current).await;
            if let Ok(outcome) = &result {
                Span::current().record("generation", outcome.generation);
            }

            match result {
                Ok(outcome) if outcome.migration_offered => Some(Status::info(
                    "Local watchlist found. Accept to migrate it to your account, or decline to start fresh.",
                )),
                Ok(_) => None,
                Err(WatchlistError::StorageUnavailable {
                    tier: Tier::Remote, ..
                }) => Some(Status::error(
                    "Cloud storage is not ready; your watchlist will load once it is.",
                )),
                Err(e) => Some(Status::error(format!("Failed to load watchlist: {e}"))),
            }
        }
        .instrument(span)
        .await
    }

    async fn handle_remote(&self, event: RemoteEvent) -> Option<Status> {
        match self.engine.apply_remote(event).await {
            Ok(_) => None,
            Err(WatchlistError::TransientSync(_)) => {
                Some(Status::error("Error syncing data from cloud."))
            }
            Err(e) => Some(Status::error(e.to_string())),
        }
    }
}

fn tier_label(tier: Tier) -> &'static str {
    match tier {
        Tier::Local => "local storage",
        Tier::Remote => "cloud",
    }
}
