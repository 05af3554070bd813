use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, instrument, warn};

use crate::auth::{AuthError, AuthProvider};
use crate::model::Identity;

/// One observed identity change. `previous` is `None` for the startup observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityTransition {
    pub previous: Option<Identity>,
    pub current: Identity,
}

/// Owns the single authoritative identity value and publishes every actual
/// transition, in order, on an unbounded channel.
pub struct SessionController {
    auth: Option<Arc<dyn AuthProvider>>,
    current: parking_lot::Mutex<Identity>,
    tx: UnboundedSender<IdentityTransition>,
}

impl SessionController {
    /// Starts signed out and queues the startup observation.
    ///
    /// `auth = None` means no identity provider is configured: the client runs
    /// local-only and every sign-in attempt fails with `NotInitialized`.
    pub fn new(
        auth: Option<Arc<dyn AuthProvider>>,
    ) -> (Self, UnboundedReceiver<IdentityTransition>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let initial = IdentityTransition {
            previous: None,
            current: Identity::SignedOutLocal,
        };
        // receiver is alive, cannot fail
        let _ = tx.send(initial);

        let controller = Self {
            auth,
            current: parking_lot::Mutex::new(Identity::SignedOutLocal),
            tx,
        };
        (controller, rx)
    }

    pub fn current(&self) -> Identity {
        self.current.lock().clone()
    }

    pub fn has_provider(&self) -> bool {
        self.auth.is_some()
    }

    #[instrument(skip(self), target = "session")]
    pub async fn sign_in(&self) -> Result<Identity, AuthError> {
        let auth = self.provider()?;
        let identity = auth.sign_in().await.inspect_err(|e| {
            warn!(error = %e, "sign-in rejected");
        })?;
        self.observe(identity.clone());
        Ok(identity)
    }

    #[instrument(skip(self), target = "session")]
    pub async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        let auth = self.provider()?;
        let identity = auth.sign_in_anonymously().await.inspect_err(|e| {
            warn!(error = %e, "anonymous sign-in rejected");
        })?;
        self.observe(identity.clone());
        Ok(identity)
    }

    #[instrument(skip(self), target = "session")]
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let auth = self.provider()?;
        auth.sign_out().await.inspect_err(|e| {
            warn!(error = %e, "sign-out rejected");
        })?;
        self.observe(Identity::SignedOutLocal);
        Ok(())
    }

    /// Records `identity` and publishes a transition if it differs from the
    /// current one. Returns the published transition.
    pub fn observe(&self, identity: Identity) -> Option<IdentityTransition> {
        let transition = {
            let mut current = self.current.lock();
            if *current == identity {
                return None;
            }
            let previous = std::mem::replace(&mut *current, identity.clone());
            IdentityTransition {
                previous: Some(previous),
                current: identity,
            }
        };

        info!(
            from = ?transition.previous.as_ref().map(|p| p.kind()),
            to = %transition.current.kind(),
            "identity transition"
        );

        if self.tx.send(transition.clone()).is_err() {
            warn!("identity receiver dropped; transition not delivered");
        }
        Some(transition)
    }

    fn provider(&self) -> Result<&Arc<dyn AuthProvider>, AuthError> {
        self.auth.as_ref().ok_or(AuthError::NotInitialized)
    }
}
