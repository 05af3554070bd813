//! Identity-provider contract. The provider itself is an external collaborator;
//! the crate only relies on the three calls below.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::model::{Identity, UserKey};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("authentication not initialized")]
    NotInitialized,

    #[error("rejected by identity provider: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Interactive sign-in; yields an authenticated identity.
    async fn sign_in(&self) -> Result<Identity, AuthError>;

    /// Anonymous session; the watchlist stays in the local tier.
    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Provider that always signs in as one configured user.
pub struct StaticAuthProvider {
    user: UserKey,
}

impl StaticAuthProvider {
    pub fn new(user: UserKey) -> Self {
        Self { user }
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn sign_in(&self) -> Result<Identity, AuthError> {
        if self.user.as_str().trim().is_empty() {
            return Err(AuthError::Rejected("empty user key".into()));
        }
        Ok(Identity::AuthenticatedRemote {
            user: self.user.clone(),
        })
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        Ok(Identity::AnonymousRemote {
            user: UserKey::new(format!("anon-{}", Uuid::new_v4())),
        })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        Ok(())
    }
}
