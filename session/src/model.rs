use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable per-user key handed out by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserKey(String);

impl UserKey {
    pub fn new(v: impl Into<String>) -> Self {
        Self(v.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is using the client right now.
///
/// Signed-out and anonymous users keep their watchlist in the local tier;
/// only authenticated users own a remote document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    SignedOutLocal,
    AnonymousRemote { user: UserKey },
    AuthenticatedRemote { user: UserKey },
}

impl Identity {
    pub fn kind(&self) -> IdentityKind {
        match self {
            Identity::SignedOutLocal => IdentityKind::SignedOutLocal,
            Identity::AnonymousRemote { .. } => IdentityKind::AnonymousRemote,
            Identity::AuthenticatedRemote { .. } => IdentityKind::AuthenticatedRemote,
        }
    }

    pub fn user(&self) -> Option<&UserKey> {
        match self {
            Identity::SignedOutLocal => None,
            Identity::AnonymousRemote { user } | Identity::AuthenticatedRemote { user } => {
                Some(user)
            }
        }
    }

    /// User key of an authenticated identity; `None` for local-tier identities.
    pub fn remote_owner(&self) -> Option<&UserKey> {
        match self {
            Identity::AuthenticatedRemote { user } => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::AuthenticatedRemote { .. })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.user() {
            Some(user) => write!(f, "{}({})", self.kind(), user),
            None => write!(f, "{}", self.kind()),
        }
    }
}

/// Identity without the user key, for logs and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    SignedOutLocal,
    AnonymousRemote,
    AuthenticatedRemote,
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IdentityKind::SignedOutLocal => "signed-out-local",
            IdentityKind::AnonymousRemote => "anonymous-remote",
            IdentityKind::AuthenticatedRemote => "authenticated-remote",
        };
        f.write_str(s)
    }
}
