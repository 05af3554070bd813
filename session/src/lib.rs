pub mod auth;
pub mod controller;
pub mod model;

pub use auth::{AuthError, AuthProvider, StaticAuthProvider};
pub use controller::{IdentityTransition, SessionController};
pub use model::{Identity, IdentityKind, UserKey};
