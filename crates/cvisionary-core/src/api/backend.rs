use std::fmt;

use async_trait::async_trait;

use super::error::{AuthError, RegistrationError};
use crate::auth::{Role, Session};

/// Human-readable confirmation returned by a successful signup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation(pub String);

impl fmt::Display for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The authentication endpoints a [`SessionContext`](crate::auth::SessionContext)
/// talks to.
///
/// Implementations make exactly one round trip per call and never retry.
/// They return data only; persisting or publishing a session is the
/// caller's job.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn authenticate(&self, identity: &str, secret: &str, role: Role) -> Result<Session, AuthError>;

    async fn register(&self, identity: &str, secret: &str, role: Role) -> Result<Confirmation, RegistrationError>;

    /// Set or remove the bearer credential attached to later requests.
    fn set_bearer(&self, token: Option<&str>);
}
