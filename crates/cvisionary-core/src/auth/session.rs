use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::token::{self, Claims, DecodeError};

/// Account role. Candidates are students, hiring staff are recruiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Recruiter,
}

impl Role {
    /// Wire form used by the backend and in token claims
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Recruiter => "recruiter",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Recruiter => "Recruiter",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown role '{0}' (expected 'student' or 'recruiter')")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "recruiter" => Ok(Role::Recruiter),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// An authenticated actor.
///
/// Fields are private: the only way to build a `Session` is from a token
/// whose claims supply the identity and role, so the three always agree.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    identity: String,
    role: Role,
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn from_token(token: impl Into<String>) -> Result<Self, DecodeError> {
        let token = token.into().trim().to_string();
        let Claims {
            identity,
            role,
            expires_at,
        } = token::decode(&token)?;
        Ok(Self {
            identity,
            role,
            token,
            expires_at,
        })
    }

    /// Rebuild a session from its persisted projection.
    ///
    /// The stored identity/role are checked against the token's claims; any
    /// disagreement means the record was tampered with or half-written.
    pub fn restore(persisted: &PersistedSession, now: DateTime<Utc>) -> Result<Self, RestoreError> {
        let session = Self::from_token(persisted.token.as_str())?;
        if session.identity != persisted.user.identity || session.role != persisted.user.role {
            return Err(RestoreError::ClaimsMismatch);
        }
        if session.is_expired_at(now) {
            return Err(RestoreError::Expired);
        }
        Ok(session)
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }

    /// Minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        self.expires_at.map(|exp| (exp - now).num_minutes().max(0))
    }

    pub fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            token: self.token.clone(),
            user: SessionUser {
                identity: self.identity.clone(),
                role: self.role,
            },
            saved_at: Utc::now(),
        }
    }
}

// Tokens stay out of logs and debug output.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("role", &self.role)
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RestoreError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Stored identity/role do not match the token claims")]
    ClaimsMismatch,

    #[error("Stored token has expired")]
    Expired,
}

/// The `user` record of a persisted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub identity: String,
    pub role: Role,
}

/// Durable projection of a [`Session`].
///
/// The token and the user record live in one document so they are always
/// written and cleared together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub token: String,
    pub user: SessionUser,
    pub saved_at: DateTime<Utc>,
}

// ============================================================================
// Tests
// ============================================================================
