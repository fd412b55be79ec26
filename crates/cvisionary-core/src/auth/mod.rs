//! Session lifecycle.
//!
//! This module provides:
//! - `token`: claim decoding for bearer tokens (no signature verification)
//! - `Session`, `Role`, `PersistedSession`: the session data model
//! - `SessionStore`: durable persistence (file, OS keychain, memory)
//! - `SessionContext`: the state machine tying them together

pub mod context;
pub mod session;
pub mod store;
pub mod token;

pub use context::{LoginError, SessionContext, SessionState, SignupError, SubscriptionId};
pub use session::{ParseRoleError, PersistedSession, RestoreError, Role, Session, SessionUser};
pub use store::{FileSessionStore, KeyringSessionStore, MemorySessionStore, SessionStore, StorageError};
pub use token::{Claims, DecodeError};
