//! Durable storage for the last-known session.
//!
//! A persisted session is one JSON document holding both the raw token and
//! the `{identity, role}` user record. Keeping them in one document means a
//! save or clear touches a single record, so the two can never disagree at
//! rest.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use keyring::Entry;
use thiserror::Error;
use tracing::{debug, warn};

use super::session::PersistedSession;

/// Application directory name under the platform data directory
const APP_NAME: &str = "cvisionary";

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Keychain service and entry names for the keyring backend
const KEYRING_SERVICE: &str = "cvisionary";
const KEYRING_ENTRY: &str = "session";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Keychain access failed: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Could not find a data directory for session storage")]
    NoDataDir,
}

/// Persistence for the last-known session.
///
/// `load` never fails: missing, unreadable or corrupt data all read as "no
/// session". `clear` is idempotent.
pub trait SessionStore: Send + Sync {
    fn save(&self, session: &PersistedSession) -> Result<(), StorageError>;

    fn load(&self) -> Option<PersistedSession>;

    fn clear(&self) -> Result<(), StorageError>;
}

fn parse_document(contents: &str, source: &str) -> Option<PersistedSession> {
    match serde_json::from_str(contents) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(source, error = %e, "Ignoring corrupt persisted session");
            None
        }
    }
}

// ============================================================================
// File backend
// ============================================================================

/// Stores the session as `session.json` in the per-user data directory.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_dir>/cvisionary/session.json`
    pub fn in_data_dir() -> Result<Self, StorageError> {
        let data_dir = dirs::data_dir().ok_or(StorageError::NoDataDir)?;
        Ok(Self::new(data_dir.join(APP_NAME).join(SESSION_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, session: &PersistedSession) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)?;

        // Write a sibling file and rename it into place so readers see either
        // the previous document or the new one.
        let temp = self.temp_path();
        std::fs::write(&temp, contents)?;
        if let Err(e) = std::fs::rename(&temp, &self.path) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }
        debug!(path = ?self.path, "Session saved");
        Ok(())
    }

    fn load(&self) -> Option<PersistedSession> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => parse_document(&contents, "file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to read session file");
                None
            }
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = ?self.path, "Session file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// OS keychain backend
// ============================================================================

/// Stores the serialized session as a single secret in the OS keychain.
pub struct KeyringSessionStore {
    service: String,
}

impl KeyringSessionStore {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, KEYRING_ENTRY)?)
    }
}

impl Default for KeyringSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for KeyringSessionStore {
    fn save(&self, session: &PersistedSession) -> Result<(), StorageError> {
        let contents = serde_json::to_string(session)?;
        self.entry()?.set_password(&contents)?;
        debug!(service = %self.service, "Session stored in keychain");
        Ok(())
    }

    fn load(&self) -> Option<PersistedSession> {
        let entry = match self.entry() {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Failed to open keychain entry");
                return None;
            }
        };
        match entry.get_password() {
            Ok(contents) => parse_document(&contents, "keyring"),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read session from keychain");
                None
            }
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Process-local store. Holds the serialized document exactly as the durable
/// backends would, and counts mutations.
#[derive(Default)]
pub struct MemorySessionStore {
    document: Mutex<Option<String>>,
    mutations: AtomicUsize,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an arbitrary stored document, valid or not.
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(document.into())),
            mutations: AtomicUsize::new(0),
        }
    }

    /// Number of saves plus clears that removed something
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &PersistedSession) -> Result<(), StorageError> {
        let contents = serde_json::to_string(session)?;
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = Some(contents);
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self) -> Option<PersistedSession> {
        let document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        document
            .as_deref()
            .and_then(|contents| parse_document(contents, "memory"))
    }

    fn clear(&self) -> Result<(), StorageError> {
        let removed = self
            .document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if removed.is_some() {
            self.mutations.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
