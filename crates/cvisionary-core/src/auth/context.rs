//! In-memory session state machine.
//!
//! `SessionContext` is the single source of truth for who is logged in and
//! as what. It is built with an [`AuthBackend`] and a [`SessionStore`]
//! injected, and notifies subscribers synchronously on every state change.
//!
//! Ordering: the store is written (or cleared) before the new state is
//! published, so a subscriber that sees `Authenticated` can rely on the
//! persisted copy matching it.
//!
//! Publishes are serialized and always carry the latest state. A thread
//! that changes the state while another publish is running leaves the
//! delivery to that publisher, which re-reads the state before finishing.
//!
//! Only the newest login attempt is authoritative. Each attempt takes a
//! ticket from a generation counter; `logout` advances the counter too. A
//! response that comes back holding a stale ticket is discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::session::{Role, Session};
use super::store::SessionStore;
use crate::api::{AuthBackend, AuthError, Confirmation, RegistrationError};

/// Current authentication state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(Session),
}

impl SessionState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Anonymous => None,
            SessionState::Authenticated(session) => Some(session),
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.session().map(Session::role)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Login attempt was superseded by a newer one")]
    Superseded,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignupError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("Signup attempt was superseded by a newer one")]
    Superseded,
}

/// Handle returned by [`SessionContext::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&SessionState) + Send + Sync>;

pub struct SessionContext {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn SessionStore>,
    state: Mutex<SessionState>,
    /// Bumped under the state lock on every state change
    state_version: AtomicU64,
    /// True while some thread is delivering a publish
    publishing: Mutex<bool>,
    login_generation: AtomicU64,
    signup_generation: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_listener: AtomicU64,
    watch_tx: watch::Sender<SessionState>,
}

impl SessionContext {
    /// Create a context in the `Anonymous` state. Call [`boot`](Self::boot)
    /// to hydrate from the store.
    pub fn new(backend: Arc<dyn AuthBackend>, store: Arc<dyn SessionStore>) -> Self {
        let (watch_tx, _) = watch::channel(SessionState::Anonymous);
        Self {
            backend,
            store,
            state: Mutex::new(SessionState::Anonymous),
            state_version: AtomicU64::new(0),
            publishing: Mutex::new(false),
            login_generation: AtomicU64::new(0),
            signup_generation: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
            watch_tx,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the state. Must be called with the state lock held.
    fn set_state(&self, state: &mut SessionState, next: SessionState) {
        *state = next;
        self.state_version.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> (SessionState, u64) {
        let state = self.lock_state();
        (state.clone(), self.state_version.load(Ordering::SeqCst))
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.lock_state().clone()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.lock_state().session().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock_state().is_authenticated()
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Register a callback invoked synchronously after every state change.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SessionState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_listener.fetch_add(1, Ordering::SeqCst));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Returns false if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Receiver for async consumers; always holds the latest state.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.watch_tx.subscribe()
    }

    /// Push the current state to the bearer header, the watch channel and
    /// every listener. Called with the state lock released so listeners may
    /// read or change the context.
    ///
    /// If another publish is running (on another thread, or further up this
    /// stack when a listener changed the state), it is left to deliver the
    /// new state and this call returns at once.
    fn publish(&self) {
        {
            let mut publishing = self.publishing.lock().unwrap_or_else(PoisonError::into_inner);
            if *publishing {
                return;
            }
            *publishing = true;
        }

        loop {
            let (state, version) = self.snapshot();
            self.backend.set_bearer(state.session().map(Session::token));
            self.watch_tx.send_replace(state.clone());

            let listeners: Vec<Listener> = self
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();
            for listener in listeners {
                if self.state_version.load(Ordering::SeqCst) != version {
                    break;
                }
                listener(&state);
            }

            let mut publishing = self.publishing.lock().unwrap_or_else(PoisonError::into_inner);
            if self.state_version.load(Ordering::SeqCst) == version {
                *publishing = false;
                return;
            }
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Hydrate from the persisted store. Makes no network calls.
    ///
    /// A persisted session is accepted only if its token decodes, its claims
    /// match the stored identity/role, and it has not expired. Anything else
    /// is cleared from the store and leaves the context `Anonymous`.
    pub fn boot(&self) -> SessionState {
        let restored = {
            let mut state = self.lock_state();
            if state.is_authenticated() {
                return state.clone();
            }

            let Some(persisted) = self.store.load() else {
                debug!("No persisted session");
                return SessionState::Anonymous;
            };

            match Session::restore(&persisted, Utc::now()) {
                Ok(session) => {
                    info!(identity = %session.identity(), role = %session.role(), "Session restored");
                    self.set_state(&mut state, SessionState::Authenticated(session));
                    state.clone()
                }
                Err(e) => {
                    warn!(error = %e, "Discarding persisted session");
                    if let Err(e) = self.store.clear() {
                        warn!(error = %e, "Failed to clear invalid persisted session");
                    }
                    return SessionState::Anonymous;
                }
            }
        };

        self.publish();
        restored
    }

    /// Authenticate and, if this is still the newest attempt, persist and
    /// publish the resulting session.
    pub async fn login(&self, identity: &str, secret: &str, role: Role) -> Result<Session, LoginError> {
        let ticket = self.login_generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(ticket, identity, %role, "Login attempt started");

        let result = self.backend.authenticate(identity, secret, role).await;

        let session = {
            let mut state = self.lock_state();
            if self.login_generation.load(Ordering::SeqCst) != ticket {
                debug!(ticket, "Discarding superseded login response");
                return Err(LoginError::Superseded);
            }

            let session = result?;
            if let Err(e) = self.store.save(&session.to_persisted()) {
                warn!(error = %e, "Failed to persist session; it will not survive a restart");
            }
            self.set_state(&mut state, SessionState::Authenticated(session.clone()));
            session
        };

        info!(identity = %session.identity(), role = %session.role(), "Login successful");
        self.publish();
        Ok(session)
    }

    /// Create an account. Never changes the session state.
    pub async fn signup(&self, identity: &str, secret: &str, role: Role) -> Result<Confirmation, SignupError> {
        let ticket = self.signup_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.backend.register(identity, secret, role).await;

        if self.signup_generation.load(Ordering::SeqCst) != ticket {
            debug!(ticket, "Discarding superseded signup response");
            return Err(SignupError::Superseded);
        }
        Ok(result?)
    }

    /// End the session. Idempotent: logging out while anonymous publishes
    /// nothing and leaves the store untouched. Any login still in flight is
    /// invalidated either way.
    pub fn logout(&self) {
        let was_authenticated = {
            let mut state = self.lock_state();
            self.login_generation.fetch_add(1, Ordering::SeqCst);
            if !state.is_authenticated() {
                return;
            }
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "Failed to clear persisted session");
            }
            self.set_state(&mut state, SessionState::Anonymous);
            true
        };

        if was_authenticated {
            info!("Logged out");
            self.publish();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
