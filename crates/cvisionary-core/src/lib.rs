//! Core library for the CVisionary client.
//!
//! Establishes, persists, restores and tears down an authenticated session
//! against the CVisionary backend, and decides which views the current
//! session may enter.
//!
//! Token claims are decoded but never verified here. The backend checks the
//! bearer token on every protected call and is the only authority on it.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod routes;

pub use api::{ApiClient, ApiError, AuthBackend, AuthError, Confirmation, RegistrationError};
pub use auth::{LoginError, Role, Session, SessionContext, SessionState, SessionStore, SignupError};
pub use config::Config;
pub use routes::{decide, resolve, Decision, Resolution, View};
