//! Client for the CVisionary backend.
//!
//! `ApiClient` talks to the login and signup endpoints and attaches the
//! bearer token to later authenticated requests. `AuthBackend` is the seam
//! the session context depends on.

pub mod backend;
pub mod client;
pub mod error;

pub use backend::{AuthBackend, Confirmation};
pub use client::ApiClient;
pub use error::{ApiError, AuthError, RegistrationError};
