//! HTTP client for the CVisionary backend.
//!
//! `ApiClient` wraps the two credential endpoints (`/auth/login`,
//! `/auth/signup`) and carries the bearer token attached to every
//! authenticated request made afterwards.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::backend::{AuthBackend, Confirmation};
use super::error::{AuthError, RegistrationError, LOGIN_FALLBACK_MESSAGE, SIGNUP_FALLBACK_MESSAGE};
use super::ApiError;
use crate::auth::{Role, Session};
use crate::config::Config;
use crate::models::ResumeSummary;

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "/auth/login";
const SIGNUP_PATH: &str = "/auth/signup";
const RESUME_LIST_PATH: &str = "/resume/list";

/// Shown when the backend accepts a signup but omits the message
const DEFAULT_SIGNUP_CONFIRMATION: &str = "Signup successful";

#[derive(Serialize)]
struct CredentialsRequest<'a> {
    email: &'a str,
    password: &'a str,
    role: Role,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SignupResponse {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

/// API client for the CVisionary backend.
/// Clone is cheap and clones share the bearer token: logging out through one
/// handle removes the header from all of them.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    /// Build around an existing `reqwest::Client`.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Create a new ApiClient with its own token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Arc::new(RwLock::new(Some(token))),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&self, token: String) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Stop sending a bearer token
    pub fn clear_token(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        let token = self.token.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(ref token) = *token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::InvalidResponse("Bearer token is not a valid header value".to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// The backend's `detail` field, when the failure body has a textual one.
    async fn failure_detail(response: reqwest::Response) -> Option<String> {
        let body = response.text().await.ok()?;
        let parsed: ErrorBody = serde_json::from_str(&body).ok()?;
        match parsed.detail? {
            serde_json::Value::String(detail) if !detail.trim().is_empty() => Some(detail),
            _ => None,
        }
    }

    async fn post_credentials(
        &self,
        path: &str,
        identity: &str,
        secret: &str,
        role: Role,
    ) -> Result<reqwest::Response, reqwest::Error> {
        self.client
            .post(self.url(path))
            .header(header::ACCEPT, "application/json")
            .json(&CredentialsRequest {
                email: identity,
                password: secret,
                role,
            })
            .send()
            .await
    }

    // ===== Authentication =====

    /// Exchange credentials for a session. One request, no retries, no state
    /// changes on this client.
    pub async fn authenticate(&self, identity: &str, secret: &str, role: Role) -> Result<Session, AuthError> {
        let response = self
            .post_credentials(LOGIN_PATH, identity, secret, role)
            .await
            .map_err(|e| {
                warn!(error = %e, "Login request failed");
                AuthError::NetworkError(LOGIN_FALLBACK_MESSAGE.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            debug!(%status, "Login rejected");
            return Err(match Self::failure_detail(response).await {
                Some(detail) => AuthError::InvalidCredentials(detail),
                None => AuthError::NetworkError(LOGIN_FALLBACK_MESSAGE.to_string()),
            });
        }

        let body: LoginResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse login response");
            AuthError::NetworkError(LOGIN_FALLBACK_MESSAGE.to_string())
        })?;

        let session = Session::from_token(body.access_token).map_err(AuthError::MalformedToken)?;
        debug!(identity = %session.identity(), role = %session.role(), "Login accepted");
        Ok(session)
    }

    /// Create an account. Never touches the current session.
    pub async fn register(&self, identity: &str, secret: &str, role: Role) -> Result<Confirmation, RegistrationError> {
        let response = self
            .post_credentials(SIGNUP_PATH, identity, secret, role)
            .await
            .map_err(|e| {
                warn!(error = %e, "Signup request failed");
                RegistrationError::NetworkError(SIGNUP_FALLBACK_MESSAGE.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            debug!(%status, "Signup rejected");
            return Err(match Self::failure_detail(response).await {
                Some(detail) => RegistrationError::AlreadyExists(detail),
                None => RegistrationError::NetworkError(SIGNUP_FALLBACK_MESSAGE.to_string()),
            });
        }

        let body: SignupResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse signup response");
            RegistrationError::NetworkError(SIGNUP_FALLBACK_MESSAGE.to_string())
        })?;

        Ok(Confirmation(
            body.message
                .unwrap_or_else(|| DEFAULT_SIGNUP_CONFIRMATION.to_string()),
        ))
    }

    // ===== Authenticated requests =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self.client.get(&url).headers(self.auth_headers()?).send().await?;
        let response = Self::check_response(response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e)))
    }

    /// Fetch all stored resume analyses
    pub async fn list_resumes(&self) -> Result<Vec<ResumeSummary>, ApiError> {
        self.get(RESUME_LIST_PATH).await
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn authenticate(&self, identity: &str, secret: &str, role: Role) -> Result<Session, AuthError> {
        ApiClient::authenticate(self, identity, secret, role).await
    }

    async fn register(&self, identity: &str, secret: &str, role: Role) -> Result<Confirmation, RegistrationError> {
        ApiClient::register(self, identity, secret, role).await
    }

    fn set_bearer(&self, token: Option<&str>) {
        match token {
            Some(token) => self.set_token(token.to_string()),
            None => self.clear_token(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::{encode_unsigned, DecodeError};
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Read one HTTP/1.1 request (headers plus Content-Length body).
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Serve a single canned response; the handle yields the raw request.
    async fn serve_once(status_line: &str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let status_line = status_line.to_string();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            request
        });
        (format!("http://{}", addr), handle)
    }

    fn client_for(base_url: &str) -> ApiClient {
        let client = Client::builder().no_proxy().build().unwrap();
        ApiClient::with_client(client, base_url)
    }

    #[tokio::test]
    async fn test_authenticate_decodes_token() {
        let token = encode_unsigned(&json!({"sub": "a@x.com", "role": "student"}));
        let body = json!({"access_token": token, "token_type": "bearer"}).to_string();
        let (base, server) = serve_once("200 OK", body).await;

        let api = client_for(&base);
        let session = api.authenticate("a@x.com", "pw", Role::Student).await.unwrap();
        assert_eq!(session.identity(), "a@x.com");
        assert_eq!(session.role(), Role::Student);
        assert_eq!(session.token(), token);
        // authenticate itself never installs the token
        assert!(!api.has_token());

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /auth/login "));
        assert!(request.contains(r#""email":"a@x.com""#));
        assert!(request.contains(r#""password":"pw""#));
        assert!(request.contains(r#""role":"student""#));
    }

    #[tokio::test]
    async fn test_authenticate_uses_backend_detail() {
        let body = json!({"detail": "This account is registered as recruiter, not student"}).to_string();
        let (base, _server) = serve_once("403 Forbidden", body).await;

        let err = client_for(&base)
            .authenticate("hr@corp.io", "pw", Role::Student)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::InvalidCredentials("This account is registered as recruiter, not student".to_string())
        );
    }

    #[tokio::test]
    async fn test_authenticate_without_detail_is_network_error() {
        let (base, _server) = serve_once("500 Internal Server Error", "oops".to_string()).await;

        let err = client_for(&base)
            .authenticate("a@x.com", "pw", Role::Student)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::NetworkError(LOGIN_FALLBACK_MESSAGE.to_string()));
    }

    #[tokio::test]
    async fn test_authenticate_structured_detail_is_not_used_verbatim() {
        // FastAPI validation errors carry a list, not a message
        let body = json!({"detail": [{"loc": ["body", "email"], "msg": "field required"}]}).to_string();
        let (base, _server) = serve_once("422 Unprocessable Entity", body).await;

        let err = client_for(&base)
            .authenticate("", "pw", Role::Student)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::NetworkError(LOGIN_FALLBACK_MESSAGE.to_string()));
    }

    #[tokio::test]
    async fn test_authenticate_malformed_token() {
        let body = json!({"access_token": "not-a-jwt"}).to_string();
        let (base, _server) = serve_once("200 OK", body).await;

        let err = client_for(&base)
            .authenticate("a@x.com", "pw", Role::Student)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::MalformedToken(DecodeError::SegmentCount(1)));
    }

    #[tokio::test]
    async fn test_authenticate_transport_failure() {
        // Bind then drop to get a port nobody is listening on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client_for(&format!("http://{}", addr))
            .authenticate("a@x.com", "pw", Role::Student)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::NetworkError(LOGIN_FALLBACK_MESSAGE.to_string()));
    }

    #[tokio::test]
    async fn test_register_returns_confirmation() {
        let body = json!({"message": "User created successfully"}).to_string();
        let (base, server) = serve_once("200 OK", body).await;

        let confirmation = client_for(&base)
            .register("new@x.com", "pw", Role::Recruiter)
            .await
            .unwrap();
        assert_eq!(confirmation.to_string(), "User created successfully");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /auth/signup "));
        assert!(request.contains(r#""role":"recruiter""#));
    }

    #[tokio::test]
    async fn test_register_already_exists() {
        let body = json!({"detail": "User with email a@x.com already registered as student"}).to_string();
        let (base, _server) = serve_once("400 Bad Request", body).await;

        let err = client_for(&base)
            .register("a@x.com", "pw", Role::Student)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RegistrationError::AlreadyExists("User with email a@x.com already registered as student".to_string())
        );
    }

    #[tokio::test]
    async fn test_register_without_detail_is_network_error() {
        let (base, _server) = serve_once("502 Bad Gateway", String::new()).await;

        let err = client_for(&base)
            .register("a@x.com", "pw", Role::Student)
            .await
            .unwrap_err();
        assert_eq!(err, RegistrationError::NetworkError(SIGNUP_FALLBACK_MESSAGE.to_string()));
    }

    #[tokio::test]
    async fn test_bearer_header_follows_token() {
        let (base, server) = serve_once("200 OK", "[]".to_string()).await;
        let api = client_for(&base);
        api.set_bearer(Some("abc.def.ghi"));
        let resumes = api.list_resumes().await.unwrap();
        assert!(resumes.is_empty());
        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /resume/list "));
        assert!(request.contains("authorization: bearer abc.def.ghi"));

        let (base, server) = serve_once("200 OK", "[]".to_string()).await;
        let api = ApiClient { base_url: base, ..api };
        api.set_bearer(None);
        api.list_resumes().await.unwrap();
        let request = server.await.unwrap().to_lowercase();
        assert!(!request.contains("authorization:"));
    }

    #[tokio::test]
    async fn test_clones_share_token() {
        let api = client_for("http://localhost:8000/");
        assert_eq!(api.base_url(), "http://localhost:8000");
        let clone = api.clone();
        api.set_token("t.o.k".to_string());
        assert!(clone.has_token());
        clone.clear_token();
        assert!(!api.has_token());

        let separate = api.with_token("x.y.z".to_string());
        assert!(separate.has_token());
        assert!(!api.has_token());
    }

    #[tokio::test]
    async fn test_authenticated_request_unauthorized() {
        let (base, _server) = serve_once("401 Unauthorized", json!({"detail": "expired"}).to_string()).await;
        let api = client_for(&base);
        api.set_token("a.b.c".to_string());
        let err = api.list_resumes().await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }
}
