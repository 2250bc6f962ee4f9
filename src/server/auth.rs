//! Authentication for the facematch API.
//!
//! Two credentials are accepted on protected routes:
//!
//! - `Authorization: Basic` with a registered username and password, checked
//!   against the stored Argon2 hash
//! - `Authorization: Bearer <token>` with a token from `GET /api/token`
//!
//! # Token Scheme
//!
//! Tokens are HMAC-SHA256 signed and carry their own expiry:
//!
//! ```text
//! payload   = hex(username) "." expiry
//! signature = HMAC-SHA256(secret_key, payload)
//! token     = payload "." hex(signature)
//! ```
//!
//! Verification checks the expiry, then compares signatures in constant time,
//! then requires that the user still exists.
//!
//! # Example
//!
//! ```rust
//! use facematch::server::auth::TokenSigner;
//! use std::time::Duration;
//!
//! let signer = TokenSigner::new("my-secret-key", Duration::from_secs(600));
//! let (token, _expiry) = signer.issue("alice");
//! assert_eq!(signer.verify(&token).unwrap(), "alice");
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use headers::authorization::{Basic, Bearer};
use headers::{Authorization, HeaderMapExt};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, error, warn};

use super::handlers::ErrorResponse;
use crate::error::StoreError;
use crate::store::Database;

// =============================================================================
// Types
// =============================================================================

/// HMAC-SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// `WWW-Authenticate` challenge sent with every 401.
const CHALLENGE: &str = "Basic realm=\"facematch\"";

/// Default bearer token lifetime (10 minutes).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(600);

/// Authentication error types.
#[derive(Debug, Clone)]
pub enum AuthError {
    /// No usable `Authorization` header
    MissingCredentials,

    /// Unknown user or wrong password
    InvalidCredentials,

    /// Route only accepts basic auth
    BasicRequired,

    /// Token is not `payload.signature` with valid hex parts
    MalformedToken,

    /// Token has expired
    Expired {
        /// When the token expired
        expired_at: u64,
        /// Current time
        current_time: u64,
    },

    /// Token signature does not match
    InvalidSignature,

    /// Token is valid but its user no longer exists
    UnknownUser(String),

    /// Credential store could not be read
    Store(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredentials => write!(f, "Missing credentials"),
            AuthError::InvalidCredentials => write!(f, "Invalid username or password"),
            AuthError::BasicRequired => write!(f, "This endpoint requires basic authentication"),
            AuthError::MalformedToken => write!(f, "Malformed token"),
            AuthError::Expired {
                expired_at,
                current_time,
            } => write!(
                f,
                "Token expired at {} (current time: {})",
                expired_at, current_time
            ),
            AuthError::InvalidSignature => write!(f, "Invalid token signature"),
            AuthError::UnknownUser(username) => write!(f, "Unknown user: {}", username),
            AuthError::Store(msg) => write!(f, "Credential store error: {}", msg),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Store(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            AuthError::MissingCredentials => (StatusCode::UNAUTHORIZED, "missing_credentials"),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            AuthError::BasicRequired => (StatusCode::UNAUTHORIZED, "basic_auth_required"),
            AuthError::MalformedToken => (StatusCode::UNAUTHORIZED, "malformed_token"),
            AuthError::Expired { .. } => (StatusCode::UNAUTHORIZED, "token_expired"),
            AuthError::InvalidSignature => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AuthError::UnknownUser(_) => (StatusCode::UNAUTHORIZED, "invalid_token"),
            AuthError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
        };
        let message = self.to_string();

        // Bad passwords and forged tokens are worth a warning; expiry is routine
        match &self {
            AuthError::InvalidCredentials | AuthError::InvalidSignature => {
                warn!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
            AuthError::Store(_) => {
                error!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication error: {}",
                    message
                );
            }
            _ => {
                debug!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    message
                );
            }
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        let mut response = (status, Json(error_response)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(CHALLENGE),
            );
        }
        response
    }
}

// =============================================================================
// Password Hashing
// =============================================================================

/// Hash a password with Argon2id and a random salt (PHC string format).
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Store(format!("password hashing failed: {}", e)))
}

/// Check a password against a stored PHC hash. Unparseable hashes never match.
pub fn verify_password_hash(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

// =============================================================================
// Token Signing
// =============================================================================

/// Issues and verifies signed, time-limited bearer tokens.
#[derive(Clone)]
pub struct TokenSigner {
    /// Secret key for HMAC computation
    secret_key: Vec<u8>,

    /// Lifetime of newly issued tokens
    ttl: Duration,
}

impl TokenSigner {
    /// Create a signer with the given secret key and token lifetime.
    ///
    /// # Arguments
    ///
    /// * `secret_key` - The secret key used for HMAC computation. Should be
    ///   at least 32 bytes for security.
    /// * `ttl` - How long issued tokens stay valid
    pub fn new(secret_key: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
            ttl,
        }
    }

    /// Lifetime of newly issued tokens.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `username`.
    ///
    /// Returns the token and its expiry timestamp (Unix epoch seconds).
    pub fn issue(&self, username: &str) -> (String, u64) {
        let expiry = now_secs().saturating_add(self.ttl.as_secs());
        (self.issue_with_expiry(username, expiry), expiry)
    }

    /// Issue a token with a specific expiry timestamp.
    pub fn issue_with_expiry(&self, username: &str, expiry: u64) -> String {
        let payload = format!("{}.{}", hex::encode(username), expiry);
        let signature = self.compute_signature(&payload);
        format!("{}.{}", payload, signature)
    }

    /// Verify a token's signature and expiry and return its username.
    ///
    /// This does not check that the user still exists; see [`Credentials`].
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let mut parts = token.split('.');
        let (user_hex, expiry_str, signature) = match (parts.next(), parts.next(), parts.next()) {
            (Some(u), Some(e), Some(s)) if parts.next().is_none() => (u, e, s),
            _ => return Err(AuthError::MalformedToken),
        };

        let expiry: u64 = expiry_str.parse().map_err(|_| AuthError::MalformedToken)?;

        let provided_sig = hex::decode(signature).map_err(|_| AuthError::MalformedToken)?;

        let payload = format!("{}.{}", user_hex, expiry_str);
        let expected_sig = hex::decode(self.compute_signature(&payload))
            .map_err(|_| AuthError::MalformedToken)?;

        // Constant-time comparison; unsigned tokens never reach the expiry check
        if !bool::from(provided_sig.ct_eq(&expected_sig)) {
            return Err(AuthError::InvalidSignature);
        }

        let current_time = now_secs();
        if current_time > expiry {
            return Err(AuthError::Expired {
                expired_at: expiry,
                current_time,
            });
        }

        let username = hex::decode(user_hex)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or(AuthError::MalformedToken)?;

        Ok(username)
    }

    /// Compute the hex-encoded HMAC-SHA256 of a token payload.
    fn compute_signature(&self, payload: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// =============================================================================
// Authenticator
// =============================================================================

/// Credential checks used by the auth middleware and the token endpoint.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Whether `password` is the registered password of `username`.
    async fn verify_password(&self, username: &str, password: &str) -> Result<bool, AuthError>;

    /// Issue a bearer token for an authenticated user.
    fn issue_token(&self, username: &str) -> String;

    /// Resolve a bearer token to the username it was issued for.
    async fn verify_token(&self, token: &str) -> Result<String, AuthError>;

    /// Lifetime of issued tokens.
    fn token_ttl(&self) -> Duration;
}

/// [`Authenticator`] backed by the user table and a [`TokenSigner`].
#[derive(Clone)]
pub struct Credentials {
    db: Database,
    signer: TokenSigner,
}

impl Credentials {
    pub fn new(db: Database, signer: TokenSigner) -> Self {
        Self { db, signer }
    }
}

#[async_trait]
impl Authenticator for Credentials {
    async fn verify_password(&self, username: &str, password: &str) -> Result<bool, AuthError> {
        let Some(stored_hash) = self.db.password_hash(username).await? else {
            return Ok(false);
        };

        // CPU-bound
        let password = password.to_string();
        tokio::task::spawn_blocking(move || verify_password_hash(&password, &stored_hash))
            .await
            .map_err(|e| AuthError::Store(format!("password check aborted: {}", e)))
    }

    fn issue_token(&self, username: &str) -> String {
        self.signer.issue(username).0
    }

    async fn verify_token(&self, token: &str) -> Result<String, AuthError> {
        let username = self.signer.verify(token)?;
        if !self.db.user_exists(&username).await? {
            return Err(AuthError::UnknownUser(username));
        }
        Ok(username)
    }

    fn token_ttl(&self) -> Duration {
        self.signer.ttl()
    }
}

// =============================================================================
// Axum Middleware
// =============================================================================

/// How a request proved its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Bearer,
}

/// Identity attached to request extensions by the auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub username: String,
    pub scheme: AuthScheme,
}

/// Shared authenticator handle used as middleware state.
pub type SharedAuthenticator = Arc<dyn Authenticator>;

/// Middleware accepting basic auth or a bearer token.
///
/// On success the [`AuthenticatedUser`] is inserted into the request
/// extensions; otherwise the request is rejected with 401.
pub async fn auth_middleware(
    State(auth): State<SharedAuthenticator>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let presented = PresentedCredentials::from_headers(request.headers());
    let user = authenticate(auth.as_ref(), presented, false).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Middleware accepting basic auth only (token issuance).
pub async fn basic_auth_middleware(
    State(auth): State<SharedAuthenticator>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let presented = PresentedCredentials::from_headers(request.headers());
    let user = authenticate(auth.as_ref(), presented, true).await?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Credentials found in the `Authorization` header.
enum PresentedCredentials {
    Basic { username: String, password: String },
    Bearer(String),
}

impl PresentedCredentials {
    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        if let Some(Authorization(basic)) = headers.typed_get::<Authorization<Basic>>() {
            return Some(Self::Basic {
                username: basic.username().to_string(),
                password: basic.password().to_string(),
            });
        }
        headers
            .typed_get::<Authorization<Bearer>>()
            .map(|Authorization(bearer)| Self::Bearer(bearer.token().to_string()))
    }
}

async fn authenticate(
    auth: &dyn Authenticator,
    presented: Option<PresentedCredentials>,
    basic_only: bool,
) -> Result<AuthenticatedUser, AuthError> {
    match presented {
        Some(PresentedCredentials::Basic { username, password }) => {
            if !auth.verify_password(&username, &password).await? {
                return Err(AuthError::InvalidCredentials);
            }
            Ok(AuthenticatedUser {
                username,
                scheme: AuthScheme::Basic,
            })
        }
        Some(PresentedCredentials::Bearer(_)) if basic_only => Err(AuthError::BasicRequired),
        Some(PresentedCredentials::Bearer(token)) => {
            let username = auth.verify_token(&token).await?;
            Ok(AuthenticatedUser {
                username,
                scheme: AuthScheme::Bearer,
            })
        }
        None => Err(AuthError::MissingCredentials),
    }
}

// =============================================================================
// Tests
// =============================================================================
