//! Router configuration for facematch.
//!
//! This module defines the HTTP routes and applies middleware for
//! authentication, body limits and CORS.
//!
//! # Route Structure
//!
//! ```text
//! /health                                    - Health check (public)
//! /api/register_user                         - Create an account (public)
//! /api/token                                 - Issue a bearer token (Basic only)
//! /api/upload_image[/{img_id}]               - Upload, upload status (protected)
//! /api/process_image[/{img_id}]              - Queue, processing status (protected)
//! /api/original_images[/{crop_img_id}]       - Original ids (protected)
//! /api/cropped_images/{orig_img_id}          - Face crops (protected)
//! /api/cropped_image_matches/{img_id}        - Crop matches (protected)
//! /api/original_image_matches/{img_id}       - Original matches (protected)
//! ```
//!
//! With authentication disabled every route is public and `/api/token` is
//! not mounted.
//!
//! # Example
//!
//! ```ignore
//! use facematch::server::{create_router, AppState, RouterConfig};
//!
//! let state = AppState::new(db, queue, uploads);
//! let config = RouterConfig::new("my-secret-key")
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(state, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::auth::{
    auth_middleware, basic_auth_middleware, Credentials, SharedAuthenticator, TokenSigner,
    DEFAULT_TOKEN_TTL,
};
use super::handlers::{
    cropped_image_matches_handler, cropped_images_handler, health_handler,
    original_image_matches_handler, original_images_handler, originals_for_crop_handler,
    process_image_handler, process_status_handler, register_user_handler, token_handler,
    upload_image_handler, upload_status_handler, AppState,
};
use crate::queue::ImageQueue;

/// Default request body limit (16 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Secret key for token signing
    pub auth_secret: String,

    /// Whether `/api` routes require credentials
    pub auth_enabled: bool,

    /// Lifetime of issued bearer tokens
    pub token_ttl: Duration,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Create a new router configuration with the given auth secret.
    ///
    /// By default:
    /// - Authentication is enabled
    /// - Tokens live for 10 minutes
    /// - CORS allows any origin
    /// - Bodies are limited to 16 MiB
    /// - Tracing is enabled
    pub fn new(auth_secret: impl Into<String>) -> Self {
        Self {
            auth_secret: auth_secret.into(),
            auth_enabled: true,
            token_ttl: DEFAULT_TOKEN_TTL,
            cors_origins: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            enable_tracing: true,
        }
    }

    /// Create a configuration with authentication disabled.
    ///
    /// **Warning**: This should only be used for development/testing.
    pub fn without_auth() -> Self {
        Self {
            auth_enabled: false,
            ..Self::new(String::new())
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Set the bearer token lifetime.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    /// Set the request body limit.
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Enable or disable authentication.
    pub fn with_auth_enabled(mut self, enabled: bool) -> Self {
        self.auth_enabled = enabled;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// With authentication enabled, an [`Credentials`] authenticator is built
/// over the state's database and installed both as the route guard and as
/// the state's token issuer.
pub fn create_router<Q>(state: AppState<Q>, config: RouterConfig) -> Router
where
    Q: ImageQueue + 'static,
{
    let cors = build_cors_layer(&config);

    let router = if config.auth_enabled {
        let signer = TokenSigner::new(config.auth_secret.as_bytes(), config.token_ttl);
        let auth: SharedAuthenticator = Arc::new(Credentials::new(state.db.clone(), signer));
        build_protected_router(state.with_auth(Arc::clone(&auth)), auth)
    } else {
        build_public_router(state)
    };

    let router = router
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(config.max_upload_bytes))
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Routes behind credentials, whichever scheme.
fn api_routes<Q>() -> Router<AppState<Q>>
where
    Q: ImageQueue + 'static,
{
    Router::new()
        .route("/api/upload_image", post(upload_image_handler::<Q>))
        .route("/api/upload_image/{img_id}", get(upload_status_handler::<Q>))
        .route("/api/process_image", post(process_image_handler::<Q>))
        .route("/api/process_image/{img_id}", get(process_status_handler::<Q>))
        .route("/api/original_images", get(original_images_handler::<Q>))
        .route(
            "/api/original_images/{crop_img_id}",
            get(originals_for_crop_handler::<Q>),
        )
        .route(
            "/api/cropped_images/{orig_img_id}",
            get(cropped_images_handler::<Q>),
        )
        .route(
            "/api/cropped_image_matches/{img_id}",
            get(cropped_image_matches_handler::<Q>),
        )
        .route(
            "/api/original_image_matches/{img_id}",
            get(original_image_matches_handler::<Q>),
        )
}

/// Routes open to everyone.
fn public_routes<Q>() -> Router<AppState<Q>>
where
    Q: ImageQueue + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/register_user", post(register_user_handler::<Q>))
}

/// Build router with authentication on `/api` routes.
fn build_protected_router<Q>(state: AppState<Q>, auth: SharedAuthenticator) -> Router
where
    Q: ImageQueue + 'static,
{
    let protected_routes = api_routes::<Q>().route_layer(middleware::from_fn_with_state(
        Arc::clone(&auth),
        auth_middleware,
    ));

    let token_routes = Router::new()
        .route("/api/token", get(token_handler::<Q>))
        .route_layer(middleware::from_fn_with_state(auth, basic_auth_middleware));

    Router::new()
        .merge(protected_routes)
        .merge(token_routes)
        .merge(public_routes::<Q>())
        .with_state(state)
}

/// Build router without authentication (for development/testing).
fn build_public_router<Q>(state: AppState<Q>) -> Router
where
    Q: ImageQueue + 'static,
{
    Router::new()
        .merge(api_routes::<Q>())
        .merge(public_routes::<Q>())
        .with_state(state)
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
