//! HTTP server layer for facematch.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │          /api/upload_image · /api/process_image · ...           │
//! │                                                                 │
//! │  ┌─────────────┐  ┌──────────────┐  ┌────────────────────────┐  │
//! │  │  handlers   │  │     auth     │  │        routes          │  │
//! │  │ (requests)  │  │(basic/bearer)│  │  (router config)       │  │
//! │  └──────┬──────┘  └──────┬───────┘  └────────────────────────┘  │
//! └─────────┼────────────────┼──────────────────────────────────────┘
//!           ▼                ▼
//!     store · upload · queue
//! ```

pub mod auth;
pub mod extract;
pub mod handlers;
pub mod routes;

pub use auth::{
    auth_middleware, basic_auth_middleware, hash_password, verify_password_hash, AuthError,
    AuthScheme, AuthenticatedUser, Authenticator, Credentials, SharedAuthenticator, TokenSigner,
    DEFAULT_TOKEN_TTL,
};
pub use extract::JsonOrForm;
pub use handlers::{
    AppState, ApiError, ErrorResponse, HealthResponse, ImgsResponse, MatchesResponse,
    RegisterResponse, StatusResponse, SuccessResponse, TokenResponse, UploadResponse,
};
pub use routes::{create_router, RouterConfig, DEFAULT_MAX_UPLOAD_BYTES};
