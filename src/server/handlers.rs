//! HTTP request handlers for the facematch API.
//!
//! # Endpoints
//!
//! - `POST /api/upload_image` - Upload an image (multipart `file` field)
//! - `GET /api/upload_image/{img_id}` - Processing and pending state
//! - `GET /api/process_image/{img_id}` - Processing state
//! - `POST /api/process_image` - Queue an image for processing
//! - `POST /api/register_user` - Create an account
//! - `GET /api/token` - Issue a bearer token
//! - `GET /api/original_images[/{crop_img_id}]` - Original image ids
//! - `GET /api/cropped_images/{orig_img_id}` - Face crops of an original
//! - `GET /api/cropped_image_matches/{img_id}` - Matches of a crop
//! - `GET /api/original_image_matches/{img_id}` - Matches of an original
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{QueueError, StoreError, UploadError};
use crate::queue::ImageQueue;
use crate::store::{Database, MatchList};
use crate::upload::{PreparedUpload, UploadDir};

use super::auth::{hash_password, AuthError, AuthScheme, AuthenticatedUser, SharedAuthenticator};
use super::extract::JsonOrForm;

/// Multipart field carrying the uploaded image.
pub const UPLOAD_FIELD: &str = "file";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<Q: ImageQueue> {
    /// Database handle
    pub db: Database,

    /// Dispatcher for processing jobs
    pub queue: Arc<Q>,

    /// Where uploads are written, and which extensions are accepted
    pub uploads: Arc<UploadDir>,

    /// Queue every upload for processing as soon as it is stored
    pub enqueue_on_upload: bool,

    /// Token issuer, present when authentication is enabled
    pub auth: Option<SharedAuthenticator>,
}

impl<Q: ImageQueue> AppState<Q> {
    /// Create application state; uploads are queued immediately.
    pub fn new(db: Database, queue: Q, uploads: UploadDir) -> Self {
        Self {
            db,
            queue: Arc::new(queue),
            uploads: Arc::new(uploads),
            enqueue_on_upload: true,
            auth: None,
        }
    }

    /// Choose whether uploads are queued immediately.
    pub fn with_enqueue_on_upload(mut self, enqueue: bool) -> Self {
        self.enqueue_on_upload = enqueue;
        self
    }

    /// Set the authenticator used to issue tokens.
    pub fn with_auth(mut self, auth: SharedAuthenticator) -> Self {
        self.auth = Some(auth);
        self
    }
}

impl<Q: ImageQueue> Clone for AppState<Q> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            queue: Arc::clone(&self.queue),
            uploads: Arc::clone(&self.uploads),
            enqueue_on_upload: self.enqueue_on_upload,
            auth: self.auth.clone(),
        }
    }
}

// =============================================================================
// Request Types
// =============================================================================

/// Body of `POST /api/process_image`.
#[derive(Debug, Deserialize)]
pub struct ProcessImageRequest {
    #[serde(default)]
    pub img_id: String,
}

/// Body of `POST /api/register_user`.
#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "missing_file", "queue_error")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

/// Generic acknowledgement.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Response to a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,

    /// Id the image is stored and processed under
    pub img_id: String,
}

/// Processing state of an image id.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Whether the worker has recorded results for the id
    pub finished_processing: bool,

    /// Whether a pending marker exists (upload status only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending: Option<bool>,
}

/// A list of image ids.
#[derive(Debug, Serialize)]
pub struct ImgsResponse {
    pub imgs: Vec<String>,
}

/// Matched ids with parallel distances.
#[derive(Debug, Serialize)]
pub struct MatchesResponse {
    pub imgs: Vec<String>,
    pub distances: Vec<f64>,
}

impl From<MatchList> for MatchesResponse {
    fn from(list: MatchList) -> Self {
        Self {
            imgs: list.imgs,
            distances: list.distances,
        }
    }
}

/// Response to a successful registration.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub username: String,
}

/// Bearer token and its lifetime in seconds.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub duration: u64,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Errors returned by API handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or malformed request field
    InvalidRequest(String),

    /// Multipart body could not be read
    Multipart { status: StatusCode, message: String },

    Upload(UploadError),
    Store(StoreError),
    Queue(QueueError),
    Auth(AuthError),
}

impl From<UploadError> for ApiError {
    fn from(err: UploadError) -> Self {
        ApiError::Upload(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        ApiError::Queue(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Multipart {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

/// Convert ApiError to HTTP response.
///
/// 5xx errors are logged at ERROR level, 4xx at WARN, except a duplicate
/// registration which is logged at DEBUG.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::Auth(err) => return err.into_response(),

            ApiError::InvalidRequest(message) => {
                (StatusCode::BAD_REQUEST, "invalid_request", message)
            }

            ApiError::Multipart { status, message } => {
                let error_type = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "payload_too_large"
                } else {
                    "invalid_multipart"
                };
                (status, error_type, message)
            }

            ApiError::Upload(err) => {
                let (status, error_type) = match &err {
                    UploadError::MissingFile | UploadError::MissingFilename => {
                        (StatusCode::BAD_REQUEST, "missing_file")
                    }
                    UploadError::DisallowedExtension { .. } => {
                        (StatusCode::BAD_REQUEST, "disallowed_extension")
                    }
                    UploadError::InvalidFilename(_) => {
                        (StatusCode::BAD_REQUEST, "invalid_filename")
                    }
                    UploadError::Write { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "storage_error")
                    }
                };
                (status, error_type, err.to_string())
            }

            ApiError::Store(err) => {
                let (status, error_type) = match &err {
                    StoreError::UserExists(_) => (StatusCode::BAD_REQUEST, "user_exists"),
                    StoreError::InvalidDistance { .. } => {
                        (StatusCode::BAD_REQUEST, "invalid_request")
                    }
                    StoreError::Busy { .. } => (StatusCode::SERVICE_UNAVAILABLE, "database_busy"),
                    StoreError::Database(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                    }
                };
                (status, error_type, err.to_string())
            }

            ApiError::Queue(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "queue_error",
                err.to_string(),
            ),
        };

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if error_type == "user_exists" {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle image uploads.
///
/// # Endpoint
///
/// `POST /api/upload_image`, multipart with a `file` field.
///
/// The file is validated, written to the upload directory, marked pending
/// and (unless disabled) queued for processing.
///
/// # Response
///
/// `200 OK` with `{"success": true, "img_id": "<id>"}`
///
/// # Errors
///
/// - `400 Bad Request`: Missing file, disallowed extension, unusable filename
/// - `413 Payload Too Large`: Body exceeds the upload limit
/// - `500 Internal Server Error`: Write, database or queue failure
pub async fn upload_image_handler<Q: ImageQueue>(
    State(state): State<AppState<Q>>,
    user: Option<Extension<AuthenticatedUser>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload: Option<(PreparedUpload, bytes::Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            debug!(field = ?field.name(), "Ignoring multipart field");
            continue;
        }

        // Validate before buffering the body
        let filename = field.file_name().unwrap_or_default().to_string();
        let prepared = state.uploads.prepare(&filename)?;
        let data = field.bytes().await?;
        upload = Some((prepared, data));
        break;
    }

    let (prepared, data) = upload.ok_or(UploadError::MissingFile)?;

    state.uploads.save(&prepared, &data).await?;
    state.db.add_pending_marker(&prepared.img_id).await?;

    if state.enqueue_on_upload {
        state.queue.enqueue(&prepared.img_id).await?;
    }

    info!(
        img_id = %prepared.img_id,
        bytes = data.len(),
        user = user.as_ref().map(|Extension(u)| u.username.as_str()).unwrap_or("-"),
        "Image uploaded"
    );

    Ok(Json(UploadResponse {
        success: true,
        img_id: prepared.img_id,
    }))
}

/// Handle upload status requests.
///
/// `GET /api/upload_image/{img_id}` → `{"finished_processing": bool, "pending": bool}`
pub async fn upload_status_handler<Q: ImageQueue>(
    State(state): State<AppState<Q>>,
    Path(img_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let finished_processing = state.db.is_processed(&img_id).await?;
    let pending = state.db.is_pending(&img_id).await?;

    Ok(Json(StatusResponse {
        finished_processing,
        pending: Some(pending),
    }))
}

/// Handle processing status requests.
///
/// `GET /api/process_image/{img_id}` → `{"finished_processing": bool}`
pub async fn process_status_handler<Q: ImageQueue>(
    State(state): State<AppState<Q>>,
    Path(img_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let finished_processing = state.db.is_processed(&img_id).await?;

    Ok(Json(StatusResponse {
        finished_processing,
        pending: None,
    }))
}

/// Handle processing requests.
///
/// # Endpoint
///
/// `POST /api/process_image` with `img_id` as a JSON or form field.
///
/// # Errors
///
/// - `400 Bad Request`: Missing or empty `img_id`
/// - `500 Internal Server Error`: Queue failure
pub async fn process_image_handler<Q: ImageQueue>(
    State(state): State<AppState<Q>>,
    JsonOrForm(request): JsonOrForm<ProcessImageRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let img_id = request.img_id.trim();
    if img_id.is_empty() {
        return Err(ApiError::InvalidRequest("img_id is required".to_string()));
    }

    state.queue.enqueue(img_id).await?;
    info!(img_id = %img_id, queue = %state.queue.name(), "Image queued for processing");

    Ok(Json(SuccessResponse { success: true }))
}

/// Handle account registration.
///
/// # Endpoint
///
/// `POST /api/register_user` with `username` and `password` (JSON or form).
///
/// # Response
///
/// `201 Created` with `{"username": "<name>"}`
///
/// # Errors
///
/// - `400 Bad Request`: Missing field or username already taken
pub async fn register_user_handler<Q: ImageQueue>(
    State(state): State<AppState<Q>>,
    JsonOrForm(request): JsonOrForm<RegisterUserRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let RegisterUserRequest { username, password } = request;
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::InvalidRequest(
            "username and password are required".to_string(),
        ));
    }

    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AuthError::Store(format!("password hashing task failed: {}", e)))??;

    state.db.create_user(&username, &password_hash).await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { username })))
}

/// Issue a bearer token to a user authenticated with Basic credentials.
///
/// `GET /api/token` → `{"token": "...", "duration": <seconds>}`
pub async fn token_handler<Q: ImageQueue>(
    State(state): State<AppState<Q>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<TokenResponse>, ApiError> {
    if user.scheme != AuthScheme::Basic {
        return Err(AuthError::BasicRequired.into());
    }
    let auth = state.auth.as_ref().ok_or(AuthError::MissingCredentials)?;

    let token = auth.issue_token(&user.username);
    debug!(username = %user.username, "Issued token");

    Ok(Json(TokenResponse {
        token,
        duration: auth.token_ttl().as_secs(),
    }))
}

/// `GET /api/original_images` → every original image id.
pub async fn original_images_handler<Q: ImageQueue>(
    State(state): State<AppState<Q>>,
) -> Result<Json<ImgsResponse>, ApiError> {
    let imgs = state.db.original_image_ids().await?;
    Ok(Json(ImgsResponse { imgs }))
}

/// `GET /api/original_images/{crop_img_id}` → originals containing the crop.
pub async fn originals_for_crop_handler<Q: ImageQueue>(
    State(state): State<AppState<Q>>,
    Path(crop_img_id): Path<String>,
) -> Result<Json<ImgsResponse>, ApiError> {
    let imgs = state.db.original_ids_for_crop(&crop_img_id).await?;
    Ok(Json(ImgsResponse { imgs }))
}

/// `GET /api/cropped_images/{orig_img_id}` → face crops of the original.
pub async fn cropped_images_handler<Q: ImageQueue>(
    State(state): State<AppState<Q>>,
    Path(orig_img_id): Path<String>,
) -> Result<Json<ImgsResponse>, ApiError> {
    let imgs = state.db.cropped_ids_for_original(&orig_img_id).await?;
    Ok(Json(ImgsResponse { imgs }))
}

/// `GET /api/cropped_image_matches/{img_id}` → matches of a crop.
pub async fn cropped_image_matches_handler<Q: ImageQueue>(
    State(state): State<AppState<Q>>,
    Path(img_id): Path<String>,
) -> Result<Json<MatchesResponse>, ApiError> {
    let matches = state.db.cropped_image_matches(&img_id).await?;
    Ok(Json(matches.into()))
}

/// `GET /api/original_image_matches/{img_id}` → other originals sharing a face.
pub async fn original_image_matches_handler<Q: ImageQueue>(
    State(state): State<AppState<Q>>,
    Path(img_id): Path<String>,
) -> Result<Json<MatchesResponse>, ApiError> {
    let matches = state.db.original_image_matches(&img_id).await?;
    Ok(Json(matches.into()))
}

/// Handle health check requests.
///
/// `GET /health` → `{"status": "healthy", "version": "<crate version>"}`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
