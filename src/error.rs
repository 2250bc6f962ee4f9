use thiserror::Error;

/// Errors raised by the database access layer
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Error reported by SQLite or the connection thread
    #[error("Database error: {0}")]
    Database(String),

    /// The database stayed busy/locked through every retry
    #[error("Database busy: gave up after {attempts} attempts")]
    Busy { attempts: u32 },

    /// Registration with a username that is already taken
    #[error("User already exists: {0}")]
    UserExists(String),

    /// A match score that is negative or not a number
    #[error("Invalid distance score {score} for match {img_id_1} -> {img_id_2}")]
    InvalidDistance {
        img_id_1: String,
        img_id_2: String,
        score: f64,
    },
}

impl From<tokio_rusqlite::Error> for StoreError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Errors raised while dispatching image ids to the processing queue
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// The queue could not be created or resolved
    #[error("Failed to declare queue '{queue}': {message}")]
    Declare { queue: String, message: String },

    /// A message could not be sent
    #[error("Failed to enqueue '{img_id}': {message}")]
    Send { img_id: String, message: String },
}

/// Errors raised while validating or persisting an uploaded file
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    /// The multipart body has no `file` field
    #[error("No file part in request")]
    MissingFile,

    /// The `file` field carries no filename
    #[error("Uploaded file has no filename")]
    MissingFilename,

    /// Extension absent or not in the allow-list
    #[error("File type not allowed: '{filename}' (allowed: {})", allowed.join(", "))]
    DisallowedExtension {
        filename: String,
        allowed: Vec<String>,
    },

    /// Nothing usable is left after sanitizing the filename
    #[error("Invalid filename: '{0}'")]
    InvalidFilename(String),

    /// Writing the file to the upload directory failed
    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },
}
