//! Upload validation and storage.
//!
//! An upload is accepted in two steps: [`UploadDir::prepare`] checks the
//! client filename against the extension allow-list and derives the stored
//! name and image id, then [`UploadDir::save`] writes the bytes. Nothing
//! touches the filesystem until `prepare` has succeeded.

mod filename;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::UploadError;

pub use filename::{extension, image_id, secure_filename};

/// Default extension allow-list.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["jpg"];

/// A validated upload, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedUpload {
    /// Sanitized filename under the upload directory
    pub filename: String,

    /// Image id derived from the filename
    pub img_id: String,
}

/// Directory that receives uploaded images, plus its extension allow-list.
#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
    allowed_extensions: Vec<String>,
}

impl UploadDir {
    /// Create an upload directory handle.
    ///
    /// Extensions are compared case-insensitively; a leading `.` is ignored.
    pub fn new<I, S>(root: impl Into<PathBuf>, allowed_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_extensions = allowed_extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Self {
            root: root.into(),
            allowed_extensions,
        }
    }

    /// Directory files are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allowed extensions, lowercased.
    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    /// Whether `filename` has an allowed extension.
    pub fn is_allowed(&self, filename: &str) -> bool {
        extension(filename)
            .map(|ext| self.allowed_extensions.iter().any(|allowed| *allowed == ext))
            .unwrap_or(false)
    }

    /// Validate a client filename and derive where and under which id it is stored.
    pub fn prepare(&self, client_filename: &str) -> Result<PreparedUpload, UploadError> {
        if client_filename.is_empty() {
            return Err(UploadError::MissingFilename);
        }

        if !self.is_allowed(client_filename) {
            return Err(UploadError::DisallowedExtension {
                filename: client_filename.to_string(),
                allowed: self.allowed_extensions.clone(),
            });
        }

        let filename = secure_filename(client_filename);
        // Sanitizing can eat the stem or the dot ("日本.jpg" -> "jpg")
        if !self.is_allowed(&filename) {
            return Err(UploadError::InvalidFilename(client_filename.to_string()));
        }

        let img_id = image_id(&filename).to_string();
        if img_id.is_empty() {
            return Err(UploadError::InvalidFilename(client_filename.to_string()));
        }

        Ok(PreparedUpload { filename, img_id })
    }

    /// Write the upload's bytes, creating the directory if needed.
    ///
    /// An existing file with the same name is replaced. A failed write may
    /// leave a partial file behind.
    pub async fn save(&self, upload: &PreparedUpload, data: &[u8]) -> Result<PathBuf, UploadError> {
        let path = self.root.join(&upload.filename);
        let write_error = |e: std::io::Error| UploadError::Write {
            path: path.display().to_string(),
            message: e.to_string(),
        };

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(write_error)?;
        tokio::fs::write(&path, data).await.map_err(write_error)?;

        debug!(path = %path.display(), bytes = data.len(), "Saved upload");
        Ok(path)
    }
}
