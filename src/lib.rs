//! # facematch
//!
//! HTTP API for a face matching pipeline.
//!
//! Clients upload photos; each accepted upload is written to disk, marked
//! pending and pushed onto a processing queue. An external worker detects
//! faces, crops them, computes match distances and writes the results back
//! to the shared SQLite database, where this API serves them.
//!
//! ## Architecture
//!
//! - [`server`] - Axum routes, handlers, and Basic/Bearer authentication
//! - [`store`] - SQLite schema and queries
//! - [`upload`] - Filename sanitizing and upload storage
//! - [`queue`] - Processing queue dispatch (SQS)
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use facematch::{create_router, AppState, Database, RouterConfig, SqsImageQueue, UploadDir};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::open("facematch.db").await?;
//!     let client = facematch::create_sqs_client(None, "us-east-1").await;
//!     let queue = SqsImageQueue::declare(client, "face-jobs").await?;
//!     let uploads = UploadDir::new("images/input", ["jpg"]);
//!
//!     let router = create_router(
//!         AppState::new(db, queue, uploads),
//!         RouterConfig::new("my-secret-key"),
//!     );
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod queue;
pub mod server;
pub mod store;
pub mod upload;

// Re-export commonly used types
pub use config::{CheckConfig, Cli, Command, ServeConfig, TokenConfig};
pub use error::{QueueError, StoreError, UploadError};
pub use queue::{create_sqs_client, ImageQueue, SqsImageQueue};
pub use server::{
    create_router, ApiError, AppState, AuthError, Authenticator, Credentials, ErrorResponse,
    RouterConfig, TokenSigner,
};
pub use store::{Database, FaceMatch, MatchList, ProcessingResults};
pub use upload::{PreparedUpload, UploadDir};
