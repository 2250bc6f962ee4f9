//! Database access layer.
//!
//! SQLite through `tokio-rusqlite`: a single connection thread serves every
//! request, and each operation is one scoped call on it.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                HTTP handlers                 │
//! └──────────────────────┬───────────────────────┘
//!                        │ read / write (retry on busy)
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │                  Database                    │
//! │  users · original_images · face_images ·     │
//! │  matches · pending_face_images               │
//! └──────────────────────▲───────────────────────┘
//!                        │ record_results
//! ┌──────────────────────┴───────────────────────┐
//! │           external processing worker          │
//! └──────────────────────────────────────────────┘
//! ```

mod database;
mod images;
mod schema;
mod users;

pub use database::{Database, WRITE_ATTEMPTS};
pub use images::{FaceMatch, MatchList, ProcessingResults};
pub use schema::SCHEMA;
