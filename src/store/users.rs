//! User records for the credential store.
//!
//! Only password hashes are stored here; hashing and verification live in
//! [`crate::server::auth`].

use rusqlite::{params, OptionalExtension};
use tracing::info;

use super::Database;
use crate::error::StoreError;

impl Database {
    /// Insert a new user.
    ///
    /// Returns [`StoreError::UserExists`] if the username is taken. The
    /// uniqueness check and the insert are one statement, so concurrent
    /// registrations of the same name cannot both succeed.
    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<(), StoreError> {
        let name = username.to_string();
        let hash = password_hash.to_string();

        let inserted = self
            .write(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO users (username, password_hash) VALUES (?1, ?2)",
                    params![name, hash],
                )
            })
            .await?;

        if inserted == 0 {
            return Err(StoreError::UserExists(username.to_string()));
        }

        info!(username = username, "Registered user");
        Ok(())
    }

    /// Look up the stored password hash for a user.
    pub async fn password_hash(&self, username: &str) -> Result<Option<String>, StoreError> {
        let name = username.to_string();
        self.read(move |conn| {
            conn.query_row(
                "SELECT password_hash FROM users WHERE username = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }

    /// Whether a user with this name exists.
    pub async fn user_exists(&self, username: &str) -> Result<bool, StoreError> {
        let name = username.to_string();
        self.read(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                params![name],
                |row| row.get(0),
            )
        })
        .await
    }
}
