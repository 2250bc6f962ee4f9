use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rusqlite::ErrorCode;
use tokio_rusqlite::Connection;
use tracing::{debug, warn};

use super::schema::SCHEMA;
use crate::error::StoreError;

/// Number of attempts a write gets when SQLite reports busy/locked.
pub const WRITE_ATTEMPTS: u32 = 5;

/// Base delay between write attempts; attempt `n` waits `n * RETRY_BACKOFF`.
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// How long SQLite itself waits on a lock before reporting busy.
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle to the facematch database.
///
/// Cloning is cheap: every clone talks to the same connection thread. Each
/// read or write is a single scoped call on that thread, so nothing is held
/// across requests.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) a database file and make sure the schema exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).await?;
        Self::init(conn).await
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        debug!("Database schema ready");

        Ok(Self { conn })
    }

    /// Run a read-only query on the connection thread.
    pub(crate) async fn read<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.conn
            .call(move |conn| f(conn).map_err(tokio_rusqlite::Error::from))
            .await
            .map_err(StoreError::from)
    }

    /// Run `f` inside a transaction and commit it.
    ///
    /// Busy/locked failures roll the transaction back and try again with a
    /// linear backoff; any other error is returned immediately.
    pub(crate) async fn write<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: Fn(&rusqlite::Connection) -> rusqlite::Result<R> + Send + Sync + 'static,
        R: Send + 'static,
    {
        let f = Arc::new(f);

        for attempt in 1..=WRITE_ATTEMPTS {
            let f = Arc::clone(&f);
            let result = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let value = (*f)(&tx)?;
                    tx.commit()?;
                    Ok(value)
                })
                .await;

            match result {
                Ok(value) => return Ok(value),
                Err(err) if is_busy(&err) => {
                    warn!(attempt, "Database busy, retrying write: {}", err);
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(StoreError::Busy {
            attempts: WRITE_ATTEMPTS,
        })
    }
}

/// Whether an error is SQLite reporting a lock conflict.
fn is_busy(err: &tokio_rusqlite::Error) -> bool {
    match err {
        tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _)) => {
            matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        }
        _ => false,
    }
}
