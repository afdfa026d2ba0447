//! # tracker-db
//!
//! libSQL reconciliation store for the student tracker import.
//!
//! Holds every table the import writes: students, attendance, schedule,
//! courses and their sessions, the location lookup, and the log trail.
//! Upserts are keyed on the scheduling platform's external IDs and compare
//! stored rows field by field, so re-importing an unchanged batch writes
//! nothing.
//!
//! Uses the `libsql` crate (v0.9.29): a local file, `:memory:` for tests, or a
//! remote database authenticated with the database password.

pub mod error;
pub mod helpers;
mod migrations;
pub mod repos;
pub mod retry;
pub mod service;

#[cfg(test)]
mod test_support;

use error::DatabaseError;
use libsql::Builder;

pub use tracker_core::records::UpsertSummary;
pub use retry::{RetryConfig, with_retry};
pub use service::TrackerStore;

/// Raw database handle: one libSQL database and its connection.
pub struct TrackerDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
}

impl TrackerDb {
    /// Open a local database at the given path, or `":memory:"`.
    ///
    /// Runs migrations automatically on open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("{path}: {e}")))?;
        Self::init(db).await
    }

    /// Open a remote database, sending `password` as the auth token.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Connection` if the database is unreachable.
    pub async fn open_remote(url: &str, password: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_remote(url.to_string(), password.to_string())
            .build()
            .await
            .map_err(|e| DatabaseError::Connection(format!("{url}: {e}")))?;
        Self::init(db).await
    }

    async fn init(db: libsql::Database) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        // Enable foreign keys (must be per-connection in SQLite)
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Connection(format!("PRAGMA foreign_keys: {e}")))?;

        let tracker_db = Self { db, conn };
        tracker_db.run_migrations().await?;
        Ok(tracker_db)
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }
}
