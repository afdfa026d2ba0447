//! The reconciliation store.
//!
//! `TrackerStore` wraps `TrackerDb` (raw database access) and is the only
//! writer to the tracker database. All repo methods are implemented as
//! `impl TrackerStore` in [`crate::repos`].

use tracker_config::DatabaseConfig;

use crate::TrackerDb;
use crate::error::DatabaseError;
use crate::retry::{RetryConfig, with_retry};

pub struct TrackerStore {
    db: TrackerDb,
}

impl TrackerStore {
    /// Open a store on a local database file, or `":memory:"` for tests.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or migrated.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        Ok(Self {
            db: TrackerDb::open_local(path).await?,
        })
    }

    /// Connect as configured, retrying up to `connect_attempts` times.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        Self::connect_with(config, &RetryConfig::attempts(config.connect_attempts)).await
    }

    /// [`Self::connect`] with an explicit retry policy.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt.
    pub async fn connect_with(
        config: &DatabaseConfig,
        retry: &RetryConfig,
    ) -> Result<Self, DatabaseError> {
        let db = with_retry(retry, |attempt| async move {
            tracing::debug!(attempt, remote = config.is_remote(), "opening tracker database");
            if config.is_remote() {
                TrackerDb::open_remote(&config.url, &config.password).await
            } else {
                TrackerDb::open_local(&config.path).await
            }
        })
        .await?;
        Ok(Self { db })
    }

    #[must_use]
    pub const fn from_db(db: TrackerDb) -> Self {
        Self { db }
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &TrackerDb {
        &self.db
    }

    /// Release the connection. Consumes the store so no call can follow.
    pub fn close(self) {
        tracing::debug!("closing tracker database");
        drop(self.db);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_opens_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.db");
        let config = DatabaseConfig {
            path: path.to_string_lossy().into_owned(),
            ..Default::default()
        };

        let store = TrackerStore::connect_with(&config, &RetryConfig::immediate(2))
            .await
            .unwrap();
        store.close();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn connect_gives_up_on_unopenable_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir
                .path()
                .join("missing")
                .join("nested")
                .join("tracker.db")
                .to_string_lossy()
                .into_owned(),
            ..Default::default()
        };

        let result = TrackerStore::connect_with(&config, &RetryConfig::immediate(2)).await;
        assert!(result.is_err());
    }
}
