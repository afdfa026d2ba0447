//! Engine error types and their failure scopes.

use thiserror::Error;

use tracker_config::ConfigError;
use tracker_core::CoreError;
use tracker_db::error::DatabaseError;
use tracker_sources::SourceError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// How far a failure reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    /// Database or service unreachable, or credentials rejected. Ends the run.
    ConnectionFailure,
    /// Request quota exhausted. Ends the current stage only.
    RateLimited,
    /// The service answered, but not with anything usable. Ends the current
    /// stage only.
    Rejected,
    /// Unknown location. Skips one record.
    LookupMiss,
}

impl FailureScope {
    #[must_use]
    pub const fn aborts_run(self) -> bool {
        matches!(self, Self::ConnectionFailure)
    }
}

impl EngineError {
    #[must_use]
    pub fn scope(&self) -> FailureScope {
        match self {
            Self::Source(SourceError::RateLimited { .. }) => FailureScope::RateLimited,
            Self::Source(SourceError::Parse(_)) => FailureScope::Rejected,
            Self::Source(SourceError::Api { status, .. }) if *status < 500 => FailureScope::Rejected,
            Self::Core(CoreError::LocationNotFound { .. }) => FailureScope::LookupMiss,
            Self::Core(CoreError::Validation(_)) => FailureScope::Rejected,
            Self::Source(_) | Self::Database(_) | Self::Config(_) | Self::Core(_) => {
                FailureScope::ConnectionFailure
            }
        }
    }
}
