//! Cross-cutting error types for the tracker.
//!
//! Domain-specific errors (`DatabaseError`, `SourceError`, `EngineError`) are
//! defined in their respective crates and converge in the binary via `anyhow`.

use thiserror::Error;

/// Errors that can be raised by any tracker crate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// An external location ID has no internal code in the lookup table.
    #[error("Location not found: external location {location_id} (record {record_id})")]
    LocationNotFound { location_id: i64, record_id: i64 },

    /// A state machine transition was attempted that is not allowed.
    #[error("Invalid state transition: {entity} from {from} to {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    /// Data failed validation (bad window, malformed identifier).
    #[error("Validation error: {0}")]
    Validation(String),
}
