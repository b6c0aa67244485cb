//! Error types for the sonomap engine.
//!
//! This module provides a unified error type for scene validation, compute
//! dispatch and orchestration. Numerical edge cases (tiny distances, empty
//! sample sets) are not errors: the engine clamps them to finite sentinels.

use thiserror::Error;

/// Error type for sonomap operations.
#[derive(Debug, Error)]
pub enum SonomapError {
    /// A spectrum was built from a slice whose length is not 9.
    ///
    /// This is a contract violation by the caller, never coerced.
    #[error("spectrum must carry exactly {expected} bands, got {actual}")]
    SpectrumLength {
        /// Expected number of bands.
        expected: usize,
        /// Number of bands actually supplied.
        actual: usize,
    },

    /// A scene referenced an entity id that does not exist.
    #[error("unknown entity id: '{id}'")]
    UnknownEntity {
        /// The id that failed to resolve.
        id: String,
    },

    /// The scene failed structural validation (duplicate ids, degenerate
    /// geometry, malformed polygons).
    #[error("invalid scene: {message}")]
    InvalidScene {
        /// Description of the validation failure.
        message: String,
    },

    /// The requested compute backend cannot serve requests.
    #[error("compute backend '{backend}' unavailable: {message}")]
    BackendUnavailable {
        /// Backend identifier, e.g. "gpu".
        backend: String,
        /// Reason the backend cannot be used.
        message: String,
    },

    /// A response arrived after its generation was superseded.
    ///
    /// Stale results are discarded silently by callers, never surfaced
    /// to the user.
    #[error("stale result for {request_key} (generation {generation})")]
    Stale {
        /// The request key the response was issued under.
        request_key: String,
        /// The superseded generation number.
        generation: u64,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for sonomap operations.
pub type Result<T> = std::result::Result<T, SonomapError>;

impl SonomapError {
    /// Returns true if this result is stale and should be discarded
    /// without mutation or user-visible reporting.
    pub fn is_stale(&self) -> bool {
        matches!(self, SonomapError::Stale { .. })
    }

    /// Returns true if this is a scene-construction error that should be
    /// reported to the caller immediately.
    pub fn is_scene_error(&self) -> bool {
        matches!(
            self,
            SonomapError::InvalidScene { .. }
                | SonomapError::UnknownEntity { .. }
                | SonomapError::SpectrumLength { .. }
        )
    }

    /// Returns true if this is a backend capability failure, in which case
    /// the dispatch layer may fall back to another backend.
    pub fn is_backend_error(&self) -> bool {
        matches!(self, SonomapError::BackendUnavailable { .. })
    }
}
