//! Error types for muse
//!
//! Every failure of the cache core is one variant of [`Error`].

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// muse error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Parameters / fingerprinting
    // ========================================================================
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // ========================================================================
    // Records
    // ========================================================================
    #[error("Invalid detector list: {0}")]
    InvalidDetectorList(String),

    #[error("Cannot change {field} from {current:?} to {attempted:?}: field is immutable")]
    ImmutableField {
        field: &'static str,
        current: String,
        attempted: String,
    },

    // ========================================================================
    // Computation
    // ========================================================================
    #[error("Computation failed for {unit}: {message}")]
    Computation { unit: String, message: String },

    // ========================================================================
    // Collection management
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    #[error("{name} is still referenced by {by}")]
    InUse { name: String, by: String },

    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether re-issuing the same request can succeed
    ///
    /// Only computation failures qualify; every other variant is a
    /// deterministic rejection of the input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Computation { .. })
    }

    /// Whether the message is meant to be shown to the user as-is
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::InvalidParameter(_)
                | Error::InvalidDetectorList(_)
                | Error::ImmutableField { .. }
                | Error::Computation { .. }
                | Error::NotFound(_)
                | Error::DuplicateName(_)
                | Error::InUse { .. }
        )
    }

    /// Computation error helper
    pub fn computation(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Computation {
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// Immutable field error helper
    pub fn immutable(
        field: &'static str,
        current: impl Into<String>,
        attempted: impl Into<String>,
    ) -> Self {
        Error::ImmutableField {
            field,
            current: current.into(),
            attempted: attempted.into(),
        }
    }
}
