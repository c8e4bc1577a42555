use core::result::Result as CoreResult;
use std::io::Error as IoError;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlDeError;
use toml::ser::Error as TomlSerError;

use crate::task::Phase;
use crate::types::truncate_chars;

/// Result type for engine operations.
pub type Result<T> = CoreResult<T, EngineError>;

/// Maximum number of characters of validation output rendered in error messages.
const DISPLAY_OUTPUT_CHARS: usize = 1000;

/// Errors that can escape the execution engine.
///
/// Pauses and classified terminal failures are returned as values, so this enum only
/// covers the cases a caller has to clean up after.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] TomlDeError),

    /// TOML serialization failed.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] TomlSerError),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An external capability call failed.
    #[error("{capability} failed: {message}")]
    Capability {
        /// Name of the capability that failed
        capability: &'static str,
        /// Failure description reported by the capability
        message: String,
    },

    /// Every build attempt failed validation.
    #[error("Validation failed after {attempts} attempts: {}", truncate_for_display(.output))]
    ValidationExhausted {
        /// Number of attempts consumed
        attempts: u32,
        /// Raw output of the last validation run
        output: String,
    },

    /// Another task holds the repository lock.
    #[error("Repository {owner}/{name} is locked by another task")]
    RepoLocked {
        /// Repository owner
        owner: String,
        /// Repository name
        name: String,
    },

    /// A phase change tried to move backwards or leave a terminal phase.
    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition {
        /// Phase the task was in
        from: Phase,
        /// Phase that was requested
        to: Phase,
    },

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Shorthand for a failed capability call.
    pub fn capability(capability: &'static str, message: impl Into<String>) -> Self {
        Self::Capability {
            capability,
            message: message.into(),
        }
    }

    /// Determines whether this error may succeed if retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Capability { .. })
    }

    /// Checks if this error is the exhausted-retry failure.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::ValidationExhausted { .. })
    }
}

fn truncate_for_display(output: &str) -> String {
    truncate_chars(output, DISPLAY_OUTPUT_CHARS)
}
