//! Error types for modelstore.
//!
//! All errors are strongly typed using thiserror so callers can
//! match on the exact failure instead of parsing messages.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or mutating a model from attribute input.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Field '{field}' is not a valid ISO-8601 timestamp: {value}")]
    InvalidTimestamp {
        field: String,
        value: String,
    },

    #[error("Field '{field}' must be a {expected}")]
    InvalidAttribute {
        field: String,
        expected: &'static str,
    },

    #[error("Attribute name '{name}' is reserved")]
    ReservedAttribute {
        name: String,
    },
}

/// Top-level error type for modelstore.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Malformed input: {0}")]
    Malformed(#[from] ValidationError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot deserialize {}: {message}", .path.display())]
    Deserialization {
        path: PathBuf,
        message: String,
    },

    #[error("Unknown type '{type_tag}' for key '{key}'")]
    UnknownType {
        key: String,
        type_tag: String,
    },

    #[error("Poisoned lock: {context}")]
    LockPoisoned {
        context: &'static str,
    },

    #[error("Invalid storage configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn deserialization(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Deserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns true if this is a malformed-input error.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }

    /// Returns true if this is an I/O error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if the backing file could not be parsed.
    #[must_use]
    pub const fn is_deserialization(&self) -> bool {
        matches!(self, Self::Deserialization { .. })
    }

    /// Returns true if a stored type tag had no registered constructor.
    #[must_use]
    pub const fn is_unknown_type(&self) -> bool {
        matches!(self, Self::UnknownType { .. })
    }
}

/// Result type alias for modelstore operations.
pub type StoreResult<T> = Result<T, StoreError>;
