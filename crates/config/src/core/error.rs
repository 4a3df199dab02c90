//! Configuration error types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration error type
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigError {
    /// An argument was structurally invalid (empty section name, empty
    /// switch list, malformed registry root, ...).
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong with the argument
        message: String,
    },

    /// A stored string could not be converted to or from the requested type.
    #[error("failed to convert `{value}` to {target}: {message}")]
    Conversion {
        /// The raw string value that failed to convert
        value: String,
        /// Name of the requested type
        target: String,
        /// The underlying cause
        message: String,
    },

    /// Malformed input encountered while parsing a serialized section set.
    /// The load aborts; no partial section set is produced.
    #[error("malformed configuration{}: {message}", fmt_line(.line))]
    Format {
        /// One-based line number, when the format is line-oriented
        line: Option<usize>,
        /// What the parser objected to
        message: String,
    },

    /// The operation is not implemented by the backing driver.
    #[error("operation not supported by this source: {operation}")]
    Unsupported {
        /// The operation that was attempted
        operation: String,
    },

    /// Required configuration is missing or misused (no file path bound
    /// before save, placeholder encryption key, ...).
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the misconfiguration
        message: String,
    },

    /// Reading from the backing medium failed.
    #[error("failed to read {path}: {message}")]
    FileRead {
        /// Path that could not be read
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Writing to the backing medium failed.
    #[error("failed to write {path}: {message}")]
    FileWrite {
        /// Path that could not be written
        path: PathBuf,
        /// Error message
        message: String,
    },
}

fn fmt_line(line: &Option<usize>) -> String {
    match line {
        Some(line) => format!(" at line {line}"),
        None => String::new(),
    }
}

impl ConfigError {
    /// Create an invalid-argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a conversion error naming the offending type
    pub fn conversion(
        value: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Conversion {
            value: value.into(),
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create a format error without position information
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            line: None,
            message: message.into(),
        }
    }

    /// Create a format error citing a one-based line number
    pub fn format_at(line: usize, message: impl Into<String>) -> Self {
        Self::Format {
            line: Some(line),
            message: message.into(),
        }
    }

    /// Create an unsupported-operation error
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a file read error
    pub fn file_read(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FileRead {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file write error
    pub fn file_write(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FileWrite {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether the error came from parsing rather than from the caller or
    /// the backing medium.
    pub fn is_format(&self) -> bool {
        matches!(self, ConfigError::Format { .. })
    }

    /// Whether the error signals an unimplemented driver operation.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, ConfigError::Unsupported { .. })
    }
}
