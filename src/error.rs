//! Error types for localcowork-mcp.
//!
//! [`ConfigError`] covers startup configuration. [`ToolError`] is what a tool
//! handler returns: either a domain failure carrying an explicit protocol code
//! (forwarded to the host unchanged) or an internal failure (reported as
//! `INTERNAL_ERROR`).

use std::path::PathBuf;

use thiserror::Error;

use crate::mcp::protocol::ErrorCode;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Failure returned by a tool handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// A deliberate failure with a protocol code the host understands.
    #[error("{message}")]
    Domain {
        /// Protocol error code.
        code: ErrorCode,
        /// Human-readable message.
        message: String,
    },

    /// An unanticipated failure.
    #[error("{0}")]
    Internal(String),
}

impl ToolError {
    /// Creates a domain error with an explicit code.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Domain {
            code,
            message: message.into(),
        }
    }

    /// The argument values are unacceptable to the tool.
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParams, message)
    }

    /// The path is outside the permitted roots.
    #[must_use]
    pub fn sandbox_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SandboxViolation, message)
    }

    /// The referenced path does not exist.
    #[must_use]
    pub fn file_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::FileNotFound, message)
    }

    /// The operating system refused access.
    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    /// An unanticipated failure, described by `err`.
    #[must_use]
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::file_not_found(err.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(err.to_string()),
            _ => Self::internal(err),
        }
    }
}
