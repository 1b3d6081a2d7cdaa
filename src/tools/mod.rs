//! Tool sets for each worker.
//!
//! A worker process serves exactly one tool set, chosen on the command line.
//! Each set is assembled into a [`ToolRegistry`] with the sandbox injected into
//! every tool that touches the file system.

pub mod document;
pub mod security;

use std::fmt;

use thiserror::Error;

use crate::mcp::registry::{RegistryError, ToolRegistry};
use crate::sandbox::Sandbox;

/// The tool sets a worker process can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Worker {
    /// Text extraction, spreadsheets, diffing and format conversion.
    Document,
    /// PII and secret scanning, duplicate detection and cleanup proposals.
    Security,
}

impl Worker {
    /// Name reported in `initialize`, and the prefix of every tool name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Security => "security",
        }
    }
}

impl fmt::Display for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while assembling a worker's tools.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The registry rejected a tool.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A detection pattern failed to compile.
    #[error("invalid detection pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Builds the registry for `worker`.
///
/// # Errors
///
/// Returns an error if two tools share a name or a pattern fails to compile.
pub fn build_registry(worker: Worker, sandbox: &Sandbox) -> Result<ToolRegistry, BuildError> {
    let registry = match worker {
        Worker::Document => document::register(ToolRegistry::builder(), sandbox)?.build()?,
        Worker::Security => security::register(ToolRegistry::builder(), sandbox)?.build()?,
    };
    Ok(registry)
}
