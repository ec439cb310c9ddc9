//! Error types for the Lumen shader system
//!
//! This module defines the error types used throughout the crate,
//! covering template loading, compilation, linking, thread affinity and
//! asset lifecycle violations.

use std::fmt;
use crate::gpu::ShaderStage;

/// Result type for Lumen shader operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lumen shader errors
#[derive(Debug, Clone)]
pub enum Error {
    /// One of the paired stage templates (vertex or fragment) is absent
    MissingStage(String),

    /// A template filename does not end with a known stage suffix
    InvalidAssetFilename(String),

    /// The driver rejected the source of one stage
    Compilation {
        /// Stage that failed to compile
        stage: ShaderStage,
        /// Driver diagnostic log
        log: String,
    },

    /// The driver rejected the linkage or validation of a program
    Link {
        /// Driver diagnostic log
        log: String,
    },

    /// The GPU thread could not be reached (or was re-entered)
    ThreadAffinity(String),

    /// Operation on a shader asset that has already been disposed
    UseAfterDispose(String),

    /// File or encoding failure while reading template data
    Io(String),

    /// Backend-specific error (object creation failure, poisoned lock, ...)
    BackendError(String),

    /// Initialization failed (engine, GPU thread, subsystems)
    InitializationFailed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingStage(msg) => write!(f, "Missing shader stage: {}", msg),
            Error::InvalidAssetFilename(name) => write!(f, "Invalid shader filename: {}", name),
            Error::Compilation { stage, log } => {
                write!(f, "Compilation of {} stage failed: {}", stage.name(), log)
            }
            Error::Link { log } => write!(f, "Program link failed: {}", log),
            Error::ThreadAffinity(msg) => write!(f, "GPU thread unavailable: {}", msg),
            Error::UseAfterDispose(urn) => write!(f, "Shader '{}' has been disposed", urn),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
