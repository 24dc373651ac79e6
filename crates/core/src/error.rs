//! Error types shared across the cache workspace

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for cache operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error during cache operations
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(protogen::cache::io),
        help("Check file permissions and ensure the cache root is writable")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "rename")
        operation: String,
    },

    /// A declared input file could not be read during key generation
    #[error("Input unavailable: {}", path.display())]
    #[diagnostic(
        code(protogen::cache::input_unavailable),
        help("Every schema file declared as a cache input must exist and be readable")
    )]
    InputUnavailable {
        /// The declared input path that could not be read
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A fingerprint that fails validation was passed to a store API
    #[error("Invalid cache key: {key:?}")]
    #[diagnostic(
        code(protogen::cache::invalid_key),
        help("Cache keys are produced by the key generator; passing anything else is a bug in the caller")
    )]
    InvalidKey {
        /// The rejected key
        key: String,
    },

    /// Configuration or validation error
    #[error("Cache configuration error: {message}")]
    #[diagnostic(code(protogen::cache::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(code(protogen::cache::serialization))]
    Serialization {
        /// Error message describing the serialization issue
        message: String,
    },

    /// Remote cache backend failure
    #[error("Remote cache error: {message}")]
    #[diagnostic(
        code(protogen::cache::remote),
        help("Remote failures are downgraded to cache misses by the coordinator")
    )]
    Remote {
        /// Error message from the backend
        message: String,
    },
}

impl Error {
    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create an input-unavailable error for a declared schema input
    #[must_use]
    pub fn input_unavailable(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::InputUnavailable {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid-key error
    #[must_use]
    pub fn invalid_key(key: impl Into<String>) -> Self {
        Self::InvalidKey { key: key.into() }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create a remote backend error
    #[must_use]
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote {
            message: msg.into(),
        }
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, Error>;
