//! Error types for the goup CLI.
//!
//! Every pipeline stage returns a `GoupError` so the installer can single out
//! the one recoverable case (`NotInstalled`) and `main` can map the rest to
//! distinct exit codes.

use std::path::PathBuf;
use thiserror::Error;

/// Consolidated error type for goup operations.
#[derive(Debug, Error)]
pub enum GoupError {
    /// The request could not be built or the transport failed.
    #[error("network error: {message}")]
    Network {
        /// What was being fetched.
        message: String,
        /// The underlying transport error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The server answered with a non-success status.
    #[error("HTTP error {status}: {url}")]
    HttpStatus {
        /// The requested URL.
        url: String,
        /// The numeric status code.
        status: u16,
    },

    /// The expected marker was absent from the fetched content.
    #[error("not found: {message}")]
    NotFound {
        /// Description of what was missing.
        message: String,
    },

    /// No local installation (the version file does not exist).
    #[error("Go installation not found: {}", path.display())]
    NotInstalled {
        /// The version file that was probed.
        path: PathBuf,
    },

    /// A version string did not have the `go<major>.<minor>.<patch>` shape.
    #[error("parse error: {message}")]
    Parse {
        /// Description of the parse failure.
        message: String,
    },

    /// Filesystem read, write, open or remove failure.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O operation that failed.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed compressed stream, archive or feed document.
    #[error("format error: {message}")]
    Format {
        /// Description of the malformed input.
        message: String,
    },

    /// Invalid configuration file or value.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },
}

impl GoupError {
    /// Creates a new `Network` error without a source.
    #[cfg(test)]
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new `Network` error wrapping the transport error.
    #[must_use]
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new `HttpStatus` error.
    #[must_use]
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new `NotInstalled` error.
    #[must_use]
    pub fn not_installed(path: impl Into<PathBuf>) -> Self {
        Self::NotInstalled { path: path.into() }
    }

    /// Creates a new `Parse` error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Creates a new `Io` error from an I/O error with context.
    #[must_use]
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Creates a new `Format` error.
    #[must_use]
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Creates a new `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Process exit code reported for this error kind.
    ///
    /// Code 2 is left to clap for usage errors.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Network { .. } => 3,
            Self::HttpStatus { .. } => 4,
            Self::NotFound { .. } => 5,
            Self::Parse { .. } => 6,
            Self::Io { .. } => 7,
            Self::Format { .. } => 8,
            Self::Config { .. } => 9,
            Self::NotInstalled { .. } => 10,
        }
    }
}
