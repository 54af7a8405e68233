//! Error types for manifest-dl
//!
//! A single error enum covers the whole pipeline:
//! - Configuration and manifest loading failures (fatal to the run)
//! - Per-attempt fetch and write failures (recorded on the task's outcome)
//! - Shutdown in progress

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for manifest-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for manifest-dl
///
/// Variants that describe a single attempt (network, status, write) never abort a run on
/// their own; the worker folds them into a failed [`DownloadOutcome`](crate::DownloadOutcome).
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// A manifest path given on the command line does not exist
    #[error("{} not found.", .0.display())]
    ManifestNotFound(PathBuf),

    /// None of the requested manifests could be resolved
    #[error("no manifest files could be loaded")]
    NoManifests,

    /// A manifest exists but is not valid JSON
    #[error("invalid manifest {}: {source}", path.display())]
    Manifest {
        /// Manifest path
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error (connect failure, timeout, body read failure)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP status {status} for url ({url})")]
    HttpStatus {
        /// Status code returned by the server
        status: u16,
        /// Final URL after redirects
        url: String,
    },

    /// The task URL could not be parsed
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl {
        /// URL as it appeared in the manifest
        url: String,
        /// Parser message
        reason: String,
    },

    /// Writing the response body to disk failed
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Shutdown in progress - no further attempts are started
    #[error("shutdown in progress")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific setting
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_not_found_matches_console_wording() {
        let err = Error::ManifestNotFound(PathBuf::from("train.json"));
        assert_eq!(err.to_string(), "train.json not found.");
    }

    #[test]
    fn http_status_mentions_code_and_url() {
        let err = Error::HttpStatus {
            status: 404,
            url: "https://images.example.com/a.jpg".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("404"), "got: {msg}");
        assert!(msg.contains("https://images.example.com/a.jpg"), "got: {msg}");
    }

    #[test]
    fn config_helper_records_key() {
        match Error::config("concurrency", "must be at least 1") {
            Error::Config { message, key } => {
                assert_eq!(message, "must be at least 1");
                assert_eq!(key.as_deref(), Some("concurrency"));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn write_error_keeps_source() {
        use std::error::Error as _;

        let err = Error::Write {
            path: PathBuf::from("/tmp/x.jpg"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("/tmp/x.jpg"));
    }
}
