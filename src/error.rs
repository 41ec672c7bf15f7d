//! Centralized error types for maildex.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the maildex library.
///
/// An interrupted scan is not an error; it is reported through
/// [`crate::maildir::ScanOutcome::Aborted`].
#[derive(Error, Debug)]
pub enum ScanError {
    /// I/O error with the associated path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The path is neither a Maildir nor an MH folder.
    #[error("Not a Maildir or MH mailbox: {0}")]
    NotAMailbox(PathBuf),

    /// The message header could not be parsed.
    #[error("Invalid message header in '{path}': {reason}")]
    InvalidHeader { path: PathBuf, reason: String },

    /// The `.mh_sequences` file contains a malformed range.
    #[error("Malformed MH sequences file '{path}': {reason}")]
    InvalidSequences { path: PathBuf, reason: String },

    /// The header cache file is corrupt or was written by an incompatible version.
    #[error("Corrupt or incompatible header cache '{path}': {reason}")]
    CacheFormat { path: PathBuf, reason: String },
}

/// Convenience alias for `Result<T, ScanError>`.
pub type Result<T> = std::result::Result<T, ScanError>;

impl ScanError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an `InvalidHeader` variant.
    pub fn invalid_header(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidHeader {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is at hand.
/// Prefer `ScanError::io` wherever the path is known.
impl From<std::io::Error> for ScanError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
