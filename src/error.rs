//! Centralized error types for mailpart.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailpart library.
///
/// Only the genuinely fatal cases live here. Charset conversion failures,
/// empty multipart splits and (in lenient mode) unparseable dates are
/// recovered where they happen and only logged.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// A non-text part has no usable `Content-Transfer-Encoding` and strict
    /// decoding was requested.
    #[error("Missing Content-Transfer-Encoding header on part {part}; unsure how to decode")]
    MissingEncoding { part: String },

    /// A target directory exists but cannot be written to.
    #[error("Directory exists but is not writable: {0}")]
    DirectoryNotWritable(PathBuf),

    /// A target directory could not be created.
    #[error("Couldn't create directory '{path}': {source}")]
    DirectoryCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The attachment was asked to persist before its id was generated.
    #[error("This attachment has no id")]
    NoIdentity,

    /// The attachment was asked to persist before its path was generated.
    #[error("Attachment '{id}' has no file path")]
    NoPath { id: String },

    /// The message date could not be parsed and strict dates are enabled.
    #[error("Unparsable message date: '{0}'")]
    UnparsableDate(String),

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, DecodeError>`.
pub type Result<T> = std::result::Result<T, DecodeError>;

impl DecodeError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `DecodeError::io`).
impl From<std::io::Error> for DecodeError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
