//! Error types shared by the transfer engine.
//!
//! Per-file failures are recorded in [`TransferOutcome`](crate::transfer::TransferOutcome)s
//! and never abort sibling transfers. Everything in [`Error`] that reaches a caller
//! terminates the operation it came from.

use std::io;
use std::path::PathBuf;

use crate::remote::RemoteError;

/// Result alias used throughout the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for transfer and dependency operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed repository/path argument or option value.
    #[error("{0}")]
    Argument(String),

    /// The remote listing call failed.
    #[error("failed to list assets in '{path}' of repository '{repository}': {source}")]
    Listing {
        repository: String,
        path: String,
        #[source]
        source: RemoteError,
    },

    /// Nothing matched; surfaced as its own status code.
    #[error("no assets found in '{path}' in repository '{repository}'")]
    NoAssets { repository: String, path: String },

    /// A single file failed mid-transfer.
    #[error("transfer of {path} failed: {message}")]
    Transfer { path: String, message: String },

    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("dependency '{0}' not found in lock file")]
    MissingLockEntry(String),

    #[error("no {algorithm} checksum available for validation")]
    MissingDigest { algorithm: String },

    #[error("unsupported checksum algorithm '{0}': must be one of: sha1, sha256, sha512, md5")]
    UnsupportedAlgorithm(String),

    #[error("unsupported compression format '{0}': must be one of: gzip, zstd, zip")]
    UnsupportedFormat(String),

    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    /// Archive entry would land outside the extraction directory.
    #[error("illegal file path in archive: {}", .0.display())]
    PathTraversal(PathBuf),

    #[error("{}:{line}: {message}", .path.display())]
    Manifest {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("invalid lock file {}: {message}", .path.display())]
    Lock { path: PathBuf, message: String },

    #[error("invalid configuration {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("I/O error while {operation} {}: {source}", .path.display())]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Wrap an io::Error with the operation and path it came from.
    pub fn io(source: io::Error, operation: &str, path: impl Into<PathBuf>) -> Self {
        Error::Io {
            operation: operation.to_string(),
            path: path.into(),
            source,
        }
    }

    pub fn argument(message: impl Into<String>) -> Self {
        Error::Argument(message.into())
    }
}

// Errors from background tasks that panicked or were cancelled.
impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Io {
            operation: "joining background task".to_string(),
            path: PathBuf::new(),
            source: io::Error::other(err),
        }
    }
}
