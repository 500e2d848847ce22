//! Error types for watchlog
//!
//! This module provides the error taxonomy for the library:
//! - [`ConfigError`] for startup configuration problems (always fatal)
//! - [`ExtractionError`] for failures while turning one archive into one artifact
//! - Folder watch and plain I/O errors
//!
//! Extraction errors never escape the engine; they are reduced to a logged
//! [`ExtractionOutcome::Failed`](crate::types::ExtractionOutcome::Failed).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for watchlog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for watchlog
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (fatal at startup)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Extraction of a single archive failed
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Folder watching error
    #[error("folder watch error: {0}")]
    FolderWatch(String),
}

/// Configuration errors
///
/// Any of these stops the process before a single directory is watched.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The watch and extract-to lists have different lengths
    #[error("number of watch paths ({watch}) must equal number of extract-to paths ({extract})")]
    CountMismatch {
        /// Number of watch-source directories given
        watch: usize,
        /// Number of output directories given
        extract: usize,
    },

    /// A configured directory is missing or inaccessible
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The offending directory
        path: PathBuf,
        /// Why the directory was rejected
        reason: String,
    },

    /// The same directory appears twice on one side of the mapping
    #[error("directory {path} is configured more than once")]
    DuplicatePath {
        /// The duplicated directory (canonical form)
        path: PathBuf,
    },

    /// The configuration file could not be read or parsed
    #[error("failed to load config file {path}: {reason}")]
    Parse {
        /// Path of the configuration file
        path: PathBuf,
        /// Parser or I/O message
        reason: String,
    },

    /// A setting has an unusable value
    #[error("invalid value for `{key}`: {message}")]
    Invalid {
        /// The configuration key (e.g., "temp_suffix")
        key: String,
        /// Human-readable description of the problem
        message: String,
    },
}

/// Errors raised while extracting one archive
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The input could not be opened or parsed as an archive
    #[error("cannot read archive {archive}: {reason}")]
    ArchiveRead {
        /// The archive that failed to read
        archive: PathBuf,
        /// The reason reading failed
        reason: String,
    },

    /// Writing the temporary output failed
    #[error("failed to write {path}: {source}")]
    WriteFailed {
        /// The temporary (or target) file being written
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Forcing the temporary output to durable storage failed
    #[error("failed to sync {path} to disk: {source}")]
    SyncFailed {
        /// The temporary file being synced
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The atomic rename into the final name failed
    #[error("failed to rename {source_path} to {dest_path}: {source}")]
    RenameFailed {
        /// The temporary file
        source_path: PathBuf,
        /// The final output path
        dest_path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

impl ExtractionError {
    /// Whether the failure happened before any output was produced
    /// (the archive itself is unusable)
    pub fn is_archive_error(&self) -> bool {
        matches!(self, ExtractionError::ArchiveRead { .. })
    }
}
