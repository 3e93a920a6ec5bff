//! Error types for the archiver core
//!
//! Two families of failure exist and they never mix:
//!
//! - [`ConfigError`]: raised while an archiver is being assembled (missing
//!   executables, malformed destination, broken mapping file, failed
//!   connectivity probe). An archiver is never handed out in this state.
//! - [`Error`]: a failure reported by a collaborator at run time (metadata
//!   lookups, filesystem I/O). The orchestrator turns these into per-dataset
//!   error statuses instead of propagating them across a batch.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors detected at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configured executable does not exist or is not a regular file
    #[error("{name} executable '{}' does not exist or is not a file", .path.display())]
    MissingExecutable {
        /// Logical name of the executable (rsync, ssh, find)
        name: &'static str,
        /// Configured path
        path: PathBuf,
    },

    /// A required executable was not configured at all
    #[error("no {0} executable configured, but the destination requires one")]
    ExecutableNotConfigured(&'static str),

    /// Destination specification could not be parsed
    #[error("invalid destination '{spec}': {reason}")]
    InvalidDestination {
        /// Raw destination string
        spec: String,
        /// Why it was rejected
        reason: String,
    },

    /// Mapping file is missing or malformed
    #[error("mapping file '{}': {reason}", .path.display())]
    MappingFile {
        /// Mapping file path
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },

    /// Archive folder named in a mapping file does not exist
    #[error("archive folder '{}' does not exist or is not a directory", .0.display())]
    MissingArchiveFolder(PathBuf),

    /// Connectivity or credentials probe failed
    #[error("connection check failed: {0}")]
    ConnectionFailed(String),

    /// Share finder policy name is not registered
    #[error("unknown share finder '{0}'")]
    UnknownShareFinder(String),

    /// A configuration value is out of range or has the wrong shape
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue {
        /// Configuration key
        key: String,
        /// Why it was rejected
        reason: String,
    },

    /// Configuration file is not valid TOML or has unknown keys
    #[error("cannot parse configuration: {0}")]
    Parse(String),

    /// Configuration file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::InvalidValue`].
    pub fn invalid_value(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`ConfigError::MappingFile`].
    pub fn mapping(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ConfigError::MappingFile {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Run-time errors reported by collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// Dataset is unknown to the metadata collaborator
    #[error("unknown data set '{0}'")]
    UnknownDataSet(String),

    /// Share is unknown
    #[error("unknown share '{0}'")]
    UnknownShare(String),

    /// Metadata collaborator rejected a request
    #[error("metadata error: {0}")]
    Metadata(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for collaborator calls.
pub type Result<T> = std::result::Result<T, Error>;
