//! Unified error type for coldstore.
//!
//! Each crate keeps its own error enum. This module folds them into one type
//! for callers that drive the whole archiver and do not care which layer
//! failed.

use coldstore_core::ConfigError;
use coldstore_hierarchy::HierarchyError;
use coldstore_packaging::PackageError;
use thiserror::Error;

/// All coldstore errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The archiver could not be assembled from its configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The metadata collaborator rejected a request
    #[error("metadata error: {0}")]
    Metadata(String),

    /// A dataset or share is not known
    #[error("not found: {0}")]
    NotFound(String),

    /// A package could not be built or read
    #[error("package error: {0}")]
    Package(#[from] PackageError),

    /// A directory tree could not be listed
    #[error("hierarchy error: {0}")]
    Hierarchy(#[from] HierarchyError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for coldstore operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error happened while assembling the archiver.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Whether this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

// Convert from metadata collaborator errors
impl From<coldstore_core::Error> for Error {
    fn from(e: coldstore_core::Error) -> Self {
        use coldstore_core::Error as CoreError;
        match e {
            CoreError::UnknownDataSet(code) => Error::NotFound(format!("data set '{}'", code)),
            CoreError::UnknownShare(id) => Error::NotFound(format!("share '{}'", id)),
            CoreError::Metadata(msg) => Error::Metadata(msg),
            CoreError::Io(io_err) => Error::Io(io_err),
        }
    }
}
