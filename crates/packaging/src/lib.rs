//! Dataset packages
//!
//! A package is one tar, tar+zstd or zip file holding a dataset tree under
//! `<code>/` plus a generated `meta-data.tsv` entry at its root.
//!
//! - [`Packager`]: builds a package from a store directory
//! - [`PackageReader`]: lists, reads and extracts a package
//! - [`PackageFileOperations`]: File Operations Manager storing one package
//!   per dataset in a local destination

#![warn(missing_docs)]

pub mod format;
pub mod metadata;
pub mod operations;
pub mod packager;
pub mod reader;
pub mod writer;

pub use format::{PackageFormat, PackageOptions};
pub use metadata::{metadata_rows, to_tsv, MetadataRow, METADATA_FILE_NAME};
pub use operations::PackageFileOperations;
pub use packager::Packager;
pub use reader::PackageReader;
pub use writer::{create_writer, PackageWriter, TarPackageWriter, ZipPackageWriter};

use thiserror::Error;

/// Errors while building or reading a package.
#[derive(Debug, Error)]
pub enum PackageError {
    /// Filesystem access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip container error
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Directory walk failed
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// zstd stream error
    #[error("compression error: {0}")]
    Compression(String),

    /// Requested entry is not in the package
    #[error("entry '{0}' not found in package")]
    EntryNotFound(String),

    /// Entry name cannot be extracted safely
    #[error("invalid entry name '{0}'")]
    InvalidEntry(String),
}

/// Result type for package operations.
pub type Result<T> = std::result::Result<T, PackageError>;
