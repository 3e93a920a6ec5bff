//! File-tree snapshots and the hierarchy comparator
//!
//! - [`HierarchyNode`]: read-only snapshot of a directory tree
//! - [`snapshot_directory`] / [`parse_find_listing`]: build snapshots from a
//!   local directory or a remote `find` listing
//! - [`compare`]: lock-step comparison reporting the first discrepancy

#![warn(missing_docs)]

pub mod compare;
pub mod node;
pub mod snapshot;

pub use compare::{compare, ChecksumPolicy};
pub use node::{join_relative, HierarchyBuilder, HierarchyNode};
pub use snapshot::{
    crc32_of_file, crc32_of_reader, directory_size, parse_find_listing, snapshot_directory,
    ChecksumMode,
};

use thiserror::Error;

/// Errors while taking a snapshot.
#[derive(Debug, Error)]
pub enum HierarchyError {
    /// Filesystem access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory walk failed
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// A listing line could not be parsed
    #[error("invalid listing line '{0}'")]
    InvalidListing(String),

    /// A path lies outside the snapshot root
    #[error("path '{0}' is outside the snapshot root")]
    OutsideRoot(String),
}

/// Result type for snapshot operations.
pub type Result<T> = std::result::Result<T, HierarchyError>;
