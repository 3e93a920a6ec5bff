//! Convenient imports for coldstore.
//!
//! ```no_run
//! use coldstore::prelude::*;
//! ```

// Orchestrator
pub use coldstore_engine::{Archiver, ArchiverConfig, PackageConfig};

// Error handling
pub use crate::error::{Error, Result};
pub use coldstore_core::ConfigError;

// Datasets and statuses
pub use coldstore_core::{
    ArchiveStatus, ArchivingStatus, BooleanStatus, DatasetDescriptor, ProcessingStatus,
};

// Collaborators
pub use coldstore_core::{
    DirectoryShareProvider, InMemoryMetadataService, MetadataService, Share, ShareProvider,
};

// Extension points
pub use coldstore_routing::{ShareFinder, ShareFinderRegistry};
pub use coldstore_transfer::FileOperations;
