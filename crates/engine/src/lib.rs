//! Archiver orchestrator for coldstore
//!
//! [`Archiver`] ties the pieces together: it is built from an
//! [`ArchiverConfig`], a [`MetadataService`](coldstore_core::MetadataService)
//! and a [`ShareProvider`](coldstore_core::ShareProvider), validates the whole
//! configuration up front and then processes batches of datasets.
//!
//! # Example
//!
//! ```no_run
//! use coldstore_core::{DatasetDescriptor, DirectoryShareProvider, InMemoryMetadataService};
//! use coldstore_engine::{Archiver, ArchiverConfig};
//! use std::sync::Arc;
//!
//! let metadata = Arc::new(InMemoryMetadataService::new("/data/store"));
//! let shares = Arc::new(DirectoryShareProvider::new("/data/store"));
//! let archiver = Archiver::from_config(ArchiverConfig::new("/data/archive"), metadata, shares)?;
//!
//! let ds = DatasetDescriptor::new("ds1", "a/b/ds1").with_share_id("1");
//! let result = archiver.archive(&[ds], false);
//! assert!(result.error_statuses().is_empty());
//! # Ok::<(), coldstore_core::ConfigError>(())
//! ```

#![warn(missing_docs)]

pub mod archiver;
pub mod config;
pub mod pool;

pub use archiver::{Archiver, DELETION_MAX_RETRIES, DELETION_RETRY_INTERVAL_SECS};
pub use config::{
    ArchiverConfig, ExecutablesConfig, PackageConfig, ShareFinderConfig, DEFAULT_TIMEOUT_SECS,
};
pub use pool::run_bounded;
