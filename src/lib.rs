//! # Coldstore
//!
//! Archival tiering for immutable dataset trees.
//!
//! Datasets live as directory trees on numbered shares of a live store.
//! Coldstore copies them to an archive destination (a local directory, an ssh
//! host or an rsync module), verifies the copy, and restores them on demand
//! into a share with enough free space.
//!
//! ## Quick Start
//!
//! ```no_run
//! use coldstore::prelude::*;
//! use std::sync::Arc;
//!
//! coldstore::logging::init("info");
//!
//! let metadata = Arc::new(InMemoryMetadataService::new("/data/store"));
//! let shares = Arc::new(DirectoryShareProvider::new("/data/store"));
//! let config = ArchiverConfig::load("/etc/coldstore.toml".as_ref())?;
//! let archiver = Archiver::from_config(config, metadata, shares)?;
//!
//! let ds = DatasetDescriptor::new("ds1", "a/b/ds1").with_share_id("1");
//! let result = archiver.archive(&[ds], true);
//! for status in result.error_statuses() {
//!     eprintln!("{}", status);
//! }
//! # Ok::<(), coldstore::Error>(())
//! ```
//!
//! ## Crates
//!
//! - [`coldstore_core`]: dataset descriptors, statuses, shares and the metadata seam
//! - [`coldstore_hierarchy`]: directory snapshots and the hierarchy comparator
//! - [`coldstore_routing`]: destination router, mapping file and share finders
//! - [`coldstore_transfer`]: file operations managers for plain copies
//! - [`coldstore_packaging`]: zip and tar packages, one per dataset
//! - [`coldstore_engine`]: the archiver orchestrator and its configuration

#![warn(missing_docs)]

mod error;

pub mod logging;
pub mod prelude;

pub use error::{Error, Result};

pub use coldstore_core;
pub use coldstore_engine;
pub use coldstore_hierarchy;
pub use coldstore_packaging;
pub use coldstore_routing;
pub use coldstore_transfer;

pub use coldstore_engine::{Archiver, ArchiverConfig};
