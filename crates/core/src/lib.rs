//! Core types and contracts for coldstore
//!
//! This crate defines the shared vocabulary of the archiver:
//! - Dataset identity ([`DatasetDescriptor`]) and descriptive records
//! - Operation status values ([`ArchiveStatus`], [`BooleanStatus`], [`ProcessingStatus`])
//! - The metadata collaborator contract ([`MetadataService`])
//! - The per-dataset lock table ([`LockTable`])
//! - Live shares and free space queries ([`Share`], [`ShareProvider`])
//! - Error types ([`ConfigError`], [`Error`])

#![warn(missing_docs)]

pub mod error;
pub mod lock;
pub mod metadata;
pub mod share;
pub mod status;
pub mod types;

pub use error::{ConfigError, Error, Result};
pub use lock::LockTable;
pub use metadata::{DeletionRequest, InMemoryMetadataService, MetadataService, StatusUpdate};
pub use share::{
    DirectoryShareProvider, FixedFreeSpace, FreeSpaceProvider, Share, ShareProvider,
    StaticShareProvider, StatvfsFreeSpace,
};
pub use status::{ArchiveStatus, BooleanStatus, ProcessingStatus};
pub use types::{ArchivingStatus, DatasetDescriptor, DatasetRecord, ExperimentRecord, SampleRecord};
