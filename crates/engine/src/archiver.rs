//! Archiver orchestrator
//!
//! Entry point for archiving, unarchiving and deleting batches of datasets.
//! Every dataset goes through the same sequence:
//!
//! 1. take the per-dataset lock
//! 2. resolve the destination and transfer (or retrieve) the tree
//! 3. verify the archived copy against the store (archive only)
//! 4. record share id, size and archiving status
//! 5. release the lock, whatever happened
//!
//! A failure only ever affects its own dataset. Batch calls always return a
//! [`ProcessingStatus`] with one entry per requested dataset.

use crate::config::ArchiverConfig;
use crate::pool::run_bounded;
use coldstore_core::{
    ArchiveStatus, ArchivingStatus, BooleanStatus, ConfigError, DatasetDescriptor,
    MetadataService, ProcessingStatus, Share, ShareProvider,
};
use coldstore_hierarchy::{
    compare, directory_size, snapshot_directory, ChecksumMode, ChecksumPolicy,
};
use coldstore_packaging::PackageFileOperations;
use coldstore_routing::{DestinationRouter, ShareFinder, ShareFinderContext, ShareFinderRegistry};
use coldstore_transfer::{create_file_operations, Destination, FileOperations, TransferSettings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Retries requested when scheduling deletion of live copies.
pub const DELETION_MAX_RETRIES: u32 = 6;

/// Seconds between deletion retries.
pub const DELETION_RETRY_INTERVAL_SECS: u64 = 10;

/// Holds the per-dataset lock until dropped.
struct DatasetLock<'a> {
    metadata: &'a dyn MetadataService,
    code: &'a str,
}

impl<'a> DatasetLock<'a> {
    fn acquire(metadata: &'a dyn MetadataService, code: &'a str) -> Self {
        metadata.lock(code);
        DatasetLock { metadata, code }
    }
}

impl Drop for DatasetLock<'_> {
    fn drop(&mut self) {
        self.metadata.release_lock(self.code);
    }
}

/// Archives, restores and deletes datasets.
pub struct Archiver {
    config: ArchiverConfig,
    metadata: Arc<dyn MetadataService>,
    shares: Arc<dyn ShareProvider>,
    router: Arc<DestinationRouter>,
    file_operations: Arc<dyn FileOperations>,
    share_finder: Box<dyn ShareFinder>,
}

impl std::fmt::Debug for Archiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archiver")
            .field("destination", &self.config.destination)
            .field("packaged", &self.config.package.is_some())
            .finish()
    }
}

impl Archiver {
    /// Assemble an archiver with the built-in share finder policies.
    pub fn from_config(
        config: ArchiverConfig,
        metadata: Arc<dyn MetadataService>,
        shares: Arc<dyn ShareProvider>,
    ) -> Result<Self, ConfigError> {
        Self::from_config_with_registry(config, metadata, shares, &ShareFinderRegistry::default())
    }

    /// Assemble an archiver, looking up the share finder in `registry`.
    ///
    /// All validation happens here: destination, executables, connectivity
    /// probes, mapping file and share finder.
    pub fn from_config_with_registry(
        config: ArchiverConfig,
        metadata: Arc<dyn MetadataService>,
        shares: Arc<dyn ShareProvider>,
        registry: &ShareFinderRegistry,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let destination = Destination::parse(&config.destination)?;
        let router = Arc::new(
            DestinationRouter::load(config.mapping_file.as_deref(), config.create_archives)?
                .with_small_dataset_size_limit(config.small_dataset_size_limit),
        );

        let file_operations: Arc<dyn FileOperations> = match config.package_options()? {
            Some(options) => match &destination {
                Destination::Local(root) => Arc::new(
                    PackageFileOperations::new(
                        root,
                        Arc::clone(&router),
                        options,
                        Arc::clone(&metadata),
                    )?
                    .with_ignore_existing(config.ignore_existing),
                ),
                other => {
                    return Err(ConfigError::InvalidDestination {
                        spec: other.to_string(),
                        reason: "packages can only be written to a local destination".to_string(),
                    })
                }
            },
            None => {
                if config.ignore_existing {
                    debug!("ignore_existing only applies to packages; plain copies always update");
                }
                let settings = TransferSettings {
                    destination,
                    rsync: config.executables.rsync.clone(),
                    ssh: config.executables.ssh.clone(),
                    find: config.executables.find.clone(),
                    password_file: config.rsync_password_file.clone(),
                    timeout: config.timeout(),
                };
                create_file_operations(&settings, Arc::clone(&router))?
            }
        };

        let context = ShareFinderContext {
            params: config.share_finder.params.clone(),
            router: Arc::clone(&router),
        };
        let share_finder = registry.create(&config.share_finder.kind, &context)?;

        info!(
            destination = %config.destination,
            packaged = config.package.is_some(),
            share_finder = %config.share_finder.kind,
            "Archiver configured"
        );
        Ok(Archiver {
            config,
            metadata,
            shares,
            router,
            file_operations,
            share_finder,
        })
    }

    /// Replace the file operations manager, keeping everything else.
    pub fn with_file_operations(mut self, file_operations: Arc<dyn FileOperations>) -> Self {
        self.file_operations = file_operations;
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &ArchiverConfig {
        &self.config
    }

    /// Router in use.
    pub fn router(&self) -> &DestinationRouter {
        &self.router
    }

    /// File operations manager in use.
    pub fn file_operations(&self) -> &Arc<dyn FileOperations> {
        &self.file_operations
    }

    // ========================================================================
    // Archive
    // ========================================================================

    /// Copy `datasets` to the archive.
    ///
    /// With `remove_from_store` successful datasets become `ARCHIVED` and
    /// deletion of their live copies is scheduled; otherwise they stay
    /// `AVAILABLE`. Either way they are marked present in the archive.
    pub fn archive(
        &self,
        datasets: &[DatasetDescriptor],
        remove_from_store: bool,
    ) -> ProcessingStatus {
        info!(
            "Archiving of the following datasets has been requested: [{}]",
            describe(datasets)
        );
        let statuses = run_bounded(datasets, self.config.max_parallelism, |dataset| {
            self.archive_one(dataset, remove_from_store)
        });
        collect(datasets, statuses, "Archiving")
    }

    fn archive_one(&self, dataset: &DatasetDescriptor, remove_from_store: bool) -> ArchiveStatus {
        let _lock = DatasetLock::acquire(self.metadata.as_ref(), &dataset.code);
        let status = self.transfer_to_archive(dataset);
        let recorded = if status.is_error() {
            self.metadata
                .update_status(&[dataset.code.clone()], ArchivingStatus::Available, false)
        } else if remove_from_store {
            self.metadata
                .update_status(&[dataset.code.clone()], ArchivingStatus::Archived, true)
                .and_then(|_| {
                    self.metadata.schedule_deletion_of_datasets(
                        &[dataset.code.clone()],
                        DELETION_MAX_RETRIES,
                        DELETION_RETRY_INTERVAL_SECS,
                    )
                })
        } else {
            self.metadata
                .update_status(&[dataset.code.clone()], ArchivingStatus::Available, true)
        };
        match recorded {
            Ok(()) => status,
            Err(e) if status.is_error() => {
                warn!(code = %dataset.code, error = %e, "Cannot record failed archiving");
                status
            }
            Err(e) => ArchiveStatus::error(format!(
                "updating the status of data set '{}' failed: {}",
                dataset.code, e
            )),
        }
    }

    fn transfer_to_archive(&self, dataset: &DatasetDescriptor) -> ArchiveStatus {
        let share_id = match self.metadata.share_id(&dataset.code) {
            Ok(share_id) => share_id,
            Err(e) => return ArchiveStatus::error(e.to_string()),
        };
        let source = match self.metadata.dataset_directory(&share_id, &dataset.location) {
            Ok(source) => source,
            Err(e) => return ArchiveStatus::error(e.to_string()),
        };
        if !source.exists() {
            return ArchiveStatus::error(format!(
                "data set directory '{}' does not exist",
                source.display()
            ));
        }

        let mut dataset = dataset.clone();
        dataset.share_id = share_id;
        if dataset.size.is_none() {
            let size = match directory_size(&source) {
                Ok(size) => size,
                Err(e) => {
                    return ArchiveStatus::error(format!(
                        "cannot determine the size of '{}': {}",
                        source.display(),
                        e
                    ))
                }
            };
            if let Err(e) =
                self.metadata
                    .update_share_id_and_size(&dataset.code, &dataset.share_id, size)
            {
                return ArchiveStatus::error(e.to_string());
            }
            debug!(code = %dataset.code, size, "Recorded computed size");
            dataset.size = Some(size);
        }

        let in_sync = self.config.synchronize_archive
            && self
                .file_operations
                .is_synchronized_with_destination(&source, &dataset)
                .is_true();
        if in_sync {
            debug!(code = %dataset.code, "Already synchronized with the archive, copy skipped");
        } else {
            let status = self.file_operations.copy_to_destination(&source, &dataset);
            if status.is_error() {
                return status;
            }
        }

        if self.config.verify_after_archive {
            return self.verify(&source, &dataset);
        }
        ArchiveStatus::Ok
    }

    fn verify(&self, source: &Path, dataset: &DatasetDescriptor) -> ArchiveStatus {
        let store = match snapshot_directory(source, ChecksumMode::Compute) {
            Ok(store) => store,
            Err(e) => {
                return ArchiveStatus::error(format!(
                    "cannot read '{}' for verification: {}",
                    source.display(),
                    e
                ))
            }
        };
        let archived = match self.file_operations.archived_hierarchy(dataset) {
            Ok(archived) => archived,
            Err(e) => return ArchiveStatus::Error(e),
        };
        match archived.dataset_node() {
            Some(node) => compare(&store, &archived.store_prefix, node, ChecksumPolicy::Verify),
            None => ArchiveStatus::error(format!(
                "data set '{}' is missing in '{}'",
                dataset.code,
                self.file_operations.archived_location(dataset)
            )),
        }
    }

    // ========================================================================
    // Unarchive
    // ========================================================================

    /// Restore `datasets` from the archive into live shares.
    pub fn unarchive(&self, datasets: &[DatasetDescriptor]) -> ProcessingStatus {
        info!(
            "Unarchiving of the following datasets has been requested: [{}]",
            describe(datasets)
        );
        let started = Instant::now();
        let shares = match self.shares.shares() {
            Ok(shares) => shares,
            Err(e) => {
                let message = format!("cannot enumerate shares: {}", e);
                let statuses = datasets
                    .iter()
                    .map(|_| ArchiveStatus::error(message.clone()))
                    .collect();
                return collect(datasets, statuses, "Unarchiving");
            }
        };
        info!(
            "Obtained the list of all datasets in all shares in {:.3} s.",
            started.elapsed().as_secs_f64()
        );

        let statuses = run_bounded(datasets, self.config.max_parallelism, |dataset| {
            self.unarchive_one(dataset, &shares)
        });
        collect(datasets, statuses, "Unarchiving")
    }

    fn unarchive_one(&self, dataset: &DatasetDescriptor, shares: &[Share]) -> ArchiveStatus {
        let _lock = DatasetLock::acquire(self.metadata.as_ref(), &dataset.code);
        let status = self.retrieve_into_share(dataset, shares);
        let recorded = if status.is_error() {
            self.metadata
                .update_status(&[dataset.code.clone()], ArchivingStatus::Archived, true)
        } else {
            self.metadata
                .update_status(&[dataset.code.clone()], ArchivingStatus::Available, true)
        };
        match recorded {
            Ok(()) => status,
            Err(e) if status.is_error() => {
                warn!(code = %dataset.code, error = %e, "Cannot record failed unarchiving");
                status
            }
            Err(e) => ArchiveStatus::error(format!(
                "updating the status of data set '{}' failed: {}",
                dataset.code, e
            )),
        }
    }

    fn retrieve_into_share(&self, dataset: &DatasetDescriptor, shares: &[Share]) -> ArchiveStatus {
        let current_share = match self.metadata.share_id(&dataset.code) {
            Ok(share_id) => share_id,
            Err(e) => return ArchiveStatus::error(e.to_string()),
        };
        let mut dataset = dataset.clone();
        dataset.share_id = current_share;

        match self.metadata.directory_of(&dataset) {
            Ok(current) if current.is_dir() => {
                debug!(code = %dataset.code, path = %current.display(), "Still in the store");
                return ArchiveStatus::Ok;
            }
            Ok(_) => {}
            Err(e) => return ArchiveStatus::error(e.to_string()),
        }

        let share = match self.share_finder.try_to_find_share(&dataset, shares) {
            Some(share) => share,
            None => {
                return ArchiveStatus::error(format!(
                    "Unarchiving of data set '{}' has failed, because no appropriate \
                     destination share was found. Most probably there is not enough \
                     free space in the data store.",
                    dataset.code
                ))
            }
        };
        let target: PathBuf = match self
            .metadata
            .dataset_directory(share.id(), &dataset.location)
        {
            Ok(target) => target,
            Err(e) => return ArchiveStatus::error(e.to_string()),
        };
        debug!(code = %dataset.code, share = share.id(), target = %target.display(), "Unarchiving");

        let status = self
            .file_operations
            .retrieve_from_destination(&target, &dataset);
        if status.is_error() {
            return status;
        }
        if share.id() != dataset.share_id {
            if let Err(e) = self.metadata.set_share_id(&dataset.code, share.id()) {
                return ArchiveStatus::error(e.to_string());
            }
        }
        status
    }

    // ========================================================================
    // Delete and container expansion
    // ========================================================================

    /// Remove (or mark as deleted) the archived copies of `datasets`.
    pub fn delete_from_archive(&self, datasets: &[DatasetDescriptor]) -> ProcessingStatus {
        let statuses = run_bounded(datasets, self.config.max_parallelism, |dataset| {
            if self.config.only_mark_as_deleted {
                self.file_operations.mark_as_deleted(dataset)
            } else {
                self.file_operations.delete_from_destination(dataset)
            }
        });
        collect(datasets, statuses, "Deleting from archive")
    }

    /// Codes to unarchive so that `codes` become available.
    ///
    /// Datasets stored together in one container are unarchived together.
    /// The result keeps first-seen order and has no duplicates.
    pub fn dataset_codes_for_unarchiving(
        &self,
        codes: &[String],
    ) -> coldstore_core::Result<Vec<String>> {
        let mut result: Vec<String> = Vec::with_capacity(codes.len());
        for code in codes {
            for member in self.metadata.container_members(code)? {
                if !result.contains(&member) {
                    result.push(member);
                }
            }
        }
        Ok(result)
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Whether an archived copy of `dataset` exists.
    pub fn is_present_in_archive(&self, dataset: &DatasetDescriptor) -> BooleanStatus {
        self.file_operations.is_present_in_destination(dataset)
    }

    /// Compare the live copy of `dataset` with its archived copy.
    pub fn is_synchronized_with_archive(&self, dataset: &DatasetDescriptor) -> BooleanStatus {
        match self.metadata.directory_of(dataset) {
            Ok(source) => self
                .file_operations
                .is_synchronized_with_destination(&source, dataset),
            Err(e) => BooleanStatus::Error(e.to_string()),
        }
    }
}

fn describe(datasets: &[DatasetDescriptor]) -> String {
    datasets
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn collect(
    datasets: &[DatasetDescriptor],
    statuses: Vec<ArchiveStatus>,
    operation: &str,
) -> ProcessingStatus {
    let mut processing = ProcessingStatus::new();
    for (dataset, status) in datasets.iter().zip(statuses) {
        if status.is_error() {
            error!(
                "{} for dataset {} finished with the status: {}.",
                operation, dataset.code, status
            );
        }
        processing.add(dataset.code.clone(), status);
    }
    processing
}
