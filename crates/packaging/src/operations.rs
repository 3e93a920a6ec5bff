//! Packaged File Operations Manager
//!
//! Each dataset is stored as one package in a local (or mounted) archive
//! folder:
//! - flat: `<folder>/<code>.<ext>`
//! - sharded: `<folder>/<location>/<code>.<ext>`
//!
//! The folder comes from the router. Soft-delete markers go to
//! `<folder>/DELETED/<code>`.

use crate::format::PackageOptions;
use crate::metadata::{metadata_rows, to_tsv};
use crate::packager::Packager;
use crate::reader::PackageReader;
use coldstore_core::{
    ArchiveStatus, BooleanStatus, ConfigError, DatasetDescriptor, MetadataService,
};
use coldstore_hierarchy::{snapshot_directory, ChecksumMode};
use coldstore_routing::DestinationRouter;
use coldstore_transfer::{compare_listings, listing_of, ArchivedTree, FileOperations, MARKER_FOLDER};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// [`FileOperations`] storing one package per dataset.
pub struct PackageFileOperations {
    root: PathBuf,
    router: Arc<DestinationRouter>,
    packager: Packager,
    metadata: Arc<dyn MetadataService>,
    ignore_existing: bool,
}

impl PackageFileOperations {
    /// Packages written into `root`, which must be an existing directory.
    ///
    /// `metadata` supplies the rows of the generated metadata entry.
    pub fn new(
        root: impl Into<PathBuf>,
        router: Arc<DestinationRouter>,
        options: PackageOptions,
        metadata: Arc<dyn MetadataService>,
    ) -> Result<Self, ConfigError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ConfigError::InvalidDestination {
                spec: root.display().to_string(),
                reason: "destination directory does not exist".to_string(),
            });
        }
        Ok(PackageFileOperations {
            root,
            router,
            packager: Packager::new(options),
            metadata,
            ignore_existing: false,
        })
    }

    /// Skip the copy when a package already exists.
    pub fn with_ignore_existing(mut self, ignore_existing: bool) -> Self {
        self.ignore_existing = ignore_existing;
        self
    }

    /// Package options.
    pub fn options(&self) -> &PackageOptions {
        self.packager.options()
    }

    fn folder(&self, dataset: &DatasetDescriptor) -> PathBuf {
        self.router.resolve_archive_folder(dataset, &self.root)
    }

    fn shard_directory(&self, dataset: &DatasetDescriptor) -> Option<PathBuf> {
        if self.options().with_sharding {
            Some(self.folder(dataset).join(&dataset.location))
        } else {
            None
        }
    }

    /// Path of the package of `dataset`.
    pub fn package_path(&self, dataset: &DatasetDescriptor) -> PathBuf {
        let directory = self
            .shard_directory(dataset)
            .unwrap_or_else(|| self.folder(dataset));
        directory.join(self.options().file_name(&dataset.code))
    }

    fn reader(&self, dataset: &DatasetDescriptor) -> Result<PackageReader, String> {
        let package = self.package_path(dataset);
        PackageReader::open(&package, *self.options())
            .map_err(|e| format!("cannot open package '{}': {}", package.display(), e))
    }

    fn archived_listing(&self, dataset: &DatasetDescriptor) -> Result<BTreeMap<String, u64>, String> {
        if !self.package_path(dataset).exists() {
            return Ok(BTreeMap::new());
        }
        let tree = self
            .reader(dataset)?
            .hierarchy()
            .map_err(|e| e.to_string())?;
        Ok(tree.find(&dataset.code).map(listing_of).unwrap_or_default())
    }
}

impl FileOperations for PackageFileOperations {
    fn archived_location(&self, dataset: &DatasetDescriptor) -> String {
        self.package_path(dataset).display().to_string()
    }

    fn copy_to_destination(&self, source: &Path, dataset: &DatasetDescriptor) -> ArchiveStatus {
        let package = self.package_path(dataset);
        if self.ignore_existing && package.exists() {
            info!(
                "Data set '{}' will be ignored as it already exists in the archive.",
                dataset.code
            );
            return ArchiveStatus::Ok;
        }
        let record = match self.metadata.dataset_record(&dataset.code) {
            Ok(record) => record,
            Err(e) => {
                return ArchiveStatus::error(format!(
                    "cannot obtain metadata of data set '{}': {}",
                    dataset.code, e
                ))
            }
        };
        let tsv = to_tsv(&metadata_rows(&record));
        match self
            .packager
            .build_package(source, &dataset.code, &tsv, &package)
        {
            Ok(()) => {
                info!("Data set '{}' archived: {}", dataset.code, package.display());
                ArchiveStatus::Ok
            }
            Err(e) => ArchiveStatus::error(format!(
                "archiving data set '{}' to '{}' failed: {}",
                dataset.code,
                package.display(),
                e
            )),
        }
    }

    fn retrieve_from_destination(
        &self,
        target: &Path,
        dataset: &DatasetDescriptor,
    ) -> ArchiveStatus {
        let package = self.package_path(dataset);
        if !package.exists() {
            return ArchiveStatus::error("destination doesn't exist");
        }
        let reader = match self.reader(dataset) {
            Ok(reader) => reader,
            Err(e) => return ArchiveStatus::Error(e),
        };
        if target.exists() {
            if let Err(e) = fs::remove_dir_all(target) {
                return ArchiveStatus::error(format!(
                    "cannot replace '{}': {}",
                    target.display(),
                    e
                ));
            }
        }
        match reader.extract(&dataset.code, target) {
            Ok(()) => {
                info!(
                    "Data set '{}' retrieved from archive '{}' to '{}'.",
                    dataset.code,
                    package.display(),
                    target.display()
                );
                ArchiveStatus::Ok
            }
            Err(e) => ArchiveStatus::error(format!(
                "retrieving data set '{}' from '{}' failed: {}",
                dataset.code,
                package.display(),
                e
            )),
        }
    }

    fn delete_from_destination(&self, dataset: &DatasetDescriptor) -> ArchiveStatus {
        let package = self.package_path(dataset);
        if package.exists() {
            if let Err(e) = fs::remove_file(&package) {
                return ArchiveStatus::error(format!("couldn't delete: {}", e));
            }
            info!(code = %dataset.code, package = %package.display(), "Deleted from archive");
        }
        if let Some(shard) = self.shard_directory(dataset) {
            if shard.is_dir() {
                if let Err(e) = fs::remove_dir_all(&shard) {
                    return ArchiveStatus::error(format!("couldn't delete: {}", e));
                }
                debug!(code = %dataset.code, path = %shard.display(), "Removed shard directory");
            }
        }
        ArchiveStatus::Ok
    }

    fn mark_as_deleted(&self, dataset: &DatasetDescriptor) -> ArchiveStatus {
        if !self.package_path(dataset).exists() {
            return ArchiveStatus::Ok;
        }
        let marker_folder = self.folder(dataset).join(MARKER_FOLDER);
        let result = fs::create_dir_all(&marker_folder)
            .and_then(|_| File::create(marker_folder.join(&dataset.code)).map(|_| ()));
        match result {
            Ok(()) => ArchiveStatus::Ok,
            Err(e) => ArchiveStatus::error(format!("couldn't mark as deleted: {}", e)),
        }
    }

    fn is_present_in_destination(&self, dataset: &DatasetDescriptor) -> BooleanStatus {
        match self.package_path(dataset).try_exists() {
            Ok(present) => BooleanStatus::from_bool(present),
            Err(e) => BooleanStatus::Error(format!("couldn't check existence: {}", e)),
        }
    }

    fn is_synchronized_with_destination(
        &self,
        source: &Path,
        dataset: &DatasetDescriptor,
    ) -> BooleanStatus {
        let store = match snapshot_directory(source, ChecksumMode::Skip) {
            Ok(node) => listing_of(&node),
            Err(e) => return BooleanStatus::Error(format!("listing files failed: {}", e)),
        };
        match self.archived_listing(dataset) {
            Ok(destination) => compare_listings(&store, &destination),
            Err(e) => BooleanStatus::Error(format!("listing files failed: {}", e)),
        }
    }

    fn archived_hierarchy(&self, dataset: &DatasetDescriptor) -> Result<ArchivedTree, String> {
        let root = self
            .reader(dataset)?
            .hierarchy()
            .map_err(|e| format!("cannot read package: {}", e))?;
        Ok(ArchivedTree {
            root,
            store_prefix: dataset.code.clone(),
        })
    }
}
