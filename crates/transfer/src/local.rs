//! File operations against a local (or mounted) destination directory
//!
//! The archived copy of a dataset lives at `<folder>/<location>`, where the
//! folder comes from the router. Copies are native and preserve file
//! modification times, unless an rsync copier is configured, in which case
//! the copy is delegated to it with no host.

use crate::operations::{compare_listings, listing_of, ArchivedTree, FileOperations, MARKER_FOLDER};
use crate::remote::{RemoteCopier, RemoteEndpoint};
use coldstore_core::{ArchiveStatus, BooleanStatus, ConfigError, DatasetDescriptor};
use coldstore_hierarchy::{snapshot_directory, ChecksumMode};
use coldstore_routing::DestinationRouter;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// [`FileOperations`] for a local destination.
pub struct LocalFileOperations {
    root: PathBuf,
    router: Arc<DestinationRouter>,
    copier: Option<Arc<dyn RemoteCopier>>,
}

impl LocalFileOperations {
    /// Native copies into `root`, which must be an existing directory.
    pub fn new(root: impl Into<PathBuf>, router: Arc<DestinationRouter>) -> Result<Self, ConfigError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ConfigError::InvalidDestination {
                spec: root.display().to_string(),
                reason: "destination directory does not exist".to_string(),
            });
        }
        Ok(LocalFileOperations {
            root,
            router,
            copier: None,
        })
    }

    /// Copies into `root` delegated to `copier`, which is probed first.
    pub fn with_copier(
        root: impl Into<PathBuf>,
        router: Arc<DestinationRouter>,
        copier: Arc<dyn RemoteCopier>,
    ) -> Result<Self, ConfigError> {
        copier.check()?;
        let mut operations = Self::new(root, router)?;
        operations.copier = Some(copier);
        Ok(operations)
    }

    /// Destination root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn folder(&self, dataset: &DatasetDescriptor) -> PathBuf {
        self.router.resolve_archive_folder(dataset, &self.root)
    }

    /// Path of the archived copy of `dataset`.
    pub fn archived_path(&self, dataset: &DatasetDescriptor) -> PathBuf {
        self.folder(dataset).join(&dataset.location)
    }

    fn copy(&self, source: &Path, target: &Path) -> ArchiveStatus {
        let parent = match target.parent() {
            Some(parent) => parent,
            None => return ArchiveStatus::error(format!("'{}' has no parent", target.display())),
        };
        if let Err(e) = fs::create_dir_all(parent) {
            return ArchiveStatus::error(format!(
                "cannot create directory '{}': {}",
                parent.display(),
                e
            ));
        }
        match &self.copier {
            Some(copier) => copier.copy_to_remote(
                source,
                &parent.display().to_string(),
                RemoteEndpoint::local(),
            ),
            None => match copy_tree(source, target) {
                Ok(()) => ArchiveStatus::Ok,
                Err(e) => ArchiveStatus::error(format!(
                    "copying '{}' to '{}' failed: {}",
                    source.display(),
                    target.display(),
                    e
                )),
            },
        }
    }
}

impl FileOperations for LocalFileOperations {
    fn archived_location(&self, dataset: &DatasetDescriptor) -> String {
        self.archived_path(dataset).display().to_string()
    }

    fn copy_to_destination(&self, source: &Path, dataset: &DatasetDescriptor) -> ArchiveStatus {
        let target = self.archived_path(dataset);
        debug!(code = %dataset.code, target = %target.display(), "Copying to destination");
        self.copy(source, &target)
    }

    fn retrieve_from_destination(
        &self,
        target: &Path,
        dataset: &DatasetDescriptor,
    ) -> ArchiveStatus {
        let archived = self.archived_path(dataset);
        if !archived.exists() {
            return ArchiveStatus::error("destination doesn't exist");
        }
        let parent = match target.parent() {
            Some(parent) => parent,
            None => return ArchiveStatus::error(format!("'{}' has no parent", target.display())),
        };
        if let Err(e) = fs::create_dir_all(parent) {
            return ArchiveStatus::error(format!(
                "cannot create directory '{}': {}",
                parent.display(),
                e
            ));
        }
        match &self.copier {
            Some(copier) => copier.copy_from_remote(
                &archived.display().to_string(),
                RemoteEndpoint::local(),
                parent,
            ),
            None => match copy_tree(&archived, target) {
                Ok(()) => ArchiveStatus::Ok,
                Err(e) => ArchiveStatus::error(format!(
                    "retrieving '{}' to '{}' failed: {}",
                    archived.display(),
                    target.display(),
                    e
                )),
            },
        }
    }

    fn delete_from_destination(&self, dataset: &DatasetDescriptor) -> ArchiveStatus {
        let archived = self.archived_path(dataset);
        if !archived.exists() {
            return ArchiveStatus::Ok;
        }
        let result = if archived.is_dir() {
            fs::remove_dir_all(&archived)
        } else {
            fs::remove_file(&archived)
        };
        match result {
            Ok(()) => {
                info!(code = %dataset.code, path = %archived.display(), "Deleted from archive");
                ArchiveStatus::Ok
            }
            Err(e) => ArchiveStatus::error(format!("couldn't delete: {}", e)),
        }
    }

    fn mark_as_deleted(&self, dataset: &DatasetDescriptor) -> ArchiveStatus {
        if !self.archived_path(dataset).exists() {
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
        match self.archived_path(dataset).try_exists() {
            Ok(present) => BooleanStatus::from_bool(present),
            Err(e) => BooleanStatus::Error(format!("couldn't check existence: {}", e)),
        }
    }

    fn is_synchronized_with_destination(
        &self,
        source: &Path,
        dataset: &DatasetDescriptor,
    ) -> BooleanStatus {
        let store = match local_listing(source) {
            Ok(listing) => listing,
            Err(e) => return BooleanStatus::Error(format!("listing files failed: {}", e)),
        };
        let archived = self.archived_path(dataset);
        let destination = if archived.exists() {
            match local_listing(&archived) {
                Ok(listing) => listing,
                Err(e) => return BooleanStatus::Error(format!("listing files failed: {}", e)),
            }
        } else {
            BTreeMap::new()
        };
        compare_listings(&store, &destination)
    }

    fn archived_hierarchy(&self, dataset: &DatasetDescriptor) -> Result<ArchivedTree, String> {
        let archived = self.archived_path(dataset);
        let root = snapshot_directory(&archived, ChecksumMode::Compute)
            .map_err(|e| format!("cannot read archived copy '{}': {}", archived.display(), e))?;
        Ok(ArchivedTree {
            root,
            store_prefix: String::new(),
        })
    }
}

fn local_listing(root: &Path) -> Result<BTreeMap<String, u64>, String> {
    snapshot_directory(root, ChecksumMode::Skip)
        .map(|node| listing_of(&node))
        .map_err(|e| e.to_string())
}

/// Copy the tree at `source` to `target`, preserving modification times.
///
/// An existing `target` is replaced.
pub fn copy_tree(source: &Path, target: &Path) -> io::Result<()> {
    if target.exists() {
        if target.is_dir() {
            fs::remove_dir_all(target)?;
        } else {
            fs::remove_file(target)?;
        }
    }

    let mut directories: Vec<(PathBuf, SystemTime)> = Vec::new();
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let destination = if relative.as_os_str().is_empty() {
            target.to_path_buf()
        } else {
            target.join(relative)
        };
        let metadata = entry.metadata()?;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&destination)?;
            directories.push((destination, metadata.modified()?));
        } else if file_type.is_file() {
            fs::copy(entry.path(), &destination)?;
            File::open(&destination)?.set_modified(metadata.modified()?)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &destination)?;
        }
    }

    // Children first, so that their creation does not bump the parent again.
    for (directory, modified) in directories.into_iter().rev() {
        if let Err(e) = File::open(&directory).and_then(|d| d.set_modified(modified)) {
            warn!(path = %directory.display(), error = %e, "Cannot restore directory mtime");
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, destination: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(source)?, destination)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, destination: &Path) -> io::Result<()> {
    fs::copy(source, destination).map(|_| ())
}
