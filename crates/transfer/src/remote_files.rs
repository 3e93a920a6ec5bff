//! File operations against a remote destination
//!
//! Byte transfer goes through a [`RemoteCopier`]; existence checks,
//! directory creation, deletion and listings go through a
//! [`RemoteCommandExecutor`] on the destination host. Connectivity is probed
//! once, when the manager is built.

use crate::destination::Destination;
use crate::operations::{compare_listings, listing_of, ArchivedTree, FileOperations, MARKER_FOLDER};
use crate::remote::{shell_quote, RemoteCommandExecutor, RemoteCopier, RemoteEndpoint};
use coldstore_core::{ArchiveStatus, BooleanStatus, ConfigError, DatasetDescriptor};
use coldstore_hierarchy::{parse_find_listing, snapshot_directory, ChecksumMode};
use coldstore_routing::DestinationRouter;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default remote operation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// [`FileOperations`] for an ssh or rsync-module destination.
pub struct RemoteFileOperations {
    host: String,
    module: Option<String>,
    password_file: Option<PathBuf>,
    root: String,
    find: String,
    timeout: Duration,
    router: Arc<DestinationRouter>,
    copier: Arc<dyn RemoteCopier>,
    executor: Arc<dyn RemoteCommandExecutor>,
}

/// Settings of a [`RemoteFileOperations`] besides its collaborators.
#[derive(Debug, Clone)]
pub struct RemoteSettings {
    /// Remote destination
    pub destination: Destination,
    /// Password file for rsync module destinations
    pub password_file: Option<PathBuf>,
    /// Path of `find` on the destination host
    pub find: String,
    /// Timeout of remote commands and probes
    pub timeout: Duration,
}

impl RemoteSettings {
    /// Settings for `destination` with defaults for everything else.
    pub fn new(destination: Destination) -> Self {
        RemoteSettings {
            destination,
            password_file: None,
            find: "find".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RemoteFileOperations {
    /// Build the manager and probe the destination.
    pub fn new(
        settings: RemoteSettings,
        router: Arc<DestinationRouter>,
        copier: Arc<dyn RemoteCopier>,
        executor: Arc<dyn RemoteCommandExecutor>,
    ) -> Result<Self, ConfigError> {
        let (host, module, root) = match &settings.destination {
            Destination::Local(path) => {
                return Err(ConfigError::InvalidDestination {
                    spec: path.display().to_string(),
                    reason: "a remote destination needs a host".to_string(),
                })
            }
            Destination::Ssh { host, path } => (host.clone(), None, path.clone()),
            Destination::RsyncModule { host, module, path } => {
                (host.clone(), Some(module.clone()), path.clone())
            }
        };

        copier.check()?;
        match &module {
            Some(module) => copier.check_connection_via_module(
                &host,
                module,
                settings.password_file.as_deref(),
                settings.timeout,
            )?,
            None => copier.check_connection_via_ssh(&host, None, settings.timeout)?,
        }
        info!(destination = %settings.destination, "Remote destination is reachable");

        Ok(RemoteFileOperations {
            host,
            module,
            password_file: settings.password_file,
            root,
            find: settings.find,
            timeout: settings.timeout,
            router,
            copier,
            executor,
        })
    }

    fn endpoint(&self) -> RemoteEndpoint<'_> {
        RemoteEndpoint {
            host: Some(&self.host),
            module: self.module.as_deref(),
            password_file: self.password_file.as_deref(),
        }
    }

    fn folder(&self, dataset: &DatasetDescriptor) -> String {
        let folder = self
            .router
            .resolve_archive_folder(dataset, Path::new(&self.root));
        folder.display().to_string().trim_end_matches('/').to_string()
    }

    /// Remote path of the archived copy of `dataset`.
    pub fn archived_path(&self, dataset: &DatasetDescriptor) -> String {
        format!("{}/{}", self.folder(dataset), dataset.location.trim_matches('/'))
    }

    fn run(&self, command: &str) -> Result<Vec<String>, String> {
        let result = self.executor.execute_command_remotely(command, self.timeout);
        if result.is_ok() {
            Ok(result.stdout_lines)
        } else {
            Err(result.error_message())
        }
    }

    fn ensure_directory(&self, directory: &str) -> Result<(), String> {
        match self.executor.exists(directory, self.timeout) {
            BooleanStatus::True => Ok(()),
            BooleanStatus::False(_) => self
                .run(&format!("mkdir -p {}", shell_quote(directory)))
                .map(|_| ())
                .map_err(|e| format!("cannot create directory '{}': {}", directory, e)),
            BooleanStatus::Error(e) => Err(format!("couldn't check existence: {}", e)),
        }
    }

    fn remote_listing(&self, path: &str) -> Result<BTreeMap<String, u64>, String> {
        let lines = self
            .run(&format!(
                "{} {} -type f -printf \"%p\\t%s\\n\"",
                self.find,
                shell_quote(path)
            ))
            .map_err(|e| format!("listing files failed: {}", e))?;
        let prefix = format!("{}/", path);
        let mut listing = BTreeMap::new();
        for line in &lines {
            let (file, size) = line
                .rsplit_once('\t')
                .ok_or_else(|| format!("listing files failed: unexpected line '{}'", line))?;
            let size = size
                .trim()
                .parse::<u64>()
                .map_err(|_| format!("listing files failed: unexpected line '{}'", line))?;
            let relative = file.strip_prefix(&prefix).unwrap_or(file);
            listing.insert(relative.to_string(), size);
        }
        Ok(listing)
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(index) => &path[..index],
        None => ".",
    }
}

impl FileOperations for RemoteFileOperations {
    fn archived_location(&self, dataset: &DatasetDescriptor) -> String {
        format!("{}:{}", self.host, self.archived_path(dataset))
    }

    fn copy_to_destination(&self, source: &Path, dataset: &DatasetDescriptor) -> ArchiveStatus {
        let archived = self.archived_path(dataset);
        let parent = parent_of(&archived);
        if let Err(e) = self.ensure_directory(parent) {
            return ArchiveStatus::Error(e);
        }
        debug!(code = %dataset.code, host = %self.host, target = %archived, "Copying to remote destination");
        self.copier.copy_to_remote(source, parent, self.endpoint())
    }

    fn retrieve_from_destination(
        &self,
        target: &Path,
        dataset: &DatasetDescriptor,
    ) -> ArchiveStatus {
        let archived = self.archived_path(dataset);
        match self.executor.exists(&archived, self.timeout) {
            BooleanStatus::True => {}
            BooleanStatus::False(_) => return ArchiveStatus::error("destination doesn't exist"),
            BooleanStatus::Error(e) => {
                return ArchiveStatus::error(format!("couldn't check existence: {}", e))
            }
        }
        let parent = match target.parent() {
            Some(parent) => parent,
            None => return ArchiveStatus::error(format!("'{}' has no parent", target.display())),
        };
        if let Err(e) = std::fs::create_dir_all(parent) {
            return ArchiveStatus::error(format!(
                "cannot create directory '{}': {}",
                parent.display(),
                e
            ));
        }
        self.copier.copy_from_remote(&archived, self.endpoint(), parent)
    }

    fn delete_from_destination(&self, dataset: &DatasetDescriptor) -> ArchiveStatus {
        let archived = self.archived_path(dataset);
        match self.executor.exists(&archived, self.timeout) {
            BooleanStatus::True => match self.run(&format!("rm -rf {}", shell_quote(&archived))) {
                Ok(_) => ArchiveStatus::Ok,
                Err(e) => ArchiveStatus::error(format!("couldn't delete: {}", e)),
            },
            BooleanStatus::False(_) => ArchiveStatus::Ok,
            BooleanStatus::Error(e) => ArchiveStatus::error(format!("couldn't delete: {}", e)),
        }
    }

    fn mark_as_deleted(&self, dataset: &DatasetDescriptor) -> ArchiveStatus {
        let archived = self.archived_path(dataset);
        match self.executor.exists(&archived, self.timeout) {
            BooleanStatus::True => {}
            BooleanStatus::False(_) => return ArchiveStatus::Ok,
            BooleanStatus::Error(e) => {
                return ArchiveStatus::error(format!("couldn't check existence: {}", e))
            }
        }
        let marker_folder = format!("{}/{}", self.folder(dataset), MARKER_FOLDER);
        if let Err(e) = self.ensure_directory(&marker_folder) {
            return ArchiveStatus::Error(e);
        }
        let marker = format!("{}/{}", marker_folder, dataset.code);
        match self.run(&format!("touch {}", shell_quote(&marker))) {
            Ok(_) => ArchiveStatus::Ok,
            Err(e) => ArchiveStatus::error(format!("couldn't mark as deleted: {}", e)),
        }
    }

    fn is_present_in_destination(&self, dataset: &DatasetDescriptor) -> BooleanStatus {
        match self.executor.exists(&self.archived_path(dataset), self.timeout) {
            BooleanStatus::Error(e) => BooleanStatus::Error(format!("couldn't check existence: {}", e)),
            other => other,
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
        let archived = self.archived_path(dataset);
        let destination = match self.executor.exists(&archived, self.timeout) {
            BooleanStatus::True => match self.remote_listing(&archived) {
                Ok(listing) => listing,
                Err(e) => return BooleanStatus::Error(e),
            },
            BooleanStatus::False(_) => BTreeMap::new(),
            BooleanStatus::Error(e) => {
                return BooleanStatus::Error(format!("couldn't check existence: {}", e))
            }
        };
        compare_listings(&store, &destination)
    }

    fn archived_hierarchy(&self, dataset: &DatasetDescriptor) -> Result<ArchivedTree, String> {
        let archived = self.archived_path(dataset);
        let lines = self
            .run(&format!(
                "{} {} -printf \"%y\\t%p\\t%s\\n\"",
                self.find,
                shell_quote(&archived)
            ))
            .map_err(|e| format!("listing files failed: {}", e))?;
        let root = parse_find_listing(&archived, lines.iter().map(String::as_str))
            .map_err(|e| format!("listing files failed: {}", e))?;
        Ok(ArchivedTree {
            root,
            store_prefix: String::new(),
        })
    }
}
