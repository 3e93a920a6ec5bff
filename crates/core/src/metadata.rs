//! Metadata collaborator contract
//!
//! The archiver never talks to the metadata store directly. Everything it
//! needs (locks, share ids, sizes, statuses, descriptive records) goes
//! through [`MetadataService`]. [`InMemoryMetadataService`] is a complete
//! in-process implementation that records every write for inspection.

use crate::error::{Error, Result};
use crate::lock::LockTable;
use crate::types::{ArchivingStatus, DatasetDescriptor, DatasetRecord};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read/update contract consumed by the archiver.
pub trait MetadataService: Send + Sync {
    /// Block until the per-dataset lock for `code` is held.
    fn lock(&self, code: &str);

    /// Release the per-dataset lock for `code`.
    fn release_lock(&self, code: &str);

    /// Current share id of a dataset.
    fn share_id(&self, code: &str) -> Result<String>;

    /// Record a new share id for a dataset.
    fn set_share_id(&self, code: &str, share_id: &str) -> Result<()>;

    /// Record a new share id and size for a dataset.
    fn update_share_id_and_size(&self, code: &str, share_id: &str, size: u64) -> Result<()>;

    /// Ask for the live copies of `codes` to be deleted asynchronously.
    fn schedule_deletion_of_datasets(
        &self,
        codes: &[String],
        max_retries: u32,
        retry_interval_secs: u64,
    ) -> Result<()>;

    /// Record the archiving status of `codes`.
    fn update_status(
        &self,
        codes: &[String],
        status: ArchivingStatus,
        present_in_archive: bool,
    ) -> Result<()>;

    /// Store directory of a dataset at `location` on share `share_id`.
    fn dataset_directory(&self, share_id: &str, location: &str) -> Result<PathBuf>;

    /// Descriptive metadata of a dataset.
    fn dataset_record(&self, code: &str) -> Result<DatasetRecord>;

    /// Codes of all datasets stored together with `code` in one container.
    fn container_members(&self, code: &str) -> Result<Vec<String>> {
        Ok(vec![code.to_string()])
    }

    /// Store directory of `dataset` on its current share.
    fn directory_of(&self, dataset: &DatasetDescriptor) -> Result<PathBuf> {
        let share_id = self.share_id(&dataset.code)?;
        self.dataset_directory(&share_id, &dataset.location)
    }
}

/// A recorded `update_status` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Affected codes
    pub codes: Vec<String>,
    /// New status
    pub status: ArchivingStatus,
    /// Present-in-archive flag
    pub present_in_archive: bool,
}

/// A recorded `schedule_deletion_of_datasets` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRequest {
    /// Codes to delete
    pub codes: Vec<String>,
    /// Maximum number of retries
    pub max_retries: u32,
    /// Seconds between retries
    pub retry_interval_secs: u64,
}

#[derive(Debug, Clone)]
struct DatasetEntry {
    share_id: String,
    size: Option<u64>,
    status: ArchivingStatus,
    present_in_archive: bool,
    record: DatasetRecord,
}

/// In-memory metadata service over a dataset-code keyed table.
pub struct InMemoryMetadataService {
    store_root: PathBuf,
    datasets: DashMap<String, DatasetEntry>,
    containers: DashMap<String, Vec<String>>,
    locks: LockTable,
    status_updates: Mutex<Vec<StatusUpdate>>,
    deletion_requests: Mutex<Vec<DeletionRequest>>,
}

impl InMemoryMetadataService {
    /// Service whose dataset directories live under `store_root/<share>/<location>`.
    pub fn new(store_root: impl Into<PathBuf>) -> Self {
        InMemoryMetadataService {
            store_root: store_root.into(),
            datasets: DashMap::new(),
            containers: DashMap::new(),
            locks: LockTable::new(),
            status_updates: Mutex::new(Vec::new()),
            deletion_requests: Mutex::new(Vec::new()),
        }
    }

    /// Register a dataset with a record derived from the descriptor.
    pub fn register(&self, dataset: &DatasetDescriptor) {
        self.register_with_record(dataset, DatasetRecord::from_descriptor(dataset));
    }

    /// Register a dataset with an explicit record.
    pub fn register_with_record(&self, dataset: &DatasetDescriptor, record: DatasetRecord) {
        self.datasets.insert(
            dataset.code.clone(),
            DatasetEntry {
                share_id: dataset.share_id.clone(),
                size: dataset.size,
                status: ArchivingStatus::Available,
                present_in_archive: false,
                record,
            },
        );
    }

    /// Declare that `codes` are stored together in one container.
    pub fn register_container(&self, codes: &[&str]) {
        let members: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        for code in codes {
            self.containers.insert(code.to_string(), members.clone());
        }
    }

    /// The store root.
    pub fn store_root(&self) -> &Path {
        &self.store_root
    }

    /// The lock table backing `lock`/`release_lock`.
    pub fn locks(&self) -> &LockTable {
        &self.locks
    }

    /// Recorded size of a dataset.
    pub fn size_of(&self, code: &str) -> Option<u64> {
        self.datasets.get(code).and_then(|e| e.size)
    }

    /// Recorded archiving status and present-in-archive flag.
    pub fn status_of(&self, code: &str) -> Option<(ArchivingStatus, bool)> {
        self.datasets
            .get(code)
            .map(|e| (e.status, e.present_in_archive))
    }

    /// All `update_status` calls so far.
    pub fn status_updates(&self) -> Vec<StatusUpdate> {
        self.status_updates.lock().clone()
    }

    /// All `schedule_deletion_of_datasets` calls so far.
    pub fn deletion_requests(&self) -> Vec<DeletionRequest> {
        self.deletion_requests.lock().clone()
    }

    fn with_entry<T>(&self, code: &str, f: impl FnOnce(&mut DatasetEntry) -> T) -> Result<T> {
        let mut entry = self
            .datasets
            .get_mut(code)
            .ok_or_else(|| Error::UnknownDataSet(code.to_string()))?;
        Ok(f(entry.value_mut()))
    }
}

impl MetadataService for InMemoryMetadataService {
    fn lock(&self, code: &str) {
        self.locks.lock(code);
    }

    fn release_lock(&self, code: &str) {
        self.locks.unlock(code);
    }

    fn share_id(&self, code: &str) -> Result<String> {
        self.datasets
            .get(code)
            .map(|e| e.share_id.clone())
            .ok_or_else(|| Error::UnknownDataSet(code.to_string()))
    }

    fn set_share_id(&self, code: &str, share_id: &str) -> Result<()> {
        debug!(code, share_id, "Setting share id");
        self.with_entry(code, |e| e.share_id = share_id.to_string())
    }

    fn update_share_id_and_size(&self, code: &str, share_id: &str, size: u64) -> Result<()> {
        debug!(code, share_id, size, "Updating share id and size");
        self.with_entry(code, |e| {
            e.share_id = share_id.to_string();
            e.size = Some(size);
        })
    }

    fn schedule_deletion_of_datasets(
        &self,
        codes: &[String],
        max_retries: u32,
        retry_interval_secs: u64,
    ) -> Result<()> {
        self.deletion_requests.lock().push(DeletionRequest {
            codes: codes.to_vec(),
            max_retries,
            retry_interval_secs,
        });
        Ok(())
    }

    fn update_status(
        &self,
        codes: &[String],
        status: ArchivingStatus,
        present_in_archive: bool,
    ) -> Result<()> {
        for code in codes {
            self.with_entry(code, |e| {
                e.status = status;
                e.present_in_archive = present_in_archive;
            })?;
        }
        self.status_updates.lock().push(StatusUpdate {
            codes: codes.to_vec(),
            status,
            present_in_archive,
        });
        Ok(())
    }

    fn dataset_directory(&self, share_id: &str, location: &str) -> Result<PathBuf> {
        Ok(self.store_root.join(share_id).join(location))
    }

    fn dataset_record(&self, code: &str) -> Result<DatasetRecord> {
        self.datasets
            .get(code)
            .map(|e| e.record.clone())
            .ok_or_else(|| Error::UnknownDataSet(code.to_string()))
    }

    fn container_members(&self, code: &str) -> Result<Vec<String>> {
        Ok(self
            .containers
            .get(code)
            .map(|m| m.value().clone())
            .unwrap_or_else(|| vec![code.to_string()]))
    }
}
