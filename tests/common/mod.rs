//! Shared fixture for the end-to-end suites
//!
//! A scratch store with numbered share folders, a scratch archive folder and
//! an in-memory metadata service that records every update.

#![allow(dead_code)]

use coldstore::prelude::*;
use coldstore_core::{FixedFreeSpace, StaticShareProvider};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Modification time given to every fixture file.
pub fn fixture_time() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_001)
}

pub struct Store {
    pub store: TempDir,
    pub archive: TempDir,
    pub metadata: Arc<InMemoryMetadataService>,
}

impl Store {
    pub fn new() -> Self {
        coldstore::logging::init("warn");
        let store = TempDir::new().unwrap();
        let archive = TempDir::new().unwrap();
        let metadata = Arc::new(InMemoryMetadataService::new(store.path()));
        Store {
            store,
            archive,
            metadata,
        }
    }

    /// Register `code` of experiment `/S/P/E` on share 1 and write its tree.
    pub fn dataset(&self, code: &str) -> DatasetDescriptor {
        let ds = DatasetDescriptor::new(code, format!("1A/{}", code))
            .with_share_id("1")
            .with_experiment("S", "P", "E");
        let dir = self.dir("1", &ds);
        fs::create_dir_all(dir.join("original/empty")).unwrap();
        fs::write(dir.join("original/data.bin"), vec![7u8; 42]).unwrap();
        fs::write(dir.join("original/notes.txt"), b"measured").unwrap();
        for file in ["original/data.bin", "original/notes.txt"] {
            File::open(dir.join(file))
                .unwrap()
                .set_modified(fixture_time())
                .unwrap();
        }
        self.metadata.register(&ds);
        ds
    }

    /// Store directory of `ds` on `share`.
    pub fn dir(&self, share: &str, ds: &DatasetDescriptor) -> PathBuf {
        self.store.path().join(share).join(&ds.location)
    }

    /// Shares 1 to 3 with plenty of free space.
    pub fn shares(&self) -> Arc<dyn ShareProvider> {
        let shares = ["1", "2", "3"]
            .iter()
            .map(|id| {
                Share::with_free_space(
                    *id,
                    self.store.path().join(id),
                    Arc::new(FixedFreeSpace(1 << 30)),
                )
            })
            .collect();
        Arc::new(StaticShareProvider::new(shares))
    }

    pub fn config(&self) -> ArchiverConfig {
        ArchiverConfig::new(self.archive.path().display().to_string())
    }

    pub fn archiver(&self, config: ArchiverConfig) -> Archiver {
        Archiver::from_config(config, self.metadata.clone(), self.shares()).unwrap()
    }

    /// Simulate the asynchronous deletion of the live copy.
    pub fn evict(&self, ds: &DatasetDescriptor) {
        let share = self.metadata.share_id(&ds.code).unwrap();
        fs::remove_dir_all(self.dir(&share, ds)).unwrap();
    }
}

/// Assert that `dir` holds the fixture tree with its original modification
/// times.
pub fn assert_fixture_tree(dir: &Path) {
    assert_eq!(fs::read(dir.join("original/data.bin")).unwrap(), vec![7u8; 42]);
    assert_eq!(fs::read(dir.join("original/notes.txt")).unwrap(), b"measured");
    for file in ["original/data.bin", "original/notes.txt"] {
        let mtime = fs::metadata(dir.join(file)).unwrap().modified().unwrap();
        assert_eq!(mtime, fixture_time(), "{}", file);
    }
    assert!(dir.join("original/empty").is_dir());
}
