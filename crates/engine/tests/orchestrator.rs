//! Orchestrator behaviour against a local destination
//!
//! The store is a temporary directory with numbered share folders; metadata
//! lives in an `InMemoryMetadataService` so every status update can be
//! inspected afterwards.

use coldstore_core::{
    ArchiveStatus, ArchivingStatus, BooleanStatus, ConfigError, DatasetDescriptor, FixedFreeSpace,
    InMemoryMetadataService, MetadataService, Share, StaticShareProvider,
};
use coldstore_engine::{Archiver, ArchiverConfig, PackageConfig};
use coldstore_hierarchy::HierarchyBuilder;
use coldstore_routing::{ShareFinder, ShareFinderContext, ShareFinderRegistry};
use coldstore_transfer::{ArchivedTree, FileOperations};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

// ============================================================================
// Fixture
// ============================================================================

struct Fixture {
    store: TempDir,
    archive: TempDir,
    metadata: Arc<InMemoryMetadataService>,
}

impl Fixture {
    fn new() -> Self {
        let store = TempDir::new().unwrap();
        let archive = TempDir::new().unwrap();
        let metadata = Arc::new(InMemoryMetadataService::new(store.path()));
        Fixture {
            store,
            archive,
            metadata,
        }
    }

    /// Register `code` on share 1 with a small tree.
    fn dataset(&self, code: &str) -> DatasetDescriptor {
        let ds = DatasetDescriptor::new(code, format!("a/{}", code))
            .with_share_id("1")
            .with_experiment("S", "P", "E");
        let dir = self.dir("1", &ds);
        fs::create_dir_all(dir.join("sub/empty")).unwrap();
        fs::write(dir.join("sub/data.bin"), vec![3u8; 100]).unwrap();
        fs::write(dir.join("readme.txt"), b"hello").unwrap();
        self.metadata.register(&ds);
        ds
    }

    fn dir(&self, share: &str, ds: &DatasetDescriptor) -> PathBuf {
        self.store.path().join(share).join(&ds.location)
    }

    fn shares(&self, free: &[(&str, u64)]) -> Arc<StaticShareProvider> {
        let shares = free
            .iter()
            .map(|(id, bytes)| {
                Share::with_free_space(
                    *id,
                    self.store.path().join(id),
                    Arc::new(FixedFreeSpace(*bytes)),
                )
            })
            .collect();
        Arc::new(StaticShareProvider::new(shares))
    }

    fn config(&self) -> ArchiverConfig {
        ArchiverConfig::new(self.archive.path().display().to_string())
    }

    fn archiver(&self, config: ArchiverConfig) -> Archiver {
        Archiver::from_config(
            config,
            self.metadata.clone() as Arc<dyn MetadataService>,
            self.shares(&[("1", 1 << 30), ("2", 1 << 30)]),
        )
        .unwrap()
    }
}

// ============================================================================
// Archive
// ============================================================================

#[test]
fn test_archive_and_unarchive_round_trip() {
    let fixture = Fixture::new();
    let ds = fixture.dataset("ds1");
    let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_500_000_000);
    File::open(fixture.dir("1", &ds).join("readme.txt"))
        .unwrap()
        .set_modified(old)
        .unwrap();
    let archiver = fixture.archiver(fixture.config());

    let result = archiver.archive(&[ds.clone()], true);
    assert!(result.error_statuses().is_empty(), "{:?}", result);
    assert_eq!(
        fixture.metadata.status_of("ds1"),
        Some((ArchivingStatus::Archived, true))
    );
    assert!(fixture.archive.path().join("a/ds1/readme.txt").is_file());
    let requests = fixture.metadata.deletion_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].codes, vec!["ds1"]);
    assert_eq!(requests[0].max_retries, 6);
    assert_eq!(requests[0].retry_interval_secs, 10);

    // The live copy goes away asynchronously; simulate that.
    fs::remove_dir_all(fixture.dir("1", &ds)).unwrap();

    let result = archiver.unarchive(&[ds.clone()]);
    assert_eq!(result.status_of("ds1"), Some(&ArchiveStatus::Ok));
    assert_eq!(fixture.metadata.share_id("ds1").unwrap(), "2");
    assert_eq!(
        fixture.metadata.status_of("ds1"),
        Some((ArchivingStatus::Available, true))
    );
    let restored = fixture.dir("2", &ds);
    assert_eq!(fs::read(restored.join("readme.txt")).unwrap(), b"hello");
    assert_eq!(fs::read(restored.join("sub/data.bin")).unwrap(), vec![3u8; 100]);
    assert!(restored.join("sub/empty").is_dir());
    let mtime = fs::metadata(restored.join("readme.txt")).unwrap().modified().unwrap();
    assert_eq!(mtime, old);
}

#[test]
fn test_archive_without_removal_stays_available() {
    let fixture = Fixture::new();
    let ds = fixture.dataset("ds1");
    let archiver = fixture.archiver(fixture.config());

    let result = archiver.archive(&[ds], false);
    assert!(result.error_statuses().is_empty());
    assert_eq!(
        fixture.metadata.status_of("ds1"),
        Some((ArchivingStatus::Available, true))
    );
    assert!(fixture.metadata.deletion_requests().is_empty());
}

#[test]
fn test_plain_copy_updates_archive_even_when_ignoring_existing() {
    let fixture = Fixture::new();
    let ds = fixture.dataset("ds1");
    let config = fixture.config().with_ignore_existing(true);
    let archiver = fixture.archiver(config);
    assert!(archiver.archive(&[ds.clone()], false).error_statuses().is_empty());

    fs::write(fixture.dir("1", &ds).join("readme.txt"), b"hello again").unwrap();
    fs::write(fixture.dir("1", &ds).join("sub/late.bin"), b"late").unwrap();
    assert!(archiver.archive(&[ds], false).error_statuses().is_empty());

    let archived = fixture.archive.path().join("a/ds1");
    assert_eq!(fs::read(archived.join("readme.txt")).unwrap(), b"hello again");
    assert_eq!(fs::read(archived.join("sub/late.bin")).unwrap(), b"late");
}

#[test]
fn test_unknown_size_is_computed_and_recorded() {
    let fixture = Fixture::new();
    let ds = fixture.dataset("ds1");
    assert_eq!(ds.size, None);
    let archiver = fixture.archiver(fixture.config());

    archiver.archive(&[ds], false);
    assert_eq!(fixture.metadata.size_of("ds1"), Some(105));
}

#[test]
fn test_partial_failure_continues_with_batch() {
    let fixture = Fixture::new();
    let ds1 = fixture.dataset("ds1");
    let ds2 = fixture.dataset("ds2");
    let ds3 = fixture.dataset("ds3");
    fs::remove_dir_all(fixture.dir("1", &ds2)).unwrap();
    let archiver = fixture.archiver(fixture.config());

    let result = archiver.archive(&[ds1, ds2, ds3], false);
    assert_eq!(result.error_statuses().len(), 1);
    assert_eq!(result.successful_codes(), vec!["ds1", "ds3"]);
    assert_eq!(result.failed_codes(), vec!["ds2"]);
    assert_eq!(
        fixture.metadata.status_of("ds2"),
        Some((ArchivingStatus::Available, false))
    );
    assert!(!fixture.metadata.locks().is_locked("ds2"));
}

#[test]
fn test_parallel_batch_reports_in_input_order() {
    let fixture = Fixture::new();
    let datasets: Vec<_> = (0..8).map(|i| fixture.dataset(&format!("ds{}", i))).collect();
    let archiver = fixture.archiver(fixture.config().with_max_parallelism(4));

    let result = archiver.archive(&datasets, false);
    let expected: Vec<String> = (0..8).map(|i| format!("ds{}", i)).collect();
    assert_eq!(result.successful_codes(), expected);
    for code in &expected {
        assert!(!fixture.metadata.locks().is_locked(code));
    }
}

// ============================================================================
// Verification and synchronization, through a fake file operations manager
// ============================================================================

#[derive(Default)]
struct FakeOperations {
    copies: AtomicUsize,
    in_sync: bool,
    corrupt: bool,
}

impl FileOperations for FakeOperations {
    fn archived_location(&self, dataset: &DatasetDescriptor) -> String {
        format!("fake:{}", dataset.code)
    }

    fn copy_to_destination(&self, _source: &Path, _dataset: &DatasetDescriptor) -> ArchiveStatus {
        self.copies.fetch_add(1, Ordering::SeqCst);
        ArchiveStatus::Ok
    }

    fn retrieve_from_destination(&self, _target: &Path, _: &DatasetDescriptor) -> ArchiveStatus {
        ArchiveStatus::error("not archived")
    }

    fn delete_from_destination(&self, _dataset: &DatasetDescriptor) -> ArchiveStatus {
        ArchiveStatus::Ok
    }

    fn mark_as_deleted(&self, _dataset: &DatasetDescriptor) -> ArchiveStatus {
        ArchiveStatus::Ok
    }

    fn is_present_in_destination(&self, _dataset: &DatasetDescriptor) -> BooleanStatus {
        BooleanStatus::True
    }

    fn is_synchronized_with_destination(
        &self,
        _source: &Path,
        _dataset: &DatasetDescriptor,
    ) -> BooleanStatus {
        BooleanStatus::from_bool(self.in_sync)
    }

    fn archived_hierarchy(&self, _dataset: &DatasetDescriptor) -> Result<ArchivedTree, String> {
        let mut builder = HierarchyBuilder::new("");
        builder
            .add_file("readme.txt", if self.corrupt { 4 } else { 5 }, None)
            .add_file("sub/data.bin", 100, None)
            .add_directory("sub/empty");
        Ok(ArchivedTree {
            root: builder.build(),
            store_prefix: String::new(),
        })
    }
}

#[test]
fn test_failed_verification_is_not_a_successful_archive() {
    let fixture = Fixture::new();
    let ds = fixture.dataset("ds1");
    let fake = Arc::new(FakeOperations {
        corrupt: true,
        ..Default::default()
    });
    let archiver = fixture.archiver(fixture.config()).with_file_operations(fake);

    let result = archiver.archive(&[ds], true);
    assert_eq!(
        result.status_of("ds1"),
        Some(&ArchiveStatus::error(
            "The file 'readme.txt' has in the store 5 bytes but 4 in the archive."
        ))
    );
    assert_eq!(
        fixture.metadata.status_of("ds1"),
        Some((ArchivingStatus::Available, false))
    );
    assert!(fixture.metadata.deletion_requests().is_empty());
}

#[test]
fn test_verification_can_be_disabled() {
    let fixture = Fixture::new();
    let ds = fixture.dataset("ds1");
    let fake = Arc::new(FakeOperations {
        corrupt: true,
        ..Default::default()
    });
    let archiver = fixture
        .archiver(fixture.config().with_verify_after_archive(false))
        .with_file_operations(fake);
    assert!(archiver.archive(&[ds], false).error_statuses().is_empty());
}

#[test]
fn test_synchronized_dataset_skips_copy() {
    let fixture = Fixture::new();
    let ds = fixture.dataset("ds1");
    let fake = Arc::new(FakeOperations {
        in_sync: true,
        ..Default::default()
    });
    let archiver = fixture
        .archiver(fixture.config().with_synchronize_archive(true))
        .with_file_operations(fake.clone());

    let result = archiver.archive(&[ds.clone()], false);
    assert!(result.error_statuses().is_empty());
    assert_eq!(fake.copies.load(Ordering::SeqCst), 0);

    let archiver = fixture.archiver(fixture.config()).with_file_operations(fake.clone());
    archiver.archive(&[ds], false);
    assert_eq!(fake.copies.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Unarchive
// ============================================================================

#[test]
fn test_unarchive_without_share_reports_free_space_error() {
    let fixture = Fixture::new();
    let ds = fixture.dataset("ds1").with_size(11);
    let archiver = Archiver::from_config(
        fixture.config(),
        fixture.metadata.clone() as Arc<dyn MetadataService>,
        fixture.shares(&[("1", 100), ("2", 10)]),
    )
    .unwrap();
    archiver.archive(&[ds.clone()], true);
    fs::remove_dir_all(fixture.dir("1", &ds)).unwrap();

    let result = archiver.unarchive(&[ds]);
    assert_eq!(
        result.status_of("ds1"),
        Some(&ArchiveStatus::error(
            "Unarchiving of data set 'ds1' has failed, because no appropriate destination \
             share was found. Most probably there is not enough free space in the data store."
        ))
    );
    assert_eq!(
        fixture.metadata.status_of("ds1"),
        Some((ArchivingStatus::Archived, true))
    );
    assert!(!fixture.metadata.locks().is_locked("ds1"));
}

#[test]
fn test_unarchive_picks_share_with_enough_space() {
    let fixture = Fixture::new();
    let ds = fixture.dataset("ds1").with_size(11);
    let archiver = Archiver::from_config(
        fixture.config(),
        fixture.metadata.clone() as Arc<dyn MetadataService>,
        fixture.shares(&[("1", 100), ("2", 10), ("3", 12)]),
    )
    .unwrap();
    archiver.archive(&[ds.clone()], true);
    fs::remove_dir_all(fixture.dir("1", &ds)).unwrap();

    assert!(archiver.unarchive(&[ds.clone()]).error_statuses().is_empty());
    assert_eq!(fixture.metadata.share_id("ds1").unwrap(), "3");
    assert!(fixture.dir("3", &ds).join("readme.txt").is_file());
}

#[test]
fn test_unarchive_short_circuits_when_still_in_store() {
    let fixture = Fixture::new();
    let ds = fixture.dataset("ds1");
    let fake = Arc::new(FakeOperations::default());
    let archiver = fixture.archiver(fixture.config()).with_file_operations(fake);

    let result = archiver.unarchive(&[ds]);
    assert_eq!(result.status_of("ds1"), Some(&ArchiveStatus::Ok));
    assert_eq!(fixture.metadata.share_id("ds1").unwrap(), "1");
    assert_eq!(
        fixture.metadata.status_of("ds1"),
        Some((ArchivingStatus::Available, true))
    );
}

#[test]
fn test_failed_retrieval_stays_archived() {
    let fixture = Fixture::new();
    let ds = fixture.dataset("ds1");
    fs::remove_dir_all(fixture.dir("1", &ds)).unwrap();
    let archiver = fixture.archiver(fixture.config());

    let result = archiver.unarchive(&[ds]);
    assert_eq!(
        result.status_of("ds1"),
        Some(&ArchiveStatus::error("destination doesn't exist"))
    );
    assert_eq!(
        fixture.metadata.status_of("ds1"),
        Some((ArchivingStatus::Archived, true))
    );
    assert_eq!(fixture.metadata.share_id("ds1").unwrap(), "1");
}

// ============================================================================
// Delete and container expansion
// ============================================================================

#[test]
fn test_delete_from_archive_marks_by_default() {
    let fixture = Fixture::new();
    let ds = fixture.dataset("ds1");
    let archiver = fixture.archiver(fixture.config());
    archiver.archive(&[ds.clone()], false);

    let result = archiver.delete_from_archive(&[ds.clone()]);
    assert!(result.error_statuses().is_empty());
    assert!(fixture.archive.path().join("DELETED/ds1").is_file());
    assert!(fixture.archive.path().join("a/ds1").is_dir());

    let archiver = fixture.archiver(fixture.config().with_only_mark_as_deleted(false));
    archiver.delete_from_archive(&[ds.clone()]);
    assert!(!fixture.archive.path().join("a/ds1").exists());
    assert_eq!(archiver.is_present_in_archive(&ds), BooleanStatus::False(None));
}

#[test]
fn test_dataset_codes_for_unarchiving_expands_containers() {
    let fixture = Fixture::new();
    fixture.metadata.register_container(&["c1", "c2", "c3"]);
    let archiver = fixture.archiver(fixture.config());
    let codes = archiver
        .dataset_codes_for_unarchiving(&["c2".to_string(), "x".to_string(), "c3".to_string()])
        .unwrap();
    assert_eq!(codes, vec!["c1", "c2", "c3", "x"]);
}

#[test]
fn test_synchronization_diagnostics() {
    let fixture = Fixture::new();
    let ds = fixture.dataset("ds1");
    let archiver = fixture.archiver(fixture.config());
    assert!(!archiver.is_synchronized_with_archive(&ds).is_true());
    archiver.archive(&[ds.clone()], false);
    assert_eq!(archiver.is_synchronized_with_archive(&ds), BooleanStatus::True);
}

// ============================================================================
// Configuration errors
// ============================================================================

fn build(fixture: &Fixture, config: ArchiverConfig) -> Result<Archiver, ConfigError> {
    Archiver::from_config(
        config,
        fixture.metadata.clone() as Arc<dyn MetadataService>,
        fixture.shares(&[("1", 1)]),
    )
}

#[test]
fn test_configuration_errors() {
    let fixture = Fixture::new();

    let result = build(&fixture, ArchiverConfig::new(""));
    assert!(matches!(result, Err(ConfigError::InvalidDestination { .. })));

    let result = build(&fixture, fixture.config().with_share_finder("best-fit", BTreeMap::new()));
    assert!(matches!(result, Err(ConfigError::UnknownShareFinder(name)) if name == "best-fit"));

    let result = build(&fixture, fixture.config().with_share_finder("mapping", BTreeMap::new()));
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));

    let result = build(
        &fixture,
        ArchiverConfig::new("host:/archive").with_package(PackageConfig::default()),
    );
    assert!(matches!(result, Err(ConfigError::InvalidDestination { .. })));

    let result = build(&fixture, ArchiverConfig::new("host:/archive"));
    assert!(matches!(result, Err(ConfigError::ExecutableNotConfigured("rsync"))));

    let result = build(&fixture, fixture.config().with_mapping_file("/no/such/mapping.tsv"));
    assert!(matches!(result, Err(ConfigError::MappingFile { .. })));
}

struct LastShareFinder;

impl ShareFinder for LastShareFinder {
    fn try_to_find_share(&self, _dataset: &DatasetDescriptor, shares: &[Share]) -> Option<Share> {
        shares.last().cloned()
    }
}

fn last_share_factory(
    _context: &ShareFinderContext,
) -> Result<Box<dyn ShareFinder>, ConfigError> {
    Ok(Box::new(LastShareFinder))
}

#[test]
fn test_custom_share_finder_from_registry() {
    let fixture = Fixture::new();
    let ds = fixture.dataset("ds1");
    let mut registry = ShareFinderRegistry::default();
    registry.register("last", last_share_factory);
    let archiver = Archiver::from_config_with_registry(
        fixture.config().with_share_finder("last", BTreeMap::new()),
        fixture.metadata.clone() as Arc<dyn MetadataService>,
        fixture.shares(&[("1", 0), ("2", 0), ("3", 0)]),
        &registry,
    )
    .unwrap();
    archiver.archive(&[ds.clone()], true);
    fs::remove_dir_all(fixture.dir("1", &ds)).unwrap();

    assert!(archiver.unarchive(&[ds]).error_statuses().is_empty());
    assert_eq!(fixture.metadata.share_id("ds1").unwrap(), "3");
}
