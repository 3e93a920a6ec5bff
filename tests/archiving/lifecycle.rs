//! Plain-copy archiving: archive, unarchive, delete and failure handling

use crate::common::*;
use coldstore::prelude::*;
use std::fs;

// =============================================================================
// ROUND TRIP
// =============================================================================

#[test]
fn test_archive_evict_unarchive() {
    let store = Store::new();
    let ds = store.dataset("ds1");
    let archiver = store.archiver(store.config());

    let result = archiver.archive(&[ds.clone()], true);
    assert!(result.error_statuses().is_empty(), "{:?}", result);
    assert_eq!(
        store.metadata.status_of("ds1"),
        Some((ArchivingStatus::Archived, true))
    );
    assert_eq!(store.metadata.deletion_requests().len(), 1);
    assert_fixture_tree(&store.archive.path().join("1A/ds1"));

    store.evict(&ds);
    let result = archiver.unarchive(&[ds.clone()]);
    assert!(result.error_statuses().is_empty(), "{:?}", result);
    assert_eq!(store.metadata.share_id("ds1").unwrap(), "2");
    assert_eq!(
        store.metadata.status_of("ds1"),
        Some((ArchivingStatus::Available, true))
    );
    assert_fixture_tree(&store.dir("2", &ds));
}

#[test]
fn test_configuration_from_toml_file() {
    let store = Store::new();
    let ds = store.dataset("ds1");
    let path = store.store.path().join("coldstore.toml");
    fs::write(
        &path,
        format!(
            "destination = \"{}\"\nmax_parallelism = 2\n\n[package]\nformat = \"tar\"\n",
            store.archive.path().display()
        ),
    )
    .unwrap();

    let config = ArchiverConfig::load(&path).unwrap();
    let archiver = store.archiver(config);
    assert!(archiver.archive(&[ds], false).error_statuses().is_empty());
    assert!(store.archive.path().join("ds1.tar.zst").is_file());
}

// =============================================================================
// FAILURES
// =============================================================================

#[test]
fn test_one_failure_does_not_stop_the_batch() {
    let store = Store::new();
    let ok1 = store.dataset("ok1");
    let broken = store.dataset("broken");
    let ok2 = store.dataset("ok2");
    store.evict(&broken);
    let archiver = store.archiver(store.config().with_max_parallelism(3));

    let result = archiver.archive(&[ok1, broken, ok2], true);
    assert_eq!(result.successful_codes(), vec!["ok1", "ok2"]);
    assert_eq!(result.failed_codes(), vec!["broken"]);
    assert_eq!(
        store.metadata.status_of("broken"),
        Some((ArchivingStatus::Available, false))
    );
    assert_eq!(store.metadata.deletion_requests().len(), 2);
    for code in ["ok1", "broken", "ok2"] {
        assert!(!store.metadata.locks().is_locked(code), "{}", code);
    }
}

#[test]
fn test_unarchive_of_unknown_archive_copy_keeps_archived_status() {
    let store = Store::new();
    let ds = store.dataset("ds1");
    store.evict(&ds);
    let archiver = store.archiver(store.config());

    let result = archiver.unarchive(&[ds]);
    assert_eq!(result.failed_codes(), vec!["ds1"]);
    assert_eq!(
        store.metadata.status_of("ds1"),
        Some((ArchivingStatus::Archived, true))
    );
    assert!(!store.metadata.locks().is_locked("ds1"));
}

// =============================================================================
// DELETE AND CONTAINERS
// =============================================================================

#[test]
fn test_delete_from_archive() {
    let store = Store::new();
    let ds = store.dataset("ds1");
    let archiver = store.archiver(store.config().with_only_mark_as_deleted(false));
    archiver.archive(&[ds.clone()], false);
    assert!(archiver.is_synchronized_with_archive(&ds).is_true());

    assert!(archiver.delete_from_archive(&[ds.clone()]).error_statuses().is_empty());
    assert!(!store.archive.path().join("1A/ds1").exists());
    assert!(!archiver.is_present_in_archive(&ds).is_true());
}

#[test]
fn test_container_members_are_unarchived_together() {
    let store = Store::new();
    store.metadata.register_container(&["a", "b"]);
    let archiver = store.archiver(store.config());
    let codes = archiver
        .dataset_codes_for_unarchiving(&["b".to_string(), "c".to_string(), "a".to_string()])
        .unwrap();
    assert_eq!(codes, vec!["a", "b", "c"]);
}

// =============================================================================
// LOGGING
// =============================================================================

#[test]
fn test_logging_init_is_idempotent() {
    coldstore::logging::init("debug");
    assert!(!coldstore::logging::init("debug"));
}
