//! Packaged mode: one zip or tar package per dataset

use crate::common::*;
use coldstore_packaging::{PackageReader, METADATA_FILE_NAME};
use coldstore::prelude::*;
use std::fs;

fn packaged(format: &str, compress: bool) -> PackageConfig {
    PackageConfig {
        format: format.to_string(),
        compress,
        with_sharding: false,
    }
}

// =============================================================================
// ROUND TRIPS
// =============================================================================

#[test]
fn test_packaged_round_trip_in_each_format() {
    for (format, compress, file) in [
        ("zip", true, "ds1.zip"),
        ("zip", false, "ds1.zip"),
        ("tar", true, "ds1.tar.zst"),
        ("tar", false, "ds1.tar"),
    ] {
        let store = Store::new();
        let ds = store.dataset("ds1");
        let archiver = store.archiver(store.config().with_package(packaged(format, compress)));

        let result = archiver.archive(&[ds.clone()], true);
        assert!(result.error_statuses().is_empty(), "{} {:?}", format, result);
        assert!(store.archive.path().join(file).is_file(), "{}", file);
        assert_eq!(
            store.metadata.status_of("ds1"),
            Some((ArchivingStatus::Archived, true))
        );

        store.evict(&ds);
        let result = archiver.unarchive(&[ds.clone()]);
        assert!(result.error_statuses().is_empty(), "{} {:?}", format, result);
        let share = store.metadata.share_id("ds1").unwrap();
        assert_ne!(share, "1");
        assert_fixture_tree(&store.dir(&share, &ds));
    }
}

#[test]
fn test_package_carries_metadata_entry() {
    let store = Store::new();
    let ds = store.dataset("ds1");
    let archiver = store.archiver(store.config().with_package(PackageConfig::default()));
    archiver.archive(&[ds], false);

    let options = archiver.config().package_options().unwrap().unwrap();
    let reader = PackageReader::open(store.archive.path().join("ds1.zip"), options).unwrap();
    let meta = String::from_utf8(reader.read_file(METADATA_FILE_NAME).unwrap()).unwrap();
    assert!(meta.contains("ds1"));
    let tree = reader.hierarchy().unwrap();
    assert!(tree.find("ds1/original/data.bin").is_some());
    assert!(tree.find(METADATA_FILE_NAME).is_none());
}

#[test]
fn test_sharded_packages_nest_under_location() {
    let store = Store::new();
    let ds = store.dataset("ds1");
    let archiver = store.archiver(store.config().with_package(PackageConfig {
        with_sharding: true,
        ..PackageConfig::default()
    }));
    archiver.archive(&[ds], false);
    assert!(store.archive.path().join("1A/ds1/ds1.zip").is_file());
}

// =============================================================================
// IGNORE EXISTING
// =============================================================================

#[test]
fn test_existing_package_is_kept_when_ignoring_existing() {
    let store = Store::new();
    let ds = store.dataset("ds1");
    let archiver = store.archiver(store.config().with_package(PackageConfig::default()));
    archiver.archive(&[ds.clone()], false);
    let package = store.archive.path().join("ds1.zip");
    let first = fs::metadata(&package).unwrap().len();

    fs::write(store.dir("1", &ds).join("original/extra.bin"), vec![1u8; 4096]).unwrap();
    let archiver = store.archiver(
        store
            .config()
            .with_package(PackageConfig::default())
            .with_verify_after_archive(false),
    );
    assert!(archiver.archive(&[ds.clone()], false).error_statuses().is_empty());
    assert_eq!(fs::metadata(&package).unwrap().len(), first);

    let archiver = store.archiver(
        store
            .config()
            .with_package(PackageConfig::default())
            .with_ignore_existing(false),
    );
    assert!(archiver.archive(&[ds], false).error_statuses().is_empty());
    assert!(fs::metadata(&package).unwrap().len() > first);
}

// =============================================================================
// DELETE
// =============================================================================

#[test]
fn test_delete_and_mark_packages() {
    let store = Store::new();
    let ds = store.dataset("ds1");
    let archiver = store.archiver(store.config().with_package(PackageConfig::default()));
    archiver.archive(&[ds.clone()], false);

    assert!(archiver.delete_from_archive(&[ds.clone()]).error_statuses().is_empty());
    assert!(store.archive.path().join("DELETED/ds1").is_file());
    assert!(archiver.is_present_in_archive(&ds).is_true());

    let archiver = store.archiver(
        store
            .config()
            .with_package(PackageConfig::default())
            .with_only_mark_as_deleted(false),
    );
    assert!(archiver.delete_from_archive(&[ds.clone()]).error_statuses().is_empty());
    assert!(!store.archive.path().join("ds1.zip").exists());
    assert!(!archiver.is_present_in_archive(&ds).is_true());
}

#[test]
fn test_packages_need_local_destination() {
    let store = Store::new();
    let result = Archiver::from_config(
        ArchiverConfig::new("backup:/archive").with_package(PackageConfig::default()),
        store.metadata.clone(),
        store.shares(),
    );
    let error: coldstore::Error = result.unwrap_err().into();
    assert!(error.is_config());
}
