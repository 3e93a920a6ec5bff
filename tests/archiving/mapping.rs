//! Archive folders and shares chosen through a mapping file

use crate::common::*;
use coldstore::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

fn write_mapping(dir: &Path, rows: &[(&str, &str, &Path)]) -> PathBuf {
    let mut content = String::from("Identifier\tShare ID\tArchive Folder\n");
    for (identifier, shares, folder) in rows {
        content.push_str(&format!("{}\t{}\t{}\n", identifier, shares, folder.display()));
    }
    let path = dir.join("mapping.tsv");
    fs::write(&path, content).unwrap();
    path
}

// =============================================================================
// ARCHIVE FOLDER
// =============================================================================

#[test]
fn test_space_rule_routes_package_to_mapped_folder() {
    let store = Store::new();
    let ds = store.dataset("ds1").with_size(42);
    let folder = store.archive.path().join("archiveDir");
    fs::create_dir(&folder).unwrap();
    let mapping = write_mapping(store.archive.path(), &[("/S", "1", folder.as_path())]);

    let archiver = store.archiver(
        store
            .config()
            .with_mapping_file(&mapping)
            .with_package(PackageConfig::default()),
    );
    let result = archiver.archive(&[ds.clone()], false);

    assert!(result.error_statuses().is_empty(), "{:?}", result);
    assert!(folder.join("ds1.zip").is_file());
    assert!(!store.archive.path().join("ds1.zip").exists());
    assert_eq!(
        store.metadata.status_of("ds1"),
        Some((ArchivingStatus::Available, true))
    );
    assert_eq!(archiver.is_present_in_archive(&ds), BooleanStatus::True);
}

#[test]
fn test_missing_mapped_folder_is_created_on_request() {
    let store = Store::new();
    let folder = store.archive.path().join("new/folder");
    let mapping = write_mapping(store.archive.path(), &[("/S/P", "", folder.as_path())]);

    let result = Archiver::from_config(
        store.config().with_mapping_file(&mapping),
        store.metadata.clone(),
        store.shares(),
    );
    assert!(matches!(
        result,
        Err(ConfigError::MissingArchiveFolder(path)) if path == folder
    ));

    store.archiver(store.config().with_mapping_file(&mapping).with_create_archives(true));
    assert!(folder.is_dir());
}

#[test]
fn test_small_datasets_use_second_folder() {
    let store = Store::new();
    let big = store.archive.path().join("big");
    let small = store.archive.path().join("small");
    fs::create_dir(&big).unwrap();
    fs::create_dir(&small).unwrap();
    let folders = PathBuf::from(format!("{}, {}", big.display(), small.display()));
    let mapping = write_mapping(store.archive.path(), &[("/S/P/E", "", folders.as_path())]);

    let archiver = store.archiver(
        store
            .config()
            .with_mapping_file(&mapping)
            .with_small_dataset_size_limit(100)
            .with_package(PackageConfig::default()),
    );
    let tiny = store.dataset("tiny").with_size(50);
    let large = store.dataset("large").with_size(5000);
    let result = archiver.archive(&[tiny, large], false);

    assert!(result.error_statuses().is_empty(), "{:?}", result);
    assert!(small.join("tiny.zip").is_file());
    assert!(big.join("large.zip").is_file());
}

// =============================================================================
// SHARES
// =============================================================================

#[test]
fn test_mapping_share_finder_prefers_mapped_share() {
    let store = Store::new();
    let ds = store.dataset("ds1").with_size(42);
    let folder = store.archive.path().join("archiveDir");
    fs::create_dir(&folder).unwrap();
    let mapping = write_mapping(store.archive.path(), &[("/S", "3, 2", folder.as_path())]);

    let archiver = store.archiver(
        store
            .config()
            .with_mapping_file(&mapping)
            .with_share_finder("mapping", BTreeMap::new()),
    );
    assert!(archiver.archive(&[ds.clone()], true).error_statuses().is_empty());
    store.evict(&ds);

    assert!(archiver.unarchive(&[ds.clone()]).error_statuses().is_empty());
    assert_eq!(store.metadata.share_id("ds1").unwrap(), "3");
    assert_fixture_tree(&store.dir("3", &ds));
}
