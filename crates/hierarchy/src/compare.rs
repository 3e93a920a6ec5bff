//! Hierarchy comparison
//!
//! Walks a store snapshot and an archive snapshot in lock-step and reports
//! the first discrepancy, depth-first in child order. This is the only place
//! where a successful archive is checked against the live copy.

use crate::node::{join_relative, HierarchyNode};
use coldstore_core::ArchiveStatus;

/// Whether file checksums take part in a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumPolicy {
    /// Compare CRC32 checksums when both sides have one
    #[default]
    Verify,
    /// Compare sizes only
    SizeOnly,
}

/// Compare `store` with `archive`.
///
/// `store_prefix` is prepended to every store path to obtain the path the
/// node must have in the archive, which lets a dataset be compared against
/// a subtree nested inside a larger container.
pub fn compare(
    store: &HierarchyNode,
    store_prefix: &str,
    archive: &HierarchyNode,
    policy: ChecksumPolicy,
) -> ArchiveStatus {
    match first_difference(store, store_prefix, archive, policy) {
        Some(message) => ArchiveStatus::Error(message),
        None => ArchiveStatus::Ok,
    }
}

fn first_difference(
    store: &HierarchyNode,
    store_prefix: &str,
    archive: &HierarchyNode,
    policy: ChecksumPolicy,
) -> Option<String> {
    let store_path = join_relative(store_prefix, store.relative_path());
    let archive_path = archive.relative_path();
    if store_path != archive_path {
        return Some(format!(
            "Different paths: Path in the store is '{}' and in the archive '{}'.",
            store_path, archive_path
        ));
    }

    if store.is_directory() != archive.is_directory() {
        return Some(format!(
            "The path '{}' should be in store and archive either a directory or a file \
             but not mixed: In the store it is a {} and in the archive it is a {}.",
            store_path,
            kind(store),
            kind(archive)
        ));
    }

    if store.is_directory() {
        let store_children = store.children();
        let archive_children = archive.children();
        if store_children.len() != archive_children.len() {
            return Some(format!(
                "The directory '{}' has in the store {} files but {} in the archive.",
                store_path,
                store_children.len(),
                archive_children.len()
            ));
        }
        return store_children
            .iter()
            .zip(archive_children)
            .find_map(|(s, a)| first_difference(s, store_prefix, a, policy));
    }

    if store.size() != archive.size() {
        return Some(format!(
            "The file '{}' has in the store {} bytes but {} in the archive.",
            store_path,
            store.size(),
            archive.size()
        ));
    }

    if policy == ChecksumPolicy::Verify {
        if let (Some(store_crc), Some(archive_crc)) = (store.checksum(), archive.checksum()) {
            if store_crc != archive_crc {
                return Some(format!(
                    "The file '{}' has in the store the checksum {:08x} but {:08x} in the archive.",
                    store_path, store_crc, archive_crc
                ));
            }
        }
    }
    None
}

fn kind(node: &HierarchyNode) -> &'static str {
    if node.is_directory() {
        "directory"
    } else {
        "file"
    }
}
