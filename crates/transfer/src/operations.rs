//! File operations contract
//!
//! A [`FileOperations`] implementation moves one dataset tree between its
//! store directory and one destination. Every expected failure comes back
//! as a status value; nothing here panics or returns `Err` for a single
//! dataset's problem.

use coldstore_core::{ArchiveStatus, BooleanStatus, DatasetDescriptor};
use coldstore_hierarchy::HierarchyNode;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Name of the folder holding soft-delete markers.
pub const MARKER_FOLDER: &str = "DELETED";

/// Archived copy of a dataset as seen by the comparator.
#[derive(Debug, Clone)]
pub struct ArchivedTree {
    /// Tree holding the archived dataset
    pub root: HierarchyNode,
    /// Path of the dataset inside `root`; empty if `root` is the dataset itself
    pub store_prefix: String,
}

impl ArchivedTree {
    /// The subtree that holds the dataset.
    pub fn dataset_node(&self) -> Option<&HierarchyNode> {
        self.root.find(&self.store_prefix)
    }
}

/// Moves dataset trees between the store and one destination.
pub trait FileOperations: Send + Sync {
    /// Where the dataset lives (or would live) at the destination.
    fn archived_location(&self, dataset: &DatasetDescriptor) -> String;

    /// Copy the store directory `source` of `dataset` to the destination.
    fn copy_to_destination(&self, source: &Path, dataset: &DatasetDescriptor) -> ArchiveStatus;

    /// Restore `dataset` from the destination into the store directory `target`.
    fn retrieve_from_destination(&self, target: &Path, dataset: &DatasetDescriptor)
        -> ArchiveStatus;

    /// Remove the archived copy. A missing copy is not an error.
    fn delete_from_destination(&self, dataset: &DatasetDescriptor) -> ArchiveStatus;

    /// Leave the archived copy in place and create a marker named after the code.
    fn mark_as_deleted(&self, dataset: &DatasetDescriptor) -> ArchiveStatus;

    /// Whether an archived copy exists.
    fn is_present_in_destination(&self, dataset: &DatasetDescriptor) -> BooleanStatus;

    /// Compare file listings of `source` and the archived copy.
    fn is_synchronized_with_destination(
        &self,
        source: &Path,
        dataset: &DatasetDescriptor,
    ) -> BooleanStatus;

    /// Snapshot of the archived copy for verification.
    fn archived_hierarchy(&self, dataset: &DatasetDescriptor) -> Result<ArchivedTree, String>;
}

/// Compare two `relative path -> size` listings.
///
/// All discrepancies are reported, one per line, sorted by path.
pub fn compare_listings(
    store: &BTreeMap<String, u64>,
    destination: &BTreeMap<String, u64>,
) -> BooleanStatus {
    let paths: BTreeSet<&String> = store.keys().chain(destination.keys()).collect();
    let mut report = String::new();
    for path in paths {
        let line = match (store.get(path), destination.get(path)) {
            (Some(s), Some(d)) if s != d => format!(
                "'{}' - different file sizes; store: {}, destination: {}",
                path, s, d
            ),
            (Some(_), None) => format!("'{}' - exists in store but is missing in destination", path),
            (None, Some(_)) => format!("'{}' - exists in destination but is missing in store", path),
            _ => continue,
        };
        report.push_str(&line);
        report.push('\n');
    }
    if report.is_empty() {
        BooleanStatus::True
    } else {
        BooleanStatus::false_with(format!("Inconsistencies:\n{}", report))
    }
}

/// `relative path -> size` of all files in a snapshot.
pub fn listing_of(node: &HierarchyNode) -> BTreeMap<String, u64> {
    let base = node.relative_path();
    node.files()
        .into_iter()
        .map(|f| {
            let path = f.relative_path();
            let relative = if base.is_empty() {
                path
            } else {
                path.strip_prefix(base)
                    .map(|p| p.trim_start_matches('/'))
                    .unwrap_or(path)
            };
            (relative.to_string(), f.size())
        })
        .collect()
}
