//! Destination routing by hierarchical identifier
//!
//! Resolves, per dataset, the archive folder and the candidate live shares.
//! Without a mapping file every dataset goes to the default folder and has
//! no preferred shares.

use crate::mapping::{MappingRule, MappingTable};
use coldstore_core::{ConfigError, DatasetDescriptor};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Routes datasets to archive folders and live shares.
#[derive(Debug, Clone, Default)]
pub struct DestinationRouter {
    table: Option<MappingTable>,
    small_dataset_size_limit: Option<u64>,
}

impl DestinationRouter {
    /// Router that maps everything to the default folder.
    pub fn pass_through() -> Self {
        Self::default()
    }

    /// Router over an already loaded table.
    pub fn new(table: MappingTable) -> Self {
        DestinationRouter {
            table: Some(table),
            small_dataset_size_limit: None,
        }
    }

    /// Load the mapping file at `path`, or build a pass-through router if `None`.
    pub fn load(path: Option<&Path>, create_missing_folders: bool) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Ok(Self::new(MappingTable::load(path, create_missing_folders)?)),
            None => Ok(Self::pass_through()),
        }
    }

    /// Send datasets of at most `limit` bytes to the small-dataset folder.
    pub fn with_small_dataset_size_limit(mut self, limit: Option<u64>) -> Self {
        self.small_dataset_size_limit = limit;
        self
    }

    /// Whether a mapping table is configured.
    pub fn has_mapping(&self) -> bool {
        self.table.is_some()
    }

    /// Most specific rule matching the dataset, if any.
    pub fn rule_for(&self, dataset: &DatasetDescriptor) -> Option<&MappingRule> {
        self.table
            .as_ref()
            .and_then(|t| t.best_match(&dataset.identifier_chain()))
    }

    /// Archive folder for `dataset`, falling back to `default_folder`.
    pub fn resolve_archive_folder(
        &self,
        dataset: &DatasetDescriptor,
        default_folder: &Path,
    ) -> PathBuf {
        let folder = self
            .rule_for(dataset)
            .and_then(|rule| self.pick_folder(rule, dataset))
            .unwrap_or_else(|| default_folder.to_path_buf());
        debug!(code = %dataset.code, folder = %folder.display(), "Resolved archive folder");
        folder
    }

    /// Preferred share ids for `dataset`, possibly empty.
    pub fn resolve_share_ids(&self, dataset: &DatasetDescriptor) -> Vec<String> {
        self.rule_for(dataset)
            .map(|rule| rule.share_ids.clone())
            .unwrap_or_default()
    }

    fn pick_folder(&self, rule: &MappingRule, dataset: &DatasetDescriptor) -> Option<PathBuf> {
        match rule.archive_folders.as_slice() {
            [] => None,
            [only] => Some(only.clone()),
            [big, small, ..] => {
                let is_small = match (self.small_dataset_size_limit, dataset.size) {
                    (Some(limit), Some(size)) => size <= limit,
                    _ => false,
                };
                Some(if is_small { small.clone() } else { big.clone() })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(content: &str) -> MappingTable {
        MappingTable::parse(Path::new("mapping.tsv"), content).unwrap()
    }

    fn dataset() -> DatasetDescriptor {
        DatasetDescriptor::new("ds1", "a/ds1").with_experiment("S1", "P1", "E1")
    }

    #[test]
    fn test_most_specific_rule_wins_regardless_of_order() {
        let router = DestinationRouter::new(table(
            "Identifier\tShare IDs\tArchive Folder\n\
             /S1\t1\t/a/space\n\
             /S1/P1\t2\t/a/project\n\
             /S1/P1/E1\t3\t/a/experiment\n",
        ));
        let folder = router.resolve_archive_folder(&dataset(), Path::new("/default"));
        assert_eq!(folder, PathBuf::from("/a/experiment"));
        assert_eq!(router.resolve_share_ids(&dataset()), vec!["3"]);
    }

    #[test]
    fn test_empty_folder_cell_falls_back_to_default() {
        let router = DestinationRouter::new(table(
            "Identifier\tShare IDs\tArchive Folder\n/S1/P1/E1\t3, 1\t\n",
        ));
        let folder = router.resolve_archive_folder(&dataset(), Path::new("/default"));
        assert_eq!(folder, PathBuf::from("/default"));
        assert_eq!(router.resolve_share_ids(&dataset()), vec!["3", "1"]);
    }

    #[test]
    fn test_no_match_and_pass_through() {
        let router = DestinationRouter::new(table("Identifier\tShare IDs\n/OTHER\t1\n"));
        assert_eq!(
            router.resolve_archive_folder(&dataset(), Path::new("/default")),
            PathBuf::from("/default")
        );
        assert!(router.resolve_share_ids(&dataset()).is_empty());

        let router = DestinationRouter::pass_through();
        assert!(!router.has_mapping());
        assert!(router.resolve_share_ids(&dataset()).is_empty());
    }

    #[test]
    fn test_big_and_small_folders() {
        let content = "Identifier\tShare IDs\tArchive Folder\n/S1\t1\t/big, /small\n";
        let router = DestinationRouter::new(table(content)).with_small_dataset_size_limit(Some(100));

        let small = dataset().with_size(100);
        let big = dataset().with_size(101);
        let unknown = dataset();
        assert_eq!(router.resolve_archive_folder(&small, Path::new("/d")), PathBuf::from("/small"));
        assert_eq!(router.resolve_archive_folder(&big, Path::new("/d")), PathBuf::from("/big"));
        assert_eq!(router.resolve_archive_folder(&unknown, Path::new("/d")), PathBuf::from("/big"));

        let no_limit = DestinationRouter::new(table(content));
        assert_eq!(no_limit.resolve_archive_folder(&small, Path::new("/d")), PathBuf::from("/big"));
    }

    #[test]
    fn test_load_without_path_is_pass_through() {
        let router = DestinationRouter::load(None, false).unwrap();
        assert!(!router.has_mapping());
    }
}
