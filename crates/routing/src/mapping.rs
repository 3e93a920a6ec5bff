//! Mapping file loading
//!
//! The mapping file is a tab-separated table with a header row:
//!
//! ```text
//! Identifier      Share IDs       Archive Folder
//! /S1/P1/E1       2, 3            /archive/e1
//! /S1             1
//! ```
//!
//! Column names are matched case-insensitively. `Space` is accepted instead
//! of `Identifier` and `Share ID` instead of `Share IDs`; a bare space code
//! is treated as `/<code>`. The archive folder cell may hold two
//! comma-separated folders, the second being used for small datasets.

use coldstore_core::ConfigError;
use std::path::{Path, PathBuf};
use tracing::info;

/// One row of the mapping file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingRule {
    /// Upper-cased identifier, `/SPACE`, `/SPACE/PROJECT` or `/SPACE/PROJECT/EXPERIMENT`
    pub identifier: String,
    /// Share ids in preference order
    pub share_ids: Vec<String>,
    /// Archive folders: none, one, or `[big, small]`
    pub archive_folders: Vec<PathBuf>,
}

/// Immutable set of mapping rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    rules: Vec<MappingRule>,
}

impl MappingTable {
    /// Table over `rules`.
    pub fn new(rules: Vec<MappingRule>) -> Self {
        MappingTable { rules }
    }

    /// Load and validate a mapping file.
    ///
    /// Archive folders must exist as directories; with `create_missing_folders`
    /// they are created instead.
    pub fn load(path: &Path, create_missing_folders: bool) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::mapping(path, format!("cannot be read: {}", e)))?;
        let table = Self::parse(path, &content)?;
        for rule in &table.rules {
            for folder in &rule.archive_folders {
                ensure_folder(folder, create_missing_folders)?;
            }
        }
        info!("Mapping file '{}' successfully loaded.", path.display());
        Ok(table)
    }

    /// Parse mapping file content without touching the filesystem.
    pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let mut lines = content
            .lines()
            .filter(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'));
        let header = lines
            .next()
            .ok_or_else(|| ConfigError::mapping(path, "is empty"))?;
        let columns = Columns::from_header(path, header)?;

        let mut rules = Vec::new();
        for (index, line) in lines.enumerate() {
            let cells: Vec<&str> = line.split('\t').map(str::trim).collect();
            let cell = |i: Option<usize>| i.and_then(|i| cells.get(i).copied()).unwrap_or("");

            let raw_identifier = cell(Some(columns.identifier));
            if raw_identifier.is_empty() {
                return Err(ConfigError::mapping(
                    path,
                    format!("row {} has no identifier", index + 2),
                ));
            }
            rules.push(MappingRule {
                identifier: normalize_identifier(raw_identifier),
                share_ids: split_list(cell(columns.share_ids)),
                archive_folders: split_list(cell(columns.archive_folder))
                    .into_iter()
                    .map(PathBuf::from)
                    .collect(),
            });
        }
        Ok(MappingTable { rules })
    }

    /// All rules in file order.
    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Rule whose identifier equals `identifier`, ignoring case.
    pub fn rule_for(&self, identifier: &str) -> Option<&MappingRule> {
        let identifier = normalize_identifier(identifier);
        self.rules.iter().find(|r| r.identifier == identifier)
    }

    /// Most specific rule for an identifier chain ordered most specific first.
    pub fn best_match<S: AsRef<str>>(&self, chain: &[S]) -> Option<&MappingRule> {
        chain.iter().find_map(|id| self.rule_for(id.as_ref()))
    }
}

struct Columns {
    identifier: usize,
    share_ids: Option<usize>,
    archive_folder: Option<usize>,
}

impl Columns {
    fn from_header(path: &Path, header: &str) -> Result<Self, ConfigError> {
        let names: Vec<String> = header
            .split('\t')
            .map(|c| c.trim().to_ascii_lowercase())
            .collect();
        let position = |candidates: &[&str]| {
            names
                .iter()
                .position(|n| candidates.contains(&n.as_str()))
        };
        let identifier = position(&["identifier", "space"]).ok_or_else(|| {
            ConfigError::mapping(path, "header has no 'Identifier' or 'Space' column")
        })?;
        Ok(Columns {
            identifier,
            share_ids: position(&["share ids", "share id", "live share"]),
            archive_folder: position(&["archive folder"]),
        })
    }
}

fn normalize_identifier(raw: &str) -> String {
    let upper = raw.trim().trim_end_matches('/').to_uppercase();
    if upper.starts_with('/') {
        upper
    } else {
        format!("/{}", upper)
    }
}

fn split_list(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn ensure_folder(folder: &Path, create: bool) -> Result<(), ConfigError> {
    if folder.is_dir() {
        return Ok(());
    }
    if create {
        std::fs::create_dir_all(folder)?;
        info!(folder = %folder.display(), "Created archive folder");
        return Ok(());
    }
    Err(ConfigError::MissingArchiveFolder(folder.to_path_buf()))
}
