//! Archiver configuration
//!
//! Loaded from TOML or assembled with the builder-style setters. Every key
//! has a default, so an empty document plus a `destination` is a complete
//! configuration.
//!
//! ```toml
//! destination = "backup-host:/archive"
//! timeout_secs = 30
//! mapping_file = "/etc/coldstore/mapping.tsv"
//! small_dataset_size_limit = 1048576
//!
//! [package]
//! format = "tar"
//! with_sharding = true
//!
//! [executables]
//! rsync = "/usr/bin/rsync"
//! ssh = "/usr/bin/ssh"
//!
//! [share_finder]
//! kind = "simple"
//! params = { reserve_bytes = "1024" }
//! ```

use coldstore_core::ConfigError;
use coldstore_packaging::{PackageFormat, PackageOptions};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout of remote commands, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Top-level archiver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiverConfig {
    /// `path`, `host:path` or `host:module:path`
    pub destination: String,
    /// Timeout of remote commands and probes
    pub timeout_secs: u64,
    /// Do not re-transfer a dataset whose package already exists.
    ///
    /// Only packaged mode honours this. Plain copies always bring the
    /// archived copy up to date with the store.
    pub ignore_existing: bool,
    /// Compare store and archived copy after every archive
    pub verify_after_archive: bool,
    /// Deleting from the archive only leaves a marker
    pub only_mark_as_deleted: bool,
    /// Skip the copy of datasets already in sync with the destination
    pub synchronize_archive: bool,
    /// Mapping file for archive folders and share ids
    pub mapping_file: Option<PathBuf>,
    /// Create archive folders named in the mapping file if missing
    pub create_archives: bool,
    /// Datasets of at most this many bytes use the small-dataset folder
    pub small_dataset_size_limit: Option<u64>,
    /// Worker threads per batch
    pub max_parallelism: usize,
    /// Password file for rsync module destinations
    pub rsync_password_file: Option<PathBuf>,
    /// Packaged mode, if present
    pub package: Option<PackageConfig>,
    /// Executable paths
    pub executables: ExecutablesConfig,
    /// Share selection policy
    pub share_finder: ShareFinderConfig,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        ArchiverConfig {
            destination: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            ignore_existing: true,
            verify_after_archive: true,
            only_mark_as_deleted: true,
            synchronize_archive: false,
            mapping_file: None,
            create_archives: false,
            small_dataset_size_limit: None,
            max_parallelism: 1,
            rsync_password_file: None,
            package: None,
            executables: ExecutablesConfig::default(),
            share_finder: ShareFinderConfig::default(),
        }
    }
}

/// `[package]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackageConfig {
    /// `zip` or `tar`
    pub format: String,
    /// Deflate zip entries or zstd-compress tar streams
    pub compress: bool,
    /// Nest packages under the dataset location
    pub with_sharding: bool,
}

impl Default for PackageConfig {
    fn default() -> Self {
        PackageConfig {
            format: PackageFormat::Zip.to_string(),
            compress: true,
            with_sharding: false,
        }
    }
}

/// `[executables]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutablesConfig {
    /// Local rsync
    pub rsync: Option<PathBuf>,
    /// Local ssh
    pub ssh: Option<PathBuf>,
    /// `find` on the destination host
    pub find: Option<String>,
}

/// `[share_finder]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShareFinderConfig {
    /// Registered policy name
    pub kind: String,
    /// Free-form policy parameters
    pub params: BTreeMap<String, String>,
}

impl Default for ShareFinderConfig {
    fn default() -> Self {
        ShareFinderConfig {
            kind: "simple".to_string(),
            params: BTreeMap::new(),
        }
    }
}

impl ArchiverConfig {
    /// Configuration archiving to `destination`, everything else default.
    pub fn new(destination: impl Into<String>) -> Self {
        ArchiverConfig {
            destination: destination.into(),
            ..Default::default()
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Read and parse the TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Timeout of remote commands.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Package options if packaged mode is configured.
    pub fn package_options(&self) -> Result<Option<PackageOptions>, ConfigError> {
        let package = match &self.package {
            Some(package) => package,
            None => return Ok(None),
        };
        let format = PackageFormat::parse(&package.format).ok_or_else(|| {
            ConfigError::invalid_value(
                "package.format",
                format!("expected 'zip' or 'tar', got '{}'", package.format),
            )
        })?;
        Ok(Some(PackageOptions {
            format,
            compress: package.compress,
            with_sharding: package.with_sharding,
        }))
    }

    /// Check values that cannot be expressed in the types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_parallelism == 0 {
            return Err(ConfigError::invalid_value(
                "max_parallelism",
                "must be at least 1",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::invalid_value("timeout_secs", "must be at least 1"));
        }
        self.package_options()?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Builder-style setters
    // ------------------------------------------------------------------------

    /// Set the destination specification.
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    /// Set the remote command timeout.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the ignore-existing flag.
    pub fn with_ignore_existing(mut self, ignore_existing: bool) -> Self {
        self.ignore_existing = ignore_existing;
        self
    }

    /// Set the verify-after-archive flag.
    pub fn with_verify_after_archive(mut self, verify: bool) -> Self {
        self.verify_after_archive = verify;
        self
    }

    /// Set the only-mark-as-deleted flag.
    pub fn with_only_mark_as_deleted(mut self, only_mark: bool) -> Self {
        self.only_mark_as_deleted = only_mark;
        self
    }

    /// Set the synchronize-archive flag.
    pub fn with_synchronize_archive(mut self, synchronize: bool) -> Self {
        self.synchronize_archive = synchronize;
        self
    }

    /// Set the mapping file.
    pub fn with_mapping_file(mut self, mapping_file: impl Into<PathBuf>) -> Self {
        self.mapping_file = Some(mapping_file.into());
        self
    }

    /// Set the create-archives flag.
    pub fn with_create_archives(mut self, create: bool) -> Self {
        self.create_archives = create;
        self
    }

    /// Set the small dataset size limit.
    pub fn with_small_dataset_size_limit(mut self, limit: u64) -> Self {
        self.small_dataset_size_limit = Some(limit);
        self
    }

    /// Set the number of worker threads per batch.
    pub fn with_max_parallelism(mut self, max_parallelism: usize) -> Self {
        self.max_parallelism = max_parallelism;
        self
    }

    /// Switch to packaged mode.
    pub fn with_package(mut self, package: PackageConfig) -> Self {
        self.package = Some(package);
        self
    }

    /// Set the rsync executable.
    pub fn with_rsync(mut self, rsync: impl Into<PathBuf>) -> Self {
        self.executables.rsync = Some(rsync.into());
        self
    }

    /// Set the ssh executable.
    pub fn with_ssh(mut self, ssh: impl Into<PathBuf>) -> Self {
        self.executables.ssh = Some(ssh.into());
        self
    }

    /// Select a share finder policy and its parameters.
    pub fn with_share_finder(
        mut self,
        kind: impl Into<String>,
        params: BTreeMap<String, String>,
    ) -> Self {
        self.share_finder = ShareFinderConfig {
            kind: kind.into(),
            params,
        };
        self
    }
}
