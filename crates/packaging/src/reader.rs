//! Package reader
//!
//! Reads tar, tar+zstd and zip packages entry by entry. Entries are never
//! buffered as a whole, so packages of any size can be listed or extracted.

use crate::format::{PackageFormat, PackageOptions};
use crate::metadata::METADATA_FILE_NAME;
use crate::writer::{modified_from_extra, system_time_of};
use crate::{PackageError, Result};
use coldstore_hierarchy::{crc32_of_reader, HierarchyBuilder, HierarchyNode};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// One entry while iterating a package.
pub struct PackageEntry<'a> {
    /// Entry name without trailing slash
    pub name: String,
    /// Whether the entry is a directory
    pub is_directory: bool,
    /// Uncompressed size in bytes
    pub size: u64,
    /// Stored modification time
    pub modified: Option<SystemTime>,
    stored_checksum: Option<u32>,
    content: &'a mut dyn Read,
}

impl PackageEntry<'_> {
    /// CRC32 of the entry content, from the container index when it has one.
    pub fn checksum(&mut self) -> Result<u32> {
        match self.stored_checksum {
            Some(checksum) => Ok(checksum),
            None => Ok(crc32_of_reader(self.content)?),
        }
    }

    /// Remaining content of the entry.
    pub fn content(&mut self) -> &mut dyn Read {
        self.content
    }
}

/// Reads one package file.
#[derive(Debug, Clone)]
pub struct PackageReader {
    path: PathBuf,
    options: PackageOptions,
}

impl PackageReader {
    /// Reader for the package at `path`, written with `options`.
    pub fn open(path: impl Into<PathBuf>, options: PackageOptions) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(PackageError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("package '{}' does not exist", path.display()),
            )));
        }
        Ok(PackageReader { path, options })
    }

    /// Package file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Visit entries in stored order until `visit` returns `false`.
    pub fn visit<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(PackageEntry<'_>) -> Result<bool>,
    {
        match self.options.format {
            PackageFormat::Zip => {
                let file = BufReader::new(File::open(&self.path)?);
                let mut archive = zip::ZipArchive::new(file)?;
                for index in 0..archive.len() {
                    let mut file = archive.by_index(index)?;
                    let modified = modified_from_extra(file.extra_data())
                        .or_else(|| system_time_of(file.last_modified()));
                    let entry = PackageEntry {
                        name: normalize(file.name()),
                        is_directory: file.is_dir(),
                        size: file.size(),
                        modified,
                        stored_checksum: Some(file.crc32()),
                        content: &mut file,
                    };
                    if !visit(entry)? {
                        break;
                    }
                }
            }
            PackageFormat::Tar => {
                let mut archive = tar::Archive::new(self.tar_stream()?);
                for entry in archive.entries()? {
                    let mut entry = entry?;
                    let name = normalize(&entry.path()?.to_string_lossy());
                    let header = entry.header();
                    let is_directory = header.entry_type().is_dir();
                    let size = header.size()?;
                    let modified = header
                        .mtime()
                        .ok()
                        .map(|secs| SystemTime::UNIX_EPOCH + Duration::from_secs(secs));
                    let package_entry = PackageEntry {
                        name,
                        is_directory,
                        size,
                        modified,
                        stored_checksum: None,
                        content: &mut entry,
                    };
                    if !visit(package_entry)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn tar_stream(&self) -> Result<Box<dyn Read>> {
        let file = File::open(&self.path)?;
        if self.options.compress {
            let decoder = zstd::Decoder::new(file)
                .map_err(|e| PackageError::Compression(format!("zstd decode: {}", e)))?;
            Ok(Box::new(decoder))
        } else {
            Ok(Box::new(BufReader::new(file)))
        }
    }

    /// Tree of all entries except the metadata entry, with CRC32 checksums.
    pub fn hierarchy(&self) -> Result<HierarchyNode> {
        let mut builder = HierarchyBuilder::new("");
        self.visit(|mut entry| {
            if entry.name == METADATA_FILE_NAME {
                return Ok(true);
            }
            if entry.is_directory {
                builder.add_directory(&entry.name);
            } else {
                let checksum = entry.checksum()?;
                builder.add_file(&entry.name, entry.size, Some(checksum));
            }
            Ok(true)
        })?;
        Ok(builder.build())
    }

    /// Content of the entry `name`.
    pub fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let mut data = None;
        self.visit(|mut entry| {
            if entry.is_directory || entry.name != name {
                return Ok(true);
            }
            let mut buffer = Vec::with_capacity(entry.size as usize);
            entry.content().read_to_end(&mut buffer)?;
            data = Some(buffer);
            Ok(false)
        })?;
        data.ok_or_else(|| PackageError::EntryNotFound(name.to_string()))
    }

    /// Extract the entry `prefix` and everything below it into `target`.
    ///
    /// `target` takes the place of `prefix`. Modification times are restored,
    /// directories last so that writing their children does not bump them.
    pub fn extract(&self, prefix: &str, target: &Path) -> Result<()> {
        let mut directories: Vec<(PathBuf, SystemTime)> = Vec::new();
        let mut found = false;
        self.visit(|mut entry| {
            let relative = match strip_entry_prefix(&entry.name, prefix) {
                Some(relative) => relative.to_string(),
                None => return Ok(true),
            };
            let destination = safe_join(target, &relative)
                .ok_or_else(|| PackageError::InvalidEntry(entry.name.clone()))?;
            found = true;

            if entry.is_directory {
                fs::create_dir_all(&destination)?;
                if let Some(modified) = entry.modified {
                    directories.push((destination, modified));
                }
            } else {
                if let Some(parent) = destination.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut out = File::create(&destination)?;
                io::copy(entry.content(), &mut out)?;
                if let Some(modified) = entry.modified {
                    out.set_modified(modified)?;
                }
            }
            Ok(true)
        })?;

        if !found {
            return Err(PackageError::EntryNotFound(prefix.to_string()));
        }
        for (directory, modified) in directories.into_iter().rev() {
            if let Err(e) = File::open(&directory).and_then(|d| d.set_modified(modified)) {
                warn!(path = %directory.display(), error = %e, "Cannot restore directory mtime");
            }
        }
        debug!(package = %self.path.display(), prefix, target = %target.display(), "Extracted package");
        Ok(())
    }
}

fn normalize(name: &str) -> String {
    name.trim_start_matches("./").trim_end_matches('/').to_string()
}

fn strip_entry_prefix<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(name);
    }
    if name == prefix {
        return Some("");
    }
    name.strip_prefix(prefix).and_then(|rest| rest.strip_prefix('/'))
}

fn safe_join(target: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    if relative.components().all(|c| matches!(c, Component::Normal(_))) {
        Some(target.join(relative))
    } else {
        None
    }
}
