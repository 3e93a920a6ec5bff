//! Package builder
//!
//! Layout of every package:
//!
//! ```text
//! meta-data.tsv
//! <code>/
//! <code>/<every directory and file of the dataset tree>
//! ```
//!
//! The package is written next to its final path under a temporary name and
//! renamed once complete, so a reader never sees a half-written package.

use crate::format::PackageOptions;
use crate::metadata::METADATA_FILE_NAME;
use crate::writer::{create_writer, PackageWriter};
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Builds packages with fixed options.
#[derive(Debug, Clone, Copy, Default)]
pub struct Packager {
    options: PackageOptions,
}

impl Packager {
    /// Packager writing packages with `options`.
    pub fn new(options: PackageOptions) -> Self {
        Packager { options }
    }

    /// Options of this packager.
    pub fn options(&self) -> &PackageOptions {
        &self.options
    }

    /// Build the package of dataset `code` from `source` at `destination`.
    ///
    /// Parent directories of `destination` are created; an existing package
    /// is replaced.
    pub fn build_package(
        &self,
        source: &Path,
        code: &str,
        metadata_tsv: &str,
        destination: &Path,
    ) -> Result<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = partial_path(destination);
        let result = create_writer(&partial, &self.options)
            .and_then(|writer| write_entries(writer, source, code, metadata_tsv));
        match result {
            Ok(()) => {
                fs::rename(&partial, destination)?;
                debug!(code, package = %destination.display(), "Built package");
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&partial);
                Err(e)
            }
        }
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.partial", name))
}

fn write_entries(
    mut writer: Box<dyn PackageWriter>,
    source: &Path,
    code: &str,
    metadata_tsv: &str,
) -> Result<()> {
    writer.add_bytes(METADATA_FILE_NAME, metadata_tsv.as_bytes())?;
    writer.add_directory(code, source)?;
    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative: Vec<String> = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let name = format!("{}/{}", code, relative.join("/"));
        if entry.file_type().is_dir() {
            writer.add_directory(&name, entry.path())?;
        } else {
            writer.add_file(&name, entry.path())?;
        }
    }
    writer.finish()
}
