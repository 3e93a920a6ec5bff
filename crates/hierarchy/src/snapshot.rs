//! Snapshots of real directory trees
//!
//! Two sources feed the comparator besides packages:
//! - local directories, walked with `walkdir` and optionally checksummed
//! - listings produced by `find <path> -printf "%y\t%p\t%s\n"` on a remote host

use crate::node::{HierarchyBuilder, HierarchyNode};
use crate::{HierarchyError, Result};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Checksum computation while snapshotting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumMode {
    /// Compute CRC32 of every file
    #[default]
    Compute,
    /// Record sizes only
    Skip,
}

/// Snapshot the directory tree at `root`.
///
/// The root node has an empty relative path; every other node is relative
/// to `root`. Symbolic links are not followed.
pub fn snapshot_directory(root: &Path, mode: ChecksumMode) -> Result<HierarchyNode> {
    let metadata = std::fs::symlink_metadata(root)?;
    if metadata.is_file() {
        let checksum = checksum_for(root, mode)?;
        return Ok(HierarchyNode::file("", metadata.len(), checksum));
    }

    let mut builder = HierarchyBuilder::new("");
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = relative_path_of(root, entry.path())?;
        if entry.file_type().is_dir() {
            builder.add_directory(&relative);
        } else {
            let size = entry.metadata()?.len();
            let checksum = checksum_for(entry.path(), mode)?;
            builder.add_file(&relative, size, checksum);
        }
    }
    debug!(root = %root.display(), "Took directory snapshot");
    Ok(builder.build())
}

/// Total size in bytes of all files below `root`.
pub fn directory_size(root: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// CRC32 of a file's content.
pub fn crc32_of_file(path: &Path) -> io::Result<u32> {
    crc32_of_reader(&mut BufReader::new(File::open(path)?))
}

/// CRC32 of everything left in `reader`.
pub fn crc32_of_reader<R: Read + ?Sized>(reader: &mut R) -> io::Result<u32> {
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

fn checksum_for(path: &Path, mode: ChecksumMode) -> io::Result<Option<u32>> {
    match mode {
        ChecksumMode::Compute => crc32_of_file(path).map(Some),
        ChecksumMode::Skip => Ok(None),
    }
}

fn relative_path_of(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| HierarchyError::OutsideRoot(path.display().to_string()))?;
    let components: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(components.join("/"))
}

/// Build a tree from `find <root> -printf "%y\t%p\t%s\n"` output.
///
/// `%y` is `d` for directories and anything else for files. Lines for paths
/// outside `root` are rejected. Checksums are not available this way.
pub fn parse_find_listing<'a>(
    root: &str,
    lines: impl IntoIterator<Item = &'a str>,
) -> Result<HierarchyNode> {
    let root = root.trim_end_matches('/');
    let mut builder = HierarchyBuilder::new("");
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.splitn(3, '\t');
        let (kind, path, size) = match (fields.next(), fields.next(), fields.next()) {
            (Some(kind), Some(path), Some(size)) => (kind, path, size),
            _ => return Err(HierarchyError::InvalidListing(line.to_string())),
        };
        let relative = if path == root {
            ""
        } else {
            path.strip_prefix(root)
                .and_then(|rest| rest.strip_prefix('/'))
                .ok_or_else(|| HierarchyError::OutsideRoot(path.to_string()))?
        };
        if kind == "d" {
            builder.add_directory(relative);
        } else {
            let size = size
                .trim()
                .parse::<u64>()
                .map_err(|_| HierarchyError::InvalidListing(line.to_string()))?;
            builder.add_file(relative, size, None);
        }
    }
    Ok(builder.build())
}
