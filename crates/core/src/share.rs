//! Live storage shares
//!
//! A share is a numbered directory under the store root. Shares are
//! enumerated at call time and free space is queried on every request,
//! because concurrent archive operations keep changing it.

use crate::error::Result;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source of the free space figure for a share.
pub trait FreeSpaceProvider: Send + Sync {
    /// Free space in bytes available below `path`.
    fn free_space(&self, path: &Path) -> io::Result<u64>;
}

/// Free space as reported by the filesystem (`statvfs`).
#[derive(Debug, Clone, Copy, Default)]
pub struct StatvfsFreeSpace;

impl FreeSpaceProvider for StatvfsFreeSpace {
    fn free_space(&self, path: &Path) -> io::Result<u64> {
        available_bytes(path)
    }
}

/// Constant free space, for tests and simulations.
#[derive(Debug, Clone, Copy)]
pub struct FixedFreeSpace(pub u64);

impl FreeSpaceProvider for FixedFreeSpace {
    fn free_space(&self, _path: &Path) -> io::Result<u64> {
        Ok(self.0)
    }
}

#[cfg(unix)]
fn available_bytes(path: &Path) -> io::Result<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // SAFETY: `c_path` is a valid null-terminated C string. `stat` is
    // zero-initialized and only written by libc::statvfs for the duration
    // of the call.
    unsafe {
        let mut stat: libc::statvfs = std::mem::zeroed();
        if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
            return Err(io::Error::last_os_error());
        }
        // f_bavail excludes blocks reserved for root.
        Ok(stat.f_bavail as u64 * stat.f_frsize as u64)
    }
}

#[cfg(not(unix))]
fn available_bytes(_path: &Path) -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "free space query is only supported on unix",
    ))
}

/// A live storage share.
#[derive(Clone)]
pub struct Share {
    id: String,
    root: PathBuf,
    free_space: Arc<dyn FreeSpaceProvider>,
}

impl Share {
    /// Share whose free space comes from the filesystem.
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self::with_free_space(id, root, Arc::new(StatvfsFreeSpace))
    }

    /// Share with an explicit free space source.
    pub fn with_free_space(
        id: impl Into<String>,
        root: impl Into<PathBuf>,
        free_space: Arc<dyn FreeSpaceProvider>,
    ) -> Self {
        Share {
            id: id.into(),
            root: root.into(),
            free_space,
        }
    }

    /// Share id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Root directory of the share.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current free space in bytes. Never cached.
    pub fn free_space(&self) -> io::Result<u64> {
        self.free_space.free_space(&self.root)
    }
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("id", &self.id)
            .field("root", &self.root)
            .finish()
    }
}

/// Enumerates the live shares.
pub trait ShareProvider: Send + Sync {
    /// All shares, freshly enumerated.
    fn shares(&self) -> Result<Vec<Share>>;
}

/// Shares are the numeric sub-directories of a store root.
#[derive(Debug, Clone)]
pub struct DirectoryShareProvider {
    store_root: PathBuf,
}

impl DirectoryShareProvider {
    /// Provider over `store_root`.
    pub fn new(store_root: impl Into<PathBuf>) -> Self {
        DirectoryShareProvider {
            store_root: store_root.into(),
        }
    }

    /// The store root.
    pub fn store_root(&self) -> &Path {
        &self.store_root
    }
}

impl ShareProvider for DirectoryShareProvider {
    fn shares(&self) -> Result<Vec<Share>> {
        let mut numbered = Vec::new();
        for entry in std::fs::read_dir(&self.store_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Ok(number) = name.parse::<u64>() {
                numbered.push((number, name, entry.path()));
            }
        }
        numbered.sort_by_key(|(number, _, _)| *number);
        Ok(numbered
            .into_iter()
            .map(|(_, id, root)| Share::new(id, root))
            .collect())
    }
}

/// Fixed list of shares, returned in the given order.
#[derive(Debug, Clone, Default)]
pub struct StaticShareProvider {
    shares: Vec<Share>,
}

impl StaticShareProvider {
    /// Provider over `shares`.
    pub fn new(shares: Vec<Share>) -> Self {
        StaticShareProvider { shares }
    }
}

impl ShareProvider for StaticShareProvider {
    fn shares(&self) -> Result<Vec<Share>> {
        Ok(self.shares.clone())
    }
}
