//! Package format options

use std::fmt;

/// Container format of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageFormat {
    /// Zip archive; compression is per entry (stored or deflated)
    #[default]
    Zip,
    /// Tar archive; compression wraps the whole stream in zstd
    Tar,
}

impl PackageFormat {
    /// Parse `zip` or `tar`, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "zip" => Some(PackageFormat::Zip),
            "tar" => Some(PackageFormat::Tar),
            _ => None,
        }
    }
}

impl fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageFormat::Zip => f.write_str("zip"),
            PackageFormat::Tar => f.write_str("tar"),
        }
    }
}

/// How packages are built and laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageOptions {
    /// Container format
    pub format: PackageFormat,
    /// Compress entries (zip) or the stream (tar)
    pub compress: bool,
    /// Nest packages under the dataset location
    pub with_sharding: bool,
}

impl Default for PackageOptions {
    fn default() -> Self {
        PackageOptions {
            format: PackageFormat::Zip,
            compress: true,
            with_sharding: false,
        }
    }
}

impl PackageOptions {
    /// File extension of packages, without the dot.
    pub fn extension(&self) -> &'static str {
        match (self.format, self.compress) {
            (PackageFormat::Zip, _) => "zip",
            (PackageFormat::Tar, false) => "tar",
            (PackageFormat::Tar, true) => "tar.zst",
        }
    }

    /// Package file name for `code`.
    pub fn file_name(&self, code: &str) -> String {
        format!("{}.{}", code, self.extension())
    }
}
