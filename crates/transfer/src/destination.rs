//! Destination specification
//!
//! A destination is written as one of:
//! - `path`: local directory
//! - `host:path`: directory on a host reachable through ssh
//! - `host:module:path`: directory inside an rsync daemon module

use coldstore_core::ConfigError;
use std::fmt;
use std::path::PathBuf;

/// Parsed archive destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Local directory
    Local(PathBuf),
    /// Directory on a remote host, reached through ssh
    Ssh {
        /// Host name
        host: String,
        /// Absolute path on the host
        path: String,
    },
    /// Directory inside an rsync daemon module
    RsyncModule {
        /// Host name
        host: String,
        /// Module name
        module: String,
        /// Path on the host
        path: String,
    },
}

impl Destination {
    /// Parse a destination specification.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidDestination {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(invalid("destination is empty"));
        }

        let parts: Vec<&str> = trimmed.split(':').collect();
        match parts.as_slice() {
            [path] => Ok(Destination::Local(PathBuf::from(path))),
            [host, path] => {
                if host.is_empty() || path.is_empty() {
                    return Err(invalid("expected 'host:path'"));
                }
                Ok(Destination::Ssh {
                    host: host.to_string(),
                    path: path.to_string(),
                })
            }
            [host, module, path] => {
                if host.is_empty() || module.is_empty() || path.is_empty() {
                    return Err(invalid("expected 'host:module:path'"));
                }
                Ok(Destination::RsyncModule {
                    host: host.to_string(),
                    module: module.to_string(),
                    path: path.to_string(),
                })
            }
            _ => Err(invalid("too many ':' separators")),
        }
    }

    /// Host name for remote destinations.
    pub fn host(&self) -> Option<&str> {
        match self {
            Destination::Local(_) => None,
            Destination::Ssh { host, .. } | Destination::RsyncModule { host, .. } => Some(host),
        }
    }

    /// Rsync module for module destinations.
    pub fn module(&self) -> Option<&str> {
        match self {
            Destination::RsyncModule { module, .. } => Some(module),
            _ => None,
        }
    }

    /// Whether the destination is a local directory.
    pub fn is_local(&self) -> bool {
        matches!(self, Destination::Local(_))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Local(path) => write!(f, "{}", path.display()),
            Destination::Ssh { host, path } => write!(f, "{}:{}", host, path),
            Destination::RsyncModule { host, module, path } => {
                write!(f, "{}:{}:{}", host, module, path)
            }
        }
    }
}
