//! Construction of file operations from settings
//!
//! Picks the manager for a destination and wires the rsync copier and ssh
//! executor. All validation happens here, so a manager that is returned is
//! usable.

use crate::destination::Destination;
use crate::local::LocalFileOperations;
use crate::operations::FileOperations;
use crate::remote::{RemoteCopier, RsyncCopier, SshCommandExecutor};
use crate::remote_files::{RemoteFileOperations, RemoteSettings, DEFAULT_TIMEOUT};
use coldstore_core::ConfigError;
use coldstore_routing::DestinationRouter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything needed to build the file operations for one destination.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Where archived copies go
    pub destination: Destination,
    /// Local rsync executable
    pub rsync: Option<PathBuf>,
    /// Local ssh executable
    pub ssh: Option<PathBuf>,
    /// Path of `find` on the destination host
    pub find: Option<String>,
    /// Password file for rsync module destinations
    pub password_file: Option<PathBuf>,
    /// Timeout of remote commands and probes
    pub timeout: Duration,
}

impl TransferSettings {
    /// Settings for `destination` with no executables configured.
    pub fn new(destination: Destination) -> Self {
        TransferSettings {
            destination,
            rsync: None,
            ssh: None,
            find: None,
            password_file: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Build the file operations manager for `settings`.
///
/// Local destinations copy natively unless rsync is configured. Remote
/// destinations need rsync, and ssh for everything but the copy itself.
pub fn create_file_operations(
    settings: &TransferSettings,
    router: Arc<DestinationRouter>,
) -> Result<Arc<dyn FileOperations>, ConfigError> {
    match &settings.destination {
        Destination::Local(root) => match &settings.rsync {
            Some(rsync) => {
                let copier: Arc<dyn RemoteCopier> =
                    Arc::new(RsyncCopier::new(rsync.clone(), None, settings.timeout)?);
                Ok(Arc::new(LocalFileOperations::with_copier(root, router, copier)?))
            }
            None => Ok(Arc::new(LocalFileOperations::new(root, router)?)),
        },
        remote => {
            let rsync = settings
                .rsync
                .clone()
                .ok_or(ConfigError::ExecutableNotConfigured("rsync"))?;
            let ssh = settings
                .ssh
                .clone()
                .ok_or(ConfigError::ExecutableNotConfigured("ssh"))?;
            let host = remote.host().unwrap_or_default().to_string();
            let copier = Arc::new(RsyncCopier::new(rsync, Some(ssh.clone()), settings.timeout)?);
            let executor = Arc::new(SshCommandExecutor::new(ssh, host)?);
            let remote_settings = RemoteSettings {
                destination: remote.clone(),
                password_file: settings.password_file.clone(),
                find: settings.find.clone().unwrap_or_else(|| "find".to_string()),
                timeout: settings.timeout,
            };
            Ok(Arc::new(RemoteFileOperations::new(
                remote_settings,
                router,
                copier,
                executor,
            )?))
        }
    }
}
