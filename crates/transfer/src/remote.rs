//! Remote copier and remote command executor
//!
//! The traits are the seams the file operations are written against; the
//! rsync and ssh implementations drive the external binaries through
//! [`crate::process`]. Probes and remote commands are bounded by a timeout;
//! rsync transfers are not, since a large dataset may take hours.

use crate::process::{run_to_completion, run_with_timeout, ProcessResult};
use coldstore_core::{ArchiveStatus, BooleanStatus, ConfigError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Where a remote copy reads from or writes to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteEndpoint<'a> {
    /// Host, `None` for a copy on the local machine
    pub host: Option<&'a str>,
    /// Rsync daemon module
    pub module: Option<&'a str>,
    /// Password file for the rsync daemon
    pub password_file: Option<&'a Path>,
}

impl<'a> RemoteEndpoint<'a> {
    /// Endpoint on the local machine.
    pub fn local() -> Self {
        Self::default()
    }

    /// Endpoint on `host` reached through ssh.
    pub fn ssh(host: &'a str) -> Self {
        RemoteEndpoint {
            host: Some(host),
            ..Default::default()
        }
    }

    /// Rsync location string for `path`.
    pub fn location(&self, path: &str) -> String {
        match (self.host, self.module) {
            (None, _) => path.to_string(),
            (Some(host), None) => format!("{}:{}", host, path),
            (Some(host), Some(module)) => {
                format!("{}::{}/{}", host, module, path.trim_start_matches('/'))
            }
        }
    }
}

/// Copies directory trees to and from a destination.
pub trait RemoteCopier: Send + Sync {
    /// Probe that the copier can run at all.
    fn check(&self) -> Result<(), ConfigError>;

    /// Probe ssh connectivity to `host`.
    fn check_connection_via_ssh(
        &self,
        host: &str,
        port: Option<u16>,
        timeout: Duration,
    ) -> Result<(), ConfigError>;

    /// Probe an rsync daemon module, with credentials if a password file is given.
    fn check_connection_via_module(
        &self,
        host: &str,
        module: &str,
        password_file: Option<&Path>,
        timeout: Duration,
    ) -> Result<(), ConfigError>;

    /// Copy `source` into the directory `destination_dir` at `endpoint`.
    fn copy_to_remote(
        &self,
        source: &Path,
        destination_dir: &str,
        endpoint: RemoteEndpoint<'_>,
    ) -> ArchiveStatus;

    /// Copy `source` at `endpoint` into the local directory `destination_dir`.
    fn copy_from_remote(
        &self,
        source: &str,
        endpoint: RemoteEndpoint<'_>,
        destination_dir: &Path,
    ) -> ArchiveStatus;
}

/// Runs commands on the destination host.
pub trait RemoteCommandExecutor: Send + Sync {
    /// Whether `path` exists.
    fn exists(&self, path: &str, timeout: Duration) -> BooleanStatus;

    /// Run `command` through the remote shell.
    fn execute_command_remotely(&self, command: &str, timeout: Duration) -> ProcessResult;
}

/// Quote `value` for a POSIX shell if it contains anything unusual.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+=:,@%".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Fail with [`ConfigError::MissingExecutable`] unless `path` is a regular file.
pub fn require_executable(name: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::MissingExecutable {
            name,
            path: path.to_path_buf(),
        })
    }
}

// ============================================================================
// Rsync
// ============================================================================

/// [`RemoteCopier`] backed by the `rsync` binary.
#[derive(Debug, Clone)]
pub struct RsyncCopier {
    rsync: PathBuf,
    ssh: Option<PathBuf>,
    timeout: Duration,
}

impl RsyncCopier {
    /// Copier using `rsync`, and `ssh` as remote shell if given.
    ///
    /// Both executables must exist as regular files. `timeout` bounds
    /// [`RemoteCopier::check`] only.
    pub fn new(rsync: PathBuf, ssh: Option<PathBuf>, timeout: Duration) -> Result<Self, ConfigError> {
        require_executable("rsync", &rsync)?;
        if let Some(ssh) = &ssh {
            require_executable("ssh", ssh)?;
        }
        Ok(RsyncCopier {
            rsync,
            ssh,
            timeout,
        })
    }

    fn copy_args(&self, endpoint: &RemoteEndpoint<'_>) -> Vec<String> {
        let mut args = vec![
            "--archive".to_string(),
            "--delete-before".to_string(),
            "--inplace".to_string(),
        ];
        if endpoint.host.is_some() && endpoint.module.is_none() {
            if let Some(ssh) = &self.ssh {
                args.push("--rsh".to_string());
                args.push(ssh.display().to_string());
            }
        }
        if let (Some(_), Some(password_file)) = (endpoint.module, endpoint.password_file) {
            args.push(format!("--password-file={}", password_file.display()));
        }
        args
    }

    fn transfer(&self, args: &[String]) -> ArchiveStatus {
        let result = run_to_completion(&self.rsync, args);
        if result.is_ok() {
            ArchiveStatus::Ok
        } else {
            ArchiveStatus::Error(result.error_message())
        }
    }
}

impl RemoteCopier for RsyncCopier {
    fn check(&self) -> Result<(), ConfigError> {
        let result = run_with_timeout(&self.rsync, &["--version"], self.timeout);
        if !result.is_ok() {
            return Err(ConfigError::ConnectionFailed(format!(
                "'{} --version' failed: {}",
                self.rsync.display(),
                result.error_message()
            )));
        }
        if let Some(first) = result.stdout_lines.first() {
            info!("Using {}", first);
        }
        Ok(())
    }

    fn check_connection_via_ssh(
        &self,
        host: &str,
        port: Option<u16>,
        timeout: Duration,
    ) -> Result<(), ConfigError> {
        let ssh = self
            .ssh
            .as_ref()
            .ok_or(ConfigError::ExecutableNotConfigured("ssh"))?;
        let mut args = vec!["-T".to_string()];
        if let Some(port) = port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        args.push(host.to_string());
        args.push("true".to_string());
        let result = run_with_timeout(ssh, &args, timeout);
        if result.is_ok() {
            debug!(host, "ssh connection check passed");
            Ok(())
        } else {
            Err(ConfigError::ConnectionFailed(format!(
                "cannot connect to '{}' via ssh: {}",
                host,
                result.error_message()
            )))
        }
    }

    fn check_connection_via_module(
        &self,
        host: &str,
        module: &str,
        password_file: Option<&Path>,
        timeout: Duration,
    ) -> Result<(), ConfigError> {
        let mut args = vec!["--list-only".to_string()];
        if let Some(password_file) = password_file {
            args.push("--password-file".to_string());
            args.push(password_file.display().to_string());
        }
        args.push(format!("{}::{}", host, module));
        let result = run_with_timeout(&self.rsync, &args, timeout);
        if result.is_ok() {
            debug!(host, module, "rsync module check passed");
            Ok(())
        } else {
            Err(ConfigError::ConnectionFailed(format!(
                "cannot access rsync module '{}::{}': {}",
                host,
                module,
                result.error_message()
            )))
        }
    }

    fn copy_to_remote(
        &self,
        source: &Path,
        destination_dir: &str,
        endpoint: RemoteEndpoint<'_>,
    ) -> ArchiveStatus {
        let mut args = self.copy_args(&endpoint);
        args.push(source.display().to_string().trim_end_matches('/').to_string());
        args.push(format!("{}/", endpoint.location(destination_dir).trim_end_matches('/')));
        self.transfer(&args)
    }

    fn copy_from_remote(
        &self,
        source: &str,
        endpoint: RemoteEndpoint<'_>,
        destination_dir: &Path,
    ) -> ArchiveStatus {
        let mut args = self.copy_args(&endpoint);
        args.push(endpoint.location(source.trim_end_matches('/')));
        args.push(format!("{}/", destination_dir.display()));
        self.transfer(&args)
    }
}

// ============================================================================
// Ssh
// ============================================================================

/// [`RemoteCommandExecutor`] running commands through `ssh -T <host>`.
#[derive(Debug, Clone)]
pub struct SshCommandExecutor {
    ssh: PathBuf,
    host: String,
}

impl SshCommandExecutor {
    /// Executor for `host`. `ssh` must exist as a regular file.
    pub fn new(ssh: PathBuf, host: impl Into<String>) -> Result<Self, ConfigError> {
        require_executable("ssh", &ssh)?;
        Ok(SshCommandExecutor {
            ssh,
            host: host.into(),
        })
    }
}

impl RemoteCommandExecutor for SshCommandExecutor {
    fn exists(&self, path: &str, timeout: Duration) -> BooleanStatus {
        let result =
            self.execute_command_remotely(&format!("test -e {}", shell_quote(path)), timeout);
        match (result.failure.as_ref(), result.exit_code) {
            (None, Some(0)) => BooleanStatus::True,
            (None, Some(1)) => BooleanStatus::False(None),
            _ => BooleanStatus::Error(result.error_message()),
        }
    }

    fn execute_command_remotely(&self, command: &str, timeout: Duration) -> ProcessResult {
        debug!(host = %self.host, command, "Executing remote command");
        run_with_timeout(&self.ssh, &["-T", self.host.as_str(), command], timeout)
    }
}
