//! Moving dataset trees between the store and a destination
//!
//! - [`Destination`]: parsed `path` / `host:path` / `host:module:path`
//! - [`RemoteCopier`] / [`RemoteCommandExecutor`]: process-backed seams,
//!   implemented by [`RsyncCopier`] and [`SshCommandExecutor`]
//! - [`FileOperations`]: copy, retrieve, delete, mark and check one dataset,
//!   implemented by [`LocalFileOperations`] and [`RemoteFileOperations`]

#![warn(missing_docs)]

pub mod destination;
pub mod factory;
pub mod local;
pub mod operations;
pub mod process;
pub mod remote;
pub mod remote_files;

pub use destination::Destination;
pub use factory::{create_file_operations, TransferSettings};
pub use local::{copy_tree, LocalFileOperations};
pub use operations::{compare_listings, listing_of, ArchivedTree, FileOperations, MARKER_FOLDER};
pub use process::{run_to_completion, run_with_timeout, ProcessResult};
pub use remote::{
    require_executable, shell_quote, RemoteCommandExecutor, RemoteCopier, RemoteEndpoint,
    RsyncCopier, SshCommandExecutor,
};
pub use remote_files::{RemoteFileOperations, RemoteSettings, DEFAULT_TIMEOUT};
