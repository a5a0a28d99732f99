//! Defines the unified error surface for daemon launch and supervision.

use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

use wjh_config::RuntimePathsError;

use crate::bootstrap::BootstrapError;
use crate::engine::EngineError;
use crate::reactor::ReactorError;
use crate::registry::RegistryError;
use crate::transport::ListenerError;

/// Errors surfaced while launching or supervising the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrapping the daemon failed.
    #[error("daemon bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying error.
        #[source]
        source: BootstrapError,
    },
    /// The socket path lacked a parent directory.
    #[error("socket path '{path}' has no parent directory")]
    MissingSocketParent {
        /// Configured socket path.
        path: String,
    },
    /// The runtime directory could not be created.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Lock file creation failed.
    #[error("failed to create lock file '{path}': {source}")]
    LockCreate {
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A running daemon already holds the lock.
    #[error("daemon already running with pid {pid}")]
    AlreadyRunning {
        /// PID recorded in the existing PID file.
        pid: u32,
    },
    /// Removing a stale runtime artefact failed.
    #[error("failed to remove stale file '{path}': {source}")]
    Cleanup {
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Writing the PID file failed.
    #[error("failed to write pid file '{path}': {source}")]
    PidWrite {
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Checking whether an existing PID is alive failed.
    #[error("failed to check existing process {pid}: {source}")]
    CheckProcess {
        /// PID being checked.
        pid: u32,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Installing the termination signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Signals {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Binding the request socket or a change-feed failed.
    #[error("socket listener failed: {source}")]
    Listener {
        /// Underlying error.
        #[source]
        source: ListenerError,
    },
    /// The drop-capture engine refused to initialise.
    #[error("failed to initialise the drop-capture engine: {source}")]
    Engine {
        /// Engine failure.
        #[source]
        source: EngineError,
    },
    /// The default channels could not be brought up.
    #[error("failed to create default channels: {source}")]
    Channels {
        /// Underlying error.
        #[source]
        source: RegistryError,
    },
    /// The reactor stopped on an unrecoverable error.
    #[error("reactor failed: {source}")]
    Reactor {
        /// Underlying error.
        #[source]
        source: ReactorError,
    },
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<RuntimePathsError> for LaunchError {
    fn from(source: RuntimePathsError) -> Self {
        match source {
            RuntimePathsError::MissingSocketParent { path } => Self::MissingSocketParent { path },
            RuntimePathsError::RuntimeDirectory { path, source } => {
                Self::RuntimeDirectory { path, source }
            }
        }
    }
}

impl From<ListenerError> for LaunchError {
    fn from(source: ListenerError) -> Self {
        Self::Listener { source }
    }
}

impl From<EngineError> for LaunchError {
    fn from(source: EngineError) -> Self {
        Self::Engine { source }
    }
}

impl From<RegistryError> for LaunchError {
    fn from(source: RegistryError) -> Self {
        Self::Channels { source }
    }
}

impl From<ReactorError> for LaunchError {
    fn from(source: ReactorError) -> Self {
        Self::Reactor { source }
    }
}
