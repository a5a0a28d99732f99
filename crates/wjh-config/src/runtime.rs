//! Derives the runtime artefact paths written by the daemon supervisor.
//!
//! Lock, PID and stored-settings files live beside the IPC socket so that the
//! socket directory is the single place operators need to inspect or clean.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Config;

/// Canonical paths for runtime artefacts written by the daemon.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    runtime_dir: PathBuf,
    lock_path: PathBuf,
    pid_path: PathBuf,
    settings_path: PathBuf,
}

impl RuntimePaths {
    /// Derives runtime paths from the shared configuration, creating the
    /// runtime directory when it is missing.
    pub fn from_config(config: &Config) -> Result<Self, RuntimePathsError> {
        let socket = config.daemon_socket().as_path();
        let runtime_dir = match socket.parent().filter(|parent| !parent.as_str().is_empty()) {
            Some(parent) => parent.as_std_path().to_path_buf(),
            None => {
                return Err(RuntimePathsError::MissingSocketParent {
                    path: socket.to_string(),
                });
            }
        };
        fs::create_dir_all(&runtime_dir).map_err(|source| RuntimePathsError::RuntimeDirectory {
            path: runtime_dir.clone(),
            source,
        })?;
        Ok(Self {
            lock_path: runtime_dir.join("wjh.lock"),
            pid_path: runtime_dir.join("wjh.pid"),
            settings_path: runtime_dir.join("wjh.settings.json"),
            runtime_dir,
        })
    }

    /// Directory holding runtime artefacts.
    #[must_use]
    pub fn runtime_dir(&self) -> &Path {
        self.runtime_dir.as_path()
    }

    /// Path to the lock file guarding singleton startup.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        self.lock_path.as_path()
    }

    /// Path to the PID file.
    #[must_use]
    pub fn pid_path(&self) -> &Path {
        self.pid_path.as_path()
    }

    /// Path to the global settings kept across restarts.
    #[must_use]
    pub fn settings_path(&self) -> &Path {
        self.settings_path.as_path()
    }
}

/// Errors raised while deriving daemon runtime paths.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// The socket path lacked a parent directory.
    #[error("socket path '{path}' has no parent directory")]
    MissingSocketParent {
        /// Configured socket path.
        path: String,
    },
    /// Creating the runtime directory failed.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SocketPath;

    #[test]
    fn derives_paths_beside_the_socket() {
        let dir = tempfile::tempdir().expect("temp dir");
        let socket = dir.path().join("run").join("wjh.sock");
        let config = Config {
            daemon_socket: SocketPath::new(socket.to_str().expect("utf8 path")),
            ..Config::default()
        };

        let paths = RuntimePaths::from_config(&config).expect("paths should derive");
        assert_eq!(paths.runtime_dir(), dir.path().join("run"));
        assert!(paths.runtime_dir().is_dir());
        assert!(paths.lock_path().ends_with("wjh.lock"));
        assert!(paths.pid_path().ends_with("wjh.pid"));
        assert_eq!(
            paths.settings_path(),
            dir.path().join("run").join("wjh.settings.json")
        );
    }

    #[test]
    fn rejects_socket_without_parent() {
        let config = Config {
            daemon_socket: SocketPath::new("wjh.sock"),
            ..Config::default()
        };
        let error = RuntimePaths::from_config(&config)
            .expect_err("paths should fail for sockets without parents");
        assert!(matches!(
            error,
            RuntimePathsError::MissingSocketParent { .. }
        ));
    }
}
