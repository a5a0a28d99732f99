//! Singleton enforcement through a lock file and a PID file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::{info, warn};

use wjh_config::RuntimePaths;

use super::PROCESS_TARGET;
use super::errors::LaunchError;

/// Holds the daemon lock for the life of the process. Dropping the guard
/// removes the lock and PID files.
#[derive(Debug)]
pub(super) struct ProcessGuard {
    paths: RuntimePaths,
    _lock: File,
}

impl ProcessGuard {
    pub(super) fn acquire(paths: RuntimePaths) -> Result<Self, LaunchError> {
        let lock = acquire_lock(&paths)?;
        Ok(Self { paths, _lock: lock })
    }

    pub(super) fn write_pid(&mut self, pid: u32) -> Result<(), LaunchError> {
        let path = self.paths.pid_path();
        let pid_write = |source| LaunchError::PidWrite {
            path: path.to_path_buf(),
            source,
        };
        let mut file = private_file()
            .truncate(true)
            .create(true)
            .open(path)
            .map_err(pid_write)?;
        writeln!(file, "{pid}").map_err(pid_write)?;
        file.sync_all().map_err(pid_write)?;
        info!(
            target: PROCESS_TARGET,
            pid,
            file = %path.display(),
            "pid file written"
        );
        Ok(())
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        for (path, kind) in [
            (self.paths.lock_path(), "lock"),
            (self.paths.pid_path(), "pid"),
        ] {
            match fs::remove_file(path) {
                Err(error) if error.kind() != io::ErrorKind::NotFound => {
                    warn!(
                        target: PROCESS_TARGET,
                        file = %path.display(),
                        kind,
                        error = %error,
                        "failed to remove runtime file"
                    );
                }
                _ => {}
            }
        }
    }
}

fn private_file() -> OpenOptions {
    let mut options = OpenOptions::new();
    options.write(true).mode(0o600);
    options
}

fn acquire_lock(paths: &RuntimePaths) -> Result<File, LaunchError> {
    match private_file().create_new(true).open(paths.lock_path()) {
        Ok(file) => {
            info!(
                target: PROCESS_TARGET,
                file = %paths.lock_path().display(),
                "acquired daemon lock"
            );
            Ok(file)
        }
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => handle_existing_lock(paths),
        Err(source) => Err(LaunchError::LockCreate {
            path: paths.lock_path().to_path_buf(),
            source,
        }),
    }
}

fn handle_existing_lock(paths: &RuntimePaths) -> Result<File, LaunchError> {
    if let Some(pid) = read_pid(paths.pid_path()) {
        if check_process(pid)? {
            info!(
                target: PROCESS_TARGET,
                pid,
                "refusing to start: existing daemon alive"
            );
            return Err(LaunchError::AlreadyRunning { pid });
        }
        warn!(
            target: PROCESS_TARGET,
            pid,
            "existing daemon not detected; cleaning stale files"
        );
    }
    remove_file(paths.lock_path())?;
    remove_file(paths.pid_path())?;
    match private_file().create_new(true).open(paths.lock_path()) {
        Ok(file) => Ok(file),
        Err(source) => Err(LaunchError::LockCreate {
            path: paths.lock_path().to_path_buf(),
            source,
        }),
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse::<u32>().ok().filter(|pid| *pid != 0)
}

fn remove_file(path: &Path) -> Result<(), LaunchError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(LaunchError::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn check_process(pid: u32) -> Result<bool, LaunchError> {
    let Ok(raw) = i32::try_from(pid) else {
        return Ok(false);
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(errno) => Err(LaunchError::CheckProcess { pid, source: errno }),
    }
}
