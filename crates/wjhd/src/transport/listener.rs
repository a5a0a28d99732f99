//! Non-blocking Unix stream listener driven by the reactor.

use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};

use tracing::info;

use wjh_config::SocketPath;

use super::socket::{SocketKind, clear_stale_socket, remove_socket_file};
use super::{ListenerError, TRANSPORT_TARGET};

/// Listener bound to the daemon's IPC socket. The socket file is removed when
/// the listener is dropped.
#[derive(Debug)]
pub struct SocketListener {
    path: SocketPath,
    listener: UnixListener,
}

impl SocketListener {
    /// Binds the listener at `path`, replacing a stale socket file.
    pub fn bind(path: &SocketPath) -> Result<Self, ListenerError> {
        let std_path = path.as_path().as_std_path();
        clear_stale_socket(std_path, SocketKind::Stream)?;
        let listener = UnixListener::bind(std_path).map_err(|source| ListenerError::BindUnix {
            path: path.to_string(),
            source,
        })?;
        if let Err(source) = listener.set_nonblocking(true) {
            remove_socket_file(std_path);
            return Err(ListenerError::NonBlocking {
                path: path.to_string(),
                source,
            });
        }
        info!(target: TRANSPORT_TARGET, socket = %path, "socket listener active");
        Ok(Self {
            path: path.clone(),
            listener,
        })
    }

    /// Socket path being served.
    #[must_use]
    pub fn path(&self) -> &SocketPath {
        &self.path
    }

    /// Accepts a pending connection. `Ok(None)` means nothing was queued.
    pub fn accept(&self) -> io::Result<Option<UnixStream>> {
        loop {
            match self.listener.accept() {
                Ok((stream, _)) => return Ok(Some(stream)),
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(error),
            }
        }
    }
}

impl AsRawFd for SocketListener {
    fn as_raw_fd(&self) -> RawFd {
        self.listener.as_raw_fd()
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        remove_socket_file(self.path.as_path().as_std_path());
    }
}
