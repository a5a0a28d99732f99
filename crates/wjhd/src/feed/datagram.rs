//! Change-feed backed by a Unix datagram socket.

use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixDatagram;

use tracing::{debug, warn};

use wjh_config::SocketPath;

use crate::transport::ListenerError;
use crate::transport::socket::{SocketKind, clear_stale_socket, remove_socket_file};

use super::{ChangeFeed, ChangeRecord, FEED_TARGET};

const MAX_DATAGRAM_BYTES: usize = 64 * 1024;

/// Feed fed by JSON-encoded [`ChangeRecord`]s, one per datagram.
///
/// The socket file is removed when the feed is dropped.
#[derive(Debug)]
pub struct DatagramFeed {
    name: String,
    path: SocketPath,
    socket: UnixDatagram,
}

impl DatagramFeed {
    /// Binds the feed socket at `path`, replacing a stale socket file.
    pub fn bind(name: impl Into<String>, path: &SocketPath) -> Result<Self, ListenerError> {
        let std_path = path.as_path().as_std_path();
        clear_stale_socket(std_path, SocketKind::Datagram)?;
        let socket = UnixDatagram::bind(std_path).map_err(|source| ListenerError::BindUnix {
            path: path.to_string(),
            source,
        })?;
        if let Err(source) = socket.set_nonblocking(true) {
            remove_socket_file(std_path);
            return Err(ListenerError::NonBlocking {
                path: path.to_string(),
                source,
            });
        }
        let name = name.into();
        debug!(target: FEED_TARGET, feed = %name, socket = %path, "change feed bound");
        Ok(Self {
            name,
            path: path.clone(),
            socket,
        })
    }

    /// Socket path the feed listens on.
    #[must_use]
    pub fn path(&self) -> &SocketPath {
        &self.path
    }

    fn parse(&self, datagram: &[u8]) -> Option<ChangeRecord> {
        match serde_json::from_slice(datagram) {
            Ok(record) => Some(record),
            Err(error) => {
                warn!(
                    target: FEED_TARGET,
                    feed = %self.name,
                    error = %error,
                    payload = %String::from_utf8_lossy(datagram),
                    "skipping unparsable change record"
                );
                None
            }
        }
    }
}

impl ChangeFeed for DatagramFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn drain(&mut self) -> Vec<ChangeRecord> {
        let mut records = Vec::new();
        let mut buffer = vec![0_u8; MAX_DATAGRAM_BYTES];
        loop {
            match self.socket.recv(&mut buffer) {
                Ok(size) => records.extend(self.parse(&buffer[..size])),
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => break,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    warn!(
                        target: FEED_TARGET,
                        feed = %self.name,
                        error = %error,
                        "change feed receive failed"
                    );
                    break;
                }
            }
        }
        records
    }
}

impl AsRawFd for DatagramFeed {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

impl Drop for DatagramFeed {
    fn drop(&mut self) {
        remove_socket_file(self.path.as_path().as_std_path());
    }
}
