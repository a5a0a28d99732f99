//! Filesystem handling shared by every Unix socket the daemon binds.

use std::fs;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixDatagram, UnixStream};
use std::path::Path;

use tracing::{debug, warn};

use super::{ListenerError, TRANSPORT_TARGET};

/// Socket type, used to connect to an existing socket file with a matching peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SocketKind {
    Stream,
    Datagram,
}

/// Removes a stale socket file at `path`.
///
/// Fails when the path is not a socket or when a live peer still answers on
/// it.
pub(crate) fn clear_stale_socket(path: &Path, kind: SocketKind) -> Result<(), ListenerError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(ListenerError::UnixMetadata {
                path: path.display().to_string(),
                source,
            });
        }
    };
    if !metadata.file_type().is_socket() {
        return Err(ListenerError::UnixNotSocket {
            path: path.display().to_string(),
        });
    }
    match connect_existing(path, kind) {
        Ok(()) => Err(ListenerError::UnixInUse {
            path: path.display().to_string(),
        }),
        Err(error)
            if error.kind() == io::ErrorKind::ConnectionRefused
                || error.kind() == io::ErrorKind::NotFound =>
        {
            fs::remove_file(path).map_err(|source| ListenerError::UnixCleanup {
                path: path.display().to_string(),
                source,
            })?;
            debug!(
                target: TRANSPORT_TARGET,
                path = %path.display(),
                "removed stale unix socket"
            );
            Ok(())
        }
        Err(source) => Err(ListenerError::UnixConnect {
            path: path.display().to_string(),
            source,
        }),
    }
}

fn connect_existing(path: &Path, kind: SocketKind) -> io::Result<()> {
    match kind {
        SocketKind::Stream => UnixStream::connect(path).map(drop),
        SocketKind::Datagram => UnixDatagram::unbound()?.connect(path),
    }
}

/// Removes a socket file on shutdown, ignoring a file that is already gone.
pub(crate) fn remove_socket_file(path: &Path) {
    if let Err(error) = fs::remove_file(path)
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: TRANSPORT_TARGET,
            error = %error,
            path = %path.display(),
            "failed to remove unix socket file"
        );
    }
}
