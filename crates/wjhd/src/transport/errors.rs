//! Error types for socket operations.

use std::io;

use thiserror::Error;

/// Errors surfaced while binding a Unix socket.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Binding the socket failed.
    #[error("failed to bind unix socket at {path}: {source}")]
    BindUnix {
        /// Socket path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The socket could not be made non-blocking.
    #[error("failed to enable non-blocking mode on {path}: {source}")]
    NonBlocking {
        /// Socket path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Another process is serving the socket.
    #[error("existing unix socket {path} is already in use")]
    UnixInUse {
        /// Socket path.
        path: String,
    },
    /// A non-socket file occupies the path.
    #[error("unix socket path {path} is not a socket")]
    UnixNotSocket {
        /// Path that is not a socket.
        path: String,
    },
    /// The existing path could not be inspected.
    #[error("failed to read metadata for unix socket {path}: {source}")]
    UnixMetadata {
        /// Socket path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Connecting to the existing socket failed unexpectedly.
    #[error("failed to connect to existing unix socket {path}: {source}")]
    UnixConnect {
        /// Socket path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A stale socket file could not be removed.
    #[error("failed to remove stale unix socket {path}: {source}")]
    UnixCleanup {
        /// Socket path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Direction of a timed-out connection operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Direction {
    /// Reading the request.
    Read,
    /// Writing the reply.
    Write,
}

/// Errors surfaced while exchanging a request on an accepted connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket options could not be applied.
    #[error("failed to configure connection: {source}")]
    Configure {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The request line is too long.
    #[error("request exceeds {limit} bytes")]
    RequestTooLarge {
        /// Largest request accepted, in bytes.
        limit: usize,
    },
    /// The client did not keep up.
    #[error("connection {direction} timed out")]
    Timeout {
        /// Operation that timed out.
        direction: Direction,
    },
    /// Reading the request failed.
    #[error("failed to read request: {source}")]
    Read {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Writing the reply failed.
    #[error("failed to write response: {source}")]
    Write {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    pub(crate) fn from_io(direction: Direction, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => Self::Timeout { direction },
            _ => match direction {
                Direction::Read => Self::Read { source },
                Direction::Write => Self::Write { source },
            },
        }
    }
}
