//! Socket helpers for talking to `wjhd`.
//!
//! Pull requests travel over the daemon's stream socket: one request line
//! out, then everything up to end-of-stream back. Setting changes are single
//! JSON datagrams sent to the global configuration feed.

use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::unix::net::{UnixDatagram, UnixStream};
use std::time::Duration;

use socket2::{Domain, SockAddr, Socket, Type};
use wjh_config::SocketPath;

use crate::AppError;

pub(crate) const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Connects to the daemon socket, bounding the connect itself and every
/// later read and write.
pub(crate) fn connect(socket: &SocketPath, timeout: Duration) -> Result<UnixStream, AppError> {
    let connect_error = |source| AppError::Connect {
        endpoint: socket.to_string(),
        source,
    };
    let stream = Socket::new(Domain::UNIX, Type::STREAM, None).map_err(connect_error)?;
    let address = SockAddr::unix(socket.as_path().as_str()).map_err(connect_error)?;
    stream
        .connect_timeout(&address, CONNECTION_TIMEOUT)
        .map_err(connect_error)?;
    let stream: UnixStream = stream.into();
    stream
        .set_read_timeout(Some(timeout))
        .and_then(|()| stream.set_write_timeout(Some(timeout)))
        .map_err(AppError::ConfigureConnection)?;
    Ok(stream)
}

/// Sends one request and returns the full reply.
pub(crate) fn exchange(stream: &mut UnixStream, request: &str) -> Result<Vec<u8>, AppError> {
    stream
        .write_all(request.as_bytes())
        .map_err(AppError::SendRequest)?;
    let _ = stream.shutdown(Shutdown::Write);
    let mut reply = Vec::new();
    stream
        .read_to_end(&mut reply)
        .map_err(AppError::ReadResponse)?;
    Ok(reply)
}

/// Sends one datagram to a configuration feed.
pub(crate) fn publish(feed: &SocketPath, payload: &[u8]) -> Result<(), AppError> {
    let publish_error = |source| AppError::Publish {
        endpoint: feed.to_string(),
        source,
    };
    let sender = UnixDatagram::unbound().map_err(publish_error)?;
    sender
        .send_to(payload, feed.as_path().as_std_path())
        .map_err(publish_error)?;
    Ok(())
}
