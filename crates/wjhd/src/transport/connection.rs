//! One accepted client connection.

use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use tracing::debug;

use super::errors::Direction;
use super::{TRANSPORT_TARGET, TransportError};

/// Largest request line accepted from a client.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Blocking client connection with bounded read and write times.
#[derive(Debug)]
pub struct Connection {
    stream: UnixStream,
}

impl Connection {
    /// Switches an accepted stream to blocking mode with `timeout` applied to
    /// every read and write.
    pub fn establish(stream: UnixStream, timeout: Duration) -> Result<Self, TransportError> {
        let configure = |stream: &UnixStream| -> io::Result<()> {
            stream.set_nonblocking(false)?;
            stream.set_read_timeout(Some(timeout))?;
            stream.set_write_timeout(Some(timeout))
        };
        configure(&stream).map_err(|source| TransportError::Configure { source })?;
        Ok(Self { stream })
    }

    /// Reads one request: bytes up to and including the first newline, or
    /// up to end-of-stream. `Ok(None)` means the peer closed without sending
    /// anything.
    pub fn read_request(&mut self) -> Result<Option<String>, TransportError> {
        let mut buffer = Vec::new();
        let mut chunk = [0_u8; 1024];
        loop {
            let bytes_read = self.read_chunk(&mut chunk)?;
            if bytes_read == 0 {
                return Ok((!buffer.is_empty()).then(|| into_text(buffer)));
            }
            let received = &chunk[..bytes_read];
            if let Some(position) = received.iter().position(|byte| *byte == b'\n') {
                buffer.extend_from_slice(&received[..=position]);
                enforce_request_limit(buffer.len())?;
                return Ok(Some(into_text(buffer)));
            }
            buffer.extend_from_slice(received);
            enforce_request_limit(buffer.len())?;
        }
    }

    /// Writes the whole response.
    pub fn send(&mut self, response: &str) -> Result<(), TransportError> {
        self.stream
            .write_all(response.as_bytes())
            .and_then(|()| self.stream.flush())
            .map_err(|source| TransportError::from_io(Direction::Write, source))
    }

    /// Shuts the connection down in both directions and releases it.
    pub fn close(self) {
        if let Err(error) = self.stream.shutdown(Shutdown::Both)
            && error.kind() != io::ErrorKind::NotConnected
        {
            debug!(
                target: TRANSPORT_TARGET,
                error = %error,
                "connection shutdown failed"
            );
        }
    }

    fn read_chunk(&mut self, chunk: &mut [u8]) -> Result<usize, TransportError> {
        loop {
            match self.stream.read(chunk) {
                Ok(read) => return Ok(read),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(TransportError::from_io(Direction::Read, error)),
            }
        }
    }
}

impl AsRawFd for Connection {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

fn enforce_request_limit(size: usize) -> Result<(), TransportError> {
    if size > MAX_REQUEST_BYTES {
        return Err(TransportError::RequestTooLarge {
            limit: MAX_REQUEST_BYTES,
        });
    }
    Ok(())
}

fn into_text(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|error| String::from_utf8_lossy(error.as_bytes()).into_owned())
}
