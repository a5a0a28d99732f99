//! Readiness multiplexing over `poll(2)`.

use std::collections::BTreeMap;
use std::io;
use std::os::fd::{BorrowedFd, RawFd};
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

/// Readiness sources watched by the reactor.
///
/// The ordering is the servicing order within one wake-up: both feeds come
/// before any socket I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
pub enum Token {
    /// Global setting changes.
    GlobalFeed,
    /// Channel-table changes.
    ChannelFeed,
    /// Listening socket.
    Listener,
    /// Accepted client.
    Connection,
}

/// Waits for readiness on a set of registered descriptors.
#[cfg_attr(test, mockall::automock)]
pub trait Multiplexer {
    /// Watches `fd` for input under `token`, replacing any previous entry.
    fn register(&mut self, token: Token, fd: RawFd);

    /// Stops watching `token`. Unknown tokens are ignored.
    fn deregister(&mut self, token: Token);

    /// Blocks for at most `timeout` and returns the ready tokens in
    /// servicing order. An interrupted wait returns no tokens.
    fn wait(&mut self, timeout: Duration) -> io::Result<Vec<Token>>;
}

/// [`Multiplexer`] built on `poll(2)`.
#[derive(Debug, Default)]
pub struct PollMultiplexer {
    sources: BTreeMap<Token, RawFd>,
}

impl PollMultiplexer {
    /// Multiplexer watching nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `token` is being watched.
    #[must_use]
    pub fn is_registered(&self, token: Token) -> bool {
        self.sources.contains_key(&token)
    }
}

impl Multiplexer for PollMultiplexer {
    fn register(&mut self, token: Token, fd: RawFd) {
        self.sources.insert(token, fd);
    }

    fn deregister(&mut self, token: Token) {
        self.sources.remove(&token);
    }

    fn wait(&mut self, timeout: Duration) -> io::Result<Vec<Token>> {
        let tokens: Vec<Token> = self.sources.keys().copied().collect();
        let mut fds: Vec<PollFd<'_>> = self
            .sources
            .values()
            .map(|fd| {
                // SAFETY: registered descriptors are owned by the reactor's
                // sources, which deregister before closing them.
                let borrowed = unsafe { BorrowedFd::borrow_raw(*fd) };
                PollFd::new(borrowed, PollFlags::POLLIN)
            })
            .collect();
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        match poll(&mut fds, PollTimeout::from(millis)) {
            Ok(0) | Err(Errno::EINTR) => Ok(Vec::new()),
            Ok(_) => Ok(tokens
                .into_iter()
                .zip(&fds)
                .filter(|(_, fd)| fd.revents().is_some_and(|events| !events.is_empty()))
                .map(|(token, _)| token)
                .collect()),
            Err(errno) => Err(io::Error::from(errno)),
        }
    }
}
