//! The daemon's single-threaded event loop.
//!
//! One bounded wait per turn covers both change-feeds, the listener, and at
//! most one client connection. Everything the reactor touches is owned by
//! the loop thread; the only state shared with signal handlers is the
//! shutdown flag.

mod lifecycle;
mod multiplexer;

#[cfg(test)]
pub(crate) use self::multiplexer::MockMultiplexer;
pub use self::lifecycle::ConnectionState;
pub use self::multiplexer::{Multiplexer, PollMultiplexer, Token};

use std::io;
use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::feed::{ChangeFeed, ChangeRecord, GLOBAL_KEY, GlobalSettings, PriorityControl};
use crate::health::HealthReporter;
use crate::transport::{Connection, SocketListener};

const REACTOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::reactor");

/// Upper bound on one multiplexer wait, and so on shutdown latency.
pub const WAIT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Fatal reactor failures.
#[derive(Debug, Error)]
pub enum ReactorError {
    /// The multiplexer wait itself failed.
    #[error("multiplexer wait failed: {0}")]
    Wait(#[source] io::Error),
    /// The multiplexer reported a source the reactor is not serving.
    #[error("ready source {0} has no live counterpart")]
    UnknownReadySource(Token),
}

/// Collaborators the reactor drives.
pub struct ReactorParts {
    /// Readiness wait used by every turn.
    pub multiplexer: Box<dyn Multiplexer>,
    /// Listener for client requests.
    pub listener: SocketListener,
    /// Feed of global setting changes.
    pub global_feed: Box<dyn ChangeFeed>,
    /// Feed of channel-table changes.
    pub channel_feed: Box<dyn ChangeFeed>,
    /// Request handler owning the channels.
    pub dispatcher: Dispatcher,
    /// Applies nice level changes.
    pub priority: Box<dyn PriorityControl>,
    /// Receives lifecycle events.
    pub reporter: Arc<dyn HealthReporter>,
    /// Set asynchronously to request a graceful exit.
    pub shutdown: Arc<AtomicBool>,
    /// Read and write timeout for each client.
    pub client_timeout: Duration,
    /// Bandwidth share the engine was initialised with.
    pub pci_bandwidth: u32,
}

/// Serves feeds and clients until shutdown.
pub struct Reactor {
    multiplexer: Box<dyn Multiplexer>,
    listener: SocketListener,
    global_feed: Box<dyn ChangeFeed>,
    channel_feed: Box<dyn ChangeFeed>,
    dispatcher: Dispatcher,
    priority: Box<dyn PriorityControl>,
    reporter: Arc<dyn HealthReporter>,
    shutdown: Arc<AtomicBool>,
    client_timeout: Duration,
    pci_bandwidth: u32,
    state: ConnectionState,
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("listener", &self.listener)
            .field("state", &self.state)
            .field("client_timeout", &self.client_timeout)
            .finish_non_exhaustive()
    }
}

impl Reactor {
    /// Registers both feeds and the listener, starting in `Listening`.
    #[must_use]
    pub fn new(parts: ReactorParts) -> Self {
        let ReactorParts {
            mut multiplexer,
            listener,
            global_feed,
            channel_feed,
            dispatcher,
            priority,
            reporter,
            shutdown,
            client_timeout,
            pci_bandwidth,
        } = parts;
        multiplexer.register(Token::GlobalFeed, global_feed.as_raw_fd());
        multiplexer.register(Token::ChannelFeed, channel_feed.as_raw_fd());
        multiplexer.register(Token::Listener, listener.as_raw_fd());
        Self {
            multiplexer,
            listener,
            global_feed,
            channel_feed,
            dispatcher,
            priority,
            reporter,
            shutdown,
            client_timeout,
            pci_bandwidth,
            state: ConnectionState::Listening,
        }
    }

    /// Turns until the shutdown flag is observed.
    pub fn run(&mut self) -> Result<(), ReactorError> {
        info!(
            target: REACTOR_TARGET,
            socket = %self.listener.path(),
            "reactor running"
        );
        while !self.shutdown.load(Ordering::SeqCst) {
            self.turn()?;
        }
        self.reporter.shutdown_requested();
        Ok(())
    }

    /// Waits once and services every ready source.
    pub fn turn(&mut self) -> Result<(), ReactorError> {
        let mut ready = self
            .multiplexer
            .wait(WAIT_TIMEOUT)
            .map_err(ReactorError::Wait)?;
        ready.sort_unstable();
        ready.dedup();
        for token in ready {
            self.service(token)?;
        }
        Ok(())
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    /// Releases the dispatcher for teardown. The listener and feeds are
    /// dropped, which removes their socket files.
    #[must_use]
    pub fn into_dispatcher(self) -> Dispatcher {
        let Self {
            mut state,
            dispatcher,
            ..
        } = self;
        if let Some(connection) = state.take_connection() {
            connection.close();
        }
        dispatcher
    }

    fn service(&mut self, token: Token) -> Result<(), ReactorError> {
        match token {
            Token::GlobalFeed => {
                let records = self.global_feed.drain();
                self.apply_global_changes(&records);
                Ok(())
            }
            Token::ChannelFeed => {
                let records = self.channel_feed.drain();
                self.apply_channel_changes(&records);
                Ok(())
            }
            Token::Listener => self.accept(),
            Token::Connection => self.serve(),
        }
    }

    fn apply_global_changes(&mut self, records: &[ChangeRecord]) {
        let settings = GlobalSettings::from_records(records);
        if let Some(bandwidth) = settings.pci_bandwidth
            && bandwidth != self.pci_bandwidth
        {
            info!(
                target: REACTOR_TARGET,
                requested = bandwidth,
                active = self.pci_bandwidth,
                "PCI bandwidth change stored; it applies at the next start"
            );
        }
        if let Some(level) = settings.nice_level {
            self.apply_nice(level);
        }
    }

    fn apply_channel_changes(&mut self, records: &[ChangeRecord]) {
        let (global, channel_table): (Vec<ChangeRecord>, Vec<ChangeRecord>) = records
            .iter()
            .cloned()
            .partition(|record| record.key == GLOBAL_KEY);
        for record in &channel_table {
            info!(
                target: REACTOR_TARGET,
                key = %record.key,
                op = ?record.op,
                "channel table changes are not applied at runtime"
            );
        }
        if let Some(level) = GlobalSettings::from_records(&global).nice_level {
            self.apply_nice(level);
        }
    }

    fn apply_nice(&self, level: i32) {
        match self.priority.set_nice(level) {
            Ok(()) => info!(target: REACTOR_TARGET, nice_level = level, "scheduling priority applied"),
            Err(error) => warn!(
                target: REACTOR_TARGET,
                nice_level = level,
                error = %error,
                "failed to apply scheduling priority"
            ),
        }
    }

    fn accept(&mut self) -> Result<(), ReactorError> {
        if self.state.is_serving() {
            return Err(ReactorError::UnknownReadySource(Token::Listener));
        }
        let stream = match self.listener.accept() {
            Ok(Some(stream)) => stream,
            Ok(None) => return Ok(()),
            Err(error) => {
                warn!(target: REACTOR_TARGET, error = %error, "accept failed");
                return Ok(());
            }
        };
        match Connection::establish(stream, self.client_timeout) {
            Ok(connection) => {
                self.multiplexer
                    .register(Token::Connection, connection.as_raw_fd());
                self.multiplexer.deregister(Token::Listener);
                self.state = ConnectionState::Serving(connection);
                debug!(target: REACTOR_TARGET, "client connected");
            }
            Err(error) => {
                warn!(target: REACTOR_TARGET, error = %error, "failed to configure connection");
            }
        }
        Ok(())
    }

    fn serve(&mut self) -> Result<(), ReactorError> {
        let Some(mut connection) = self.state.take_connection() else {
            return Err(ReactorError::UnknownReadySource(Token::Connection));
        };
        self.exchange(&mut connection);
        self.multiplexer.deregister(Token::Connection);
        connection.close();
        self.multiplexer
            .register(Token::Listener, self.listener.as_raw_fd());
        debug!(target: REACTOR_TARGET, "client closed; listening");
        Ok(())
    }

    fn exchange(&mut self, connection: &mut Connection) {
        let request = match connection.read_request() {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!(target: REACTOR_TARGET, "client closed without a request");
                return;
            }
            Err(error) => {
                warn!(target: REACTOR_TARGET, error = %error, "failed to read request");
                return;
            }
        };
        let Some(response) = self.dispatcher.handle(&request) else {
            return;
        };
        if let Err(error) = connection.send(&response) {
            warn!(target: REACTOR_TARGET, error = %error, "failed to send response");
        }
    }
}
