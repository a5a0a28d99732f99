//! A reactor wired to real sockets under a temporary directory.

use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::os::unix::net::{UnixDatagram, UnixStream};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tempfile::TempDir;
use wjh_config::SocketPath;

use crate::dispatch::Dispatcher;
use crate::feed::{ChangeRecord, DatagramFeed, PersistentFeed, PriorityControl, SettingsStore};
use crate::reactor::{PollMultiplexer, Reactor, ReactorError, ReactorParts};
use crate::registry::ChannelRegistry;
use crate::resolve::{NetDb, StaticInterfaceNames};

use super::RecordingHealthReporter;

/// Records every nice level it is asked to apply.
#[derive(Debug, Clone, Default)]
pub struct RecordingPriority {
    levels: Rc<RefCell<Vec<i32>>>,
}

impl RecordingPriority {
    #[must_use]
    pub fn levels(&self) -> Vec<i32> {
        self.levels.borrow().clone()
    }
}

impl PriorityControl for RecordingPriority {
    fn set_nice(&self, level: i32) -> io::Result<()> {
        self.levels.borrow_mut().push(level);
        Ok(())
    }
}

/// Which change-feed a record is published on.
#[derive(Debug, Clone, Copy)]
pub enum Feed {
    Global,
    Channel,
}

pub struct ReactorHarness {
    _dir: TempDir,
    socket: SocketPath,
    global_feed: SocketPath,
    channel_feed: SocketPath,
    settings: SettingsStore,
    reactor: Option<Reactor>,
    pub shutdown: Arc<AtomicBool>,
    pub reporter: Arc<RecordingHealthReporter>,
    pub priority: RecordingPriority,
}

impl ReactorHarness {
    /// Builds a listening reactor serving `registry`.
    #[must_use]
    pub fn new(registry: ChannelRegistry) -> Self {
        let dir = TempDir::new().expect("temporary socket directory");
        let path = |name: &str| {
            SocketPath::new(
                dir.path()
                    .join(name)
                    .to_str()
                    .expect("temporary path was not valid UTF-8"),
            )
        };
        let socket = path("wjh.sock");
        let global_feed = path("global.feed");
        let channel_feed = path("channel.feed");
        let settings = SettingsStore::new(dir.path().join("wjh.settings.json"));
        let shutdown = Arc::new(AtomicBool::new(false));
        let reporter = Arc::new(RecordingHealthReporter::default());
        let priority = RecordingPriority::default();
        let reactor = Reactor::new(ReactorParts {
            multiplexer: Box::new(PollMultiplexer::new()),
            listener: crate::transport::SocketListener::bind(&socket).expect("bind listener"),
            global_feed: Box::new(PersistentFeed::new(
                DatagramFeed::bind("global", &global_feed).expect("bind feed"),
                settings.clone(),
            )),
            channel_feed: Box::new(
                DatagramFeed::bind("channel", &channel_feed).expect("bind feed"),
            ),
            dispatcher: Dispatcher::new(
                registry,
                Box::new(StaticInterfaceNames::default()),
                Box::new(NetDb::default()),
            ),
            priority: Box::new(priority.clone()),
            reporter: reporter.clone(),
            shutdown: Arc::clone(&shutdown),
            client_timeout: Duration::from_secs(2),
            pci_bandwidth: 50,
        });
        Self {
            _dir: dir,
            socket,
            global_feed,
            channel_feed,
            settings,
            reactor: Some(reactor),
            shutdown,
            reporter,
            priority,
        }
    }

    pub fn reactor(&mut self) -> &mut Reactor {
        self.reactor.as_mut().expect("reactor already torn down")
    }

    /// Releases the reactor, closing its sockets.
    pub fn into_registry(&mut self) -> ChannelRegistry {
        self.reactor
            .take()
            .expect("reactor already torn down")
            .into_dispatcher()
            .into_registry()
    }

    #[must_use]
    pub fn socket(&self) -> &SocketPath {
        &self.socket
    }

    /// Global settings stored by the reactor's global feed.
    #[must_use]
    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn turn(&mut self) -> Result<(), ReactorError> {
        self.reactor().turn()
    }

    /// Turns until the reactor is back to listening, failing after `limit`
    /// turns.
    pub fn turn_until_listening(&mut self, limit: usize) {
        for _ in 0..limit {
            self.turn().expect("reactor turn");
            if !self.reactor().state().is_serving() {
                return;
            }
        }
        panic!("reactor still serving after {limit} turns");
    }

    /// Connects a client and sends `request` without waiting for a reply.
    #[must_use]
    pub fn send(&self, request: &str) -> UnixStream {
        let mut client =
            UnixStream::connect(self.socket.as_path().as_std_path()).expect("connect client");
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("client read timeout");
        client.write_all(request.as_bytes()).expect("write request");
        client
    }

    /// Runs one full exchange and returns whatever the daemon wrote.
    pub fn exchange(&mut self, request: &str) -> String {
        let mut client = self.send(request);
        self.turn().expect("accept turn");
        assert!(self.reactor().state().is_serving(), "client accepted");
        self.turn_until_listening(3);
        let mut reply = String::new();
        client.read_to_string(&mut reply).expect("read reply");
        reply
    }

    pub fn publish(&self, feed: Feed, record: &ChangeRecord) {
        let target = match feed {
            Feed::Global => &self.global_feed,
            Feed::Channel => &self.channel_feed,
        };
        let payload = serde_json::to_vec(record).expect("serialise record");
        let sender = UnixDatagram::unbound().expect("unbound datagram socket");
        sender
            .send_to(&payload, target.as_path().as_std_path())
            .expect("publish record");
    }
}
