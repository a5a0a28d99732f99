//! Request dispatch: parse a request line, pull the named channels, and
//! render one reply.
//!
//! Unknown channels produce an error line and do not abort the request. Error
//! lines come first, followed by a single table covering every event pulled
//! for the request. Malformed requests get no reply at all.

mod request;

pub use self::request::{PullRequest, RequestError, parse_request};

use tracing::{debug, warn};

use crate::channel::RawEvent;
use crate::registry::ChannelRegistry;
use crate::render::TableRenderer;
use crate::resolve::{InterfaceNames, ProtocolNames};

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Serves pull requests against the channel registry.
pub struct Dispatcher {
    registry: ChannelRegistry,
    interfaces: Box<dyn InterfaceNames>,
    protocols: Box<dyn ProtocolNames>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Dispatcher serving the channels of `registry`.
    #[must_use]
    pub fn new(
        registry: ChannelRegistry,
        interfaces: Box<dyn InterfaceNames>,
        protocols: Box<dyn ProtocolNames>,
    ) -> Self {
        Self {
            registry,
            interfaces,
            protocols,
        }
    }

    /// Handles one request line. `None` means no reply is sent.
    pub fn handle(&mut self, line: &str) -> Option<String> {
        match parse_request(line) {
            Ok(request) => Some(self.pull(&request)),
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    error = %error,
                    request = %line.trim_end(),
                    "ignoring malformed request"
                );
                None
            }
        }
    }

    fn pull(&mut self, request: &PullRequest) -> String {
        self.interfaces.refresh();
        let mut response = String::new();
        let mut events: Vec<RawEvent> = Vec::new();
        for name in &request.channels {
            let Some(channel) = self.registry.lookup(name) else {
                response.push_str(&format!("Channel {name} does not exist\n"));
                continue;
            };
            if let Err(error) = channel.pull(self.interfaces.as_ref()) {
                warn!(
                    target: DISPATCH_TARGET,
                    channel = %name,
                    error = %error,
                    "pull failed; replying with the events delivered so far"
                );
            }
            events.extend_from_slice(channel.cache());
            channel.clear_cache();
        }
        debug!(
            target: DISPATCH_TARGET,
            channels = request.channels.len(),
            events = events.len(),
            "pull request served"
        );
        response.push_str(&TableRenderer::new(self.protocols.as_ref()).render(&events));
        response
    }

    /// Registry of served channels.
    pub fn registry_mut(&mut self) -> &mut ChannelRegistry {
        &mut self.registry
    }

    /// Releases the registry for teardown.
    #[must_use]
    pub fn into_registry(self) -> ChannelRegistry {
        self.registry
    }
}
