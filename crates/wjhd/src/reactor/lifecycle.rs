//! Single-client connection state.

use crate::transport::Connection;

/// Whether the reactor is waiting for a client or serving one.
///
/// While `Serving`, the listener is not registered with the multiplexer, so
/// further clients queue in the socket backlog.
#[derive(Debug, Default)]
pub enum ConnectionState {
    /// Waiting for a client on the listener.
    #[default]
    Listening,
    /// Serving one accepted client.
    Serving(Connection),
}

impl ConnectionState {
    /// Whether a client is being served.
    #[must_use]
    pub fn is_serving(&self) -> bool {
        matches!(self, Self::Serving(_))
    }

    /// Takes the active connection, leaving the state `Listening`.
    pub fn take_connection(&mut self) -> Option<Connection> {
        match std::mem::take(self) {
            Self::Serving(connection) => Some(connection),
            Self::Listening => None,
        }
    }
}
