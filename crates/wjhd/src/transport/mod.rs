//! Unix socket transport for client requests.
//!
//! The daemon serves one connection at a time from its reactor thread, so the
//! listener is non-blocking and accepted connections are blocking with
//! per-operation timeouts.

mod connection;
mod errors;
mod listener;
pub(crate) mod socket;

pub use self::connection::{Connection, MAX_REQUEST_BYTES};
pub use self::errors::{Direction, ListenerError, TransportError};
pub use self::listener::SocketListener;

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
