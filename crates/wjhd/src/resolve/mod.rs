//! Host lookups used when presenting drop events.

mod ifname;
mod netdb;

#[cfg(test)]
pub(crate) use ifname::MockInterfaceNames;
pub use ifname::{InterfaceNames, StaticInterfaceNames, SystemInterfaceNames};
#[cfg(test)]
pub(crate) use netdb::MockProtocolNames;
pub use netdb::{NetDb, ProtocolNames, Transport};

const RESOLVE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::resolve");
