//! Human-readable presentation of drop events.

pub(crate) mod packet;
mod table;

pub use packet::{MacAddr, PacketFields};
pub use table::TableRenderer;
