//! Configuration change-feeds.
//!
//! A feed is a readiness source that yields batches of [`ChangeRecord`]s.
//! Draining consumes every pending record in one pass. Global settings are
//! also kept in a [`SettingsStore`] so they survive a restart.

use std::collections::BTreeMap;
use std::os::fd::AsRawFd;

use serde::{Deserialize, Serialize};

mod datagram;
mod priority;
mod settings;
mod store;

pub use self::datagram::DatagramFeed;
#[cfg(test)]
pub(crate) use self::priority::MockPriorityControl;
pub use self::priority::{PriorityControl, SystemPriority};
pub use self::settings::{
    GLOBAL_KEY, GlobalSettings, NICE_LEVEL_FIELD, PCI_BANDWIDTH_FIELD, SettingError,
    StartupSettings, parse_nice_level, parse_pci_bandwidth,
};
pub use self::store::{PersistentFeed, SettingsStore, StoreError};

const FEED_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::feed");

/// Whether a record sets or deletes its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOp {
    /// Set the listed fields.
    #[serde(rename = "SET")]
    Set,
    /// Delete the key.
    #[serde(rename = "DEL")]
    Del,
}

/// One keyed change published on a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Table key the change applies to.
    pub key: String,
    /// Set or delete.
    pub op: ChangeOp,
    /// Field values carried by a `SET`.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl ChangeRecord {
    /// `SET` record for `key` with the given fields.
    #[must_use]
    pub fn set<K, F, V>(key: K, fields: impl IntoIterator<Item = (F, V)>) -> Self
    where
        K: Into<String>,
        F: Into<String>,
        V: Into<String>,
    {
        Self {
            key: key.into(),
            op: ChangeOp::Set,
            fields: fields
                .into_iter()
                .map(|(field, value)| (field.into(), value.into()))
                .collect(),
        }
    }
}

/// Source of configuration changes that the reactor can wait on.
pub trait ChangeFeed: AsRawFd {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Takes every pending record.
    fn drain(&mut self) -> Vec<ChangeRecord>;
}
