use std::ops::RangeInclusive;
use std::time::Duration;

use camino::Utf8PathBuf;

use crate::logging::LogFormat;
use crate::socket::SocketPath;

/// Default IPC socket served by the daemon.
pub const DEFAULT_DAEMON_SOCKET: &str = "/var/run/wjh/wjh.sock";

/// Default datagram socket carrying global setting changes.
pub const DEFAULT_GLOBAL_FEED_SOCKET: &str = "/var/run/wjh/wjh-global.sock";

/// Default datagram socket carrying channel-table changes.
pub const DEFAULT_CHANNEL_FEED_SOCKET: &str = "/var/run/wjh/wjh-channel.sock";

/// Engine configuration file, passed to the engine only when present.
pub const DEFAULT_ENGINE_CONFIG_PATH: &str = "/etc/sonic/wjh/wjh.xml";

/// Share of the PCI bandwidth granted to drop capture, in percent.
pub const DEFAULT_PCI_BANDWIDTH: u32 = 50;

/// Accepted PCI bandwidth shares, in percent.
pub const PCI_BANDWIDTH_RANGE: RangeInclusive<i64> = 1..=100;

/// Accepted process nice levels.
pub const NICE_LEVEL_RANGE: RangeInclusive<i64> = -20..=19;

/// Per-operation timeout applied to client connections, in seconds.
pub const DEFAULT_CLIENT_TIMEOUT_SECS: u64 = 10;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default IPC socket served by the daemon.
#[must_use]
pub fn default_daemon_socket() -> SocketPath {
    SocketPath::new(DEFAULT_DAEMON_SOCKET)
}

/// Default datagram socket for global setting changes.
#[must_use]
pub fn default_global_feed_socket() -> SocketPath {
    SocketPath::new(DEFAULT_GLOBAL_FEED_SOCKET)
}

/// Default datagram socket for channel-table changes.
#[must_use]
pub fn default_channel_feed_socket() -> SocketPath {
    SocketPath::new(DEFAULT_CHANNEL_FEED_SOCKET)
}

/// Default engine configuration file path.
#[must_use]
pub fn default_engine_config_path() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_ENGINE_CONFIG_PATH)
}

/// Default PCI bandwidth share, in percent.
#[must_use]
pub fn default_pci_bandwidth() -> u32 {
    DEFAULT_PCI_BANDWIDTH
}

/// Default client timeout, in seconds.
#[must_use]
pub fn default_client_timeout_secs() -> u64 {
    DEFAULT_CLIENT_TIMEOUT_SECS
}

/// Default client timeout as a [`Duration`].
#[must_use]
pub fn default_client_timeout() -> Duration {
    Duration::from_secs(DEFAULT_CLIENT_TIMEOUT_SECS)
}
