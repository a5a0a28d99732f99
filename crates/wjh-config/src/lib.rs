//! Shared configuration for the drop-capture daemon and its client.
//!
//! Values are layered by `ortho_config`: built-in defaults, then a `wjh.toml`
//! configuration file, then `WJH_*` environment variables, then command-line
//! flags. Both binaries load the same [`Config`] so that socket locations and
//! timeouts always agree.

use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

mod defaults;
mod logging;
mod runtime;
mod socket;

pub use defaults::{
    DEFAULT_CHANNEL_FEED_SOCKET, DEFAULT_CLIENT_TIMEOUT_SECS, DEFAULT_DAEMON_SOCKET,
    DEFAULT_ENGINE_CONFIG_PATH, DEFAULT_GLOBAL_FEED_SOCKET, DEFAULT_LOG_FILTER,
    DEFAULT_PCI_BANDWIDTH, NICE_LEVEL_RANGE, PCI_BANDWIDTH_RANGE, default_channel_feed_socket, default_client_timeout,
    default_client_timeout_secs, default_daemon_socket, default_engine_config_path,
    default_global_feed_socket, default_log_filter, default_log_filter_string,
    default_log_format, default_pci_bandwidth,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use runtime::{RuntimePaths, RuntimePathsError};
pub use socket::{SocketParseError, SocketPath, SocketPreparationError};

/// Layered configuration shared by `wjhd` and `wjhcli`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "WJH",
    discovery(
        app_name = "wjh",
        env_var = "WJH_CONFIG_PATH",
        config_file_name = "wjh.toml",
        dotfile_name = ".wjh.toml",
        config_cli_long = "config-path",
        config_cli_visible = true,
    )
)]
pub struct Config {
    /// IPC socket served by the daemon.
    #[serde(default = "default_daemon_socket")]
    #[ortho_config(default = default_daemon_socket())]
    pub daemon_socket: SocketPath,
    /// Read and write timeout for a client exchange, in seconds.
    #[serde(default = "default_client_timeout_secs")]
    #[ortho_config(default = DEFAULT_CLIENT_TIMEOUT_SECS)]
    pub client_timeout_secs: u64,
    /// Datagram socket receiving global setting changes.
    #[serde(default = "default_global_feed_socket")]
    #[ortho_config(default = default_global_feed_socket())]
    pub global_feed_socket: SocketPath,
    /// Datagram socket receiving channel-table changes.
    #[serde(default = "default_channel_feed_socket")]
    #[ortho_config(default = default_channel_feed_socket())]
    pub channel_feed_socket: SocketPath,
    /// Engine configuration file, used when it exists.
    #[serde(default = "default_engine_config_path")]
    #[ortho_config(default = default_engine_config_path())]
    pub engine_config_path: Utf8PathBuf,
    /// Seed for the engine's PCI bandwidth share, in percent.
    #[serde(default = "default_pci_bandwidth")]
    #[ortho_config(default = DEFAULT_PCI_BANDWIDTH)]
    pub pci_bandwidth: u32,
    /// Seed scheduling priority applied at startup.
    #[serde(default)]
    pub nice_level: Option<i32>,
    /// `tracing` filter expression.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Telemetry output format.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_daemon_socket(),
            client_timeout_secs: DEFAULT_CLIENT_TIMEOUT_SECS,
            global_feed_socket: default_global_feed_socket(),
            channel_feed_socket: default_channel_feed_socket(),
            engine_config_path: default_engine_config_path(),
            pci_bandwidth: DEFAULT_PCI_BANDWIDTH,
            nice_level: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads the layered configuration using the process arguments.
    ///
    /// # Errors
    ///
    /// Returns the loader error when a layer cannot be read or a value fails
    /// to parse.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Loads the layered configuration from an explicit argument list.
    ///
    /// The first item is treated as the program name.
    ///
    /// # Errors
    ///
    /// Returns the loader error when a layer cannot be read or a value fails
    /// to parse.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// IPC socket served by the daemon.
    #[must_use]
    pub fn daemon_socket(&self) -> &SocketPath {
        &self.daemon_socket
    }

    /// Per-operation timeout for a client exchange.
    ///
    /// A zero value would disable the timeout entirely, so it falls back to
    /// the default instead.
    #[must_use]
    pub fn client_timeout(&self) -> Duration {
        match self.client_timeout_secs {
            0 => default_client_timeout(),
            secs => Duration::from_secs(secs),
        }
    }

    /// Datagram socket receiving global setting changes.
    #[must_use]
    pub fn global_feed_socket(&self) -> &SocketPath {
        &self.global_feed_socket
    }

    /// Datagram socket receiving channel-table changes.
    #[must_use]
    pub fn channel_feed_socket(&self) -> &SocketPath {
        &self.channel_feed_socket
    }

    /// Engine configuration file path, whether or not it exists.
    #[must_use]
    pub fn engine_config_path(&self) -> &camino::Utf8Path {
        self.engine_config_path.as_path()
    }

    /// Seed PCI bandwidth share, in percent.
    #[must_use]
    pub fn pci_bandwidth(&self) -> u32 {
        self.pci_bandwidth
    }

    /// Seed scheduling priority, if configured.
    #[must_use]
    pub fn nice_level(&self) -> Option<i32> {
        self.nice_level
    }

    /// `tracing` filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Telemetry output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
