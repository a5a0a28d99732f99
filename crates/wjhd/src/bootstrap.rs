//! Daemon bootstrap orchestration.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use wjh_config::{Config, SocketPreparationError};

use crate::health::HealthReporter;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying error.
        #[source]
        source: TelemetryError,
    },
    /// A socket directory could not be prepared.
    #[error("failed to prepare socket '{socket}': {source}")]
    Socket {
        /// Socket whose directory could not be prepared.
        socket: String,
        /// Underlying error.
        #[source]
        source: SocketPreparationError,
    },
}

/// Result of a successful bootstrap.
pub struct Daemon {
    config: Config,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Daemon {
    /// Configuration the daemon was started with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle proving telemetry is installed.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Health reporter shared with the runtime.
    #[must_use]
    pub fn reporter(&self) -> Arc<dyn HealthReporter> {
        Arc::clone(&self.reporter)
    }
}

/// Loads configuration, installs telemetry, and prepares the directories of
/// the request socket and both change-feed sockets.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    for socket in [
        config.daemon_socket(),
        config.global_feed_socket(),
        config.channel_feed_socket(),
    ] {
        if let Err(source) = socket.prepare_filesystem() {
            let error = BootstrapError::Socket {
                socket: socket.to_string(),
                source,
            };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    }

    reporter.bootstrap_succeeded(&config);
    Ok(Daemon {
        config,
        telemetry,
        reporter,
    })
}
