//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::{Arc, Mutex};

use ortho_config::OrthoError;
use tempfile::TempDir;
use wjh_config::{Config, SocketPath};

use crate::bootstrap::ConfigLoader;

/// Loader that places every daemon socket under a temporary directory.
#[derive(Clone)]
pub struct TestConfigLoader {
    socket_dir: Arc<Mutex<TempDir>>,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temporary directory for sockets");
        Self {
            socket_dir: Arc::new(Mutex::new(dir)),
        }
    }

    /// Path of `name` inside the temporary socket directory.
    pub fn socket_path(&self, name: &str) -> SocketPath {
        let dir = self
            .socket_dir
            .lock()
            .expect("temporary directory mutex poisoned");
        let path = dir.path().join(name);
        SocketPath::new(
            path.to_str()
                .expect("temporary socket path was not valid UTF-8"),
        )
    }

    #[must_use]
    pub fn config(&self) -> Config {
        Config {
            daemon_socket: self.socket_path("wjh.sock"),
            global_feed_socket: self.socket_path("global.feed"),
            channel_feed_socket: self.socket_path("channel.feed"),
            engine_config_path: self
                .socket_path("engine.conf")
                .as_path()
                .to_path_buf(),
            ..Config::default()
        }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config())
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("wjhd"),
            OsString::from("--daemon-socket"),
            OsString::from("invalid://socket"),
        ];
        Config::load_from_iter(args)
    }
}
