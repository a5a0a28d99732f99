//! Error types and diagnostics helpers for the CLI runtime.

use std::io;
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("channel name '{0}' must be non-empty without spaces or '='")]
    InvalidChannel(String),
    #[error("{field} value '{value}' is not an integer in {min}..={max}")]
    InvalidSetting {
        field: &'static str,
        value: String,
        min: i64,
        max: i64,
    },
    #[error("failed to connect to daemon at {endpoint}: {source}")]
    Connect { endpoint: String, source: io::Error },
    #[error("failed to configure the daemon connection: {0}")]
    ConfigureConnection(io::Error),
    #[error("failed to send request to daemon: {0}")]
    SendRequest(io::Error),
    #[error("failed to read response from daemon: {0}")]
    ReadResponse(io::Error),
    #[error("failed to forward daemon output: {0}")]
    ForwardResponse(io::Error),
    #[error("failed to serialise setting change: {0}")]
    SerialiseChange(serde_json::Error),
    #[error("failed to publish setting change to {endpoint}: {source}")]
    Publish { endpoint: String, source: io::Error },
}

/// Determines whether an error indicates the daemon is not running.
///
/// Returns true for connection-refused and socket-not-found errors, which
/// mean nothing is listening on the configured socket.
pub(crate) fn is_daemon_not_running(error: &AppError) -> bool {
    match error {
        AppError::Connect { source, .. } | AppError::Publish { source, .. } => matches!(
            source.kind(),
            io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
        ),
        _ => false,
    }
}
