//! Termination signal handling.

use std::io;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::flag;
use tracing::debug;

use super::PROCESS_TARGET;
use super::errors::LaunchError;

/// Installs SIGINT and SIGTERM handlers that set the returned flag.
///
/// The first signal of a kind requests a graceful exit; a second one of the
/// same kind terminates the process with the default action.
pub(crate) fn install_shutdown_flag() -> Result<Arc<AtomicBool>, LaunchError> {
    let shutdown = Arc::new(AtomicBool::new(false));
    register(&shutdown).map_err(|source| LaunchError::Signals { source })?;
    debug!(target: PROCESS_TARGET, "termination handlers installed");
    Ok(shutdown)
}

fn register(shutdown: &Arc<AtomicBool>) -> io::Result<()> {
    for signal in [SIGINT, SIGTERM] {
        flag::register_conditional_default(signal, Arc::clone(shutdown))?;
        flag::register(signal, Arc::clone(shutdown))?;
    }
    Ok(())
}
