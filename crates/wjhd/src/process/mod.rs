//! Daemon process supervision: PID/lock management, signal handling, and the
//! launch sequence.

mod errors;
mod guard;
pub(crate) mod launch;
pub(crate) mod shutdown;

pub use errors::LaunchError;
pub use launch::run_daemon;

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
