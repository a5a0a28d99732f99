//! The "What Just Happened" drop-capture daemon.
//!
//! `wjhd` binds drop-reason groups of a drop-capture engine to named
//! channels and serves pull requests for them over a local socket. A request
//! names one or more channels; the daemon pulls each from the engine and
//! replies with one human-readable table of the drops captured since the
//! last pull.
//!
//! Everything runs on one thread. The [`Reactor`] multiplexes two
//! configuration change-feeds, the listening socket, and at most one client
//! connection. Engine callbacks reach the channel being pulled through a
//! scoped pull context that is cleared on every exit path, so a callback can
//! never be attributed to a stale channel.
//!
//! Startup loads the shared [`wjh_config::Config`], installs telemetry,
//! takes the daemon lock, initialises the engine, and creates the default
//! channels (`forwarding`, `acl`, `l1`). Any failure there aborts the
//! process. After SIGINT or SIGTERM the reactor exits within one bounded
//! wait and every channel is torn down, continuing past failures.

mod bootstrap;
pub mod channel;
pub mod dispatch;
pub mod engine;
pub mod feed;
mod health;
mod process;
pub mod reactor;
pub mod registry;
pub mod render;
pub mod resolve;
pub mod telemetry;
pub mod transport;

pub use bootstrap::{BootstrapError, ConfigLoader, Daemon, SystemConfigLoader, bootstrap_with};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, run_daemon};
pub use reactor::{Reactor, ReactorError};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
