//! Test harness utilities shared by the daemon's unit and behavioural suites.

mod channel;
mod config_loader;
mod engine;
mod events;
mod reactor;
mod reporter;
mod world;

pub use channel::{FakeChannel, FakeChannelFactory, PendingEvents};
pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use engine::MockEngine;
pub use events::{acl_event, forwarding_event};
pub use reactor::{Feed, ReactorHarness};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{TestWorld, world};
