//! Test double for [`HealthReporter`] that records structured events for assertions.

use std::collections::BTreeSet;
use std::sync::Mutex;

use crate::bootstrap::BootstrapError;
use crate::channel::ChannelError;
use crate::engine::DropGroup;
use crate::health::HealthReporter;

use wjh_config::Config;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    ChannelReady(String),
    ChannelFailed(String),
    ShutdownRequested,
    ShutdownCompleted(usize),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    pub fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }

    /// Names of channels reported ready, in report order.
    #[must_use]
    pub fn ready_channels(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                HealthEvent::ChannelReady(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn failed_channels(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, HealthEvent::ChannelFailed(_)))
            .count()
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn channel_ready(&self, channel: &str, _groups: &BTreeSet<DropGroup>) {
        self.record(HealthEvent::ChannelReady(channel.to_owned()));
    }

    fn channel_failed(&self, error: &ChannelError) {
        self.record(HealthEvent::ChannelFailed(error.to_string()));
    }

    fn shutdown_requested(&self) {
        self.record(HealthEvent::ShutdownRequested);
    }

    fn shutdown_completed(&self, failures: usize) {
        self.record(HealthEvent::ShutdownCompleted(failures));
    }
}
