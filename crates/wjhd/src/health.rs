//! Structured health reporting for daemon lifecycle events.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::bootstrap::BootstrapError;
use crate::channel::ChannelError;
use crate::engine::DropGroup;

use wjh_config::Config;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once a default channel is created and all its groups are bound.
    fn channel_ready(&self, channel: &str, groups: &BTreeSet<DropGroup>);

    /// Invoked when a default channel cannot be brought up.
    fn channel_failed(&self, error: &ChannelError);

    /// Invoked when the reactor observes the shutdown flag.
    fn shutdown_requested(&self);

    /// Invoked after teardown. `failures` counts channels that did not
    /// tear down cleanly.
    fn shutdown_completed(&self, failures: usize);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn channel_ready(&self, channel: &str, groups: &BTreeSet<DropGroup>) {
        (**self).channel_ready(channel, groups);
    }

    fn channel_failed(&self, error: &ChannelError) {
        (**self).channel_failed(error);
    }

    fn shutdown_requested(&self) {
        (**self).shutdown_requested();
    }

    fn shutdown_completed(&self, failures: usize) {
        (**self).shutdown_completed(failures);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.daemon_socket(),
            global_feed = %config.global_feed_socket(),
            channel_feed = %config.channel_feed_socket(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn channel_ready(&self, channel: &str, groups: &BTreeSet<DropGroup>) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "channel_ready",
            channel,
            groups = ?groups,
            "channel ready"
        );
    }

    fn channel_failed(&self, error: &ChannelError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "channel_failed",
            error = %error,
            "channel failed to start"
        );
    }

    fn shutdown_requested(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "shutdown_requested",
            "shutdown requested"
        );
    }

    fn shutdown_completed(&self, failures: usize) {
        if failures == 0 {
            tracing::info!(
                target: HEALTH_TARGET,
                event = "shutdown_completed",
                "daemon shut down cleanly"
            );
        } else {
            tracing::warn!(
                target: HEALTH_TARGET,
                event = "shutdown_completed",
                failures,
                "daemon shut down with teardown failures"
            );
        }
    }
}
