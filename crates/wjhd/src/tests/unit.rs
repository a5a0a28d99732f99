//! Unit tests for the daemon bootstrap and registry startup.

use std::sync::Arc;

use rstest::rstest;

use crate::bootstrap_with;
use crate::engine::DropGroup;
use crate::registry::default_catalog;

use super::support::{
    FailingConfigLoader, HealthEvent, RecordingHealthReporter, TestConfigLoader,
};

#[rstest]
fn bootstrap_reports_start_and_success() {
    let loader = TestConfigLoader::new();
    let reporter = Arc::new(RecordingHealthReporter::default());

    let daemon = bootstrap_with(&loader, reporter.clone()).expect("bootstrap should succeed");

    assert_eq!(daemon.config(), &loader.config());
    assert_eq!(
        reporter.events(),
        vec![HealthEvent::BootstrapStarting, HealthEvent::BootstrapSucceeded]
    );
}

#[rstest]
fn bootstrap_failure_is_reported_once() {
    let reporter = Arc::new(RecordingHealthReporter::default());

    let error = bootstrap_with(&FailingConfigLoader, reporter.clone())
        .expect_err("configuration is invalid");

    let events = reporter.events();
    assert_eq!(events.len(), 2, "{events:?}");
    assert_eq!(
        events[1],
        HealthEvent::BootstrapFailed(error.to_string())
    );
}

#[rstest]
fn default_catalog_binds_every_group_once() {
    let catalog = default_catalog();

    let mut groups: Vec<DropGroup> = catalog.values().flatten().copied().collect();
    groups.sort();
    let total = groups.len();
    groups.dedup();

    assert_eq!(total, groups.len(), "a group is bound to two channels");
}
