//! Global settings carried on the change-feeds.

use std::num::ParseIntError;
use std::ops::RangeInclusive;

use thiserror::Error;
use tracing::{debug, info, warn};

use wjh_config::{Config, NICE_LEVEL_RANGE, PCI_BANDWIDTH_RANGE};

use super::{ChangeOp, ChangeRecord, FEED_TARGET};

/// Record key holding daemon-wide settings.
pub const GLOBAL_KEY: &str = "global";
/// Global field holding the PCI bandwidth share.
pub const PCI_BANDWIDTH_FIELD: &str = "pci_bandwidth";
/// Global field holding the nice level.
pub const NICE_LEVEL_FIELD: &str = "nice_level";

/// A setting value that could not be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingError {
    /// The value is not an integer.
    #[error("{field} value '{value}' is not an integer: {source}")]
    Invalid {
        /// Setting name.
        field: &'static str,
        /// Value as given.
        value: String,
        /// Parse failure.
        #[source]
        source: ParseIntError,
    },
    /// The value is outside the accepted range.
    #[error("{field} value {value} is outside {min}..={max}")]
    OutOfRange {
        /// Setting name.
        field: &'static str,
        /// Parsed value.
        value: i64,
        /// Smallest accepted value.
        min: i64,
        /// Largest accepted value.
        max: i64,
    },
}

fn parse_in_range(
    field: &'static str,
    value: &str,
    range: RangeInclusive<i64>,
) -> Result<i64, SettingError> {
    let parsed = value
        .trim()
        .parse::<i64>()
        .map_err(|source| SettingError::Invalid {
            field,
            value: value.to_owned(),
            source,
        })?;
    if range.contains(&parsed) {
        Ok(parsed)
    } else {
        Err(SettingError::OutOfRange {
            field,
            value: parsed,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

/// Parses a hardware bandwidth share in percent.
pub fn parse_pci_bandwidth(value: &str) -> Result<u32, SettingError> {
    let parsed = parse_in_range(PCI_BANDWIDTH_FIELD, value, PCI_BANDWIDTH_RANGE)?;
    u32::try_from(parsed).map_err(|_| SettingError::OutOfRange {
        field: PCI_BANDWIDTH_FIELD,
        value: parsed,
        min: *PCI_BANDWIDTH_RANGE.start(),
        max: *PCI_BANDWIDTH_RANGE.end(),
    })
}

/// Parses a process nice level.
pub fn parse_nice_level(value: &str) -> Result<i32, SettingError> {
    let parsed = parse_in_range(NICE_LEVEL_FIELD, value, NICE_LEVEL_RANGE)?;
    i32::try_from(parsed).map_err(|_| SettingError::OutOfRange {
        field: NICE_LEVEL_FIELD,
        value: parsed,
        min: *NICE_LEVEL_RANGE.start(),
        max: *NICE_LEVEL_RANGE.end(),
    })
}

/// Global settings gathered from a batch of change records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalSettings {
    /// Requested PCI bandwidth share.
    pub pci_bandwidth: Option<u32>,
    /// Requested nice level.
    pub nice_level: Option<i32>,
}

impl GlobalSettings {
    /// Folds `SET` records on the global key, later records winning.
    /// Unusable values are logged and ignored.
    #[must_use]
    pub fn from_records(records: &[ChangeRecord]) -> Self {
        let mut settings = Self::default();
        for record in records {
            settings.merge(record);
        }
        settings
    }

    /// Whether no setting was given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pci_bandwidth.is_none() && self.nice_level.is_none()
    }

    fn merge(&mut self, record: &ChangeRecord) {
        if record.key != GLOBAL_KEY || record.op != ChangeOp::Set {
            debug!(
                target: FEED_TARGET,
                key = %record.key,
                op = ?record.op,
                "ignoring change record"
            );
            return;
        }
        for (field, value) in &record.fields {
            let outcome = match field.as_str() {
                PCI_BANDWIDTH_FIELD => {
                    parse_pci_bandwidth(value).map(|parsed| self.pci_bandwidth = Some(parsed))
                }
                NICE_LEVEL_FIELD => {
                    parse_nice_level(value).map(|parsed| self.nice_level = Some(parsed))
                }
                other => {
                    debug!(target: FEED_TARGET, field = %other, "ignoring unknown global field");
                    Ok(())
                }
            };
            if let Err(error) = outcome {
                warn!(target: FEED_TARGET, error = %error, "ignoring invalid global setting");
            }
        }
    }
}

/// Settings fixed at startup: configuration seeds overlaid with the first
/// drain of the global feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupSettings {
    /// PCI bandwidth share passed to the engine.
    pub pci_bandwidth: u32,
    /// Nice level applied at startup.
    pub nice_level: Option<i32>,
}

impl StartupSettings {
    /// Settings seeded from configuration.
    #[must_use]
    pub fn seed(config: &Config) -> Self {
        Self {
            pci_bandwidth: config.pci_bandwidth(),
            nice_level: config.nice_level(),
        }
    }

    /// Overrides seeds with the settings given on the global feed.
    #[must_use]
    pub fn overlay(mut self, global: GlobalSettings) -> Self {
        if let Some(bandwidth) = global.pci_bandwidth {
            info!(target: FEED_TARGET, pci_bandwidth = bandwidth, "setting PCI bandwidth");
            self.pci_bandwidth = bandwidth;
        }
        if let Some(level) = global.nice_level {
            self.nice_level = Some(level);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", Ok(1))]
    #[case(" 100 ", Ok(100))]
    #[case("0", Err(0))]
    #[case("101", Err(101))]
    fn bandwidth_is_a_percentage(#[case] value: &str, #[case] expected: Result<u32, i64>) {
        match (parse_pci_bandwidth(value), expected) {
            (Ok(parsed), Ok(expected)) => assert_eq!(parsed, expected),
            (Err(SettingError::OutOfRange { value, .. }), Err(expected)) => {
                assert_eq!(value, expected);
            }
            (outcome, expected) => panic!("got {outcome:?}, expected {expected:?}"),
        }
    }

    #[rstest]
    #[case("-20", true)]
    #[case("19", true)]
    #[case("20", false)]
    #[case("nice", false)]
    fn nice_level_follows_the_scheduler_range(#[case] value: &str, #[case] valid: bool) {
        assert_eq!(parse_nice_level(value).is_ok(), valid);
    }

    #[test]
    fn only_global_set_records_contribute() {
        let records = vec![
            ChangeRecord::set("global", [("pci_bandwidth", "30"), ("nice_level", "5")]),
            ChangeRecord::set("forwarding", [("nice_level", "7")]),
            ChangeRecord {
                key: "global".to_owned(),
                op: ChangeOp::Del,
                fields: [("nice_level".to_owned(), "9".to_owned())].into(),
            },
            ChangeRecord::set("global", [("nice_level", "-3"), ("colour", "blue")]),
        ];
        assert_eq!(
            GlobalSettings::from_records(&records),
            GlobalSettings {
                pci_bandwidth: Some(30),
                nice_level: Some(-3),
            }
        );
    }

    #[test]
    fn invalid_values_leave_earlier_ones_in_place() {
        let records = vec![
            ChangeRecord::set("global", [("pci_bandwidth", "40")]),
            ChangeRecord::set("global", [("pci_bandwidth", "400")]),
        ];
        assert_eq!(
            GlobalSettings::from_records(&records).pci_bandwidth,
            Some(40)
        );
    }

    #[test]
    fn startup_drain_overrides_configuration_seeds() {
        let config = Config::default();
        let seeded = StartupSettings::seed(&config);
        assert_eq!(seeded.pci_bandwidth, config.pci_bandwidth());

        let overlaid = seeded.overlay(GlobalSettings {
            pci_bandwidth: Some(80),
            nice_level: None,
        });
        assert_eq!(overlaid.pci_bandwidth, 80);
        assert_eq!(overlaid.nice_level, config.nice_level());
    }
}
