//! Persistence for accepted global settings.
//!
//! Global `SET` records that carry a usable value are merged into one stored
//! record under the runtime directory. The next start replays that record as
//! the first part of its startup drain, so a bandwidth change published while
//! the daemon runs takes effect when it restarts.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::settings::{NICE_LEVEL_FIELD, PCI_BANDWIDTH_FIELD, parse_nice_level, parse_pci_bandwidth};
use super::{ChangeFeed, ChangeOp, ChangeRecord, FEED_TARGET, GLOBAL_KEY};

/// Stored settings could not be read or written.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The settings file exists but could not be read.
    #[error("failed to read settings file '{path}': {source}")]
    Read {
        /// Settings file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The settings file does not hold a change record.
    #[error("settings file '{path}' is not a change record: {source}")]
    Parse {
        /// Settings file path.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
    /// Writing the merged settings failed.
    #[error("failed to write settings file '{path}': {source}")]
    Write {
        /// Path being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// File-backed record of the global settings accepted so far.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store kept at `path`. Nothing is touched until the first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the settings file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Reads the stored record; `None` when nothing has been stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the file cannot be read or decoded.
    pub fn load(&self) -> Result<Option<ChangeRecord>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    /// Merges the usable global fields of `records` into the stored record.
    /// A global `DEL` forgets everything stored before it. Returns whether
    /// the file changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the merged record cannot be written.
    pub fn persist(&self, records: &[ChangeRecord]) -> Result<bool, StoreError> {
        let global: Vec<&ChangeRecord> = records
            .iter()
            .filter(|record| record.key == GLOBAL_KEY)
            .collect();
        if global.is_empty() {
            return Ok(false);
        }

        let mut stored = match self.load() {
            Ok(Some(record)) => record.fields,
            Ok(None) => Default::default(),
            Err(error) => {
                warn!(target: FEED_TARGET, error = %error, "discarding unreadable stored settings");
                Default::default()
            }
        };
        let before = stored.clone();
        for record in global {
            match record.op {
                ChangeOp::Del => stored.clear(),
                ChangeOp::Set => {
                    for (field, value) in &record.fields {
                        if is_usable(field, value) {
                            stored.insert(field.clone(), value.trim().to_owned());
                        }
                    }
                }
            }
        }
        if stored == before {
            return Ok(false);
        }

        if stored.is_empty() {
            self.remove()?;
        } else {
            self.write(&ChangeRecord::set(GLOBAL_KEY, stored))?;
        }
        info!(
            target: FEED_TARGET,
            file = %self.path.display(),
            "stored global settings updated"
        );
        Ok(true)
    }

    fn write(&self, record: &ChangeRecord) -> Result<(), StoreError> {
        let staging = self.path.with_extension("tmp");
        let write_error = |source| StoreError::Write {
            path: staging.clone(),
            source,
        };
        let payload = serde_json::to_vec(record).map_err(|source| StoreError::Write {
            path: staging.clone(),
            source: io::Error::other(source),
        })?;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&staging)
            .map_err(write_error)?;
        file.write_all(&payload).map_err(write_error)?;
        file.sync_all().map_err(write_error)?;
        fs::rename(&staging, &self.path).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn remove(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => Err(StoreError::Write {
                path: self.path.clone(),
                source: error,
            }),
            _ => Ok(()),
        }
    }
}

fn is_usable(field: &str, value: &str) -> bool {
    match field {
        PCI_BANDWIDTH_FIELD => parse_pci_bandwidth(value).is_ok(),
        NICE_LEVEL_FIELD => parse_nice_level(value).is_ok(),
        _ => false,
    }
}

/// Feed whose global records outlive the process.
///
/// Every drain is persisted to a [`SettingsStore`] before the records are
/// handed on; [`PersistentFeed::startup_drain`] replays what was stored.
#[derive(Debug)]
pub struct PersistentFeed<F> {
    inner: F,
    store: SettingsStore,
}

impl<F: ChangeFeed> PersistentFeed<F> {
    /// Wraps `inner`, persisting its global records to `store`.
    #[must_use]
    pub fn new(inner: F, store: SettingsStore) -> Self {
        Self { inner, store }
    }

    /// Stored settings followed by everything queued on the live feed.
    ///
    /// An unreadable settings file is logged and skipped so the daemon still
    /// starts from its configuration seeds.
    pub fn startup_drain(&mut self) -> Vec<ChangeRecord> {
        let mut records = match self.store.load() {
            Ok(stored) => stored.into_iter().collect::<Vec<_>>(),
            Err(error) => {
                warn!(target: FEED_TARGET, error = %error, "ignoring stored settings");
                Vec::new()
            }
        };
        debug!(
            target: FEED_TARGET,
            feed = %self.inner.name(),
            replayed = records.len(),
            "replaying stored settings"
        );
        records.extend(self.drain());
        records
    }
}

impl<F: ChangeFeed> ChangeFeed for PersistentFeed<F> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn drain(&mut self) -> Vec<ChangeRecord> {
        let records = self.inner.drain();
        if let Err(error) = self.store.persist(&records) {
            warn!(
                target: FEED_TARGET,
                feed = %self.inner.name(),
                error = %error,
                "failed to persist global settings"
            );
        }
        records
    }
}

impl<F: AsRawFd> AsRawFd for PersistentFeed<F> {
    fn as_raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::GlobalSettings;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct QueuedFeed {
        queued: Vec<ChangeRecord>,
    }

    impl ChangeFeed for QueuedFeed {
        fn name(&self) -> &str {
            "global"
        }

        fn drain(&mut self) -> Vec<ChangeRecord> {
            std::mem::take(&mut self.queued)
        }
    }

    impl AsRawFd for QueuedFeed {
        fn as_raw_fd(&self) -> RawFd {
            -1
        }
    }

    #[fixture]
    fn dir() -> TempDir {
        tempfile::tempdir().expect("temp dir")
    }

    fn store_in(dir: &TempDir) -> SettingsStore {
        SettingsStore::new(dir.path().join("wjh.settings.json"))
    }

    #[rstest]
    fn nothing_stored_loads_as_none(dir: TempDir) {
        assert!(store_in(&dir).load().expect("load").is_none());
    }

    #[rstest]
    fn usable_global_fields_are_merged(dir: TempDir) {
        let store = store_in(&dir);
        assert!(store
            .persist(&[ChangeRecord::set(GLOBAL_KEY, [("pci_bandwidth", "30")])])
            .expect("persist"));
        assert!(store
            .persist(&[
                ChangeRecord::set(GLOBAL_KEY, [("nice_level", " -5 "), ("colour", "blue")]),
                ChangeRecord::set(GLOBAL_KEY, [("pci_bandwidth", "400")]),
                ChangeRecord::set("forwarding", [("pci_bandwidth", "90")]),
            ])
            .expect("persist"));

        let stored = store.load().expect("load").expect("record stored");
        assert_eq!(
            stored,
            ChangeRecord::set(GLOBAL_KEY, [("nice_level", "-5"), ("pci_bandwidth", "30")])
        );
    }

    #[rstest]
    fn unchanged_values_leave_the_file_alone(dir: TempDir) {
        let store = store_in(&dir);
        let record = ChangeRecord::set(GLOBAL_KEY, [("pci_bandwidth", "30")]);
        assert!(store.persist(std::slice::from_ref(&record)).expect("first write"));
        assert!(!store.persist(&[record]).expect("second write"));
        assert!(!store.persist(&[]).expect("empty batch"));
    }

    #[rstest]
    fn global_delete_forgets_stored_settings(dir: TempDir) {
        let store = store_in(&dir);
        store
            .persist(&[ChangeRecord::set(GLOBAL_KEY, [("pci_bandwidth", "30")])])
            .expect("persist");
        let delete = ChangeRecord {
            key: GLOBAL_KEY.to_owned(),
            op: ChangeOp::Del,
            fields: Default::default(),
        };
        assert!(store.persist(&[delete]).expect("delete"));
        assert!(!store.path().exists());
    }

    #[rstest]
    fn corrupt_file_is_reported(dir: TempDir) {
        let store = store_in(&dir);
        fs::write(store.path(), b"not json").expect("write garbage");
        assert!(matches!(store.load(), Err(StoreError::Parse { .. })));
    }

    #[rstest]
    fn records_drained_in_one_run_replay_in_the_next(dir: TempDir) {
        let mut running = PersistentFeed::new(
            QueuedFeed {
                queued: vec![ChangeRecord::set(GLOBAL_KEY, [("pci_bandwidth", "75")])],
            },
            store_in(&dir),
        );
        assert_eq!(running.drain().len(), 1);
        drop(running);

        let mut restarted = PersistentFeed::new(
            QueuedFeed {
                queued: vec![ChangeRecord::set(GLOBAL_KEY, [("nice_level", "4")])],
            },
            store_in(&dir),
        );
        let replayed = restarted.startup_drain();
        assert_eq!(
            GlobalSettings::from_records(&replayed),
            GlobalSettings {
                pci_bandwidth: Some(75),
                nice_level: Some(4),
            }
        );
    }

    #[rstest]
    fn unreadable_store_still_drains_the_live_feed(dir: TempDir) {
        let store = store_in(&dir);
        fs::write(store.path(), b"{").expect("write garbage");
        let mut feed = PersistentFeed::new(
            QueuedFeed {
                queued: vec![ChangeRecord::set(GLOBAL_KEY, [("pci_bandwidth", "20")])],
            },
            store,
        );
        let records = feed.startup_drain();
        assert_eq!(records.len(), 1);
        assert_eq!(
            GlobalSettings::from_records(&records).pci_bandwidth,
            Some(20)
        );
    }
}
