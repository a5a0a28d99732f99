//! Name-keyed registry of the daemon's channels.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::{info, warn};

use crate::channel::{ChannelError, ChannelFactory, DropChannel};
use crate::engine::DropGroup;
use crate::health::HealthReporter;

const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// Channel names mapped to the groups bound to each.
pub type Catalog = BTreeMap<String, BTreeSet<DropGroup>>;

/// Channels created at startup.
#[must_use]
pub fn default_catalog() -> Catalog {
    [
        (
            "forwarding",
            vec![DropGroup::L2, DropGroup::Router, DropGroup::Tunnel],
        ),
        ("acl", vec![DropGroup::Acl]),
        ("l1", vec![DropGroup::L1]),
    ]
    .into_iter()
    .map(|(name, groups)| (name.to_owned(), groups.into_iter().collect()))
    .collect()
}

/// Errors raised while populating the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A catalog channel could not be created or bound.
    #[error("failed to bootstrap channel '{channel}': {source}")]
    Bootstrap {
        /// Channel name.
        channel: String,
        /// Underlying error.
        #[source]
        source: ChannelError,
    },
}

/// Owns every channel of the daemon.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: BTreeMap<String, Box<dyn DropChannel>>,
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("channels", &self.channels.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ChannelRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates every catalog channel and binds its groups.
    ///
    /// Stops at the first failure. Channels already created are left in
    /// place; startup aborts and tears them down through [`Self::destroy_all`].
    pub fn create_default_channels(
        &mut self,
        catalog: &Catalog,
        factory: &dyn ChannelFactory,
        reporter: &dyn HealthReporter,
    ) -> Result<(), RegistryError> {
        for (name, groups) in catalog {
            let fail = |source: ChannelError| {
                reporter.channel_failed(&source);
                RegistryError::Bootstrap {
                    channel: name.clone(),
                    source,
                }
            };
            let mut channel = factory.create(name).map_err(fail)?;
            let bound = groups
                .iter()
                .try_for_each(|group| channel.bind_group(*group));
            self.channels.insert(name.clone(), channel);
            bound.map_err(fail)?;
            reporter.channel_ready(name, groups);
        }
        info!(
            target: REGISTRY_TARGET,
            channels = self.channels.len(),
            "default channels created"
        );
        Ok(())
    }

    /// Adds or replaces a channel under its own name.
    pub fn insert(&mut self, channel: Box<dyn DropChannel>) {
        self.channels.insert(channel.name().to_owned(), channel);
    }

    /// Channel called `name`, if any.
    pub fn lookup(&mut self, name: &str) -> Option<&mut (dyn DropChannel + 'static)> {
        self.channels.get_mut(name).map(|channel| &mut **channel)
    }

    /// Whether a channel called `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    /// Number of channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether the registry holds no channels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Destroys and removes every channel, continuing past failures.
    ///
    /// Returns the number of channels whose teardown failed.
    pub fn destroy_all(&mut self) -> usize {
        let mut failures = 0;
        for (name, mut channel) in std::mem::take(&mut self.channels) {
            if let Err(error) = channel.destroy() {
                failures += 1;
                warn!(
                    target: REGISTRY_TARGET,
                    channel = %name,
                    error = %error,
                    "channel teardown failed"
                );
            }
        }
        info!(target: REGISTRY_TARGET, failures, "all channels destroyed");
        failures
    }
}
