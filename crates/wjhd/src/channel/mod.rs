//! Named drop channels and the event cache they own.
//!
//! A [`Channel`] wraps one engine channel handle. Groups are bound to it
//! through the engine's group lifecycle, and [`DropChannel::pull`] flushes the
//! engine's buffer into the channel's cache through the callback router.

use std::collections::BTreeSet;

use strum::Display;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::engine::{
    ChannelHandle, ChannelMode, DeliveryMode, DropGroup, EngineError, Severity, SharedEngine,
};
use crate::resolve::InterfaceNames;

mod event;
mod router;

pub use event::{EventDetail, PortRef, RawEvent};
pub use router::{callback_for, pull_context_active};

use router::PullScope;

pub(crate) const CHANNEL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::channel");

/// Step of the group lifecycle that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum GroupStep {
    /// Starting detection for the group.
    Initialise,
    /// Attaching the group to the channel.
    Bind,
    /// Enabling severities.
    Enable,
    /// Disabling severities.
    Disable,
    /// Detaching the group from the channel.
    Unbind,
    /// Stopping detection for the group.
    Deinitialise,
}

/// Errors raised by channel operations.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The engine refused to allocate or configure the channel.
    #[error("failed to create channel '{channel}': {source}")]
    Create {
        /// Channel name.
        channel: String,
        /// Engine failure.
        #[source]
        source: EngineError,
    },
    /// One step of binding or unbinding a group failed.
    #[error("channel '{channel}' could not {step} group {group}: {source}")]
    Group {
        /// Channel name.
        channel: String,
        /// Group being bound or unbound.
        group: DropGroup,
        /// Step that failed.
        step: GroupStep,
        /// Engine failure.
        #[source]
        source: EngineError,
    },
    /// Teardown completed with failures.
    #[error("channel '{channel}' teardown finished with {failures} failed step(s)")]
    Destroy {
        /// Channel being destroyed.
        channel: String,
        /// Number of teardown steps that failed.
        failures: usize,
    },
    /// The engine pull failed. Events delivered before the failure are kept.
    #[error("failed to pull channel '{channel}': {source}")]
    Pull {
        /// Channel name.
        channel: String,
        /// Engine failure.
        #[source]
        source: EngineError,
    },
    /// Another pull is still routing callbacks.
    #[error("cannot pull channel '{channel}' while '{active}' is being pulled")]
    PullInProgress {
        /// Channel whose pull was refused.
        channel: String,
        /// Channel whose pull is still routing.
        active: String,
    },
}

/// A named collection point for drop events.
pub trait DropChannel {
    /// Name clients use to address the channel.
    fn name(&self) -> &str;

    /// Binds a group to this channel and enables every severity. Binding a
    /// group that is already bound succeeds without touching the engine.
    fn bind_group(&mut self, group: DropGroup) -> Result<(), ChannelError>;

    /// Disables, unbinds and releases a group. Unbinding a group that is not
    /// bound succeeds without touching the engine.
    fn unbind_group(&mut self, group: DropGroup) -> Result<(), ChannelError>;

    /// Unbinds every group and releases the engine channel. Every step is
    /// attempted even after a failure.
    fn destroy(&mut self) -> Result<(), ChannelError>;

    /// Appends every event buffered by the engine to the cache.
    fn pull(&mut self, interfaces: &dyn InterfaceNames) -> Result<(), ChannelError>;

    /// Events pulled since the last clear, in delivery order.
    fn cache(&self) -> &[RawEvent];

    /// Empties the cache.
    fn clear_cache(&mut self);

    /// Groups currently bound to this channel.
    fn bound_groups(&self) -> &BTreeSet<DropGroup>;
}

/// Channel backed by a [`crate::engine::DropEngine`] handle.
pub struct Channel {
    name: String,
    engine: SharedEngine,
    handle: ChannelHandle,
    bound: BTreeSet<DropGroup>,
    cache: Vec<RawEvent>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .field("bound", &self.bound)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl Channel {
    /// Allocates an engine channel and configures pull delivery.
    pub fn create(
        name: impl Into<String>,
        engine: SharedEngine,
        mode: ChannelMode,
    ) -> Result<Self, ChannelError> {
        let name = name.into();
        let handle = {
            let mut engine = engine.borrow_mut();
            let handle = engine
                .create_channel(mode)
                .map_err(|source| create_failed(&name, source))?;
            engine
                .set_delivery(handle, DeliveryMode::Pull)
                .map_err(|source| create_failed(&name, source))?;
            handle
        };
        debug!(target: CHANNEL_TARGET, channel = %name, %handle, %mode, "channel created");
        Ok(Self {
            name,
            engine,
            handle,
            bound: BTreeSet::new(),
            cache: Vec::new(),
        })
    }

    /// Engine-side handle of the channel.
    #[must_use]
    pub fn handle(&self) -> ChannelHandle {
        self.handle
    }

    fn group_failed(&self, group: DropGroup, step: GroupStep, source: EngineError) -> ChannelError {
        error!(
            target: CHANNEL_TARGET,
            channel = %self.name,
            %group,
            %step,
            status = %source.status,
            "engine group operation failed"
        );
        ChannelError::Group {
            channel: self.name.clone(),
            group,
            step,
            source,
        }
    }
}

fn create_failed(name: &str, source: EngineError) -> ChannelError {
    error!(
        target: CHANNEL_TARGET,
        channel = %name,
        status = %source.status,
        operation = %source.operation,
        "engine refused channel creation"
    );
    ChannelError::Create {
        channel: name.to_owned(),
        source,
    }
}

impl DropChannel for Channel {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind_group(&mut self, group: DropGroup) -> Result<(), ChannelError> {
        if self.bound.contains(&group) {
            return Ok(());
        }
        let outcome = {
            let mut engine = self.engine.borrow_mut();
            engine
                .init_group(group, callback_for(group))
                .map_err(|source| (GroupStep::Initialise, source))
                .and_then(|()| {
                    engine
                        .bind_group(group, self.handle)
                        .map_err(|source| (GroupStep::Bind, source))
                })
                .and_then(|()| {
                    engine
                        .enable_group(group, &Severity::ALL)
                        .map_err(|source| (GroupStep::Enable, source))
                })
        };
        outcome.map_err(|(step, source)| self.group_failed(group, step, source))?;
        self.bound.insert(group);
        debug!(target: CHANNEL_TARGET, channel = %self.name, %group, "group bound");
        Ok(())
    }

    fn unbind_group(&mut self, group: DropGroup) -> Result<(), ChannelError> {
        if !self.bound.contains(&group) {
            return Ok(());
        }
        let outcome = {
            let mut engine = self.engine.borrow_mut();
            engine
                .disable_group(group, &Severity::ALL)
                .map_err(|source| (GroupStep::Disable, source))
                .and_then(|()| {
                    engine
                        .unbind_group(group)
                        .map_err(|source| (GroupStep::Unbind, source))
                })
                .and_then(|()| {
                    engine
                        .deinit_group(group)
                        .map_err(|source| (GroupStep::Deinitialise, source))
                })
        };
        outcome.map_err(|(step, source)| self.group_failed(group, step, source))?;
        self.bound.remove(&group);
        debug!(target: CHANNEL_TARGET, channel = %self.name, %group, "group unbound");
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), ChannelError> {
        let mut failures = 0;
        let groups: Vec<DropGroup> = self.bound.iter().copied().collect();
        for group in groups {
            if self.unbind_group(group).is_err() {
                failures += 1;
            }
        }
        if let Err(source) = self.engine.borrow_mut().destroy_channel(self.handle) {
            error!(
                target: CHANNEL_TARGET,
                channel = %self.name,
                status = %source.status,
                "engine refused channel destruction"
            );
            failures += 1;
        }
        self.cache.clear();
        if failures == 0 {
            debug!(target: CHANNEL_TARGET, channel = %self.name, "channel destroyed");
            Ok(())
        } else {
            Err(ChannelError::Destroy {
                channel: self.name.clone(),
                failures,
            })
        }
    }

    fn pull(&mut self, interfaces: &dyn InterfaceNames) -> Result<(), ChannelError> {
        let scope = PullScope::enter(&self.name).map_err(|active| {
            warn!(
                target: CHANNEL_TARGET,
                channel = %self.name,
                active = %active,
                "pull refused while another pull is routing"
            );
            ChannelError::PullInProgress {
                channel: self.name.clone(),
                active,
            }
        })?;
        let outcome = self.engine.borrow_mut().pull(self.handle);
        let routed = scope.take_records();
        drop(scope);

        let delivered = routed.len();
        self.cache
            .extend(routed.into_iter().map(|record| record.into_event(interfaces)));
        match outcome {
            Ok(()) => {
                debug!(target: CHANNEL_TARGET, channel = %self.name, delivered, "channel pulled");
                Ok(())
            }
            Err(source) => {
                error!(
                    target: CHANNEL_TARGET,
                    channel = %self.name,
                    status = %source.status,
                    delivered,
                    "engine pull failed"
                );
                Err(ChannelError::Pull {
                    channel: self.name.clone(),
                    source,
                })
            }
        }
    }

    fn cache(&self) -> &[RawEvent] {
        &self.cache
    }

    fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn bound_groups(&self) -> &BTreeSet<DropGroup> {
        &self.bound
    }
}

/// Creates channels for the registry.
pub trait ChannelFactory {
    /// Creates the channel called `name`.
    fn create(&self, name: &str) -> Result<Box<dyn DropChannel>, ChannelError>;
}

/// Creates [`Channel`]s on a shared engine.
#[derive(Clone)]
pub struct EngineChannelFactory {
    engine: SharedEngine,
    mode: ChannelMode,
}

impl EngineChannelFactory {
    /// Factory creating channels in `mode`.
    #[must_use]
    pub fn new(engine: SharedEngine, mode: ChannelMode) -> Self {
        Self { engine, mode }
    }
}

impl ChannelFactory for EngineChannelFactory {
    fn create(&self, name: &str) -> Result<Box<dyn DropChannel>, ChannelError> {
        let channel = Channel::create(name, self.engine.clone(), self.mode)?;
        Ok(Box::new(channel))
    }
}

#[cfg(test)]
mod tests;
