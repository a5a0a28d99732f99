//! In-process implementation of the drop-capture engine.
//!
//! Channels are bounded buffers; captured records are routed to the channel
//! their group is bound to and held there until pulled. Delivery preserves
//! arrival order, batching consecutive records of the same group into one
//! callback invocation.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{debug, info};

use super::types::{
    CallbackResult, CapturedDrop, ChannelHandle, ChannelMode, DeliveryMode, DropGroup,
    EngineInitParams, GroupCallback, Severity,
};
use super::{DropEngine, ENGINE_TARGET, EngineError, EngineOperation, EngineStatus};

/// Records held per channel unless configured otherwise.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// What happened to a record passed to [`SoftwareEngine::capture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Appended to the bound channel.
    Buffered,
    /// Appended after evicting the oldest record of a full cyclic channel.
    Overwrote,
    /// Folded into an equivalent record on an aggregating channel.
    Aggregated,
    /// The channel was full and does not evict.
    Discarded,
    /// The group is not bound, or the record's severity is not enabled.
    Filtered,
}

#[derive(Debug)]
struct ChannelBuffer {
    mode: ChannelMode,
    delivery: Option<DeliveryMode>,
    records: VecDeque<CapturedDrop>,
}

#[derive(Debug)]
struct GroupState {
    callback: GroupCallback,
    channel: Option<ChannelHandle>,
    enabled: BTreeSet<Severity>,
}

/// Drop-capture engine that keeps all state in process memory.
#[derive(Debug)]
pub struct SoftwareEngine {
    params: Option<EngineInitParams>,
    capacity: usize,
    next_handle: u32,
    channels: BTreeMap<ChannelHandle, ChannelBuffer>,
    groups: BTreeMap<DropGroup, GroupState>,
}

impl Default for SoftwareEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareEngine {
    /// Engine whose channels hold up to [`DEFAULT_CHANNEL_CAPACITY`] records.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Builds an engine whose channels hold at most `capacity` records.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            params: None,
            capacity: capacity.max(1),
            next_handle: 1,
            channels: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }

    /// Injects a hardware capture, routing it to the channel its group is
    /// bound to.
    pub fn capture(&mut self, record: CapturedDrop) -> CaptureOutcome {
        if self.params.is_none() {
            return CaptureOutcome::Filtered;
        }
        let group = record.group();
        let Some(state) = self.groups.get(&group) else {
            return CaptureOutcome::Filtered;
        };
        let Some(handle) = state.channel else {
            return CaptureOutcome::Filtered;
        };
        if !state.enabled.contains(&record.reason().severity) {
            return CaptureOutcome::Filtered;
        }
        let Some(buffer) = self.channels.get_mut(&handle) else {
            return CaptureOutcome::Filtered;
        };
        let full = buffer.records.len() >= self.capacity;
        match buffer.mode {
            ChannelMode::Aggregate => {
                let duplicate = buffer.records.iter().any(|held| {
                    held.group() == group
                        && held.reason().code == record.reason().code
                        && held.ingress() == record.ingress()
                });
                if duplicate {
                    CaptureOutcome::Aggregated
                } else if full {
                    CaptureOutcome::Discarded
                } else {
                    buffer.records.push_back(record);
                    CaptureOutcome::Buffered
                }
            }
            ChannelMode::Cyclic if full => {
                buffer.records.pop_front();
                buffer.records.push_back(record);
                CaptureOutcome::Overwrote
            }
            ChannelMode::Fifo if full => CaptureOutcome::Discarded,
            ChannelMode::Cyclic | ChannelMode::Fifo => {
                buffer.records.push_back(record);
                CaptureOutcome::Buffered
            }
        }
    }

    /// Whether `init` has succeeded without a later `deinit`.
    #[must_use]
    pub fn is_initialised(&self) -> bool {
        self.params.is_some()
    }

    /// Parameters of the current initialisation.
    #[must_use]
    pub fn params(&self) -> Option<&EngineInitParams> {
        self.params.as_ref()
    }

    /// Number of live channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of records waiting on a channel.
    #[must_use]
    pub fn buffered(&self, channel: ChannelHandle) -> usize {
        self.channels
            .get(&channel)
            .map_or(0, |buffer| buffer.records.len())
    }

    /// Channel a group is bound to.
    #[must_use]
    pub fn bound_channel(&self, group: DropGroup) -> Option<ChannelHandle> {
        self.groups.get(&group).and_then(|state| state.channel)
    }

    /// Severities currently enabled for a group.
    #[must_use]
    pub fn enabled_severities(&self, group: DropGroup) -> BTreeSet<Severity> {
        self.groups
            .get(&group)
            .map(|state| state.enabled.clone())
            .unwrap_or_default()
    }

    fn ensure_initialised(&self, operation: EngineOperation) -> Result<(), EngineError> {
        if self.params.is_some() {
            Ok(())
        } else {
            Err(EngineError::new(operation, EngineStatus::NotInitialized))
        }
    }

    fn group_mut(
        &mut self,
        group: DropGroup,
        operation: EngineOperation,
    ) -> Result<&mut GroupState, EngineError> {
        self.ensure_initialised(operation)?;
        self.groups
            .get_mut(&group)
            .ok_or(EngineError::new(operation, EngineStatus::NotInitialized))
    }

    fn reset(&mut self) {
        self.channels.clear();
        self.groups.clear();
        self.next_handle = 1;
    }
}

impl DropEngine for SoftwareEngine {
    fn init(&mut self, params: &EngineInitParams) -> Result<(), EngineError> {
        let operation = EngineOperation::Init;
        if !(1..=100).contains(&params.bandwidth_percent) {
            return Err(EngineError::new(operation, EngineStatus::InvalidParameter));
        }
        if self.params.is_some() {
            if !params.force {
                return Err(EngineError::new(
                    operation,
                    EngineStatus::AlreadyInitialized,
                ));
            }
            info!(
                target: ENGINE_TARGET,
                "forcing engine re-initialisation; existing channels are discarded"
            );
            self.reset();
        }
        info!(
            target: ENGINE_TARGET,
            bandwidth_percent = params.bandwidth_percent,
            config_path = ?params.config_path,
            ingress_info = %params.ingress_info,
            "engine initialised"
        );
        self.params = Some(params.clone());
        Ok(())
    }

    fn deinit(&mut self) -> Result<(), EngineError> {
        self.ensure_initialised(EngineOperation::Deinit)?;
        self.reset();
        self.params = None;
        info!(target: ENGINE_TARGET, "engine released");
        Ok(())
    }

    fn create_channel(&mut self, mode: ChannelMode) -> Result<ChannelHandle, EngineError> {
        self.ensure_initialised(EngineOperation::CreateChannel)?;
        let handle = ChannelHandle::from_raw(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        self.channels.insert(
            handle,
            ChannelBuffer {
                mode,
                delivery: None,
                records: VecDeque::new(),
            },
        );
        debug!(target: ENGINE_TARGET, %handle, %mode, "channel created");
        Ok(handle)
    }

    fn set_delivery(
        &mut self,
        channel: ChannelHandle,
        delivery: DeliveryMode,
    ) -> Result<(), EngineError> {
        let operation = EngineOperation::SetDelivery;
        self.ensure_initialised(operation)?;
        let buffer = self
            .channels
            .get_mut(&channel)
            .ok_or(EngineError::new(operation, EngineStatus::NoSuchChannel))?;
        if delivery == DeliveryMode::Push {
            return Err(EngineError::new(operation, EngineStatus::Unsupported));
        }
        buffer.delivery = Some(delivery);
        Ok(())
    }

    fn destroy_channel(&mut self, channel: ChannelHandle) -> Result<(), EngineError> {
        let operation = EngineOperation::DestroyChannel;
        self.ensure_initialised(operation)?;
        if !self.channels.contains_key(&channel) {
            return Err(EngineError::new(operation, EngineStatus::NoSuchChannel));
        }
        if self
            .groups
            .values()
            .any(|state| state.channel == Some(channel))
        {
            return Err(EngineError::new(operation, EngineStatus::AlreadyBound));
        }
        self.channels.remove(&channel);
        debug!(target: ENGINE_TARGET, handle = %channel, "channel destroyed");
        Ok(())
    }

    fn init_group(
        &mut self,
        group: DropGroup,
        callback: GroupCallback,
    ) -> Result<(), EngineError> {
        let operation = EngineOperation::InitGroup;
        self.ensure_initialised(operation)?;
        if callback.group() != group {
            return Err(EngineError::new(operation, EngineStatus::InvalidParameter));
        }
        if self.groups.contains_key(&group) {
            return Err(EngineError::new(
                operation,
                EngineStatus::AlreadyInitialized,
            ));
        }
        self.groups.insert(
            group,
            GroupState {
                callback,
                channel: None,
                enabled: BTreeSet::new(),
            },
        );
        Ok(())
    }

    fn bind_group(&mut self, group: DropGroup, channel: ChannelHandle) -> Result<(), EngineError> {
        let operation = EngineOperation::BindGroup;
        self.ensure_initialised(operation)?;
        if !self.channels.contains_key(&channel) {
            return Err(EngineError::new(operation, EngineStatus::NoSuchChannel));
        }
        let state = self.group_mut(group, operation)?;
        if state.channel.is_some() {
            return Err(EngineError::new(operation, EngineStatus::AlreadyBound));
        }
        state.channel = Some(channel);
        Ok(())
    }

    fn enable_group(
        &mut self,
        group: DropGroup,
        severities: &[Severity],
    ) -> Result<(), EngineError> {
        let operation = EngineOperation::EnableGroup;
        let state = self.group_mut(group, operation)?;
        if state.channel.is_none() || severities.is_empty() {
            return Err(EngineError::new(operation, EngineStatus::InvalidParameter));
        }
        state.enabled.extend(severities.iter().copied());
        Ok(())
    }

    fn disable_group(
        &mut self,
        group: DropGroup,
        severities: &[Severity],
    ) -> Result<(), EngineError> {
        let state = self.group_mut(group, EngineOperation::DisableGroup)?;
        for severity in severities {
            state.enabled.remove(severity);
        }
        Ok(())
    }

    fn unbind_group(&mut self, group: DropGroup) -> Result<(), EngineError> {
        let operation = EngineOperation::UnbindGroup;
        let state = self.group_mut(group, operation)?;
        if state.channel.is_none() || !state.enabled.is_empty() {
            return Err(EngineError::new(operation, EngineStatus::InvalidParameter));
        }
        state.channel = None;
        Ok(())
    }

    fn deinit_group(&mut self, group: DropGroup) -> Result<(), EngineError> {
        let operation = EngineOperation::DeinitGroup;
        let state = self.group_mut(group, operation)?;
        if state.channel.is_some() {
            return Err(EngineError::new(operation, EngineStatus::AlreadyBound));
        }
        self.groups.remove(&group);
        Ok(())
    }

    fn pull(&mut self, channel: ChannelHandle) -> Result<(), EngineError> {
        let operation = EngineOperation::Pull;
        self.ensure_initialised(operation)?;
        let buffer = self
            .channels
            .get_mut(&channel)
            .ok_or(EngineError::new(operation, EngineStatus::NoSuchChannel))?;
        if buffer.delivery != Some(DeliveryMode::Pull) {
            return Err(EngineError::new(operation, EngineStatus::InvalidParameter));
        }

        let mut pending = std::mem::take(&mut buffer.records);
        while let Some((group, batch)) = take_batch(&mut pending) {
            let Some(state) = self.groups.get(&group) else {
                continue;
            };
            if let Err(status) = deliver(state.callback, &batch) {
                // Undelivered records stay buffered for the next pull.
                if let Some(buffer) = self.channels.get_mut(&channel) {
                    buffer.records = batch.into_iter().chain(pending).collect();
                }
                return Err(EngineError::new(operation, status));
            }
        }
        Ok(())
    }
}

fn take_batch(pending: &mut VecDeque<CapturedDrop>) -> Option<(DropGroup, Vec<CapturedDrop>)> {
    let group = pending.front()?.group();
    let mut batch = Vec::new();
    while pending.front().is_some_and(|record| record.group() == group) {
        if let Some(record) = pending.pop_front() {
            batch.push(record);
        }
    }
    Some((group, batch))
}

fn deliver(callback: GroupCallback, batch: &[CapturedDrop]) -> CallbackResult {
    match callback {
        GroupCallback::L1(function) => function(&typed(batch, |record| match record {
            CapturedDrop::L1(raw) => Some(raw),
            _ => None,
        })),
        GroupCallback::L2(function) => function(&typed(batch, |record| match record {
            CapturedDrop::L2(raw) => Some(raw),
            _ => None,
        })),
        GroupCallback::Router(function) => function(&typed(batch, |record| match record {
            CapturedDrop::Router(raw) => Some(raw),
            _ => None,
        })),
        GroupCallback::Buffer(function) => function(&typed(batch, |record| match record {
            CapturedDrop::Buffer(raw) => Some(raw),
            _ => None,
        })),
        GroupCallback::Tunnel(function) => function(&typed(batch, |record| match record {
            CapturedDrop::Tunnel(raw) => Some(raw),
            _ => None,
        })),
        GroupCallback::Acl(function) => function(&typed(batch, |record| match record {
            CapturedDrop::Acl(raw) => Some(raw),
            _ => None,
        })),
    }
}

fn typed<T: Clone>(batch: &[CapturedDrop], pick: fn(&CapturedDrop) -> Option<&T>) -> Vec<T> {
    batch.iter().filter_map(pick).cloned().collect()
}
