//! Routes engine callbacks to the channel being pulled.
//!
//! The engine calls plain function pointers with no user context, so the
//! destination lives in a thread-local slot. A [`PullScope`] fills the slot for
//! the extent of one pull and empties it when dropped, on every exit path.
//! One callback is instantiated per group; each knows its group and record
//! layout statically through [`RoutableRecord`].

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::engine::{
    AclRawInfo, BufferRawInfo, CallbackResult, DropGroup, GroupCallback, L1RawInfo, L2RawInfo,
    PacketInfo, RouterRawInfo, TunnelRawInfo,
};

use super::event::{RoutedDetail, RoutedDrop};

thread_local! {
    static PULL_CONTEXT: RefCell<Option<PullContext>> = const { RefCell::new(None) };
}

#[derive(Debug)]
struct PullContext {
    channel: String,
    records: Vec<RoutedDrop>,
}

/// Marks one channel as the destination of engine callbacks.
#[derive(Debug)]
pub(crate) struct PullScope {
    // Tied to the thread whose slot it fills.
    _thread: PhantomData<*const ()>,
}

impl PullScope {
    /// Installs `channel` as the pull destination.
    ///
    /// Returns the name of the channel already being pulled if the slot is
    /// occupied.
    pub(crate) fn enter(channel: &str) -> Result<Self, String> {
        PULL_CONTEXT.with(|slot| {
            let mut slot = slot.borrow_mut();
            if let Some(active) = slot.as_ref() {
                return Err(active.channel.clone());
            }
            *slot = Some(PullContext {
                channel: channel.to_owned(),
                records: Vec::new(),
            });
            Ok(Self {
                _thread: PhantomData,
            })
        })
    }

    /// Takes every record routed so far, in delivery order.
    pub(crate) fn take_records(&self) -> Vec<RoutedDrop> {
        PULL_CONTEXT.with(|slot| {
            slot.borrow_mut()
                .as_mut()
                .map(|context| std::mem::take(&mut context.records))
                .unwrap_or_default()
        })
    }
}

impl Drop for PullScope {
    fn drop(&mut self) {
        PULL_CONTEXT.with(|slot| {
            slot.borrow_mut().take();
        });
    }
}

/// Whether a pull is currently routing callbacks on this thread.
#[must_use]
pub fn pull_context_active() -> bool {
    PULL_CONTEXT.with(|slot| slot.borrow().is_some())
}

/// Engine callback for `group`, bound to that group's record layout.
#[must_use]
pub fn callback_for(group: DropGroup) -> GroupCallback {
    match group {
        DropGroup::L1 => GroupCallback::L1(route::<L1RawInfo>),
        DropGroup::L2 => GroupCallback::L2(route::<L2RawInfo>),
        DropGroup::Router => GroupCallback::Router(route::<RouterRawInfo>),
        DropGroup::Buffer => GroupCallback::Buffer(route::<BufferRawInfo>),
        DropGroup::Tunnel => GroupCallback::Tunnel(route::<TunnelRawInfo>),
        DropGroup::Acl => GroupCallback::Acl(route::<AclRawInfo>),
    }
}

/// Records outside a pull have nowhere to go and are dropped.
fn route<T: RoutableRecord>(batch: &[T]) -> CallbackResult {
    PULL_CONTEXT.with(|slot| {
        if let Some(context) = slot.borrow_mut().as_mut() {
            context.records.extend(batch.iter().map(RoutableRecord::route));
        }
    });
    Ok(())
}

/// Raw record layout delivered for exactly one drop group.
pub(crate) trait RoutableRecord {
    const GROUP: DropGroup;

    fn route(&self) -> RoutedDrop;
}

fn routed_packet(group: DropGroup, info: &PacketInfo, detail: RoutedDetail) -> RoutedDrop {
    RoutedDrop {
        group,
        timestamp: info.timestamp,
        ingress: info.ingress,
        reason: info.reason.clone(),
        packet: info.packet.clone(),
        detail,
    }
}

impl RoutableRecord for L1RawInfo {
    const GROUP: DropGroup = DropGroup::L1;

    fn route(&self) -> RoutedDrop {
        RoutedDrop {
            group: Self::GROUP,
            timestamp: self.timestamp,
            ingress: self.ingress,
            reason: self.reason.clone(),
            packet: Vec::new(),
            detail: RoutedDetail::Link {
                port_down: self.port_down,
                down_reason: self.down_reason.clone(),
            },
        }
    }
}

impl RoutableRecord for L2RawInfo {
    const GROUP: DropGroup = DropGroup::L2;

    fn route(&self) -> RoutedDrop {
        routed_packet(Self::GROUP, &self.info, RoutedDetail::None)
    }
}

impl RoutableRecord for RouterRawInfo {
    const GROUP: DropGroup = DropGroup::Router;

    fn route(&self) -> RoutedDrop {
        routed_packet(Self::GROUP, &self.info, RoutedDetail::None)
    }
}

impl RoutableRecord for BufferRawInfo {
    const GROUP: DropGroup = DropGroup::Buffer;

    fn route(&self) -> RoutedDrop {
        routed_packet(
            Self::GROUP,
            &self.info,
            RoutedDetail::Buffer {
                egress: self.egress,
                traffic_class: self.traffic_class,
                latency_ns: self.latency_ns,
            },
        )
    }
}

impl RoutableRecord for TunnelRawInfo {
    const GROUP: DropGroup = DropGroup::Tunnel;

    fn route(&self) -> RoutedDrop {
        routed_packet(Self::GROUP, &self.info, RoutedDetail::None)
    }
}

impl RoutableRecord for AclRawInfo {
    const GROUP: DropGroup = DropGroup::Acl;

    fn route(&self) -> RoutedDrop {
        routed_packet(
            Self::GROUP,
            &self.info,
            RoutedDetail::Acl {
                acl_name: self.acl_name.clone(),
                rule_name: self.rule_name.clone(),
            },
        )
    }
}
