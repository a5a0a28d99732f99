//! Drop events as cached on a channel and shown to clients.

use crate::engine::{DropGroup, DropReason, Timestamp};
use crate::resolve::InterfaceNames;

/// Host interface reference carried by an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRef {
    /// Host interface index.
    pub if_index: u32,
    /// Interface name at the time of the pull, when the index resolved.
    pub name: Option<String>,
}

impl PortRef {
    fn resolve(if_index: u32, interfaces: &dyn InterfaceNames) -> Self {
        Self {
            if_index,
            name: interfaces.resolve(if_index),
        }
    }
}

/// Group-specific facts beyond the common event fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDetail {
    /// No group-specific detail.
    None,
    /// Physical-layer state of the ingress port.
    Link {
        /// Whether the port went down.
        port_down: bool,
        /// Reason given for the port going down.
        down_reason: Option<String>,
    },
    /// Egress queue details of a buffer drop.
    Buffer {
        /// Egress port, when reported.
        egress: Option<PortRef>,
        /// Traffic class of the queue.
        traffic_class: Option<u8>,
        /// Queue latency in nanoseconds.
        latency_ns: Option<u64>,
    },
    /// ACL rule that dropped the packet.
    Acl {
        /// Name of the ACL.
        acl_name: String,
        /// Name of the matching rule.
        rule_name: String,
    },
}

/// One captured drop, as cached on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    packet: Vec<u8>,
    timestamp: Timestamp,
    ingress: PortRef,
    group: DropGroup,
    reason: DropReason,
    detail: EventDetail,
}

impl RawEvent {
    /// Event without group-specific detail.
    #[must_use]
    pub fn new(
        group: DropGroup,
        timestamp: Timestamp,
        ingress: PortRef,
        reason: DropReason,
        packet: Vec<u8>,
    ) -> Self {
        Self {
            packet,
            timestamp,
            ingress,
            group,
            reason,
            detail: EventDetail::None,
        }
    }

    /// Attaches group-specific detail.
    #[must_use]
    pub fn with_detail(mut self, detail: EventDetail) -> Self {
        self.detail = detail;
        self
    }

    /// Captured frame; empty for link events.
    #[must_use]
    pub fn packet(&self) -> &[u8] {
        &self.packet
    }

    /// Capture time reported by the engine.
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Port the packet arrived on.
    #[must_use]
    pub fn ingress(&self) -> &PortRef {
        &self.ingress
    }

    /// Group under which the delivering callback was registered.
    #[must_use]
    pub fn group(&self) -> DropGroup {
        self.group
    }

    /// Why the packet was dropped.
    #[must_use]
    pub fn reason(&self) -> &DropReason {
        &self.reason
    }

    /// Group-specific detail.
    #[must_use]
    pub fn detail(&self) -> &EventDetail {
        &self.detail
    }
}

/// Event as collected by the callback router, before port names resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RoutedDrop {
    pub(crate) group: DropGroup,
    pub(crate) timestamp: Timestamp,
    pub(crate) ingress: u32,
    pub(crate) reason: DropReason,
    pub(crate) packet: Vec<u8>,
    pub(crate) detail: RoutedDetail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RoutedDetail {
    None,
    Link {
        port_down: bool,
        down_reason: Option<String>,
    },
    Buffer {
        egress: Option<u32>,
        traffic_class: Option<u8>,
        latency_ns: Option<u64>,
    },
    Acl {
        acl_name: String,
        rule_name: String,
    },
}

impl RoutedDrop {
    pub(crate) fn into_event(self, interfaces: &dyn InterfaceNames) -> RawEvent {
        let detail = match self.detail {
            RoutedDetail::None => EventDetail::None,
            RoutedDetail::Link {
                port_down,
                down_reason,
            } => EventDetail::Link {
                port_down,
                down_reason,
            },
            RoutedDetail::Buffer {
                egress,
                traffic_class,
                latency_ns,
            } => EventDetail::Buffer {
                egress: egress.map(|index| PortRef::resolve(index, interfaces)),
                traffic_class,
                latency_ns,
            },
            RoutedDetail::Acl {
                acl_name,
                rule_name,
            } => EventDetail::Acl {
                acl_name,
                rule_name,
            },
        };
        RawEvent::new(
            self.group,
            self.timestamp,
            PortRef::resolve(self.ingress, interfaces),
            self.reason,
            self.packet,
        )
        .with_detail(detail)
    }
}
