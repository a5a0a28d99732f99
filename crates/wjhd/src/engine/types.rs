//! Value types exchanged with the drop-capture engine.

use std::fmt;

use camino::Utf8PathBuf;
use strum::{Display, EnumIter, EnumString};

/// Hardware-defined category of packet-drop causes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DropGroup {
    /// Physical layer: link state changes.
    L1,
    /// Layer 2 switching.
    L2,
    /// Layer 3 routing.
    Router,
    /// Buffer congestion and latency.
    Buffer,
    /// Tunnel encapsulation and decapsulation.
    Tunnel,
    /// Access control lists.
    Acl,
}

impl DropGroup {
    /// Column label used in rendered tables.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::Router => "L3",
            Self::Buffer => "BUFFER",
            Self::Tunnel => "TUNNEL",
            Self::Acl => "ACL",
        }
    }
}

/// Severity attached to a drop reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    /// Informational.
    Notice,
    /// Worth investigating.
    Warning,
    /// Needs attention.
    Error,
}

impl Severity {
    /// Every severity, as enabled on a freshly bound group.
    pub const ALL: [Self; 3] = [Self::Notice, Self::Warning, Self::Error];

    /// Column label used in rendered tables.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Notice => "Notice",
            Self::Warning => "Warn",
            Self::Error => "Error",
        }
    }
}

/// Buffering discipline of an engine channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ChannelMode {
    /// Ring buffer: the oldest record is overwritten when full.
    #[default]
    Cyclic,
    /// Repeated drops with the same group, reason and ingress port are folded
    /// into the first buffered record.
    Aggregate,
    /// Queue: new records are discarded when full.
    Fifo,
}

/// How buffered records leave a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryMode {
    /// Records are delivered only during an explicit pull.
    Pull,
    /// Records are delivered as they arrive.
    Push,
}

/// Representation of the ingress port in raw records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum IngressInfo {
    /// Host interface index, resolvable with `if_indextoname(3)`.
    IfIndex,
    /// ASIC logical port identifier.
    LogicalPort,
}

/// Parameters for [`DropEngine::init`](super::DropEngine::init).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInitParams {
    /// Share of PCI bandwidth the engine may use, in percent.
    pub bandwidth_percent: u32,
    /// Optional engine configuration file.
    pub config_path: Option<Utf8PathBuf>,
    /// Forcibly take the engine over from other clients.
    pub force: bool,
    /// Ingress port representation requested in raw records.
    pub ingress_info: IngressInfo,
}

impl EngineInitParams {
    /// Parameters used by the daemon: forced ownership and interface indexes.
    #[must_use]
    pub fn for_daemon(bandwidth_percent: u32, config_path: Option<Utf8PathBuf>) -> Self {
        Self {
            bandwidth_percent,
            config_path,
            force: true,
            ingress_info: IngressInfo::IfIndex,
        }
    }
}

/// Opaque engine-side channel identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelHandle(u32);

impl ChannelHandle {
    /// Wraps a raw engine identifier.
    #[must_use]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw engine identifier.
    #[must_use]
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ChannelHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}

/// Capture time reported by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    /// Seconds since the Unix epoch.
    pub seconds: i64,
    /// Sub-second part in nanoseconds.
    pub nanoseconds: u32,
}

impl Timestamp {
    /// Timestamp from its two parts.
    #[must_use]
    pub fn new(seconds: i64, nanoseconds: u32) -> Self {
        Self {
            seconds,
            nanoseconds,
        }
    }
}

/// Structured reason for a drop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DropReason {
    /// Engine reason code.
    pub code: u32,
    /// Short reason text.
    pub reason: String,
    /// Recommended action for the operator.
    pub description: String,
    /// Severity of the reason.
    pub severity: Severity,
}

impl DropReason {
    /// Reason from its parts.
    #[must_use]
    pub fn new(
        code: u32,
        reason: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            code,
            reason: reason.into(),
            description: description.into(),
            severity,
        }
    }
}

/// Fields shared by every packet-carrying raw record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketInfo {
    /// Captured frame.
    pub packet: Vec<u8>,
    /// Capture time.
    pub timestamp: Timestamp,
    /// Ingress port as a host interface index.
    pub ingress: u32,
    /// Why the packet was dropped.
    pub reason: DropReason,
}

/// Raw record for physical-layer events. Carries no packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L1RawInfo {
    /// Time of the event.
    pub timestamp: Timestamp,
    /// Port as a host interface index.
    pub ingress: u32,
    /// Reported reason.
    pub reason: DropReason,
    /// Whether the port went down.
    pub port_down: bool,
    /// Reason given for the port going down.
    pub down_reason: Option<String>,
}

/// Raw record for layer 2 drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct L2RawInfo {
    /// Common packet fields.
    pub info: PacketInfo,
}

/// Raw record for router drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterRawInfo {
    /// Common packet fields.
    pub info: PacketInfo,
}

/// Raw record for buffer drops, including egress queue details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferRawInfo {
    /// Common packet fields.
    pub info: PacketInfo,
    /// Egress port as a host interface index.
    pub egress: Option<u32>,
    /// Traffic class of the queue.
    pub traffic_class: Option<u8>,
    /// Queue latency in nanoseconds.
    pub latency_ns: Option<u64>,
}

/// Raw record for tunnel drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelRawInfo {
    /// Common packet fields.
    pub info: PacketInfo,
}

/// Raw record for ACL drops, naming the matching rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclRawInfo {
    /// Common packet fields.
    pub info: PacketInfo,
    /// Name of the ACL.
    pub acl_name: String,
    /// Name of the matching rule.
    pub rule_name: String,
}

/// Result returned to the engine by a group callback.
pub type CallbackResult = Result<(), super::EngineStatus>;

/// Callback registered for one drop group, receiving that group's raw layout.
///
/// The engine invokes the callback once per batch of consecutive records of
/// the group during a pull.
#[derive(Clone, Copy)]
pub enum GroupCallback {
    /// Receives physical-layer events.
    L1(fn(&[L1RawInfo]) -> CallbackResult),
    /// Receives layer 2 drops.
    L2(fn(&[L2RawInfo]) -> CallbackResult),
    /// Receives router drops.
    Router(fn(&[RouterRawInfo]) -> CallbackResult),
    /// Receives buffer drops.
    Buffer(fn(&[BufferRawInfo]) -> CallbackResult),
    /// Receives tunnel drops.
    Tunnel(fn(&[TunnelRawInfo]) -> CallbackResult),
    /// Receives ACL drops.
    Acl(fn(&[AclRawInfo]) -> CallbackResult),
}

impl GroupCallback {
    /// Group whose record layout this callback accepts.
    #[must_use]
    pub fn group(&self) -> DropGroup {
        match self {
            Self::L1(_) => DropGroup::L1,
            Self::L2(_) => DropGroup::L2,
            Self::Router(_) => DropGroup::Router,
            Self::Buffer(_) => DropGroup::Buffer,
            Self::Tunnel(_) => DropGroup::Tunnel,
            Self::Acl(_) => DropGroup::Acl,
        }
    }
}

impl fmt::Debug for GroupCallback {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_tuple("GroupCallback")
            .field(&self.group())
            .finish()
    }
}

/// A drop as captured by the hardware, before delivery to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturedDrop {
    /// Physical-layer event.
    L1(L1RawInfo),
    /// Layer 2 drop.
    L2(L2RawInfo),
    /// Router drop.
    Router(RouterRawInfo),
    /// Buffer drop.
    Buffer(BufferRawInfo),
    /// Tunnel drop.
    Tunnel(TunnelRawInfo),
    /// ACL drop.
    Acl(AclRawInfo),
}

impl CapturedDrop {
    /// Group that detected the drop.
    #[must_use]
    pub fn group(&self) -> DropGroup {
        match self {
            Self::L1(_) => DropGroup::L1,
            Self::L2(_) => DropGroup::L2,
            Self::Router(_) => DropGroup::Router,
            Self::Buffer(_) => DropGroup::Buffer,
            Self::Tunnel(_) => DropGroup::Tunnel,
            Self::Acl(_) => DropGroup::Acl,
        }
    }

    /// Why the packet was dropped.
    #[must_use]
    pub fn reason(&self) -> &DropReason {
        match self {
            Self::L1(raw) => &raw.reason,
            Self::L2(raw) => &raw.info.reason,
            Self::Router(raw) => &raw.info.reason,
            Self::Buffer(raw) => &raw.info.reason,
            Self::Tunnel(raw) => &raw.info.reason,
            Self::Acl(raw) => &raw.info.reason,
        }
    }

    /// Ingress port as a host interface index.
    #[must_use]
    pub fn ingress(&self) -> u32 {
        match self {
            Self::L1(raw) => raw.ingress,
            Self::L2(raw) => raw.info.ingress,
            Self::Router(raw) => raw.info.ingress,
            Self::Buffer(raw) => raw.info.ingress,
            Self::Tunnel(raw) => raw.info.ingress,
            Self::Acl(raw) => raw.info.ingress,
        }
    }
}
