//! Boundary to the drop-capture engine.
//!
//! The engine owns the hardware side of drop capture: channels that buffer
//! drop records and per-group detection that feeds them. Its surface is a
//! small synchronous library API; [`DropEngine`] mirrors it so the daemon can
//! run against [`SoftwareEngine`] or a hardware binding interchangeably.
//!
//! A group goes through `init_group` (registering its callback), `bind_group`
//! (attaching it to one channel), and `enable_group` (choosing severities).
//! Teardown runs the same steps in reverse. `pull` synchronously invokes the
//! registered callbacks with every record buffered on a channel.

use std::cell::RefCell;
use std::rc::Rc;

use strum::Display;
use thiserror::Error;

mod software;
mod types;

pub use software::{CaptureOutcome, DEFAULT_CHANNEL_CAPACITY, SoftwareEngine};
pub use types::{
    AclRawInfo, BufferRawInfo, CallbackResult, CapturedDrop, ChannelHandle, ChannelMode,
    DeliveryMode, DropGroup, DropReason, EngineInitParams, GroupCallback, IngressInfo,
    L1RawInfo, L2RawInfo, PacketInfo, RouterRawInfo, Severity, Timestamp, TunnelRawInfo,
};

pub(crate) const ENGINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::engine");

/// Engine shared between the channels of one daemon.
///
/// The reactor is single-threaded, so shared ownership needs no locking.
pub type SharedEngine = Rc<RefCell<dyn DropEngine>>;

/// Synchronous drop-capture engine surface.
pub trait DropEngine {
    /// Initialises the engine. Must precede every other call.
    fn init(&mut self, params: &EngineInitParams) -> Result<(), EngineError>;

    /// Releases the engine.
    fn deinit(&mut self) -> Result<(), EngineError>;

    /// Allocates a channel with the given buffering mode.
    fn create_channel(&mut self, mode: ChannelMode) -> Result<ChannelHandle, EngineError>;

    /// Selects how buffered records leave the channel.
    fn set_delivery(
        &mut self,
        channel: ChannelHandle,
        delivery: DeliveryMode,
    ) -> Result<(), EngineError>;

    /// Releases a channel. Fails while groups are still bound to it.
    fn destroy_channel(&mut self, channel: ChannelHandle) -> Result<(), EngineError>;

    /// Starts detection for a group and registers its callback.
    fn init_group(&mut self, group: DropGroup, callback: GroupCallback)
    -> Result<(), EngineError>;

    /// Attaches a group to a channel. A group has at most one channel.
    fn bind_group(&mut self, group: DropGroup, channel: ChannelHandle) -> Result<(), EngineError>;

    /// Enables reporting of the given severities for a bound group.
    fn enable_group(&mut self, group: DropGroup, severities: &[Severity])
    -> Result<(), EngineError>;

    /// Disables reporting of the given severities.
    fn disable_group(
        &mut self,
        group: DropGroup,
        severities: &[Severity],
    ) -> Result<(), EngineError>;

    /// Detaches a disabled group from its channel.
    fn unbind_group(&mut self, group: DropGroup) -> Result<(), EngineError>;

    /// Stops detection for an unbound group.
    fn deinit_group(&mut self, group: DropGroup) -> Result<(), EngineError>;

    /// Delivers every record buffered on the channel through the registered
    /// callbacks before returning.
    fn pull(&mut self, channel: ChannelHandle) -> Result<(), EngineError>;
}

/// Engine entry point that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EngineOperation {
    /// `init`.
    Init,
    /// `deinit`.
    Deinit,
    /// `create_channel`.
    CreateChannel,
    /// `set_delivery`.
    SetDelivery,
    /// `destroy_channel`.
    DestroyChannel,
    /// `init_group`.
    InitGroup,
    /// `bind_group`.
    BindGroup,
    /// `enable_group`.
    EnableGroup,
    /// `disable_group`.
    DisableGroup,
    /// `unbind_group`.
    UnbindGroup,
    /// `deinit_group`.
    DeinitGroup,
    /// `pull`.
    Pull,
}

/// Status codes reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EngineStatus {
    /// Unspecified failure.
    Error,
    /// The group is already bound to a channel.
    AlreadyBound,
    /// The engine or group has not been initialised.
    NotInitialized,
    /// The channel handle is unknown.
    NoSuchChannel,
    /// An argument was rejected.
    InvalidParameter,
    /// The operation is not supported.
    Unsupported,
    /// The engine is already initialised.
    AlreadyInitialized,
}

/// An engine call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("engine {operation} failed: {status}")]
pub struct EngineError {
    /// Entry point that failed.
    pub operation: EngineOperation,
    /// Status the engine reported.
    pub status: EngineStatus,
}

impl EngineError {
    /// Failure of `operation` with `status`.
    #[must_use]
    pub fn new(operation: EngineOperation, status: EngineStatus) -> Self {
        Self { operation, status }
    }
}
