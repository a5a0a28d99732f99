//! Mocked drop-capture engine for failure-path tests.

use mockall::mock;

use crate::engine::{
    ChannelHandle, ChannelMode, DeliveryMode, DropEngine, DropGroup, EngineError,
    EngineInitParams, GroupCallback, Severity,
};

mock! {
    pub Engine {}
    impl DropEngine for Engine {
        fn init(&mut self, params: &EngineInitParams) -> Result<(), EngineError>;
        fn deinit(&mut self) -> Result<(), EngineError>;
        fn create_channel(&mut self, mode: ChannelMode) -> Result<ChannelHandle, EngineError>;
        fn set_delivery(
            &mut self,
            channel: ChannelHandle,
            delivery: DeliveryMode,
        ) -> Result<(), EngineError>;
        fn destroy_channel(&mut self, channel: ChannelHandle) -> Result<(), EngineError>;
        fn init_group(
            &mut self,
            group: DropGroup,
            callback: GroupCallback,
        ) -> Result<(), EngineError>;
        fn bind_group(
            &mut self,
            group: DropGroup,
            channel: ChannelHandle,
        ) -> Result<(), EngineError>;
        fn enable_group(
            &mut self,
            group: DropGroup,
            severities: &[Severity],
        ) -> Result<(), EngineError>;
        fn disable_group(
            &mut self,
            group: DropGroup,
            severities: &[Severity],
        ) -> Result<(), EngineError>;
        fn unbind_group(&mut self, group: DropGroup) -> Result<(), EngineError>;
        fn deinit_group(&mut self, group: DropGroup) -> Result<(), EngineError>;
        fn pull(&mut self, channel: ChannelHandle) -> Result<(), EngineError>;
    }
}
