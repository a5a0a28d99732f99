use std::cell::RefCell;
use std::rc::Rc;

use rstest::{fixture, rstest};

use super::*;
use crate::engine::{
    CapturedDrop, DropEngine, DropReason, EngineInitParams, EngineOperation, EngineStatus,
    GroupCallback, L2RawInfo, PacketInfo, RouterRawInfo, SoftwareEngine, Timestamp,
};
use crate::resolve::StaticInterfaceNames;
use crate::tests::support::MockEngine;

struct Harness {
    engine: Rc<RefCell<SoftwareEngine>>,
    channel: Channel,
    interfaces: StaticInterfaceNames,
}

impl Harness {
    fn capture(&self, record: CapturedDrop) {
        self.engine.borrow_mut().capture(record);
    }
}

#[fixture]
fn harness() -> Harness {
    let engine = Rc::new(RefCell::new(SoftwareEngine::new()));
    engine
        .borrow_mut()
        .init(&EngineInitParams::for_daemon(50, None))
        .expect("engine init");
    let shared: SharedEngine = engine.clone();
    let channel = Channel::create("forwarding", shared, ChannelMode::Cyclic).expect("create");
    Harness {
        engine,
        channel,
        interfaces: StaticInterfaceNames::new([(7, "Ethernet28".to_owned())]),
    }
}

fn info(code: u32) -> PacketInfo {
    PacketInfo {
        packet: vec![0xff; 14],
        timestamp: Timestamp::new(1_700_000_000, 250_000_000),
        ingress: 7,
        reason: DropReason::new(code, "reason", "action", Severity::Error),
    }
}

fn l2(code: u32) -> CapturedDrop {
    CapturedDrop::L2(L2RawInfo { info: info(code) })
}

fn router(code: u32) -> CapturedDrop {
    CapturedDrop::Router(RouterRawInfo { info: info(code) })
}

fn groups_of(channel: &Channel) -> Vec<DropGroup> {
    channel.cache().iter().map(RawEvent::group).collect()
}

#[rstest]
fn creation_configures_pull_delivery(harness: Harness) {
    assert_eq!(harness.engine.borrow().channel_count(), 1);
    assert!(harness.channel.bound_groups().is_empty());
    assert!(harness.channel.cache().is_empty());
}

#[rstest]
fn binding_is_idempotent(mut harness: Harness) {
    harness.channel.bind_group(DropGroup::L2).expect("bind");
    harness.channel.bind_group(DropGroup::L2).expect("rebind");
    assert_eq!(
        harness.channel.bound_groups().iter().copied().collect::<Vec<_>>(),
        vec![DropGroup::L2]
    );
    assert_eq!(
        harness.engine.borrow().bound_channel(DropGroup::L2),
        Some(harness.channel.handle())
    );
    assert_eq!(
        harness.engine.borrow().enabled_severities(DropGroup::L2).len(),
        Severity::ALL.len()
    );
}

#[rstest]
fn bound_groups_track_bind_and_unbind_sequences(mut harness: Harness) {
    let steps = [
        (true, DropGroup::L2),
        (true, DropGroup::Router),
        (false, DropGroup::L2),
        (false, DropGroup::Acl),
        (true, DropGroup::Tunnel),
        (true, DropGroup::Router),
        (false, DropGroup::Router),
    ];
    let mut expected = BTreeSet::new();
    for (bind, group) in steps {
        if bind {
            harness.channel.bind_group(group).expect("bind");
            expected.insert(group);
        } else {
            harness.channel.unbind_group(group).expect("unbind");
            expected.remove(&group);
        }
        assert_eq!(harness.channel.bound_groups(), &expected);
    }
    assert_eq!(harness.engine.borrow().bound_channel(DropGroup::Router), None);
    assert!(harness.engine.borrow().enabled_severities(DropGroup::L2).is_empty());
}

#[rstest]
fn a_group_belongs_to_one_channel(mut harness: Harness) {
    harness.channel.bind_group(DropGroup::Acl).expect("bind");
    let shared: SharedEngine = harness.engine.clone();
    let mut other = Channel::create("acl", shared, ChannelMode::Cyclic).expect("create");

    let error = other.bind_group(DropGroup::Acl).expect_err("already owned");
    assert!(matches!(
        error,
        ChannelError::Group {
            step: GroupStep::Initialise,
            group: DropGroup::Acl,
            ..
        }
    ));
    assert!(other.bound_groups().is_empty());
}

#[rstest]
fn pull_tags_events_with_their_group(mut harness: Harness) {
    for group in [DropGroup::L2, DropGroup::Router, DropGroup::Tunnel] {
        harness.channel.bind_group(group).expect("bind");
    }
    harness.capture(l2(1));
    harness.capture(l2(2));
    harness.capture(router(3));

    assert!(!pull_context_active());
    harness.channel.pull(&harness.interfaces).expect("pull");
    assert!(!pull_context_active());

    assert_eq!(
        groups_of(&harness.channel),
        vec![DropGroup::L2, DropGroup::L2, DropGroup::Router]
    );
    let codes: Vec<u32> = harness
        .channel
        .cache()
        .iter()
        .map(|event| event.reason().code)
        .collect();
    assert_eq!(codes, vec![1, 2, 3]);
    let ingress = harness.channel.cache()[0].ingress();
    assert_eq!(ingress.if_index, 7);
    assert_eq!(ingress.name.as_deref(), Some("Ethernet28"));
}

#[rstest]
fn cache_grows_across_pulls_until_cleared(mut harness: Harness) {
    harness.channel.bind_group(DropGroup::L2).expect("bind");
    harness.capture(l2(1));
    harness.channel.pull(&harness.interfaces).expect("first pull");
    harness.capture(l2(2));
    harness.channel.pull(&harness.interfaces).expect("second pull");
    assert_eq!(harness.channel.cache().len(), 2);

    harness.channel.clear_cache();
    assert!(harness.channel.cache().is_empty());
}

#[rstest]
fn pulling_an_empty_channel_twice_yields_nothing(mut harness: Harness) {
    harness.channel.bind_group(DropGroup::L2).expect("bind");
    for _ in 0..2 {
        harness.channel.pull(&harness.interfaces).expect("pull");
        assert!(harness.channel.cache().is_empty());
    }
}

#[rstest]
fn destroy_unbinds_everything_and_releases_the_handle(mut harness: Harness) {
    harness.channel.bind_group(DropGroup::L2).expect("bind");
    harness.channel.bind_group(DropGroup::Router).expect("bind");

    harness.channel.destroy().expect("destroy");

    assert!(harness.channel.bound_groups().is_empty());
    assert_eq!(harness.engine.borrow().channel_count(), 0);
    assert_eq!(harness.engine.borrow().bound_channel(DropGroup::L2), None);
}

fn mock_channel(engine: MockEngine) -> Channel {
    let shared: SharedEngine = Rc::new(RefCell::new(engine));
    Channel::create("forwarding", shared, ChannelMode::Cyclic).expect("create")
}

fn creatable() -> MockEngine {
    let mut engine = MockEngine::new();
    engine
        .expect_create_channel()
        .returning(|_| Ok(ChannelHandle::from_raw(1)));
    engine.expect_set_delivery().returning(|_, _| Ok(()));
    engine
}

#[test]
fn pull_context_is_cleared_when_the_engine_fails_mid_pull() {
    let mut engine = creatable();
    engine.expect_pull().times(1).returning(|_| {
        if let GroupCallback::L2(deliver) = callback_for(DropGroup::L2) {
            deliver(&[L2RawInfo { info: info(9) }]).expect("routed");
        }
        assert!(pull_context_active());
        Err(EngineError::new(EngineOperation::Pull, EngineStatus::Error))
    });
    let mut channel = mock_channel(engine);
    let interfaces = StaticInterfaceNames::default();

    assert!(!pull_context_active());
    let error = channel.pull(&interfaces).expect_err("engine failure");
    assert!(!pull_context_active());

    assert!(matches!(error, ChannelError::Pull { .. }));
    assert_eq!(groups_of(&channel), vec![DropGroup::L2]);
}

#[test]
fn creation_fails_when_pull_delivery_is_refused() {
    let mut engine = MockEngine::new();
    engine
        .expect_create_channel()
        .returning(|_| Ok(ChannelHandle::from_raw(1)));
    engine.expect_set_delivery().returning(|_, _| {
        Err(EngineError::new(
            EngineOperation::SetDelivery,
            EngineStatus::Unsupported,
        ))
    });
    let shared: SharedEngine = Rc::new(RefCell::new(engine));

    let error = Channel::create("forwarding", shared, ChannelMode::Cyclic).expect_err("refused");
    assert!(matches!(error, ChannelError::Create { .. }));
}

#[test]
fn failed_bind_leaves_the_group_unbound() {
    let mut engine = creatable();
    engine.expect_init_group().returning(|_, _| Ok(()));
    engine.expect_bind_group().returning(|_, _| Ok(()));
    engine.expect_enable_group().returning(|_, _| {
        Err(EngineError::new(
            EngineOperation::EnableGroup,
            EngineStatus::Error,
        ))
    });
    let mut channel = mock_channel(engine);

    let error = channel.bind_group(DropGroup::Buffer).expect_err("enable fails");
    assert!(matches!(
        error,
        ChannelError::Group {
            step: GroupStep::Enable,
            ..
        }
    ));
    assert!(channel.bound_groups().is_empty());
}

#[test]
fn destroy_attempts_every_step_after_a_failure() {
    let mut engine = creatable();
    engine.expect_init_group().returning(|_, _| Ok(()));
    engine.expect_bind_group().returning(|_, _| Ok(()));
    engine.expect_enable_group().returning(|_, _| Ok(()));
    engine.expect_disable_group().times(2).returning(|_, _| Ok(()));
    engine
        .expect_unbind_group()
        .withf(|group| *group == DropGroup::L2)
        .times(1)
        .returning(|_| {
            Err(EngineError::new(
                EngineOperation::UnbindGroup,
                EngineStatus::Error,
            ))
        });
    engine
        .expect_unbind_group()
        .withf(|group| *group == DropGroup::Router)
        .times(1)
        .returning(|_| Ok(()));
    engine.expect_deinit_group().times(1).returning(|_| Ok(()));
    engine.expect_destroy_channel().times(1).returning(|_| Ok(()));
    let mut channel = mock_channel(engine);
    channel.bind_group(DropGroup::L2).expect("bind");
    channel.bind_group(DropGroup::Router).expect("bind");

    let error = channel.destroy().expect_err("one unbind fails");

    assert!(matches!(error, ChannelError::Destroy { failures: 1, .. }));
    assert_eq!(
        channel.bound_groups().iter().copied().collect::<Vec<_>>(),
        vec![DropGroup::L2]
    );
}

#[test]
fn a_pull_inside_a_pull_is_refused() {
    let mut engine = creatable();
    engine.expect_pull().returning(|_| Ok(()));
    let mut channel = mock_channel(engine);
    let _outer = PullScope::enter("acl").expect("slot free");

    let error = channel
        .pull(&StaticInterfaceNames::default())
        .expect_err("nested pull");
    assert!(matches!(
        error,
        ChannelError::PullInProgress { ref active, .. } if active == "acl"
    ));
}
