//! Canned drop events.

use crate::channel::{EventDetail, PortRef, RawEvent};
use crate::engine::{DropGroup, DropReason, Severity, Timestamp};
use crate::render::packet::{IPPROTO_UDP, frames};

/// A routed UDP drop on `Ethernet0`.
#[must_use]
pub fn forwarding_event(reason: &str) -> RawEvent {
    RawEvent::new(
        DropGroup::Router,
        Timestamp::new(1_700_000_000, 250_000_000),
        PortRef {
            if_index: 1,
            name: Some("Ethernet0".to_owned()),
        },
        DropReason::new(7, reason, "Verify the route table", Severity::Error),
        udp_frame([10, 0, 0, 1], [10, 0, 0, 2], 4000, 53),
    )
}

/// An ACL drop on an interface whose name did not resolve.
#[must_use]
pub fn acl_event() -> RawEvent {
    RawEvent::new(
        DropGroup::Acl,
        Timestamp::new(1_700_000_001, 0),
        PortRef {
            if_index: 12,
            name: None,
        },
        DropReason::new(
            200,
            "ACL drop",
            "Validate ACL configuration",
            Severity::Notice,
        ),
        udp_frame([192, 168, 1, 1], [192, 168, 1, 2], 1234, 80),
    )
    .with_detail(EventDetail::Acl {
        acl_name: "INGRESS".to_owned(),
        rule_name: "DENY_ALL".to_owned(),
    })
}

fn udp_frame(src: [u8; 4], dst: [u8; 4], source_port: u16, destination_port: u16) -> Vec<u8> {
    let datagram = frames::ipv4(
        IPPROTO_UDP,
        src,
        dst,
        &frames::ports(source_port, destination_port),
    );
    frames::ethernet(&[], 0x0800, &datagram)
}
