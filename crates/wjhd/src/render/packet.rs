//! Minimal header decoding for captured frames.
//!
//! Only the fields shown in the drop table are extracted. Decoding stops at
//! the first header that is truncated or not understood, keeping whatever was
//! read up to that point.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const ETHERNET_HEADER: usize = 14;
const VLAN_TAG: usize = 4;
const IPV4_MIN_HEADER: usize = 20;
const IPV6_HEADER: usize = 40;
const L4_PORTS: usize = 4;

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86dd;
const ETHERTYPE_VLAN: u16 = 0x8100;
const ETHERTYPE_QINQ: u16 = 0x88a8;

pub(crate) const IPPROTO_TCP: u8 = 6;
pub(crate) const IPPROTO_UDP: u8 = 17;

/// MAC address in canonical colon-separated lowercase form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddr([u8; 6]);

impl std::fmt::Display for MacAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Fields decoded from one frame. `None` marks a field that was absent or
/// could not be reached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketFields {
    /// Source MAC address.
    pub source_mac: Option<MacAddr>,
    /// Destination MAC address.
    pub destination_mac: Option<MacAddr>,
    /// Outermost VLAN id.
    pub vlan: Option<u16>,
    /// EtherType of the payload after any VLAN tags.
    pub ethertype: Option<u16>,
    /// Source IP address.
    pub source_ip: Option<IpAddr>,
    /// Destination IP address.
    pub destination_ip: Option<IpAddr>,
    /// IP protocol number.
    pub ip_protocol: Option<u8>,
    /// TCP or UDP source port.
    pub source_port: Option<u16>,
    /// TCP or UDP destination port.
    pub destination_port: Option<u16>,
}

impl PacketFields {
    /// Decodes an Ethernet II frame.
    #[must_use]
    pub fn decode(frame: &[u8]) -> Self {
        let mut fields = Self::default();
        let Some(header) = frame.get(..ETHERNET_HEADER) else {
            return fields;
        };
        fields.destination_mac = mac_at(header, 0);
        fields.source_mac = mac_at(header, 6);

        let mut offset = 12;
        let mut ethertype = be16(frame, offset);
        while matches!(ethertype, Some(ETHERTYPE_VLAN | ETHERTYPE_QINQ)) {
            let Some(tci) = be16(frame, offset + 2) else {
                fields.ethertype = ethertype;
                return fields;
            };
            if fields.vlan.is_none() {
                fields.vlan = Some(tci & 0x0fff);
            }
            offset += VLAN_TAG;
            ethertype = be16(frame, offset);
        }
        fields.ethertype = ethertype;

        let payload = offset + 2;
        let transport = match ethertype {
            Some(ETHERTYPE_IPV4) => fields.decode_ipv4(frame, payload),
            Some(ETHERTYPE_IPV6) => fields.decode_ipv6(frame, payload),
            _ => None,
        };
        if let Some(start) = transport {
            fields.decode_ports(frame, start);
        }
        fields
    }

    /// Returns the offset of the transport header when it is decodable.
    fn decode_ipv4(&mut self, frame: &[u8], start: usize) -> Option<usize> {
        let header = frame.get(start..start + IPV4_MIN_HEADER)?;
        self.ip_protocol = Some(header[9]);
        self.source_ip = Some(IpAddr::V4(Ipv4Addr::new(
            header[12], header[13], header[14], header[15],
        )));
        self.destination_ip = Some(IpAddr::V4(Ipv4Addr::new(
            header[16], header[17], header[18], header[19],
        )));
        let header_len = usize::from(header[0] & 0x0f) * 4;
        let fragment_offset = u16::from_be_bytes([header[6], header[7]]) & 0x1fff;
        (header_len >= IPV4_MIN_HEADER && fragment_offset == 0).then_some(start + header_len)
    }

    fn decode_ipv6(&mut self, frame: &[u8], start: usize) -> Option<usize> {
        let header = frame.get(start..start + IPV6_HEADER)?;
        self.ip_protocol = Some(header[6]);
        self.source_ip = ipv6_at(header, 8).map(IpAddr::V6);
        self.destination_ip = ipv6_at(header, 24).map(IpAddr::V6);
        Some(start + IPV6_HEADER)
    }

    fn decode_ports(&mut self, frame: &[u8], start: usize) {
        if !matches!(self.ip_protocol, Some(IPPROTO_TCP | IPPROTO_UDP)) {
            return;
        }
        if frame.get(start..start + L4_PORTS).is_none() {
            return;
        }
        self.source_port = be16(frame, start);
        self.destination_port = be16(frame, start + 2);
    }
}

fn be16(frame: &[u8], offset: usize) -> Option<u16> {
    let bytes = frame.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn mac_at(bytes: &[u8], offset: usize) -> Option<MacAddr> {
    let octets: [u8; 6] = bytes.get(offset..offset + 6)?.try_into().ok()?;
    Some(MacAddr(octets))
}

fn ipv6_at(bytes: &[u8], offset: usize) -> Option<Ipv6Addr> {
    let octets: [u8; 16] = bytes.get(offset..offset + 16)?.try_into().ok()?;
    Some(Ipv6Addr::from(octets))
}
