//! Plain-text drop table.

use std::net::IpAddr;

use time::OffsetDateTime;
use time::macros::format_description;
use unicode_width::UnicodeWidthStr;

use crate::channel::{EventDetail, PortRef, RawEvent};
use crate::engine::{DropReason, Timestamp};
use crate::resolve::{ProtocolNames, Transport};

use super::packet::{IPPROTO_TCP, IPPROTO_UDP, PacketFields};

const NOT_ASSIGNED: &str = "N/A";
const DROP_REASON_WIDTH: usize = 52;
const COLUMN_GAP: &str = "  ";

const HEADER: [&str; 14] = [
    "#",
    "Timestamp",
    "sPort",
    "dPort",
    "VLAN",
    "sMAC",
    "dMAC",
    "EthType",
    "sIP:Port",
    "dIP:Port",
    "IP Proto",
    "Drop Group",
    "Severity",
    "Drop reason / Recommended action",
];

/// Renders drop events as an aligned text table.
pub struct TableRenderer<'a> {
    protocols: &'a dyn ProtocolNames,
}

impl<'a> TableRenderer<'a> {
    /// Renderer naming ports and protocols with `protocols`.
    #[must_use]
    pub fn new(protocols: &'a dyn ProtocolNames) -> Self {
        Self { protocols }
    }

    /// Renders a header and one row per event, numbered from one. No events
    /// render as empty text.
    #[must_use]
    pub fn render(&self, events: &[RawEvent]) -> String {
        if events.is_empty() {
            return String::new();
        }
        let mut rows: Vec<Vec<Vec<String>>> = Vec::with_capacity(events.len() + 1);
        rows.push(HEADER.iter().map(|title| vec![(*title).to_owned()]).collect());
        rows.extend(
            events
                .iter()
                .enumerate()
                .map(|(index, event)| self.row(index + 1, event)),
        );
        layout(&rows)
    }

    fn row(&self, index: usize, event: &RawEvent) -> Vec<Vec<String>> {
        let fields = PacketFields::decode(event.packet());
        let transport = match fields.ip_protocol {
            Some(IPPROTO_TCP) => Some(Transport::Tcp),
            Some(IPPROTO_UDP) => Some(Transport::Udp),
            _ => None,
        };
        let egress = match event.detail() {
            EventDetail::Buffer {
                egress: Some(port), ..
            } => port_label(port),
            _ => NOT_ASSIGNED.to_owned(),
        };
        let cells = [
            index.to_string(),
            format_timestamp(event.timestamp()),
            port_label(event.ingress()),
            egress,
            or_na(fields.vlan),
            or_na(fields.source_mac),
            or_na(fields.destination_mac),
            fields
                .ethertype
                .map_or_else(|| NOT_ASSIGNED.to_owned(), |value| format!("{value:#06x}")),
            self.ip_port(fields.source_ip, fields.source_port, transport),
            self.ip_port(fields.destination_ip, fields.destination_port, transport),
            fields
                .ip_protocol
                .map_or_else(|| NOT_ASSIGNED.to_owned(), |number| self.ip_protocol(number)),
            event.group().label().to_owned(),
            event.reason().severity.label().to_owned(),
        ];
        let mut row: Vec<Vec<String>> = cells.into_iter().map(|cell| vec![cell]).collect();
        row.push(drop_reason_lines(event.reason()));
        row
    }

    fn ip_protocol(&self, number: u8) -> String {
        self.protocols
            .protocol_name(number)
            .unwrap_or_else(|| format!("{number:#x}"))
    }

    fn ip_port(
        &self,
        address: Option<IpAddr>,
        port: Option<u16>,
        transport: Option<Transport>,
    ) -> String {
        let Some(address) = address else {
            return NOT_ASSIGNED.to_owned();
        };
        let Some(port) = port else {
            return address.to_string();
        };
        let mut text = match address {
            IpAddr::V4(address) => format!("{address}:{port}"),
            IpAddr::V6(address) => format!("[{address}]:{port}"),
        };
        if let Some(service) = self.protocols.service_name(port, transport) {
            text.push_str(&format!(" ({service})"));
        }
        text
    }
}

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| NOT_ASSIGNED.to_owned(), |value| value.to_string())
}

fn port_label(port: &PortRef) -> String {
    port.name
        .clone()
        .unwrap_or_else(|| port.if_index.to_string())
}

fn format_timestamp(timestamp: Timestamp) -> String {
    let format = format_description!(
        "[year repr:last_two]/[month]/[day] [hour]:[minute]:[second].[subsecond digits:3]"
    );
    OffsetDateTime::from_unix_timestamp(timestamp.seconds)
        .ok()
        .and_then(|time| time.replace_nanosecond(timestamp.nanoseconds).ok())
        .and_then(|time| time.format(format).ok())
        .unwrap_or_else(|| NOT_ASSIGNED.to_owned())
}

fn drop_reason_lines(reason: &DropReason) -> Vec<String> {
    let mut lines = wrap(&reason.reason, DROP_REASON_WIDTH);
    if lines.is_empty() {
        return vec![NOT_ASSIGNED.to_owned()];
    }
    lines.extend(wrap(&reason.description, DROP_REASON_WIDTH));
    lines
}

/// Greedy word wrap. A word longer than `width` gets a line of its own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.width() + 1 + word.width() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn layout(rows: &[Vec<Vec<String>>]) -> String {
    let columns = rows.first().map_or(0, Vec::len);
    let widths: Vec<usize> = (0..columns)
        .map(|column| {
            rows.iter()
                .filter_map(|row| row.get(column))
                .flatten()
                .map(|line| line.width())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for (index, row) in rows.iter().enumerate() {
        let height = row.iter().map(Vec::len).max().unwrap_or(1);
        for line in 0..height {
            let cells: Vec<&str> = row
                .iter()
                .map(|cell| cell.get(line).map_or("", String::as_str))
                .collect();
            push_line(&mut out, &cells, &widths);
        }
        if index == 0 {
            let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
            let rule: Vec<&str> = rule.iter().map(String::as_str).collect();
            push_line(&mut out, &rule, &widths);
        }
    }
    out
}

fn push_line(out: &mut String, cells: &[&str], widths: &[usize]) {
    let mut line = String::new();
    for (column, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if column > 0 {
            line.push_str(COLUMN_GAP);
        }
        line.push_str(cell);
        line.push_str(&" ".repeat(width.saturating_sub(cell.width())));
    }
    out.push_str(line.trim_end());
    out.push('\n');
}
