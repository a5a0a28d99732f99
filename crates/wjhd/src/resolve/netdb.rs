//! Port and IP protocol names from the `services(5)` and `protocols(5)`
//! databases.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, warn};

use super::RESOLVE_TARGET;

const SERVICES_PATH: &str = "/etc/services";
const PROTOCOLS_PATH: &str = "/etc/protocols";

/// Transport protocol qualifying a service lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
}

impl Transport {
    /// Protocol column used by `services(5)`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }

    fn from_database(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            _ => None,
        }
    }
}

/// Looks up human-readable names for L4 ports and IP protocol numbers.
#[cfg_attr(test, mockall::automock)]
pub trait ProtocolNames {
    /// Service registered for a port, optionally restricted to one transport
    /// protocol.
    fn service_name(&self, port: u16, transport: Option<Transport>) -> Option<String>;

    /// Name of an IP protocol number.
    fn protocol_name(&self, number: u8) -> Option<String>;
}

/// Name tables parsed once from the network databases.
#[derive(Debug, Clone, Default)]
pub struct NetDb {
    services: HashMap<(u16, Transport), String>,
    any_protocol: HashMap<u16, String>,
    protocols: HashMap<u8, String>,
}

impl NetDb {
    /// Loads the host databases. A missing or unreadable file leaves the
    /// corresponding lookups empty.
    #[must_use]
    pub fn load_system() -> Self {
        let services = read_database(Path::new(SERVICES_PATH));
        let protocols = read_database(Path::new(PROTOCOLS_PATH));
        let db = Self::parse(&services, &protocols);
        debug!(
            target: RESOLVE_TARGET,
            services = db.services.len(),
            protocols = db.protocols.len(),
            "network databases loaded"
        );
        db
    }

    /// Parses database contents in `services(5)` and `protocols(5)` format.
    #[must_use]
    pub fn parse(services: &str, protocols: &str) -> Self {
        let mut db = Self::default();
        for fields in records(services) {
            let [name, port_proto, ..] = fields.as_slice() else {
                continue;
            };
            let Some((port, proto)) = port_proto.split_once('/') else {
                continue;
            };
            let Ok(port) = port.parse::<u16>() else {
                continue;
            };
            if let Some(transport) = Transport::from_database(proto) {
                db.services
                    .entry((port, transport))
                    .or_insert_with(|| (*name).to_owned());
            }
            db.any_protocol
                .entry(port)
                .or_insert_with(|| (*name).to_owned());
        }
        for fields in records(protocols) {
            let [name, number, ..] = fields.as_slice() else {
                continue;
            };
            let Ok(number) = number.parse::<u8>() else {
                continue;
            };
            db.protocols
                .entry(number)
                .or_insert_with(|| (*name).to_owned());
        }
        db
    }
}

impl ProtocolNames for NetDb {
    fn service_name(&self, port: u16, transport: Option<Transport>) -> Option<String> {
        match transport {
            Some(transport) => self.services.get(&(port, transport)).cloned(),
            None => self.any_protocol.get(&port).cloned(),
        }
    }

    fn protocol_name(&self, number: u8) -> Option<String> {
        self.protocols.get(&number).cloned()
    }
}

fn read_database(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == io::ErrorKind::NotFound => String::new(),
        Err(error) => {
            warn!(
                target: RESOLVE_TARGET,
                file = %path.display(),
                error = %error,
                "failed to read network database"
            );
            String::new()
        }
    }
}

fn records(contents: &str) -> impl Iterator<Item = Vec<&str>> {
    contents.lines().filter_map(|line| {
        let data = line.split('#').next().unwrap_or_default();
        let fields: Vec<&str> = data.split_whitespace().collect();
        (!fields.is_empty()).then_some(fields)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    const SERVICES: &str = "\
# Network services
ssh\t\t22/tcp\t\t\t\t# SSH Remote Login Protocol
domain\t\t53/tcp
domain\t\t53/udp
bootps\t\t67/udp
http\t\t80/tcp\t\twww\t\t# WorldWideWeb HTTP
broken line
";

    const PROTOCOLS: &str = "\
ip\t0\tIP\t\t# internet protocol, pseudo protocol number
icmp\t1\tICMP
tcp\t6\tTCP
udp\t17\tUDP
";

    #[fixture]
    fn db() -> NetDb {
        NetDb::parse(SERVICES, PROTOCOLS)
    }

    #[rstest]
    #[case(22, Some(Transport::Tcp), Some("ssh"))]
    #[case(53, Some(Transport::Udp), Some("domain"))]
    #[case(67, Some(Transport::Tcp), None)]
    #[case(67, None, Some("bootps"))]
    #[case(80, Some(Transport::Tcp), Some("http"))]
    #[case(8080, None, None)]
    fn resolves_services(
        db: NetDb,
        #[case] port: u16,
        #[case] transport: Option<Transport>,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(db.service_name(port, transport).as_deref(), expected);
    }

    #[rstest]
    #[case(6, Some("tcp"))]
    #[case(17, Some("udp"))]
    #[case(47, None)]
    fn resolves_protocols(db: NetDb, #[case] number: u8, #[case] expected: Option<&str>) {
        assert_eq!(db.protocol_name(number).as_deref(), expected);
    }

    #[test]
    fn empty_databases_resolve_nothing() {
        let db = NetDb::parse("", "");
        assert_eq!(db.service_name(22, None), None);
        assert_eq!(db.protocol_name(6), None);
    }
}
