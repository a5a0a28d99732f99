//! Interface index to name resolution.

use std::collections::HashMap;

use tracing::warn;

use super::RESOLVE_TARGET;

/// Maps host interface indexes to interface names.
///
/// Port breakout can renumber interfaces at runtime, so callers refresh the
/// mapping before each batch of lookups.
#[cfg_attr(test, mockall::automock)]
pub trait InterfaceNames {
    /// Reloads the mapping from the host.
    fn refresh(&mut self);

    /// Name of the interface with the given index, if known.
    fn resolve(&self, if_index: u32) -> Option<String>;
}

/// Interface names read from the host with `if_nameindex(3)`.
#[derive(Debug, Default)]
pub struct SystemInterfaceNames {
    names: HashMap<u32, String>,
}

impl SystemInterfaceNames {
    /// Builds a resolver populated from the host.
    #[must_use]
    pub fn load() -> Self {
        let mut resolver = Self::default();
        resolver.refresh();
        resolver
    }
}

impl InterfaceNames for SystemInterfaceNames {
    fn refresh(&mut self) {
        match nix::net::if_::if_nameindex() {
            Ok(interfaces) => {
                self.names = interfaces
                    .iter()
                    .map(|interface| {
                        (
                            interface.index(),
                            interface.name().to_string_lossy().into_owned(),
                        )
                    })
                    .collect();
            }
            Err(error) => {
                warn!(
                    target: RESOLVE_TARGET,
                    error = %error,
                    "failed to list host interfaces; keeping previous names"
                );
            }
        }
    }

    fn resolve(&self, if_index: u32) -> Option<String> {
        self.names.get(&if_index).cloned()
    }
}

/// Fixed interface table, for hosts without kernel netdevs and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaceNames {
    names: HashMap<u32, String>,
}

impl StaticInterfaceNames {
    /// Resolver over a fixed index to name mapping.
    #[must_use]
    pub fn new(names: impl IntoIterator<Item = (u32, String)>) -> Self {
        Self {
            names: names.into_iter().collect(),
        }
    }
}

impl InterfaceNames for StaticInterfaceNames {
    fn refresh(&mut self) {}

    fn resolve(&self, if_index: u32) -> Option<String> {
        self.names.get(&if_index).cloned()
    }
}
