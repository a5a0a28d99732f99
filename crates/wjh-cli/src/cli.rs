//! Command-line argument definitions for `wjhcli`.

use clap::{Parser, Subcommand, ValueEnum};

/// Client for the What Just Happened drop-capture daemon.
#[derive(Parser, Debug)]
#[command(name = "wjhcli", disable_help_subcommand = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CliCommand {
    /// Prints the drops buffered on one or more channels.
    Pull {
        /// Channel to pull; repeat for several channels.
        #[arg(long = "channel", value_name = "NAME", required = true)]
        channels: Vec<String>,
    },
    /// Publishes a global setting change to the running daemon.
    Set {
        #[arg(value_enum)]
        field: SettingField,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },
}

/// Global settings the daemon accepts on its configuration feed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum SettingField {
    /// Share of the PCI bandwidth used for drop capture, in percent.
    #[value(name = "pci_bandwidth")]
    PciBandwidth,
    /// Scheduling priority of the daemon process.
    #[value(name = "nice_level")]
    NiceLevel,
}

impl SettingField {
    /// Field name carried in the change record.
    pub(crate) const fn field_name(self) -> &'static str {
        match self {
            Self::PciBandwidth => "pci_bandwidth",
            Self::NiceLevel => "nice_level",
        }
    }
}
