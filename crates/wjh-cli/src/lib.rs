//! Command-line client for the What Just Happened daemon.
//!
//! The runtime owns argument parsing, configuration bootstrapping and the two
//! daemon exchanges: pulling buffered drops over the daemon socket and
//! publishing a global setting change on the configuration feed. It can be
//! driven from the binary entrypoint or from tests with substituted
//! configuration loading and IO streams.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use wjh_config::{Config, NICE_LEVEL_RANGE, PCI_BANDWIDTH_RANGE};

mod cli;
mod config;
mod errors;
mod transport;

use cli::{Cli, CliCommand, SettingField};
use config::{ConfigArgumentSplit, split_config_arguments};
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::{AppError, is_daemon_not_running};

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: keep in sync with the fields of `wjh_config::Config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--daemon-socket",
    "--client-timeout-secs",
    "--global-feed-socket",
    "--channel-feed-socket",
    "--log-filter",
    "--log-format",
];

const GLOBAL_KEY: &str = "global";

/// A `SET` record for the daemon's global configuration feed.
#[derive(Debug, Serialize)]
struct SettingChange<'a> {
    key: &'a str,
    op: &'a str,
    fields: BTreeMap<&'a str, &'a str>,
}

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);
    let cli_arguments = prepare_cli_arguments(&args, &split);

    let cli = match Cli::try_parse_from(cli_arguments) {
        Ok(cli) => cli,
        Err(error) if !error.use_stderr() => {
            let _ = write!(stdout, "{error}");
            return ExitCode::SUCCESS;
        }
        Err(error) => {
            let _ = writeln!(stderr, "{}", AppError::CliUsage(error));
            return ExitCode::FAILURE;
        }
    };

    let result = loader
        .load(&split.config_arguments)
        .and_then(|config| execute(&cli.command, &config, stdout));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(stderr, "{error}");
            if is_daemon_not_running(&error) {
                let _ = writeln!(stderr, "is wjhd running?");
            }
            ExitCode::FAILURE
        }
    }
}

fn prepare_cli_arguments(args: &[OsString], split: &ConfigArgumentSplit) -> Vec<OsString> {
    let mut cli_arguments: Vec<OsString> = Vec::new();
    if let Some(first) = args.first() {
        cli_arguments.push(first.clone());
    }
    if let Some(command) = args.get(split.command_start..) {
        cli_arguments.extend(command.iter().cloned());
    }
    cli_arguments
}

fn execute<W: Write>(command: &CliCommand, config: &Config, stdout: &mut W) -> Result<(), AppError> {
    match command {
        CliCommand::Pull { channels } => pull(channels, config, stdout),
        CliCommand::Set { field, value } => set(*field, value, config),
    }
}

fn pull<W: Write>(channels: &[String], config: &Config, stdout: &mut W) -> Result<(), AppError> {
    let request = pull_request(channels)?;
    let mut stream = transport::connect(config.daemon_socket(), config.client_timeout())?;
    let reply = transport::exchange(&mut stream, &request)?;
    stdout
        .write_all(&reply)
        .and_then(|()| stdout.flush())
        .map_err(AppError::ForwardResponse)
}

/// Builds the request line for a pull of `channels`.
fn pull_request(channels: &[String]) -> Result<String, AppError> {
    let mut request = String::from("request=pull");
    for channel in channels {
        if channel.is_empty() || channel.contains(|c: char| c == '=' || c.is_whitespace()) {
            return Err(AppError::InvalidChannel(channel.clone()));
        }
        request.push_str(" channel=");
        request.push_str(channel);
    }
    request.push('\n');
    Ok(request)
}

fn set(field: SettingField, value: &str, config: &Config) -> Result<(), AppError> {
    let value = value.trim();
    validate_setting(field, value)?;
    let change = SettingChange {
        key: GLOBAL_KEY,
        op: "SET",
        fields: BTreeMap::from([(field.field_name(), value)]),
    };
    let payload = serde_json::to_vec(&change).map_err(AppError::SerialiseChange)?;
    transport::publish(config.global_feed_socket(), &payload)
}

fn validate_setting(field: SettingField, value: &str) -> Result<(), AppError> {
    let range = match field {
        SettingField::PciBandwidth => PCI_BANDWIDTH_RANGE,
        SettingField::NiceLevel => NICE_LEVEL_RANGE,
    };
    match value.parse::<i64>() {
        Ok(parsed) if range.contains(&parsed) => Ok(()),
        _ => Err(AppError::InvalidSetting {
            field: field.field_name(),
            value: value.to_owned(),
            min: *range.start(),
            max: *range.end(),
        }),
    }
}
