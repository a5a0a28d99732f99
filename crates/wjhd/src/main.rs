//! Entrypoint for the drop-capture daemon.

use std::io::{self, Write};
use std::process::ExitCode;

use tracing::error;

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

fn main() -> ExitCode {
    match wjhd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(launch_error) => {
            error!(
                target: PROCESS_TARGET,
                error = %launch_error,
                "daemon exited with an error"
            );
            if let Err(write_error) = writeln!(io::stderr().lock(), "wjhd: {launch_error}") {
                error!(
                    target: PROCESS_TARGET,
                    error = %write_error,
                    "failed to report the launch error on stderr"
                );
            }
            ExitCode::FAILURE
        }
    }
}
