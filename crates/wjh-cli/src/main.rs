//! CLI entrypoint for the drop-capture client.
//!
//! The binary delegates to [`wjh_cli::run`], which loads the shared
//! configuration, parses the command, and talks to `wjhd`.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    wjh_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
