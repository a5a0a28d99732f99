//! Test suites for the drop-capture daemon.

pub(crate) mod support;
mod unit;
