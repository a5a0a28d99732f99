//! Scheduling priority control for the daemon process.

use std::io;

/// Adjusts the daemon's scheduling priority.
#[cfg_attr(test, mockall::automock)]
pub trait PriorityControl {
    /// Sets the nice level of the current process.
    fn set_nice(&self, level: i32) -> io::Result<()>;
}

/// Applies the nice level to the current process with `setpriority(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPriority;

impl PriorityControl for SystemPriority {
    fn set_nice(&self, level: i32) -> io::Result<()> {
        // SAFETY: setpriority only reads its integer arguments.
        let result = unsafe { libc::setpriority(libc::PRIO_PROCESS, 0, level) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}
