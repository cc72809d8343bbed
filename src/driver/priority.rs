//! Process priority boost for latency-sensitive exchanges.
//!
//! A CRC read holds the serial line for up to 40 seconds and a dropped
//! byte forces the whole wait again, so the exchange runs at elevated
//! scheduling priority. The boost is an RAII guard; the previous niceness
//! is restored on drop.

#[cfg(unix)]
use tracing::debug;

/// RAII scheduling-priority boost. No-op on non-unix targets or when the
/// process lacks permission to renice itself.
pub struct PriorityBoost {
    #[cfg(unix)]
    previous: Option<i32>,
}

impl PriorityBoost {
    #[cfg(unix)]
    pub fn acquire() -> Self {
        let previous = unsafe {
            let nice = libc::getpriority(libc::PRIO_PROCESS, 0);
            if libc::setpriority(libc::PRIO_PROCESS, 0, -20) == 0 {
                debug!(from = nice, "priority boosted for device exchange");
                Some(nice)
            } else {
                // Unprivileged: run at normal priority.
                None
            }
        };
        Self { previous }
    }

    #[cfg(not(unix))]
    pub fn acquire() -> Self {
        Self {}
    }
}

#[cfg(unix)]
impl Drop for PriorityBoost {
    fn drop(&mut self) {
        if let Some(nice) = self.previous {
            unsafe {
                libc::setpriority(libc::PRIO_PROCESS, 0, nice);
            }
        }
    }
}
