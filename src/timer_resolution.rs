//! Finer sleep granularity for the timing loop
//!
//! Linux lets the kernel coalesce a thread's timer wakeups by up to its
//! "timer slack" (50µs by default). Lowering the slack to 1ns tightens the
//! sleeps between clicks. The setting is per-thread, so the guard must be
//! created and dropped on the thread that sleeps.

use tracing::{debug, warn};

/// Restores the previous timer slack when dropped
pub struct TimerResolution {
    #[cfg(target_os = "linux")]
    previous: Option<libc::c_ulong>,
}

impl TimerResolution {
    /// Request fine timer resolution for the current thread
    ///
    /// Best effort: on failure this only logs, and sleeps keep their default
    /// granularity.
    #[cfg(target_os = "linux")]
    pub fn elevate() -> Self {
        let current = unsafe { libc::prctl(libc::PR_GET_TIMERSLACK, 0, 0, 0, 0) };
        if current < 0 {
            warn!("Could not read timer slack, keeping default resolution");
            return Self { previous: None };
        }

        let result = unsafe { libc::prctl(libc::PR_SET_TIMERSLACK, 1 as libc::c_ulong, 0, 0, 0) };
        if result != 0 {
            warn!("Could not lower timer slack, keeping default resolution");
            return Self { previous: None };
        }

        debug!("Timer slack lowered from {}ns", current);
        Self {
            previous: Some(current as libc::c_ulong),
        }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn elevate() -> Self {
        debug!("Timer resolution control not supported on this platform");
        Self {}
    }

    /// Whether the resolution was actually raised
    pub fn is_elevated(&self) -> bool {
        #[cfg(target_os = "linux")]
        {
            self.previous.is_some()
        }
        #[cfg(not(target_os = "linux"))]
        {
            false
        }
    }
}

impl Drop for TimerResolution {
    fn drop(&mut self) {
        #[cfg(target_os = "linux")]
        if let Some(previous) = self.previous.take() {
            if unsafe { libc::prctl(libc::PR_SET_TIMERSLACK, previous, 0, 0, 0) } != 0 {
                warn!("Failed to restore timer slack to {}ns", previous);
            } else {
                debug!("Timer slack restored to {}ns", previous);
            }
        }
    }
}
