//! Cooperative cancellation shared by every worker loop.

use embassy_time::{Duration, Instant, Timer};
use portable_atomic::{AtomicBool, Ordering};

/// Longest uninterrupted sleep inside [`Shutdown::sleep`].
pub const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Shared cancellation flag.
///
/// Workers check [`is_triggered`](Self::is_triggered) once per loop iteration
/// and after every receive timeout, so all of them stop within one receive
/// timeout or period of [`trigger`](Self::trigger).
pub struct Shutdown {
    flag: AtomicBool,
}

impl Shutdown {
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    pub fn trigger(&self) {
        if !self.flag.swap(true, Ordering::AcqRel) {
            log::info!("shutdown requested");
        }
    }

    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Sleep for `duration`, waking early on shutdown.
    ///
    /// Returns `false` if shutdown was triggered before the full duration
    /// elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_triggered() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let remaining = deadline - now;
            Timer::after(if remaining < SLEEP_SLICE {
                remaining
            } else {
                SLEEP_SLICE
            })
            .await;
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
