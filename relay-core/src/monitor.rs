//! Monitor queue mirroring link traffic.
//!
//! Producers never wait: [`Monitor::record`] uses `try_send` and counts the
//! events it had to drop when the queue is full.

use core::fmt::{self, Write};

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Timer;
use heapless::String;
use log::debug;
use portable_atomic::{AtomicU32, Ordering};

use crate::shutdown::{Shutdown, SLEEP_SLICE};

/// Longest event description; longer text is truncated.
pub const DESCRIPTION_LEN: usize = 128;

/// Queue capacity.
pub const MONITOR_DEPTH: usize = 64;

pub type Description = String<DESCRIPTION_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent => f.write_str("sent"),
            Self::Received => f.write_str("received"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorEvent {
    pub direction: Direction,
    pub description: Description,
}

/// Writer that silently stops at capacity instead of failing.
struct Truncating<'a>(&'a mut Description);

impl Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Format `args` into a description, truncating at [`DESCRIPTION_LEN`].
#[must_use]
pub fn describe(args: fmt::Arguments<'_>) -> Description {
    let mut text = Description::new();
    // Truncating never reports an error
    let _ = Truncating(&mut text).write_fmt(args);
    text
}

/// Bounded queue of `(direction, description)` events.
pub struct Monitor {
    queue: Channel<CriticalSectionRawMutex, MonitorEvent, MONITOR_DEPTH>,
    dropped: AtomicU32,
}

impl Monitor {
    pub const fn new() -> Self {
        Self {
            queue: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Queue an event without waiting.
    pub fn record(&self, direction: Direction, args: fmt::Arguments<'_>) {
        let event = MonitorEvent {
            direction,
            description: describe(args),
        };
        if self.queue.try_send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Wait for the next event.
    pub async fn next(&self) -> MonitorEvent {
        self.queue.receive().await
    }

    pub fn try_next(&self) -> Option<MonitorEvent> {
        self.queue.try_receive().ok()
    }

    /// Number of events dropped because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Record into an optional monitor.
pub(crate) fn mirror(monitor: Option<&Monitor>, direction: Direction, args: fmt::Arguments<'_>) {
    if let Some(monitor) = monitor {
        monitor.record(direction, args);
    }
}

/// Drain the monitor queue into the log until shutdown.
pub async fn drain(monitor: &Monitor, shutdown: &Shutdown) {
    let mut reported_drops = 0;
    while !shutdown.is_triggered() {
        if let Either::First(event) = select(monitor.next(), Timer::after(SLEEP_SLICE)).await {
            debug!("{}: {}", event.direction, event.description);
        }
        let dropped = monitor.dropped();
        if dropped != reported_drops {
            debug!("monitor dropped {} events", dropped - reported_drops);
            reported_drops = dropped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    #[test]
    fn test_record_and_drain_order() {
        let monitor = Monitor::new();
        monitor.record(Direction::Sent, format_args!("first {}", 1));
        monitor.record(Direction::Received, format_args!("second"));
        let first = monitor.try_next().unwrap();
        assert_eq!(first.direction, Direction::Sent);
        assert_eq!(first.description.as_str(), "first 1");
        let second = block_on(monitor.next());
        assert_eq!(second.direction, Direction::Received);
        assert!(monitor.try_next().is_none());
    }

    #[test]
    fn test_full_queue_never_blocks() {
        let monitor = Monitor::new();
        for i in 0..MONITOR_DEPTH + 5 {
            monitor.record(Direction::Sent, format_args!("event {i}"));
        }
        assert_eq!(monitor.dropped(), 5);
    }

    #[test]
    fn test_long_description_truncated() {
        let long = "x".repeat(DESCRIPTION_LEN * 2);
        let text = describe(format_args!("{long}"));
        assert_eq!(text.len(), DESCRIPTION_LEN);
    }

    #[test]
    fn test_drain_stops_on_shutdown() {
        let monitor = Monitor::new();
        let shutdown = Shutdown::new();
        monitor.record(Direction::Sent, format_args!("pending"));
        shutdown.trigger();
        block_on(drain(&monitor, &shutdown));
    }
}
