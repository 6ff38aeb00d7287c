//! Linux joystick device (`/dev/input/js*`) input.
//!
//! The device only offers blocking reads, so a dedicated OS thread reads
//! `js_event` records and hands them to the executor through a bounded
//! channel. [`EventSource`] is the async side of that channel.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::thread::{self, JoinHandle};

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Timer};
use log::{info, warn};
use portable_atomic::{AtomicBool, AtomicU32, Ordering};
use relay_core::{DatagramSource, InputError, Shutdown};
use relay_proto::JsEvent;

pub const EVENT_QUEUE_DEPTH: usize = 32;

/// One raw `js_event` record.
pub type EventRecord = [u8; JsEvent::SIZE];

/// Hand-off between the reader thread and the executor.
pub struct EventQueue {
    events: Channel<CriticalSectionRawMutex, EventRecord, EVENT_QUEUE_DEPTH>,
    closed: AtomicBool,
    dropped: AtomicU32,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            events: Channel::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU32::new(0),
        }
    }

    /// Queue a record; drops it if the executor side has fallen behind.
    pub fn push(&self, record: EventRecord) {
        if self.events.try_send(record).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Mark the producer as gone. Queued records are still delivered.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Read records until EOF, a read error or shutdown, then close the queue.
pub fn read_events<R: Read>(mut reader: R, queue: &EventQueue, shutdown: &Shutdown) {
    let mut record: EventRecord = [0; JsEvent::SIZE];
    while !shutdown.is_triggered() {
        match reader.read_exact(&mut record) {
            Ok(()) => queue.push(record),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                warn!("joystick device: {e}");
                break;
            }
        }
    }
    queue.close();
}

/// Open `path` and start the reader thread.
///
/// The thread blocks in `read`, so it only notices shutdown on the next event;
/// it is detached and ends with the process.
///
/// # Errors
///
/// Returns the open or thread-spawn error.
pub fn spawn_reader(
    path: &Path,
    queue: &'static EventQueue,
    shutdown: &'static Shutdown,
) -> io::Result<JoinHandle<()>> {
    let device = File::open(path)?;
    info!("reading joystick events from {}", path.display());
    thread::Builder::new()
        .name("joystick".into())
        .spawn(move || read_events(device, queue, shutdown))
}

/// Async receive side of an [`EventQueue`].
pub struct EventSource<'a> {
    queue: &'a EventQueue,
    timeout: Duration,
}

impl<'a> EventSource<'a> {
    pub fn new(queue: &'a EventQueue, timeout: Duration) -> Self {
        Self { queue, timeout }
    }
}

fn copy_record(record: &EventRecord, buf: &mut [u8]) -> usize {
    let len = record.len().min(buf.len());
    buf[..len].copy_from_slice(&record[..len]);
    len
}

impl DatagramSource for EventSource<'_> {
    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize, InputError> {
        if let Ok(record) = self.queue.events.try_receive() {
            return Ok(copy_record(&record, buf));
        }
        if self.queue.is_closed() {
            return Err(InputError::Disconnected);
        }
        match select(self.queue.events.receive(), Timer::after(self.timeout)).await {
            Either::First(record) => Ok(copy_record(&record, buf)),
            Either::Second(()) => Err(InputError::Timeout),
        }
    }
}
