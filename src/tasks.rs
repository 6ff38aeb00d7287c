//! Embassy tasks wiring the core loops to the host transports.

use std::path::PathBuf;

use embassy_time::{Duration, Instant, Timer};
use log::{info, warn};
use portable_atomic::{AtomicUsize, Ordering};
use relay_core::{
    drain, meta_telemetry, mount_setup, overlay_state, ControlLoop, ControlTiming,
    DatagramHandler, Fanout, Ingest, IngestError, JoystickHandler, LinkDispatcher,
    MetaCommandHandler, Monitor, MountTiming, Shutdown, StateConfig, TemperatureHandler,
    TouchHandler, UsbJoystickHandler, VehicleLinkHandler, VehicleState,
};

use crate::joystick_dev::EventSource;
use crate::reload::ConfigWatcher;
use crate::udp::{MavlinkLink, UdpSink, UdpSource};

/// Dispatcher bound to the shared vehicle link socket.
pub type Dispatcher = LinkDispatcher<'static, &'static MavlinkLink>;

/// Counts running workers so the supervisor can tell when all have stopped.
pub struct Workers {
    running: AtomicUsize,
}

impl Workers {
    pub const fn new() -> Self {
        Self {
            running: AtomicUsize::new(0),
        }
    }

    /// Register a worker until the guard is dropped.
    pub fn enter(&self) -> WorkerGuard<'_> {
        self.running.fetch_add(1, Ordering::AcqRel);
        WorkerGuard(self)
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }
}

impl Default for Workers {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WorkerGuard<'a>(&'a Workers);

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        self.0.running.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Everything the tasks share.
pub struct RelayContext {
    pub state: VehicleState,
    pub shutdown: Shutdown,
    pub monitor: Monitor,
    pub workers: Workers,
}

impl RelayContext {
    pub fn new(config: &StateConfig) -> Self {
        Self {
            state: VehicleState::with_config(config),
            shutdown: Shutdown::new(),
            monitor: Monitor::new(),
            workers: Workers::new(),
        }
    }
}

/// The UDP peer channels, one handler each.
pub enum PeerChannel {
    Touch(TouchHandler),
    Joystick(JoystickHandler),
    Temperature(TemperatureHandler),
    MetaCommand(MetaCommandHandler),
}

impl PeerChannel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Touch(_) => "touch",
            Self::Joystick(_) => "joystick",
            Self::Temperature(_) => "temperature",
            Self::MetaCommand(_) => "meta command",
        }
    }
}

impl DatagramHandler for PeerChannel {
    fn handle(&mut self, datagram: &[u8], state: &VehicleState) -> Result<(), IngestError> {
        match self {
            Self::Touch(h) => h.handle(datagram, state),
            Self::Joystick(h) => h.handle(datagram, state),
            Self::Temperature(h) => h.handle(datagram, state),
            Self::MetaCommand(h) => h.handle(datagram, state),
        }
    }
}

#[embassy_executor::task(pool_size = 4)]
pub async fn peer_ingest_task(
    channel: PeerChannel,
    source: UdpSource,
    ctx: &'static RelayContext,
) {
    let _worker = ctx.workers.enter();
    let name = channel.name();
    Ingest::new(name, source, channel, &ctx.state, &ctx.shutdown)
        .run()
        .await;
}

#[embassy_executor::task]
pub async fn usb_joystick_task(source: EventSource<'static>, ctx: &'static RelayContext) {
    let _worker = ctx.workers.enter();
    Ingest::new(
        "usb joystick",
        source,
        UsbJoystickHandler,
        &ctx.state,
        &ctx.shutdown,
    )
    .run()
    .await;
}

#[embassy_executor::task]
pub async fn link_ingest_task(link: &'static MavlinkLink, ctx: &'static RelayContext) {
    let _worker = ctx.workers.enter();
    let handler = VehicleLinkHandler::new(Some(&ctx.monitor));
    Ingest::new("vehicle link", link, handler, &ctx.state, &ctx.shutdown)
        .run()
        .await;
}

#[embassy_executor::task]
pub async fn control_task(
    dispatcher: &'static Dispatcher,
    timing: ControlTiming,
    ctx: &'static RelayContext,
) {
    let _worker = ctx.workers.enter();
    ControlLoop::new(&ctx.state, dispatcher, &ctx.shutdown, timing)
        .run()
        .await;
}

#[embassy_executor::task]
pub async fn mount_task(dispatcher: &'static Dispatcher, ctx: &'static RelayContext) {
    let _worker = ctx.workers.enter();
    mount_setup(&ctx.state, dispatcher, &ctx.shutdown, MountTiming::DEFAULT).await;
}

#[embassy_executor::task]
pub async fn overlay_task(sink: UdpSink, period: Duration, ctx: &'static RelayContext) {
    let _worker = ctx.workers.enter();
    Fanout::new(
        "overlay",
        sink,
        period,
        overlay_state,
        &ctx.state,
        &ctx.shutdown,
    )
    .run()
    .await;
}

#[embassy_executor::task]
pub async fn meta_task(sink: UdpSink, period: Duration, ctx: &'static RelayContext) {
    let _worker = ctx.workers.enter();
    Fanout::new(
        "meta telemetry",
        sink,
        period,
        meta_telemetry,
        &ctx.state,
        &ctx.shutdown,
    )
    .run()
    .await;
}

#[embassy_executor::task]
pub async fn monitor_task(ctx: &'static RelayContext) {
    let _worker = ctx.workers.enter();
    drain(&ctx.monitor, &ctx.shutdown).await;
}

#[embassy_executor::task]
pub async fn reload_task(path: PathBuf, poll: Duration, ctx: &'static RelayContext) {
    let _worker = ctx.workers.enter();
    let mut watcher = ConfigWatcher::new(path);
    info!("watching {} for changes", watcher.path().display());
    while ctx.shutdown.sleep(poll).await {
        watcher.reload_into(&ctx.state);
    }
}

/// Trigger shutdown after `after`.
#[embassy_executor::task]
pub async fn deadline_task(after: Duration, ctx: &'static RelayContext) {
    if ctx.shutdown.sleep(after).await {
        info!("run time of {}s elapsed", after.as_secs());
        ctx.shutdown.trigger();
    }
}

/// Wait for shutdown, give the workers `grace` to stop, then exit the process.
#[embassy_executor::task]
pub async fn supervisor_task(grace: Duration, ctx: &'static RelayContext) {
    while !ctx.shutdown.is_triggered() {
        Timer::after(relay_core::SLEEP_SLICE).await;
    }
    let deadline = Instant::now() + grace;
    while ctx.workers.running() > 0 && Instant::now() < deadline {
        Timer::after_millis(10).await;
    }
    let remaining = ctx.workers.running();
    if remaining > 0 {
        warn!("{remaining} workers still running at exit");
    }
    let dropped = ctx.monitor.dropped();
    if dropped > 0 {
        info!("monitor dropped {dropped} events in total");
    }
    info!("payload relay stopped");
    std::process::exit(0);
}
