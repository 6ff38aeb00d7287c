//! Payload relay
//!
//! Arbitrates gimbal and payload control between the touch app, a joystick
//! and the autonomous meta device, and forwards the result to the vehicle
//! over MAVLink.
//!
//! Usage:
//! ```text
//! payload-relay --config config/relay.json [--joystick usb] [--run-for 60]
//! ```
//!
//! Type `quit` on stdin to stop.

use std::io::BufRead;
use std::path::PathBuf;
use std::thread;

use clap::Parser;
use embassy_executor::Spawner;
use embassy_time::Duration;
use log::{error, info, warn};
use mavlink_proto::FrameEncoder;
use payload_relay::joystick_dev::{spawn_reader, EventQueue, EventSource};
use payload_relay::tasks::{
    control_task, deadline_task, link_ingest_task, meta_task, monitor_task, mount_task,
    overlay_task, peer_ingest_task, reload_task, supervisor_task, usb_joystick_task, Dispatcher,
    PeerChannel, RelayContext,
};
use payload_relay::{Endpoints, JoystickMode, MavlinkLink, RelayConfig};
use relay_core::{
    JoystickHandler, LinkDispatcher, MetaCommandHandler, Shutdown, TemperatureHandler,
    TouchHandler,
};
use static_cell::StaticCell;

/// Time the workers get to stop after shutdown before the process exits.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(
    name = "payload-relay",
    about = "Relays payload control between ground-side peers and the vehicle",
    long_about = None
)]
struct Args {
    /// Configuration file (JSON)
    #[arg(short, long, default_value = "config/relay.json")]
    config: PathBuf,

    /// Joystick input, overriding the configuration file
    #[arg(long, value_enum)]
    joystick: Option<JoystickMode>,

    /// Stop after this many seconds
    #[arg(long)]
    run_for: Option<u64>,
}

static CONTEXT: StaticCell<RelayContext> = StaticCell::new();
static LINK: StaticCell<MavlinkLink> = StaticCell::new();
static DISPATCHER: StaticCell<Dispatcher> = StaticCell::new();
static JOYSTICK_EVENTS: EventQueue = EventQueue::new();

/// Trigger shutdown when `quit` is typed on stdin.
fn watch_stdin(shutdown: &'static Shutdown) {
    let spawned = thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) if line.trim().eq_ignore_ascii_case("quit") => {
                        shutdown.trigger();
                        break;
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        });
    if let Err(e) = spawned {
        warn!("stdin watcher not started: {e}");
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match RelayConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    if let Some(mode) = args.joystick {
        config.joystick.mode = mode;
    }
    info!(
        "payload relay starting: vehicle {} from {}",
        config.vehicle_id,
        args.config.display()
    );

    let endpoints = match Endpoints::open(&config) {
        Ok(endpoints) => endpoints,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let ctx: &'static RelayContext = CONTEXT.init(RelayContext::new(&config.state_config()));
    let link: &'static MavlinkLink = LINK.init(endpoints.link);
    let dispatcher: &'static Dispatcher = DISPATCHER.init(LinkDispatcher::new(
        link,
        FrameEncoder::gcs(),
        &ctx.state,
        Some(&ctx.monitor),
    ));

    let timing = &config.timing;
    let receive_timeout = config.network.receive_timeout();

    // Spawn tasks (unwrap the SpawnToken, then spawn)
    spawner.spawn(link_ingest_task(link, ctx).unwrap());
    spawner.spawn(peer_ingest_task(PeerChannel::Touch(TouchHandler), endpoints.touch, ctx).unwrap());
    spawner.spawn(
        peer_ingest_task(
            PeerChannel::Temperature(TemperatureHandler),
            endpoints.temperature,
            ctx,
        )
        .unwrap(),
    );
    spawner.spawn(
        peer_ingest_task(
            PeerChannel::MetaCommand(MetaCommandHandler),
            endpoints.meta_command,
            ctx,
        )
        .unwrap(),
    );
    match (config.joystick.mode, endpoints.joystick) {
        (JoystickMode::Network, Some(source)) => {
            spawner.spawn(
                peer_ingest_task(PeerChannel::Joystick(JoystickHandler), source, ctx).unwrap(),
            );
        }
        _ => match spawn_reader(&config.joystick.device, &JOYSTICK_EVENTS, &ctx.shutdown) {
            Ok(_) => {
                let source = EventSource::new(&JOYSTICK_EVENTS, receive_timeout);
                spawner.spawn(usb_joystick_task(source, ctx).unwrap());
            }
            Err(e) => warn!(
                "joystick device {} unavailable, manual control disabled: {e}",
                config.joystick.device.display()
            ),
        },
    }

    spawner.spawn(control_task(dispatcher, timing.control(), ctx).unwrap());
    spawner.spawn(mount_task(dispatcher, ctx).unwrap());
    spawner.spawn(
        overlay_task(
            endpoints.overlay,
            Duration::from_millis(timing.overlay_period_ms),
            ctx,
        )
        .unwrap(),
    );
    spawner.spawn(
        meta_task(
            endpoints.meta,
            Duration::from_millis(timing.meta_period_ms),
            ctx,
        )
        .unwrap(),
    );
    spawner.spawn(monitor_task(ctx).unwrap());
    if timing.reload_poll_ms > 0 {
        spawner.spawn(
            reload_task(
                args.config.clone(),
                Duration::from_millis(timing.reload_poll_ms),
                ctx,
            )
            .unwrap(),
        );
    }
    if let Some(secs) = args.run_for {
        spawner.spawn(deadline_task(Duration::from_secs(secs), ctx).unwrap());
    }
    spawner.spawn(supervisor_task(SHUTDOWN_GRACE + receive_timeout, ctx).unwrap());

    watch_stdin(&ctx.shutdown);
    info!("payload relay running; type 'quit' to stop");
}
