//! UDP transports for the ground-side peers and the vehicle link.
//!
//! Sockets are std `UdpSocket`s in non-blocking mode, polled from the embassy
//! executor. Every receive is bounded by a timeout so that the ingest loops
//! regularly get a chance to observe shutdown.

use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Instant, Timer};
use log::info;
use relay_core::{DatagramSink, DatagramSource, InputError, OutputError};
use thiserror::Error;

use crate::config::{JoystickMode, RelayConfig};

/// Wait between polls of a socket with nothing to read.
pub const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Bind a non-blocking UDP socket.
///
/// # Errors
///
/// Returns the bind or socket-option error.
pub fn bind_nonblocking(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let socket = UdpSocket::bind(addr)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

/// Receive one datagram, waiting at most `timeout`.
async fn recv_with_timeout(
    socket: &UdpSocket,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<(usize, SocketAddr), InputError> {
    let deadline = Instant::now() + timeout;
    loop {
        match socket.recv_from(buf) {
            Ok(received) => return Ok(received),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            // A previous send hit a closed port; not a receive failure
            Err(e) if e.kind() == ErrorKind::ConnectionReset => {}
            Err(e) => {
                log::debug!("recv_from: {e}");
                return Err(InputError::Io);
            }
        }
        if Instant::now() >= deadline {
            return Err(InputError::Timeout);
        }
        Timer::after(POLL_INTERVAL).await;
    }
}

fn send_all(socket: &UdpSocket, datagram: &[u8], target: SocketAddr) -> Result<(), OutputError> {
    match socket.send_to(datagram, target) {
        Ok(sent) if sent == datagram.len() => Ok(()),
        Ok(_) => Err(OutputError::Truncated),
        Err(e) => {
            log::debug!("send_to {target}: {e}");
            Err(OutputError::Io)
        }
    }
}

/// Inbound UDP port for one peer channel.
pub struct UdpSource {
    socket: UdpSocket,
    timeout: Duration,
}

impl UdpSource {
    pub fn new(socket: UdpSocket, timeout: Duration) -> Self {
        Self { socket, timeout }
    }

    /// Bind `addr` and wrap it as a source.
    ///
    /// # Errors
    ///
    /// See [`bind_nonblocking`].
    pub fn bind(addr: SocketAddr, timeout: Duration) -> std::io::Result<Self> {
        Ok(Self::new(bind_nonblocking(addr)?, timeout))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl DatagramSource for UdpSource {
    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize, InputError> {
        recv_with_timeout(&self.socket, buf, self.timeout)
            .await
            .map(|(len, _)| len)
    }
}

/// Outbound UDP destination for one observer.
pub struct UdpSink {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpSink {
    pub fn new(socket: UdpSocket, target: SocketAddr) -> Self {
        Self { socket, target }
    }

    /// Bind an ephemeral local port and send to `target`.
    ///
    /// # Errors
    ///
    /// See [`bind_nonblocking`].
    pub fn connect(target: SocketAddr) -> std::io::Result<Self> {
        let local: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        Ok(Self::new(bind_nonblocking(local)?, target))
    }
}

impl DatagramSink for UdpSink {
    async fn send(&mut self, datagram: &[u8]) -> Result<(), OutputError> {
        send_all(&self.socket, datagram, self.target)
    }
}

/// The vehicle link socket, shared by the receive loop and the dispatcher.
///
/// Without a configured peer the link answers whoever sent the last datagram,
/// the way a MAVLink `udpin` endpoint does. Until then sends fail with
/// [`OutputError::NoPeer`].
pub struct MavlinkLink {
    socket: UdpSocket,
    peer: Mutex<CriticalSectionRawMutex, core::cell::Cell<Option<SocketAddr>>>,
    fixed_peer: bool,
    timeout: Duration,
}

impl MavlinkLink {
    pub fn new(socket: UdpSocket, peer: Option<SocketAddr>, timeout: Duration) -> Self {
        Self {
            socket,
            peer: Mutex::new(core::cell::Cell::new(peer)),
            fixed_peer: peer.is_some(),
            timeout,
        }
    }

    /// # Errors
    ///
    /// See [`bind_nonblocking`].
    pub fn bind(
        addr: SocketAddr,
        peer: Option<SocketAddr>,
        timeout: Duration,
    ) -> std::io::Result<Self> {
        Ok(Self::new(bind_nonblocking(addr)?, peer, timeout))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Current destination for outgoing frames.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer.lock(|peer| peer.get())
    }

    fn learn_peer(&self, from: SocketAddr) {
        if self.fixed_peer {
            return;
        }
        let previous = self.peer.lock(|peer| peer.replace(Some(from)));
        if previous != Some(from) {
            info!("vehicle link peer: {from}");
        }
    }
}

impl DatagramSource for &MavlinkLink {
    async fn receive(&mut self, buf: &mut [u8]) -> Result<usize, InputError> {
        let (len, from) = recv_with_timeout(&self.socket, buf, self.timeout).await?;
        self.learn_peer(from);
        Ok(len)
    }
}

impl DatagramSink for &MavlinkLink {
    async fn send(&mut self, datagram: &[u8]) -> Result<(), OutputError> {
        let target = self.peer().ok_or(OutputError::NoPeer)?;
        send_all(&self.socket, datagram, target)
    }
}

#[derive(Debug, Error)]
#[error("cannot open UDP endpoint {addr}: {source}")]
pub struct BindError {
    pub addr: SocketAddr,
    pub source: std::io::Error,
}

/// All sockets the relay needs, opened up front so a bad address fails
/// startup rather than one worker.
pub struct Endpoints {
    pub touch: UdpSource,
    /// Only bound in [`JoystickMode::Network`].
    pub joystick: Option<UdpSource>,
    pub temperature: UdpSource,
    pub meta_command: UdpSource,
    pub link: MavlinkLink,
    pub overlay: UdpSink,
    pub meta: UdpSink,
}

impl Endpoints {
    /// # Errors
    ///
    /// Returns the first address that could not be bound.
    pub fn open(config: &RelayConfig) -> Result<Self, BindError> {
        let net = &config.network;
        let timeout = net.receive_timeout();
        let source = |port: u16| {
            let addr = net.bind_addr(port);
            UdpSource::bind(addr, timeout).map_err(|source| BindError { addr, source })
        };
        let sink = |addr: SocketAddr| {
            UdpSink::connect(addr).map_err(|source| BindError { addr, source })
        };

        let joystick = match config.joystick.mode {
            JoystickMode::Network => Some(source(net.joystick_port)?),
            JoystickMode::Usb => None,
        };
        Ok(Self {
            touch: source(net.touch_port)?,
            joystick,
            temperature: source(net.temperature_port)?,
            meta_command: source(net.meta_receive_port)?,
            link: MavlinkLink::bind(net.link_bind, net.link_peer, timeout).map_err(|source| {
                BindError {
                    addr: net.link_bind,
                    source,
                }
            })?,
            overlay: sink(net.video_target())?,
            meta: sink(net.meta_target())?,
        })
    }
}
