//! Datagram source trait and error types.

use core::future::Future;

/// Error type for input operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputError {
    /// Socket/device I/O error.
    Io,
    /// Nothing arrived within the receive timeout.
    Timeout,
    /// The source is gone (device unplugged, reader thread ended).
    Disconnected,
}

impl core::fmt::Display for InputError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io => write!(f, "I/O error"),
            Self::Timeout => write!(f, "receive timed out"),
            Self::Disconnected => write!(f, "source disconnected"),
        }
    }
}

/// Async trait for datagram sources.
///
/// Every receive must be bounded: an implementation returns
/// [`InputError::Timeout`] when nothing arrives within its receive timeout so
/// the calling loop can observe cancellation.
pub trait DatagramSource {
    /// Wait for the next datagram and copy it into `buf`.
    ///
    /// Returns the datagram length. Datagrams longer than `buf` are truncated.
    fn receive(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, InputError>>;
}

impl<S: DatagramSource + ?Sized> DatagramSource for &mut S {
    fn receive(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, InputError>> {
        (**self).receive(buf)
    }
}
