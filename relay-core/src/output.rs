//! Datagram sink trait and error types.

use core::future::Future;

/// Error type for output operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputError {
    /// Socket/communication I/O error.
    Io,
    /// No destination known yet (e.g. vehicle link peer not discovered).
    NoPeer,
    /// The datagram was only partially sent.
    Truncated,
    /// Encoding the datagram failed.
    Encode,
}

impl core::fmt::Display for OutputError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io => write!(f, "I/O error"),
            Self::NoPeer => write!(f, "no peer address"),
            Self::Truncated => write!(f, "datagram truncated"),
            Self::Encode => write!(f, "encode failed"),
        }
    }
}

impl From<relay_proto::SerializeError> for OutputError {
    fn from(_: relay_proto::SerializeError) -> Self {
        OutputError::Encode
    }
}

/// Async trait for datagram destinations.
///
/// Implemented by the observer endpoints (video app, meta device) and by the
/// vehicle link transmit path. Sends are fire-and-forget: a sink never retries.
pub trait DatagramSink {
    /// Send one complete datagram.
    fn send(&mut self, datagram: &[u8]) -> impl Future<Output = Result<(), OutputError>>;
}

impl<S: DatagramSink + ?Sized> DatagramSink for &mut S {
    fn send(&mut self, datagram: &[u8]) -> impl Future<Output = Result<(), OutputError>> {
        (**self).send(datagram)
    }
}
