//! MAVLink frame checksum.
//!
//! CRC-16/MCRF4XX over the frame header (without the start byte) and payload,
//! followed by the message's CRC_EXTRA seed byte.

use crc::{Crc, CRC_16_MCRF4XX};

const X25: Crc<u16> = Crc::<u16>::new(&CRC_16_MCRF4XX);

/// Calculate the checksum of `data` with the message's `crc_extra` appended.
#[inline]
#[must_use]
pub fn frame_crc(data: &[u8], crc_extra: u8) -> u16 {
    let mut digest = X25.digest();
    digest.update(data);
    digest.update(&[crc_extra]);
    digest.finalize()
}
