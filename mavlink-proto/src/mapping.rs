//! RC channel mapping between relay values and MAVLink channel slots.
//!
//! The same mapping is used in both directions: building RC_CHANNELS_OVERRIDE
//! frames from a setpoint, and mirroring the vehicle's RC_CHANNELS echo back
//! into relay values.

use crate::messages::{RcChannels, RcChannelsOverride};

/// Number of RC channels in RC_CHANNELS / RC_CHANNELS_OVERRIDE.
pub const RC_CHANNEL_COUNT: usize = 18;

/// 1-based RC channel number assigned to each relay function.
///
/// A channel number of 0 (or above [`RC_CHANNEL_COUNT`]) disables that function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelMapping {
    pub deploy1: u8,
    pub deploy2: u8,
    /// Only mirrored; never overridden.
    pub safety: u8,
    pub pitch: u8,
    pub yaw: u8,
    pub camera: u8,
}

/// Default channel assignment of the payload airframe.
pub const DEFAULT_CHANNEL_MAPPING: ChannelMapping = ChannelMapping {
    deploy1: 6,
    deploy2: 7,
    safety: 8,
    pitch: 9,
    yaw: 11,
    camera: 12,
};

impl Default for ChannelMapping {
    fn default() -> Self {
        DEFAULT_CHANNEL_MAPPING
    }
}

/// Values written into an override frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OverrideValues {
    pub deploy1: u16,
    pub deploy2: u16,
    pub camera: u16,
    pub pitch: u16,
    pub yaw: u16,
}

/// Channel values echoed back by the vehicle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MirroredChannels {
    pub deploy1: u16,
    pub deploy2: u16,
    pub safety: u16,
    pub camera: u16,
}

/// Convert a relay PWM value to a channel slot value.
///
/// Negative values become 0 ("no override"); values beyond `u16` saturate.
#[inline]
#[must_use]
pub fn pwm_to_channel(value: i32) -> u16 {
    value.clamp(0, i32::from(u16::MAX)) as u16
}

#[inline]
fn slot(number: u8) -> Option<usize> {
    let index = usize::from(number).checked_sub(1)?;
    (index < RC_CHANNEL_COUNT).then_some(index)
}

impl ChannelMapping {
    /// Build the 18 override channel values; unmapped channels stay 0.
    #[must_use]
    pub fn override_channels(&self, values: &OverrideValues) -> [u16; RC_CHANNEL_COUNT] {
        let mut channels = [0u16; RC_CHANNEL_COUNT];
        for (number, value) in [
            (self.deploy1, values.deploy1),
            (self.deploy2, values.deploy2),
            (self.pitch, values.pitch),
            (self.yaw, values.yaw),
            (self.camera, values.camera),
        ] {
            if let Some(index) = slot(number) {
                channels[index] = value;
            }
        }
        channels
    }

    /// Build a complete RC_CHANNELS_OVERRIDE message.
    #[must_use]
    pub fn override_message(
        &self,
        target_system: u8,
        target_component: u8,
        values: &OverrideValues,
    ) -> RcChannelsOverride {
        RcChannelsOverride {
            target_system,
            target_component,
            channels: self.override_channels(values),
        }
    }

    /// Extract the mirrored channels from an RC_CHANNELS echo.
    #[must_use]
    pub fn mirror(&self, rc: &RcChannels) -> MirroredChannels {
        let read = |number: u8| rc.channel(usize::from(number)).unwrap_or(0);
        MirroredChannels {
            deploy1: read(self.deploy1),
            deploy2: read(self.deploy2),
            safety: read(self.safety),
            camera: read(self.camera),
        }
    }
}
