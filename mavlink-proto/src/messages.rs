//! Message definitions for the subset of the MAVLink common set the relay uses.
//!
//! Field order inside each payload follows the MAVLink wire ordering (largest
//! types first), not the order of the XML definition.

/// Largest payload a MAVLink 2 frame can carry.
pub const MAX_PAYLOAD_LEN: usize = 255;

/// HEARTBEAT message ID.
pub const MSG_ID_HEARTBEAT: u32 = 0;
/// SYS_STATUS message ID.
pub const MSG_ID_SYS_STATUS: u32 = 1;
/// SCALED_IMU message ID.
pub const MSG_ID_SCALED_IMU: u32 = 26;
/// ATTITUDE message ID.
pub const MSG_ID_ATTITUDE: u32 = 30;
/// GLOBAL_POSITION_INT message ID.
pub const MSG_ID_GLOBAL_POSITION_INT: u32 = 33;
/// RC_CHANNELS message ID.
pub const MSG_ID_RC_CHANNELS: u32 = 65;
/// RC_CHANNELS_OVERRIDE message ID.
pub const MSG_ID_RC_CHANNELS_OVERRIDE: u32 = 70;
/// VFR_HUD message ID.
pub const MSG_ID_VFR_HUD: u32 = 74;
/// COMMAND_LONG message ID.
pub const MSG_ID_COMMAND_LONG: u32 = 76;
/// MOUNT_CONFIGURE message ID (ardupilotmega dialect).
pub const MSG_ID_MOUNT_CONFIGURE: u32 = 156;

/// MAV_CMD_DO_SET_SERVO.
pub const MAV_CMD_DO_SET_SERVO: u16 = 183;

/// A MAVLink message with a fixed payload layout.
pub trait Message: Sized {
    /// Message ID.
    const ID: u32;
    /// CRC_EXTRA seed derived from the message definition.
    const CRC_EXTRA: u8;
    /// Payload length of the MAVLink 1 (base) fields.
    const BASE_LEN: usize;
    /// Payload length including MAVLink 2 extension fields.
    const LEN: usize;

    /// Write the full payload (`LEN` bytes) into `buf`.
    fn write_payload(&self, buf: &mut [u8; MAX_PAYLOAD_LEN]);

    /// Decode from a zero-extended payload.
    ///
    /// MAVLink 2 senders strip trailing zero bytes, so the parser always hands
    /// over a full-size buffer with the missing tail set to zero.
    fn read_payload(payload: &[u8; MAX_PAYLOAD_LEN]) -> Self;
}

/// Sequential little-endian reader over a zero-extended payload.
struct PayloadReader<'a> {
    payload: &'a [u8; MAX_PAYLOAD_LEN],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(payload: &'a [u8; MAX_PAYLOAD_LEN]) -> Self {
        Self { payload, pos: 0 }
    }

    #[inline]
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.payload[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn u8(&mut self) -> u8 {
        let [b] = self.take();
        b
    }

    fn i8(&mut self) -> i8 {
        self.u8() as i8
    }

    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    fn i16(&mut self) -> i16 {
        i16::from_le_bytes(self.take())
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }
}

/// Sequential little-endian writer into a payload buffer.
struct PayloadWriter<'a> {
    buf: &'a mut [u8; MAX_PAYLOAD_LEN],
    pos: usize,
}

impl<'a> PayloadWriter<'a> {
    fn new(buf: &'a mut [u8; MAX_PAYLOAD_LEN]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn u8(&mut self, v: u8) {
        self.put(&[v]);
    }

    fn i8(&mut self, v: i8) {
        self.put(&[v as u8]);
    }

    fn u16(&mut self, v: u16) {
        self.put(&v.to_le_bytes());
    }

    fn i16(&mut self, v: i16) {
        self.put(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.put(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.put(&v.to_le_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.put(&v.to_le_bytes());
    }
}

/// HEARTBEAT (ID 0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Heartbeat {
    pub custom_mode: u32,
    pub mav_type: u8,
    pub autopilot: u8,
    pub base_mode: u8,
    pub system_status: u8,
    pub mavlink_version: u8,
}

impl Heartbeat {
    /// MAV_TYPE_GCS.
    pub const MAV_TYPE_GCS: u8 = 6;
    /// MAV_AUTOPILOT_INVALID.
    pub const MAV_AUTOPILOT_INVALID: u8 = 8;

    /// Heartbeat announcing a ground control station.
    #[must_use]
    pub const fn gcs() -> Self {
        Self {
            custom_mode: 0,
            mav_type: Self::MAV_TYPE_GCS,
            autopilot: Self::MAV_AUTOPILOT_INVALID,
            base_mode: 0,
            system_status: 0,
            mavlink_version: 3,
        }
    }
}

impl Message for Heartbeat {
    const ID: u32 = MSG_ID_HEARTBEAT;
    const CRC_EXTRA: u8 = 50;
    const BASE_LEN: usize = 9;
    const LEN: usize = 9;

    fn write_payload(&self, buf: &mut [u8; MAX_PAYLOAD_LEN]) {
        let mut w = PayloadWriter::new(buf);
        w.u32(self.custom_mode);
        w.u8(self.mav_type);
        w.u8(self.autopilot);
        w.u8(self.base_mode);
        w.u8(self.system_status);
        w.u8(self.mavlink_version);
    }

    fn read_payload(payload: &[u8; MAX_PAYLOAD_LEN]) -> Self {
        let mut r = PayloadReader::new(payload);
        Self {
            custom_mode: r.u32(),
            mav_type: r.u8(),
            autopilot: r.u8(),
            base_mode: r.u8(),
            system_status: r.u8(),
            mavlink_version: r.u8(),
        }
    }
}

/// SYS_STATUS (ID 1), base fields only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SysStatus {
    pub sensors_present: u32,
    pub sensors_enabled: u32,
    pub sensors_health: u32,
    pub load: u16,
    /// Battery voltage in millivolts.
    pub voltage_battery: u16,
    /// Battery current in centiamperes (-1 if unknown).
    pub current_battery: i16,
    pub drop_rate_comm: u16,
    pub errors_comm: u16,
    pub errors_count: [u16; 4],
    /// Remaining battery percentage (-1 if unknown).
    pub battery_remaining: i8,
}

impl Message for SysStatus {
    const ID: u32 = MSG_ID_SYS_STATUS;
    const CRC_EXTRA: u8 = 124;
    const BASE_LEN: usize = 31;
    const LEN: usize = 31;

    fn write_payload(&self, buf: &mut [u8; MAX_PAYLOAD_LEN]) {
        let mut w = PayloadWriter::new(buf);
        w.u32(self.sensors_present);
        w.u32(self.sensors_enabled);
        w.u32(self.sensors_health);
        w.u16(self.load);
        w.u16(self.voltage_battery);
        w.i16(self.current_battery);
        w.u16(self.drop_rate_comm);
        w.u16(self.errors_comm);
        for count in self.errors_count {
            w.u16(count);
        }
        w.i8(self.battery_remaining);
    }

    fn read_payload(payload: &[u8; MAX_PAYLOAD_LEN]) -> Self {
        let mut r = PayloadReader::new(payload);
        Self {
            sensors_present: r.u32(),
            sensors_enabled: r.u32(),
            sensors_health: r.u32(),
            load: r.u16(),
            voltage_battery: r.u16(),
            current_battery: r.i16(),
            drop_rate_comm: r.u16(),
            errors_comm: r.u16(),
            errors_count: [r.u16(), r.u16(), r.u16(), r.u16()],
            battery_remaining: r.i8(),
        }
    }
}

/// SCALED_IMU (ID 26), base fields only. Accelerations in milli-g.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScaledImu {
    pub time_boot_ms: u32,
    pub xacc: i16,
    pub yacc: i16,
    pub zacc: i16,
    pub xgyro: i16,
    pub ygyro: i16,
    pub zgyro: i16,
    pub xmag: i16,
    pub ymag: i16,
    pub zmag: i16,
}

impl Message for ScaledImu {
    const ID: u32 = MSG_ID_SCALED_IMU;
    const CRC_EXTRA: u8 = 170;
    const BASE_LEN: usize = 22;
    const LEN: usize = 22;

    fn write_payload(&self, buf: &mut [u8; MAX_PAYLOAD_LEN]) {
        let mut w = PayloadWriter::new(buf);
        w.u32(self.time_boot_ms);
        for v in [
            self.xacc, self.yacc, self.zacc, self.xgyro, self.ygyro, self.zgyro, self.xmag,
            self.ymag, self.zmag,
        ] {
            w.i16(v);
        }
    }

    fn read_payload(payload: &[u8; MAX_PAYLOAD_LEN]) -> Self {
        let mut r = PayloadReader::new(payload);
        Self {
            time_boot_ms: r.u32(),
            xacc: r.i16(),
            yacc: r.i16(),
            zacc: r.i16(),
            xgyro: r.i16(),
            ygyro: r.i16(),
            zgyro: r.i16(),
            xmag: r.i16(),
            ymag: r.i16(),
            zmag: r.i16(),
        }
    }
}

/// ATTITUDE (ID 30). Angles in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Attitude {
    pub time_boot_ms: u32,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub rollspeed: f32,
    pub pitchspeed: f32,
    pub yawspeed: f32,
}

impl Message for Attitude {
    const ID: u32 = MSG_ID_ATTITUDE;
    const CRC_EXTRA: u8 = 39;
    const BASE_LEN: usize = 28;
    const LEN: usize = 28;

    fn write_payload(&self, buf: &mut [u8; MAX_PAYLOAD_LEN]) {
        let mut w = PayloadWriter::new(buf);
        w.u32(self.time_boot_ms);
        w.f32(self.roll);
        w.f32(self.pitch);
        w.f32(self.yaw);
        w.f32(self.rollspeed);
        w.f32(self.pitchspeed);
        w.f32(self.yawspeed);
    }

    fn read_payload(payload: &[u8; MAX_PAYLOAD_LEN]) -> Self {
        let mut r = PayloadReader::new(payload);
        Self {
            time_boot_ms: r.u32(),
            roll: r.f32(),
            pitch: r.f32(),
            yaw: r.f32(),
            rollspeed: r.f32(),
            pitchspeed: r.f32(),
            yawspeed: r.f32(),
        }
    }
}

/// GLOBAL_POSITION_INT (ID 33).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GlobalPositionInt {
    pub time_boot_ms: u32,
    /// Latitude in degrees * 1e7.
    pub lat: i32,
    /// Longitude in degrees * 1e7.
    pub lon: i32,
    /// Altitude (MSL) in millimeters.
    pub alt: i32,
    /// Altitude above home in millimeters.
    pub relative_alt: i32,
    /// Velocities in cm/s.
    pub vx: i16,
    pub vy: i16,
    pub vz: i16,
    /// Heading in centidegrees (u16::MAX if unknown).
    pub hdg: u16,
}

impl Message for GlobalPositionInt {
    const ID: u32 = MSG_ID_GLOBAL_POSITION_INT;
    const CRC_EXTRA: u8 = 104;
    const BASE_LEN: usize = 28;
    const LEN: usize = 28;

    fn write_payload(&self, buf: &mut [u8; MAX_PAYLOAD_LEN]) {
        let mut w = PayloadWriter::new(buf);
        w.u32(self.time_boot_ms);
        w.i32(self.lat);
        w.i32(self.lon);
        w.i32(self.alt);
        w.i32(self.relative_alt);
        w.i16(self.vx);
        w.i16(self.vy);
        w.i16(self.vz);
        w.u16(self.hdg);
    }

    fn read_payload(payload: &[u8; MAX_PAYLOAD_LEN]) -> Self {
        let mut r = PayloadReader::new(payload);
        Self {
            time_boot_ms: r.u32(),
            lat: r.i32(),
            lon: r.i32(),
            alt: r.i32(),
            relative_alt: r.i32(),
            vx: r.i16(),
            vy: r.i16(),
            vz: r.i16(),
            hdg: r.u16(),
        }
    }
}

/// RC_CHANNELS (ID 65).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RcChannels {
    pub time_boot_ms: u32,
    /// Raw PWM of channels 1..=18 (index 0 is channel 1).
    pub channels: [u16; 18],
    pub chancount: u8,
    pub rssi: u8,
}

impl RcChannels {
    /// Raw value of a 1-based channel number, or `None` when out of range.
    #[inline]
    #[must_use]
    pub fn channel(&self, number: usize) -> Option<u16> {
        number
            .checked_sub(1)
            .and_then(|i| self.channels.get(i))
            .copied()
    }
}

impl Message for RcChannels {
    const ID: u32 = MSG_ID_RC_CHANNELS;
    const CRC_EXTRA: u8 = 118;
    const BASE_LEN: usize = 42;
    const LEN: usize = 42;

    fn write_payload(&self, buf: &mut [u8; MAX_PAYLOAD_LEN]) {
        let mut w = PayloadWriter::new(buf);
        w.u32(self.time_boot_ms);
        for ch in self.channels {
            w.u16(ch);
        }
        w.u8(self.chancount);
        w.u8(self.rssi);
    }

    fn read_payload(payload: &[u8; MAX_PAYLOAD_LEN]) -> Self {
        let mut r = PayloadReader::new(payload);
        let time_boot_ms = r.u32();
        let mut channels = [0u16; 18];
        for ch in channels.iter_mut() {
            *ch = r.u16();
        }
        Self {
            time_boot_ms,
            channels,
            chancount: r.u8(),
            rssi: r.u8(),
        }
    }
}

/// RC_CHANNELS_OVERRIDE (ID 70).
///
/// A channel value of 0 means "no override" for that channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RcChannelsOverride {
    pub target_system: u8,
    pub target_component: u8,
    /// PWM of channels 1..=18 (index 0 is channel 1).
    pub channels: [u16; 18],
}

impl Message for RcChannelsOverride {
    const ID: u32 = MSG_ID_RC_CHANNELS_OVERRIDE;
    const CRC_EXTRA: u8 = 124;
    const BASE_LEN: usize = 18;
    const LEN: usize = 38;

    fn write_payload(&self, buf: &mut [u8; MAX_PAYLOAD_LEN]) {
        let mut w = PayloadWriter::new(buf);
        for ch in &self.channels[..8] {
            w.u16(*ch);
        }
        w.u8(self.target_system);
        w.u8(self.target_component);
        for ch in &self.channels[8..] {
            w.u16(*ch);
        }
    }

    fn read_payload(payload: &[u8; MAX_PAYLOAD_LEN]) -> Self {
        let mut r = PayloadReader::new(payload);
        let mut channels = [0u16; 18];
        for ch in channels[..8].iter_mut() {
            *ch = r.u16();
        }
        let target_system = r.u8();
        let target_component = r.u8();
        for ch in channels[8..].iter_mut() {
            *ch = r.u16();
        }
        Self {
            target_system,
            target_component,
            channels,
        }
    }
}

/// VFR_HUD (ID 74).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VfrHud {
    pub airspeed: f32,
    pub groundspeed: f32,
    /// Altitude (MSL) in meters.
    pub alt: f32,
    /// Climb rate in m/s.
    pub climb: f32,
    /// Heading in degrees (0..360).
    pub heading: i16,
    pub throttle: u16,
}

impl Message for VfrHud {
    const ID: u32 = MSG_ID_VFR_HUD;
    const CRC_EXTRA: u8 = 20;
    const BASE_LEN: usize = 20;
    const LEN: usize = 20;

    fn write_payload(&self, buf: &mut [u8; MAX_PAYLOAD_LEN]) {
        let mut w = PayloadWriter::new(buf);
        w.f32(self.airspeed);
        w.f32(self.groundspeed);
        w.f32(self.alt);
        w.f32(self.climb);
        w.i16(self.heading);
        w.u16(self.throttle);
    }

    fn read_payload(payload: &[u8; MAX_PAYLOAD_LEN]) -> Self {
        let mut r = PayloadReader::new(payload);
        Self {
            airspeed: r.f32(),
            groundspeed: r.f32(),
            alt: r.f32(),
            climb: r.f32(),
            heading: r.i16(),
            throttle: r.u16(),
        }
    }
}

/// COMMAND_LONG (ID 76).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandLong {
    pub params: [f32; 7],
    pub command: u16,
    pub target_system: u8,
    pub target_component: u8,
    pub confirmation: u8,
}

impl CommandLong {
    /// DO_SET_SERVO: drive servo output `channel` to `pwm`.
    #[must_use]
    pub fn set_servo(target_system: u8, target_component: u8, channel: u16, pwm: u16) -> Self {
        Self {
            params: [channel as f32, pwm as f32, 0.0, 0.0, 0.0, 0.0, 0.0],
            command: MAV_CMD_DO_SET_SERVO,
            target_system,
            target_component,
            confirmation: 0,
        }
    }
}

impl Message for CommandLong {
    const ID: u32 = MSG_ID_COMMAND_LONG;
    const CRC_EXTRA: u8 = 152;
    const BASE_LEN: usize = 33;
    const LEN: usize = 33;

    fn write_payload(&self, buf: &mut [u8; MAX_PAYLOAD_LEN]) {
        let mut w = PayloadWriter::new(buf);
        for p in self.params {
            w.f32(p);
        }
        w.u16(self.command);
        w.u8(self.target_system);
        w.u8(self.target_component);
        w.u8(self.confirmation);
    }

    fn read_payload(payload: &[u8; MAX_PAYLOAD_LEN]) -> Self {
        let mut r = PayloadReader::new(payload);
        let mut params = [0.0f32; 7];
        for p in params.iter_mut() {
            *p = r.f32();
        }
        Self {
            params,
            command: r.u16(),
            target_system: r.u8(),
            target_component: r.u8(),
            confirmation: r.u8(),
        }
    }
}

/// Gimbal mount operating mode (MAV_MOUNT_MODE).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum MountMode {
    Retract = 0,
    Neutral = 1,
    MavlinkTargeting = 2,
    RcTargeting = 3,
    GpsPoint = 4,
}

impl MountMode {
    /// Decode a raw MAV_MOUNT_MODE value.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Retract),
            1 => Some(Self::Neutral),
            2 => Some(Self::MavlinkTargeting),
            3 => Some(Self::RcTargeting),
            4 => Some(Self::GpsPoint),
            _ => None,
        }
    }
}

/// MOUNT_CONFIGURE (ID 156).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MountConfigure {
    pub target_system: u8,
    pub target_component: u8,
    /// Raw MAV_MOUNT_MODE, see [`MountMode`].
    pub mount_mode: u8,
    pub stab_roll: u8,
    pub stab_pitch: u8,
    pub stab_yaw: u8,
}

impl MountConfigure {
    /// Configure the mount into `mode` with stabilisation enabled on all axes.
    #[must_use]
    pub const fn stabilized(target_system: u8, target_component: u8, mode: MountMode) -> Self {
        Self {
            target_system,
            target_component,
            mount_mode: mode as u8,
            stab_roll: 1,
            stab_pitch: 1,
            stab_yaw: 1,
        }
    }
}

impl Message for MountConfigure {
    const ID: u32 = MSG_ID_MOUNT_CONFIGURE;
    const CRC_EXTRA: u8 = 19;
    const BASE_LEN: usize = 6;
    const LEN: usize = 6;

    fn write_payload(&self, buf: &mut [u8; MAX_PAYLOAD_LEN]) {
        let mut w = PayloadWriter::new(buf);
        w.u8(self.target_system);
        w.u8(self.target_component);
        w.u8(self.mount_mode);
        w.u8(self.stab_roll);
        w.u8(self.stab_pitch);
        w.u8(self.stab_yaw);
    }

    fn read_payload(payload: &[u8; MAX_PAYLOAD_LEN]) -> Self {
        let mut r = PayloadReader::new(payload);
        Self {
            target_system: r.u8(),
            target_component: r.u8(),
            mount_mode: r.u8(),
            stab_roll: r.u8(),
            stab_pitch: r.u8(),
            stab_yaw: r.u8(),
        }
    }
}

/// Parsed MAVLink message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MavMessage {
    Heartbeat(Heartbeat),
    SysStatus(SysStatus),
    ScaledImu(ScaledImu),
    Attitude(Attitude),
    GlobalPositionInt(GlobalPositionInt),
    RcChannels(RcChannels),
    RcChannelsOverride(RcChannelsOverride),
    VfrHud(VfrHud),
    CommandLong(CommandLong),
    MountConfigure(MountConfigure),
    /// A message outside the supported subset; carries its ID.
    Unknown(u32),
}

impl MavMessage {
    /// Message name as used in the MAVLink definitions.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Heartbeat(_) => "HEARTBEAT",
            Self::SysStatus(_) => "SYS_STATUS",
            Self::ScaledImu(_) => "SCALED_IMU",
            Self::Attitude(_) => "ATTITUDE",
            Self::GlobalPositionInt(_) => "GLOBAL_POSITION_INT",
            Self::RcChannels(_) => "RC_CHANNELS",
            Self::RcChannelsOverride(_) => "RC_CHANNELS_OVERRIDE",
            Self::VfrHud(_) => "VFR_HUD",
            Self::CommandLong(_) => "COMMAND_LONG",
            Self::MountConfigure(_) => "MOUNT_CONFIGURE",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

/// CRC_EXTRA of a supported message ID, or `None` for unsupported IDs.
#[must_use]
pub const fn crc_extra(msg_id: u32) -> Option<u8> {
    match msg_id {
        MSG_ID_HEARTBEAT => Some(Heartbeat::CRC_EXTRA),
        MSG_ID_SYS_STATUS => Some(SysStatus::CRC_EXTRA),
        MSG_ID_SCALED_IMU => Some(ScaledImu::CRC_EXTRA),
        MSG_ID_ATTITUDE => Some(Attitude::CRC_EXTRA),
        MSG_ID_GLOBAL_POSITION_INT => Some(GlobalPositionInt::CRC_EXTRA),
        MSG_ID_RC_CHANNELS => Some(RcChannels::CRC_EXTRA),
        MSG_ID_RC_CHANNELS_OVERRIDE => Some(RcChannelsOverride::CRC_EXTRA),
        MSG_ID_VFR_HUD => Some(VfrHud::CRC_EXTRA),
        MSG_ID_COMMAND_LONG => Some(CommandLong::CRC_EXTRA),
        MSG_ID_MOUNT_CONFIGURE => Some(MountConfigure::CRC_EXTRA),
        _ => None,
    }
}

/// Decode a zero-extended payload for a supported message ID.
#[must_use]
pub fn decode(msg_id: u32, payload: &[u8; MAX_PAYLOAD_LEN]) -> MavMessage {
    match msg_id {
        MSG_ID_HEARTBEAT => MavMessage::Heartbeat(Heartbeat::read_payload(payload)),
        MSG_ID_SYS_STATUS => MavMessage::SysStatus(SysStatus::read_payload(payload)),
        MSG_ID_SCALED_IMU => MavMessage::ScaledImu(ScaledImu::read_payload(payload)),
        MSG_ID_ATTITUDE => MavMessage::Attitude(Attitude::read_payload(payload)),
        MSG_ID_GLOBAL_POSITION_INT => {
            MavMessage::GlobalPositionInt(GlobalPositionInt::read_payload(payload))
        }
        MSG_ID_RC_CHANNELS => MavMessage::RcChannels(RcChannels::read_payload(payload)),
        MSG_ID_RC_CHANNELS_OVERRIDE => {
            MavMessage::RcChannelsOverride(RcChannelsOverride::read_payload(payload))
        }
        MSG_ID_VFR_HUD => MavMessage::VfrHud(VfrHud::read_payload(payload)),
        MSG_ID_COMMAND_LONG => MavMessage::CommandLong(CommandLong::read_payload(payload)),
        MSG_ID_MOUNT_CONFIGURE => {
            MavMessage::MountConfigure(MountConfigure::read_payload(payload))
        }
        other => MavMessage::Unknown(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rc_channels_override_layout() {
        let mut msg = RcChannelsOverride {
            target_system: 1,
            target_component: 1,
            ..Default::default()
        };
        msg.channels[5] = 1100; // channel 6
        msg.channels[8] = 1825; // channel 9 (extension)
        let mut buf = [0u8; MAX_PAYLOAD_LEN];
        msg.write_payload(&mut buf);
        assert_eq!(&buf[10..12], &1100u16.to_le_bytes());
        assert_eq!(buf[16], 1);
        assert_eq!(buf[17], 1);
        assert_eq!(&buf[18..20], &1825u16.to_le_bytes());
        assert_eq!(RcChannelsOverride::read_payload(&buf), msg);
    }

    #[test]
    fn test_truncated_payload_reads_zero() {
        // Only the first two bytes of SYS_STATUS present: the rest decodes as zero.
        let mut buf = [0u8; MAX_PAYLOAD_LEN];
        buf[0] = 0xFF;
        let status = SysStatus::read_payload(&buf);
        assert_eq!(status.sensors_present, 0xFF);
        assert_eq!(status.voltage_battery, 0);
        assert_eq!(status.battery_remaining, 0);
    }

    #[test]
    fn test_rc_channels_channel_is_one_based() {
        let mut msg = RcChannels::default();
        msg.channels[11] = 1535;
        assert_eq!(msg.channel(12), Some(1535));
        assert_eq!(msg.channel(0), None);
        assert_eq!(msg.channel(19), None);
    }

    #[test]
    fn test_unknown_id_decodes_unknown() {
        let buf = [0u8; MAX_PAYLOAD_LEN];
        assert_eq!(decode(9999, &buf), MavMessage::Unknown(9999));
        assert_eq!(crc_extra(9999), None);
    }

    #[test]
    fn test_set_servo_params() {
        let cmd = CommandLong::set_servo(1, 1, 9, 1500);
        assert_eq!(cmd.command, MAV_CMD_DO_SET_SERVO);
        assert_eq!(cmd.params[0], 9.0);
        assert_eq!(cmd.params[1], 1500.0);
    }
}
