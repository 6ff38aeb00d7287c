//! Joystick response curve.

/// Exponential response with a dead zone.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResponseCurve {
    pub exponent: f32,
    pub dead_zone: f32,
}

impl ResponseCurve {
    /// Linear response, no dead zone.
    pub const DEFAULT: Self = Self {
        exponent: 1.0,
        dead_zone: 0.0,
    };

    #[inline]
    #[must_use]
    pub fn apply(&self, raw: f32) -> f32 {
        normalize(raw, self.exponent, self.dead_zone)
    }
}

impl Default for ResponseCurve {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Shape a raw axis sample.
///
/// Samples with `|raw| < dead_zone` become 0. Everything else maps to
/// `sign(raw) * |raw|^exponent`, so the sign is preserved and a deflection of
/// exactly 1 stays 1 for any exponent. Odd configuration (a zero or negative
/// exponent, a negative dead zone) yields an odd curve, never a panic.
#[must_use]
pub fn normalize(raw: f32, exponent: f32, dead_zone: f32) -> f32 {
    let magnitude = raw.abs();
    if magnitude < dead_zone || raw == 0.0 {
        return 0.0;
    }
    let shaped = magnitude.powf(exponent);
    if raw.is_sign_negative() {
        -shaped
    } else {
        shaped
    }
}
