use crate::foundation::error::{PixelsError, PixelsResult};

/// Number of LEDs (and faces) on a standard die.
pub const LED_COUNT: usize = 20;

/// Face mask with every face of a standard die selected.
pub const ALL_FACES: u32 = (1 << LED_COUNT) - 1;

/// Opaque 8-bit RGB color.
///
/// Palette deduplication compares colors by exact channel equality.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Rgb8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb8 {
    /// Build a color from its three channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Pack as `0x00RRGGBB`, the form used by color-carrying messages.
    pub fn to_u32(self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }

    /// Inverse of [`Rgb8::to_u32`]; the top byte is ignored.
    pub fn from_u32(v: u32) -> Self {
        Self {
            r: (v >> 16) as u8,
            g: (v >> 8) as u8,
            b: v as u8,
        }
    }
}

/// Convert seconds to whole milliseconds, truncating.
///
/// Fails for NaN, negative values and anything that does not fit a `u16` field.
pub fn seconds_to_millis(secs: f32) -> PixelsResult<u16> {
    let ms = (secs * 1000.0).trunc();
    if !(0.0..=f32::from(u16::MAX)).contains(&ms) {
        return Err(PixelsError::validation(format!(
            "{secs} s does not fit a 16-bit millisecond field"
        )));
    }
    Ok(ms as u16)
}

/// Scale a unit value in `[0, 1]` to a byte, rounding to nearest.
pub fn unit_to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Round `n` up to the next multiple of 4.
pub fn round_up_to_4(n: usize) -> usize {
    (n + 3) & !3
}

/// Build a bitmask from LED indices, rejecting indices past the last LED.
pub fn led_mask(indices: &[u8]) -> PixelsResult<u32> {
    let mut mask = 0u32;
    for &i in indices {
        if usize::from(i) >= LED_COUNT {
            return Err(PixelsError::validation(format!(
                "LED index {i} out of range (die has {LED_COUNT} LEDs)"
            )));
        }
        mask |= 1 << i;
    }
    Ok(mask)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
