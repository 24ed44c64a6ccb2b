//! Shared pools ("animation bits") and their packed keyframe/track records.

use crate::foundation::core::{Rgb8, round_up_to_4};
use crate::foundation::error::{PixelsError, PixelsResult};

/// Keyframe times are stored in units of this many milliseconds.
pub const TIME_STEP_MS: u16 = 20;

/// Largest representable keyframe time (511 steps).
pub const MAX_KEYFRAME_TIME_MS: u16 = 0x1FF * TIME_STEP_MS;

/// Number of literal palette slots (indices `0..126`).
pub const MAX_PALETTE_COLORS: usize = 126;

/// Color index resolved on the die to a random color.
pub const PALETTE_INDEX_RANDOM: u8 = 126;

/// Color index resolved on the die to the current face color.
pub const PALETTE_INDEX_FACE: u8 = 127;

/// Packed size of [`RgbTrack`] and [`Track`].
pub const TRACK_RECORD_SIZE: usize = 8;

/// Packed size of [`RgbKeyframe`] and [`Keyframe`].
pub const KEYFRAME_RECORD_SIZE: usize = 2;

fn pack_time(time_ms: u16) -> PixelsResult<u16> {
    if time_ms > MAX_KEYFRAME_TIME_MS {
        return Err(PixelsError::validation(format!(
            "keyframe time {time_ms} ms exceeds {MAX_KEYFRAME_TIME_MS} ms"
        )));
    }
    Ok(((time_ms / TIME_STEP_MS) & 0x1FF) << 7)
}

/// Color keyframe: 9 bits of time (20 ms units) over 7 bits of palette index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RgbKeyframe(pub u16);

impl RgbKeyframe {
    /// Pack a time and palette index. Times are truncated to the 20 ms grid.
    pub fn new(time_ms: u16, color_index: u8) -> PixelsResult<Self> {
        if color_index > PALETTE_INDEX_FACE {
            return Err(PixelsError::validation(format!(
                "color index {color_index} does not fit in 7 bits"
            )));
        }
        Ok(Self(pack_time(time_ms)? | u16::from(color_index)))
    }

    /// Time in milliseconds.
    pub fn time_ms(self) -> u16 {
        ((self.0 & 0xFF80) >> 7) * TIME_STEP_MS
    }

    /// Palette index, or one of the runtime-resolved indices.
    pub fn color_index(self) -> u8 {
        (self.0 & 0x7F) as u8
    }
}

/// Intensity keyframe: 9 bits of time over 7 bits of half-intensity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Keyframe(pub u16);

impl Keyframe {
    /// Pack a time and an 8-bit intensity; the lowest intensity bit is dropped.
    pub fn new(time_ms: u16, intensity: u8) -> PixelsResult<Self> {
        Ok(Self(pack_time(time_ms)? | u16::from(intensity / 2)))
    }

    /// Time in milliseconds.
    pub fn time_ms(self) -> u16 {
        ((self.0 & 0xFF80) >> 7) * TIME_STEP_MS
    }

    /// Intensity, always even.
    pub fn intensity(self) -> u8 {
        ((self.0 & 0x7F) * 2) as u8
    }
}

/// Color curve: a slice of the RGB keyframe pool plus the LEDs it drives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RgbTrack {
    /// Index of the first keyframe in [`AnimationBits::rgb_keyframes`].
    pub keyframes_offset: u16,
    /// Number of keyframes.
    pub keyframe_count: u8,
    /// Bit `i` set when LED `i` follows this track.
    pub led_mask: u32,
}

/// Intensity curve: a slice of the grayscale keyframe pool plus the LEDs it drives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Track {
    /// Index of the first keyframe in [`AnimationBits::keyframes`].
    pub keyframes_offset: u16,
    /// Number of keyframes.
    pub keyframe_count: u8,
    /// Bit `i` set when LED `i` follows this track.
    pub led_mask: u32,
}

/// The five append-only pools every other record points into.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnimationBits {
    /// Distinct palette colors.
    pub palette: Vec<Rgb8>,
    /// Color keyframes.
    pub rgb_keyframes: Vec<RgbKeyframe>,
    /// Color tracks.
    pub rgb_tracks: Vec<RgbTrack>,
    /// Intensity keyframes.
    pub keyframes: Vec<Keyframe>,
    /// Intensity tracks.
    pub tracks: Vec<Track>,
}

impl AnimationBits {
    /// Palette size in bytes as stored: RGB triplets padded to 4 bytes.
    pub fn palette_size(&self) -> usize {
        round_up_to_4(self.palette.len() * 3)
    }

    /// Check every track's keyframe range against the pools.
    pub fn validate(&self) -> PixelsResult<()> {
        if self.palette.len() > MAX_PALETTE_COLORS {
            return Err(PixelsError::validation(format!(
                "palette holds {} colors, at most {MAX_PALETTE_COLORS} allowed",
                self.palette.len()
            )));
        }
        for (i, t) in self.rgb_tracks.iter().enumerate() {
            check_range(
                "rgb track",
                i,
                t.keyframes_offset,
                u16::from(t.keyframe_count),
                self.rgb_keyframes.len(),
            )?;
        }
        for (i, t) in self.tracks.iter().enumerate() {
            check_range(
                "track",
                i,
                t.keyframes_offset,
                u16::from(t.keyframe_count),
                self.keyframes.len(),
            )?;
        }
        for (i, k) in self.rgb_keyframes.iter().enumerate() {
            let c = k.color_index();
            if c < PALETTE_INDEX_RANDOM && usize::from(c) >= self.palette.len() {
                return Err(PixelsError::validation(format!(
                    "rgb keyframe {i} references palette slot {c} of {}",
                    self.palette.len()
                )));
            }
        }
        Ok(())
    }
}

/// Validate an `(offset, count)` reference against a pool length.
pub(crate) fn check_range(
    what: &str,
    index: usize,
    offset: u16,
    count: u16,
    pool_len: usize,
) -> PixelsResult<()> {
    let end = usize::from(offset) + usize::from(count);
    if end > pool_len {
        return Err(PixelsError::validation(format!(
            "{what} {index} references [{offset}, {end}) past pool length {pool_len}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/dataset/bits.rs"]
mod tests;
