use crate::dataset::bits::{AnimationBits, check_range};
use crate::foundation::error::PixelsResult;

/// Size of the header shared by every animation record.
pub const ANIMATION_HEADER_SIZE: usize = 4;

/// Wire discriminant of an animation record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AnimationType {
    /// Placeholder, never emitted by the compiler.
    Unknown = 0,
    /// [`Animation::Simple`].
    Simple = 1,
    /// [`Animation::Rainbow`].
    Rainbow = 2,
    /// [`Animation::Keyframed`].
    Keyframed = 3,
    /// [`Animation::GradientPattern`].
    GradientPattern = 4,
    /// [`Animation::Gradient`].
    Gradient = 5,
    /// [`Animation::FadeCandy`].
    FadeCandy = 6,
}

/// A compiled animation record.
///
/// Every variant carries its duration in milliseconds; pool references are indices into the
/// dataset's [`AnimationBits`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Animation {
    /// One color flashed `count` times on the selected faces.
    Simple {
        /// Length in milliseconds.
        duration: u16,
        /// Face bitmask.
        face_mask: u32,
        /// Palette slot of the flash color.
        color_index: u16,
        /// Number of flashes.
        count: u8,
        /// Fade sharpness, 0..=255.
        fade: u8,
    },
    /// Color wheel on the selected faces.
    Rainbow {
        /// Length in milliseconds.
        duration: u16,
        /// Face bitmask.
        face_mask: u32,
        /// Number of cycles.
        count: u8,
        /// Fade sharpness, 0..=255.
        fade: u8,
    },
    /// Several color tracks, each driving its own LEDs.
    Keyframed {
        /// Length in milliseconds.
        duration: u16,
        /// Runtime color substitution.
        special_color: u8,
        /// First track in [`AnimationBits::rgb_tracks`].
        tracks_offset: u16,
        /// Number of tracks.
        track_count: u16,
    },
    /// Intensity tracks modulating one color track.
    GradientPattern {
        /// Length in milliseconds.
        duration: u16,
        /// Runtime color substitution.
        special_color: u8,
        /// First track in [`AnimationBits::tracks`].
        tracks_offset: u16,
        /// Number of tracks.
        track_count: u16,
        /// Color track in [`AnimationBits::rgb_tracks`].
        gradient_track_offset: u16,
    },
    /// One color track on the selected faces.
    Gradient {
        /// Length in milliseconds.
        duration: u16,
        /// Face bitmask.
        face_mask: u32,
        /// Color track in [`AnimationBits::rgb_tracks`].
        gradient_track_offset: u16,
    },
    /// Radial sweep of one color track.
    FadeCandy {
        /// Length in milliseconds.
        duration: u16,
        /// Face bitmask.
        face_mask: u32,
        /// Color track in [`AnimationBits::rgb_tracks`].
        gradient_track_offset: u16,
        /// Inner radius, 0..=255.
        radius_inner: u8,
        /// Outer radius, 0..=255.
        radius_outer: u8,
    },
}

impl Animation {
    /// Wire discriminant.
    pub fn kind(&self) -> AnimationType {
        match self {
            Animation::Simple { .. } => AnimationType::Simple,
            Animation::Rainbow { .. } => AnimationType::Rainbow,
            Animation::Keyframed { .. } => AnimationType::Keyframed,
            Animation::GradientPattern { .. } => AnimationType::GradientPattern,
            Animation::Gradient { .. } => AnimationType::Gradient,
            Animation::FadeCandy { .. } => AnimationType::FadeCandy,
        }
    }

    /// Length in milliseconds.
    pub fn duration(&self) -> u16 {
        match *self {
            Animation::Simple { duration, .. }
            | Animation::Rainbow { duration, .. }
            | Animation::Keyframed { duration, .. }
            | Animation::GradientPattern { duration, .. }
            | Animation::Gradient { duration, .. }
            | Animation::FadeCandy { duration, .. } => duration,
        }
    }

    /// Packed record size in bytes, header included.
    pub fn record_size(&self) -> usize {
        ANIMATION_HEADER_SIZE
            + match self {
                Animation::Rainbow { .. } => 6,
                Animation::Simple { .. }
                | Animation::Keyframed { .. }
                | Animation::GradientPattern { .. }
                | Animation::Gradient { .. }
                | Animation::FadeCandy { .. } => 8,
            }
    }

    pub(crate) fn validate(&self, index: usize, bits: &AnimationBits) -> PixelsResult<()> {
        match *self {
            Animation::Simple { color_index, .. } => check_range(
                "simple animation color of animation",
                index,
                color_index,
                1,
                bits.palette.len(),
            ),
            Animation::Rainbow { .. } => Ok(()),
            Animation::Keyframed {
                tracks_offset,
                track_count,
                ..
            } => check_range(
                "rgb tracks of animation",
                index,
                tracks_offset,
                track_count,
                bits.rgb_tracks.len(),
            ),
            Animation::GradientPattern {
                tracks_offset,
                track_count,
                gradient_track_offset,
                ..
            } => {
                check_range(
                    "tracks of animation",
                    index,
                    tracks_offset,
                    track_count,
                    bits.tracks.len(),
                )?;
                check_range(
                    "gradient track of animation",
                    index,
                    gradient_track_offset,
                    1,
                    bits.rgb_tracks.len(),
                )
            }
            Animation::Gradient {
                gradient_track_offset,
                ..
            }
            | Animation::FadeCandy {
                gradient_track_offset,
                ..
            } => check_range(
                "gradient track of animation",
                index,
                gradient_track_offset,
                1,
                bits.rgb_tracks.len(),
            ),
        }
    }
}
