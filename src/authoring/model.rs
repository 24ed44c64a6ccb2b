//! Authoring-time object graph consumed by the compiler.
//!
//! These types mirror what an editor manipulates: times in seconds, intensities as unit floats,
//! colors as plain RGB. Cross-references are indices (an action names the animation it plays by
//! its position in [`EditDataSet::animations`]).

use crate::foundation::core::Rgb8;

/// Root of an authoring graph: the animation list plus an optional behavior.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EditDataSet {
    /// Animations in authoring order; their index is the runtime animation index.
    #[serde(default)]
    pub animations: Vec<EditAnimation>,
    /// Reactive program; `None` compiles to an empty behavior.
    #[serde(default)]
    pub behavior: Option<EditBehavior>,
}

/// One authored animation preset.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EditAnimation {
    /// Display name, not transmitted.
    #[serde(default)]
    pub name: String,
    /// Length in seconds.
    pub duration: f32,
    /// Variant-specific parameters.
    #[serde(flatten)]
    pub kind: EditAnimationKind,
}

/// Variant-specific animation parameters.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditAnimationKind {
    /// Flash the selected faces with one color.
    Simple {
        /// Face bitmask.
        faces: u32,
        /// Flash color.
        color: Rgb8,
        /// Number of flashes.
        count: u8,
        /// Fade sharpness in `[0, 1]`.
        fade: f32,
    },
    /// Cycle the selected faces through the color wheel.
    Rainbow {
        /// Face bitmask.
        faces: u32,
        /// Number of cycles.
        count: u8,
        /// Fade sharpness in `[0, 1]`.
        fade: f32,
    },
    /// Play one color gradient on the selected faces.
    Gradient {
        /// Face bitmask.
        faces: u32,
        /// Color over time.
        gradient: EditRgbGradient,
    },
    /// Modulate a color gradient with a per-LED intensity pattern.
    GradientPattern {
        /// Runtime color override.
        #[serde(default)]
        special_color: SpecialColor,
        /// Per-LED intensity curves.
        pattern: EditPattern,
        /// Color over time.
        gradient: EditRgbGradient,
    },
    /// Explicit color keyframes per group of LEDs.
    Keyframed {
        /// Runtime color override.
        #[serde(default)]
        special_color: SpecialColor,
        /// LED groups and their gradients.
        tracks: Vec<EditRgbTrack>,
    },
    /// Radial gradient sweep across the selected faces.
    FadeCandy {
        /// Face bitmask.
        faces: u32,
        /// Color over time.
        gradient: EditRgbGradient,
        /// Inner radius in `[0, 1]`.
        radius_inner: f32,
        /// Outer radius in `[0, 1]`.
        radius_outer: f32,
    },
}

/// Runtime substitution applied to keyframed colors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialColor {
    /// Use the authored colors.
    #[default]
    None,
    /// Use the current face color.
    Face,
    /// Rotate through the color wheel.
    ColorWheel,
    /// Current heat color.
    HeatCurrent,
    /// Heat color at animation start.
    HeatStart,
}

impl SpecialColor {
    /// Wire value.
    pub fn to_u8(self) -> u8 {
        match self {
            SpecialColor::None => 0,
            SpecialColor::Face => 1,
            SpecialColor::ColorWheel => 2,
            SpecialColor::HeatCurrent => 3,
            SpecialColor::HeatStart => 4,
        }
    }
}

/// Color as authored on a keyframe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditColor {
    /// Literal color, stored in the palette.
    Rgb(Rgb8),
    /// Resolved on the die to a random color.
    Random,
    /// Resolved on the die to the current face color.
    Face,
}

/// RGB keyframe: time in seconds plus color.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EditRgbKeyframe {
    /// Seconds from animation start.
    pub time: f32,
    /// Color at that time.
    pub color: EditColor,
}

/// Color curve over time.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EditRgbGradient {
    /// Keyframes in time order.
    #[serde(default)]
    pub keyframes: Vec<EditRgbKeyframe>,
}

/// Grayscale keyframe: time in seconds plus intensity in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EditKeyframe {
    /// Seconds from animation start.
    pub time: f32,
    /// Brightness in `[0, 1]`.
    pub intensity: f32,
}

/// Intensity curve over time.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EditGradient {
    /// Keyframes in time order.
    #[serde(default)]
    pub keyframes: Vec<EditKeyframe>,
}

/// One intensity curve per LED; curve `i` drives LED `i`.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EditPattern {
    /// Per-LED curves.
    #[serde(default)]
    pub gradients: Vec<EditGradient>,
}

/// A gradient assigned to a set of LEDs.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EditRgbTrack {
    /// LED indices driven by this track.
    #[serde(default)]
    pub leds: Vec<u8>,
    /// Color over time.
    pub gradient: EditRgbGradient,
}

/// A die's reactive program.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EditBehavior {
    /// Display name, not transmitted.
    #[serde(default)]
    pub name: String,
    /// Rules in evaluation order.
    #[serde(default)]
    pub rules: Vec<EditRule>,
}

/// One condition paired with the actions it triggers.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EditRule {
    /// Trigger.
    pub condition: EditCondition,
    /// Actions run when the trigger fires; must not be empty.
    pub actions: Vec<EditAction>,
}

/// Rule trigger.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditCondition {
    /// Die wakes up or goes to sleep.
    HelloGoodbye {
        /// Fire on wake.
        #[serde(default)]
        hello: bool,
        /// Fire on sleep.
        #[serde(default)]
        goodbye: bool,
    },
    /// Die is picked up.
    Handling,
    /// Die is rolling.
    Rolling {
        /// Re-trigger period in seconds while rolling.
        #[serde(default)]
        repeat_period: f32,
    },
    /// Die settled on a face compared against `face_index`.
    FaceCompare {
        /// Face the roll is compared with.
        face_index: u8,
        /// Fire when the rolled face is lower.
        #[serde(default)]
        less: bool,
        /// Fire when the rolled face is equal.
        #[serde(default)]
        equal: bool,
        /// Fire when the rolled face is higher.
        #[serde(default)]
        greater: bool,
    },
    /// Die landed crooked.
    Crooked,
    /// Bluetooth connection changed.
    ConnectionState {
        /// Fire on connect.
        #[serde(default)]
        connected: bool,
        /// Fire on disconnect.
        #[serde(default)]
        disconnected: bool,
    },
    /// Battery state changed.
    BatteryState {
        /// Fire when the battery is fine.
        #[serde(default)]
        ok: bool,
        /// Fire when the battery is low.
        #[serde(default)]
        low: bool,
        /// Fire while charging.
        #[serde(default)]
        charging: bool,
        /// Fire when charging completes.
        #[serde(default)]
        done: bool,
        /// Re-trigger period in seconds.
        #[serde(default)]
        repeat_period: f32,
    },
    /// Nothing happened for a while.
    Idle {
        /// Re-trigger period in seconds.
        #[serde(default)]
        repeat_period: f32,
    },
}

/// Rule effect.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditAction {
    /// Play an animation from [`EditDataSet::animations`].
    PlayAnimation {
        /// Index into the authoring animation list.
        animation: usize,
        /// Face to remap the animation onto.
        #[serde(default)]
        face_index: u8,
        /// Number of repetitions.
        #[serde(default = "one")]
        loop_count: u8,
    },
    /// Play an audio clip stored on the companion device.
    PlayAudioClip {
        /// Clip identifier.
        clip_id: u16,
    },
}

fn one() -> u8 {
    1
}

#[cfg(test)]
#[path = "../../tests/unit/authoring/model.rs"]
mod tests;
