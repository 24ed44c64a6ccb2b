use crate::authoring::model::{
    EditAction, EditAnimation, EditAnimationKind, EditBehavior, EditColor, EditCondition,
    EditDataSet, EditGradient, EditRgbGradient,
};
use crate::dataset::DataSet;
use crate::dataset::animation::Animation;
use crate::dataset::behavior::{
    Action, Behavior, Condition, Rule, battery_state, connection_state, face_compare,
    hello_goodbye,
};
use crate::dataset::bits::{
    AnimationBits, Keyframe, MAX_PALETTE_COLORS, PALETTE_INDEX_FACE, PALETTE_INDEX_RANDOM,
    RgbKeyframe, RgbTrack, Track,
};
use crate::foundation::core::{
    ALL_FACES, LED_COUNT, Rgb8, led_mask, seconds_to_millis, unit_to_byte,
};
use crate::foundation::error::{PixelsError, PixelsResult};

/// Flatten an authoring graph into a runtime dataset.
///
/// Pools are appended in authoring order, so the same graph always yields the same dataset.
/// The result is validated before it is returned.
#[tracing::instrument(skip(graph), fields(animations = graph.animations.len()))]
pub fn compile(graph: &EditDataSet) -> PixelsResult<DataSet> {
    let mut b = BitsBuilder::default();
    let mut animations = Vec::with_capacity(graph.animations.len());
    for (i, anim) in graph.animations.iter().enumerate() {
        let compiled = b
            .animation(anim)
            .map_err(|e| PixelsError::compile(format!("animation {i} ('{}'): {e}", anim.name)))?;
        animations.push(compiled);
    }

    let mut ds = DataSet {
        bits: b.finish(),
        animations,
        ..DataSet::default()
    };
    if let Some(behavior) = &graph.behavior {
        compile_behavior(behavior, graph.animations.len(), &mut ds)?;
    }

    ds.validate()
        .map_err(|e| PixelsError::compile(e.to_string()))?;
    tracing::debug!(
        palette = ds.bits.palette.len(),
        rgb_keyframes = ds.bits.rgb_keyframes.len(),
        keyframes = ds.bits.keyframes.len(),
        rules = ds.rules.len(),
        "compiled dataset"
    );
    Ok(ds)
}

/// Compile a single animation into a one-animation dataset with no behavior.
///
/// This is the payload of the test-animation preview flow.
pub fn compile_test_animation(anim: &EditAnimation) -> PixelsResult<DataSet> {
    let mut b = BitsBuilder::default();
    let compiled = b
        .animation(anim)
        .map_err(|e| PixelsError::compile(format!("animation '{}': {e}", anim.name)))?;
    let ds = DataSet {
        bits: b.finish(),
        animations: vec![compiled],
        ..DataSet::default()
    };
    ds.validate()
        .map_err(|e| PixelsError::compile(e.to_string()))?;
    Ok(ds)
}

fn to_u16(n: usize, what: &str) -> PixelsResult<u16> {
    u16::try_from(n).map_err(|_| PixelsError::compile(format!("{what} {n} exceeds 16 bits")))
}

fn to_u8(n: usize, what: &str) -> PixelsResult<u8> {
    u8::try_from(n).map_err(|_| PixelsError::compile(format!("{what} {n} exceeds 8 bits")))
}

#[derive(Default)]
struct BitsBuilder {
    bits: AnimationBits,
}

impl BitsBuilder {
    fn finish(self) -> AnimationBits {
        self.bits
    }

    /// First palette slot holding exactly `c`, appending it when absent.
    fn palette_index(&mut self, c: Rgb8) -> PixelsResult<u8> {
        if let Some(i) = self.bits.palette.iter().position(|p| *p == c) {
            return to_u8(i, "palette index");
        }
        if self.bits.palette.len() >= MAX_PALETTE_COLORS {
            return Err(PixelsError::compile(format!(
                "palette is full ({MAX_PALETTE_COLORS} colors)"
            )));
        }
        self.bits.palette.push(c);
        to_u8(self.bits.palette.len() - 1, "palette index")
    }

    fn color_index(&mut self, c: EditColor) -> PixelsResult<u8> {
        match c {
            EditColor::Rgb(rgb) => self.palette_index(rgb),
            EditColor::Random => Ok(PALETTE_INDEX_RANDOM),
            EditColor::Face => Ok(PALETTE_INDEX_FACE),
        }
    }

    /// Append a color track and return its index in the RGB track pool.
    fn rgb_track(&mut self, gradient: &EditRgbGradient, led_mask: u32) -> PixelsResult<u16> {
        let keyframes_offset = to_u16(self.bits.rgb_keyframes.len(), "rgb keyframe offset")?;
        let keyframe_count = to_u8(gradient.keyframes.len(), "rgb keyframe count")?;
        for k in &gradient.keyframes {
            let color = self.color_index(k.color)?;
            self.bits
                .rgb_keyframes
                .push(RgbKeyframe::new(seconds_to_millis(k.time)?, color)?);
        }
        let index = to_u16(self.bits.rgb_tracks.len(), "rgb track index")?;
        self.bits.rgb_tracks.push(RgbTrack {
            keyframes_offset,
            keyframe_count,
            led_mask,
        });
        Ok(index)
    }

    /// Append an intensity track and return its index in the grayscale track pool.
    fn track(&mut self, gradient: &EditGradient, led_mask: u32) -> PixelsResult<u16> {
        let keyframes_offset = to_u16(self.bits.keyframes.len(), "keyframe offset")?;
        let keyframe_count = to_u8(gradient.keyframes.len(), "keyframe count")?;
        for k in &gradient.keyframes {
            self.bits.keyframes.push(Keyframe::new(
                seconds_to_millis(k.time)?,
                unit_to_byte(k.intensity),
            )?);
        }
        let index = to_u16(self.bits.tracks.len(), "track index")?;
        self.bits.tracks.push(Track {
            keyframes_offset,
            keyframe_count,
            led_mask,
        });
        Ok(index)
    }

    fn animation(&mut self, anim: &EditAnimation) -> PixelsResult<Animation> {
        let duration = seconds_to_millis(anim.duration)?;
        Ok(match &anim.kind {
            EditAnimationKind::Simple {
                faces,
                color,
                count,
                fade,
            } => Animation::Simple {
                duration,
                face_mask: *faces,
                color_index: u16::from(self.palette_index(*color)?),
                count: *count,
                fade: unit_to_byte(*fade),
            },
            EditAnimationKind::Rainbow { faces, count, fade } => Animation::Rainbow {
                duration,
                face_mask: *faces,
                count: *count,
                fade: unit_to_byte(*fade),
            },
            EditAnimationKind::Gradient { faces, gradient } => Animation::Gradient {
                duration,
                face_mask: *faces,
                gradient_track_offset: self.rgb_track(gradient, *faces)?,
            },
            EditAnimationKind::GradientPattern {
                special_color,
                pattern,
                gradient,
            } => {
                if pattern.gradients.len() > LED_COUNT {
                    return Err(PixelsError::compile(format!(
                        "pattern has {} curves, die has {LED_COUNT} LEDs",
                        pattern.gradients.len()
                    )));
                }
                let tracks_offset = to_u16(self.bits.tracks.len(), "track offset")?;
                for (led, g) in pattern.gradients.iter().enumerate() {
                    self.track(g, 1 << led)?;
                }
                Animation::GradientPattern {
                    duration,
                    special_color: special_color.to_u8(),
                    tracks_offset,
                    track_count: to_u16(pattern.gradients.len(), "track count")?,
                    gradient_track_offset: self.rgb_track(gradient, ALL_FACES)?,
                }
            }
            EditAnimationKind::Keyframed {
                special_color,
                tracks,
            } => {
                let tracks_offset = to_u16(self.bits.rgb_tracks.len(), "rgb track offset")?;
                for t in tracks {
                    self.rgb_track(&t.gradient, led_mask(&t.leds)?)?;
                }
                Animation::Keyframed {
                    duration,
                    special_color: special_color.to_u8(),
                    tracks_offset,
                    track_count: to_u16(tracks.len(), "rgb track count")?,
                }
            }
            EditAnimationKind::FadeCandy {
                faces,
                gradient,
                radius_inner,
                radius_outer,
            } => Animation::FadeCandy {
                duration,
                face_mask: *faces,
                gradient_track_offset: self.rgb_track(gradient, *faces)?,
                radius_inner: unit_to_byte(*radius_inner),
                radius_outer: unit_to_byte(*radius_outer),
            },
        })
    }
}

fn compile_behavior(
    behavior: &EditBehavior,
    animation_count: usize,
    ds: &mut DataSet,
) -> PixelsResult<()> {
    let rules_offset = to_u16(ds.rules.len(), "rule offset")?;
    for (i, rule) in behavior.rules.iter().enumerate() {
        if rule.actions.is_empty() {
            return Err(PixelsError::compile(format!("rule {i} has no actions")));
        }
        let condition = to_u16(ds.conditions.len(), "condition index")?;
        ds.conditions.push(
            compile_condition(&rule.condition)
                .map_err(|e| PixelsError::compile(format!("rule {i}: {e}")))?,
        );

        let actions_offset = to_u16(ds.actions.len(), "action offset")?;
        for action in &rule.actions {
            let compiled = compile_action(action, animation_count)
                .map_err(|e| PixelsError::compile(format!("rule {i}: {e}")))?;
            ds.actions.push(compiled);
        }
        ds.rules.push(Rule {
            condition,
            actions_offset,
            action_count: to_u16(rule.actions.len(), "action count")?,
        });
    }
    ds.behavior = Behavior {
        rules_offset,
        rule_count: to_u16(behavior.rules.len(), "rule count")?,
    };
    Ok(())
}

fn flag(on: bool, bit: u8) -> u8 {
    if on { bit } else { 0 }
}

fn compile_condition(c: &EditCondition) -> PixelsResult<Condition> {
    Ok(match *c {
        EditCondition::HelloGoodbye { hello, goodbye } => Condition::HelloGoodbye {
            flags: flag(hello, hello_goodbye::HELLO) | flag(goodbye, hello_goodbye::GOODBYE),
        },
        EditCondition::Handling => Condition::Handling,
        EditCondition::Rolling { repeat_period } => Condition::Rolling {
            repeat_period_ms: seconds_to_millis(repeat_period)?,
        },
        EditCondition::FaceCompare {
            face_index,
            less,
            equal,
            greater,
        } => Condition::FaceCompare {
            face_index,
            flags: flag(less, face_compare::LESS)
                | flag(equal, face_compare::EQUAL)
                | flag(greater, face_compare::GREATER),
        },
        EditCondition::Crooked => Condition::Crooked,
        EditCondition::ConnectionState {
            connected,
            disconnected,
        } => Condition::ConnectionState {
            flags: flag(connected, connection_state::CONNECTED)
                | flag(disconnected, connection_state::DISCONNECTED),
        },
        EditCondition::BatteryState {
            ok,
            low,
            charging,
            done,
            repeat_period,
        } => Condition::BatteryState {
            flags: flag(ok, battery_state::OK)
                | flag(low, battery_state::LOW)
                | flag(charging, battery_state::CHARGING)
                | flag(done, battery_state::DONE),
            repeat_period_ms: seconds_to_millis(repeat_period)?,
        },
        EditCondition::Idle { repeat_period } => Condition::Idle {
            repeat_period_ms: seconds_to_millis(repeat_period)?,
        },
    })
}

fn compile_action(a: &EditAction, animation_count: usize) -> PixelsResult<Action> {
    match *a {
        EditAction::PlayAnimation {
            animation,
            face_index,
            loop_count,
        } => {
            if animation >= animation_count {
                return Err(PixelsError::compile(format!(
                    "action plays animation {animation}, only {animation_count} exist"
                )));
            }
            Ok(Action::PlayAnimation {
                anim_index: to_u8(animation, "animation index")?,
                face_index,
                loop_count,
            })
        }
        EditAction::PlayAudioClip { clip_id } => Ok(Action::PlayAudioClip { clip_id }),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/compile/compiler.rs"]
mod tests;
