//! Byte-exact serialization of a [`DataSet`].
//!
//! Section order is fixed and must match the die's decoder:
//!
//! 1. palette (RGB triplets, padded to 4 bytes)
//! 2. RGB keyframes, RGB tracks, grayscale keyframes, grayscale tracks
//! 3. animation offset table (padded to 4 bytes) then animation records
//! 4. the same table-then-records pattern for conditions and actions
//! 5. rules
//! 6. one behavior record
//!
//! [`compute_size`] mirrors the writer without producing bytes. Both expect a dataset that passed
//! [`DataSet::validate`]; offsets are written as 16-bit values.

use crate::dataset::DataSet;
use crate::dataset::animation::Animation;
use crate::dataset::behavior::{
    ACTION_RECORD_SIZE, Action, BEHAVIOR_RECORD_SIZE, Behavior, CONDITION_RECORD_SIZE, Condition,
    RULE_RECORD_SIZE, Rule,
};
use crate::dataset::bits::{AnimationBits, KEYFRAME_RECORD_SIZE, TRACK_RECORD_SIZE};
use crate::foundation::bytes::ByteWriter;
use crate::foundation::core::round_up_to_4;
use crate::foundation::error::{PixelsError, PixelsResult};

/// Serialize a dataset into the buffer uploaded to the die.
pub fn write_dataset(ds: &DataSet) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(compute_size(ds));
    write_bits(&mut w, &ds.bits);
    write_table(&mut w, &ds.animations, Animation::record_size, write_animation);
    write_table(
        &mut w,
        &ds.conditions,
        |_| CONDITION_RECORD_SIZE,
        write_condition,
    );
    write_table(&mut w, &ds.actions, |_| ACTION_RECORD_SIZE, write_action);
    for rule in &ds.rules {
        write_rule(&mut w, rule);
    }
    write_behavior(&mut w, &ds.behavior);
    w.finish()
}

/// Exact length of [`write_dataset`]'s output.
pub fn compute_size(ds: &DataSet) -> usize {
    bits_size(&ds.bits)
        + table_size(ds.animations.len())
        + ds.animation_size()
        + table_size(ds.conditions.len())
        + ds.condition_size()
        + table_size(ds.actions.len())
        + ds.action_size()
        + ds.rules.len() * RULE_RECORD_SIZE
        + BEHAVIOR_RECORD_SIZE
}

/// Serialize a one-animation dataset as a preview buffer: the pools followed by the animation
/// record, without offset tables or behavior.
pub fn write_test_animation(ds: &DataSet) -> PixelsResult<Vec<u8>> {
    let anim = single_animation(ds)?;
    let mut w = ByteWriter::with_capacity(bits_size(&ds.bits) + anim.record_size());
    write_bits(&mut w, &ds.bits);
    write_animation(&mut w, anim);
    Ok(w.finish())
}

/// Exact length of [`write_test_animation`]'s output.
pub fn compute_test_animation_size(ds: &DataSet) -> PixelsResult<usize> {
    Ok(bits_size(&ds.bits) + single_animation(ds)?.record_size())
}

fn single_animation(ds: &DataSet) -> PixelsResult<&Animation> {
    match ds.animations.as_slice() {
        [anim] => Ok(anim),
        other => Err(PixelsError::validation(format!(
            "test animation buffer needs exactly one animation, got {}",
            other.len()
        ))),
    }
}

fn bits_size(bits: &AnimationBits) -> usize {
    bits.palette_size()
        + bits.rgb_keyframes.len() * KEYFRAME_RECORD_SIZE
        + bits.rgb_tracks.len() * TRACK_RECORD_SIZE
        + bits.keyframes.len() * KEYFRAME_RECORD_SIZE
        + bits.tracks.len() * TRACK_RECORD_SIZE
}

fn table_size(count: usize) -> usize {
    round_up_to_4(count * 2)
}

fn write_bits(w: &mut ByteWriter, bits: &AnimationBits) {
    for c in &bits.palette {
        w.u8(c.r);
        w.u8(c.g);
        w.u8(c.b);
    }
    w.pad_to_4();
    for k in &bits.rgb_keyframes {
        w.u16(k.0);
    }
    for t in &bits.rgb_tracks {
        write_track(w, t.keyframes_offset, t.keyframe_count, t.led_mask);
    }
    for k in &bits.keyframes {
        w.u16(k.0);
    }
    for t in &bits.tracks {
        write_track(w, t.keyframes_offset, t.keyframe_count, t.led_mask);
    }
}

fn write_track(w: &mut ByteWriter, keyframes_offset: u16, keyframe_count: u8, led_mask: u32) {
    w.u16(keyframes_offset);
    w.u8(keyframe_count);
    w.u8(0);
    w.u32(led_mask);
}

/// Offset table (running byte offsets from the first record) then the records.
fn write_table<T>(
    w: &mut ByteWriter,
    items: &[T],
    size: impl Fn(&T) -> usize,
    write: impl Fn(&mut ByteWriter, &T),
) {
    let mut offset = 0usize;
    for item in items {
        w.u16(offset as u16);
        offset += size(item);
    }
    // Entries are 2 bytes; an odd count leaves the table 2 bytes short of a 4-byte multiple.
    if items.len() % 2 == 1 {
        w.u16(0);
    }
    for item in items {
        write(w, item);
    }
}

fn write_animation(w: &mut ByteWriter, anim: &Animation) {
    w.u8(anim.kind() as u8);
    w.u8(0);
    w.u16(anim.duration());
    match *anim {
        Animation::Simple {
            face_mask,
            color_index,
            count,
            fade,
            ..
        } => {
            w.u32(face_mask);
            w.u16(color_index);
            w.u8(count);
            w.u8(fade);
        }
        Animation::Rainbow {
            face_mask,
            count,
            fade,
            ..
        } => {
            w.u32(face_mask);
            w.u8(count);
            w.u8(fade);
        }
        Animation::Keyframed {
            special_color,
            tracks_offset,
            track_count,
            ..
        } => {
            w.u8(special_color);
            w.u8(0);
            w.u16(tracks_offset);
            w.u16(track_count);
            w.u16(0);
        }
        Animation::GradientPattern {
            special_color,
            tracks_offset,
            track_count,
            gradient_track_offset,
            ..
        } => {
            w.u8(special_color);
            w.u8(0);
            w.u16(tracks_offset);
            w.u16(track_count);
            w.u16(gradient_track_offset);
        }
        Animation::Gradient {
            face_mask,
            gradient_track_offset,
            ..
        } => {
            w.u32(face_mask);
            w.u16(gradient_track_offset);
            w.u16(0);
        }
        Animation::FadeCandy {
            face_mask,
            gradient_track_offset,
            radius_inner,
            radius_outer,
            ..
        } => {
            w.u32(face_mask);
            w.u16(gradient_track_offset);
            w.u8(radius_inner);
            w.u8(radius_outer);
        }
    }
}

fn write_condition(w: &mut ByteWriter, c: &Condition) {
    w.u8(c.kind() as u8);
    match *c {
        Condition::HelloGoodbye { flags } | Condition::ConnectionState { flags } => {
            w.u8(flags);
            w.u16(0);
        }
        Condition::Handling | Condition::Crooked => {
            w.u8(0);
            w.u16(0);
        }
        Condition::Rolling { repeat_period_ms } | Condition::Idle { repeat_period_ms } => {
            w.u8(0);
            w.u16(repeat_period_ms);
        }
        Condition::FaceCompare { face_index, flags } => {
            w.u8(face_index);
            w.u8(flags);
            w.u8(0);
        }
        Condition::BatteryState {
            flags,
            repeat_period_ms,
        } => {
            w.u8(flags);
            w.u16(repeat_period_ms);
        }
    }
}

fn write_action(w: &mut ByteWriter, a: &Action) {
    w.u8(a.kind() as u8);
    match *a {
        Action::PlayAnimation {
            anim_index,
            face_index,
            loop_count,
        } => {
            w.u8(anim_index);
            w.u8(face_index);
            w.u8(loop_count);
        }
        Action::PlayAudioClip { clip_id } => {
            w.u8(0);
            w.u16(clip_id);
        }
    }
}

fn write_rule(w: &mut ByteWriter, r: &Rule) {
    w.u16(r.condition);
    w.u16(r.actions_offset);
    w.u16(r.action_count);
}

fn write_behavior(w: &mut ByteWriter, b: &Behavior) {
    w.u16(b.rules_offset);
    w.u16(b.rule_count);
}

#[cfg(test)]
#[path = "../../tests/unit/encode/writer.rs"]
mod tests;
