use super::*;
use crate::dataset::bits::{Keyframe, RgbKeyframe, RgbTrack, Track};
use crate::foundation::core::Rgb8;

fn scenario() -> DataSet {
    DataSet {
        bits: AnimationBits {
            palette: vec![Rgb8::new(255, 48, 0)],
            ..AnimationBits::default()
        },
        animations: vec![Animation::Simple {
            duration: 3000,
            face_mask: 0xFFFFF,
            color_index: 0,
            count: 1,
            fade: 26,
        }],
        ..DataSet::default()
    }
}

fn mixed() -> DataSet {
    DataSet {
        bits: AnimationBits {
            palette: vec![Rgb8::new(1, 2, 3), Rgb8::new(4, 5, 6)],
            rgb_keyframes: vec![
                RgbKeyframe::new(0, 0).unwrap(),
                RgbKeyframe::new(100, 1).unwrap(),
            ],
            rgb_tracks: vec![RgbTrack {
                keyframes_offset: 0,
                keyframe_count: 2,
                led_mask: 0b11,
            }],
            keyframes: vec![Keyframe::new(40, 200).unwrap()],
            tracks: vec![Track {
                keyframes_offset: 0,
                keyframe_count: 1,
                led_mask: 1,
            }],
        },
        animations: vec![
            Animation::Rainbow {
                duration: 1000,
                face_mask: 1,
                count: 2,
                fade: 3,
            },
            Animation::GradientPattern {
                duration: 2000,
                special_color: 0,
                tracks_offset: 0,
                track_count: 1,
                gradient_track_offset: 0,
            },
            Animation::Gradient {
                duration: 500,
                face_mask: 2,
                gradient_track_offset: 0,
            },
        ],
        conditions: vec![
            Condition::FaceCompare {
                face_index: 19,
                flags: 2,
            },
            Condition::Idle {
                repeat_period_ms: 0x1234,
            },
        ],
        actions: vec![
            Action::PlayAnimation {
                anim_index: 2,
                face_index: 0,
                loop_count: 1,
            },
            Action::PlayAudioClip { clip_id: 0xBEEF },
            Action::PlayAnimation {
                anim_index: 0,
                face_index: 5,
                loop_count: 3,
            },
        ],
        rules: vec![
            Rule {
                condition: 0,
                actions_offset: 0,
                action_count: 1,
            },
            Rule {
                condition: 1,
                actions_offset: 1,
                action_count: 2,
            },
        ],
        behavior: Behavior {
            rules_offset: 0,
            rule_count: 2,
        },
    }
}

#[test]
fn scenario_dataset_bytes_are_exact() {
    let bytes = write_dataset(&scenario());
    assert_eq!(
        bytes,
        vec![
            0xFF, 0x30, 0x00, 0x00, // palette + pad
            0x00, 0x00, 0x00, 0x00, // animation offsets + pad
            0x01, 0x00, 0xB8, 0x0B, // simple header, 3000 ms
            0xFF, 0xFF, 0x0F, 0x00, // face mask
            0x00, 0x00, 0x01, 0x1A, // color index, count, fade
            0x00, 0x00, 0x00, 0x00, // behavior
        ]
    );
    assert_eq!(compute_size(&scenario()), bytes.len());
}

#[test]
fn sections_follow_fixed_order() {
    let ds = mixed();
    ds.validate().unwrap();
    let bytes = write_dataset(&ds);
    assert_eq!(bytes.len(), compute_size(&ds));

    // palette: 6 bytes padded to 8
    assert_eq!(&bytes[0..8], &[1, 2, 3, 4, 5, 6, 0, 0]);
    // rgb keyframes
    assert_eq!(&bytes[8..10], &0u16.to_le_bytes());
    assert_eq!(&bytes[10..12], &((5u16 << 7) | 1).to_le_bytes());
    // rgb track
    assert_eq!(&bytes[12..20], &[0, 0, 2, 0, 3, 0, 0, 0]);
    // grayscale keyframe then track
    assert_eq!(&bytes[20..22], &((2u16 << 7) | 100).to_le_bytes());
    assert_eq!(&bytes[22..30], &[0, 0, 1, 0, 1, 0, 0, 0]);
    // animation offsets: 0, 10, 22, then pad
    assert_eq!(&bytes[30..38], &[0, 0, 10, 0, 22, 0, 0, 0]);
    // first animation header is rainbow
    assert_eq!(bytes[38], 2);
    let conditions_at = 38 + 10 + 12 + 12;
    // condition offsets (2 entries, no pad) then face compare record
    assert_eq!(
        &bytes[conditions_at..conditions_at + 8],
        &[0, 0, 4, 0, 4, 19, 2, 0]
    );
    assert_eq!(
        &bytes[conditions_at + 8..conditions_at + 12],
        &[8, 0, 0x34, 0x12]
    );
    let actions_at = conditions_at + 12;
    assert_eq!(&bytes[actions_at..actions_at + 8], &[0, 0, 4, 0, 8, 0, 0, 0]);
    assert_eq!(&bytes[actions_at + 8..actions_at + 12], &[1, 2, 0, 1]);
    assert_eq!(
        &bytes[actions_at + 12..actions_at + 16],
        &[2, 0, 0xEF, 0xBE]
    );
    let rules_at = actions_at + 8 + 12;
    assert_eq!(
        &bytes[rules_at..rules_at + 12],
        &[0, 0, 0, 0, 1, 0, 1, 0, 1, 0, 2, 0]
    );
    assert_eq!(&bytes[rules_at + 12..], &[0, 0, 2, 0]);
}

#[test]
fn empty_dataset_is_just_a_behavior() {
    let ds = DataSet::default();
    assert_eq!(write_dataset(&ds), vec![0, 0, 0, 0]);
    assert_eq!(compute_size(&ds), 4);
}

#[test]
fn compute_size_tracks_every_record_variant() {
    let mut ds = mixed();
    ds.animations.push(Animation::Keyframed {
        duration: 1,
        special_color: 2,
        tracks_offset: 0,
        track_count: 1,
    });
    ds.animations.push(Animation::FadeCandy {
        duration: 1,
        face_mask: 1,
        gradient_track_offset: 0,
        radius_inner: 1,
        radius_outer: 2,
    });
    for c in [
        Condition::HelloGoodbye { flags: 3 },
        Condition::Handling,
        Condition::Rolling {
            repeat_period_ms: 10,
        },
        Condition::Crooked,
        Condition::ConnectionState { flags: 1 },
        Condition::BatteryState {
            flags: 8,
            repeat_period_ms: 1,
        },
    ] {
        ds.conditions.push(c);
    }
    assert_eq!(write_dataset(&ds).len(), compute_size(&ds));
}

#[test]
fn test_animation_buffer_is_pools_then_record() {
    let ds = scenario();
    let bytes = write_test_animation(&ds).unwrap();
    assert_eq!(bytes.len(), 4 + 12);
    assert_eq!(bytes.len(), compute_test_animation_size(&ds).unwrap());
    assert_eq!(&bytes[4..8], &[0x01, 0x00, 0xB8, 0x0B]);
}

#[test]
fn test_animation_buffer_requires_one_animation() {
    assert!(write_test_animation(&mixed()).is_err());
    assert!(compute_test_animation_size(&DataSet::default()).is_err());
}
