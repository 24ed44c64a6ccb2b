use super::*;
use crate::authoring::model::{
    EditKeyframe, EditPattern, EditRgbKeyframe, EditRgbTrack, EditRule, SpecialColor,
};

fn anim(duration: f32, kind: EditAnimationKind) -> EditAnimation {
    EditAnimation {
        name: String::new(),
        duration,
        kind,
    }
}

fn rgb_kf(time: f32, r: u8, g: u8, b: u8) -> EditRgbKeyframe {
    EditRgbKeyframe {
        time,
        color: EditColor::Rgb(Rgb8::new(r, g, b)),
    }
}

fn gradient(keyframes: Vec<EditRgbKeyframe>) -> EditRgbGradient {
    EditRgbGradient { keyframes }
}

#[test]
fn simple_animation_matches_reference_scenario() {
    let graph = EditDataSet {
        animations: vec![anim(
            3.0,
            EditAnimationKind::Simple {
                faces: ALL_FACES,
                color: Rgb8::new(255, 48, 0),
                count: 1,
                fade: 0.1,
            },
        )],
        behavior: None,
    };
    let ds = compile(&graph).unwrap();
    assert_eq!(ds.bits.palette, vec![Rgb8::new(255, 48, 0)]);
    assert_eq!(
        ds.animations,
        vec![Animation::Simple {
            duration: 3000,
            face_mask: 0xFFFFF,
            color_index: 0,
            count: 1,
            fade: 26,
        }]
    );
}

#[test]
fn identical_colors_share_one_palette_slot() {
    let graph = EditDataSet {
        animations: vec![
            anim(
                1.0,
                EditAnimationKind::Gradient {
                    faces: 1,
                    gradient: gradient(vec![rgb_kf(0.0, 10, 20, 30), rgb_kf(0.5, 1, 2, 3)]),
                },
            ),
            anim(
                1.0,
                EditAnimationKind::Gradient {
                    faces: 2,
                    gradient: gradient(vec![rgb_kf(0.0, 1, 2, 3), rgb_kf(0.2, 10, 20, 30)]),
                },
            ),
        ],
        behavior: None,
    };
    let ds = compile(&graph).unwrap();
    assert_eq!(ds.bits.palette.len(), 2);
    let indices: Vec<u8> = ds
        .bits
        .rgb_keyframes
        .iter()
        .map(|k| k.color_index())
        .collect();
    assert_eq!(indices, vec![0, 1, 1, 0]);
}

#[test]
fn runtime_colors_bypass_the_palette() {
    let graph = EditDataSet {
        animations: vec![anim(
            1.0,
            EditAnimationKind::Gradient {
                faces: 1,
                gradient: gradient(vec![
                    EditRgbKeyframe {
                        time: 0.0,
                        color: EditColor::Random,
                    },
                    EditRgbKeyframe {
                        time: 0.1,
                        color: EditColor::Face,
                    },
                ]),
            },
        )],
        behavior: None,
    };
    let ds = compile(&graph).unwrap();
    assert!(ds.bits.palette.is_empty());
    assert_eq!(ds.bits.rgb_keyframes[0].color_index(), 126);
    assert_eq!(ds.bits.rgb_keyframes[1].color_index(), 127);
}

#[test]
fn empty_gradient_yields_empty_track() {
    let graph = EditDataSet {
        animations: vec![
            anim(
                1.0,
                EditAnimationKind::Gradient {
                    faces: 1,
                    gradient: gradient(vec![rgb_kf(0.0, 1, 1, 1)]),
                },
            ),
            anim(
                1.0,
                EditAnimationKind::Gradient {
                    faces: 1,
                    gradient: EditRgbGradient::default(),
                },
            ),
        ],
        behavior: None,
    };
    let ds = compile(&graph).unwrap();
    assert_eq!(ds.bits.rgb_keyframes.len(), 1);
    assert_eq!(
        ds.bits.rgb_tracks[1],
        RgbTrack {
            keyframes_offset: 1,
            keyframe_count: 0,
            led_mask: 1,
        }
    );
}

#[test]
fn gradient_pattern_emits_one_track_per_led_and_a_color_track() {
    let curve = |i: f32| EditGradient {
        keyframes: vec![
            EditKeyframe {
                time: 0.0,
                intensity: 0.0,
            },
            EditKeyframe {
                time: 0.5,
                intensity: i,
            },
        ],
    };
    let graph = EditDataSet {
        animations: vec![anim(
            2.0,
            EditAnimationKind::GradientPattern {
                special_color: SpecialColor::Face,
                pattern: EditPattern {
                    gradients: vec![curve(1.0), curve(0.5), EditGradient::default()],
                },
                gradient: gradient(vec![rgb_kf(0.0, 9, 9, 9)]),
            },
        )],
        behavior: None,
    };
    let ds = compile(&graph).unwrap();
    assert_eq!(
        ds.animations[0],
        Animation::GradientPattern {
            duration: 2000,
            special_color: 1,
            tracks_offset: 0,
            track_count: 3,
            gradient_track_offset: 0,
        }
    );
    let masks: Vec<u32> = ds.bits.tracks.iter().map(|t| t.led_mask).collect();
    assert_eq!(masks, vec![1, 2, 4]);
    assert_eq!(ds.bits.keyframes.len(), 4);
    assert_eq!(ds.bits.keyframes[1].intensity(), 254);
    assert_eq!(ds.bits.keyframes[3].intensity(), 128);
    assert_eq!(ds.bits.tracks[2].keyframe_count, 0);
    assert_eq!(ds.bits.rgb_tracks.len(), 1);
}

#[test]
fn keyframed_tracks_carry_led_masks_and_running_offsets() {
    let graph = EditDataSet {
        animations: vec![
            anim(
                1.0,
                EditAnimationKind::Gradient {
                    faces: 1,
                    gradient: gradient(vec![rgb_kf(0.0, 1, 1, 1)]),
                },
            ),
            anim(
                1.0,
                EditAnimationKind::Keyframed {
                    special_color: SpecialColor::None,
                    tracks: vec![
                        EditRgbTrack {
                            leds: vec![0, 2],
                            gradient: gradient(vec![rgb_kf(0.0, 2, 2, 2), rgb_kf(0.2, 3, 3, 3)]),
                        },
                        EditRgbTrack {
                            leds: vec![19],
                            gradient: gradient(vec![rgb_kf(0.0, 2, 2, 2)]),
                        },
                    ],
                },
            ),
        ],
        behavior: None,
    };
    let ds = compile(&graph).unwrap();
    assert_eq!(
        ds.animations[1],
        Animation::Keyframed {
            duration: 1000,
            special_color: 0,
            tracks_offset: 1,
            track_count: 2,
        }
    );
    assert_eq!(ds.bits.rgb_tracks[1].led_mask, 0b101);
    assert_eq!(ds.bits.rgb_tracks[1].keyframes_offset, 1);
    assert_eq!(ds.bits.rgb_tracks[2].led_mask, 1 << 19);
    assert_eq!(ds.bits.rgb_tracks[2].keyframes_offset, 3);
}

#[test]
fn behavior_rules_get_contiguous_ranges() {
    let graph = EditDataSet {
        animations: vec![anim(
            1.0,
            EditAnimationKind::Rainbow {
                faces: 1,
                count: 1,
                fade: 1.0,
            },
        )],
        behavior: Some(EditBehavior {
            name: "default".to_string(),
            rules: vec![
                EditRule {
                    condition: EditCondition::HelloGoodbye {
                        hello: true,
                        goodbye: false,
                    },
                    actions: vec![EditAction::PlayAnimation {
                        animation: 0,
                        face_index: 0,
                        loop_count: 1,
                    }],
                },
                EditRule {
                    condition: EditCondition::BatteryState {
                        ok: false,
                        low: true,
                        charging: true,
                        done: false,
                        repeat_period: 1.5,
                    },
                    actions: vec![
                        EditAction::PlayAudioClip { clip_id: 7 },
                        EditAction::PlayAnimation {
                            animation: 0,
                            face_index: 3,
                            loop_count: 2,
                        },
                    ],
                },
            ],
        }),
    };
    let ds = compile(&graph).unwrap();
    assert_eq!(
        ds.conditions,
        vec![
            Condition::HelloGoodbye { flags: 1 },
            Condition::BatteryState {
                flags: 6,
                repeat_period_ms: 1500,
            },
        ]
    );
    assert_eq!(ds.actions.len(), 3);
    assert_eq!(
        ds.rules[1],
        Rule {
            condition: 1,
            actions_offset: 1,
            action_count: 2,
        }
    );
    assert_eq!(
        ds.behavior,
        Behavior {
            rules_offset: 0,
            rule_count: 2,
        }
    );
}

#[test]
fn dangling_animation_reference_is_a_compile_error() {
    let graph = EditDataSet {
        animations: vec![],
        behavior: Some(EditBehavior {
            name: String::new(),
            rules: vec![EditRule {
                condition: EditCondition::Handling,
                actions: vec![EditAction::PlayAnimation {
                    animation: 0,
                    face_index: 0,
                    loop_count: 1,
                }],
            }],
        }),
    };
    let err = compile(&graph).unwrap_err();
    assert!(matches!(err, PixelsError::Compile(_)));
}

#[test]
fn rule_without_actions_is_a_compile_error() {
    let graph = EditDataSet {
        animations: vec![],
        behavior: Some(EditBehavior {
            name: String::new(),
            rules: vec![EditRule {
                condition: EditCondition::Crooked,
                actions: vec![],
            }],
        }),
    };
    assert!(compile(&graph).is_err());
}

#[test]
fn palette_overflow_is_a_compile_error() {
    let keyframes = (0..127u8).map(|i| rgb_kf(0.0, i, 0, 0)).collect();
    let graph = EditDataSet {
        animations: vec![anim(
            1.0,
            EditAnimationKind::Gradient {
                faces: 1,
                gradient: gradient(keyframes),
            },
        )],
        behavior: None,
    };
    assert!(compile(&graph).is_err());
}

#[test]
fn keyframe_past_time_grid_is_a_compile_error() {
    let graph = EditDataSet {
        animations: vec![anim(
            20.0,
            EditAnimationKind::Gradient {
                faces: 1,
                gradient: gradient(vec![rgb_kf(11.0, 1, 1, 1)]),
            },
        )],
        behavior: None,
    };
    assert!(compile(&graph).is_err());
}

#[test]
fn duration_past_sixteen_bits_is_a_compile_error() {
    for duration in [70.0, -1.0, f32::NAN] {
        let graph = EditDataSet {
            animations: vec![anim(
                duration,
                EditAnimationKind::Rainbow {
                    faces: ALL_FACES,
                    count: 1,
                    fade: 0.0,
                },
            )],
            behavior: None,
        };
        let err = compile(&graph).unwrap_err();
        assert!(matches!(err, PixelsError::Compile(_)), "{duration}: {err}");
    }
}

#[test]
fn repeat_period_past_sixteen_bits_is_a_compile_error() {
    let graph = EditDataSet {
        animations: vec![anim(
            1.0,
            EditAnimationKind::Rainbow {
                faces: ALL_FACES,
                count: 1,
                fade: 0.0,
            },
        )],
        behavior: Some(EditBehavior {
            name: String::new(),
            rules: vec![EditRule {
                condition: EditCondition::Idle {
                    repeat_period: 100.0,
                },
                actions: vec![EditAction::PlayAnimation {
                    animation: 0,
                    face_index: 0,
                    loop_count: 1,
                }],
            }],
        }),
    };
    let err = compile(&graph).unwrap_err();
    assert!(err.to_string().contains("rule 0"), "{err}");
}

#[test]
fn test_animation_dataset_has_one_animation_and_no_behavior() {
    let a = anim(
        0.5,
        EditAnimationKind::FadeCandy {
            faces: 3,
            gradient: gradient(vec![rgb_kf(0.0, 4, 5, 6)]),
            radius_inner: 0.0,
            radius_outer: 1.0,
        },
    );
    let ds = compile_test_animation(&a).unwrap();
    assert_eq!(ds.animations.len(), 1);
    assert!(ds.rules.is_empty());
    assert_eq!(
        ds.animations[0],
        Animation::FadeCandy {
            duration: 500,
            face_mask: 3,
            gradient_track_offset: 0,
            radius_inner: 0,
            radius_outer: 255,
        }
    );
}
