use super::*;

#[test]
fn all_faces_covers_twenty_bits() {
    assert_eq!(ALL_FACES, 0xFFFFF);
}

#[test]
fn rgb_u32_roundtrip() {
    let c = Rgb8::new(255, 48, 0);
    assert_eq!(c.to_u32(), 0x00FF3000);
    assert_eq!(Rgb8::from_u32(0xAAFF3000), c);
}

#[test]
fn seconds_to_millis_truncates() {
    assert_eq!(seconds_to_millis(3.0).unwrap(), 3000);
    assert_eq!(seconds_to_millis(0.0199).unwrap(), 19);
    assert_eq!(seconds_to_millis(65.535).unwrap(), 65535);
}

#[test]
fn seconds_to_millis_rejects_values_outside_u16() {
    for secs in [70.0, 65.536, -1.0, -0.01, f32::NAN, f32::INFINITY] {
        let err = seconds_to_millis(secs).unwrap_err();
        assert!(matches!(err, PixelsError::Validation(_)), "{secs}: {err}");
    }
}

#[test]
fn unit_to_byte_rounds_and_clamps() {
    assert_eq!(unit_to_byte(0.1), 26);
    assert_eq!(unit_to_byte(1.0), 255);
    assert_eq!(unit_to_byte(2.0), 255);
    assert_eq!(unit_to_byte(-0.5), 0);
}

#[test]
fn round_up_to_4_is_idempotent_on_multiples() {
    assert_eq!(round_up_to_4(0), 0);
    assert_eq!(round_up_to_4(1), 4);
    assert_eq!(round_up_to_4(4), 4);
    assert_eq!(round_up_to_4(6), 8);
}

#[test]
fn led_mask_sets_bits_and_rejects_out_of_range() {
    assert_eq!(led_mask(&[0, 3, 19]).unwrap(), 0b1000_0000_0000_0000_1001);
    assert_eq!(led_mask(&[]).unwrap(), 0);
    assert!(led_mask(&[20]).is_err());
}
