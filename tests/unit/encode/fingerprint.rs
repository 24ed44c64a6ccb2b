use super::*;
use crate::dataset::animation::Animation;

fn one_anim(duration: u16) -> DataSet {
    DataSet {
        animations: vec![Animation::Rainbow {
            duration,
            face_mask: 1,
            count: 1,
            fade: 0,
        }],
        ..DataSet::default()
    }
}

#[test]
fn content_hash_is_xxh32_seed_zero() {
    assert_eq!(content_hash(b""), 0x02CC_5D05);
}

#[test]
fn hashes_are_deterministic_and_content_sensitive() {
    assert_eq!(
        test_animation_hash(&one_anim(100)).unwrap(),
        test_animation_hash(&one_anim(100)).unwrap()
    );
    assert_ne!(
        test_animation_hash(&one_anim(100)).unwrap(),
        test_animation_hash(&one_anim(120)).unwrap()
    );
    assert_ne!(dataset_hash(&one_anim(100)), dataset_hash(&one_anim(120)));
}
