use xxhash_rust::xxh32::xxh32;

use crate::dataset::DataSet;
use crate::encode::writer::{write_dataset, write_test_animation};
use crate::foundation::error::PixelsResult;

const CONTENT_HASH_SEED: u32 = 0;

/// 32-bit content hash a die uses to recognize data it already holds.
pub fn content_hash(bytes: &[u8]) -> u32 {
    xxh32(bytes, CONTENT_HASH_SEED)
}

/// Hash of the full serialized dataset, as reported back by an identified die.
pub fn dataset_hash(ds: &DataSet) -> u32 {
    content_hash(&write_dataset(ds))
}

/// Hash of the preview buffer announced by the test-animation transfer.
pub fn test_animation_hash(ds: &DataSet) -> PixelsResult<u32> {
    Ok(content_hash(&write_test_animation(ds)?))
}

#[cfg(test)]
#[path = "../../tests/unit/encode/fingerprint.rs"]
mod tests;
