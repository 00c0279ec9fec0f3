//! Average hash for cheap "same screen" checks between consecutive frames

use image::RgbImage;
use image::imageops::FilterType;

const HASH_SIDE: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHash(u64);

impl FrameHash {
    pub fn of(frame: &RgbImage) -> Self {
        let gray = image::imageops::grayscale(frame);
        let small = image::imageops::resize(&gray, HASH_SIDE, HASH_SIDE, FilterType::Triangle);
        let total: u32 = small.pixels().map(|p| p[0] as u32).sum();
        let mean = total / (HASH_SIDE * HASH_SIDE);

        let bits = small
            .pixels()
            .enumerate()
            .filter(|(_, p)| p[0] as u32 > mean)
            .fold(0u64, |acc, (i, _)| acc | (1u64 << i));
        Self(bits)
    }

    /// Hamming distance between two hashes.
    pub fn distance(&self, other: &FrameHash) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}
