//! Perceptual image fingerprinting.
//!
//! A [`Fingerprint`] is the 128-bit concatenation of a difference hash
//! (dHash) and an average hash (aHash), each computed over a tiny
//! grayscale thumbnail of the source image. Two images that look alike
//! produce fingerprints with a small Hamming distance; this crate does
//! not attempt exact pixel matching, only perceptual similarity.
//!
//! ```
//! use fingerprint::Fingerprint;
//!
//! let bytes = [0u8; 16];
//! let a = Fingerprint::from_bytes(bytes);
//! let b = Fingerprint::from_bytes(bytes);
//! assert_eq!(a.hamming(&b), 0);
//! ```

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use std::fmt;
use thiserror::Error;

/// Number of bytes in a fingerprint (128 bits).
pub const FINGERPRINT_BYTES: usize = 16;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// A 128-bit perceptual fingerprint: 8 bytes dHash followed by 8 bytes aHash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub [u8; FINGERPRINT_BYTES]);

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; FINGERPRINT_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_BYTES] {
        &self.0
    }

    pub fn into_bytes(self) -> [u8; FINGERPRINT_BYTES] {
        self.0
    }

    /// The byte at position `i` (0..16), used by the inverted byte-position
    /// index to key posting lists.
    pub fn byte(&self, i: usize) -> u8 {
        self.0[i]
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Compute the combined dHash ‖ aHash fingerprint of a decoded image.
    pub fn from_image(img: &DynamicImage) -> Self {
        let mut bytes = [0u8; FINGERPRINT_BYTES];
        bytes[..8].copy_from_slice(&dhash(img));
        bytes[8..].copy_from_slice(&ahash(img));
        Self(bytes)
    }

    /// Decode raw image bytes and compute its fingerprint.
    pub fn from_image_bytes(data: &[u8]) -> Result<Self, FingerprintError> {
        let img = image::load_from_memory(data)?;
        Ok(Self::from_image(&img))
    }

    /// Hamming distance to another fingerprint: popcount(a XOR b) over 128 bits.
    pub fn hamming(&self, other: &Fingerprint) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; FINGERPRINT_BYTES]> for Fingerprint {
    fn from(bytes: [u8; FINGERPRINT_BYTES]) -> Self {
        Self(bytes)
    }
}

/// Difference hash: resize to 9x8 grayscale, compare each pixel to its
/// right neighbor. 8 rows of 8 bits each, packed MSB-first per row.
fn dhash(img: &DynamicImage) -> [u8; 8] {
    let small = img.resize_exact(9, 8, FilterType::Triangle).to_luma8();
    let mut out = [0u8; 8];
    for r in 0..8u32 {
        let mut row = 0u8;
        for c in 0..8u32 {
            let left = small.get_pixel(c, r).0[0];
            let right = small.get_pixel(c + 1, r).0[0];
            row = (row << 1) | u8::from(left > right);
        }
        out[r as usize] = row;
    }
    out
}

/// Average hash: resize to 8x8 grayscale, compare each pixel to the mean
/// of the thumbnail. 8 rows of 8 bits each, packed MSB-first per row.
fn ahash(img: &DynamicImage) -> [u8; 8] {
    let small = img.resize_exact(8, 8, FilterType::Triangle).to_luma8();
    let total: u32 = small.pixels().map(|p| p.0[0] as u32).sum();
    let mean = (total / (small.width() * small.height())) as u8;

    let mut out = [0u8; 8];
    for r in 0..8u32 {
        let mut row = 0u8;
        for c in 0..8u32 {
            let px = small.get_pixel(c, r).0[0];
            row = (row << 1) | u8::from(px > mean);
        }
        out[r as usize] = row;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    fn solid(width: u32, height: u32, value: u8) -> DynamicImage {
        let buf = ImageBuffer::from_fn(width, height, |_, _| Luma([value]));
        DynamicImage::ImageLuma8(buf)
    }

    fn gradient(width: u32, height: u32) -> DynamicImage {
        let buf = ImageBuffer::from_fn(width, height, |x, _| {
            Luma([(x * 255 / width.max(1)) as u8])
        });
        DynamicImage::ImageLuma8(buf)
    }

    #[test]
    fn hamming_is_zero_for_identical() {
        let img = gradient(64, 64);
        let a = Fingerprint::from_image(&img);
        let b = Fingerprint::from_image(&img);
        assert_eq!(a.hamming(&b), 0);
        assert_eq!(a, b);
    }

    #[test]
    fn hamming_is_symmetric_and_bounded() {
        let a = Fingerprint::from_bytes([0xAA; 16]);
        let b = Fingerprint::from_bytes([0x55; 16]);
        assert_eq!(a.hamming(&b), b.hamming(&a));
        assert!(a.hamming(&b) <= 128);
        assert_eq!(a.hamming(&a), 0);
    }

    #[test]
    fn hamming_all_bits_differ() {
        let a = Fingerprint::from_bytes([0x00; 16]);
        let b = Fingerprint::from_bytes([0xFF; 16]);
        assert_eq!(a.hamming(&b), 128);
    }

    #[test]
    fn solid_image_has_no_dhash_edges() {
        let img = solid(16, 16, 128);
        let fp = Fingerprint::from_image(&img);
        // every adjacent pair is equal, so every dHash bit is 0.
        assert_eq!(&fp.as_bytes()[..8], &[0u8; 8]);
    }

    #[test]
    fn byte_accessor_matches_array() {
        let fp = Fingerprint::from_bytes([7; 16]);
        for i in 0..16 {
            assert_eq!(fp.byte(i), 7);
        }
    }

    #[test]
    fn to_hex_round_trips_visually() {
        let fp = Fingerprint::from_bytes([0x01, 0x23, 0xAB, 0xCD, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF]);
        assert_eq!(&fp.to_hex()[..8], "0123abcd");
        assert!(fp.to_hex().ends_with("ff"));
    }
}
