//! Content hashing for deterministic rendering verification.
//!
//! Produces a SHA-256 digest of an image's dimensions and exact byte layout,
//! so two renders can be compared bit-for-bit without keeping both images.

use sha2::{Digest, Sha256};

use crate::frame::Image;

/// A content hash digest (SHA-256, 32 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash {
    bytes: [u8; 32],
}

impl ContentHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Hash a single rendered image.
pub fn hash_image(image: &Image) -> ContentHash {
    let mut hasher = Sha256::new();
    // Dimensions are part of the digest so that a 2×8 and a 4×4 image with
    // identical texels hash differently.
    hasher.update(image.width.to_le_bytes());
    hasher.update(image.height.to_le_bytes());
    hasher.update(image.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    ContentHash::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    #[test]
    fn test_identical_images_hash_equal() {
        let a = Image::solid(8, 8, &Color::RED);
        let b = Image::solid(8, 8, &Color::RED);
        assert_eq!(hash_image(&a), hash_image(&b));
        assert_eq!(hash_image(&a).to_hex().len(), 64);
    }

    #[test]
    fn test_single_texel_change_alters_hash() {
        let a = Image::solid(8, 8, &Color::RED);
        let mut b = a.clone();
        b.set_pixel(3, 3, [1.0, 0.0, 0.0, 0.999]);
        assert_ne!(hash_image(&a), hash_image(&b));
    }

    #[test]
    fn test_dimensions_are_hashed() {
        let a = Image::new(2, 8);
        let b = Image::new(4, 4);
        assert_ne!(hash_image(&a), hash_image(&b));
    }
}
