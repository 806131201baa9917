use std::path::Path;

use crate::color::Color;
use crate::error::StrataResult;

/// Number of f32 channels per pixel (R, G, B, A).
pub const CHANNELS: usize = 4;

/// A CPU-resident rendered frame.
///
/// Row-major, four IEEE-754 f32 per pixel in R,G,B,A order with straight
/// (non-premultiplied) alpha. This byte layout is the contract with viewers
/// and exporters; see [`Image::as_bytes`].
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl Image {
    /// A fully transparent image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; (width as usize) * (height as usize) * CHANNELS],
        }
    }

    /// An image filled with a single color.
    pub fn solid(width: u32, height: u32, color: &Color) -> Self {
        let px = color.to_array();
        let mut data = Vec::with_capacity((width as usize) * (height as usize) * CHANNELS);
        for _ in 0..(width as usize) * (height as usize) {
            data.extend_from_slice(&px);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Wrap texels read back from a render buffer.
    pub fn from_texels(width: u32, height: u32, texels: &[[f32; 4]]) -> Self {
        Self {
            width,
            height,
            data: bytemuck::cast_slice(texels).to_vec(),
        }
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Returns None if out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let o = ((y as usize) * (self.width as usize) + (x as usize)) * CHANNELS;
        Some([self.data[o], self.data[o + 1], self.data[o + 2], self.data[o + 3]])
    }

    /// No-op if out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [f32; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let o = ((y as usize) * (self.width as usize) + (x as usize)) * CHANNELS;
        self.data[o..o + CHANNELS].copy_from_slice(&rgba);
    }

    /// Iterate pixels in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = [f32; 4]> + '_ {
        self.data
            .chunks_exact(CHANNELS)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }

    /// The raw little-endian f32 byte layout handed to viewer/export collaborators.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    /// Quantize into an 8-bit straight-alpha image.
    pub fn to_rgba8(&self) -> image::RgbaImage {
        let mut out = image::RgbaImage::new(self.width, self.height);
        for (dst, src) in out.pixels_mut().zip(self.pixels()) {
            *dst = image::Rgba(Color::from_array(src).to_rgba8());
        }
        out
    }

    /// Write the image as an 8-bit PNG.
    pub fn save_png(&self, path: &Path) -> StrataResult<()> {
        self.to_rgba8()
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_new_is_transparent() {
        let img = Image::new(4, 3);
        assert_eq!(img.pixel_count(), 12);
        assert_eq!(img.data.len(), 48);
        assert!(img.pixels().all(|p| p == [0.0; 4]));
    }

    #[test]
    fn test_image_get_set_pixel() {
        let mut img = Image::solid(2, 2, &Color::BLUE);
        img.set_pixel(1, 0, [0.25, 0.5, 0.75, 1.0]);
        assert_eq!(img.pixel(1, 0), Some([0.25, 0.5, 0.75, 1.0]));
        assert_eq!(img.pixel(0, 1), Some([0.0, 0.0, 1.0, 1.0]));
        assert_eq!(img.pixel(2, 0), None);
    }

    #[test]
    fn test_byte_layout_is_rgba_f32_row_major() {
        let mut img = Image::new(2, 1);
        img.set_pixel(1, 0, [1.0, 0.0, 0.0, 0.5]);
        let bytes = img.as_bytes();
        assert_eq!(bytes.len(), 2 * 4 * 4);
        assert_eq!(&bytes[16..20], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[28..32], &0.5f32.to_le_bytes());
    }

    #[test]
    fn test_to_rgba8() {
        let img = Image::solid(1, 1, &Color::RED);
        assert_eq!(img.to_rgba8().get_pixel(0, 0).0, [255, 0, 0, 255]);
    }
}
