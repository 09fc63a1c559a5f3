use std::any::Any;

use crate::render::{RenderError, RenderList};

/// Size of a surface in pixels. It's a simple struct to hold width and height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

/// Opaque 8-bit RGB image, row-major, three bytes per pixel.
#[derive(Clone, PartialEq, Eq)]
pub struct RgbImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RgbImage {
    pub fn from_raw(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        assert!(
            pixels.len() >= (width as usize) * (height as usize) * 3,
            "pixel buffer too small for image dimensions"
        );

        Self { pixels, width, height }
    }

    /// Returns the `[r, g, b]` triple at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        Some([self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]])
    }

    /// Encodes the image as an opaque 8-bit RGB PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>, RenderError> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
            encoder.set_color(png::ColorType::Rgb);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&self.pixels)?;
            writer.finish()?;
        }
        Ok(out)
    }
}

impl std::fmt::Debug for RgbImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgbImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.pixels.len())
            .finish()
    }
}

/// Type-erased surface so callers can hold it without knowing the backend.
pub trait ErasedSurface: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Core backend interface.
pub trait RenderBackend {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Create a new surface with the given size.
    fn create_surface(&self, size: SurfaceSize) -> Result<Box<dyn ErasedSurface>, RenderError>;

    /// Execute every item of `list` on the given surface, in order.
    fn render(&mut self, list: &RenderList, surface: &mut dyn ErasedSurface) -> Result<(), RenderError>;

    /// Copy the surface out as an opaque RGB image.
    fn snapshot(&mut self, surface: &mut dyn ErasedSurface) -> Result<RgbImage, RenderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_lookup_is_bounds_checked() {
        let img = RgbImage::from_raw(vec![1, 2, 3, 4, 5, 6], 2, 1);
        assert_eq!(img.pixel(1, 0), Some([4, 5, 6]));
        assert_eq!(img.pixel(2, 0), None);
        assert_eq!(img.pixel(0, 1), None);
    }

    #[test]
    fn encode_png_writes_signature_and_header() {
        let img = RgbImage::from_raw(vec![255; 4 * 3 * 3], 4, 3);
        let bytes = img.encode_png().unwrap();
        assert_eq!(&bytes[0..8], b"\x89PNG\r\n\x1a\n");

        let decoder = png::Decoder::new(&bytes[..]);
        let reader = decoder.read_info().unwrap();
        let info = reader.info();
        assert_eq!(info.width, 4);
        assert_eq!(info.height, 3);
        assert_eq!(info.color_type, png::ColorType::Rgb);
    }
}
