//! Thumbnail formats: a name plus fixed pixel geometry.

use image::{imageops::FilterType, DynamicImage, RgbaImage};

/// A named thumbnail format with fixed output dimensions.
///
/// Every entry rendered for a format has exactly `width x height` RGBA8
/// pixels with an opaque alpha channel, so the grid can blit cells without
/// per-image layout work. A cache instance serves one logical format in
/// this application, but keys carry the format name so several can share a
/// store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThumbnailFormat {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

/// The format backing the movie grid.
pub const GRID_THUMBNAIL: ThumbnailFormat = ThumbnailFormat {
    name: "grid-thumbnail",
    width: 256,
    height: 256,
};

/// Default retained-entry bound for the grid format's cache.
pub const GRID_CAPACITY: usize = 1000;

impl ThumbnailFormat {
    /// Render a source image down to this format's fixed geometry.
    ///
    /// Crops-to-fill so the output always has the declared dimensions, and
    /// forces the alpha channel opaque to keep the pixel layout uniform.
    pub fn render(&self, source: &DynamicImage) -> RgbaImage {
        let mut out = source
            .resize_to_fill(self.width, self.height, FilterType::Lanczos3)
            .to_rgba8();
        for pixel in out.pixels_mut() {
            pixel[3] = 0xFF;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_is_exact_and_opaque() {
        // A wide translucent source still comes out format-sized and opaque.
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            640,
            200,
            image::Rgba([10, 20, 30, 40]),
        ));
        let rendered = GRID_THUMBNAIL.render(&source);
        assert_eq!(rendered.dimensions(), (256, 256));
        assert!(rendered.pixels().all(|p| p[3] == 0xFF));
    }
}
