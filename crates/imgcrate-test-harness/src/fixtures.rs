use std::sync::atomic::{AtomicUsize, Ordering};

use imgcrate_core::buffer::PixelBuffer;
use imgcrate_core::compositor::MarkSource;
use imgcrate_core::error::{CoreError, Result};

use crate::builders::BufferBuilder;

pub const RED: [u8; 4] = [255, 0, 0, 255];

/// An opaque red square.
pub fn red_square(size: u32) -> PixelBuffer {
    BufferBuilder::new(size, size).solid(RED).build()
}

/// An opaque grey ramp, left to right.
pub fn gradient(width: u32, height: u32) -> PixelBuffer {
    BufferBuilder::new(width, height).horizontal_gradient().build()
}

/// Watermark asset source that renders text as a solid block and decodes
/// any source not starting with "missing" as a solid square.
pub struct MockMarkSource {
    pub image_size: u32,
    pub image_color: [u8; 4],
    decodes: AtomicUsize,
}

impl MockMarkSource {
    pub fn new(image_size: u32, image_color: [u8; 4]) -> Self {
        Self {
            image_size,
            image_color,
            decodes: AtomicUsize::new(0),
        }
    }

    pub fn decode_count(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }
}

impl MarkSource for MockMarkSource {
    fn rasterize_text(&self, text: &str, font_size: f64, color: [u8; 3]) -> Result<PixelBuffer> {
        let w = (text.chars().count() as f64 * font_size * 0.5).ceil().max(1.0) as u32;
        let h = font_size.ceil().max(1.0) as u32;
        Ok(PixelBuffer::filled(w, h, [color[0], color[1], color[2], 255]))
    }

    fn decode_image(&self, source: &str) -> Result<PixelBuffer> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        if source.starts_with("missing") {
            return Err(CoreError::AssetLoadFailed(source.to_string()));
        }
        Ok(PixelBuffer::filled(self.image_size, self.image_size, self.image_color))
    }
}

/// Get a temporary directory for test fixtures that persists for the test run.
pub fn fixture_dir() -> tempfile::TempDir {
    tempfile::TempDir::new().expect("failed to create temp dir for fixtures")
}

/// Write `value` as pretty JSON into `dir` and return the path.
pub fn write_json(dir: &std::path::Path, name: &str, value: &serde_json::Value) -> std::path::PathBuf {
    let path = dir.join(name);
    let body = serde_json::to_string_pretty(value).expect("fixture json");
    std::fs::write(&path, body).expect("failed to write fixture");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_counts_decodes() {
        let marks = MockMarkSource::new(4, RED);
        assert!(marks.decode_image("logo").is_ok());
        assert!(marks.decode_image("missing.png").is_err());
        assert_eq!(marks.decode_count(), 2);
    }

    #[test]
    fn test_red_square() {
        let buf = red_square(3);
        assert_eq!(buf.pixel(2, 2), &RED);
    }
}
