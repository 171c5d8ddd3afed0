use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// An owned RGBA8 raster. 4 bytes per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Create a new transparent black buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 4],
        }
    }

    /// Create a buffer where every pixel has the given RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Wrap existing RGBA data. Fails when the length doesn't match the dimensions.
    pub fn from_rgba_vec(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(CoreError::invalid_geometry(
                width,
                height,
                format!("RGBA data length {} doesn't match {}", data.len(), expected),
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Get pixel RGBA at (x, y). Panics if out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let idx = self.index(x, y);
        &self.data[idx..idx + 4]
    }

    /// Get mutable pixel RGBA at (x, y). Panics if out of bounds.
    pub fn pixel_mut(&mut self, x: u32, y: u32) -> &mut [u8] {
        let idx = self.index(x, y);
        &mut self.data[idx..idx + 4]
    }

    /// Pixel with coordinates clamped into the buffer.
    pub fn pixel_clamped(&self, x: i64, y: i64) -> &[u8] {
        let cx = x.clamp(0, self.width as i64 - 1) as u32;
        let cy = y.clamp(0, self.height as i64 - 1) as u32;
        self.pixel(cx, cy)
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// Build a new buffer row by row in parallel. `f` receives the row index
    /// and that row's RGBA bytes, initially transparent black.
    pub fn from_rows<F>(width: u32, height: u32, f: F) -> PixelBuffer
    where
        F: Fn(u32, &mut [u8]) + Sync + Send,
    {
        let mut out = PixelBuffer::new(width, height);
        if out.is_empty() {
            return out;
        }
        let row_bytes = out.row_bytes();
        out.data
            .par_chunks_exact_mut(row_bytes)
            .enumerate()
            .for_each(|(y, row)| f(y as u32, row));
        out
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * 4
    }

    /// Copy the sub-rectangle `(x, y, width, height)` into a new buffer.
    /// The rectangle must lie inside the buffer.
    pub fn extract(&self, x: u32, y: u32, width: u32, height: u32) -> Result<PixelBuffer> {
        if width == 0
            || height == 0
            || x as u64 + width as u64 > self.width as u64
            || y as u64 + height as u64 > self.height as u64
        {
            return Err(CoreError::invalid_geometry(
                width,
                height,
                format!(
                    "region at ({x}, {y}) exceeds {}x{} buffer",
                    self.width, self.height
                ),
            ));
        }

        let mut out = PixelBuffer::new(width, height);
        let src_stride = self.row_bytes();
        let dst_stride = out.row_bytes();
        for row in 0..height as usize {
            let src_offset = (y as usize + row) * src_stride + x as usize * 4;
            let dst_offset = row * dst_stride;
            out.data[dst_offset..dst_offset + dst_stride]
                .copy_from_slice(&self.data[src_offset..src_offset + dst_stride]);
        }
        Ok(out)
    }

    /// Tight bounding box `(x, y, width, height)` of pixels with non-zero alpha,
    /// or `None` when every pixel is fully transparent.
    pub fn opaque_bounds(&self) -> Option<(u32, u32, u32, u32)> {
        let mut min_x = self.width;
        let mut min_y = self.height;
        let mut max_x = 0u32;
        let mut max_y = 0u32;
        let mut found = false;

        for y in 0..self.height {
            let row_start = y as usize * self.row_bytes();
            for x in 0..self.width {
                if self.data[row_start + x as usize * 4 + 3] > 0 {
                    found = true;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        found.then(|| (min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
    }

    /// Crop away fully transparent margins. Returns the buffer unchanged when
    /// the opaque region already fills the canvas or there is no opaque pixel.
    pub fn trim_transparent(self) -> PixelBuffer {
        match self.opaque_bounds() {
            Some((x, y, w, h)) if w != self.width || h != self.height => {
                // bounds come from this buffer, so the region is always valid
                self.extract(x, y, w, h).unwrap_or(self)
            }
            _ => self,
        }
    }
}
