use imgcrate_core::buffer::PixelBuffer;
use imgcrate_core::ops::{Corners, CropRect, Interpolation, Ops, PosterizeParams, ThresholdParams};

enum Fill {
    Solid([u8; 4]),
    HorizontalGradient,
    Checkerboard { cell: u32, a: [u8; 4], b: [u8; 4] },
}

/// Builder for test buffers with sensible defaults (opaque white).
pub struct BufferBuilder {
    width: u32,
    height: u32,
    fill: Fill,
    pixels: Vec<(u32, u32, [u8; 4])>,
}

impl BufferBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fill: Fill::Solid([255, 255, 255, 255]),
            pixels: Vec::new(),
        }
    }

    pub fn solid(mut self, rgba: [u8; 4]) -> Self {
        self.fill = Fill::Solid(rgba);
        self
    }

    /// Opaque grey ramp from 0 on the left edge to 255 on the right.
    pub fn horizontal_gradient(mut self) -> Self {
        self.fill = Fill::HorizontalGradient;
        self
    }

    pub fn checkerboard(mut self, cell: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        self.fill = Fill::Checkerboard { cell: cell.max(1), a, b };
        self
    }

    /// Override a single pixel after the fill.
    pub fn pixel(mut self, x: u32, y: u32, rgba: [u8; 4]) -> Self {
        self.pixels.push((x, y, rgba));
        self
    }

    pub fn build(self) -> PixelBuffer {
        let mut buf = PixelBuffer::new(self.width, self.height);
        let span = self.width.saturating_sub(1).max(1) as f64;
        for y in 0..self.height {
            for x in 0..self.width {
                let rgba = match &self.fill {
                    Fill::Solid(c) => *c,
                    Fill::HorizontalGradient => {
                        let v = (x as f64 / span * 255.0).round() as u8;
                        [v, v, v, 255]
                    }
                    Fill::Checkerboard { cell, a, b } => {
                        if (x / cell + y / cell) % 2 == 0 {
                            *a
                        } else {
                            *b
                        }
                    }
                };
                buf.pixel_mut(x, y).copy_from_slice(&rgba);
            }
        }
        for (x, y, rgba) in self.pixels {
            buf.pixel_mut(x, y).copy_from_slice(&rgba);
        }
        buf
    }
}

/// Builder for parameter records, starting from the neutral record.
#[derive(Default)]
pub struct OpsBuilder {
    ops: Ops,
}

impl OpsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn crop(mut self, x: u32, y: u32, w: u32, h: u32) -> Self {
        self.ops.crop = Some(CropRect::new(x, y, w, h));
        self
    }

    pub fn resize(mut self, w: u32, h: u32) -> Self {
        self.ops.resize_width = Some(w);
        self.ops.resize_height = Some(h);
        self
    }

    pub fn rotation(mut self, degrees: f64) -> Self {
        self.ops.rotation = degrees;
        self
    }

    pub fn flip(mut self, h: bool, v: bool) -> Self {
        self.ops.flip_h = h;
        self.ops.flip_v = v;
        self
    }

    pub fn brightness(mut self, value: f64) -> Self {
        self.ops.brightness = value;
        self
    }

    pub fn gamma(mut self, value: f64) -> Self {
        self.ops.gamma = value;
        self
    }

    pub fn posterize(mut self, levels: u32) -> Self {
        self.ops.posterize = Some(PosterizeParams { levels });
        self
    }

    pub fn threshold(mut self, threshold: u8) -> Self {
        self.ops.threshold = Some(ThresholdParams { threshold });
        self
    }

    pub fn free_transform(mut self, corners: Corners, interpolation: Interpolation) -> Self {
        self.ops.free_transform = Some(corners);
        self.ops.interpolation = interpolation;
        self
    }

    pub fn build(self) -> Ops {
        self.ops
    }
}
