//! Neighbourhood filters: blurs, unsharp mask, Sobel sketch, channel shift,
//! generic convolution and a few standalone effects.
//!
//! Filters that read neighbours never write into the buffer they read from:
//! they build a fresh output with [`PixelBuffer::from_rows`].

use rand::Rng;

use crate::buffer::PixelBuffer;
use crate::color::{clamp_u8, luma};
use crate::error::{CoreError, Result};
use crate::ops::{ChromaticAberrationParams, SharpenParams, SketchParams};

pub const EMBOSS_KERNEL: [f64; 9] = [-2.0, -1.0, 0.0, -1.0, 1.0, 1.0, 0.0, 1.0, 2.0];

const SOBEL_X: [f64; 9] = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];
const SOBEL_Y: [f64; 9] = [-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0];

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

/// One separable pass with a symmetric, normalized kernel of length `2r+1`.
/// Samples past the edges clamp to the nearest edge pixel. All four channels
/// are filtered.
fn separable_pass(src: &PixelBuffer, weights: &[f64], axis: Axis) -> PixelBuffer {
    let radius = (weights.len() / 2) as i64;
    PixelBuffer::from_rows(src.width, src.height, |y, row| {
        for x in 0..src.width {
            let mut acc = [0.0f64; 4];
            for (k, w) in weights.iter().enumerate() {
                let d = k as i64 - radius;
                let px = match axis {
                    Axis::Horizontal => src.pixel_clamped(x as i64 + d, y as i64),
                    Axis::Vertical => src.pixel_clamped(x as i64, y as i64 + d),
                };
                for c in 0..4 {
                    acc[c] += px[c] as f64 * w;
                }
            }
            let o = x as usize * 4;
            for c in 0..4 {
                row[o + c] = clamp_u8(acc[c]);
            }
        }
    })
}

fn separable(src: &PixelBuffer, weights: &[f64]) -> PixelBuffer {
    let horizontal = separable_pass(src, weights, Axis::Horizontal);
    separable_pass(&horizontal, weights, Axis::Vertical)
}

/// Box blur over a `(2r+1)^2` window. Radius 0 returns a copy.
pub fn box_blur(src: &PixelBuffer, radius: u32) -> PixelBuffer {
    if radius == 0 || src.is_empty() {
        return src.clone();
    }
    let len = 2 * radius as usize + 1;
    let weights = vec![1.0 / len as f64; len];
    separable(src, &weights)
}

/// Gaussian blur with standard deviation `sigma` pixels, truncated at 3 sigma.
pub fn gaussian_blur(src: &PixelBuffer, sigma: f64) -> PixelBuffer {
    if sigma <= 0.0 || src.is_empty() {
        return src.clone();
    }
    let radius = (sigma * 3.0).ceil() as i64;
    let mut weights: Vec<f64> = (-radius..=radius)
        .map(|d| (-(d * d) as f64 / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    separable(src, &weights)
}

/// Unsharp mask: `orig + amount/100 * (orig - box_blur(orig))` on RGB.
pub fn sharpen(src: &PixelBuffer, params: &SharpenParams) -> PixelBuffer {
    if params.amount == 0.0 || src.is_empty() {
        return src.clone();
    }
    let radius = params.radius.round().max(1.0) as u32;
    let amount = params.amount / 100.0;
    let blurred = box_blur(src, radius);

    let mut out = src.clone();
    for (o, b) in out.data.chunks_exact_mut(4).zip(blurred.data.chunks_exact(4)) {
        for c in 0..3 {
            let orig = o[c] as f64;
            o[c] = clamp_u8(orig + (orig - b[c] as f64) * amount);
        }
    }
    out
}

/// Sobel edge sketch on luma. Dark lines on white, or light lines on black
/// when `invert` is set.
pub fn sketch(src: &PixelBuffer, params: &SketchParams) -> PixelBuffer {
    if src.is_empty() {
        return src.clone();
    }
    let (w, h) = (src.width as i64, src.height as i64);
    let gray: Vec<f64> = src
        .data
        .chunks_exact(4)
        .map(|p| luma(p[0], p[1], p[2]))
        .collect();
    let sample = |x: i64, y: i64| -> f64 {
        let cx = x.clamp(0, w - 1);
        let cy = y.clamp(0, h - 1);
        gray[(cy * w + cx) as usize]
    };
    let scale = params.intensity / 100.0;

    PixelBuffer::from_rows(src.width, src.height, |y, row| {
        let y = y as i64;
        for x in 0..w {
            let mut gx = 0.0;
            let mut gy = 0.0;
            for ky in -1..=1i64 {
                for kx in -1..=1i64 {
                    let k = ((ky + 1) * 3 + (kx + 1)) as usize;
                    let v = sample(x + kx, y + ky);
                    gx += v * SOBEL_X[k];
                    gy += v * SOBEL_Y[k];
                }
            }
            let edge = ((gx * gx + gy * gy).sqrt() * scale).min(255.0);
            let v = if params.invert { edge } else { 255.0 - edge };
            let v = clamp_u8(v);
            let o = x as usize * 4;
            row[o] = v;
            row[o + 1] = v;
            row[o + 2] = v;
            row[o + 3] = src.pixel(x as u32, y as u32)[3];
        }
    })
}

/// Red from `(x+dx, y+dy)`, blue from `(x-dx, y-dy)`, green and alpha in place.
pub fn chromatic_aberration(src: &PixelBuffer, params: &ChromaticAberrationParams) -> PixelBuffer {
    let (dx, dy) = (params.offset_x as i64, params.offset_y as i64);
    PixelBuffer::from_rows(src.width, src.height, |y, row| {
        let y = y as i64;
        for x in 0..src.width as i64 {
            let o = x as usize * 4;
            let here = src.pixel(x as u32, y as u32);
            row[o] = src.pixel_clamped(x + dx, y + dy)[0];
            row[o + 1] = here[1];
            row[o + 2] = src.pixel_clamped(x - dx, y - dy)[2];
            row[o + 3] = here[3];
        }
    })
}

/// Generic square convolution on RGB. Only pixels whose full window lies
/// inside the image are written; the border keeps its input values.
pub fn convolve(src: &PixelBuffer, kernel: &[f64], divisor: f64, offset: f64) -> Result<PixelBuffer> {
    let size = (kernel.len() as f64).sqrt() as usize;
    if size * size != kernel.len() || size % 2 == 0 {
        return Err(CoreError::invalid_geometry(
            size as u32,
            size as u32,
            format!("convolution kernel of {} taps is not an odd square", kernel.len()),
        ));
    }
    let divisor = if divisor == 0.0 { 1.0 } else { divisor };
    let half = (size / 2) as u32;
    if src.width <= 2 * half || src.height <= 2 * half {
        return Ok(src.clone());
    }

    Ok(PixelBuffer::from_rows(src.width, src.height, |y, row| {
        let source_row = &src.data[y as usize * src.row_bytes()..(y as usize + 1) * src.row_bytes()];
        row.copy_from_slice(source_row);
        if y < half || y >= src.height - half {
            return;
        }
        for x in half..src.width - half {
            let mut acc = [0.0f64; 3];
            let mut k = 0;
            for sy in y - half..=y + half {
                for sx in x - half..=x + half {
                    let px = src.pixel(sx, sy);
                    for c in 0..3 {
                        acc[c] += px[c] as f64 * kernel[k];
                    }
                    k += 1;
                }
            }
            let o = x as usize * 4;
            for c in 0..3 {
                row[o + c] = clamp_u8(acc[c] / divisor + offset);
            }
        }
    }))
}

pub fn emboss(src: &PixelBuffer) -> PixelBuffer {
    convolve(src, &EMBOSS_KERNEL, 1.0, 0.0).unwrap_or_else(|_| src.clone())
}

/// Darken towards the corners. Distance is normalized to the half diagonal;
/// pixels within `radius` are untouched, beyond it the falloff is quadratic.
pub fn vignette(buf: &mut PixelBuffer, amount: f64, radius: f64) {
    if amount == 0.0 || radius >= 1.0 || buf.is_empty() {
        return;
    }
    let cx = buf.width as f64 / 2.0;
    let cy = buf.height as f64 / 2.0;
    let max_dist = (cx * cx + cy * cy).sqrt();
    let width = buf.width;
    let row_bytes = buf.row_bytes();

    for (y, row) in buf.data.chunks_exact_mut(row_bytes).enumerate() {
        let dy = y as f64 - cy;
        for x in 0..width as usize {
            let dx = x as f64 - cx;
            let dist = (dx * dx + dy * dy).sqrt() / max_dist;
            let falloff = ((dist - radius).max(0.0) / (1.0 - radius)).powi(2);
            let factor = 1.0 - falloff * amount;
            for c in 0..3 {
                row[x * 4 + c] = clamp_u8(row[x * 4 + c] as f64 * factor);
            }
        }
    }
}

/// Uniform noise in `[-amount, amount)`, the same offset on R, G and B.
pub fn add_noise<R: Rng + ?Sized>(buf: &mut PixelBuffer, amount: f64, rng: &mut R) {
    if amount <= 0.0 {
        return;
    }
    for px in buf.data.chunks_exact_mut(4) {
        let noise = (rng.r#gen::<f64>() - 0.5) * amount * 2.0;
        for c in px.iter_mut().take(3) {
            *c = clamp_u8(*c as f64 + noise);
        }
    }
}

/// Apply the pipeline's simple blur in place.
pub(crate) fn blur_in_place(buf: &mut PixelBuffer, sigma: f64) {
    if sigma > 0.0 {
        *buf = gaussian_blur(buf, sigma);
    }
}
