//! High-quality scaling with windowed-sinc and cubic kernels.
//!
//! Both kernels are separable: a horizontal pass into an `f64` intermediate
//! followed by a vertical pass into the output. Each output sample divides
//! by the summed weight of the taps that actually fell inside the image, so
//! windows clipped at the borders keep their brightness.

use std::f64::consts::PI;

use imgcrate_core::buffer::PixelBuffer;
use imgcrate_core::config::DEFAULT_MAX_DIMENSION;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ExportError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResampleKernel {
    Lanczos { lobes: u32 },
    Bicubic,
}

impl Default for ResampleKernel {
    fn default() -> Self {
        Self::Lanczos { lobes: 3 }
    }
}

impl ResampleKernel {
    /// Half-width of the kernel window in source pixels.
    pub fn support(self) -> f64 {
        match self {
            Self::Lanczos { lobes } => lobes.max(1) as f64,
            Self::Bicubic => 2.0,
        }
    }

    pub fn weight(self, x: f64) -> f64 {
        match self {
            Self::Lanczos { lobes } => lanczos(x, lobes.max(1) as f64),
            Self::Bicubic => cubic(x),
        }
    }
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

/// `sinc(x) * sinc(x / a)` inside `|x| < a`.
pub fn lanczos(x: f64, a: f64) -> f64 {
    if x.abs() >= a {
        return 0.0;
    }
    sinc(x) * sinc(x / a)
}

/// Catmull-Rom cubic (a = -0.5).
pub fn cubic(x: f64) -> f64 {
    let x = x.abs();
    if x <= 1.0 {
        1.5 * x * x * x - 2.5 * x * x + 1.0
    } else if x < 2.0 {
        -0.5 * x * x * x + 2.5 * x * x - 4.0 * x + 2.0
    } else {
        0.0
    }
}

/// Normalized taps for one output coordinate.
#[derive(Debug, Clone)]
struct Taps {
    start: usize,
    weights: Vec<f64>,
}

fn axis_taps(src_len: u32, dst_len: u32, kernel: ResampleKernel) -> Vec<Taps> {
    let ratio = src_len as f64 / dst_len as f64;
    let support = kernel.support();
    let last = src_len as i64 - 1;
    (0..dst_len)
        .map(|i| {
            let center = (i as f64 + 0.5) * ratio - 0.5;
            let start = ((center - support).floor() as i64).clamp(0, last);
            let end = ((center + support).ceil() as i64).clamp(0, last);
            let mut weights: Vec<f64> = (start..=end).map(|k| kernel.weight(center - k as f64)).collect();
            let sum: f64 = weights.iter().sum();
            if sum.abs() < 1e-12 {
                // window missed every non-zero tap; fall back to nearest
                let nearest = center.round().clamp(0.0, last as f64) as i64;
                return Taps {
                    start: nearest as usize,
                    weights: vec![1.0],
                };
            }
            for w in &mut weights {
                *w /= sum;
            }
            Taps {
                start: start as usize,
                weights,
            }
        })
        .collect()
}

fn check_target(width: u32, height: u32, max_dimension: u32) -> Result<()> {
    if width == 0 || height == 0 || width > max_dimension || height > max_dimension {
        return Err(ExportError::InvalidGeometry { width, height });
    }
    Ok(())
}

/// Scale `src` to exactly `width x height` with `kernel`, allowing targets
/// up to `DEFAULT_MAX_DIMENSION` on each side.
pub fn resample(src: &PixelBuffer, width: u32, height: u32, kernel: ResampleKernel) -> Result<PixelBuffer> {
    resample_within(src, width, height, kernel, DEFAULT_MAX_DIMENSION)
}

/// [`resample`] with an explicit per-side limit, usually
/// `EngineConfig::max_dimension`.
pub fn resample_within(
    src: &PixelBuffer,
    width: u32,
    height: u32,
    kernel: ResampleKernel,
    max_dimension: u32,
) -> Result<PixelBuffer> {
    check_target(width, height, max_dimension)?;
    if src.is_empty() {
        return Err(ExportError::InvalidGeometry {
            width: src.width,
            height: src.height,
        });
    }
    if (width, height) == (src.width, src.height) {
        return Ok(src.clone());
    }

    let x_taps = axis_taps(src.width, width, kernel);
    let y_taps = axis_taps(src.height, height, kernel);

    // horizontal pass: src.height rows of `width` pixels
    let mid_stride = width as usize * 4;
    let mut mid = vec![0.0f64; src.height as usize * mid_stride];
    mid.par_chunks_exact_mut(mid_stride)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, taps) in x_taps.iter().enumerate() {
                let mut acc = [0.0f64; 4];
                for (k, w) in taps.weights.iter().enumerate() {
                    let px = src.pixel((taps.start + k) as u32, y as u32);
                    for c in 0..4 {
                        acc[c] += px[c] as f64 * w;
                    }
                }
                row[x * 4..x * 4 + 4].copy_from_slice(&acc);
            }
        });

    let out = PixelBuffer::from_rows(width, height, |y, row| {
        let taps = &y_taps[y as usize];
        for x in 0..width as usize {
            let mut acc = [0.0f64; 4];
            for (k, w) in taps.weights.iter().enumerate() {
                let o = (taps.start + k) * mid_stride + x * 4;
                for c in 0..4 {
                    acc[c] += mid[o + c] * w;
                }
            }
            for c in 0..4 {
                row[x * 4 + c] = acc[c].round().clamp(0.0, 255.0) as u8;
            }
        }
    });

    info!(
        target: "imgcrate::resample",
        src_w = src.width,
        src_h = src.height,
        dst_w = width,
        dst_h = height,
        kernel = ?kernel,
        "resample complete"
    );
    Ok(out)
}
