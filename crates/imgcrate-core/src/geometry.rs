//! Geometric transforms: crop, rotate/flip, simple resize, skew, perspective
//! and the free-form quad transform.
//!
//! Every resampling transform works by inverse mapping: for each destination
//! pixel it computes the source position and samples there. Source positions
//! that fall outside the image produce transparent black.

use tracing::trace;

use crate::buffer::PixelBuffer;
use crate::error::{CoreError, Result};
use crate::ops::{Corners, CropRect, DistortParams, Interpolation};

const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Maximum Newton-Raphson iterations for the inverse quad mapping.
pub const NEWTON_MAX_ITERATIONS: usize = 10;
/// Residual (in pixels, per axis) at which the solver stops early.
pub const NEWTON_TOLERANCE: f64 = 0.001;
/// Largest residual still accepted after the last iteration.
pub const NEWTON_ACCEPT_RESIDUAL: f64 = 0.5;
/// Slack on the `[0, 1]` parameter range before a solution counts as outside.
pub const UV_SLACK: f64 = 0.01;

const PERSPECTIVE_SCALE: f64 = 0.002;
const SKEW_SCALE: f64 = 0.5;

/// Reject zero-size targets and targets larger than `max_dimension`.
pub fn check_target(width: u32, height: u32, max_dimension: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(CoreError::invalid_geometry(width, height, "zero-size target"));
    }
    if width > max_dimension || height > max_dimension {
        return Err(CoreError::invalid_geometry(
            width,
            height,
            format!("exceeds maximum dimension {max_dimension}"),
        ));
    }
    Ok(())
}

// =============================================================================
// Sampling
// =============================================================================

/// Bilinear sample at a fractional pixel position. Neighbour indices are
/// clamped into the buffer.
pub fn sample_bilinear(src: &PixelBuffer, x: f64, y: f64) -> [u8; 4] {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let p00 = src.pixel_clamped(x0, y0);
    let p10 = src.pixel_clamped(x0 + 1, y0);
    let p01 = src.pixel_clamped(x0, y0 + 1);
    let p11 = src.pixel_clamped(x0 + 1, y0 + 1);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}

pub fn sample_nearest(src: &PixelBuffer, x: f64, y: f64) -> [u8; 4] {
    let px = src.pixel_clamped(x.round() as i64, y.round() as i64);
    [px[0], px[1], px[2], px[3]]
}

/// Unweighted mean of the four pixels surrounding `(x, y)`.
pub fn sample_average(src: &PixelBuffer, x: f64, y: f64) -> [u8; 4] {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let mut acc = [0u32; 4];
    for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        let px = src.pixel_clamped(x0 + dx, y0 + dy);
        for c in 0..4 {
            acc[c] += px[c] as u32;
        }
    }
    acc.map(|v| ((v as f64) / 4.0).round() as u8)
}

pub fn sample(src: &PixelBuffer, x: f64, y: f64, interpolation: Interpolation) -> [u8; 4] {
    match interpolation {
        Interpolation::Nearest => sample_nearest(src, x, y),
        Interpolation::Bilinear => sample_bilinear(src, x, y),
        Interpolation::Average => sample_average(src, x, y),
    }
}

/// Bilinear sample, or transparent when `(x, y)` lies more than `margin`
/// outside the pixel-centre extent `[0, w-1] x [0, h-1]`.
fn sample_or_clear(src: &PixelBuffer, x: f64, y: f64, margin: f64) -> [u8; 4] {
    let max_x = src.width as f64 - 1.0;
    let max_y = src.height as f64 - 1.0;
    if x < -margin || y < -margin || x > max_x + margin || y > max_y + margin {
        return TRANSPARENT;
    }
    sample_bilinear(src, x, y)
}

// =============================================================================
// Crop / rotate / resize
// =============================================================================

pub fn crop(src: &PixelBuffer, rect: &CropRect) -> Result<PixelBuffer> {
    src.extract(rect.x, rect.y, rect.width, rect.height)
}

/// `(cos, sin)` with values within 1e-10 of 0 or 1 snapped, so quarter turns
/// produce exact bounding boxes and exact pixel mappings.
fn snapped_cos_sin(degrees: f64) -> (f64, f64) {
    let snap = |v: f64| {
        if v.abs() < 1e-10 {
            0.0
        } else if (v.abs() - 1.0).abs() < 1e-10 {
            v.signum()
        } else {
            v
        }
    };
    let theta = degrees.to_radians();
    (snap(theta.cos()), snap(theta.sin()))
}

/// Size of the axis-aligned box enclosing a `width x height` image rotated by
/// `degrees`.
pub fn rotated_bounds(width: u32, height: u32, degrees: f64) -> (u32, u32) {
    let (cos, sin) = snapped_cos_sin(degrees);
    let (w, h) = (width as f64, height as f64);
    let bw = (w * cos.abs() + h * sin.abs() - 1e-6).ceil().max(1.0);
    let bh = (w * sin.abs() + h * cos.abs() - 1e-6).ceil().max(1.0);
    (bw as u32, bh as u32)
}

/// Rotate clockwise by `degrees` about the centre, with optional mirroring,
/// in a single resample. The canvas grows to the rotated bounding box.
pub fn rotate_flip(src: &PixelBuffer, degrees: f64, flip_h: bool, flip_v: bool) -> PixelBuffer {
    if src.is_empty() || (degrees.rem_euclid(360.0) == 0.0 && !flip_h && !flip_v) {
        return src.clone();
    }
    let (cos, sin) = snapped_cos_sin(degrees);
    let (out_w, out_h) = rotated_bounds(src.width, src.height, degrees);
    let sx = if flip_h { -1.0 } else { 1.0 };
    let sy = if flip_v { -1.0 } else { 1.0 };
    let src_cx = src.width as f64 / 2.0;
    let src_cy = src.height as f64 / 2.0;
    let out_cx = out_w as f64 / 2.0;
    let out_cy = out_h as f64 / 2.0;

    PixelBuffer::from_rows(out_w, out_h, |y, row| {
        let dy = y as f64 + 0.5 - out_cy;
        for x in 0..out_w {
            let dx = x as f64 + 0.5 - out_cx;
            // undo the rotation, then the mirror
            let rx = dx * cos + dy * sin;
            let ry = -dx * sin + dy * cos;
            let src_x = rx * sx + src_cx - 0.5;
            let src_y = ry * sy + src_cy - 0.5;
            let px = sample_or_clear(src, src_x, src_y, 0.5);
            let o = x as usize * 4;
            row[o..o + 4].copy_from_slice(&px);
        }
    })
}

/// Bilinear scale to exactly `width x height`.
pub fn resize(src: &PixelBuffer, width: u32, height: u32) -> Result<PixelBuffer> {
    if width == 0 || height == 0 {
        return Err(CoreError::invalid_geometry(width, height, "zero-size resize target"));
    }
    if src.is_empty() {
        return Err(CoreError::invalid_geometry(
            src.width,
            src.height,
            "cannot resize an empty buffer",
        ));
    }
    if width == src.width && height == src.height {
        return Ok(src.clone());
    }
    let ratio_x = src.width as f64 / width as f64;
    let ratio_y = src.height as f64 / height as f64;

    Ok(PixelBuffer::from_rows(width, height, |y, row| {
        let src_y = (y as f64 + 0.5) * ratio_y - 0.5;
        for x in 0..width {
            let src_x = (x as f64 + 0.5) * ratio_x - 0.5;
            let px = sample_bilinear(src, src_x, src_y);
            let o = x as usize * 4;
            row[o..o + 4].copy_from_slice(&px);
        }
    }))
}

// =============================================================================
// Skew / perspective
// =============================================================================

/// Shear about the centre. Canvas size is unchanged.
pub fn skew(src: &PixelBuffer, params: &DistortParams) -> PixelBuffer {
    if params.is_identity() || src.is_empty() {
        return src.clone();
    }
    let shear_x = params.horizontal * SKEW_SCALE;
    let shear_y = params.vertical * SKEW_SCALE;
    let cx0 = src.width as f64 / 2.0;
    let cy0 = src.height as f64 / 2.0;

    PixelBuffer::from_rows(src.width, src.height, |y, row| {
        let cy = y as f64 - cy0;
        for x in 0..src.width {
            let cx = x as f64 - cx0;
            let src_x = cx - cy * shear_x + cx0;
            let src_y = cy - cx * shear_y + cy0;
            let px = sample_or_clear(src, src_x, src_y, 0.0);
            let o = x as usize * 4;
            row[o..o + 4].copy_from_slice(&px);
        }
    })
}

/// Projective divide about the centre. Positions where the denominator is
/// near zero are left transparent.
pub fn perspective(src: &PixelBuffer, params: &DistortParams) -> PixelBuffer {
    if params.is_identity() || src.is_empty() {
        return src.clone();
    }
    let persp_x = params.horizontal * PERSPECTIVE_SCALE;
    let persp_y = params.vertical * PERSPECTIVE_SCALE;
    let cx0 = src.width as f64 / 2.0;
    let cy0 = src.height as f64 / 2.0;

    PixelBuffer::from_rows(src.width, src.height, |y, row| {
        let cy = y as f64 - cy0;
        for x in 0..src.width {
            let cx = x as f64 - cx0;
            let d = 1.0 + persp_x * cx + persp_y * cy;
            let px = if d.abs() < 0.001 {
                TRANSPARENT
            } else {
                sample_or_clear(src, cx / d + cx0, cy / d + cy0, 0.0)
            };
            let o = x as usize * 4;
            row[o..o + 4].copy_from_slice(&px);
        }
    })
}

// =============================================================================
// Free transform
// =============================================================================

/// A quad in pixel space, ordered top-left, top-right, bottom-right,
/// bottom-left so that `q[0..4]` walks the outline.
pub type Quad = [(f64, f64); 4];

/// Evaluate the bilinear quad mapping at `(u, v)`.
pub fn bilinear_point(q: &Quad, u: f64, v: f64) -> (f64, f64) {
    let w0 = (1.0 - u) * (1.0 - v);
    let w1 = u * (1.0 - v);
    let w2 = u * v;
    let w3 = (1.0 - u) * v;
    (
        w0 * q[0].0 + w1 * q[1].0 + w2 * q[2].0 + w3 * q[3].0,
        w0 * q[0].1 + w1 * q[1].1 + w2 * q[2].1 + w3 * q[3].1,
    )
}

/// Solve `bilinear_point(q, u, v) == target` for `(u, v)` with Newton-Raphson,
/// starting from the quad centre. Fails with `SingularTransform` when the
/// Jacobian vanishes or the residual stays above half a pixel.
///
/// `pixel` only labels the error.
pub fn inverse_bilinear(q: &Quad, target: (f64, f64), pixel: (u32, u32)) -> Result<(f64, f64)> {
    let singular = || CoreError::SingularTransform {
        x: pixel.0,
        y: pixel.1,
    };
    let (mut u, mut v) = (0.5, 0.5);

    for _ in 0..NEWTON_MAX_ITERATIONS {
        let (px, py) = bilinear_point(q, u, v);
        let ex = target.0 - px;
        let ey = target.1 - py;
        if ex.abs() < NEWTON_TOLERANCE && ey.abs() < NEWTON_TOLERANCE {
            return Ok((u, v));
        }

        let dxdu = (1.0 - v) * (q[1].0 - q[0].0) + v * (q[2].0 - q[3].0);
        let dydu = (1.0 - v) * (q[1].1 - q[0].1) + v * (q[2].1 - q[3].1);
        let dxdv = (1.0 - u) * (q[3].0 - q[0].0) + u * (q[2].0 - q[1].0);
        let dydv = (1.0 - u) * (q[3].1 - q[0].1) + u * (q[2].1 - q[1].1);

        let det = dxdu * dydv - dxdv * dydu;
        if det.abs() < 1e-9 {
            return Err(singular());
        }
        u += (ex * dydv - ey * dxdv) / det;
        v += (ey * dxdu - ex * dydu) / det;
        if !u.is_finite() || !v.is_finite() {
            return Err(singular());
        }
    }

    let (px, py) = bilinear_point(q, u, v);
    if (target.0 - px).abs() <= NEWTON_ACCEPT_RESIDUAL && (target.1 - py).abs() <= NEWTON_ACCEPT_RESIDUAL {
        Ok((u, v))
    } else {
        Err(singular())
    }
}

/// Signed shoelace area.
fn quad_area(q: &Quad) -> f64 {
    let mut sum = 0.0;
    for i in 0..4 {
        let (x0, y0) = q[i];
        let (x1, y1) = q[(i + 1) % 4];
        sum += x0 * y1 - x1 * y0;
    }
    sum / 2.0
}

fn distance_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (abx, aby) = (b.0 - a.0, b.1 - a.1);
    let len_sq = abx * abx + aby * aby;
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (((p.0 - a.0) * abx + (p.1 - a.1) * aby) / len_sq).clamp(0.0, 1.0)
    };
    let (dx, dy) = (p.0 - (a.0 + t * abx), p.1 - (a.1 + t * aby));
    (dx * dx + dy * dy).sqrt()
}

/// Even-odd point-in-polygon test, counting points within half a pixel of an
/// edge as inside so the outline itself is kept.
pub fn point_in_quad(q: &Quad, p: (f64, f64)) -> bool {
    let mut inside = false;
    for i in 0..4 {
        let a = q[i];
        let b = q[(i + 1) % 4];
        if distance_to_segment(p, a, b) <= 0.5 {
            return true;
        }
        if (a.1 > p.1) != (b.1 > p.1) {
            let cross_x = a.0 + (p.1 - a.1) / (b.1 - a.1) * (b.0 - a.0);
            if p.0 < cross_x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Warp the image so its corners land on `corners` (normalized to the image
/// size). The result is sized to the quad's bounding box; pixels outside the
/// quad are transparent.
pub fn free_transform(src: &PixelBuffer, corners: &Corners, interpolation: Interpolation) -> PixelBuffer {
    if corners.is_identity() || src.width < 2 || src.height < 2 {
        return src.clone();
    }
    let span_x = (src.width - 1) as f64;
    let span_y = (src.height - 1) as f64;
    let to_px = |c: crate::ops::Corner| (c.x * span_x, c.y * span_y);
    let quad: Quad = [
        to_px(corners.tl),
        to_px(corners.tr),
        to_px(corners.br),
        to_px(corners.bl),
    ];

    let min_x = quad.iter().map(|p| p.0).fold(f64::INFINITY, f64::min).floor();
    let max_x = quad.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max).ceil();
    let min_y = quad.iter().map(|p| p.1).fold(f64::INFINITY, f64::min).floor();
    let max_y = quad.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max).ceil();
    let out_w = (max_x - min_x + 1.0).max(1.0) as u32;
    let out_h = (max_y - min_y + 1.0).max(1.0) as u32;

    if quad_area(&quad).abs() < 1.0 {
        trace!(target: "imgcrate::geometry", out_w, out_h, "degenerate quad, emitting transparent canvas");
        return PixelBuffer::new(out_w, out_h);
    }

    let local: Quad = quad.map(|(x, y)| (x - min_x, y - min_y));

    PixelBuffer::from_rows(out_w, out_h, |y, row| {
        for x in 0..out_w {
            let target = (x as f64, y as f64);
            if !point_in_quad(&local, target) {
                continue;
            }
            let Ok((u, v)) = inverse_bilinear(&local, target, (x, y)) else {
                continue;
            };
            let range = -UV_SLACK..=1.0 + UV_SLACK;
            if !range.contains(&u) || !range.contains(&v) {
                continue;
            }
            let (u, v) = (u.clamp(0.0, 1.0), v.clamp(0.0, 1.0));
            let px = sample(src, u * span_x, v * span_y, interpolation);
            let o = x as usize * 4;
            row[o..o + 4].copy_from_slice(&px);
        }
    })
}
