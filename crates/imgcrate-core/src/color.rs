//! Color and tone adjustments.
//!
//! Everything here mutates RGB in place and leaves alpha untouched. Per-level
//! mappings go through a 256-entry [`Lut`] built once per call.

use rayon::prelude::*;

use crate::buffer::PixelBuffer;
use crate::ops::{ColorBalanceParams, ColorBalanceZone, LevelsParams, ToneCurvePoint};

/// Rec. 709 luma weights.
pub const LUMA_R: f64 = 0.2126;
pub const LUMA_G: f64 = 0.7152;
pub const LUMA_B: f64 = 0.0722;

#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> f64 {
    LUMA_R * r as f64 + LUMA_G * g as f64 + LUMA_B * b as f64
}

#[inline]
pub(crate) fn clamp_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Run `f` on every RGBA pixel, one rayon task per row.
pub(crate) fn for_each_pixel<F>(buf: &mut PixelBuffer, f: F)
where
    F: Fn(&mut [u8]) + Sync + Send,
{
    if buf.is_empty() {
        return;
    }
    let row_bytes = buf.row_bytes();
    buf.data.par_chunks_exact_mut(row_bytes).for_each(|row| {
        for pixel in row.chunks_exact_mut(4) {
            f(pixel);
        }
    });
}

// =============================================================================
// Lookup tables
// =============================================================================

/// A per-level mapping applied identically to R, G and B.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lut([u8; 256]);

impl Lut {
    pub fn identity() -> Self {
        let mut table = [0u8; 256];
        for (i, v) in table.iter_mut().enumerate() {
            *v = i as u8;
        }
        Lut(table)
    }

    /// Tabulate `f` over 0..=255, rounding and clamping each result.
    pub fn from_fn(f: impl Fn(f64) -> f64) -> Self {
        let mut table = [0u8; 256];
        for (i, v) in table.iter_mut().enumerate() {
            *v = clamp_u8(f(i as f64));
        }
        Lut(table)
    }

    /// The table that applies `self` first and then `next`.
    pub fn then(&self, next: &Lut) -> Lut {
        let mut table = [0u8; 256];
        for (i, v) in table.iter_mut().enumerate() {
            *v = next.0[self.0[i] as usize];
        }
        Lut(table)
    }

    #[inline]
    pub fn map(&self, v: u8) -> u8 {
        self.0[v as usize]
    }

    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(i, &v)| i as u8 == v)
    }

    pub fn apply(&self, buf: &mut PixelBuffer) {
        for_each_pixel(buf, |px| {
            px[0] = self.map(px[0]);
            px[1] = self.map(px[1]);
            px[2] = self.map(px[2]);
        });
    }
}

/// Multiplicative brightness. `value` is 0-200 with 100 as identity.
pub fn brightness_lut(value: f64) -> Lut {
    let factor = value / 100.0;
    Lut::from_fn(|v| v * factor)
}

/// Linear contrast about mid-grey 128. `value` is 0-200 with 100 as identity.
pub fn contrast_lut(value: f64) -> Lut {
    let factor = value / 100.0;
    Lut::from_fn(|v| (v - 128.0) * factor + 128.0)
}

/// `out = 255 * (in / 255) ^ (1 / gamma)`.
pub fn gamma_lut(gamma: f64) -> Lut {
    let inverse = 1.0 / gamma.max(0.01);
    Lut::from_fn(|v| 255.0 * (v / 255.0).powf(inverse))
}

/// Piecewise-linear curve through the control points. Returns `None` when
/// fewer than two points are supplied.
pub fn tone_curve_lut(points: &[ToneCurvePoint]) -> Option<Lut> {
    if points.len() < 2 {
        return None;
    }
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x));
    let first = sorted[0];
    let last = sorted[sorted.len() - 1];

    Some(Lut::from_fn(|i| {
        let t = i / 255.0;
        if t <= first.x {
            return first.y * 255.0;
        }
        if t >= last.x {
            return last.y * 255.0;
        }
        let (p1, p2) = sorted
            .windows(2)
            .map(|w| (w[0], w[1]))
            .find(|(a, b)| t >= a.x && t <= b.x)
            .unwrap_or((first, last));
        let span = (p2.x - p1.x).max(1e-4);
        let local = (t - p1.x) / span;
        (p1.y + (p2.y - p1.y) * local) * 255.0
    }))
}

pub fn levels_lut(params: &LevelsParams) -> Lut {
    let input_black = params.input_black as f64;
    let input_range = (params.input_white as f64 - input_black).max(1.0);
    let output_black = params.output_black as f64;
    let output_range = params.output_white as f64 - output_black;
    let inverse_gamma = 1.0 / params.gamma.max(0.01);

    Lut::from_fn(|i| {
        let normalized = ((i - input_black) / input_range).clamp(0.0, 1.0);
        output_black + normalized.powf(inverse_gamma) * output_range
    })
}

/// Quantize to `levels` evenly spaced steps. `None` below two levels.
pub fn posterize_lut(levels: u32) -> Option<Lut> {
    if levels < 2 {
        return None;
    }
    let step = 255.0 / (levels - 1) as f64;
    Some(Lut::from_fn(|v| ((v / step).round() * step).round()))
}

// =============================================================================
// Adjustments
// =============================================================================

pub fn adjust_brightness(buf: &mut PixelBuffer, value: f64) {
    brightness_lut(value).apply(buf);
}

pub fn adjust_contrast(buf: &mut PixelBuffer, value: f64) {
    contrast_lut(value).apply(buf);
}

pub fn adjust_gamma(buf: &mut PixelBuffer, gamma: f64) {
    gamma_lut(gamma).apply(buf);
}

pub fn apply_tone_curve(buf: &mut PixelBuffer, points: &[ToneCurvePoint]) {
    if let Some(lut) = tone_curve_lut(points) {
        lut.apply(buf);
    }
}

pub fn apply_levels(buf: &mut PixelBuffer, params: &LevelsParams) {
    levels_lut(params).apply(buf);
}

pub fn posterize(buf: &mut PixelBuffer, levels: u32) {
    if let Some(lut) = posterize_lut(levels) {
        lut.apply(buf);
    }
}

/// Luma-preserving saturation. `value` is 0-200 with 100 as identity.
pub fn adjust_saturation(buf: &mut PixelBuffer, value: f64) {
    let factor = value / 100.0;
    for_each_pixel(buf, |px| {
        let gray = luma(px[0], px[1], px[2]);
        for c in px.iter_mut().take(3) {
            *c = clamp_u8(gray + (*c as f64 - gray) * factor);
        }
    });
}

/// Rotate hue by `degrees` through an HSL round trip.
pub fn adjust_hue(buf: &mut PixelBuffer, degrees: f64) {
    let shift = degrees / 360.0;
    for_each_pixel(buf, |px| {
        let (h, s, l) = rgb_to_hsl(px[0], px[1], px[2]);
        let (r, g, b) = hsl_to_rgb((h + shift).rem_euclid(1.0), s, l);
        px[0] = r;
        px[1] = g;
        px[2] = b;
    });
}

pub fn grayscale(buf: &mut PixelBuffer) {
    for_each_pixel(buf, |px| {
        let gray = clamp_u8(luma(px[0], px[1], px[2]));
        px[0] = gray;
        px[1] = gray;
        px[2] = gray;
    });
}

pub fn sepia(buf: &mut PixelBuffer) {
    for_each_pixel(buf, |px| {
        let (r, g, b) = (px[0] as f64, px[1] as f64, px[2] as f64);
        px[0] = clamp_u8(0.393 * r + 0.769 * g + 0.189 * b);
        px[1] = clamp_u8(0.349 * r + 0.686 * g + 0.168 * b);
        px[2] = clamp_u8(0.272 * r + 0.534 * g + 0.131 * b);
    });
}

pub fn negative(buf: &mut PixelBuffer) {
    for_each_pixel(buf, |px| {
        px[0] = 255 - px[0];
        px[1] = 255 - px[1];
        px[2] = 255 - px[2];
    });
}

/// Binarize on luma: `>= threshold` becomes white, everything else black.
pub fn threshold(buf: &mut PixelBuffer, threshold: u8) {
    let t = threshold as f64;
    for_each_pixel(buf, |px| {
        let v = if luma(px[0], px[1], px[2]) >= t { 255 } else { 0 };
        px[0] = v;
        px[1] = v;
        px[2] = v;
    });
}

/// Zone weights `(shadow, midtone, highlight)` for a normalized luminance.
pub fn color_balance_weights(lum: f64) -> (f64, f64, f64) {
    let shadow = (1.0 - lum * 3.0).max(0.0);
    let highlight = ((lum - 0.66) * 3.0).max(0.0);
    (shadow, 1.0 - shadow - highlight, highlight)
}

/// Shift red/green/blue against cyan/magenta/yellow per tonal zone.
pub fn apply_color_balance(buf: &mut PixelBuffer, params: &ColorBalanceParams) {
    let zones = [params.shadows, params.midtones, params.highlights];
    for_each_pixel(buf, |px| {
        let lum = (px[0] as f64 + px[1] as f64 + px[2] as f64) / 3.0 / 255.0;
        let (s, m, h) = color_balance_weights(lum);
        let weighted = |pick: fn(&ColorBalanceZone) -> f64| {
            pick(&zones[0]) * s + pick(&zones[1]) * m + pick(&zones[2]) * h
        };
        let cyan = weighted(|z| z.cyan);
        let magenta = weighted(|z| z.magenta);
        let yellow = weighted(|z| z.yellow);
        px[0] = clamp_u8(px[0] as f64 - cyan);
        px[1] = clamp_u8(px[1] as f64 - magenta);
        px[2] = clamp_u8(px[2] as f64 - yellow);
    });
}

// =============================================================================
// HSL
// =============================================================================

/// RGB (0-255) to HSL with every component in `[0, 1]`.
pub fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        ((g - b) / d + if g < b { 6.0 } else { 0.0 }) / 6.0
    } else if max == g {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };
    (h, s, l)
}

pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    if s == 0.0 {
        let v = clamp_u8(l * 255.0);
        return (v, v, v);
    }

    fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    (
        clamp_u8(hue_to_rgb(p, q, h + 1.0 / 3.0) * 255.0),
        clamp_u8(hue_to_rgb(p, q, h) * 255.0),
        clamp_u8(hue_to_rgb(p, q, h - 1.0 / 3.0) * 255.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(rgba: [u8; 4]) -> PixelBuffer {
        PixelBuffer::filled(1, 1, rgba)
    }

    fn ramp() -> PixelBuffer {
        let mut buf = PixelBuffer::new(256, 1);
        for x in 0..256u32 {
            let v = x as u8;
            buf.pixel_mut(x, 0).copy_from_slice(&[v, v, v, 200]);
        }
        buf
    }

    #[test]
    fn test_identity_luts() {
        assert!(brightness_lut(100.0).is_identity());
        assert!(contrast_lut(100.0).is_identity());
        assert!(gamma_lut(1.0).is_identity());
        assert!(levels_lut(&LevelsParams::default()).is_identity());
    }

    #[test]
    fn test_lut_then_composes_in_order() {
        let double = Lut::from_fn(|v| v * 2.0);
        let minus_ten = Lut::from_fn(|v| v - 10.0);
        let lut = double.then(&minus_ten);
        assert_eq!(lut.map(20), 30);
        assert_eq!(lut.map(200), 245);
    }

    #[test]
    fn test_brightness_scales_and_clamps() {
        let mut buf = single([100, 200, 10, 77]);
        adjust_brightness(&mut buf, 150.0);
        assert_eq!(buf.pixel(0, 0), &[150, 255, 15, 77]);
    }

    #[test]
    fn test_contrast_pivots_on_128() {
        let mut buf = single([128, 64, 192, 255]);
        adjust_contrast(&mut buf, 200.0);
        assert_eq!(buf.pixel(0, 0), &[128, 0, 255, 255]);
    }

    #[test]
    fn test_saturation_zero_gives_luma_gray() {
        let mut buf = single([255, 0, 0, 255]);
        adjust_saturation(&mut buf, 0.0);
        assert_eq!(buf.pixel(0, 0), &[54, 54, 54, 255]);
    }

    #[test]
    fn test_gamma_above_one_brightens() {
        let mut buf = ramp();
        let before = buf.clone();
        adjust_gamma(&mut buf, 2.2);
        for (a, b) in buf.data.chunks(4).zip(before.data.chunks(4)) {
            assert!(a[0] >= b[0]);
            assert_eq!(a[3], 200);
        }
    }

    #[test]
    fn test_gamma_below_one_darkens() {
        let mut buf = ramp();
        let before = buf.clone();
        adjust_gamma(&mut buf, 0.5);
        for (a, b) in buf.data.chunks(4).zip(before.data.chunks(4)) {
            assert!(a[0] <= b[0]);
        }
    }

    #[test]
    fn test_tone_curve_diagonal_is_identity() {
        let points = [
            ToneCurvePoint::new(0.0, 0.0),
            ToneCurvePoint::new(0.5, 0.5),
            ToneCurvePoint::new(1.0, 1.0),
        ];
        assert!(tone_curve_lut(&points).unwrap().is_identity());
    }

    #[test]
    fn test_tone_curve_sorts_points_and_holds_ends() {
        let points = [
            ToneCurvePoint::new(0.75, 1.0),
            ToneCurvePoint::new(0.25, 0.0),
        ];
        let lut = tone_curve_lut(&points).unwrap();
        assert_eq!(lut.map(0), 0);
        assert_eq!(lut.map(255), 255);
        assert_eq!(lut.map(60), 0);
        assert_eq!(lut.map(200), 255);
        // halfway between x=0.25 and x=0.75
        assert!((127..=129).contains(&lut.map(128)));
    }

    #[test]
    fn test_tone_curve_needs_two_points() {
        assert!(tone_curve_lut(&[ToneCurvePoint::new(0.5, 0.5)]).is_none());
    }

    #[test]
    fn test_levels_clips_input_range() {
        let lut = levels_lut(&LevelsParams {
            input_black: 50,
            input_white: 200,
            ..LevelsParams::default()
        });
        assert_eq!(lut.map(10), 0);
        assert_eq!(lut.map(50), 0);
        assert_eq!(lut.map(125), 128);
        assert_eq!(lut.map(230), 255);
    }

    #[test]
    fn test_levels_output_range() {
        let lut = levels_lut(&LevelsParams {
            output_black: 20,
            output_white: 120,
            ..LevelsParams::default()
        });
        assert_eq!(lut.map(0), 20);
        assert_eq!(lut.map(255), 120);
    }

    #[test]
    fn test_posterize_two_levels() {
        let mut buf = single([100, 130, 255, 9]);
        posterize(&mut buf, 2);
        assert_eq!(buf.pixel(0, 0), &[0, 255, 255, 9]);
    }

    #[test]
    fn test_posterize_is_idempotent() {
        for levels in [2, 3, 5, 8, 16] {
            let mut once = ramp();
            posterize(&mut once, levels);
            let mut twice = once.clone();
            posterize(&mut twice, levels);
            assert_eq!(once, twice, "levels={levels}");
        }
    }

    #[test]
    fn test_posterize_below_two_is_noop() {
        let mut buf = ramp();
        posterize(&mut buf, 1);
        assert_eq!(buf, ramp());
    }

    #[test]
    fn test_threshold_uses_luma() {
        let mut red = single([255, 0, 0, 255]);
        threshold(&mut red, 128);
        assert_eq!(red.pixel(0, 0), &[0, 0, 0, 255]);

        let mut green = single([0, 255, 0, 255]);
        threshold(&mut green, 128);
        assert_eq!(green.pixel(0, 0), &[255, 255, 255, 255]);
    }

    #[test]
    fn test_sepia_and_negative() {
        let mut buf = single([100, 100, 100, 255]);
        sepia(&mut buf);
        assert_eq!(buf.pixel(0, 0), &[135, 120, 94, 255]);

        let mut buf = single([0, 100, 255, 3]);
        negative(&mut buf);
        assert_eq!(buf.pixel(0, 0), &[255, 155, 0, 3]);
    }

    #[test]
    fn test_grayscale_preserves_alpha() {
        let mut buf = single([0, 255, 0, 40]);
        grayscale(&mut buf);
        assert_eq!(buf.pixel(0, 0), &[182, 182, 182, 40]);
    }

    #[test]
    fn test_hsl_roundtrip_primaries() {
        for rgb in [(255, 0, 0), (0, 255, 0), (0, 0, 255), (12, 200, 99), (80, 80, 80)] {
            let (h, s, l) = rgb_to_hsl(rgb.0, rgb.1, rgb.2);
            assert_eq!(hsl_to_rgb(h, s, l), rgb);
        }
    }

    #[test]
    fn test_hue_rotation_red_to_green() {
        let mut buf = single([255, 0, 0, 255]);
        adjust_hue(&mut buf, 120.0);
        assert_eq!(buf.pixel(0, 0), &[0, 255, 0, 255]);

        let mut buf = single([255, 0, 0, 255]);
        adjust_hue(&mut buf, -120.0);
        assert_eq!(buf.pixel(0, 0), &[0, 0, 255, 255]);
    }

    #[test]
    fn test_color_balance_weights() {
        assert_eq!(color_balance_weights(0.0), (1.0, 0.0, 0.0));
        let (s, m, h) = color_balance_weights(0.5);
        assert_eq!((s, h), (0.0, 0.0));
        assert_eq!(m, 1.0);
        let (s, _, h) = color_balance_weights(1.0);
        assert_eq!(s, 0.0);
        assert!((h - 1.02).abs() < 1e-9);
    }

    #[test]
    fn test_color_balance_shadow_cyan_reduces_red() {
        let mut buf = single([20, 20, 20, 255]);
        let params = ColorBalanceParams {
            shadows: ColorBalanceZone {
                cyan: 10.0,
                magenta: -10.0,
                yellow: 0.0,
            },
            ..ColorBalanceParams::default()
        };
        apply_color_balance(&mut buf, &params);
        let px = buf.pixel(0, 0);
        assert!(px[0] < 20);
        assert!(px[1] > 20);
        assert_eq!(px[2], 20);
    }
}
