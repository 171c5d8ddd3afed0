//! Overlay compositing: text/image watermarks, color and gradient overlays,
//! borders.
//!
//! Glyph rasterization and image decoding live outside the core; the
//! compositor receives ready-made RGBA marks through [`MarkSource`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::PixelBuffer;
use crate::error::{CoreError, Result};
use crate::filters::gaussian_blur;
use crate::geometry::{resize, rotate_flip};
use crate::ops::{WatermarkMode, WatermarkParams, WatermarkPosition, WatermarkType};

pub const MIN_FONT_SIZE: f64 = 8.0;
pub const MIN_IMAGE_SCALE: f64 = 0.05;
pub const MAX_IMAGE_SCALE: f64 = 2.0;

/// Provider of watermark rasters.
pub trait MarkSource: Send + Sync {
    /// Render `text` at `font_size` pixels in `color`, tightly cropped to the
    /// glyph bounds, on a transparent background.
    fn rasterize_text(&self, text: &str, font_size: f64, color: [u8; 3]) -> Result<PixelBuffer>;

    /// Decode the image identified by `source` (path, URL or data URL).
    fn decode_image(&self, source: &str) -> Result<PixelBuffer>;
}

/// Holds at most one decoded watermark image, keyed by its source string.
#[derive(Debug, Default)]
pub struct MarkCache {
    slot: Option<(String, PixelBuffer)>,
    disabled: bool,
}

impl MarkCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            slot: None,
            disabled: !enabled,
        }
    }

    pub fn cached_source(&self) -> Option<&str> {
        self.slot.as_ref().map(|(key, _)| key.as_str())
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }

    /// Return the image for `source`, decoding only on a miss.
    pub fn get_or_load(&mut self, source: &str, loader: &dyn MarkSource) -> Result<&PixelBuffer> {
        let hit = !self.disabled && self.slot.as_ref().is_some_and(|(key, _)| key == source);
        if !hit {
            let image = loader.decode_image(source)?;
            debug!(
                target: "imgcrate::compositor",
                width = image.width,
                height = image.height,
                "decoded watermark image"
            );
            self.slot = Some((source.to_string(), image));
        }
        match &self.slot {
            Some((_, image)) => Ok(image),
            None => Err(CoreError::AssetLoadFailed(source.to_string())),
        }
    }
}

/// Soft drop shadow drawn beneath a mark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub opacity: f64,
    /// Blur extent in pixels; the Gaussian sigma is half of this.
    pub blur: f64,
    pub offset: (i64, i64),
}

pub const TEXT_SHADOW: Shadow = Shadow {
    opacity: 0.35,
    blur: 6.0,
    offset: (1, 1),
};

pub const IMAGE_SHADOW: Shadow = Shadow {
    opacity: 0.25,
    blur: 4.0,
    offset: (1, 1),
};

/// Parse `#rgb` or `#rrggbb`.
pub fn parse_hex_color(s: &str) -> Option<[u8; 3]> {
    let hex = s.trim().strip_prefix('#')?;
    let channel = |h: &str| u8::from_str_radix(h, 16).ok();
    match hex.len() {
        6 => Some([channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?]),
        3 => {
            let mut out = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(out)
        }
        _ => None,
    }
}

// =============================================================================
// Blending
// =============================================================================

/// Porter-Duff "over" of `src` onto `dst` with `src`'s top-left at
/// `(x, y)`. Source alpha is scaled by `opacity`; parts outside `dst` are
/// clipped.
pub fn blend_over(dst: &mut PixelBuffer, src: &PixelBuffer, x: i64, y: i64, opacity: f64) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return;
    }
    let x_start = x.max(0);
    let y_start = y.max(0);
    let x_end = (x + src.width as i64).min(dst.width as i64);
    let y_end = (y + src.height as i64).min(dst.height as i64);
    if x_start >= x_end || y_start >= y_end {
        return;
    }

    for dy in y_start..y_end {
        for dx in x_start..x_end {
            let s = src.pixel((dx - x) as u32, (dy - y) as u32);
            let sa = (s[3] as f64 * opacity).round() as u32;
            if sa == 0 {
                continue;
            }
            let d = dst.pixel_mut(dx as u32, dy as u32);
            if sa == 255 {
                d.copy_from_slice(s);
                continue;
            }
            let da = d[3] as u32;
            let inv_sa = 255 - sa;
            let out_a = sa + (da * inv_sa + 127) / 255;
            for c in 0..3 {
                let sc = s[c] as u32;
                let dc = d[c] as u32;
                let num = sc * sa + (dc * da * inv_sa + 127) / 255;
                d[c] = ((num + out_a / 2) / out_a).min(255) as u8;
            }
            d[3] = out_a.min(255) as u8;
        }
    }
}

/// Pad `mark` and draw its blurred, offset silhouette beneath it. Returns the
/// sprite and the padding added on every side.
pub fn with_shadow(mark: &PixelBuffer, shadow: &Shadow) -> (PixelBuffer, u32) {
    let sigma = shadow.blur / 2.0;
    let reach = (sigma * 3.0).ceil() as i64 + shadow.offset.0.abs().max(shadow.offset.1.abs());
    let pad = reach.max(0) as u32;
    let mut sprite = PixelBuffer::new(mark.width + 2 * pad, mark.height + 2 * pad);

    for y in 0..mark.height {
        for x in 0..mark.width {
            let a = mark.pixel(x, y)[3] as f64 * shadow.opacity;
            let sx = (x + pad) as i64 + shadow.offset.0;
            let sy = (y + pad) as i64 + shadow.offset.1;
            if sx >= 0 && sy >= 0 && (sx as u32) < sprite.width && (sy as u32) < sprite.height {
                sprite.pixel_mut(sx as u32, sy as u32)[3] = a.round() as u8;
            }
        }
    }
    let mut sprite = gaussian_blur(&sprite, sigma);
    blend_over(&mut sprite, mark, pad as i64, pad as i64, 1.0);
    (sprite, pad)
}

// =============================================================================
// Watermark
// =============================================================================

/// Top-left corner of a `mark_w x mark_h` mark on the canvas.
pub fn mark_position(
    params: &WatermarkParams,
    canvas_w: f64,
    canvas_h: f64,
    mark_w: f64,
    mark_h: f64,
) -> (f64, f64) {
    let (ox, oy) = (params.offset_x, params.offset_y);
    match (params.position, params.anchor_x, params.anchor_y) {
        (WatermarkPosition::Custom, Some(ax), Some(ay)) => (
            ax.clamp(0.0, (canvas_w - mark_w).max(0.0)),
            ay.clamp(0.0, (canvas_h - mark_h).max(0.0)),
        ),
        (WatermarkPosition::Custom, _, _) | (WatermarkPosition::TopLeft, _, _) => (ox, oy),
        (WatermarkPosition::TopRight, _, _) => (canvas_w - mark_w - ox, oy),
        (WatermarkPosition::BottomLeft, _, _) => (ox, canvas_h - mark_h - oy),
        (WatermarkPosition::BottomRight, _, _) => (canvas_w - mark_w - ox, canvas_h - mark_h - oy),
        (WatermarkPosition::Center, _, _) => ((canvas_w - mark_w) / 2.0, (canvas_h - mark_h) / 2.0),
    }
}

/// Tile origins covering the canvas inflated by half its diagonal on every
/// side, so rotated tiles leave no uncovered corners.
pub fn pattern_origins(
    canvas_w: f64,
    canvas_h: f64,
    mark_w: f64,
    mark_h: f64,
    spacing_x: f64,
    spacing_y: f64,
) -> Vec<(f64, f64)> {
    let step_x = (mark_w + spacing_x).max(1.0);
    let step_y = (mark_h + spacing_y).max(1.0);
    let diagonal = (canvas_w * canvas_w + canvas_h * canvas_h).sqrt();
    let (start_x, start_y) = (-diagonal / 2.0, -diagonal / 2.0);
    let (end_x, end_y) = (canvas_w + diagonal / 2.0, canvas_h + diagonal / 2.0);

    let mut origins = Vec::new();
    let mut y = start_y;
    while y < end_y {
        let mut x = start_x;
        while x < end_x {
            origins.push((x, y));
            x += step_x;
        }
        y += step_y;
    }
    origins
}

/// Build the mark raster for `params`, before shadow and rotation.
fn load_mark(
    params: &WatermarkParams,
    source: &dyn MarkSource,
    cache: &mut MarkCache,
) -> Result<(PixelBuffer, Shadow)> {
    match params.kind {
        WatermarkType::Text => {
            let color = parse_hex_color(&params.color).unwrap_or([255, 255, 255]);
            let mark = source.rasterize_text(&params.text, params.font_size.max(MIN_FONT_SIZE), color)?;
            Ok((mark, TEXT_SHADOW))
        }
        WatermarkType::Image => {
            let image = cache.get_or_load(&params.image_source, source)?;
            let scale = params.scale.clamp(MIN_IMAGE_SCALE, MAX_IMAGE_SCALE);
            let w = (image.width as f64 * scale).round().max(1.0) as u32;
            let h = (image.height as f64 * scale).round().max(1.0) as u32;
            Ok((resize(image, w, h)?, IMAGE_SHADOW))
        }
        WatermarkType::None => Err(CoreError::AssetLoadFailed("no watermark type".into())),
    }
}

/// Draw the watermark described by `params` onto `canvas`.
///
/// Fails with `AssetLoadFailed` when the mark cannot be produced; the canvas
/// is untouched in that case.
pub fn apply_watermark(
    canvas: &mut PixelBuffer,
    params: &WatermarkParams,
    source: Option<&dyn MarkSource>,
    cache: &mut MarkCache,
) -> Result<()> {
    if params.is_noop() || canvas.is_empty() {
        return Ok(());
    }
    let source = source.ok_or_else(|| CoreError::AssetLoadFailed("no mark source configured".into()))?;
    let (mark, shadow) = load_mark(params, source, cache)?;
    if mark.is_empty() {
        return Ok(());
    }

    let (sprite, _pad) = with_shadow(&mark, &shadow);
    let sprite = if params.rotation.rem_euclid(360.0) == 0.0 {
        sprite
    } else {
        rotate_flip(&sprite, params.rotation, false, false)
    };

    let (cw, ch) = (canvas.width as f64, canvas.height as f64);
    let (mw, mh) = (mark.width as f64, mark.height as f64);
    let origins = match params.mode {
        WatermarkMode::Single => vec![mark_position(params, cw, ch, mw, mh)],
        WatermarkMode::Pattern => pattern_origins(cw, ch, mw, mh, params.spacing_x, params.spacing_y),
    };
    debug!(
        target: "imgcrate::compositor",
        tiles = origins.len(),
        mark_w = mark.width,
        mark_h = mark.height,
        "drawing watermark"
    );

    let opacity = params.opacity.clamp(0.0, 1.0);
    for (x, y) in origins {
        // the sprite is centred on the mark's centre
        let left = x + mw / 2.0 - sprite.width as f64 / 2.0;
        let top = y + mh / 2.0 - sprite.height as f64 / 2.0;
        blend_over(canvas, &sprite, left.round() as i64, top.round() as i64, opacity);
    }
    Ok(())
}

// =============================================================================
// Overlays
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlendMode {
    #[default]
    Multiply,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GradientDirection {
    Horizontal,
    #[default]
    Vertical,
    Diagonal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    /// 0-1 along the gradient axis.
    pub offset: f64,
    pub color: [u8; 3],
}

fn mix(a: u8, b: f64, t: f64) -> u8 {
    (a as f64 * (1.0 - t) + b * t).round().clamp(0.0, 255.0) as u8
}

/// Tint RGB with `color` at `opacity`. Alpha is unchanged.
pub fn color_overlay(buf: &mut PixelBuffer, color: [u8; 3], opacity: f64, mode: BlendMode) {
    let t = opacity.clamp(0.0, 1.0);
    for px in buf.data.chunks_exact_mut(4) {
        for c in 0..3 {
            let top = match mode {
                BlendMode::Multiply => px[c] as f64 * color[c] as f64 / 255.0,
                BlendMode::Normal => color[c] as f64,
            };
            px[c] = mix(px[c], top, t);
        }
    }
}

/// Color of the gradient at `t`, clamped to the first and last stops.
pub fn gradient_color(stops: &[ColorStop], t: f64) -> Option<[f64; 3]> {
    let mut sorted = stops.to_vec();
    sorted.sort_by(|a, b| a.offset.total_cmp(&b.offset));
    let first = sorted.first()?;
    let last = sorted.last()?;
    let as_f = |c: [u8; 3]| c.map(|v| v as f64);
    if t <= first.offset {
        return Some(as_f(first.color));
    }
    if t >= last.offset {
        return Some(as_f(last.color));
    }
    for pair in sorted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t >= a.offset && t <= b.offset {
            let span = (b.offset - a.offset).max(1e-9);
            let k = (t - a.offset) / span;
            return Some([0, 1, 2].map(|c| a.color[c] as f64 + (b.color[c] as f64 - a.color[c] as f64) * k));
        }
    }
    Some(as_f(last.color))
}

/// Blend a linear gradient over RGB at `opacity`. No-op without stops.
pub fn gradient_overlay(buf: &mut PixelBuffer, stops: &[ColorStop], direction: GradientDirection, opacity: f64) {
    if stops.is_empty() || buf.is_empty() {
        return;
    }
    let t_op = opacity.clamp(0.0, 1.0);
    let (w, h) = (buf.width as f64, buf.height as f64);
    let diag_sq = w * w + h * h;
    for y in 0..buf.height {
        for x in 0..buf.width {
            let (fx, fy) = (x as f64 + 0.5, y as f64 + 0.5);
            let t = match direction {
                GradientDirection::Horizontal => fx / w,
                GradientDirection::Vertical => fy / h,
                GradientDirection::Diagonal => (fx * w + fy * h) / diag_sq,
            };
            let Some(color) = gradient_color(stops, t) else {
                return;
            };
            let px = buf.pixel_mut(x, y);
            for c in 0..3 {
                px[c] = mix(px[c], color[c], t_op);
            }
        }
    }
}

/// Opaque stroke `width` pixels wide along the inside of the canvas edge.
pub fn add_border(buf: &mut PixelBuffer, width: u32, color: [u8; 3]) {
    if width == 0 {
        return;
    }
    let (w, h) = (buf.width, buf.height);
    for y in 0..h {
        for x in 0..w {
            let on_edge = x < width || y < width || x + width >= w || y + width >= h;
            if on_edge {
                buf.pixel_mut(x, y)
                    .copy_from_slice(&[color[0], color[1], color[2], 255]);
            }
        }
    }
}
