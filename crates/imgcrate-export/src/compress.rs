use imgcrate_core::buffer::PixelBuffer;
use imgcrate_core::config::{DEFAULT_MAX_DIMENSION, EngineConfig};
use imgcrate_core::geometry;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::encoder::{EncodedImage, ImageEncoder, OutputFormat};
use crate::error::Result;
use crate::resample::{ResampleKernel, resample_within};

/// Scaler used when a compress job has to shrink the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResampleMethod {
    Lanczos,
    Bicubic,
    /// The editor's own bilinear scale.
    #[default]
    Bilinear,
}

/// "Compress/resize one image" settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompressSettings {
    /// 0-100.
    pub quality: u8,
    pub format: OutputFormat,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub maintain_aspect: bool,
    pub resample_method: ResampleMethod,
    /// Colour JPEG output is flattened onto.
    pub background: [u8; 3],
    /// Largest output side accepted.
    pub max_dimension: u32,
}

impl Default for CompressSettings {
    fn default() -> Self {
        Self {
            quality: 80,
            format: OutputFormat::Jpeg,
            max_width: None,
            max_height: None,
            maintain_aspect: true,
            resample_method: ResampleMethod::Bilinear,
            background: [255, 255, 255],
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl CompressSettings {
    /// Full-quality re-encode into `format` at the original size.
    pub fn convert_to(format: OutputFormat) -> Self {
        Self {
            quality: 100,
            format,
            ..Self::default()
        }
    }

    /// Apply the size limit from an engine config.
    pub fn limited_by(self, config: &EngineConfig) -> Self {
        Self {
            max_dimension: config.max_dimension,
            ..self
        }
    }
}

/// Output size for a `width x height` source. With `maintain_aspect` the
/// image is fit inside the limits and never enlarged; without it each set
/// limit is taken as the exact size for its axis. Zero limits are unset.
pub fn target_dimensions(width: u32, height: u32, settings: &CompressSettings) -> (u32, u32) {
    let max_w = settings.max_width.filter(|&w| w > 0);
    let max_h = settings.max_height.filter(|&h| h > 0);
    if max_w.is_none() && max_h.is_none() {
        return (width, height);
    }

    if !settings.maintain_aspect {
        return (max_w.unwrap_or(width), max_h.unwrap_or(height));
    }

    let ratio_w = max_w.map_or(f64::INFINITY, |m| m as f64 / width as f64);
    let ratio_h = max_h.map_or(f64::INFINITY, |m| m as f64 / height as f64);
    let ratio = ratio_w.min(ratio_h);
    if ratio < 1.0 {
        (
            ((width as f64 * ratio).round() as u32).max(1),
            ((height as f64 * ratio).round() as u32).max(1),
        )
    } else {
        (width, height)
    }
}

/// Resize `src` as the settings ask, or return a copy when no resize is
/// needed.
pub fn prepare(src: &PixelBuffer, settings: &CompressSettings) -> Result<PixelBuffer> {
    let (w, h) = target_dimensions(src.width, src.height, settings);
    if (w, h) == (src.width, src.height) {
        return Ok(src.clone());
    }
    debug!(
        target: "imgcrate::compress",
        from_w = src.width,
        from_h = src.height,
        to_w = w,
        to_h = h,
        method = ?settings.resample_method,
        "resizing before encode"
    );
    let limit = settings.max_dimension;
    match settings.resample_method {
        ResampleMethod::Lanczos => resample_within(src, w, h, ResampleKernel::Lanczos { lobes: 3 }, limit),
        ResampleMethod::Bicubic => resample_within(src, w, h, ResampleKernel::Bicubic, limit),
        ResampleMethod::Bilinear => {
            geometry::check_target(w, h, limit)?;
            Ok(geometry::resize(src, w, h)?)
        }
    }
}

/// Composite every pixel over an opaque `background`.
pub fn flatten_alpha(buf: &PixelBuffer, background: [u8; 3]) -> PixelBuffer {
    let mut out = buf.clone();
    for px in out.data.chunks_exact_mut(4) {
        let a = px[3] as u32;
        for c in 0..3 {
            px[c] = ((px[c] as u32 * a + background[c] as u32 * (255 - a) + 127) / 255) as u8;
        }
        px[3] = 255;
    }
    out
}

/// Prepare `src` and hand it to `encoder`.
pub fn compress<E: ImageEncoder + ?Sized>(
    src: &PixelBuffer,
    settings: &CompressSettings,
    encoder: &E,
) -> Result<EncodedImage> {
    let mut buf = prepare(src, settings)?;
    if !settings.format.supports_alpha() {
        buf = flatten_alpha(&buf, settings.background);
    }
    let quality = settings.quality.min(100) as f64 / 100.0;
    let bytes = encoder.encode(&buf, settings.format, quality)?;
    Ok(EncodedImage {
        format: settings.format,
        width: buf.width,
        height: buf.height,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits(w: Option<u32>, h: Option<u32>, keep: bool) -> CompressSettings {
        CompressSettings {
            max_width: w,
            max_height: h,
            maintain_aspect: keep,
            ..CompressSettings::default()
        }
    }

    #[test]
    fn test_no_limits_keeps_size() {
        assert_eq!(target_dimensions(640, 480, &CompressSettings::default()), (640, 480));
    }

    #[test]
    fn test_fit_inside_limits() {
        assert_eq!(target_dimensions(4000, 3000, &limits(Some(1000), None, true)), (1000, 750));
        assert_eq!(target_dimensions(4000, 3000, &limits(Some(1000), Some(500), true)), (667, 500));
    }

    #[test]
    fn test_never_upscales_with_aspect() {
        assert_eq!(target_dimensions(300, 200, &limits(Some(1000), Some(1000), true)), (300, 200));
    }

    #[test]
    fn test_exact_size_without_aspect() {
        assert_eq!(target_dimensions(300, 200, &limits(Some(1000), None, false)), (1000, 200));
        assert_eq!(target_dimensions(300, 200, &limits(Some(0), Some(50), false)), (300, 50));
    }

    #[test]
    fn test_flatten_alpha() {
        let buf = PixelBuffer::from_rgba_vec(2, 1, vec![0, 0, 0, 0, 200, 100, 0, 255]).unwrap();
        let flat = flatten_alpha(&buf, [255, 255, 255]);
        assert_eq!(flat.data, vec![255, 255, 255, 255, 200, 100, 0, 255]);
    }
}
