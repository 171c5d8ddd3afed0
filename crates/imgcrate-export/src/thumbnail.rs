use imgcrate_core::buffer::PixelBuffer;
use serde::{Deserialize, Serialize};

use crate::compress::{CompressSettings, ResampleMethod, target_dimensions};
use crate::encoder::OutputFormat;
use crate::error::Result;
use crate::resample::{ResampleKernel, resample};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThumbnailSettings {
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    /// 0-100.
    pub quality: u8,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            width: 400,
            height: 400,
            format: OutputFormat::Jpeg,
            quality: 85,
        }
    }
}

impl ThumbnailSettings {
    /// Compress settings producing this thumbnail.
    pub fn compress_settings(&self) -> CompressSettings {
        CompressSettings {
            quality: self.quality,
            format: self.format,
            max_width: Some(self.width),
            max_height: Some(self.height),
            maintain_aspect: true,
            resample_method: ResampleMethod::Lanczos,
            ..CompressSettings::default()
        }
    }
}

/// Fit `src` inside the thumbnail box with Lanczos-3. Images already inside
/// the box are returned unchanged.
pub fn thumbnail(src: &PixelBuffer, settings: &ThumbnailSettings) -> Result<PixelBuffer> {
    let (w, h) = target_dimensions(src.width, src.height, &settings.compress_settings());
    resample(src, w, h, ResampleKernel::Lanczos { lobes: 3 })
}
