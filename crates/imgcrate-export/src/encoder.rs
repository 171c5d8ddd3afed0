use imgcrate_core::buffer::PixelBuffer;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Container formats an encoder can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
        }
    }

    pub fn supports_alpha(self) -> bool {
        !matches!(self, Self::Jpeg)
    }

    /// Case-insensitive lookup; `jpg` is accepted for JPEG.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }
}

/// Encoded output plus the dimensions it was encoded at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Turns a raw RGBA buffer into container bytes. Codecs live outside this
/// crate; implementations wrap whatever library or platform API is at hand.
pub trait ImageEncoder: Send + Sync {
    /// `quality` is 0-1 and only meaningful for lossy formats.
    fn encode(&self, buf: &PixelBuffer, format: OutputFormat, quality: f64) -> Result<Vec<u8>>;
}
