use imgcrate_core::error::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid target size {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },

    #[error("encoder error: {0}")]
    EncoderError(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, ExportError>;
