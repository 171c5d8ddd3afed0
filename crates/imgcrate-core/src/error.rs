use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no image loaded")]
    NotLoaded,

    #[error("invalid geometry {width}x{height}: {reason}")]
    InvalidGeometry {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("watermark asset unavailable: {0}")]
    AssetLoadFailed(String),

    #[error("inverse projection did not converge at ({x}, {y})")]
    SingularTransform { x: u32, y: u32 },

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("config file version {got} is newer than supported {max}")]
    VersionTooNew { got: String, max: String },

    #[error("config file version {got} is older than minimum {min}")]
    VersionTooOld { got: String, min: String },

    #[error("invalid config file: {0}")]
    InvalidConfigFile(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn invalid_geometry(width: u32, height: u32, reason: impl Into<String>) -> Self {
        CoreError::InvalidGeometry {
            width,
            height,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
