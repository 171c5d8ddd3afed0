pub mod buffer;
pub mod color;
pub mod compositor;
pub mod config;
pub mod editor;
pub mod error;
pub mod filters;
pub mod geometry;
pub mod history;
pub mod ops;
pub mod pipeline;
pub mod scheduler;

pub use buffer::PixelBuffer;
pub use editor::Editor;
pub use error::{CoreError, Result};
pub use ops::Ops;
