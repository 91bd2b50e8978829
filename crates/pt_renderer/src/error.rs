use thiserror::Error;

/// Errors raised by the renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Invalid resolution: {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },

    #[error("Scene too large for GPU buffers: {buffer} needs {size} bytes, device limit is {limit}")]
    SceneTooLarge {
        buffer: &'static str,
        size: u64,
        limit: u64,
    },

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Image export error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid render config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;
