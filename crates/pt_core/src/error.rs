use thiserror::Error;

use crate::texture::TextureError;

/// Errors raised while ingesting scene data.
#[derive(Error, Debug)]
pub enum Error {
    #[error("index count {0} is not a multiple of 3")]
    IndexCount(usize),

    #[error("vertex index {index} out of range (vertex count {count})")]
    IndexOutOfRange { index: u32, count: usize },

    #[error("{attribute} count {found} does not match vertex count {expected}")]
    AttributeMismatch {
        attribute: &'static str,
        found: usize,
        expected: usize,
    },

    #[error("Texture error: {0}")]
    Texture(#[from] TextureError),
}

pub type Result<T> = std::result::Result<T, Error>;
