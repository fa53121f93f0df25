//! Error types for pixload.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Request errors
    #[error("Invalid size: {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("No fetcher supports data: {0}")]
    UnsupportedData(String),

    #[error("No decoder supports source (mime type: {0:?})")]
    NoDecoder(Option<String>),

    // Pipeline errors
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Transformation '{key}' failed: {message}")]
    Transform { key: String, message: String },

    // Lifecycle
    #[error("Request cancelled")]
    Cancelled,

    #[error("Image loader is shut down")]
    Shutdown,

    // Infrastructure errors
    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error represents a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
