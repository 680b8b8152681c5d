//! Error types for image loading.

use elementkit_http::HttpError;
use thiserror::Error;

/// Result type for image operations.
pub type ImageResult<T> = Result<T, ImageError>;

/// Errors that can occur while loading an image.
///
/// None of these escape [`crate::ImageLoader::load`]; they are logged and
/// reported to the caller as "no image".
#[derive(Debug, Error)]
pub enum ImageError {
    /// Fetching the remote payload failed.
    #[error("Network error: {0}")]
    Network(#[from] HttpError),

    /// The payload could not be decoded or re-encoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Reading a local file or cache entry failed.
    #[error("Disk I/O error: {0}")]
    DiskIo(#[from] std::io::Error),

    /// The locator is neither a supported URL nor a filesystem path.
    #[error("Invalid image source: {0}")]
    InvalidSource(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_yaml::Error> for ImageError {
    fn from(err: serde_yaml::Error) -> Self {
        ImageError::Config(err.to_string())
    }
}

impl From<image::ImageError> for ImageError {
    fn from(err: image::ImageError) -> Self {
        ImageError::Decode(err.to_string())
    }
}
