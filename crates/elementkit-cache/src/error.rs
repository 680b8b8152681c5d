//! Cache-related error types

use thiserror::Error;

/// Cache operation errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid cache key: {key}")]
    InvalidKey { key: String },

    #[error("Entry of {size_bytes} bytes exceeds cache capacity of {max_bytes} bytes")]
    CapacityExceeded { size_bytes: u64, max_bytes: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Re-export commonly used Result type
pub type Result<T> = std::result::Result<T, CacheError>;
