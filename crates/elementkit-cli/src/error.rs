//! CLI error types

use std::path::PathBuf;

use elementkit_images::ImageError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("No image could be loaded from {locator}")]
    LoadFailed { locator: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] ImageError),
}

impl CliError {
    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            CliError::ConfigNotFound(path) => format!(
                "Config file not found: {}\n\nRun 'elementkit config' to see the effective configuration.",
                path.display()
            ),
            CliError::LoadFailed { locator } => format!(
                "No image could be loaded from {}\n\nRe-run with --verbose for details.",
                locator
            ),
            CliError::Io(e) => format!("File operation failed: {}", e),
            CliError::Image(e) => e.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
