//! Effective configuration

use std::path::{Path, PathBuf};

use elementkit_images::ImageConfig;
use tracing::debug;

use crate::error::{CliError, CliResult};

/// Load the layered configuration, then apply command-line overrides.
///
/// An explicitly named config file must exist.
pub fn load(config_file: Option<&Path>, cache_dir: Option<PathBuf>) -> CliResult<ImageConfig> {
    let mut config = ImageConfig::load_with_hierarchy()?;

    if let Some(path) = config_file {
        if !path.exists() {
            return Err(CliError::ConfigNotFound(path.to_path_buf()));
        }
        config = config.with_file(path)?;
    }

    if let Some(dir) = cache_dir {
        config.cache.dir = Some(dir);
    }

    debug!(cache_dir = %config.cache_dir().display(), "Configuration loaded");
    Ok(config)
}
