//! One-shot image fetch

use std::{fmt, path::PathBuf};

use elementkit_images::{CachePolicy, ImageConfig, ImageLoader, ImageRequest, LoadedImage};
use tracing::info;

use crate::error::{CliError, CliResult};

/// Arguments of `elementkit fetch`
#[derive(Debug, Clone)]
pub struct FetchArgs {
    pub locator: String,
    pub key: Option<String>,
    pub policy: CachePolicy,
    pub max_dimension: Option<u32>,
    pub out: Option<PathBuf>,
}

impl FetchArgs {
    fn request(&self) -> ImageRequest {
        let mut request = ImageRequest::new(self.locator.clone()).with_policy(self.policy);
        if let Some(key) = &self.key {
            request = request.with_key(key.clone());
        }
        if let Some(max_dimension) = self.max_dimension {
            request = request.with_max_dimension(max_dimension);
        }
        request
    }
}

/// What a fetch produced
#[derive(Debug, Clone)]
pub struct FetchReport {
    pub image: LoadedImage,
    pub written_to: Option<PathBuf>,
}

impl fmt::Display for FetchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "key: {}\nsource: {}\nbytes: {}",
            self.image.key,
            self.image.source,
            self.image.len()
        )?;
        if let Some(path) = &self.written_to {
            write!(f, "\nsaved: {}", path.display())?;
        }
        Ok(())
    }
}

/// Load the image and optionally save it
pub async fn run(args: &FetchArgs, config: &ImageConfig) -> CliResult<FetchReport> {
    let loader = ImageLoader::new(config)?;

    let image = loader
        .load(&args.request())
        .await
        .ok_or_else(|| CliError::LoadFailed {
            locator: args.locator.clone(),
        })?;

    if let Some(path) = &args.out {
        tokio::fs::write(path, &image.bytes).await?;
        info!(path = %path.display(), bytes = image.len(), "Saved image");
    }

    Ok(FetchReport {
        image,
        written_to: args.out.clone(),
    })
}
