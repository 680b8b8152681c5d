//! Command parsing and dispatch

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use elementkit_images::CachePolicy;

use crate::{
    commands::{config, fetch},
    error::CliResult,
};

/// elementkit - cached asynchronous image loading
#[derive(Parser, Debug)]
#[command(name = "elementkit")]
#[command(about = "Fetch images through the elementkit memory/disk cache pipeline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Extra config file applied over the user and project files
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Override the disk cache directory
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Load one image through the cache pipeline
    Fetch {
        /// URL or file path of the image
        #[arg(value_name = "LOCATOR")]
        locator: String,

        /// Cache key (default: last path component)
        #[arg(long)]
        key: Option<String>,

        /// Cache policy
        #[arg(long, value_enum, default_value_t = PolicyArg::Cached)]
        policy: PolicyArg,

        /// Longest side of generated thumbnails
        #[arg(long, value_name = "N")]
        max_dimension: Option<u32>,

        /// Write the image bytes to this file
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Print the effective configuration as YAML
    Config,
}

/// Cache policy as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Prefer cached content
    Cached,
    /// Always fetch fresh content
    Reload,
}

impl From<PolicyArg> for CachePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Cached => CachePolicy::Cached,
            PolicyArg::Reload => CachePolicy::Reload,
        }
    }
}

/// Routes parsed commands to their handlers
pub struct CommandRouter;

impl CommandRouter {
    /// Execute a parsed command line
    pub async fn execute(cli: Cli) -> CliResult<()> {
        let image_config = config::load(cli.config.as_deref(), cli.cache_dir)?;

        match cli.command {
            Commands::Fetch {
                locator,
                key,
                policy,
                max_dimension,
                out,
            } => {
                let args = fetch::FetchArgs {
                    locator,
                    key,
                    policy: policy.into(),
                    max_dimension,
                    out,
                };
                let report = fetch::run(&args, &image_config).await?;
                println!("{}", report);
                Ok(())
            }
            Commands::Config => {
                print!("{}", image_config.to_yaml()?);
                Ok(())
            }
        }
    }
}
