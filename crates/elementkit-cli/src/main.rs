// elementkit CLI entry point

use anyhow::anyhow;
use clap::Parser;
use elementkit_cli::{
    logging,
    router::{Cli, CommandRouter},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    CommandRouter::execute(cli)
        .await
        .map_err(|e| anyhow!(e.user_message()))
}
