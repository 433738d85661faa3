mod auth;
mod cli;
mod config;
mod error;
mod gitlab;
mod output;
mod report;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.init_logging();

    output::print_banner();

    info!("Starting commitlens - GitLab commit activity collector");
    cli.execute().await?;

    Ok(())
}
