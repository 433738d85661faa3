use anyhow::{bail, Result};
use clap::Parser;
use log::{debug, info};
use std::path::PathBuf;

use crate::auth::Token;
use crate::config::{Config, FetchSettings, OutputFormat};
use crate::gitlab::{self, NoProgress, TerminalProgress};
use crate::output;

#[derive(Parser)]
#[command(name = "commitlens")]
#[command(author, version, about = "GitLab commit activity collector", long_about = None)]
pub struct Cli {
    /// GitLab instance URL (e.g., https://gitlab.example.com)
    #[arg(short, long)]
    url: Option<String>,

    /// GitLab access token; admin scope covers all projects and users
    #[arg(short, long, env = "GITLAB_TOKEN")]
    token: Option<String>,

    /// Number of days to look back (1 = today only)
    #[arg(short, long)]
    days: Option<i64>,

    /// Output file path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Pretty-print JSON output
    #[arg(short, long, default_value_t = false)]
    pretty: bool,

    /// Worker pool size (0 = derive from available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, default_value_t = false)]
    debug: bool,
}

impl Cli {
    /// Initializes logging. `RUST_LOG` still wins; `--debug` only raises
    /// the default level.
    pub fn init_logging(&self) {
        let default_level = if self.debug { "debug" } else { "info" };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .init();
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        let url = match self.url.clone() {
            Some(url) => url,
            None if !config.gitlab.url.is_empty() => config.gitlab.url.clone(),
            None => bail!("No GitLab URL given; pass --url or set gitlab.url in the config file"),
        };
        let Some(token) = self.token.clone().or_else(|| config.gitlab.token.clone()) else {
            bail!(
                "No access token given; pass --token, set GITLAB_TOKEN, or set gitlab.token in the config file"
            );
        };

        let settings = FetchSettings {
            gitlab_url: url,
            token: Token::from(token),
            days: self.days.unwrap_or(config.gitlab.days),
            workers: self.workers.unwrap_or(config.gitlab.workers),
        };
        let format = self.format.unwrap_or(config.output.format);
        let output_path = self
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(&config.output.path));
        let pretty = self.pretty || config.output.pretty;

        debug!("GitLab URL: {}", settings.gitlab_url);
        debug!("Days to look back: {}", settings.days);
        debug!("Output file: {}", output_path.display());
        if settings.workers > 0 {
            debug!("Using {} workers", settings.workers);
        }

        info!("Collecting commits from {}", settings.gitlab_url);

        // The bar would interleave with verbose log lines, so debug runs
        // report through the log output alone
        let report = if self.debug {
            gitlab::collect_commits_data(&settings, &NoProgress).await
        } else {
            let progress = TerminalProgress::new();
            gitlab::collect_commits_data(&settings, &progress).await
        };

        let written = output::write_report(&report, &output_path, format, pretty)?;
        info!("Report written to: {}", written.display());

        if let Some(error) = &report.metadata.error {
            bail!("Collection failed: {error}");
        }

        Ok(())
    }
}
