use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::auth::Token;

/// Configuration file structure for commitlens.
///
/// Allows users to save common collection settings and reuse them across
/// runs. Configuration files are loaded from the current directory or a
/// specified path; command-line flags override whatever is loaded.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// GitLab connection defaults
    #[serde(default)]
    pub gitlab: GitLabConfig,

    /// Output preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitLabConfig {
    /// GitLab personal access token (admin scope for full coverage)
    pub token: Option<String>,

    /// GitLab instance base URL
    #[serde(default = "default_gitlab_url")]
    pub url: String,

    /// Trailing window in calendar days; 1 means today only
    #[serde(default = "default_days")]
    pub days: i64,

    /// Worker pool size override; 0 computes a default from available
    /// parallelism
    #[serde(default)]
    pub workers: usize,
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            token: None,
            url: default_gitlab_url(),
            days: default_days(),
            workers: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Report format written to the output file
    #[serde(default)]
    pub format: OutputFormat,

    /// Output file path
    #[serde(default = "default_output_path")]
    pub path: String,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Txt,
            path: default_output_path(),
            pretty: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
}

fn default_gitlab_url() -> String {
    "https://gitlab.com".to_string()
}

fn default_days() -> i64 {
    1
}

fn default_output_path() -> String {
    "commitlens.txt".to_string()
}

/// Everything the fetch pipeline consumes, resolved from config file and
/// CLI flags before the pipeline starts.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub gitlab_url: String,
    pub token: Token,
    pub days: i64,
    /// 0 means "compute from available parallelism" at each fan-out point
    pub workers: usize,
}

/// Sizing rule for one worker pool.
#[derive(Debug, Clone, Copy)]
pub struct WorkerDefaults {
    pub cap: usize,
    pub per_core: usize,
}

/// User-page fetching overlaps less latency, so it gets the smaller pool.
pub const USER_WORKERS: WorkerDefaults = WorkerDefaults {
    cap: 16,
    per_core: 2,
};

pub const COMMIT_WORKERS: WorkerDefaults = WorkerDefaults {
    cap: 32,
    per_core: 4,
};

/// Resolves a requested worker count: any explicit value wins, 0 computes
/// `min(cap, per_core * available_parallelism)`.
pub fn resolve_workers(requested: usize, defaults: WorkerDefaults) -> usize {
    if requested > 0 {
        return requested;
    }

    let cores = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4);

    (cores * defaults.per_core).clamp(1, defaults.cap)
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./commitlens.toml
    /// 3. ./commitlens.json
    /// 4. ./commitlens.yaml
    /// 5. ./commitlens.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "commitlens.toml",
            "commitlens.json",
            "commitlens.yaml",
            "commitlens.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            _ => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}
