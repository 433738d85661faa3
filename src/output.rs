use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use console::style;
use log::info;

use crate::config::OutputFormat;
use crate::error::Result;
use crate::report::Report;

// Styling helpers

fn dim(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).dim()
}

fn magenta_bold(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

// Banner

pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("📜 commitlens"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("GitLab commit activity collector")
    );
}

// Rendering

/// Renders the line-oriented text format: a metadata block followed by one
/// record per commit with its changed files.
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let meta = &report.metadata;

    out.push_str("=== GITLAB COMMITS REPORT ===\n");
    let _ = writeln!(out, "Generated: {}", meta.date);
    let _ = writeln!(out, "GitLab URL: {}", meta.gitlab_url);
    let _ = writeln!(out, "Days included: {}", meta.days_included);
    let _ = writeln!(out, "Projects count: {}", meta.projects_count);
    let _ = writeln!(out, "Users count: {}", meta.users_count);
    let _ = writeln!(out, "Commits count: {}", meta.commits_count);
    if let Some(error) = &meta.error {
        let _ = writeln!(out, "Error: {error}");
    }

    out.push_str("=== COMMITS ===\n");

    if report.commits.is_empty() {
        out.push_str("No commits found in the specified time range.\n");
        return out;
    }

    for (i, commit) in report.commits.iter().enumerate() {
        let _ = writeln!(out, "Commit #{}", i + 1);
        let _ = writeln!(out, "Project: {}", commit.project_path);
        let _ = writeln!(out, "Title: {}", commit.title);
        let _ = writeln!(
            out,
            "Author: {} <{}>",
            commit.author_name, commit.author_email
        );
        let _ = writeln!(out, "Date: {}", commit.created_at);
        let _ = writeln!(out, "Message:{}", commit.message);

        if commit.diff.is_empty() {
            out.push_str("No diff information available.\n");
        } else {
            out.push_str("Changes:\n");
            for entry in &commit.diff {
                if entry.new_file.unwrap_or(false) {
                    let _ = writeln!(out, "  New file: {}", entry.new_path);
                } else {
                    let _ = writeln!(out, "  Modified: {}", entry.new_path);
                    if !entry.old_path.is_empty() && entry.old_path != entry.new_path {
                        let _ = writeln!(out, "    (renamed from: {})", entry.old_path);
                    }
                }
            }
        }

        out.push_str("\n---\n\n");
    }

    out
}

/// Writes the report wholesale, overwriting any existing file.
///
/// A JSON report written to a path without the `.json` extension gets the
/// extension swapped in; the final path is returned.
pub fn write_report(
    report: &Report,
    path: &Path,
    format: OutputFormat,
    pretty: bool,
) -> Result<PathBuf> {
    let (path, contents) = match format {
        OutputFormat::Txt => (path.to_path_buf(), render_text(report)),
        OutputFormat::Json => {
            let path = if path.extension().and_then(|e| e.to_str()) == Some("json") {
                path.to_path_buf()
            } else {
                path.with_extension("json")
            };
            let contents = if pretty {
                serde_json::to_string_pretty(report)?
            } else {
                serde_json::to_string(report)?
            };
            (path, contents)
        }
    };

    std::fs::write(&path, contents)?;
    info!("Data successfully saved to {}", path.display());

    Ok(path)
}
