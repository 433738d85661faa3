mod client;
mod commits;
mod fallback;
mod progress;
mod projects;
mod provider;
mod types;
mod users;

pub use progress::{NoProgress, ProgressListener, TerminalProgress};
pub use provider::{collect_commits_data, compute_window, GitLabProvider};
