use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Observer for the per-project fetch fan-out.
///
/// The CLI binds a terminal renderer; library callers that do not care pass
/// [`NoProgress`].
pub trait ProgressListener: Send + Sync {
    /// Called once per completed project with the running totals.
    fn on_progress(&self, completed: usize, total: usize, commits: usize);
}

/// Listener that reports nothing.
pub struct NoProgress;

impl ProgressListener for NoProgress {
    fn on_progress(&self, _completed: usize, _total: usize, _commits: usize) {}
}

/// Terminal progress bar for the project fetch phase.
pub struct TerminalProgress {
    pb: ProgressBar,
}

impl TerminalProgress {
    pub fn new() -> Self {
        let pb = ProgressBar::new(0);
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} projects {msg}")
                .unwrap()
                .progress_chars("=> "),
        );
        pb.set_message("fetching commits...");
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self { pb }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressListener for TerminalProgress {
    fn on_progress(&self, completed: usize, total: usize, commits: usize) {
        self.pb.set_length(total as u64);
        self.pb.set_position(completed as u64);
        self.pb.set_message(format!("{commits} commits"));
        if completed >= total {
            self.pb
                .finish_with_message(format!("✓ {commits} commits collected"));
        }
    }
}
