use chrono::{DateTime, Duration, Utc};
use futures::{stream, StreamExt};
use log::{debug, error, info, warn};

use crate::auth::Token;
use crate::config::{resolve_workers, FetchSettings, COMMIT_WORKERS, USER_WORKERS};
use crate::error::{CommitLensError, Result};
use crate::report::{CommitRecord, Project, Report};

use super::client::GitLabClient;
use super::commits::fetch_project_commits;
use super::progress::ProgressListener;
use super::projects::list_all_projects;
use super::types::ApiCurrentUser;
use super::users::list_all_users;

/// Commit collection pipeline for one GitLab instance.
///
/// Enumerates projects and users, fans per-project commit retrieval across a
/// bounded worker pool, and assembles the result into a [`Report`].
pub struct GitLabProvider {
    client: GitLabClient,
    base_url: String,
}

impl GitLabProvider {
    pub fn new(base_url: &str, token: Token) -> Result<Self> {
        let client = GitLabClient::new(base_url, token)?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    /// Verifies the token against `GET /user`.
    ///
    /// Missing or false admin status is only worth a warning — some
    /// deployments never expose the flag over the API — but any failure of
    /// the call itself is fatal to the run.
    pub async fn authenticate(&self) -> Result<ApiCurrentUser> {
        let user = self
            .client
            .current_user()
            .await
            .map_err(|e| CommitLensError::Auth(e.to_string()))?;

        info!("Successfully authenticated as user: {}", user.username);

        match user.is_admin {
            Some(true) => debug!("Confirmed admin access"),
            _ => warn!(
                "The provided token does not belong to an admin user or admin status cannot be determined. Some data might not be accessible."
            ),
        }

        Ok(user)
    }

    /// Fetches commits for every project inside `[start, end]`, aggregating
    /// in completion order. A project whose fetch degrades to nothing
    /// contributes zero commits without disturbing its siblings.
    pub async fn fetch_window_commits(
        &self,
        projects: &[Project],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        workers: usize,
        progress: &dyn ProgressListener,
    ) -> Vec<CommitRecord> {
        let total = projects.len();
        info!("Using {workers} workers to process {total} projects");

        let mut results = stream::iter(projects)
            .map(|project| fetch_project_commits(&self.client, project, start, end))
            .buffer_unordered(workers.max(1));

        let mut all_commits = Vec::new();
        let mut completed = 0;
        while let Some(batch) = results.next().await {
            completed += 1;
            all_commits.extend(batch);
            progress.on_progress(completed, total, all_commits.len());
        }

        info!("Total commits retrieved: {}", all_commits.len());
        all_commits
    }

    async fn collect(
        &self,
        settings: &FetchSettings,
        progress: &dyn ProgressListener,
    ) -> Result<Report> {
        self.authenticate().await?;

        let projects = list_all_projects(&self.client).await;

        let user_workers = resolve_workers(settings.workers, USER_WORKERS);
        let users = list_all_users(&self.client, user_workers).await;

        let (start, end) = compute_window(settings.days, Utc::now());
        info!(
            "Retrieving commits between {} and {}",
            start.to_rfc3339(),
            end.to_rfc3339()
        );

        let commit_workers = resolve_workers(settings.workers, COMMIT_WORKERS);
        let commits = self
            .fetch_window_commits(&projects, start, end, commit_workers, progress)
            .await;

        if commits.is_empty() {
            debug!("No commits were found. Possible reasons:");
            debug!("1. No commits were made in the specified time range");
            debug!("2. Token permissions issue - make sure your token has sufficient permissions");
            debug!("3. API limitations - some GitLab instances have restricted APIs");
        }

        Ok(Report::assemble(
            &self.base_url,
            settings.days,
            &projects,
            &users,
            commits,
        ))
    }
}

/// Computes the trailing window: `end = now`, `start = midnight(now)
/// - (days-1) days`, so `days = 1` covers today only. Values below 1 are
/// treated as 1.
pub fn compute_window(days: i64, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let days = days.max(1);
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc();
    (midnight - Duration::days(days - 1), now)
}

/// Entry point consumed by the CLI shell (and any other embedder).
///
/// Never raises: a total pipeline failure — bad credentials, unreachable
/// host, invalid configuration — comes back as a well-formed [`Report`] with
/// `metadata.error` set and no commits.
pub async fn collect_commits_data(
    settings: &FetchSettings,
    progress: &dyn ProgressListener,
) -> Report {
    let result = match GitLabProvider::new(&settings.gitlab_url, settings.token.clone()) {
        Ok(provider) => provider.collect(settings, progress).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(report) => report,
        Err(e) => {
            error!("Commit collection failed: {e}");
            Report::failure(&settings.gitlab_url, settings.days, e.to_string())
        }
    }
}
