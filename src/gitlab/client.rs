use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use url::Url;

use crate::auth::Token;
use crate::error::{CommitLensError, Result};

use super::types::{ApiCommit, ApiCurrentUser, ApiDiff, ApiProject, ApiUser};

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY_SECONDS: u64 = 2;
const MAX_CONCURRENT_REQUESTS: usize = 64;
pub(super) const PAGE_SIZE: usize = 100;

/// Runaway guard for the internal pagination loops; admin instances with
/// more pages than this should page manually through the `_page` endpoints.
const BULK_PAGE_CAP: usize = 1000;

/// REST client for the GitLab v4 API.
///
/// All requests go through a single retry path: transient network failures,
/// HTTP 429 and server errors are retried a bounded number of times; any
/// other non-success status maps to an error immediately. A semaphore bounds
/// the number of requests in flight across all worker tasks sharing the
/// client.
pub struct GitLabClient {
    client: Client,
    api_url: Url,
    token: Token,
    semaphore: Arc<Semaphore>,
}

impl GitLabClient {
    pub fn new(base_url: &str, token: Token) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("commitlens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CommitLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        let base = Url::parse(base_url)
            .map_err(|e| CommitLensError::Config(format!("Invalid base URL: {e}")))?;

        let api_url = base
            .join("api/v4/")
            .map_err(|e| CommitLensError::Config(format!("Invalid API URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            token,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS)),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_url
            .join(path)
            .map_err(|e| CommitLensError::Config(format!("Invalid endpoint {path}: {e}")))
    }

    /// Execute a GET request with automatic retry on network errors, rate
    /// limits and server errors. Returns the successful response.
    async fn get_with_retry(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        // One permit per logical request, including all of its retries
        let _permit = self.semaphore.acquire().await.unwrap();

        let url = self.endpoint(path)?;
        let mut retry_count = 0;
        loop {
            let request = self
                .client
                .get(url.clone())
                .bearer_auth(self.token.as_str())
                .query(query);

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                    if retry_count >= MAX_RETRIES {
                        return Err(e.into());
                    }
                    warn!(
                        "Network error ({}), retrying in {}s ({}/{})...",
                        e,
                        RETRY_DELAY_SECONDS,
                        retry_count + 1,
                        MAX_RETRIES
                    );
                    tokio::time::sleep(Duration::from_secs(RETRY_DELAY_SECONDS)).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == 429 || status.is_server_error() {
                if retry_count >= MAX_RETRIES {
                    return Err(CommitLensError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: MAX_RETRIES,
                    });
                }

                warn!(
                    "GitLab API error (status {status}). Waiting {RETRY_DELAY_SECONDS} seconds before retry {}/{}...",
                    retry_count + 1,
                    MAX_RETRIES
                );

                tokio::time::sleep(Duration::from_secs(RETRY_DELAY_SECONDS)).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(CommitLensError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.get_with_retry(path, query).await?;
        Ok(response.json().await?)
    }

    /// GET one page and surface the `x-total` record count header, when the
    /// instance reports one.
    async fn get_json_with_total<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<(T, Option<u64>)> {
        let response = self.get_with_retry(path, query).await?;
        let total = response
            .headers()
            .get("x-total")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        Ok((response.json().await?, total))
    }

    /// `GET /user` — the authenticated identity.
    pub async fn current_user(&self) -> Result<ApiCurrentUser> {
        self.get_json("user", &[]).await
    }

    /// `GET /projects`, paginating internally until a short page.
    pub async fn list_projects(&self, visibility: Option<&str>) -> Result<Vec<ApiProject>> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let mut query = vec![
                ("page", page.to_string()),
                ("per_page", PAGE_SIZE.to_string()),
            ];
            if let Some(visibility) = visibility {
                query.push(("visibility", visibility.to_string()));
            }

            let batch: Vec<ApiProject> = self.get_json("projects", &query).await?;
            let batch_len = batch.len();
            all.extend(batch);

            if batch_len < PAGE_SIZE || page >= BULK_PAGE_CAP {
                break;
            }
            page += 1;
        }
        debug!("Bulk project listing returned {} projects", all.len());
        Ok(all)
    }

    /// `GET /projects` — one explicit page.
    pub async fn list_projects_page(
        &self,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<ApiProject>> {
        self.get_json(
            "projects",
            &[("page", page.to_string()), ("per_page", per_page.to_string())],
        )
        .await
    }

    /// `GET /users`, paginating internally until a short page.
    pub async fn list_users(&self) -> Result<Vec<ApiUser>> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.list_users_page(page, PAGE_SIZE).await?.0;
            let batch_len = batch.len();
            all.extend(batch);

            if batch_len < PAGE_SIZE || page >= BULK_PAGE_CAP {
                break;
            }
            page += 1;
        }
        debug!("Bulk user listing returned {} users", all.len());
        Ok(all)
    }

    /// `GET /users` — one explicit page, plus the reported total count.
    pub async fn list_users_page(
        &self,
        page: usize,
        per_page: usize,
    ) -> Result<(Vec<ApiUser>, Option<u64>)> {
        self.get_json_with_total(
            "users",
            &[("page", page.to_string()), ("per_page", per_page.to_string())],
        )
        .await
    }

    /// `GET /projects/:id/repository/commits` with optional timestamp
    /// bounds, paginating internally until a short page.
    pub async fn list_commits(
        &self,
        project_id: u64,
        since: Option<&str>,
        until: Option<&str>,
    ) -> Result<Vec<ApiCommit>> {
        let path = format!("projects/{project_id}/repository/commits");
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let mut query = vec![
                ("page", page.to_string()),
                ("per_page", PAGE_SIZE.to_string()),
            ];
            if let Some(since) = since {
                query.push(("since", since.to_string()));
            }
            if let Some(until) = until {
                query.push(("until", until.to_string()));
            }

            let batch: Vec<ApiCommit> = self.get_json(&path, &query).await?;
            let batch_len = batch.len();
            all.extend(batch);

            if batch_len < PAGE_SIZE || page >= BULK_PAGE_CAP {
                break;
            }
            page += 1;
        }
        Ok(all)
    }

    /// `GET /projects/:id/repository/commits` — one explicit page, no
    /// timestamp bounds.
    pub async fn list_commits_page(
        &self,
        project_id: u64,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<ApiCommit>> {
        self.get_json(
            &format!("projects/{project_id}/repository/commits"),
            &[("page", page.to_string()), ("per_page", per_page.to_string())],
        )
        .await
    }

    /// `GET /projects/:id/repository/commits/:sha` — the full commit record.
    pub async fn get_commit(&self, project_id: u64, sha: &str) -> Result<ApiCommit> {
        self.get_json(&format!("projects/{project_id}/repository/commits/{sha}"), &[])
            .await
    }

    /// `GET /projects/:id/repository/commits/:sha/diff`, paginating
    /// internally until a short page.
    pub async fn get_commit_diff(&self, project_id: u64, sha: &str) -> Result<Vec<ApiDiff>> {
        let path = format!("projects/{project_id}/repository/commits/{sha}/diff");
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let batch: Vec<ApiDiff> = self
                .get_json(
                    &path,
                    &[("page", page.to_string()), ("per_page", PAGE_SIZE.to_string())],
                )
                .await?;
            let batch_len = batch.len();
            all.extend(batch);

            if batch_len < PAGE_SIZE || page >= BULK_PAGE_CAP {
                break;
            }
            page += 1;
        }
        Ok(all)
    }
}
