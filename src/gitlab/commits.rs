use chrono::{DateTime, Utc};
use futures::FutureExt;
use log::{debug, warn};

use crate::error::Result;
use crate::report::{CommitRecord, DiffEntry, Project};

use super::client::{GitLabClient, PAGE_SIZE};
use super::fallback::{first_success, Advance};
use super::types::{ApiCommit, ApiDiff};

/// Manual scanning is a last resort; keep the API call count bounded.
const MANUAL_PAGE_CAP: usize = 10;

/// Retrieves the commits of one project inside `[start, end]`.
///
/// Never raises to its caller: listing failures degrade through the fallback
/// ladder and per-commit failures skip only that commit. The listing ladder
/// accepts an empty success immediately — a project without commits in the
/// window is a valid outcome, not a reason to rescan.
pub async fn fetch_project_commits(
    client: &GitLabClient,
    project: &Project,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<CommitRecord> {
    debug!("Processing project: {}", project.path_with_namespace);

    let since = start.to_rfc3339();
    let until = end.to_rfc3339();

    let summaries = first_success(
        &format!("commit listing for {}", project.path_with_namespace),
        Advance::OnError,
        vec![
            (
                "since+until listing",
                client
                    .list_commits(project.id, Some(&since), Some(&until))
                    .boxed(),
            ),
            (
                "since-only listing",
                client.list_commits(project.id, Some(&since), None).boxed(),
            ),
            (
                "manual scan with client-side filter",
                manual_window_scan(client, project.id, start, end).boxed(),
            ),
        ],
    )
    .await;

    let mut records = Vec::with_capacity(summaries.len());
    for summary in summaries {
        match hydrate_commit(client, project, &summary).await {
            Ok(record) => {
                debug!("Processed commit {}: {}", summary.short_id, summary.title);
                records.push(record);
            }
            Err(e) => {
                warn!(
                    "Error retrieving commit details for {} in {}: {e}",
                    summary.id, project.path_with_namespace
                );
            }
        }
    }

    records
}

/// Pages through the commit list without server-side bounds, keeping only
/// commits whose `created_at` parses and falls inside the window
/// (inclusive). Commits with unparseable timestamps are dropped here; they
/// cannot be placed in or out of the window.
async fn manual_window_scan(
    client: &GitLabClient,
    project_id: u64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<ApiCommit>> {
    let mut kept = Vec::new();
    let mut page = 1;
    loop {
        let batch = client.list_commits_page(project_id, page, PAGE_SIZE).await?;
        let batch_len = batch.len();

        for commit in batch {
            match DateTime::parse_from_rfc3339(&commit.created_at) {
                Ok(created) => {
                    let created = created.with_timezone(&Utc);
                    if start <= created && created <= end {
                        kept.push(commit);
                    }
                }
                Err(_) => {
                    debug!(
                        "Skipping commit {} with unparseable timestamp {:?}",
                        commit.short_id, commit.created_at
                    );
                }
            }
        }

        if batch_len < PAGE_SIZE || page >= MANUAL_PAGE_CAP {
            break;
        }
        page += 1;
    }
    Ok(kept)
}

/// Second round trip per commit: the full record plus its diff. Diff
/// retrieval failure downgrades to an empty diff instead of losing the
/// commit.
async fn hydrate_commit(
    client: &GitLabClient,
    project: &Project,
    summary: &ApiCommit,
) -> Result<CommitRecord> {
    let full = client.get_commit(project.id, &summary.id).await?;

    let diff = match client.get_commit_diff(project.id, &summary.id).await {
        Ok(raw) => filter_diff(raw),
        Err(e) => {
            debug!("Error retrieving diff for commit {}: {e}", summary.short_id);
            Vec::new()
        }
    };

    Ok(CommitRecord {
        title: full.title,
        message: full.message,
        author_name: full.author_name,
        author_email: full.author_email,
        created_at: normalize_timestamp(&full.created_at),
        project_path: project.path_with_namespace.clone(),
        diff,
    })
}

/// Projects the upstream diff down to the three retained fields.
fn filter_diff(raw: Vec<ApiDiff>) -> Vec<DiffEntry> {
    raw.into_iter().map(DiffEntry::from).collect()
}

/// Re-renders a parseable timestamp with an explicit UTC offset; anything
/// unparseable passes through unchanged.
fn normalize_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.with_timezone(&Utc).to_rfc3339(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Token;
    use chrono::TimeZone;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> GitLabClient {
        GitLabClient::new(&server.url(), Token::from("test-token")).unwrap()
    }

    fn project() -> Project {
        Project {
            id: 1,
            name: "alpha".to_string(),
            path_with_namespace: "group/alpha".to_string(),
            visibility: "private".to_string(),
            web_url: "https://example.com/group/alpha".to_string(),
        }
    }

    fn commit_json(sha: &str, created_at: &str) -> serde_json::Value {
        serde_json::json!({
            "id": sha,
            "short_id": &sha[..7.min(sha.len())],
            "title": format!("Commit {sha}"),
            "message": format!("Commit {sha}\n"),
            "author_name": "Jamie Doe",
            "author_email": "jamie@example.com",
            "created_at": created_at
        })
    }

    async fn mock_commit_detail(server: &mut mockito::ServerGuard, sha: &str, created_at: &str) {
        let path = format!("/api/v4/projects/1/repository/commits/{sha}");
        server
            .mock("GET", path.as_str())
            .with_status(200)
            .with_body(serde_json::to_string(&commit_json(sha, created_at)).unwrap())
            .create_async()
            .await;
    }

    async fn mock_commit_diff(server: &mut mockito::ServerGuard, sha: &str, body: &str) {
        let path = format!("/api/v4/projects/1/repository/commits/{sha}/diff");
        server
            .mock("GET", path.as_str())
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
    }

    #[test]
    fn test_normalize_timestamp_rewrites_to_utc_offset() {
        assert_eq!(
            normalize_timestamp("2024-05-01T12:00:00Z"),
            "2024-05-01T12:00:00+00:00"
        );
        assert_eq!(
            normalize_timestamp("2024-05-01T14:00:00+02:00"),
            "2024-05-01T12:00:00+00:00"
        );
    }

    #[test]
    fn test_normalize_timestamp_keeps_unparseable_value() {
        assert_eq!(normalize_timestamp("yesterday-ish"), "yesterday-ish");
    }

    #[test]
    fn test_filter_diff_keeps_new_file_only_when_present() {
        let raw = vec![
            ApiDiff {
                new_path: "src/new.rs".to_string(),
                old_path: "src/new.rs".to_string(),
                new_file: Some(true),
            },
            ApiDiff {
                new_path: "src/old.rs".to_string(),
                old_path: "src/old.rs".to_string(),
                new_file: None,
            },
        ];

        let filtered = filter_diff(raw);

        assert_eq!(filtered[0].new_file, Some(true));
        assert!(filtered[1].new_file.is_none());
    }

    #[tokio::test]
    async fn test_server_side_listing_hydrates_commits() {
        let mut server = mockito::Server::new_async().await;
        let sha = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        server
            .mock("GET", "/api/v4/projects/1/repository/commits")
            .match_query(Matcher::Regex("since".to_string()))
            .with_status(200)
            .with_body(
                serde_json::to_string(&vec![commit_json(sha, "2024-05-01T10:00:00Z")]).unwrap(),
            )
            .create_async()
            .await;
        mock_commit_detail(&mut server, sha, "2024-05-01T10:00:00Z").await;
        mock_commit_diff(
            &mut server,
            sha,
            r#"[{"new_path": "a.rs", "old_path": "a.rs", "new_file": true, "diff": "@@"}]"#,
        )
        .await;

        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 23, 0, 0).unwrap();
        let records = fetch_project_commits(&client_for(&server), &project(), start, end).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].project_path, "group/alpha");
        assert_eq!(records[0].created_at, "2024-05-01T10:00:00+00:00");
        assert_eq!(records[0].diff.len(), 1);
        assert_eq!(records[0].diff[0].new_file, Some(true));
    }

    #[tokio::test]
    async fn test_manual_scan_filters_window_inclusively() {
        let mut server = mockito::Server::new_async().await;
        // Both server-side strategies are rejected, forcing the manual scan
        server
            .mock("GET", "/api/v4/projects/1/repository/commits")
            .match_query(Matcher::Regex("since".to_string()))
            .with_status(400)
            .with_body(r#"{"message": "400 Bad Request"}"#)
            .expect(2)
            .create_async()
            .await;

        let in_window_start = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let in_window_end = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
        let before = "cccccccccccccccccccccccccccccccccccccccc";
        let after = "dddddddddddddddddddddddddddddddddddddddd";
        let page = vec![
            commit_json(in_window_start, "2024-05-01T00:00:00Z"),
            commit_json(in_window_end, "2024-05-01T12:00:00Z"),
            commit_json(before, "2024-04-30T23:59:59Z"),
            commit_json(after, "2024-05-01T12:00:01Z"),
        ];
        server
            .mock("GET", "/api/v4/projects/1/repository/commits")
            .match_query(Matcher::Exact("page=1&per_page=100".to_string()))
            .with_status(200)
            .with_body(serde_json::to_string(&page).unwrap())
            .create_async()
            .await;

        for sha in [in_window_start, in_window_end] {
            mock_commit_detail(&mut server, sha, "2024-05-01T00:00:00Z").await;
            mock_commit_diff(&mut server, sha, "[]").await;
        }

        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let records = fetch_project_commits(&client_for(&server), &project(), start, end).await;

        // Boundary commits are kept; the ones either side are dropped
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_diff_failure_keeps_commit_with_empty_diff() {
        let mut server = mockito::Server::new_async().await;
        let sha = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        server
            .mock("GET", "/api/v4/projects/1/repository/commits")
            .match_query(Matcher::Regex("since".to_string()))
            .with_status(200)
            .with_body(
                serde_json::to_string(&vec![commit_json(sha, "2024-05-01T10:00:00Z")]).unwrap(),
            )
            .create_async()
            .await;
        mock_commit_detail(&mut server, sha, "2024-05-01T10:00:00Z").await;
        server
            .mock(
                "GET",
                format!("/api/v4/projects/1/repository/commits/{sha}/diff").as_str(),
            )
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(r#"{"message": "404 Not Found"}"#)
            .create_async()
            .await;

        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 23, 0, 0).unwrap();
        let records = fetch_project_commits(&client_for(&server), &project(), start, end).await;

        assert_eq!(records.len(), 1);
        assert!(records[0].diff.is_empty());
    }

    #[tokio::test]
    async fn test_detail_failure_skips_only_that_commit() {
        let mut server = mockito::Server::new_async().await;
        let good = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let bad = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
        server
            .mock("GET", "/api/v4/projects/1/repository/commits")
            .match_query(Matcher::Regex("since".to_string()))
            .with_status(200)
            .with_body(
                serde_json::to_string(&vec![
                    commit_json(bad, "2024-05-01T09:00:00Z"),
                    commit_json(good, "2024-05-01T10:00:00Z"),
                ])
                .unwrap(),
            )
            .create_async()
            .await;
        server
            .mock(
                "GET",
                format!("/api/v4/projects/1/repository/commits/{bad}").as_str(),
            )
            .with_status(404)
            .with_body(r#"{"message": "404 Commit Not Found"}"#)
            .create_async()
            .await;
        mock_commit_detail(&mut server, good, "2024-05-01T10:00:00Z").await;
        mock_commit_diff(&mut server, good, "[]").await;

        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 23, 0, 0).unwrap();
        let records = fetch_project_commits(&client_for(&server), &project(), start, end).await;

        assert_eq!(records.len(), 1);
        assert!(records[0].title.contains(good));
    }
}
