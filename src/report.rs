use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A project visible to the authenticated token, snapshotted once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    /// Full namespaced path (e.g., "group/project")
    pub path_with_namespace: String,
    /// Project visibility ("public", "internal", "private"); "unknown" when
    /// the API does not expose it
    pub visibility: String,
    pub web_url: String,
}

/// A user account on the instance, snapshotted once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub name: String,
    /// Only exposed to administrators on most instances
    pub email: Option<String>,
    /// Account state ("active", "blocked", ...); "unknown" when absent
    pub state: String,
}

/// One collected commit with its filtered diff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub title: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    /// ISO-8601 timestamp, normalized to carry an explicit UTC offset when
    /// the upstream format allows it; otherwise the raw upstream value
    pub created_at: String,
    pub project_path: String,
    pub diff: Vec<DiffEntry>,
}

/// Filtered projection of an upstream diff item.
///
/// Only these three fields survive, no matter what the API returns.
/// `new_file` is omitted from serialized output entirely when the upstream
/// diff did not carry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffEntry {
    pub new_path: String,
    pub old_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_file: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Generation timestamp (RFC 3339)
    pub date: String,
    pub gitlab_url: String,
    pub days_included: i64,
    pub projects_count: usize,
    pub users_count: usize,
    pub commits_count: usize,
    /// Present only when the whole pipeline failed; `commits` is empty then
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The sole externally observable artifact of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub commits: Vec<CommitRecord>,
}

impl Report {
    /// Assembles a report from the collected lists.
    ///
    /// The three counts are derived from the list lengths at this point, so
    /// they always agree with the report body.
    pub fn assemble(
        gitlab_url: &str,
        days: i64,
        projects: &[Project],
        users: &[User],
        commits: Vec<CommitRecord>,
    ) -> Self {
        Self {
            metadata: ReportMetadata {
                date: Utc::now().to_rfc3339(),
                gitlab_url: gitlab_url.to_string(),
                days_included: days,
                projects_count: projects.len(),
                users_count: users.len(),
                commits_count: commits.len(),
                error: None,
            },
            commits,
        }
    }

    /// Builds the total-failure shape: `metadata.error` set, no commits.
    pub fn failure(gitlab_url: &str, days: i64, error: String) -> Self {
        Self {
            metadata: ReportMetadata {
                date: Utc::now().to_rfc3339(),
                gitlab_url: gitlab_url.to_string(),
                days_included: days,
                projects_count: 0,
                users_count: 0,
                commits_count: 0,
                error: Some(error),
            },
            commits: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_commit(project_path: &str) -> CommitRecord {
        CommitRecord {
            title: "Fix login redirect".to_string(),
            message: "Fix login redirect\n\nRedirect to the originally requested page.".to_string(),
            author_name: "Jamie Doe".to_string(),
            author_email: "jamie@example.com".to_string(),
            created_at: "2024-05-01T10:15:00+00:00".to_string(),
            project_path: project_path.to_string(),
            diff: vec![DiffEntry {
                new_path: "src/login.rs".to_string(),
                old_path: "src/login.rs".to_string(),
                new_file: None,
            }],
        }
    }

    #[test]
    fn test_assemble_counts_match_list_lengths() {
        let projects = vec![
            Project {
                id: 1,
                name: "alpha".to_string(),
                path_with_namespace: "group/alpha".to_string(),
                visibility: "private".to_string(),
                web_url: "https://gitlab.example.com/group/alpha".to_string(),
            },
            Project {
                id: 2,
                name: "beta".to_string(),
                path_with_namespace: "group/beta".to_string(),
                visibility: "unknown".to_string(),
                web_url: "https://gitlab.example.com/group/beta".to_string(),
            },
        ];
        let users = vec![User {
            id: 7,
            username: "jamie".to_string(),
            name: "Jamie Doe".to_string(),
            email: None,
            state: "active".to_string(),
        }];
        let commits = vec![sample_commit("group/alpha"), sample_commit("group/alpha")];

        let report = Report::assemble("https://gitlab.example.com", 3, &projects, &users, commits);

        assert_eq!(report.metadata.projects_count, 2);
        assert_eq!(report.metadata.users_count, 1);
        assert_eq!(report.metadata.commits_count, report.commits.len());
        assert_eq!(report.metadata.days_included, 3);
        assert!(report.metadata.error.is_none());
    }

    #[test]
    fn test_failure_report_shape() {
        let report = Report::failure(
            "https://gitlab.example.com",
            1,
            "Authentication failed: 401".to_string(),
        );

        assert!(report.commits.is_empty());
        assert_eq!(report.metadata.commits_count, 0);
        assert!(report
            .metadata
            .error
            .as_deref()
            .unwrap()
            .contains("Authentication failed"));
    }

    #[test]
    fn test_diff_entry_serializes_only_known_keys() {
        let entry = DiffEntry {
            new_path: "README.md".to_string(),
            old_path: "README.md".to_string(),
            new_file: Some(true),
        };
        let value = serde_json::to_value(&entry).unwrap();
        let mut keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        keys.sort();
        assert_eq!(keys, ["new_file", "new_path", "old_path"]);
    }

    #[test]
    fn test_diff_entry_omits_absent_new_file() {
        let entry = DiffEntry {
            new_path: "src/lib.rs".to_string(),
            old_path: "src/lib.rs".to_string(),
            new_file: None,
        };
        let value = serde_json::to_value(&entry).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("new_file"));
        assert_eq!(object.len(), 2);
    }

    #[test]
    fn test_error_field_skipped_when_absent() {
        let report = Report::assemble("https://gitlab.example.com", 1, &[], &[], Vec::new());
        let value = serde_json::to_value(&report).unwrap();
        assert!(!value["metadata"].as_object().unwrap().contains_key("error"));
    }
}
