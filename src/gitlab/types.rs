use serde::Deserialize;

use crate::report::{DiffEntry, Project, User};

/// The authenticated identity, as returned by `GET /user`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiCurrentUser {
    pub id: u64,
    pub username: String,
    /// Only present when the instance exposes admin status over the API
    pub is_admin: Option<bool>,
}

/// A project as returned by `GET /projects`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiProject {
    pub id: u64,
    pub name: String,
    pub path_with_namespace: String,
    pub visibility: Option<String>,
    pub web_url: String,
}

/// A user as returned by `GET /users`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiUser {
    pub id: u64,
    pub username: String,
    pub name: String,
    pub email: Option<String>,
    pub state: Option<String>,
}

/// A commit as returned by the list and detail endpoints.
///
/// List responses are summaries; the detail endpoint fills the same shape,
/// so one type covers both round trips.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiCommit {
    pub id: String,
    pub short_id: String,
    pub title: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub created_at: String,
}

/// One diff item as returned by `GET /projects/:id/repository/commits/:sha/diff`.
///
/// The upstream payload carries far more (hunk text, mode changes, rename
/// flags); only the retained fields are deserialized.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiDiff {
    #[serde(default)]
    pub new_path: String,
    #[serde(default)]
    pub old_path: String,
    pub new_file: Option<bool>,
}

impl From<ApiProject> for Project {
    fn from(p: ApiProject) -> Self {
        Self {
            id: p.id,
            name: p.name,
            path_with_namespace: p.path_with_namespace,
            visibility: p.visibility.unwrap_or_else(|| "unknown".to_string()),
            web_url: p.web_url,
        }
    }
}

impl From<ApiUser> for User {
    fn from(u: ApiUser) -> Self {
        Self {
            id: u.id,
            username: u.username,
            name: u.name,
            email: u.email,
            state: u.state.unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

impl From<ApiDiff> for DiffEntry {
    fn from(d: ApiDiff) -> Self {
        Self {
            new_path: d.new_path,
            old_path: d.old_path,
            new_file: d.new_file,
        }
    }
}
