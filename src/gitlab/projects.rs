use futures::FutureExt;
use log::info;

use crate::error::Result;
use crate::report::Project;

use super::client::{GitLabClient, PAGE_SIZE};
use super::fallback::{first_success, Advance};
use super::types::ApiProject;

const MANUAL_PAGE_CAP: usize = 100;

/// Retrieves every project visible to the token.
///
/// Never fails for the caller: enumeration problems degrade to a partial or
/// empty list with logged diagnostics. Strategies in order: bulk listing
/// with the all-visibilities filter (admin tokens), bulk listing without the
/// filter (non-admin tokens reject the former), then manual page-by-page
/// pagination for instances where bulk listing comes back empty.
pub async fn list_all_projects(client: &GitLabClient) -> Vec<Project> {
    let raw = first_success(
        "project enumeration",
        Advance::OnErrorOrEmpty,
        vec![
            (
                "all-visibilities listing",
                client.list_projects(Some("all")).boxed(),
            ),
            ("unfiltered listing", client.list_projects(None).boxed()),
            ("manual pagination", manual_pagination(client).boxed()),
        ],
    )
    .await;

    let projects: Vec<Project> = raw.into_iter().map(Project::from).collect();
    info!("Enumerated {} projects", projects.len());
    projects
}

async fn manual_pagination(client: &GitLabClient) -> Result<Vec<ApiProject>> {
    let mut all = Vec::new();
    let mut page = 1;
    loop {
        let batch = client.list_projects_page(page, PAGE_SIZE).await?;
        if batch.is_empty() {
            break;
        }
        info!("Retrieved project page {page} with {} projects", batch.len());
        all.extend(batch);
        page += 1;
        if page > MANUAL_PAGE_CAP {
            log::warn!("Too many project pages, stopping at {MANUAL_PAGE_CAP}");
            break;
        }
    }
    Ok(all)
}
