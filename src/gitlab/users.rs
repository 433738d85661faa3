use futures::{stream, FutureExt, StreamExt};
use log::{debug, info, warn};

use crate::error::Result;
use crate::report::User;

use super::client::{GitLabClient, PAGE_SIZE};
use super::fallback::{first_success, Advance};
use super::types::ApiUser;

/// Page size for the probe request that only exists to read `x-total`.
const PROBE_PAGE_SIZE: usize = 20;

/// Pages to attempt when the instance does not report a total.
const DEFAULT_TOTAL_PAGES: usize = 20;

const SEQUENTIAL_PAGE_CAP: usize = 50;

/// Retrieves every user account on the instance.
///
/// Never fails for the caller. The fast path probes page 1 for the reported
/// total, fans one fetch task per page across a bounded worker pool, and
/// tolerates individual page failures. A pass that yields zero users falls
/// back to the fully sequential ladder.
pub async fn list_all_users(client: &GitLabClient, workers: usize) -> Vec<User> {
    let users = match parallel_fetch(client, workers).await {
        Ok(users) if !users.is_empty() => users,
        Ok(_) => {
            debug!("Parallel user retrieval yielded no users, falling back to sequential");
            sequential_fetch(client).await
        }
        Err(e) => {
            warn!("Parallel user retrieval failed ({e}), falling back to sequential");
            sequential_fetch(client).await
        }
    };

    info!("Enumerated {} users", users.len());
    users
}

/// Estimate the page count from the first page, then fetch all pages
/// concurrently. Each page task contains its own failure.
async fn parallel_fetch(client: &GitLabClient, workers: usize) -> Result<Vec<User>> {
    let (_, total) = client.list_users_page(1, PROBE_PAGE_SIZE).await?;

    let total_pages = match total {
        Some(total) => ((total as usize) + PAGE_SIZE - 1) / PAGE_SIZE,
        None => DEFAULT_TOTAL_PAGES,
    };
    debug!("Estimated {total_pages} pages of users needed");

    let users: Vec<ApiUser> = stream::iter(1..=total_pages)
        .map(|page| async move {
            match client.list_users_page(page, PAGE_SIZE).await {
                Ok((batch, _)) => {
                    debug!("Retrieved user page {page} with {} users", batch.len());
                    batch
                }
                Err(e) => {
                    warn!("Error retrieving user page {page}: {e}");
                    Vec::new()
                }
            }
        })
        .buffer_unordered(workers.max(1))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .flatten()
        .collect();

    Ok(users.into_iter().map(User::from).collect())
}

/// Bulk listing first, page-by-page second. Used when the parallel pass
/// produced nothing at all.
async fn sequential_fetch(client: &GitLabClient) -> Vec<User> {
    let raw = first_success(
        "user enumeration (sequential)",
        Advance::OnError,
        vec![
            ("bulk listing", client.list_users().boxed()),
            ("manual pagination", manual_pagination(client).boxed()),
        ],
    )
    .await;

    raw.into_iter().map(User::from).collect()
}

async fn manual_pagination(client: &GitLabClient) -> Result<Vec<ApiUser>> {
    let mut all = Vec::new();
    let mut page = 1;
    loop {
        let batch = client.list_users_page(page, PAGE_SIZE).await?.0;
        if batch.is_empty() {
            break;
        }
        info!("Retrieved user page {page} with {} users", batch.len());
        all.extend(batch);
        page += 1;
        if page > SEQUENTIAL_PAGE_CAP {
            warn!("Too many user pages, stopping at {SEQUENTIAL_PAGE_CAP}");
            break;
        }
    }
    Ok(all)
}
