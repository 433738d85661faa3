use futures::future::BoxFuture;
use log::{debug, warn};

use crate::error::Result;

/// When a fallback chain moves on to its next strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Advance {
    /// Only a failed strategy advances the chain; an empty success is a
    /// valid outcome (e.g., a project with no commits in the window)
    OnError,
    /// An empty success also advances the chain; used where "no results"
    /// usually means the listing itself was not honored
    OnErrorOrEmpty,
}

/// Runs strategies in order; the first acceptable result wins.
///
/// Exhausting the chain is not an error for the caller: it yields an empty
/// list plus logged diagnostics, so enumeration failures degrade instead of
/// aborting the run.
pub(super) async fn first_success<'a, T>(
    what: &str,
    advance: Advance,
    attempts: Vec<(&'static str, BoxFuture<'a, Result<Vec<T>>>)>,
) -> Vec<T> {
    for (name, attempt) in attempts {
        match attempt.await {
            Ok(items) if items.is_empty() && advance == Advance::OnErrorOrEmpty => {
                debug!("{what}: strategy '{name}' returned no results, trying next");
            }
            Ok(items) => {
                debug!("{what}: strategy '{name}' returned {} results", items.len());
                return items;
            }
            Err(e) => {
                warn!("{what}: strategy '{name}' failed: {e}");
            }
        }
    }

    warn!("{what}: all strategies exhausted, continuing with empty result");
    Vec::new()
}
