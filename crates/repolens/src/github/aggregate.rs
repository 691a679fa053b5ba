//! Aggregation strategies.
//!
//! An aggregator turns a raw listing summary into the display-ready detail
//! record. The GraphQL strategy does it in one provider round trip but needs
//! a credential; the REST strategy works anonymously by issuing gated
//! per-endpoint calls and degrading gracefully when they fail.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Result, short_error_message};
use crate::github::client::GitHubClient;
use crate::github::rest;
use crate::github::types::{ProcessedRepository, RawRepositorySummary};

/// Strategy seam for repository detail aggregation.
#[async_trait]
pub trait Aggregator: Send + Sync {
    async fn aggregate(
        &self,
        client: &GitHubClient,
        raw: &RawRepositorySummary,
        user_token: Option<&str>,
    ) -> Result<ProcessedRepository>;
}

/// Single-round-trip aggregation over the GraphQL endpoint.
///
/// Requires a resolved credential; any failure here is the caller's cue to
/// fall back to [`RestAggregator`].
pub struct GraphQlAggregator;

#[async_trait]
impl Aggregator for GraphQlAggregator {
    async fn aggregate(
        &self,
        client: &GitHubClient,
        raw: &RawRepositorySummary,
        user_token: Option<&str>,
    ) -> Result<ProcessedRepository> {
        let (owner, name) = raw.owner_and_name();
        client.graphql_detail(owner, name, raw.id, user_token).await
    }
}

/// Multi-call REST aggregation with threshold gating.
///
/// Starts from the raw summary's own fields and enriches them with secondary
/// calls a repository's size justifies. Secondary failures leave the empty
/// defaults in place; only a provider rate limit aborts the whole
/// aggregation.
pub struct RestAggregator {
    /// Detail views fetch the README; listing enrichment skips it.
    pub include_readme: bool,
}

#[async_trait]
impl Aggregator for RestAggregator {
    async fn aggregate(
        &self,
        client: &GitHubClient,
        raw: &RawRepositorySummary,
        user_token: Option<&str>,
    ) -> Result<ProcessedRepository> {
        let mut processed = ProcessedRepository::from_raw(raw);
        let (owner, name) = raw.owner_and_name();

        if rest::wants_contributors(raw.stargazers_count) {
            match client.fetch_contributors(owner, name, user_token).await {
                Ok(contributors) => processed.contributors = contributors,
                Err(e) if e.is_rate_limited() => return Err(e),
                Err(e) => debug!(
                    repo = %raw.full_name,
                    error = %short_error_message(&e),
                    "contributors fetch failed, leaving empty"
                ),
            }
        }

        if rest::wants_issues(raw.open_issues_count) {
            match client.fetch_open_issues(owner, name, user_token).await {
                Ok(issues) => processed.issues = issues,
                Err(e) if e.is_rate_limited() => return Err(e),
                Err(e) => debug!(
                    repo = %raw.full_name,
                    error = %short_error_message(&e),
                    "issues fetch failed, leaving empty"
                ),
            }
        }

        if rest::wants_pull_request_count(raw.stargazers_count) {
            // Search-based PR counting needs scopes the fallback credential
            // rarely grants, so the gate opens onto a pinned zero. GraphQL
            // supplies real counts.
            processed.pull_requests = crate::format::format_count(0);
        }

        if self.include_readme {
            match client.fetch_readme(owner, name, user_token).await {
                Ok(readme) => processed.readme = readme,
                Err(e) if e.is_rate_limited() => return Err(e),
                Err(e) => debug!(
                    repo = %raw.full_name,
                    error = %short_error_message(&e),
                    "readme fetch failed, leaving empty"
                ),
            }
        }

        Ok(processed)
    }
}
