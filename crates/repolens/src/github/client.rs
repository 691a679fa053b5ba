//! The GitHub API client.
//!
//! [`GitHubClient`] owns the transport, the quota guard, the response cache,
//! and the call counters, and exposes the listing, search, and detail
//! operations built on them. Every operation follows the same pipeline:
//! cache lookup, quota check, paced and retried transport call, response
//! classification, content filtering, cache write.

use std::sync::Arc;

use backon::Retryable;
use chrono::Duration;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::auth::{resolve_headers, resolve_token};
use crate::cache::{ResponseCache, default_ttl};
use crate::clock::{Clock, SystemClock};
use crate::error::{GitHubError, Result, classify_response, short_error_message};
use crate::github::aggregate::{Aggregator, GraphQlAggregator, RestAggregator};
use crate::github::graphql;
use crate::github::query::{
    QualityFilters, UserPreferences, augment_search_query, fallback_query, filter_blocked,
    quality_query, quality_signature, trending_query,
};
use crate::github::rest;
use crate::github::types::{
    Contributor, IssueSummary, ProcessedRepository, RateLimitResponse, RawIssue,
    RawRepositorySummary, ReadmePayload, SearchResponse,
};
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::pace::ApiRateLimiter;
use crate::quota::{QuotaDecision, QuotaGuard, QuotaPolicy};
use crate::retry;
use crate::stats::{ApiCallStats, StatsSnapshot};

/// Production API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Page size for the popular and trending listings.
pub const LISTING_PER_PAGE: usize = 30;

/// Default batch size for [`GitHubClient::process_many`].
pub const DEFAULT_BATCH_MAX: usize = 5;

/// Options for batch aggregation.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Input beyond this count is dropped before any work starts.
    pub max_count: usize,
    pub user_token: Option<String>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_count: DEFAULT_BATCH_MAX,
            user_token: None,
        }
    }
}

/// Builder for [`GitHubClient`].
pub struct GitHubClientBuilder {
    transport: Arc<dyn HttpTransport>,
    app_token: Option<String>,
    base_url: String,
    graphql_url: Option<String>,
    quota_policy: QuotaPolicy,
    cache_ttl: Duration,
    pacer: Option<ApiRateLimiter>,
    clock: Arc<dyn Clock>,
}

impl GitHubClientBuilder {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            app_token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            graphql_url: None,
            quota_policy: QuotaPolicy::default(),
            cache_ttl: default_ttl(),
            pacer: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Process-wide fallback token, used when no user token accompanies a
    /// call. Empty strings count as absent.
    #[must_use]
    pub fn app_token(mut self, token: Option<String>) -> Self {
        self.app_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Override the REST base URL (no trailing slash).
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the GraphQL endpoint; defaults to `{base_url}/graphql`.
    #[must_use]
    pub fn graphql_url(mut self, graphql_url: impl Into<String>) -> Self {
        self.graphql_url = Some(graphql_url.into());
        self
    }

    #[must_use]
    pub fn quota_policy(mut self, policy: QuotaPolicy) -> Self {
        self.quota_policy = policy;
        self
    }

    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Attach a pacer that spaces outbound calls.
    #[must_use]
    pub fn pacer(mut self, pacer: ApiRateLimiter) -> Self {
        self.pacer = Some(pacer);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn build(self) -> GitHubClient {
        let graphql_url = self
            .graphql_url
            .unwrap_or_else(|| format!("{}/graphql", self.base_url));
        GitHubClient {
            transport: self.transport,
            app_token: self.app_token,
            base_url: self.base_url,
            graphql_url,
            cache: ResponseCache::new(self.cache_ttl, self.clock.clone()),
            quota: QuotaGuard::new(self.quota_policy, self.clock.clone()),
            stats: ApiCallStats::new(self.clock.clone()),
            pacer: self.pacer,
            clock: self.clock,
        }
    }
}

/// GitHub API access layer: listings, search, detail aggregation, and the
/// guard rails around them.
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    app_token: Option<String>,
    base_url: String,
    graphql_url: String,
    cache: ResponseCache,
    quota: QuotaGuard,
    stats: ApiCallStats,
    pacer: Option<ApiRateLimiter>,
    clock: Arc<dyn Clock>,
}

impl GitHubClient {
    #[must_use]
    pub fn builder(transport: Arc<dyn HttpTransport>) -> GitHubClientBuilder {
        GitHubClientBuilder::new(transport)
    }

    // ---------- call pipeline ----------

    /// Send one request through the pacer and the transient-failure retry
    /// budget. Transport errors that survive the budget become
    /// [`GitHubError::Network`].
    async fn send(&self, request: HttpRequest, endpoint: &'static str) -> Result<HttpResponse> {
        if let Some(pacer) = &self.pacer {
            pacer.wait().await;
        }
        self.stats.record(endpoint);

        let op = || {
            let req = request.clone();
            async move { self.transport.send(req).await }
        };
        op.retry(retry::network_backoff())
            .when(retry::is_transient)
            .notify(|err, delay| {
                warn!(
                    endpoint,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "transient transport failure; retrying"
                );
            })
            .await
            .map_err(|e| GitHubError::network(e.to_string()))
    }

    async fn get_classified(
        &self,
        url: &str,
        resource: &str,
        endpoint: &'static str,
        user_token: Option<&str>,
    ) -> Result<HttpResponse> {
        let headers = resolve_headers(user_token, self.app_token.as_deref());
        let response = self.send(HttpRequest::get(url, headers), endpoint).await?;
        classify_response(&response, resource)?;
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        resource: &str,
        endpoint: &'static str,
        user_token: Option<&str>,
    ) -> Result<T> {
        let response = self
            .get_classified(url, resource, endpoint, user_token)
            .await?;
        serde_json::from_slice(&response.body)
            .map_err(|e| GitHubError::internal(format!("unexpected body for {resource}: {e}")))
    }

    // ---------- quota ----------

    /// Whether the quota guard allows a call right now.
    ///
    /// Performs a live check against `GET /rate_limit` when the local
    /// estimate is stale or near exhaustion; a failed live check denies
    /// (fail closed).
    pub async fn check_quota(&self, user_token: Option<&str>) -> bool {
        match self.quota.evaluate() {
            QuotaDecision::Allow => true,
            QuotaDecision::Deny => {
                // The denied call never proceeds, but a stale estimate is
                // still refreshed so denial lifts once the provider window
                // resets.
                if self.quota.is_stale() {
                    match self.rate_limit_snapshot(user_token).await {
                        Ok(snapshot) => {
                            self.quota.record_refresh(snapshot.resources.core.remaining);
                        }
                        Err(e) => warn!(
                            error = %short_error_message(&e),
                            "rate limit re-check failed while denied"
                        ),
                    }
                }
                false
            }
            QuotaDecision::RefreshDue => match self.rate_limit_snapshot(user_token).await {
                Ok(snapshot) => self.quota.record_refresh(snapshot.resources.core.remaining),
                Err(e) => {
                    warn!(
                        error = %short_error_message(&e),
                        "rate limit check failed, denying calls"
                    );
                    false
                }
            },
        }
    }

    async fn ensure_quota(&self, user_token: Option<&str>) -> Result<()> {
        if self.check_quota(user_token).await {
            Ok(())
        } else {
            Err(GitHubError::rate_limited())
        }
    }

    /// Live rate limit status from the provider.
    pub async fn rate_limit_snapshot(
        &self,
        user_token: Option<&str>,
    ) -> Result<RateLimitResponse> {
        let url = format!("{}/rate_limit", self.base_url);
        self.get_json(&url, "rate_limit", "rate_limit", user_token)
            .await
    }

    /// Local remaining-quota estimate (heuristic).
    #[must_use]
    pub fn remaining_quota_estimate(&self) -> usize {
        self.quota.remaining_estimate()
    }

    // ---------- listings and search ----------

    /// Star-sorted quality listing, filtered and cached per page + filters.
    pub async fn popular_repositories(
        &self,
        page: u32,
        filters: &QualityFilters,
        user_token: Option<&str>,
    ) -> Result<Vec<RawRepositorySummary>> {
        let key = (page, quality_signature(filters));
        if let Some(hit) = self.cache.popular.get(&key) {
            debug!(page, "popular listing served from cache");
            return Ok(hit);
        }

        self.ensure_quota(user_token).await?;
        let query = quality_query(filters);
        match self
            .run_search(&query, LISTING_PER_PAGE, page, user_token)
            .await?
        {
            Some(items) => {
                let items = filter_blocked(items);
                self.cache.popular.put(key, items.clone());
                Ok(items)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Recently created repositories above the trending star floor.
    pub async fn trending_repositories(
        &self,
        page: u32,
        user_token: Option<&str>,
    ) -> Result<Vec<RawRepositorySummary>> {
        if let Some(hit) = self.cache.trending.get(&page) {
            debug!(page, "trending listing served from cache");
            return Ok(hit);
        }

        self.ensure_quota(user_token).await?;
        let query = trending_query(self.clock.now());
        match self
            .run_search(&query, LISTING_PER_PAGE, page, user_token)
            .await?
        {
            Some(items) => {
                let items = filter_blocked(items);
                self.cache.trending.put(page, items.clone());
                Ok(items)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Free-form repository search, augmented with stored preferences.
    ///
    /// The cache key is the caller's literal query text; the augmented form
    /// only reaches the provider.
    pub async fn search_repositories(
        &self,
        query: &str,
        limit: usize,
        prefs: &UserPreferences,
        user_token: Option<&str>,
    ) -> Result<Vec<RawRepositorySummary>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let key = ResponseCache::search_key(trimmed);
        if let Some(mut hit) = self.cache.search.get(&key) {
            debug!(query = trimmed, "search served from cache");
            // The cached listing may come from a call with a larger limit.
            hit.truncate(limit);
            return Ok(hit);
        }

        self.ensure_quota(user_token).await?;
        let augmented = augment_search_query(trimmed, prefs);
        let per_page = limit.clamp(1, 100);
        match self.run_search(&augmented, per_page, 1, user_token).await? {
            Some(items) => {
                let mut items = filter_blocked(items);
                items.truncate(limit);
                self.cache.search.put(key, items.clone());
                Ok(items)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Run one search, falling back once to the simplified query on failure.
    ///
    /// `Ok(None)` means both attempts failed in a non-fatal way and the
    /// caller should degrade to an empty listing without caching it. Rate
    /// limit and auth failures always propagate.
    async fn run_search(
        &self,
        query: &str,
        per_page: usize,
        page: u32,
        user_token: Option<&str>,
    ) -> Result<Option<Vec<RawRepositorySummary>>> {
        match self.search_once(query, per_page, page, user_token).await {
            Ok(items) => Ok(Some(items)),
            Err(e) if e.is_rate_limited() || e.is_auth() => Err(e),
            Err(e) => {
                warn!(
                    query,
                    error = %short_error_message(&e),
                    "search failed, retrying with simplified query"
                );
                match self
                    .search_once(fallback_query(), per_page, page, user_token)
                    .await
                {
                    Ok(items) => Ok(Some(items)),
                    Err(e) if e.is_rate_limited() || e.is_auth() => Err(e),
                    Err(e) => {
                        warn!(error = %short_error_message(&e), "fallback search failed, giving up");
                        Ok(None)
                    }
                }
            }
        }
    }

    async fn search_once(
        &self,
        query: &str,
        per_page: usize,
        page: u32,
        user_token: Option<&str>,
    ) -> Result<Vec<RawRepositorySummary>> {
        let url = self.search_url(query, per_page, page)?;
        let parsed: SearchResponse = self
            .get_json(&url, "search/repositories", "search", user_token)
            .await?;
        Ok(parsed.items)
    }

    fn search_url(&self, query: &str, per_page: usize, page: u32) -> Result<String> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GitHubError::internal(format!("invalid base url: {e}")))?;
        url.set_path("/search/repositories");
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("sort", "stars")
            .append_pair("order", "desc")
            .append_pair("per_page", &per_page.to_string())
            .append_pair("page", &page.to_string());
        Ok(url.to_string())
    }

    // ---------- detail lookups ----------

    /// Full detail record by owner/name, README included.
    pub async fn repository_by_full_name(
        &self,
        owner: &str,
        name: &str,
        user_token: Option<&str>,
    ) -> Result<ProcessedRepository> {
        let key = ResponseCache::full_name_key(owner, name);
        if let Some(hit) = self.cache.by_full_name.get(&key) {
            debug!(repo = %key, "detail served from cache");
            return Ok(hit);
        }

        self.ensure_quota(user_token).await?;
        let url = format!("{}/repos/{owner}/{name}", self.base_url);
        let resource = format!("repos/{owner}/{name}");
        let raw: RawRepositorySummary =
            self.get_json(&url, &resource, "repo", user_token).await?;

        let processed = self.aggregate_inner(&raw, user_token, true).await?;
        self.cache.by_id.put(processed.id, processed.clone());
        self.cache.by_full_name.put(key, processed.clone());
        Ok(processed)
    }

    /// Full detail record by numeric id, README included.
    pub async fn repository_by_id(
        &self,
        id: u64,
        user_token: Option<&str>,
    ) -> Result<ProcessedRepository> {
        if let Some(hit) = self.cache.by_id.get(&id) {
            debug!(id, "detail served from cache");
            return Ok(hit);
        }

        self.ensure_quota(user_token).await?;
        let url = format!("{}/repositories/{id}", self.base_url);
        let resource = format!("repositories/{id}");
        let raw: RawRepositorySummary =
            self.get_json(&url, &resource, "repo", user_token).await?;

        let processed = self.aggregate_inner(&raw, user_token, true).await?;
        let (owner, name) = raw.owner_and_name();
        self.cache
            .by_full_name
            .put(ResponseCache::full_name_key(owner, name), processed.clone());
        self.cache.by_id.put(id, processed.clone());
        Ok(processed)
    }

    // ---------- aggregation ----------

    /// Enrich one raw summary into a display-ready record, without README.
    pub async fn aggregate(
        &self,
        raw: &RawRepositorySummary,
        user_token: Option<&str>,
    ) -> Result<ProcessedRepository> {
        self.aggregate_inner(raw, user_token, false).await
    }

    /// Shared aggregation pipeline: quota gate, then GraphQL when a
    /// credential resolves, with REST as the fallback path.
    async fn aggregate_inner(
        &self,
        raw: &RawRepositorySummary,
        user_token: Option<&str>,
        include_readme: bool,
    ) -> Result<ProcessedRepository> {
        if !self.check_quota(user_token).await {
            return Err(GitHubError::rate_limited());
        }

        if resolve_token(user_token, self.app_token.as_deref()).is_some() {
            match GraphQlAggregator.aggregate(self, raw, user_token).await {
                Ok(processed) => return Ok(processed),
                Err(e) if e.is_rate_limited() => return Err(e),
                Err(e) => {
                    warn!(
                        repo = %raw.full_name,
                        error = %short_error_message(&e),
                        "GraphQL aggregation failed, falling back to REST"
                    );
                }
            }
        }

        RestAggregator { include_readme }
            .aggregate(self, raw, user_token)
            .await
    }

    /// Aggregate a batch sequentially with partial-success semantics.
    ///
    /// Input beyond `max_count` is dropped up front. A rate limit mid-batch
    /// stops the loop and returns what was completed; other per-item
    /// failures skip the item.
    pub async fn process_many(
        &self,
        raws: Vec<RawRepositorySummary>,
        options: &BatchOptions,
    ) -> Vec<ProcessedRepository> {
        let mut processed = Vec::new();
        for raw in raws.into_iter().take(options.max_count) {
            match self.aggregate(&raw, options.user_token.as_deref()).await {
                Ok(p) => processed.push(p),
                Err(e) if e.is_rate_limited() => {
                    warn!(
                        completed = processed.len(),
                        "rate limited mid-batch, returning partial results"
                    );
                    break;
                }
                Err(e) => {
                    debug!(
                        repo = %raw.full_name,
                        error = %short_error_message(&e),
                        "skipping repository after aggregation failure"
                    );
                }
            }
        }
        processed
    }

    // ---------- secondary fetches ----------

    /// Top contributors, zero-contribution entries dropped, sorted
    /// descending.
    pub async fn fetch_contributors(
        &self,
        owner: &str,
        name: &str,
        user_token: Option<&str>,
    ) -> Result<Vec<Contributor>> {
        self.ensure_quota(user_token).await?;
        let url = format!(
            "{}/repos/{owner}/{name}/contributors?per_page={}",
            self.base_url,
            rest::SECONDARY_PER_PAGE
        );
        let resource = format!("repos/{owner}/{name}/contributors");
        let raw: Vec<Contributor> = self
            .get_json(&url, &resource, "contributors", user_token)
            .await?;
        Ok(rest::top_contributors(raw))
    }

    /// Up to five open issues, pull requests excluded.
    pub async fn fetch_open_issues(
        &self,
        owner: &str,
        name: &str,
        user_token: Option<&str>,
    ) -> Result<Vec<IssueSummary>> {
        self.ensure_quota(user_token).await?;
        let url = format!(
            "{}/repos/{owner}/{name}/issues?state=open&per_page={}",
            self.base_url,
            rest::SECONDARY_PER_PAGE
        );
        let resource = format!("repos/{owner}/{name}/issues");
        let raw: Vec<RawIssue> = self.get_json(&url, &resource, "issues", user_token).await?;
        Ok(rest::open_issue_summaries(raw))
    }

    /// README text, decoded from the provider's base64 payload.
    pub async fn fetch_readme(
        &self,
        owner: &str,
        name: &str,
        user_token: Option<&str>,
    ) -> Result<String> {
        self.ensure_quota(user_token).await?;
        let url = format!("{}/repos/{owner}/{name}/readme", self.base_url);
        let resource = format!("repos/{owner}/{name}/readme");
        let payload: ReadmePayload =
            self.get_json(&url, &resource, "readme", user_token).await?;
        rest::decode_readme(&payload)
    }

    /// One-round-trip GraphQL detail lookup.
    pub(crate) async fn graphql_detail(
        &self,
        owner: &str,
        name: &str,
        fallback_id: u64,
        user_token: Option<&str>,
    ) -> Result<ProcessedRepository> {
        let payload = graphql::detail_payload(owner, name);
        let body = serde_json::to_vec(&payload)
            .map_err(|e| GitHubError::internal(format!("GraphQL payload encode error: {e}")))?;

        let mut headers = resolve_headers(user_token, self.app_token.as_deref());
        headers.push(("Content-Type".to_string(), "application/json".to_string()));

        let response = self
            .send(
                HttpRequest::post(self.graphql_url.clone(), headers, body),
                "graphql",
            )
            .await?;
        classify_response(&response, "graphql")?;
        graphql::map_detail_response(&response.body, fallback_id)
    }

    // ---------- maintenance ----------

    /// Call counters since construction or the last reset.
    #[must_use]
    pub fn call_stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Sweep expired entries out of every cache table.
    pub fn purge_caches(&self) {
        self.cache.popular.purge_expired();
        self.cache.trending.purge_expired();
        self.cache.search.purge_expired();
        self.cache.by_id.purge_expired();
        self.cache.by_full_name.purge_expired();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::github::types::testutil::sample_raw;
    use crate::http::HttpMethod;
    use crate::http::mock::MockTransport;
    use chrono::Utc;

    fn client_with(transport: &MockTransport) -> (GitHubClient, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let client = GitHubClient::builder(Arc::new(transport.clone()))
            .clock(clock.clone())
            .build();
        (client, clock)
    }

    fn rate_limit_body(remaining: usize) -> String {
        format!(
            r#"{{"resources":{{"core":{{"limit":5000,"used":0,"remaining":{remaining},"reset":1700000000}}}}}}"#
        )
    }

    fn push_rate_limit(transport: &MockTransport, remaining: usize) {
        transport.push_json(
            HttpMethod::Get,
            "https://api.github.com/rate_limit",
            &rate_limit_body(remaining),
        );
    }

    fn raw_json(raw: &RawRepositorySummary) -> String {
        serde_json::to_string(raw).expect("raw summary serializes")
    }

    fn search_body(raws: &[RawRepositorySummary]) -> String {
        let items: Vec<String> = raws.iter().map(raw_json).collect();
        format!(
            r#"{{"total_count":{},"incomplete_results":false,"items":[{}]}}"#,
            raws.len(),
            items.join(",")
        )
    }

    // ---------- quota ----------

    #[tokio::test]
    async fn quota_refresh_happens_once_per_window() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        assert!(client.check_quota(None).await);
        assert!(client.check_quota(None).await);
        assert_eq!(transport.request_count_matching("/rate_limit"), 1);
    }

    #[tokio::test]
    async fn quota_check_fails_closed_when_live_check_errors() {
        let transport = MockTransport::new();
        let (client, _clock) = client_with(&transport);
        // No mock registered: the live check fails, so calls are denied.
        assert!(!client.check_quota(None).await);
    }

    #[tokio::test]
    async fn exhausted_quota_turns_listings_into_rate_limit_errors() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 5);
        let (client, _clock) = client_with(&transport);

        let err = client
            .popular_repositories(1, &QualityFilters::default(), None)
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
        // Only the rate limit probe went out, never the search.
        assert_eq!(transport.request_count_matching("/search"), 0);
    }

    #[tokio::test]
    async fn exhausted_quota_blocks_direct_secondary_fetches() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 5);
        let (client, _clock) = client_with(&transport);

        let err = client
            .fetch_contributors("acme", "big", None)
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(transport.request_count_matching("/contributors"), 0);
    }

    #[tokio::test]
    async fn denial_lifts_after_a_stale_recheck_finds_quota() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 5);
        let (client, clock) = client_with(&transport);

        assert!(!client.check_quota(None).await);
        assert!(!client.check_quota(None).await);

        // Provider window reset: the stale re-check finds quota again, but
        // the denied call itself stays denied.
        clock.advance(Duration::minutes(5));
        push_rate_limit(&transport, 5000);
        assert!(!client.check_quota(None).await);
        assert!(client.check_quota(None).await);
    }

    #[tokio::test]
    async fn stale_quota_estimate_triggers_a_fresh_live_check() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        push_rate_limit(&transport, 80);
        let (client, clock) = client_with(&transport);

        assert!(client.check_quota(None).await);
        clock.advance(Duration::minutes(5));
        assert!(client.check_quota(None).await);
        assert_eq!(transport.request_count_matching("/rate_limit"), 2);
    }

    // ---------- listings ----------

    #[tokio::test]
    async fn popular_listing_hits_the_network_once_then_the_cache() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        let url = client
            .search_url("stars:>500", LISTING_PER_PAGE, 1)
            .expect("url");
        transport.push_json(
            HttpMethod::Get,
            &url,
            &search_body(&[sample_raw(1, "acme/widgets", 900)]),
        );

        let filters = QualityFilters::default();
        let first = client
            .popular_repositories(1, &filters, None)
            .await
            .expect("listing");
        let second = client
            .popular_repositories(1, &filters, None)
            .await
            .expect("cached listing");

        assert_eq!(first.len(), 1);
        assert_eq!(second[0].full_name, "acme/widgets");
        assert_eq!(transport.request_count_matching("/search"), 1);
    }

    #[tokio::test]
    async fn listings_drop_blocked_repositories_before_caching() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        let url = client
            .search_url("stars:>500", LISTING_PER_PAGE, 1)
            .expect("url");
        transport.push_json(
            HttpMethod::Get,
            &url,
            &search_body(&[
                sample_raw(1, "acme/widgets", 900),
                sample_raw(2, "evil/nazi-archive", 900),
            ]),
        );

        let listed = client
            .popular_repositories(1, &QualityFilters::default(), None)
            .await
            .expect("listing");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].full_name, "acme/widgets");
    }

    #[tokio::test]
    async fn trending_uses_the_windowed_query() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, clock) = client_with(&transport);

        let expected_query = trending_query(clock.now());
        let url = client
            .search_url(&expected_query, LISTING_PER_PAGE, 1)
            .expect("url");
        transport.push_json(HttpMethod::Get, &url, &search_body(&[]));

        let listed = client
            .trending_repositories(1, None)
            .await
            .expect("listing");
        assert!(listed.is_empty());
        assert_eq!(transport.request_count_matching("/search"), 1);
    }

    // ---------- search ----------

    #[tokio::test]
    async fn search_truncates_to_the_requested_limit() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        let raws: Vec<_> = (1..=4u64)
            .map(|n| sample_raw(n, &format!("acme/repo{n}"), 100))
            .collect();
        let url = client.search_url("http server", 2, 1).expect("url");
        transport.push_json(HttpMethod::Get, &url, &search_body(&raws));

        let found = client
            .search_repositories("http server", 2, &UserPreferences::default(), None)
            .await
            .expect("search");
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn cached_search_is_truncated_to_the_caller_limit() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        let raws: Vec<_> = (1..=4u64)
            .map(|n| sample_raw(n, &format!("acme/repo{n}"), 100))
            .collect();
        let url = client.search_url("http server", 4, 1).expect("url");
        transport.push_json(HttpMethod::Get, &url, &search_body(&raws));

        let first = client
            .search_repositories("http server", 4, &UserPreferences::default(), None)
            .await
            .expect("search");
        assert_eq!(first.len(), 4);

        // A smaller limit against the cached listing must not leak the
        // larger result set.
        let second = client
            .search_repositories("HTTP Server", 2, &UserPreferences::default(), None)
            .await
            .expect("cached search");
        assert_eq!(second.len(), 2);
        assert_eq!(transport.request_count_matching("/search"), 1);
    }

    #[tokio::test]
    async fn failed_complex_search_retries_simplified_then_degrades_empty() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        let complex_url = client
            .search_url("weird query", 10, 1)
            .expect("url");
        transport.push_response(
            HttpMethod::Get,
            &complex_url,
            HttpResponse {
                status: 422,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );
        let fallback_url = client.search_url(fallback_query(), 10, 1).expect("url");
        transport.push_response(
            HttpMethod::Get,
            &fallback_url,
            HttpResponse {
                status: 500,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );

        let found = client
            .search_repositories("weird query", 10, &UserPreferences::default(), None)
            .await
            .expect("degraded search");
        assert!(found.is_empty());
        assert_eq!(transport.request_count_matching("/search"), 2);
    }

    #[tokio::test]
    async fn search_fallback_results_are_returned_when_the_retry_succeeds() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        let complex_url = client.search_url("weird query", 10, 1).expect("url");
        transport.push_response(
            HttpMethod::Get,
            &complex_url,
            HttpResponse {
                status: 422,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );
        let fallback_url = client.search_url(fallback_query(), 10, 1).expect("url");
        transport.push_json(
            HttpMethod::Get,
            &fallback_url,
            &search_body(&[sample_raw(9, "acme/popular", 5000)]),
        );

        let found = client
            .search_repositories("weird query", 10, &UserPreferences::default(), None)
            .await
            .expect("fallback search");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].full_name, "acme/popular");
    }

    #[tokio::test]
    async fn provider_rate_limit_during_search_propagates_without_fallback() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        let url = client.search_url("anything", 10, 1).expect("url");
        transport.push_response(
            HttpMethod::Get,
            &url,
            HttpResponse {
                status: 403,
                headers: vec![("X-RateLimit-Remaining".to_string(), "0".to_string())],
                body: Vec::new(),
            },
        );

        let err = client
            .search_repositories("anything", 10, &UserPreferences::default(), None)
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(transport.request_count_matching("/search"), 1);
    }

    #[tokio::test]
    async fn empty_search_query_short_circuits() {
        let transport = MockTransport::new();
        let (client, _clock) = client_with(&transport);
        let found = client
            .search_repositories("   ", 10, &UserPreferences::default(), None)
            .await
            .expect("empty search");
        assert!(found.is_empty());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn user_token_is_sent_as_a_bearer_header() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        assert!(client.check_quota(Some("user-tok")).await);
        let requests = transport.requests();
        let auth = requests[0]
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("authorization"))
            .map(|(_, v)| v.as_str());
        assert_eq!(auth, Some("Bearer user-tok"));
    }

    // ---------- aggregation thresholds ----------

    #[tokio::test]
    async fn small_repository_skips_the_contributors_call() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        let mut raw = sample_raw(1, "acme/tiny", 50);
        raw.open_issues_count = 0;

        let processed = client.aggregate(&raw, None).await.expect("aggregate");
        assert!(processed.contributors.is_empty());
        assert_eq!(transport.request_count_matching("/contributors"), 0);
    }

    #[tokio::test]
    async fn popular_repository_fetches_and_sorts_contributors() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        let mut raw = sample_raw(1, "acme/big", 150);
        raw.open_issues_count = 0;
        transport.push_json(
            HttpMethod::Get,
            "https://api.github.com/repos/acme/big/contributors?per_page=10",
            r#"[
                {"login": "alice", "avatar_url": "a", "contributions": 10},
                {"login": "bob", "avatar_url": "b", "contributions": 250}
            ]"#,
        );

        let processed = client.aggregate(&raw, None).await.expect("aggregate");
        assert_eq!(processed.contributors.len(), 2);
        assert_eq!(processed.contributors[0].login, "bob");
        assert_eq!(transport.request_count_matching("/contributors"), 1);
    }

    #[tokio::test]
    async fn issues_are_fetched_only_when_open_issues_exist() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        let raw = sample_raw(1, "acme/tiny", 50);
        // sample_raw reports 3 open issues, so the issues call happens.
        transport.push_json(
            HttpMethod::Get,
            "https://api.github.com/repos/acme/tiny/issues?state=open&per_page=10",
            r#"[
                {"title": "bug", "number": 1, "html_url": "u1"},
                {"title": "feat", "number": 2, "html_url": "u2", "pull_request": {"url": "p"}}
            ]"#,
        );

        let processed = client.aggregate(&raw, None).await.expect("aggregate");
        assert_eq!(processed.issues.len(), 1);
        assert_eq!(processed.issues[0].number, 1);
    }

    #[tokio::test]
    async fn secondary_fetch_failure_degrades_to_defaults() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        let mut raw = sample_raw(1, "acme/big", 150);
        raw.open_issues_count = 0;
        transport.push_response(
            HttpMethod::Get,
            "https://api.github.com/repos/acme/big/contributors?per_page=10",
            HttpResponse {
                status: 500,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );

        let processed = client.aggregate(&raw, None).await.expect("aggregate");
        assert!(processed.contributors.is_empty());
        assert_eq!(processed.stars, "150");
    }

    // ---------- batch processing ----------

    #[tokio::test]
    async fn batch_truncates_input_before_processing() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        let raws: Vec<_> = (1..=7u64)
            .map(|n| {
                let mut raw = sample_raw(n, &format!("acme/repo{n}"), 50);
                raw.open_issues_count = 0;
                raw
            })
            .collect();

        let processed = client.process_many(raws, &BatchOptions::default()).await;
        assert_eq!(processed.len(), DEFAULT_BATCH_MAX);
    }

    #[tokio::test]
    async fn rate_limit_mid_batch_returns_partial_results() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        // Three repos whose only secondary call is the issues fetch. The
        // third fetch reports an exhausted provider quota.
        let raws: Vec<_> = (1..=3u64)
            .map(|n| sample_raw(n, &format!("acme/repo{n}"), 50))
            .collect();
        for n in 1..=2u64 {
            transport.push_json(
                HttpMethod::Get,
                format!("https://api.github.com/repos/acme/repo{n}/issues?state=open&per_page=10"),
                "[]",
            );
        }
        transport.push_response(
            HttpMethod::Get,
            "https://api.github.com/repos/acme/repo3/issues?state=open&per_page=10",
            HttpResponse {
                status: 403,
                headers: vec![("X-RateLimit-Remaining".to_string(), "0".to_string())],
                body: Vec::new(),
            },
        );

        let processed = client.process_many(raws, &BatchOptions::default()).await;
        assert_eq!(processed.len(), 2);
        assert_eq!(processed[0].full_name, "acme/repo1");
        assert_eq!(processed[1].full_name, "acme/repo2");
    }

    // ---------- detail lookups ----------

    fn graphql_detail_body() -> &'static str {
        r##"{
          "data": {
            "repository": {
              "databaseId": 42,
              "name": "widgets",
              "nameWithOwner": "acme/widgets",
              "description": "widget factory",
              "stargazerCount": 1234,
              "forkCount": 56,
              "issues": {"totalCount": 2, "nodes": [
                {"title": "issue one", "number": 11, "url": "u11"}
              ]},
              "pullRequests": {"totalCount": 3},
              "primaryLanguage": {"name": "Rust"},
              "owner": {"login": "acme", "avatarUrl": "av"},
              "mentionableUsers": {"nodes": [
                {"login": "bob", "avatarUrl": "b", "contributionsCollection": {"totalCommitContributions": 250}}
              ]},
              "repositoryTopics": {"nodes": []},
              "homepageUrl": null,
              "createdAt": "2020-01-01T00:00:00Z",
              "updatedAt": "2026-01-01T00:00:00Z",
              "licenseInfo": null,
              "diskUsage": 100,
              "defaultBranchRef": {"name": "main"},
              "readme": {"text": "# Widgets"}
            }
          }
        }"##
    }

    #[tokio::test]
    async fn detail_lookup_uses_graphql_and_fills_both_cache_tables() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        let raw = sample_raw(42, "acme/widgets", 1234);
        transport.push_json(
            HttpMethod::Get,
            "https://api.github.com/repos/acme/widgets",
            &raw_json(&raw),
        );
        transport.push_json(
            HttpMethod::Post,
            "https://api.github.com/graphql",
            graphql_detail_body(),
        );

        let detail = client
            .repository_by_full_name("acme", "widgets", Some("tok"))
            .await
            .expect("detail");
        assert_eq!(detail.pull_requests, "3");
        assert_eq!(detail.readme, "# Widgets");
        assert_eq!(detail.contributors[0].login, "bob");

        // Second lookups by either key come from the cache: no new requests.
        let before = transport.requests().len();
        let by_name = client
            .repository_by_full_name("Acme", "Widgets", Some("tok"))
            .await
            .expect("cached by name");
        let by_id = client
            .repository_by_id(42, Some("tok"))
            .await
            .expect("cached by id");
        assert_eq!(by_name.full_name, "acme/widgets");
        assert_eq!(by_id.full_name, "acme/widgets");
        assert_eq!(transport.requests().len(), before);
    }

    #[tokio::test]
    async fn graphql_failure_falls_back_to_rest_aggregation() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        let mut raw = sample_raw(1, "acme/tiny", 50);
        raw.open_issues_count = 0;
        transport.push_response(
            HttpMethod::Post,
            "https://api.github.com/graphql",
            HttpResponse {
                status: 500,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );

        let processed = client
            .aggregate(&raw, Some("tok"))
            .await
            .expect("fallback aggregate");
        // REST path: no PR counting, base metadata only.
        assert_eq!(processed.pull_requests, "0");
        assert_eq!(processed.full_name, "acme/tiny");
    }

    #[tokio::test]
    async fn anonymous_aggregation_never_touches_graphql() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        let mut raw = sample_raw(1, "acme/tiny", 50);
        raw.open_issues_count = 0;

        client.aggregate(&raw, None).await.expect("aggregate");
        assert_eq!(transport.request_count_matching("/graphql"), 0);
    }

    #[tokio::test]
    async fn detail_cache_expires_after_the_ttl() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, clock) = client_with(&transport);

        let raw = sample_raw(42, "acme/widgets", 1234);
        for _ in 0..2 {
            transport.push_json(
                HttpMethod::Get,
                "https://api.github.com/repos/acme/widgets",
                &raw_json(&raw),
            );
            transport.push_json(
                HttpMethod::Post,
                "https://api.github.com/graphql",
                graphql_detail_body(),
            );
        }

        client
            .repository_by_full_name("acme", "widgets", Some("tok"))
            .await
            .expect("first detail");
        clock.advance(Duration::minutes(15));
        // Quota estimate is also stale now; a second probe goes out.
        push_rate_limit(&transport, 100);
        client
            .repository_by_full_name("acme", "widgets", Some("tok"))
            .await
            .expect("second detail");

        assert_eq!(transport.request_count_matching("/repos/acme/widgets"), 2);
    }

    // ---------- stats ----------

    #[tokio::test]
    async fn call_stats_count_each_endpoint() {
        let transport = MockTransport::new();
        push_rate_limit(&transport, 100);
        let (client, _clock) = client_with(&transport);

        let url = client
            .search_url("stars:>500", LISTING_PER_PAGE, 1)
            .expect("url");
        transport.push_json(HttpMethod::Get, &url, &search_body(&[]));
        client
            .popular_repositories(1, &QualityFilters::default(), None)
            .await
            .expect("listing");

        let snap = client.call_stats();
        assert_eq!(snap.per_endpoint.get("rate_limit"), Some(&1));
        assert_eq!(snap.per_endpoint.get("search"), Some(&1));
        assert_eq!(snap.total, 2);

        client.reset_stats();
        assert_eq!(client.call_stats().total, 0);
    }
}
