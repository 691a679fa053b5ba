//! GitHub API data types.
//!
//! [`RawRepositorySummary`] is the provider's native repository shape, held
//! transiently and never mutated. [`ProcessedRepository`] is the normalized
//! display-ready record the aggregator produces from it; its secondary fields
//! (contributors, issues, README, PR count) are always present, possibly
//! empty, so callers never deal with absent fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::format::format_count;

/// Repository owner as embedded in provider payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoOwner {
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
}

/// License object; only the display name is carried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseInfo {
    pub name: String,
}

/// The provider's native repository representation, passed through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRepositorySummary {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub owner: RepoOwner,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub open_issues_count: u64,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub license: Option<LicenseInfo>,
    /// Disk size in kilobytes.
    #[serde(default)]
    pub size: u64,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default)]
    pub visibility: Option<String>,
}

fn default_branch() -> String {
    "main".to_string()
}

impl RawRepositorySummary {
    /// Split the full name into its owner/name pair.
    ///
    /// Falls back to the embedded owner login when the full name is not in
    /// `owner/name` form.
    #[must_use]
    pub fn owner_and_name(&self) -> (&str, &str) {
        match self.full_name.split_once('/') {
            Some((owner, name)) => (owner, name),
            None => (self.owner.login.as_str(), self.name.as_str()),
        }
    }
}

/// Envelope of `GET /search/repositories`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    pub items: Vec<RawRepositorySummary>,
}

/// A repository contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
    pub contributions: u64,
}

/// A short open-issue summary for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub title: String,
    pub number: u64,
    pub html_url: String,
}

/// Issue as returned by `GET /repos/{owner}/{name}/issues`.
///
/// The issues endpoint also returns pull requests; the `pull_request` marker
/// field is how they are told apart.
#[derive(Debug, Clone, Deserialize)]
pub struct RawIssue {
    pub title: String,
    pub number: u64,
    pub html_url: String,
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl RawIssue {
    #[inline]
    #[must_use]
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    #[must_use]
    pub fn into_summary(self) -> IssueSummary {
        IssueSummary {
            title: self.title,
            number: self.number,
            html_url: self.html_url,
        }
    }
}

/// README payload from `GET /repos/{owner}/{name}/readme`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadmePayload {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: String,
}

/// Normalized, display-ready repository record.
///
/// Constructed once per aggregation, cached by id and by full name, and
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedRepository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    /// Display-formatted counts ("1.2k"); informational only.
    pub stars: String,
    pub forks: String,
    pub open_issues: String,
    pub pull_requests: String,
    pub language: Option<String>,
    pub owner: String,
    pub avatar_url: String,
    pub topics: Vec<String>,
    pub homepage: Option<String>,
    pub license: Option<String>,
    pub size_kb: u64,
    pub default_branch: String,
    /// README text; empty when not fetched or unavailable.
    pub readme: String,
    /// Sorted descending by contribution count.
    pub contributors: Vec<Contributor>,
    /// Up to five open issues.
    pub issues: Vec<IssueSummary>,
}

impl ProcessedRepository {
    /// Build the record from a raw summary with empty secondary data.
    ///
    /// Aggregators fill in contributors, issues, PR count, and README; on
    /// soft failure the defaults produced here stand.
    #[must_use]
    pub fn from_raw(raw: &RawRepositorySummary) -> Self {
        Self {
            id: raw.id,
            name: raw.name.clone(),
            full_name: raw.full_name.clone(),
            description: raw.description.clone(),
            stars: format_count(raw.stargazers_count),
            forks: format_count(raw.forks_count),
            open_issues: format_count(raw.open_issues_count),
            pull_requests: format_count(0),
            language: raw.language.clone(),
            owner: raw.owner.login.clone(),
            avatar_url: raw.owner.avatar_url.clone(),
            topics: raw.topics.clone(),
            homepage: raw.homepage.clone(),
            license: raw.license.as_ref().map(|l| l.name.clone()),
            size_kb: raw.size,
            default_branch: raw.default_branch.clone(),
            readme: String::new(),
            contributors: Vec::new(),
            issues: Vec::new(),
        }
    }
}

/// A single rate limit resource entry from `GET /rate_limit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitResource {
    pub limit: usize,
    pub used: usize,
    pub remaining: usize,
    /// Unix timestamp of the reset.
    pub reset: u64,
}

impl RateLimitResource {
    #[must_use]
    pub fn reset_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.reset as i64, 0).unwrap_or_else(Utc::now)
    }
}

/// Rate limit resources relevant to this layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitResources {
    pub core: RateLimitResource,
    #[serde(default)]
    pub search: Option<RateLimitResource>,
    #[serde(default)]
    pub graphql: Option<RateLimitResource>,
}

/// Envelope of `GET /rate_limit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitResponse {
    pub resources: RateLimitResources,
}
