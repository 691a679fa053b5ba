//! GitHub repository operations.
//!
//! This module provides the listing, search, and detail operations built on
//! the guard-rail infrastructure in the crate root.
//!
//! # Module Structure
//!
//! - [`types`] - Provider data shapes and the processed detail record
//! - [`query`] - Search query construction and content filtering
//! - [`graphql`] - Single-round-trip detail aggregation
//! - [`rest`] - REST fallback helpers and threshold gates
//! - [`aggregate`] - Aggregation strategy seam
//! - [`client`] - The client tying everything together
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use repolens::github::{GitHubClient, QualityFilters};
//! use repolens::http::ReqwestTransport;
//!
//! let transport = Arc::new(ReqwestTransport::new()?);
//! let client = GitHubClient::builder(transport)
//!     .app_token(std::env::var("GITHUB_TOKEN").ok())
//!     .build();
//!
//! let listed = client
//!     .popular_repositories(1, &QualityFilters::default(), None)
//!     .await?;
//! let detailed = client.process_many(listed, &Default::default()).await;
//! ```

pub mod aggregate;
mod client;
mod graphql;
mod query;
mod rest;
mod types;

// Re-export the client surface
pub use client::{
    BatchOptions, DEFAULT_BASE_URL, DEFAULT_BATCH_MAX, GitHubClient, GitHubClientBuilder,
    LISTING_PER_PAGE,
};

// Re-export query inputs and content filtering
pub use query::{
    BANNED_KEYWORDS, QualityFilters, UserPreferences, augment_search_query, fallback_query,
    filter_blocked, is_blocked, quality_query, trending_query,
};

// Re-export data shapes
pub use types::{
    Contributor, IssueSummary, LicenseInfo, ProcessedRepository, RateLimitResource,
    RateLimitResources, RateLimitResponse, RawIssue, RawRepositorySummary, ReadmePayload,
    RepoOwner, SearchResponse,
};

// Re-export aggregation seam and thresholds
pub use aggregate::{Aggregator, GraphQlAggregator, RestAggregator};
pub use rest::{CONTRIBUTORS_MIN_STARS, PR_COUNT_MIN_STARS};
