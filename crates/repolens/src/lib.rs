//! Repolens - a guarded GitHub API access layer.
//!
//! This library wraps the GitHub REST and GraphQL APIs behind a client that
//! enforces the guard rails a shared deployment needs: a heuristic rate
//! limit guard that fails closed, a TTL response cache with lazy
//! invalidation, credential precedence (per-call user token over a
//! process-wide fallback), typed error classification from status codes and
//! headers, and content filtering of listings.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use repolens::github::{GitHubClient, UserPreferences};
//! use repolens::http::ReqwestTransport;
//!
//! let transport = Arc::new(ReqwestTransport::new()?);
//! let client = GitHubClient::builder(transport)
//!     .app_token(std::env::var("GITHUB_TOKEN").ok())
//!     .build();
//!
//! let found = client
//!     .search_repositories("http server", 10, &UserPreferences::default(), None)
//!     .await?;
//! ```

pub mod auth;
pub mod cache;
pub mod clock;
pub mod error;
pub mod format;
pub mod github;
pub mod http;
pub mod pace;
pub mod quota;
pub mod retry;
pub mod stats;

pub use error::{GitHubError, Result};
pub use github::{BatchOptions, GitHubClient, GitHubClientBuilder};
pub use http::{HttpTransport, ReqwestTransport};
pub use pace::ApiRateLimiter;
pub use quota::{QuotaDecision, QuotaGuard, QuotaPolicy};
