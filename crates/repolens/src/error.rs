//! Error taxonomy and response classification.
//!
//! Failed provider responses are classified into a small typed taxonomy so
//! callers can react differently to each case: re-authenticate on
//! [`GitHubError::Auth`], surface cached data on [`GitHubError::RateLimited`],
//! render a missing state on [`GitHubError::NotFound`], and retry generically
//! on [`GitHubError::Api`]. Classification is a pure function of status code
//! and headers; error bodies are not guaranteed parseable and are never read.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::http::HttpResponse;

/// Errors raised by the GitHub API access layer.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// Credential missing, invalid, expired, or lacking OAuth scope.
    #[error("authentication failed: {reason}")]
    Auth { reason: String },

    /// Quota exhausted, either locally estimated or provider-confirmed.
    #[error("rate limit exceeded")]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    /// 404 from the provider.
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// Any other non-2xx provider response.
    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure (DNS, connect, timeout).
    #[error("network error: {message}")]
    Network { message: String },

    /// Unexpected state, e.g. an unparseable success body.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GitHubError {
    #[inline]
    pub fn auth(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }

    #[inline]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Rate limit exhausted with no known reset time (local estimate).
    #[inline]
    pub fn rate_limited() -> Self {
        Self::RateLimited { reset_at: None }
    }

    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    #[inline]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// Result type for API layer operations.
pub type Result<T> = std::result::Result<T, GitHubError>;

/// First line of an error message, for compact log output.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Classify a provider response, returning `Ok(())` when it is a success.
///
/// Decision table for 403, in order:
/// - `X-RateLimit-Remaining: 0` means the primary quota is exhausted
///   (secondary limits also arrive this way); the reset header, when present,
///   is carried along.
/// - An empty `X-OAuth-Scopes` header means the token authenticated but
///   grants no scopes.
/// - Anything else is a plain forbidden.
pub fn classify_response(response: &HttpResponse, resource: &str) -> Result<()> {
    if response.is_success() {
        return Ok(());
    }

    match response.status {
        401 => Err(GitHubError::auth("credential invalid or expired")),
        403 => {
            if response.header("x-ratelimit-remaining") == Some("0") {
                return Err(GitHubError::RateLimited {
                    reset_at: parse_reset_header(response),
                });
            }
            if let Some(scopes) = response.header("x-oauth-scopes") {
                if scopes.trim().is_empty() {
                    return Err(GitHubError::auth("insufficient OAuth scope"));
                }
            }
            Err(GitHubError::api(403, "forbidden"))
        }
        404 => Err(GitHubError::not_found(resource)),
        status => Err(GitHubError::api(status, status_text(status))),
    }
}

/// Compute the quota reset time from `X-RateLimit-Reset` (epoch seconds).
fn parse_reset_header(response: &HttpResponse) -> Option<DateTime<Utc>> {
    response
        .header("x-ratelimit-reset")
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|epoch| DateTime::from_timestamp(epoch, 0))
}

/// Canonical reason phrase for a status code.
fn status_text(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        405 => "Method Not Allowed",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "HTTP error",
    }
}
