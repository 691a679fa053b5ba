//! REST fallback aggregation helpers.
//!
//! The REST path assembles the detail record from separate endpoint calls,
//! gated by thresholds so small repositories cost one request and large ones
//! a handful. Pure helpers live here; the calls themselves are issued by the
//! client.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::{GitHubError, Result};
use crate::github::types::{Contributor, IssueSummary, RawIssue, ReadmePayload};

/// Contributors are fetched only above this star count.
pub const CONTRIBUTORS_MIN_STARS: u64 = 100;

/// Pull request counting is gated above this star count.
pub const PR_COUNT_MIN_STARS: u64 = 500;

/// Page size for contributor and issue listing calls.
pub const SECONDARY_PER_PAGE: usize = 10;

/// Open issues carried into the detail record.
pub const MAX_ISSUES: usize = 5;

/// Whether a repository is popular enough to warrant a contributors call.
#[inline]
#[must_use]
pub fn wants_contributors(stars: u64) -> bool {
    stars > CONTRIBUTORS_MIN_STARS
}

/// Whether a repository's open-issue count warrants an issues call.
#[inline]
#[must_use]
pub fn wants_issues(open_issues: u64) -> bool {
    open_issues > 0
}

/// Whether a repository is popular enough for the pull request count path.
///
/// The search-based PR count needs scopes the fallback token rarely has, so
/// the REST path reports zero even when the gate opens; the GraphQL path is
/// where real counts come from.
#[inline]
#[must_use]
pub fn wants_pull_request_count(stars: u64) -> bool {
    stars > PR_COUNT_MIN_STARS
}

/// Decode a README payload into text.
///
/// GitHub base64-encodes content with embedded newlines; those are stripped
/// before decoding. Unknown encodings and undecodable bytes are errors the
/// caller downgrades to an empty README.
pub fn decode_readme(payload: &ReadmePayload) -> Result<String> {
    if payload.encoding != "base64" {
        return Err(GitHubError::internal(format!(
            "unsupported readme encoding: {}",
            payload.encoding
        )));
    }

    let compact: String = payload
        .content
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let bytes = BASE64
        .decode(compact.as_bytes())
        .map_err(|e| GitHubError::internal(format!("readme base64 decode error: {e}")))?;

    String::from_utf8(bytes)
        .map_err(|e| GitHubError::internal(format!("readme is not valid UTF-8: {e}")))
}

/// Normalize a contributor listing: drop zero-contribution entries and sort
/// by contribution count descending.
#[must_use]
pub fn top_contributors(mut contributors: Vec<Contributor>) -> Vec<Contributor> {
    contributors.retain(|c| c.contributions > 0);
    contributors.sort_by(|a, b| b.contributions.cmp(&a.contributions));
    contributors
}

/// Reduce an issues listing to displayable open issues.
///
/// The issues endpoint interleaves pull requests; those are dropped before
/// the five-issue cap is applied.
#[must_use]
pub fn open_issue_summaries(raw: Vec<RawIssue>) -> Vec<IssueSummary> {
    raw.into_iter()
        .filter(|i| !i.is_pull_request())
        .take(MAX_ISSUES)
        .map(RawIssue::into_summary)
        .collect()
}
