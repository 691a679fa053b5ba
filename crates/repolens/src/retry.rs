//! Retry budget for transient transport failures.
//!
//! Only network-level errors are retried; classified API errors (auth, rate
//! limit, not-found) are policy decisions for the caller and must surface on
//! the first occurrence.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::http::HttpError;

/// Initial delay before the first retry.
pub const INITIAL_BACKOFF_MS: u64 = 500;
/// Ceiling for the backoff delay.
pub const MAX_BACKOFF_MS: u64 = 5_000;
/// Maximum retry attempts after the initial try.
pub const MAX_NETWORK_RETRIES: usize = 2;

/// Backoff strategy for transient network failures: jittered exponential,
/// capped attempts.
#[must_use]
pub fn network_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(INITIAL_BACKOFF_MS))
        .with_max_delay(Duration::from_millis(MAX_BACKOFF_MS))
        .with_max_times(MAX_NETWORK_RETRIES)
        .with_jitter()
}

/// Whether a transport error is worth retrying.
///
/// Mock bookkeeping errors are excluded so tests observe exact call counts.
#[inline]
#[must_use]
pub fn is_transient(error: &HttpError) -> bool {
    matches!(error, HttpError::Transport(_))
}
