//! Heuristic rate limit guard.
//!
//! The guard keeps an in-process estimate of the remaining provider quota and
//! decides before every outbound call whether it may proceed. The estimate is
//! refreshed from the provider only when it has gone stale or fallen near the
//! low-water mark; otherwise each allowed call optimistically decrements it
//! by one. This trades exactness for one live check per refresh window.
//!
//! The thresholds live in [`QuotaPolicy`] so tests can drive exhaustion and
//! staleness deterministically.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;

/// Thresholds controlling refresh and denial decisions.
#[derive(Debug, Clone)]
pub struct QuotaPolicy {
    /// How long a live check stays authoritative.
    pub refresh_interval: Duration,
    /// Below this estimate, force a live re-check instead of decrementing.
    pub low_water: usize,
    /// At or below this estimate, deny calls outright.
    pub deny_threshold: usize,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::minutes(5),
            low_water: 20,
            deny_threshold: 10,
        }
    }
}

/// What the guard decided for one prospective call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    /// Call may proceed; the local estimate was decremented.
    Allow,
    /// Estimate is at or below the deny threshold; do not call.
    Deny,
    /// State is stale or near the low-water mark; a live check is required.
    RefreshDue,
}

#[derive(Debug, Clone)]
struct QuotaState {
    last_checked: Option<DateTime<Utc>>,
    remaining: usize,
}

/// In-process quota estimator.
///
/// One guard belongs to one [`crate::GitHubClient`]; independent clients keep
/// independent estimates.
pub struct QuotaGuard {
    state: Mutex<QuotaState>,
    policy: QuotaPolicy,
    clock: Arc<dyn Clock>,
}

impl QuotaGuard {
    pub fn new(policy: QuotaPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(QuotaState {
                last_checked: None,
                remaining: 0,
            }),
            policy,
            clock,
        }
    }

    /// Decide whether one call may proceed using only local state.
    ///
    /// Never performs I/O. On [`QuotaDecision::RefreshDue`] the caller is
    /// expected to perform a live check and feed the result back through
    /// [`QuotaGuard::record_refresh`]; an inconclusive live check must be
    /// treated as a denial (fail closed).
    pub fn evaluate(&self) -> QuotaDecision {
        let mut state = self.state.lock().expect("quota lock should not be poisoned");

        let Some(last_checked) = state.last_checked else {
            return QuotaDecision::RefreshDue;
        };

        // Denial wins over staleness: once the tracked estimate is at or
        // below the threshold, calls stop regardless of whether a live
        // check was due.
        if state.remaining <= self.policy.deny_threshold {
            return QuotaDecision::Deny;
        }

        let fresh = self.clock.now() - last_checked < self.policy.refresh_interval;
        if fresh && state.remaining > self.policy.low_water {
            state.remaining -= 1;
            if state.remaining > self.policy.deny_threshold {
                QuotaDecision::Allow
            } else {
                QuotaDecision::Deny
            }
        } else {
            QuotaDecision::RefreshDue
        }
    }

    /// Overwrite the estimate with an authoritative remaining count.
    ///
    /// Returns whether calls are allowed under the refreshed estimate.
    pub fn record_refresh(&self, remaining: usize) -> bool {
        let mut state = self.state.lock().expect("quota lock should not be poisoned");
        state.remaining = remaining;
        state.last_checked = Some(self.clock.now());
        remaining > self.policy.deny_threshold
    }

    /// True when the state was never checked or the refresh window lapsed.
    ///
    /// Lets a caller refresh a denied-but-stale estimate so denial can lift
    /// once the provider window resets; the denied call itself stays denied.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        let state = self.state.lock().expect("quota lock should not be poisoned");
        match state.last_checked {
            None => true,
            Some(last) => self.clock.now() - last >= self.policy.refresh_interval,
        }
    }

    /// Current local estimate (heuristic, not an exact count).
    #[must_use]
    pub fn remaining_estimate(&self) -> usize {
        self.state
            .lock()
            .expect("quota lock should not be poisoned")
            .remaining
    }

    #[must_use]
    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }
}
