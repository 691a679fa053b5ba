//! Observability counters for outbound provider calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::clock::Clock;

/// Process-wide call counters, resettable on demand.
///
/// Purely observational; nothing in the call pipeline branches on these.
pub struct ApiCallStats {
    inner: Mutex<StatsInner>,
    clock: Arc<dyn Clock>,
}

struct StatsInner {
    total: u64,
    per_endpoint: HashMap<&'static str, u64>,
    since: DateTime<Utc>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub total: u64,
    pub per_endpoint: HashMap<&'static str, u64>,
    pub since: DateTime<Utc>,
}

impl ApiCallStats {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let since = clock.now();
        Self {
            inner: Mutex::new(StatsInner {
                total: 0,
                per_endpoint: HashMap::new(),
                since,
            }),
            clock,
        }
    }

    /// Count one call against a logical endpoint label.
    pub fn record(&self, endpoint: &'static str) {
        let mut inner = self.inner.lock().expect("stats lock should not be poisoned");
        inner.total += 1;
        *inner.per_endpoint.entry(endpoint).or_insert(0) += 1;
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock().expect("stats lock should not be poisoned");
        StatsSnapshot {
            total: inner.total,
            per_endpoint: inner.per_endpoint.clone(),
            since: inner.since,
        }
    }

    /// Zero all counters and restart the observation window.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("stats lock should not be poisoned");
        inner.total = 0;
        inner.per_endpoint.clear();
        inner.since = self.clock.now();
    }
}
