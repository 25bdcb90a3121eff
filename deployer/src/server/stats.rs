//! Request statistics

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Count and payload volume of requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Counter {
    pub request_count: u64,
    pub request_bytes: u64,
}

impl Counter {
    fn add(&mut self, bytes: u64) {
        self.request_count += 1;
        self.request_bytes += bytes;
    }
}

/// Statistics since the server started
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub start: DateTime<Utc>,
    #[serde(flatten)]
    pub totals: Counter,
    pub route_stats: BTreeMap<String, Counter>,
}

#[derive(Debug, Default)]
struct Inner {
    totals: Counter,
    routes: BTreeMap<String, Counter>,
}

/// Tracks requests served, in total and per route
#[derive(Debug)]
pub struct RequestStats {
    start: DateTime<Utc>,
    inner: Mutex<Inner>,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            start: Utc::now(),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn record(&self, route: &str, bytes: u64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.totals.add(bytes);
            inner.routes.entry(route.to_string()).or_default().add(bytes);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let (totals, route_stats) = match self.inner.lock() {
            Ok(inner) => (inner.totals.clone(), inner.routes.clone()),
            Err(_) => (Counter::default(), BTreeMap::new()),
        };
        StatsSnapshot {
            start: self.start,
            totals,
            route_stats,
        }
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}
