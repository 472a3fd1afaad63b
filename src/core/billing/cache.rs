use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::core::models::usage::{UsageQuery, UsageReport};

const MAX_ENTRIES: usize = 32;

/// In-memory TTL cache of fetched reports, keyed by date range.
///
/// Lives only for the process lifetime; repeated refreshes of the same
/// ranges inside the TTL reuse the previous report instead of re-hitting
/// the endpoint.
pub struct ReportCache {
    ttl: Duration,
    entries: HashMap<UsageQuery, (Instant, UsageReport)>,
}

impl ReportCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Get a cached report, evicting it if the TTL has passed.
    pub fn get(&mut self, query: &UsageQuery) -> Option<UsageReport> {
        match self.entries.get(query) {
            Some((stored_at, report)) if stored_at.elapsed() < self.ttl => Some(report.clone()),
            Some(_) => {
                self.entries.remove(query);
                None
            }
            None => None,
        }
    }

    pub fn insert(&mut self, query: UsageQuery, report: UsageReport) {
        if self.entries.len() >= MAX_ENTRIES && !self.entries.contains_key(&query) {
            let stalest = self
                .entries
                .iter()
                .min_by_key(|(_, (stored_at, _))| *stored_at)
                .map(|(q, _)| *q);
            if let Some(stalest) = stalest {
                self.entries.remove(&stalest);
            }
        }
        self.entries.insert(query, (Instant::now(), report));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
