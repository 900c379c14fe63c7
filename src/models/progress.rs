use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Run state persisted to the checkpoint file.
///
/// The processed and failed sets are disjoint and the counters always equal
/// their sizes. Only the batch runner mutates this, between batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    processed_keywords: BTreeSet<String>,
    failed_keywords: BTreeSet<String>,
    total_keywords: usize,
    start_time: DateTime<Utc>,
    last_update_time: DateTime<Utc>,
    completed_count: usize,
    failed_count: usize,
}

impl ProgressState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            processed_keywords: BTreeSet::new(),
            failed_keywords: BTreeSet::new(),
            total_keywords: 0,
            start_time: now,
            last_update_time: now,
            completed_count: 0,
            failed_count: 0,
        }
    }

    pub fn processed(&self) -> &BTreeSet<String> {
        &self.processed_keywords
    }

    pub fn failed(&self) -> &BTreeSet<String> {
        &self.failed_keywords
    }

    pub fn is_processed(&self, key: &str) -> bool {
        self.processed_keywords.contains(key)
    }

    pub fn total(&self) -> usize {
        self.total_keywords
    }

    pub fn completed_count(&self) -> usize {
        self.completed_count
    }

    pub fn failed_count(&self) -> usize {
        self.failed_count
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn last_update_time(&self) -> DateTime<Utc> {
        self.last_update_time
    }

    pub fn set_total(&mut self, total: usize) {
        self.total_keywords = total;
    }

    /// Family finished and (unless dry-run) was written. Clears an earlier failure.
    pub fn mark_completed(&mut self, key: &str) {
        self.failed_keywords.remove(key);
        self.processed_keywords.insert(key.to_string());
        self.sync_counts();
    }

    pub fn mark_failed(&mut self, key: &str) {
        self.processed_keywords.remove(key);
        self.failed_keywords.insert(key.to_string());
        self.sync_counts();
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update_time = now;
    }

    /// Restore the invariants on a state read from disk. A key recorded as
    /// both processed and failed is treated as processed.
    pub fn normalize(&mut self) {
        let processed = &self.processed_keywords;
        self.failed_keywords.retain(|k| !processed.contains(k));
        self.sync_counts();
    }

    /// Forget keys the predicate rejects, e.g. families that no longer exist.
    pub fn retain_known(&mut self, known: impl Fn(&str) -> bool) {
        self.processed_keywords.retain(|k| known(k));
        self.failed_keywords.retain(|k| known(k));
        self.sync_counts();
    }

    fn sync_counts(&mut self) {
        self.completed_count = self.processed_keywords.len();
        self.failed_count = self.failed_keywords.len();
    }
}
