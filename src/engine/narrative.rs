//! Time-bounded per-user narrative cache
//!
//! Holds the synthesized "who is this user" narrative consulted on new
//! conversation starts. Single-writer invariant: only the background path
//! calls `put`; the fast path only reads. Entries are invalidated in place
//! (tombstoned, not removed) on TTL expiry or when a durable memory write
//! lands for the user, forcing the next new conversation to regenerate.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;

use crate::metrics;

#[derive(Debug, Clone)]
pub struct NarrativeCacheEntry {
    pub user_id: String,
    pub narrative_text: String,
    pub computed_at: DateTime<Utc>,
    pub ttl: Duration,
    invalidated: bool,
}

impl NarrativeCacheEntry {
    fn is_expired(&self) -> bool {
        let age = Utc::now().signed_duration_since(self.computed_at);
        age.num_milliseconds() as u128 > self.ttl.as_millis()
    }
}

#[derive(Default)]
pub struct NarrativeCache {
    entries: DashMap<String, NarrativeCacheEntry>,
}

impl NarrativeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a live narrative for a user. Expired or invalidated entries
    /// report as misses.
    pub fn get(&self, user_id: &str) -> Option<NarrativeCacheEntry> {
        let Some(entry) = self.entries.get(user_id) else {
            metrics::NARRATIVE_CACHE_TOTAL
                .with_label_values(&["miss"])
                .inc();
            return None;
        };

        if entry.invalidated {
            metrics::NARRATIVE_CACHE_TOTAL
                .with_label_values(&["invalidated"])
                .inc();
            return None;
        }

        if entry.is_expired() {
            metrics::NARRATIVE_CACHE_TOTAL
                .with_label_values(&["expired"])
                .inc();
            return None;
        }

        metrics::NARRATIVE_CACHE_TOTAL
            .with_label_values(&["hit"])
            .inc();
        Some(entry.clone())
    }

    /// Store a freshly synthesized narrative. Background path only.
    pub fn put(&self, user_id: &str, narrative_text: String, ttl: Duration) {
        self.entries.insert(
            user_id.to_string(),
            NarrativeCacheEntry {
                user_id: user_id.to_string(),
                narrative_text,
                computed_at: Utc::now(),
                ttl,
                invalidated: false,
            },
        );
    }

    /// Tombstone a user's narrative. Called whenever the write pipeline
    /// durably accepts a new memory for that user.
    pub fn invalidate(&self, user_id: &str) {
        if let Some(mut entry) = self.entries.get_mut(user_id) {
            entry.invalidated = true;
        }
    }

    /// Number of entries (live or tombstoned); for diagnostics
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
