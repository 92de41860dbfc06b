// Copyright 2026 GPU Autoscaler Working Group

//! Thread-safe telemetry cache with TTL and background eviction (spec §4.2).
//!
//! Keyed by `(query_name, canonicalized_params)`. Reads never delete
//! expired entries — they return the value alongside an `expired` flag and
//! let the caller decide whether to accept it. A background task evicts
//! entries once they are expired by more than `grace`.

use crate::types::MetricResult;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

/// Cache key: query name plus its canonicalized (lexicographically sorted)
/// parameter map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Name of the query this cached value came from.
    pub query_name: String,
    /// Canonicalized parameter map, rendered into a stable string so it can
    /// be hashed as part of the key.
    params_repr: String,
}

impl CacheKey {
    /// Build a key from a query name and parameter map. The parameter map is
    /// canonicalized by iterating its keys in lexicographic order —
    /// `BTreeMap` already guarantees that order, so this is just a stable
    /// join.
    pub fn new(query_name: impl Into<String>, params: &BTreeMap<String, String>) -> Self {
        let params_repr = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        Self {
            query_name: query_name.into(),
            params_repr,
        }
    }
}

/// A cached result plus the window it's valid in.
///
/// Invariant: `expires_at > captured_at`.
#[derive(Debug, Clone)]
pub struct CachedValue {
    /// The cached query result.
    pub result: MetricResult,
    /// When this value was captured.
    pub captured_at: DateTime<Utc>,
    /// When this value expires.
    pub expires_at: DateTime<Utc>,
}

/// A value read from the cache, tagged with whether it was expired at read
/// time. Expired entries are returned, not hidden — callers decide whether
/// to accept them (spec §4.2, §4.3 freshness tagging).
#[derive(Debug, Clone)]
pub struct CacheRead {
    /// The cached value as it was stored.
    pub value: CachedValue,
    /// Whether `now >= expires_at` at the time of this read.
    pub expired: bool,
}

/// Thread-safe, TTL'd telemetry cache.
///
/// Concurrent readers never block each other; writers hold an exclusive
/// lock only for the duration of a single entry's store (guaranteed by
/// `DashMap`'s per-shard locking).
#[derive(Debug, Clone)]
pub struct TelemetryCache {
    entries: Arc<DashMap<CacheKey, CachedValue>>,
    /// How long past `expires_at` an entry is allowed to linger before the
    /// background evictor removes it.
    grace: chrono::Duration,
}

impl TelemetryCache {
    /// Create a cache with the given eviction grace period.
    pub fn new(grace: chrono::Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            grace,
        }
    }

    /// Store a result with the given TTL, computing `expires_at = now + ttl`.
    pub fn put(&self, key: CacheKey, result: MetricResult, ttl: chrono::Duration) {
        let now = Utc::now();
        self.entries.insert(
            key,
            CachedValue {
                result,
                captured_at: now,
                expires_at: now + ttl,
            },
        );
    }

    /// Read a value. Never deletes on read, even if expired.
    pub fn get(&self, key: &CacheKey) -> Option<CacheRead> {
        self.entries.get(key).map(|entry| {
            let value = entry.value().clone();
            let expired = Utc::now() >= value.expires_at;
            CacheRead { value, expired }
        })
    }

    /// Number of entries currently stored, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache currently has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove entries that are expired by more than `grace`. Interleaves
    /// with concurrent readers without starving them, since `DashMap`
    /// shards locks per-bucket.
    fn evict_expired(&self) {
        let now = Utc::now();
        let grace = self.grace;
        self.entries
            .retain(|_, value| now < value.expires_at + grace);
    }

    /// Spawn the background eviction task. Runs until the returned handle is
    /// aborted or dropped along with the runtime.
    pub fn spawn_evictor(&self, interval: StdDuration) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                cache.evict_expired();
                tracing::debug!(entries = cache.len(), "telemetry cache eviction pass complete");
            }
        })
    }
}

impl Default for TelemetryCache {
    fn default() -> Self {
        Self::new(chrono::Duration::seconds(30))
    }
}
