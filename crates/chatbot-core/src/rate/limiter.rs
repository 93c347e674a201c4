//! Sliding-window limiter keyed by (dimension, key).
//!
//! The limiter holds configuration and a clock; the timestamps live in a
//! [`RateBuckets`] value owned by the caller (the memory store), so they can
//! be persisted and restored. The limiter does no locking of its own.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use chatbot_types::rate::{RateLimitConfig, RateWindow};

use super::clock::Clock;

/// Event timestamps per dimension and key, oldest first.
///
/// Serializes as `dimension -> key -> [timestamps]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateBuckets(BTreeMap<String, BTreeMap<String, Vec<f64>>>);

impl RateBuckets {
    /// Retained timestamps for one bucket (empty if it was never touched).
    pub fn events(&self, dimension: &str, key: &str) -> &[f64] {
        self.0
            .get(dimension)
            .and_then(|keys| keys.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn bucket_mut(&mut self, dimension: &str, key: &str) -> &mut Vec<f64> {
        self.0
            .entry(dimension.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
    }
}

/// Multi-key, multi-window sliding-window limiter.
pub struct SlidingWindowLimiter {
    windows: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    /// Create a limiter. Windows with a non-positive bound are dropped with a warning.
    pub fn new(windows: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let windows = windows
            .into_iter()
            .map(|(dimension, list)| {
                let valid: Vec<RateWindow> = list
                    .into_iter()
                    .filter(|w| {
                        let ok = w.is_valid();
                        if !ok {
                            tracing::warn!(
                                dimension = %dimension,
                                window_seconds = w.window_seconds,
                                max_events = w.max_events,
                                "Ignoring invalid rate window"
                            );
                        }
                        ok
                    })
                    .collect();
                (dimension, valid)
            })
            .collect();
        Self { windows, clock }
    }

    /// Configured windows for a dimension (empty when unconstrained).
    pub fn windows_for(&self, dimension: &str) -> &[RateWindow] {
        self.windows
            .get(dimension)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Check and record one event for `(dimension, key)`.
    ///
    /// Unconfigured dimensions always allow but still record. Otherwise each
    /// window, in order, prunes timestamps at or before `now - window_seconds`
    /// and declines if the remaining count has reached `max_events`. The event
    /// is recorded only when every window has capacity.
    ///
    /// A timestamp exactly `window_seconds` old counts as expired, so a caller
    /// that waits a full window always gets capacity back.
    pub fn allow(&self, buckets: &mut RateBuckets, dimension: &str, key: &str) -> bool {
        self.allow_all(buckets, &[(dimension, key)]).is_ok()
    }

    /// Check several `(dimension, key)` pairs and record all of them, or none.
    ///
    /// Returns the first dimension without capacity. A decline on a later
    /// dimension leaves the earlier buckets unrecorded, so a declined turn does
    /// not spend anyone's quota.
    pub fn allow_all<'a>(
        &self,
        buckets: &mut RateBuckets,
        keys: &[(&'a str, &str)],
    ) -> Result<(), &'a str> {
        let now = self.clock.now_secs();
        for &(dimension, key) in keys {
            if !self.has_capacity(buckets.bucket_mut(dimension, key), dimension, key, now) {
                return Err(dimension);
            }
        }
        for &(dimension, key) in keys {
            buckets.bucket_mut(dimension, key).push(now);
        }
        Ok(())
    }

    /// Prune every window of `dimension` and report whether all have room.
    fn has_capacity(&self, bucket: &mut Vec<f64>, dimension: &str, key: &str, now: f64) -> bool {
        for window in self.windows_for(dimension) {
            let cutoff = now - window.window_seconds;
            let stale = bucket.partition_point(|&ts| ts <= cutoff);
            bucket.drain(..stale);

            if bucket.len() >= window.max_events {
                tracing::debug!(
                    dimension,
                    key,
                    window_seconds = window.window_seconds,
                    max_events = window.max_events,
                    "Rate limit reached"
                );
                return false;
            }
        }
        true
    }
}
