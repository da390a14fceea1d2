//! Bounded, self-expiring collections for transient feedback (stat-change
//! indicators, coin toasts, evolution celebrations).
//!
//! There are no timers: entries carry their own expiry and are pruned on every
//! push and every read. Callers pass `now` explicitly so tests can drive time.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// How long a stat-change indicator stays visible.
pub const STAT_CHANGE_TTL_MS: i64 = 2_000;

/// How long a coin toast stays visible.
pub const COIN_CHANGE_TTL_MS: i64 = 3_500;

/// How long an evolution celebration stays pending.
pub const EVOLUTION_TTL_MS: i64 = 5_000;

/// Default upper bound on live entries per queue.
pub const DEFAULT_CAPACITY: usize = 16;

/// A value with the time it was created and the time it stops being live.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expiring<T> {
    pub id: u64,
    #[serde(flatten)]
    pub value: T,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Append-only queue whose entries disappear after a fixed time-to-live.
///
/// When full, the oldest entry is dropped to make room.
#[derive(Debug, Clone)]
pub struct ExpiringQueue<T> {
    entries: VecDeque<Expiring<T>>,
    ttl: Duration,
    capacity: usize,
    next_id: u64,
}

impl<T: Clone> ExpiringQueue<T> {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            ttl,
            capacity: capacity.max(1),
            next_id: 1,
        }
    }

    pub fn with_ttl_ms(ttl_ms: i64) -> Self {
        Self::new(Duration::milliseconds(ttl_ms), DEFAULT_CAPACITY)
    }

    /// Add an entry created at `now`. Returns its id.
    pub fn push(&mut self, value: T, now: DateTime<Utc>) -> u64 {
        self.prune(now);
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }

        let id = self.next_id;
        self.next_id += 1;
        self.entries.push_back(Expiring {
            id,
            value,
            created_at: now,
            expires_at: now + self.ttl,
        });
        id
    }

    /// Drop every entry whose expiry is at or before `now`.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        self.entries.retain(|e| e.expires_at > now);
    }

    /// Entries still live at `now`, oldest first.
    pub fn live(&mut self, now: DateTime<Utc>) -> Vec<Expiring<T>> {
        self.prune(now);
        self.entries.iter().cloned().collect()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
