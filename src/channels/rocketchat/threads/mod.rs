//! Threads discovered from channel history, their reply cursor and expiry.

use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;
use rocketlink_core::ChatMessage;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadState {
    pub last_seen_at: DateTime<Utc>,
    /// Replies already fetched and handled; next page starts here.
    pub offset: u32,
}

/// Tracked threads keyed by root message id, polled in discovery order.
#[derive(Debug, Default)]
pub struct ThreadTracker {
    threads: IndexMap<String, ThreadState>,
}

impl ThreadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track every thread root in `messages`. Returns how many were new.
    ///
    /// Replies pointing at an untracked parent are not enough to start tracking.
    pub fn observe_roots(&mut self, messages: &[ChatMessage], now: DateTime<Utc>) -> usize {
        messages
            .iter()
            .filter(|m| m.is_thread_root())
            .filter(|m| self.observe(&m.id, now))
            .count()
    }

    /// Returns true when `thread_id` was not tracked before.
    pub fn observe(&mut self, thread_id: &str, now: DateTime<Utc>) -> bool {
        if let Some(state) = self.threads.get_mut(thread_id) {
            state.last_seen_at = now;
            return false;
        }
        self.threads.insert(
            thread_id.to_string(),
            ThreadState {
                last_seen_at: now,
                offset: 0,
            },
        );
        true
    }

    /// Drop threads idle for longer than `ttl`. Returns the removed ids.
    pub fn prune(&mut self, now: DateTime<Utc>, ttl: Duration) -> Vec<String> {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let mut expired = Vec::new();
        self.threads.retain(|id, state| {
            let keep = now.signed_duration_since(state.last_seen_at) <= ttl;
            if !keep {
                expired.push(id.clone());
            }
            keep
        });
        expired
    }

    /// Snapshot of `(thread_id, offset)` pairs to poll this cycle.
    pub fn active(&self) -> Vec<(String, u32)> {
        self.threads
            .iter()
            .map(|(id, state)| (id.clone(), state.offset))
            .collect()
    }

    /// Move the cursor past `consumed` new replies and record activity.
    pub fn advance(&mut self, thread_id: &str, consumed: u32, now: DateTime<Utc>) {
        if consumed == 0 {
            return;
        }
        if let Some(state) = self.threads.get_mut(thread_id) {
            state.offset = state.offset.saturating_add(consumed);
            state.last_seen_at = now;
        }
    }

    pub fn get(&self, thread_id: &str) -> Option<&ThreadState> {
        self.threads.get(thread_id)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}
