//! Core rate limiter implementation.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::key::LimiterKey;
use super::policy::Policy;
use super::ring::{Millis, RingError, TimestampRing};
use crate::error::Result;

/// Details of a rejected call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// The key that ran out of calls
    pub key: LimiterKey,
    /// The limit actually enforced for the key: the ring capacity fixed when
    /// the key was first seen, with the window of the rejected call
    pub policy: Policy,
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The call may proceed and was recorded.
    Admit,
    /// Too many calls in the trailing window.
    Reject(Rejection),
    /// Limiting is disabled for this call. Nothing was recorded.
    Bypass,
}

impl Decision {
    /// Whether the protected call may proceed.
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Decision::Reject(_))
    }
}

/// Per-key state, locked for the whole read-modify-write of a decision.
struct Slot {
    state: Mutex<SlotState>,
}

struct SlotState {
    ring: TimestampRing,
    /// Window of the most recent policy applied to this key
    window_millis: i64,
    /// Set once the slot has been dropped from the map
    retired: bool,
}

impl SlotState {
    /// Record an attempt at `now` and report whether it is admitted.
    ///
    /// Once the ring is full every attempt takes the oldest slot, admitted or
    /// not, so the ring always holds the `rate` most recent attempts.
    fn record(&mut self, now: Millis) -> std::result::Result<bool, RingError> {
        if !self.ring.is_full() {
            self.ring.insert(now)?;
            return Ok(true);
        }

        let oldest = self.ring.peek()?;
        self.ring.replace_oldest(now)?;
        Ok(now.saturating_sub(oldest) > self.window_millis)
    }

    fn is_idle(&self, now: Millis) -> bool {
        match self.ring.newest() {
            Ok(newest) => now.saturating_sub(newest) > self.window_millis,
            Err(_) => true,
        }
    }
}

/// The core rate limiter that tracks recent calls per key.
///
/// This struct is thread-safe and is meant to be created once and shared
/// (usually behind an `Arc`). Calls for different keys never wait on each
/// other beyond the map's shard locks.
pub struct RateLimiter {
    slots: DashMap<LimiterKey, Arc<Slot>>,
}

impl RateLimiter {
    /// Create an empty rate limiter.
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Decide whether a call for `key` at `now` may proceed under `policy`.
    ///
    /// The first call for a key fixes its ring capacity to `policy.rate`.
    /// An error means a ring invariant was broken; callers must not admit
    /// the call in that case.
    pub fn decide(&self, key: &LimiterKey, policy: Policy, now: Millis) -> Result<Decision> {
        if policy.is_disabled() {
            warn!(
                key = %key,
                rate = policy.rate,
                window_secs = policy.window_secs,
                "Limiter doesn't work for operation {}",
                key.operation_path()
            );
            return Ok(Decision::Bypass);
        }

        trace!(key = %key, now = now, "Checking rate limit");

        loop {
            let slot = self.slot(key, policy);
            let mut state = slot.state.lock();
            if state.retired {
                // Purged between lookup and lock, look the key up again
                continue;
            }

            state.window_millis = policy.window_millis();
            let admitted = state.record(now)?;
            let enforced = Policy::new(capacity_rate(state.ring.capacity()), policy.window_secs);
            drop(state);

            if admitted {
                return Ok(Decision::Admit);
            }

            debug!(
                key = %key,
                rate = enforced.rate,
                requested_rate = policy.rate,
                window_secs = enforced.window_secs,
                "Rate limit exceeded"
            );
            return Ok(Decision::Reject(Rejection {
                key: key.clone(),
                policy: enforced,
            }));
        }
    }

    /// Get or atomically create the slot for a key.
    fn slot(&self, key: &LimiterKey, policy: Policy) -> Arc<Slot> {
        if let Some(slot) = self.slots.get(key) {
            return Arc::clone(slot.value());
        }

        let slot = self.slots.entry(key.clone()).or_insert_with(|| {
            debug!(
                key = %key,
                rate = policy.rate,
                window_secs = policy.window_secs,
                "Creating new timestamp ring"
            );
            Arc::new(Slot {
                state: Mutex::new(SlotState {
                    ring: TimestampRing::new(policy.rate as usize),
                    window_millis: policy.window_millis(),
                    retired: false,
                }),
            })
        });
        Arc::clone(slot.value())
    }

    /// Drop keys whose newest attempt is older than their window.
    ///
    /// A purged key behaves exactly like a key that was never seen, which is
    /// also what it would have decided with its old ring. Returns the number
    /// of keys removed.
    pub fn purge_idle(&self, now: Millis) -> usize {
        let mut purged = 0;
        self.slots.retain(|_, slot| {
            let mut state = slot.state.lock();
            if state.is_idle(now) {
                state.retired = true;
                purged += 1;
                false
            } else {
                true
            }
        });

        if purged > 0 {
            debug!(purged = purged, remaining = self.slots.len(), "Purged idle keys");
        }
        purged
    }

    /// Rate enforced for a key, fixed by the first policy it was seen with.
    ///
    /// Returns `None` if the key has not been seen.
    pub fn enforced_rate(&self, key: &LimiterKey) -> Option<u32> {
        let slot = self.slots.get(key).map(|s| Arc::clone(s.value()))?;
        let capacity = slot.state.lock().ring.capacity();
        Some(capacity_rate(capacity))
    }

    /// Number of attempts currently tracked for a key.
    ///
    /// Returns `None` if the key has not been seen.
    pub fn tracked_attempts(&self, key: &LimiterKey) -> Option<usize> {
        let slot = self.slots.get(key).map(|s| Arc::clone(s.value()))?;
        let len = slot.state.lock().ring.len();
        Some(len)
    }

    /// Forget every key.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.slots.retain(|_, slot| {
            slot.state.lock().retired = true;
            false
        });
    }

    /// Get the number of tracked keys.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn capacity_rate(capacity: usize) -> u32 {
    u32::try_from(capacity).unwrap_or(u32::MAX)
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
