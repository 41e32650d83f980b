//! Engine counters, compiled in with the `metrics` cargo feature.
//!
//! Counters are plain atomics: the engine has no outer lock on its hot
//! paths, so unlike a lock-protected metrics cell these must synchronize
//! themselves. All increments are relaxed; metrics are observational and
//! never ordered against engine state.
use std::sync::atomic::{AtomicU64, Ordering};

/// A relaxed atomic event counter.
#[repr(transparent)]
#[derive(Debug, Default)]
pub struct MetricsCounter(AtomicU64);

impl MetricsCounter {
    #[inline]
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(&self, delta: u64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }
}

/// Live counters owned by the engine.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub(crate) sweeps: MetricsCounter,
    pub(crate) candidates_published: MetricsCounter,
    pub(crate) candidates_claimed: MetricsCounter,
    pub(crate) second_chances: MetricsCounter,
    pub(crate) turn_limit_bailouts: MetricsCounter,
    pub(crate) queue_stage_rejects: MetricsCounter,
}

impl EngineMetrics {
    pub(crate) fn snapshot(&self, list_len: usize, buffer_capacity: usize) -> EngineMetricsSnapshot {
        EngineMetricsSnapshot {
            sweeps: self.sweeps.get(),
            candidates_published: self.candidates_published.get(),
            candidates_claimed: self.candidates_claimed.get(),
            second_chances: self.second_chances.get(),
            turn_limit_bailouts: self.turn_limit_bailouts.get(),
            queue_stage_rejects: self.queue_stage_rejects.get(),
            list_len,
            buffer_capacity,
        }
    }
}

/// Point-in-time copy of the engine counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct EngineMetricsSnapshot {
    /// Sweeps that actually walked the list (early-exited refills excluded).
    pub sweeps: u64,
    /// Candidates the sweeps produced in total.
    pub candidates_published: u64,
    /// Candidates handed to consumers.
    pub candidates_claimed: u64,
    /// Accessed nodes spared by a sweep visit.
    pub second_chances: u64,
    /// Sweeps that gave up after exceeding the turn limit.
    pub turn_limit_bailouts: u64,
    /// Queue-variant staging attempts rejected by a full queue.
    pub queue_stage_rejects: u64,

    // gauges captured at snapshot time
    pub list_len: usize,
    pub buffer_capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_incr_and_add() {
        let counter = MetricsCounter::new();
        assert_eq!(counter.get(), 0);
        counter.incr();
        counter.add(4);
        assert_eq!(counter.get(), 5);
    }

    #[test]
    fn snapshot_copies_counters_and_gauges() {
        let metrics = EngineMetrics::default();
        metrics.sweeps.incr();
        metrics.candidates_published.add(16);

        let snap = metrics.snapshot(84, 16);
        assert_eq!(snap.sweeps, 1);
        assert_eq!(snap.candidates_published, 16);
        assert_eq!(snap.list_len, 84);
        assert_eq!(snap.buffer_capacity, 16);
    }
}
