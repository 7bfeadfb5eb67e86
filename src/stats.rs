//! Thread-safe outcome counters and derived throughput statistics.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::job::Outcome;

#[derive(Debug)]
struct Stats {
    success_count: u64,
    fail_count: u64,
    total_processed: u64,
    start_time: Instant,
}

/// Owns the session's counters. Every update goes through one lock so that
/// `success + fail == total` holds for any observer.
#[derive(Debug)]
pub struct StatsAggregator {
    stats: Mutex<Stats>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub success_count: u64,
    pub fail_count: u64,
    pub total_processed: u64,
    pub elapsed_secs: f64,
    /// Jobs per second.
    pub rate: f64,
    /// Jobs per minute.
    pub throughput: f64,
    /// Percentage of processed jobs that succeeded.
    pub success_rate: f64,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            stats: Mutex::new(Stats {
                success_count: 0,
                fail_count: 0,
                total_processed: 0,
                start_time: Instant::now(),
            }),
        }
    }

    // A panicking worker never leaves the counters half-updated, so a
    // poisoned lock is still safe to read.
    fn lock(&self) -> MutexGuard<'_, Stats> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, outcome: &Outcome) {
        let mut stats = self.lock();
        match outcome {
            Outcome::Success => stats.success_count += 1,
            Outcome::Failure(_) => stats.fail_count += 1,
        }
        stats.total_processed += 1;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let stats = self.lock();
        StatsSnapshot::from_counts(
            stats.success_count,
            stats.fail_count,
            stats.start_time.elapsed(),
        )
    }
}

impl StatsSnapshot {
    /// Derives rates from raw counts. Zero elapsed time yields zero rates.
    pub fn from_counts(success_count: u64, fail_count: u64, elapsed: Duration) -> Self {
        let total_processed = success_count + fail_count;
        let elapsed_secs = elapsed.as_secs_f64();
        let rate = if elapsed_secs > 0.0 {
            total_processed as f64 / elapsed_secs
        } else {
            0.0
        };
        let success_rate = if total_processed > 0 {
            success_count as f64 / total_processed as f64 * 100.0
        } else {
            0.0
        };
        Self {
            success_count,
            fail_count,
            total_processed,
            elapsed_secs,
            rate,
            throughput: rate * 60.0,
            success_rate,
        }
    }
}
