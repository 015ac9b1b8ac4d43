// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Aggregate supervisor statistics.

use serde::{Deserialize, Serialize};

/// Snapshot of the supervisor counters.
///
/// Everything except `active` and `available` is monotonic over the
/// supervisor's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupervisorStats {
    pub total_jobs: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub total_requests: u64,
    pub total_errors: u64,
    /// Jobs currently running
    pub active: usize,
    /// Concurrency ceiling
    pub limit: usize,
    /// Free admission slots
    pub available: usize,
}

impl SupervisorStats {
    /// Percentage of started jobs that ended successfully.
    pub fn success_rate(&self) -> f64 {
        percent(self.succeeded, self.total_jobs)
    }

    /// Percentage of started jobs that failed.
    pub fn failure_rate(&self) -> f64 {
        percent(self.failed, self.total_jobs)
    }

    /// Jobs that have started but not yet been counted as finished.
    pub fn unfinished(&self) -> u64 {
        self.total_jobs.saturating_sub(self.succeeded + self.failed)
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
