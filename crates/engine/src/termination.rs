// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-phase worker termination.
//!
//! A stop first asks the worker to exit with SIGTERM. If no exit has been
//! observed once the grace window closes, SIGKILL follows. The same window
//! then bounds the wait for the final exit report.

use std::time::Duration;
use tokio::time::Instant;
use wd_adapters::StopSignal;

/// Where a termination stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationPhase {
    Requested,
    GracefulRequested,
    ForceKilled,
    Exited,
}

/// Termination state machine for one job
#[derive(Debug, Clone)]
pub struct Termination {
    phase: TerminationPhase,
    grace: Duration,
    deadline: Option<Instant>,
}

impl Termination {
    pub fn new(grace: Duration) -> Self {
        Self {
            phase: TerminationPhase::Requested,
            grace,
            deadline: None,
        }
    }

    pub fn phase(&self) -> TerminationPhase {
        self.phase
    }

    /// When the current phase gives up waiting for an exit
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The signal due at `now`, if any, advancing the phase.
    pub fn next_signal(&mut self, now: Instant) -> Option<StopSignal> {
        match self.phase {
            TerminationPhase::Requested => {
                self.phase = TerminationPhase::GracefulRequested;
                self.deadline = Some(now + self.grace);
                Some(StopSignal::Terminate)
            }
            TerminationPhase::GracefulRequested
                if self.deadline.map_or(true, |deadline| now >= deadline) =>
            {
                self.phase = TerminationPhase::ForceKilled;
                self.deadline = Some(now + self.grace);
                Some(StopSignal::Kill)
            }
            _ => None,
        }
    }

    pub fn observe_exit(&mut self) {
        self.phase = TerminationPhase::Exited;
        self.deadline = None;
    }

    /// No further signal will be sent
    pub fn is_final(&self) -> bool {
        matches!(
            self.phase,
            TerminationPhase::ForceKilled | TerminationPhase::Exited
        )
    }
}

#[cfg(test)]
#[path = "termination_tests.rs"]
mod tests;
