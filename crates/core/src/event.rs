// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle notifications broadcast to supervisor subscribers

use crate::job::{JobFailure, JobId, JobKind, JobState};
use crate::message::WorkerStats;
use serde::{Deserialize, Serialize};

/// Events published while jobs run.
///
/// Serializes with `{"type": "job:name", ...fields}` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SupervisorEvent {
    #[serde(rename = "job:started")]
    JobStarted {
        id: JobId,
        kind: JobKind,
        started_at_ms: u64,
    },

    #[serde(rename = "job:progress")]
    Progress {
        id: JobId,
        data: serde_json::Value,
    },

    #[serde(rename = "job:stats")]
    Stats { id: JobId, stats: WorkerStats },

    /// The job left `Running`. Its process may still be terminating.
    #[serde(rename = "job:finished")]
    JobFinished {
        id: JobId,
        kind: JobKind,
        state: JobState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure: Option<JobFailure>,
    },
}

impl SupervisorEvent {
    pub fn job_id(&self) -> &JobId {
        match self {
            SupervisorEvent::JobStarted { id, .. }
            | SupervisorEvent::Progress { id, .. }
            | SupervisorEvent::Stats { id, .. }
            | SupervisorEvent::JobFinished { id, .. } => id,
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            SupervisorEvent::JobStarted { .. } => "job:started",
            SupervisorEvent::Progress { .. } => "job:progress",
            SupervisorEvent::Stats { .. } => "job:stats",
            SupervisorEvent::JobFinished { .. } => "job:finished",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
