// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identity, lifecycle states and summaries.

use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a supervised job.
    ///
    /// Supplied by the caller or generated by an [`IdGen`](crate::IdGen);
    /// it is the only key used to look a job up.
    pub struct JobId;
}

crate::define_id! {
    /// Name of the worker behaviour a job runs.
    ///
    /// Opaque to the supervisor apart from [`JobKind::is_valid`]; the worker
    /// adapter maps it to an executable.
    pub struct JobKind;
}

impl JobKind {
    /// A kind must be a bare file name so it cannot escape the workers
    /// directory.
    pub fn is_valid(&self) -> bool {
        let name = self.as_str();
        !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\', '\0'])
            && !name.chars().any(char::is_whitespace)
    }
}

/// Lifecycle state of a job.
///
/// `Running` is the only non-terminal state; a job leaves the job table on
/// its first transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Running,
    /// Ended by `stop`, `stop_all` or shutdown
    Stopped,
    /// Worker exited with status 0
    Completed,
    /// Non-zero exit, timeout, or process error
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobState::Running)
    }

    /// Only `Running -> terminal` transitions exist.
    pub fn can_transition_to(self, next: JobState) -> bool {
        self == JobState::Running && next.is_terminal()
    }

    /// Whether this terminal state counts toward the `succeeded` counter.
    pub fn is_success(self) -> bool {
        matches!(self, JobState::Completed | JobState::Stopped)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Running => write!(f, "running"),
            JobState::Stopped => write!(f, "stopped"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// Why a job ended in [`JobState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Exceeded its timeout budget or the staleness ceiling
    Timeout,
    /// Exited unsuccessfully on its own
    WorkerFailure,
    /// OS-level failure while running or observing the process
    ProcessError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::WorkerFailure => write!(f, "worker failure"),
            FailureKind::ProcessError => write!(f, "process error"),
        }
    }
}

/// Failure kind plus a bounded, human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Point-in-time view of one running job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub kind: JobKind,
    pub started_at_ms: u64,
    pub elapsed_ms: u64,
    pub status: JobState,
    /// Most recent progress payload reported by the worker
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_progress: Option<serde_json::Value>,
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ({})",
            self.id,
            self.kind,
            self.status,
            crate::format_duration_ms(self.elapsed_ms)
        )
    }
}

/// Cut `value` down to at most `max_chars` characters.
pub fn truncate_chars(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// Keep only the last `max_chars` characters of `value`.
pub fn tail_chars(value: &str, max_chars: usize) -> &str {
    let count = value.chars().count();
    if count <= max_chars {
        return value;
    }
    match value.char_indices().nth(count - max_chars) {
        Some((idx, _)) => &value[idx..],
        None => "",
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
