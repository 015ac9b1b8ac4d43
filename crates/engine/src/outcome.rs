// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job outcomes and the future that delivers them

use crate::error::SupervisorError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use wd_adapters::WorkerExit;
use wd_core::{format_duration_ms, FailureKind, JobFailure, JobId, JobKind, JobState};

/// Why a job left `Running`.
///
/// Decided once, by whichever trigger removes the job from the table first.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cause {
    /// The worker exited on its own
    Exited(WorkerExit),
    /// The job's timeout budget ran out
    TimedOut(Duration),
    /// `stop`, `stop_all` or shutdown
    Stopped,
    /// Reconcile found the job older than the staleness ceiling
    Stale(Duration),
    /// Reconcile found the process gone without an exit report
    Vanished,
    /// The worker's event channel closed without an exit report
    Lost,
}

impl Cause {
    /// Terminal state and failure detail for this cause
    pub(crate) fn verdict(&self) -> (JobState, Option<JobFailure>) {
        match self {
            Cause::Exited(exit) if exit.success() => (JobState::Completed, None),
            Cause::Exited(exit) => {
                let stderr = exit.stderr.trim();
                let message = if stderr.is_empty() {
                    exit.describe()
                } else {
                    format!("{}: {}", exit.describe(), stderr)
                };
                failed(FailureKind::WorkerFailure, message)
            }
            Cause::TimedOut(budget) => failed(
                FailureKind::Timeout,
                format!("exceeded {} timeout", format_budget(*budget)),
            ),
            Cause::Stopped => (JobState::Stopped, None),
            Cause::Stale(age) => failed(
                FailureKind::Timeout,
                format!(
                    "exceeded staleness ceiling (running for {})",
                    format_duration_ms(age.as_millis() as u64)
                ),
            ),
            Cause::Vanished => failed(
                FailureKind::ProcessError,
                "process exited without notification",
            ),
            Cause::Lost => failed(
                FailureKind::ProcessError,
                "worker channel closed without an exit report",
            ),
        }
    }

    /// Whether the process may still be running and must be signalled
    pub(crate) fn needs_termination(&self) -> bool {
        matches!(
            self,
            Cause::TimedOut(_) | Cause::Stopped | Cause::Stale(_) | Cause::Lost
        )
    }
}

fn failed(kind: FailureKind, message: impl Into<String>) -> (JobState, Option<JobFailure>) {
    (JobState::Failed, Some(JobFailure::new(kind, message)))
}

fn format_budget(budget: Duration) -> String {
    if budget < Duration::from_secs(1) {
        format!("{}ms", budget.as_millis())
    } else {
        format_duration_ms(budget.as_millis() as u64)
    }
}

/// How a job ended
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub id: JobId,
    pub kind: JobKind,
    pub state: JobState,
    pub failure: Option<JobFailure>,
    /// How the process ended, when its exit was observed
    pub exit: Option<WorkerExit>,
    pub elapsed: Duration,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    /// `Ok` for completed or stopped jobs, the matching error otherwise.
    pub fn into_result(self) -> Result<JobOutcome, SupervisorError> {
        let Some(failure) = &self.failure else {
            return Ok(self);
        };
        let message = format!("job {}: {}", self.id, failure.message);
        Err(match failure.kind {
            FailureKind::Timeout => SupervisorError::Timeout(message),
            FailureKind::WorkerFailure => SupervisorError::WorkerFailure(message),
            FailureKind::ProcessError => SupervisorError::ProcessError(message),
        })
    }
}

/// Resolves to the job's [`JobOutcome`] once it has been supervised to the end.
///
/// Dropping it does not affect the job.
#[derive(Debug)]
pub struct JobCompletion {
    id: JobId,
    kind: JobKind,
    rx: oneshot::Receiver<JobOutcome>,
}

impl JobCompletion {
    pub(crate) fn new(id: JobId, kind: JobKind, rx: oneshot::Receiver<JobOutcome>) -> Self {
        Self { id, kind, rx }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn kind(&self) -> &JobKind {
        &self.kind
    }
}

impl Future for JobCompletion {
    type Output = JobOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // Supervision task was aborted (shutdown timeout)
            Poll::Ready(Err(_)) => Poll::Ready(JobOutcome {
                id: this.id.clone(),
                kind: this.kind.clone(),
                state: JobState::Failed,
                failure: Some(JobFailure::new(
                    FailureKind::ProcessError,
                    "supervision ended before the job resolved",
                )),
                exit: None,
                elapsed: Duration::ZERO,
            }),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
#[path = "outcome_tests.rs"]
mod tests;
