// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job supervision task

use super::{Counters, Supervisor};
use crate::outcome::{Cause, JobOutcome};
use crate::termination::Termination;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use wd_adapters::{WorkerAdapter, WorkerEvent, WorkerExit, WorkerHandle};
use wd_core::{Clock, IdGen, JobId, JobKind, SupervisorEvent, WorkerMessage};

/// Everything a supervision task owns for one job
pub(super) struct Supervised {
    pub id: JobId,
    pub kind: JobKind,
    pub token: u64,
    pub handle: WorkerHandle,
    pub started_at: Instant,
    pub timeout: Duration,
    pub events: mpsc::Receiver<WorkerEvent>,
    pub retired: oneshot::Receiver<Cause>,
    pub done: oneshot::Sender<JobOutcome>,
}

impl<W, C, G> Supervisor<W, C, G>
where
    W: WorkerAdapter,
    C: Clock,
    G: IdGen,
{
    /// Drive one job from spawn to outcome.
    ///
    /// Whatever fires first (exit, timeout, external retirement) tries to
    /// retire the job; the cause that actually won always arrives on
    /// `retired`, so the outcome matches what the counters recorded.
    pub(super) async fn supervise(self, job: Supervised) {
        let Supervised {
            id,
            kind,
            token,
            handle,
            started_at,
            timeout,
            mut events,
            mut retired,
            done,
        } = job;

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut exit: Option<WorkerExit> = None;
        let cause = loop {
            tokio::select! {
                cause = &mut retired => break cause.unwrap_or(Cause::Lost),
                event = events.recv() => match event {
                    Some(WorkerEvent::Message(message)) => self.on_message(&id, token, message),
                    Some(WorkerEvent::Exited(report)) => {
                        exit = Some(report.clone());
                        self.retire(id.as_str(), Some(token), Cause::Exited(report));
                        break (&mut retired).await.unwrap_or(Cause::Lost);
                    }
                    None => {
                        self.retire(id.as_str(), Some(token), Cause::Lost);
                        break (&mut retired).await.unwrap_or(Cause::Lost);
                    }
                },
                _ = &mut deadline => {
                    tracing::warn!(job_id = %id, timeout_ms = timeout.as_millis() as u64, "job timed out");
                    self.retire(id.as_str(), Some(token), Cause::TimedOut(timeout));
                    break (&mut retired).await.unwrap_or(Cause::Lost);
                }
            }
        };

        if exit.is_none() && cause.needs_termination() {
            exit = self.terminate(&handle, &mut events).await;
        }

        let (state, failure) = cause.verdict();
        let elapsed = self
            .inner
            .clock
            .now()
            .saturating_duration_since(started_at);
        tracing::debug!(job_id = %id, %state, exit = ?exit.as_ref().map(WorkerExit::describe), "job resolved");
        let _ = done.send(JobOutcome {
            id,
            kind,
            state,
            failure,
            exit,
            elapsed,
        });

        self.inner.table.lock().tasks.remove(&token);
    }

    /// Apply a side-channel message if the job is still running
    fn on_message(&self, id: &JobId, token: u64, message: WorkerMessage) {
        let mut table = self.inner.table.lock();
        let Some(entry) = table
            .jobs
            .get_mut(id.as_str())
            .filter(|entry| entry.token == token)
        else {
            return;
        };
        match message {
            WorkerMessage::Progress(data) => {
                entry.last_progress = Some(data.clone());
                self.publish(SupervisorEvent::Progress {
                    id: id.clone(),
                    data,
                });
            }
            WorkerMessage::Stats(stats) => {
                let counters = &self.inner.counters;
                Counters::add(&counters.total_requests, stats.total_requests);
                Counters::add(&counters.total_errors, stats.total_errors);
                self.publish(SupervisorEvent::Stats {
                    id: id.clone(),
                    stats,
                });
            }
        }
    }

    /// SIGTERM, then SIGKILL after the grace window. Returns the exit report
    /// if one arrived.
    async fn terminate(
        &self,
        handle: &WorkerHandle,
        events: &mut mpsc::Receiver<WorkerEvent>,
    ) -> Option<WorkerExit> {
        let mut termination = Termination::new(self.inner.config.kill_grace);
        let mut channel_open = true;

        while let Some(signal) = termination.next_signal(tokio::time::Instant::now()) {
            if let Err(e) = self.inner.adapter.signal(handle, signal).await {
                tracing::warn!(job_id = %handle.job_id, ?signal, error = %e, "failed to signal worker");
            }
            let Some(deadline) = termination.deadline() else {
                break;
            };

            loop {
                if !channel_open {
                    if termination.is_final() {
                        return None;
                    }
                    tokio::time::sleep_until(deadline).await;
                    break;
                }
                tokio::select! {
                    event = events.recv() => match event {
                        Some(WorkerEvent::Exited(report)) => {
                            termination.observe_exit();
                            return Some(report);
                        }
                        // Late messages are drained and ignored
                        Some(WorkerEvent::Message(_)) => {}
                        None => channel_open = false,
                    },
                    _ = tokio::time::sleep_until(deadline) => break,
                }
            }
        }

        tracing::error!(
            job_id = %handle.job_id,
            pid = ?handle.pid,
            phase = ?termination.phase(),
            "worker did not report exit after SIGKILL"
        );
        None
    }
}
