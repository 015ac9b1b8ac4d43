// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded-concurrency job supervisor.
//!
//! The supervisor owns a table of running jobs behind a single lock. Admission,
//! process spawn and insertion happen in one critical section, so the running
//! count can never exceed the configured ceiling. Every job gets a supervision
//! task that consumes its worker's events and enforces its timeout.
//!
//! A job leaves the table exactly once. Whichever trigger removes it first
//! (exit, timeout, stop, reconcile) decides its terminal state and bumps the
//! counters; later triggers find nothing to remove.

mod reconcile;
mod supervision;

pub use reconcile::ReconcileReport;

use crate::error::SupervisorError;
use crate::outcome::{Cause, JobCompletion};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use wd_adapters::{StopSignal, WorkerAdapter, WorkerHandle, WorkerKindInfo, WorkerSpawnConfig};
use wd_core::{
    truncate_chars, Clock, IdGen, JobId, JobKind, JobState, JobSummary, SupervisorConfig,
    SupervisorEvent, SupervisorStats, SystemClock, UuidIdGen,
};

/// Buffered worker events per job
const WORKER_EVENT_BUFFER: usize = 64;

/// Buffered supervisor events per subscriber
const EVENT_BROADCAST_CAPACITY: usize = 256;

/// A request to run one job
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    /// Caller-chosen id; generated when `None`
    pub id: Option<JobId>,
    pub kind: JobKind,
    pub args: Vec<String>,
    /// Requested budget, capped at the configured maximum
    pub timeout: Option<Duration>,
    /// Extra environment for the worker
    pub env: Vec<(String, String)>,
}

impl SpawnRequest {
    pub fn new(kind: impl Into<JobKind>) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            args: Vec::new(),
            timeout: None,
            env: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<JobId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// A running job's table entry
struct JobEntry {
    /// Distinguishes this run from a later job reusing the id
    token: u64,
    kind: JobKind,
    started_at: Instant,
    started_at_ms: u64,
    handle: WorkerHandle,
    last_progress: Option<serde_json::Value>,
    /// Delivers the retirement cause to the supervision task
    retire_tx: oneshot::Sender<Cause>,
}

impl JobEntry {
    fn summary(&self, id: &JobId, now: Instant) -> JobSummary {
        JobSummary {
            id: id.clone(),
            kind: self.kind.clone(),
            started_at_ms: self.started_at_ms,
            elapsed_ms: now.saturating_duration_since(self.started_at).as_millis() as u64,
            status: JobState::Running,
            last_progress: self.last_progress.clone(),
        }
    }
}

/// A supervision task and the worker it is responsible for
struct InFlight {
    handle: WorkerHandle,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct JobTable {
    jobs: IndexMap<JobId, JobEntry>,
    /// Supervision tasks still in flight, by token. Outlives the job entry
    /// while a retired worker is being terminated.
    tasks: HashMap<u64, InFlight>,
}

/// Monotonic totals; every update saturates at `u64::MAX`
#[derive(Default)]
struct Counters {
    total_jobs: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    total_requests: AtomicU64,
    total_errors: AtomicU64,
}

impl Counters {
    fn add(counter: &AtomicU64, n: u64) {
        // The closure always returns Some, so the update cannot fail
        let _ = counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            Some(current.saturating_add(n))
        });
    }
}

struct Inner<W, C, G> {
    config: SupervisorConfig,
    adapter: W,
    clock: C,
    id_gen: G,
    table: Mutex<JobTable>,
    counters: Counters,
    events: broadcast::Sender<SupervisorEvent>,
    next_token: AtomicU64,
    shutting_down: AtomicBool,
    /// Set once the first shutdown has finished draining
    drained: watch::Sender<bool>,
    reconciler: Mutex<Option<JoinHandle<()>>>,
}

/// Bounded-concurrency supervisor for worker processes.
///
/// Cheap to clone; clones share the same job table.
pub struct Supervisor<W, C = SystemClock, G = UuidIdGen> {
    inner: Arc<Inner<W, C, G>>,
}

impl<W, C, G> Clone for Supervisor<W, C, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: WorkerAdapter> Supervisor<W> {
    /// Supervisor on the system clock with random job ids
    pub fn with_defaults(config: SupervisorConfig, adapter: W) -> Self {
        Self::new(config, adapter, SystemClock, UuidIdGen)
    }
}

impl<W, C, G> Supervisor<W, C, G>
where
    W: WorkerAdapter,
    C: Clock,
    G: IdGen,
{
    pub fn new(config: SupervisorConfig, adapter: W, clock: C, id_gen: G) -> Self {
        let (events, _) = broadcast::channel(EVENT_BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config,
                adapter,
                clock,
                id_gen,
                table: Mutex::new(JobTable::default()),
                counters: Counters::default(),
                events,
                next_token: AtomicU64::new(1),
                shutting_down: AtomicBool::new(false),
                drained: watch::channel(false).0,
                reconciler: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    pub fn adapter(&self) -> &W {
        &self.inner.adapter
    }

    /// Whether a spawn issued now would be admitted
    pub fn can_admit(&self) -> bool {
        !self.is_shutting_down()
            && self.inner.table.lock().jobs.len() < self.inner.config.concurrency_limit
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    /// Start a job and return a future for its outcome.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, request: SpawnRequest) -> Result<JobCompletion, SupervisorError> {
        if self.is_shutting_down() {
            return Err(SupervisorError::ShuttingDown);
        }
        let inner = &self.inner;
        inner.adapter.resolve(&request.kind)?;

        let id = request
            .id
            .unwrap_or_else(|| JobId::new(inner.id_gen.next()));
        let kind = request.kind;
        let args: Vec<String> = request
            .args
            .iter()
            .map(|arg| truncate_chars(arg, inner.config.max_arg_len).to_string())
            .collect();
        let timeout = inner.config.effective_timeout(request.timeout);
        let (event_tx, event_rx) = mpsc::channel(WORKER_EVENT_BUFFER);
        let (retire_tx, retire_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        let mut table = inner.table.lock();
        // Re-checked under the lock so shutdown's stop_all sees every admitted job
        if self.is_shutting_down() {
            return Err(SupervisorError::ShuttingDown);
        }
        let limit = inner.config.concurrency_limit;
        if table.jobs.len() >= limit {
            tracing::debug!(job_id = %id, %kind, limit, "admission rejected");
            return Err(SupervisorError::ResourceExhausted { limit });
        }
        if table.jobs.contains_key(id.as_str()) {
            return Err(SupervisorError::DuplicateId(id.to_string()));
        }

        let handle = inner
            .adapter
            .spawn(
                WorkerSpawnConfig {
                    job_id: id.clone(),
                    kind: kind.clone(),
                    args,
                    env: request.env,
                },
                event_tx,
            )
            .map_err(|e| SupervisorError::ProcessError(e.to_string()))?;

        let token = inner.next_token.fetch_add(1, Ordering::SeqCst);
        let started_at = inner.clock.now();
        let started_at_ms = inner.clock.epoch_ms();
        table.jobs.insert(
            id.clone(),
            JobEntry {
                token,
                kind: kind.clone(),
                started_at,
                started_at_ms,
                handle: handle.clone(),
                last_progress: None,
                retire_tx,
            },
        );
        Counters::add(&inner.counters.total_jobs, 1);
        tracing::info!(
            job_id = %id,
            %kind,
            pid = ?handle.pid,
            timeout_ms = timeout.as_millis() as u64,
            active = table.jobs.len(),
            "job started"
        );
        self.publish(SupervisorEvent::JobStarted {
            id: id.clone(),
            kind: kind.clone(),
            started_at_ms,
        });

        let task = tokio::spawn(self.clone().supervise(supervision::Supervised {
            id: id.clone(),
            kind: kind.clone(),
            token,
            handle: handle.clone(),
            started_at,
            timeout,
            events: event_rx,
            retired: retire_rx,
            done: done_tx,
        }));
        table.tasks.insert(token, InFlight { handle, task });
        drop(table);

        Ok(JobCompletion::new(id, kind, done_rx))
    }

    /// Stop a running job. Returns false if no job has this id.
    ///
    /// The job leaves the table immediately; its process is terminated in the
    /// background.
    pub fn stop(&self, id: &str) -> bool {
        let mut table = self.inner.table.lock();
        let stopped = self.retire_locked(&mut table, id, None, Cause::Stopped);
        if stopped {
            tracing::info!(job_id = %id, "job stopped");
        }
        stopped
    }

    /// Stop every running job, returning how many were stopped
    pub fn stop_all(&self) -> usize {
        let mut table = self.inner.table.lock();
        let ids: Vec<JobId> = table.jobs.keys().cloned().collect();
        let stopped = ids
            .iter()
            .filter(|id| self.retire_locked(&mut table, id.as_str(), None, Cause::Stopped))
            .count();
        if stopped > 0 {
            tracing::info!(stopped, "stopped all jobs");
        }
        stopped
    }

    /// Running jobs in the order they were started
    pub fn list_active(&self) -> Vec<JobSummary> {
        let now = self.inner.clock.now();
        let table = self.inner.table.lock();
        table
            .jobs
            .iter()
            .map(|(id, entry)| entry.summary(id, now))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<JobSummary> {
        let now = self.inner.clock.now();
        let table = self.inner.table.lock();
        table
            .jobs
            .get_key_value(id)
            .map(|(id, entry)| entry.summary(id, now))
    }

    /// Worker kinds the adapter can currently start
    pub fn kinds(&self) -> Vec<WorkerKindInfo> {
        self.inner.adapter.kinds()
    }

    pub fn stats(&self) -> SupervisorStats {
        let counters = &self.inner.counters;
        let active = self.inner.table.lock().jobs.len();
        let limit = self.inner.config.concurrency_limit;
        SupervisorStats {
            total_jobs: counters.total_jobs.load(Ordering::SeqCst),
            succeeded: counters.succeeded.load(Ordering::SeqCst),
            failed: counters.failed.load(Ordering::SeqCst),
            total_requests: counters.total_requests.load(Ordering::SeqCst),
            total_errors: counters.total_errors.load(Ordering::SeqCst),
            active,
            limit,
            available: limit.saturating_sub(active),
        }
    }

    /// Lifecycle, progress and stats events for every job
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.inner.events.subscribe()
    }

    /// Stop everything and wait (bounded) for workers to be terminated.
    ///
    /// Workers still running when `shutdown_timeout` expires are sent
    /// SIGKILL directly. Concurrent and later calls wait for the first call
    /// to finish draining.
    pub async fn shutdown(&self) {
        if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            let mut drained = self.inner.drained.subscribe();
            let _ = drained.wait_for(|done| *done).await;
            return;
        }
        let stopped = self.stop_all();
        if let Some(reconciler) = self.inner.reconciler.lock().take() {
            reconciler.abort();
        }

        let in_flight: Vec<InFlight> = {
            let mut table = self.inner.table.lock();
            table.tasks.drain().map(|(_, in_flight)| in_flight).collect()
        };
        let pending = in_flight.len();
        let (handles, tasks): (Vec<WorkerHandle>, Vec<JoinHandle<()>>) = in_flight
            .into_iter()
            .map(|in_flight| (in_flight.handle, in_flight.task))
            .unzip();
        let aborts: Vec<_> = tasks.iter().map(|task| task.abort_handle()).collect();
        let drain = async move {
            for task in tasks {
                let _ = task.await;
            }
        };

        let limit = self.inner.config.shutdown_timeout;
        match tokio::time::timeout(limit, drain).await {
            Ok(()) => tracing::info!(stopped, pending, "supervisor shut down"),
            Err(_) => {
                for abort in aborts {
                    abort.abort();
                }
                let survivors: Vec<&WorkerHandle> =
                    handles.iter().filter(|handle| !handle.has_exited()).collect();
                tracing::warn!(
                    stopped,
                    survivors = survivors.len(),
                    timeout_ms = limit.as_millis() as u64,
                    "shutdown timed out, killing remaining workers"
                );
                for handle in survivors {
                    if let Err(e) = self.inner.adapter.signal(handle, StopSignal::Kill).await {
                        tracing::error!(job_id = %handle.job_id, error = %e, "failed to kill worker");
                    }
                }
            }
        }
        self.inner.drained.send_replace(true);
    }

    /// Remove a job from the table, deciding its terminal state.
    ///
    /// With a token, only that run of the job is removed. Returns false when
    /// there was nothing to remove.
    fn retire(&self, id: &str, token: Option<u64>, cause: Cause) -> bool {
        let mut table = self.inner.table.lock();
        self.retire_locked(&mut table, id, token, cause)
    }

    fn retire_locked(
        &self,
        table: &mut JobTable,
        id: &str,
        token: Option<u64>,
        cause: Cause,
    ) -> bool {
        match table.jobs.get(id) {
            Some(entry) if token.map_or(true, |t| t == entry.token) => {}
            _ => return false,
        }
        let Some((id, entry)) = table.jobs.shift_remove_entry(id) else {
            return false;
        };

        let (state, failure) = cause.verdict();
        let counters = &self.inner.counters;
        if state.is_success() {
            Counters::add(&counters.succeeded, 1);
        } else {
            Counters::add(&counters.failed, 1);
        }
        match &failure {
            Some(failure) => tracing::warn!(job_id = %id, kind = %entry.kind, %state, %failure, "job finished"),
            None => tracing::info!(job_id = %id, kind = %entry.kind, %state, "job finished"),
        }
        self.publish(SupervisorEvent::JobFinished {
            id,
            kind: entry.kind,
            state,
            failure,
        });
        // Receiver is gone only if the supervision task was aborted
        let _ = entry.retire_tx.send(cause);
        true
    }

    fn publish(&self, event: SupervisorEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }
}

#[cfg(test)]
#[path = "../supervisor_tests/mod.rs"]
mod tests;
