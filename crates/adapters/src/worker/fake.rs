// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake worker adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{
    StopSignal, WorkerAdapter, WorkerCommand, WorkerError, WorkerEvent, WorkerExit,
    WorkerHandle, WorkerKindInfo, WorkerSpawnConfig,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use wd_core::{JobKind, WorkerMessage};

/// Recorded adapter call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerCall {
    Spawn {
        job_id: String,
        kind: String,
        args: Vec<String>,
    },
    Signal {
        job_id: String,
        signal: StopSignal,
    },
    IsAlive {
        job_id: String,
    },
}

struct FakeWorker {
    handle: WorkerHandle,
    event_tx: Option<mpsc::Sender<WorkerEvent>>,
    alive: bool,
}

struct FakeWorkerState {
    kinds: BTreeSet<String>,
    workers: HashMap<String, FakeWorker>,
    calls: Vec<WorkerCall>,
    next_pid: u32,
    spawn_error: Option<String>,
    ignore_terminate: bool,
    liveness_error: bool,
}

/// Fake worker adapter for testing.
///
/// Workers never exit on their own; tests drive them with [`exit`],
/// [`send_message`] and friends. `Terminate` and `Kill` end a worker with
/// signal 15 or 9 unless SIGTERM is set to be ignored.
///
/// [`exit`]: FakeWorkerAdapter::exit
/// [`send_message`]: FakeWorkerAdapter::send_message
#[derive(Clone)]
pub struct FakeWorkerAdapter {
    inner: Arc<Mutex<FakeWorkerState>>,
}

impl Default for FakeWorkerAdapter {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeWorkerState {
                kinds: BTreeSet::new(),
                workers: HashMap::new(),
                calls: Vec::new(),
                next_pid: 1000,
                spawn_error: None,
                ignore_terminate: false,
                liveness_error: false,
            })),
        }
    }
}

impl FakeWorkerAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter that resolves exactly these kinds
    pub fn with_kinds(kinds: &[&str]) -> Self {
        let adapter = Self::default();
        for kind in kinds {
            adapter.add_kind(kind);
        }
        adapter
    }

    pub fn add_kind(&self, kind: &str) {
        self.inner.lock().kinds.insert(kind.to_string());
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<WorkerCall> {
        self.inner.lock().calls.clone()
    }

    /// Signals delivered to one job, in order
    pub fn signals_for(&self, job_id: &str) -> Vec<StopSignal> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                WorkerCall::Signal { job_id: id, signal } if id == job_id => Some(*signal),
                _ => None,
            })
            .collect()
    }

    /// Number of workers spawned so far
    pub fn spawn_count(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, WorkerCall::Spawn { .. }))
            .count()
    }

    /// Arguments a job's worker was started with
    pub fn spawned_args(&self, job_id: &str) -> Option<Vec<String>> {
        self.inner.lock().calls.iter().find_map(|call| match call {
            WorkerCall::Spawn { job_id: id, args, .. } if id == job_id => Some(args.clone()),
            _ => None,
        })
    }

    pub fn is_running(&self, job_id: &str) -> bool {
        self.inner
            .lock()
            .workers
            .get(job_id)
            .map(|w| w.alive)
            .unwrap_or(false)
    }

    /// Make the next spawns fail with this message (`None` to clear)
    pub fn set_spawn_error(&self, message: Option<&str>) {
        self.inner.lock().spawn_error = message.map(str::to_string);
    }

    /// Workers keep running after `Terminate`, needing `Kill`
    pub fn set_ignore_terminate(&self, ignore: bool) {
        self.inner.lock().ignore_terminate = ignore;
    }

    /// Make `is_alive` fail
    pub fn set_liveness_error(&self, fail: bool) {
        self.inner.lock().liveness_error = fail;
    }

    /// Forward a side-channel message from a running worker
    pub async fn send_message(&self, job_id: &str, message: WorkerMessage) {
        let tx = self.sender(job_id);
        if let Some(tx) = tx {
            let _ = tx.send(WorkerEvent::Message(message)).await;
        }
    }

    /// Exit a running worker with a status code
    pub async fn exit(&self, job_id: &str, code: i32) {
        self.finish(job_id, WorkerExit::code(code)).await;
    }

    /// Exit a running worker with a full report
    pub async fn finish(&self, job_id: &str, exit: WorkerExit) {
        let tx = self.mark_dead(job_id);
        if let Some(tx) = tx {
            let _ = tx.send(WorkerEvent::Exited(exit)).await;
        }
    }

    /// The process disappears without its exit ever being reported
    pub fn vanish(&self, job_id: &str) {
        let mut inner = self.inner.lock();
        if let Some(worker) = inner.workers.get_mut(job_id) {
            worker.alive = false;
            worker.handle.mark_exited();
        }
    }

    /// Close the event channel while the process keeps running
    pub fn drop_channel(&self, job_id: &str) {
        if let Some(worker) = self.inner.lock().workers.get_mut(job_id) {
            worker.event_tx = None;
        }
    }

    fn sender(&self, job_id: &str) -> Option<mpsc::Sender<WorkerEvent>> {
        let inner = self.inner.lock();
        let worker = inner.workers.get(job_id)?;
        if !worker.alive {
            return None;
        }
        worker.event_tx.clone()
    }

    /// Mark a worker exited, returning its sender if it was still running
    fn mark_dead(&self, job_id: &str) -> Option<mpsc::Sender<WorkerEvent>> {
        let mut inner = self.inner.lock();
        let worker = inner.workers.get_mut(job_id)?;
        if !worker.alive {
            return None;
        }
        worker.alive = false;
        worker.handle.mark_exited();
        worker.event_tx.take()
    }
}

#[async_trait]
impl WorkerAdapter for FakeWorkerAdapter {
    fn resolve(&self, kind: &JobKind) -> Result<WorkerCommand, WorkerError> {
        if !kind.is_valid() || !self.inner.lock().kinds.contains(kind.as_str()) {
            return Err(WorkerError::NotFound(kind.to_string()));
        }
        Ok(WorkerCommand {
            program: PathBuf::from("/fake/workers").join(kind.as_str()),
            leading_args: Vec::new(),
        })
    }

    fn kinds(&self) -> Vec<WorkerKindInfo> {
        self.inner
            .lock()
            .kinds
            .iter()
            .map(|kind| WorkerKindInfo {
                kind: JobKind::new(kind.as_str()),
                path: PathBuf::from("/fake/workers").join(kind),
            })
            .collect()
    }

    fn spawn(
        &self,
        config: WorkerSpawnConfig,
        event_tx: mpsc::Sender<WorkerEvent>,
    ) -> Result<WorkerHandle, WorkerError> {
        self.resolve(&config.kind)?;
        let mut inner = self.inner.lock();

        inner.calls.push(WorkerCall::Spawn {
            job_id: config.job_id.to_string(),
            kind: config.kind.to_string(),
            args: config.args.clone(),
        });

        if let Some(message) = inner.spawn_error.clone() {
            return Err(WorkerError::SpawnFailed {
                kind: config.kind.to_string(),
                message,
            });
        }

        inner.next_pid += 1;
        let handle = WorkerHandle::new(config.job_id.clone(), Some(inner.next_pid));
        inner.workers.insert(
            config.job_id.to_string(),
            FakeWorker {
                handle: handle.clone(),
                event_tx: Some(event_tx),
                alive: true,
            },
        );
        Ok(handle)
    }

    async fn signal(&self, handle: &WorkerHandle, signal: StopSignal) -> Result<(), WorkerError> {
        let job_id = handle.job_id.to_string();
        let stops = {
            let mut inner = self.inner.lock();
            inner.calls.push(WorkerCall::Signal {
                job_id: job_id.clone(),
                signal,
            });
            signal == StopSignal::Kill || !inner.ignore_terminate
        };
        if stops {
            let code = match signal {
                StopSignal::Terminate => 15,
                StopSignal::Kill => 9,
            };
            self.finish(&job_id, WorkerExit::signaled(code)).await;
        }
        Ok(())
    }

    async fn is_alive(&self, handle: &WorkerHandle) -> Result<bool, WorkerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(WorkerCall::IsAlive {
            job_id: handle.job_id.to_string(),
        });
        if inner.liveness_error {
            return Err(WorkerError::Io(std::io::Error::other("liveness check failed")));
        }
        Ok(inner
            .workers
            .get(handle.job_id.as_str())
            .map(|w| w.alive)
            .unwrap_or(false))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
