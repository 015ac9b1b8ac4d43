// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker process adapters
//!
//! A worker adapter is the only place that touches operating system
//! processes. It resolves a [`JobKind`] to something runnable, starts it,
//! forwards side-channel messages and the final exit report over an mpsc
//! channel, and delivers stop signals.

pub mod capture;
mod process;

pub use process::ProcessWorkerAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeWorkerAdapter, WorkerCall};

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use wd_core::{JobId, JobKind, WorkerMessage};

/// Errors from worker operations
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("no worker for kind: {0}")]
    NotFound(String),
    #[error("failed to spawn {kind}: {message}")]
    SpawnFailed { kind: String, message: String },
    #[error("failed to signal {job_id}: {message}")]
    SignalFailed { job_id: String, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// How to launch a resolved worker kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    /// Arguments placed before the job's own arguments (e.g. the script path)
    pub leading_args: Vec<String>,
}

/// A worker kind that can currently be resolved
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WorkerKindInfo {
    pub kind: JobKind,
    pub path: PathBuf,
}

/// Everything needed to start one job's worker
#[derive(Debug, Clone)]
pub struct WorkerSpawnConfig {
    pub job_id: JobId,
    pub kind: JobKind,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Two-phase termination signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Ask the worker to exit (SIGTERM)
    Terminate,
    /// Force the worker down (SIGKILL)
    Kill,
}

/// Final report for a worker process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
    /// Captured ordinary stdout (bounded)
    pub stdout: String,
    /// Older stdout was dropped to stay within the capture limit
    pub stdout_truncated: bool,
    /// Captured stderr tail (bounded)
    pub stderr: String,
    /// Set when the exit status itself could not be collected
    pub error: Option<String>,
}

impl WorkerExit {
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    pub fn signaled(signal: i32) -> Self {
        Self {
            signal: Some(signal),
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0) && self.error.is_none()
    }

    /// Short description of how the process ended.
    pub fn describe(&self) -> String {
        match (&self.error, self.code, self.signal) {
            (Some(err), _, _) => format!("wait failed: {}", err),
            (None, Some(code), _) => format!("exited with code {}", code),
            (None, None, Some(signal)) => format!("killed by signal {}", signal),
            (None, None, None) => "exited with unknown status".to_string(),
        }
    }
}

/// Events a running worker produces, in order. `Exited` is always last.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Message(WorkerMessage),
    Exited(WorkerExit),
}

/// Reference to a spawned worker process.
///
/// Cheap to clone. The adapter marks it exited once the process has been
/// reaped, after which signals become no-ops.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    pub job_id: JobId,
    pub pid: Option<u32>,
    exited: Arc<AtomicBool>,
}

impl WorkerHandle {
    pub fn new(job_id: JobId, pid: Option<u32>) -> Self {
        Self {
            job_id,
            pid,
            exited: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    pub fn mark_exited(&self) {
        self.exited.store(true, Ordering::SeqCst);
    }
}

/// Adapter for starting and controlling worker processes
#[async_trait]
pub trait WorkerAdapter: Clone + Send + Sync + 'static {
    /// Map a kind to a launch command, or `NotFound`
    fn resolve(&self, kind: &JobKind) -> Result<WorkerCommand, WorkerError>;

    /// List the kinds that currently resolve
    fn kinds(&self) -> Vec<WorkerKindInfo>;

    /// Start a worker.
    ///
    /// Synchronous so the supervisor can call it while holding its admission
    /// lock. Must be called from within a tokio runtime; output is pumped by
    /// background tasks that report through `event_tx`.
    fn spawn(
        &self,
        config: WorkerSpawnConfig,
        event_tx: mpsc::Sender<WorkerEvent>,
    ) -> Result<WorkerHandle, WorkerError>;

    /// Deliver a stop signal. Signalling an exited worker succeeds.
    async fn signal(&self, handle: &WorkerHandle, signal: StopSignal) -> Result<(), WorkerError>;

    /// Whether the process is still running
    async fn is_alive(&self, handle: &WorkerHandle) -> Result<bool, WorkerError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
