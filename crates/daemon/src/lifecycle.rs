// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup and shutdown.

use std::fs::File;
use std::path::PathBuf;
use std::time::Instant;

use fs2::FileExt;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wd_adapters::{ProcessWorkerAdapter, TracedWorkers};
use wd_core::{
    format_duration_ms, ConfigError, SupervisorConfig, SupervisorEvent, WorkerConfig,
};
use wd_engine::Supervisor;

use crate::env::state_dir;

/// Supervisor with concrete adapter types (wrapped with tracing)
pub type DaemonSupervisor = Supervisor<TracedWorkers<ProcessWorkerAdapter>>;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/warden)
    pub state_dir: PathBuf,
    /// Path to the control socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    pub supervisor: SupervisorConfig,
    pub workers: WorkerConfig,
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self, LifecycleError> {
        Ok(Self::in_dir(
            state_dir()?,
            SupervisorConfig::from_env()?,
            WorkerConfig::from_env()?,
        ))
    }

    /// Configuration rooted at an explicit state directory
    pub fn in_dir(state_dir: PathBuf, supervisor: SupervisorConfig, workers: WorkerConfig) -> Self {
        Self {
            socket_path: state_dir.join("wardend.sock"),
            lock_path: state_dir.join("wardend.pid"),
            log_path: state_dir.join("wardend.log"),
            state_dir,
            supervisor,
            workers,
        }
    }
}

/// Daemon state during operation.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub supervisor: DaemonSupervisor,
    /// When daemon started
    pub start_time: Instant,
}

/// Result of daemon startup
pub struct StartupResult {
    pub daemon: DaemonState,
    /// The control socket to spawn as a Listener task
    pub listener: UnixListener,
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: wardend already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, #[source] std::io::Error),

    #[error("Workers directory not found: {0}")]
    WorkersDirMissing(PathBuf),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaemonState {
    /// Stop all jobs, wait for their workers, and remove runtime files.
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        self.supervisor.shutdown().await;
        let stats = self.supervisor.stats();
        info!(
            total_jobs = stats.total_jobs,
            succeeded = stats.succeeded,
            failed = stats.failed,
            total_requests = stats.total_requests,
            total_errors = stats.total_errors,
            uptime = %format_duration_ms(self.start_time.elapsed().as_millis() as u64),
            "final statistics"
        );

        // 1. Remove socket file (listener task stops when tokio runtime exits)
        if self.config.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }

        // 2. Remove PID file
        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // 3. Lock file is released automatically when self.lock_file is dropped
        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Files belong to the running daemon when the lock is held elsewhere
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    // 1. Create state directory
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST - prevents races
    // Open without truncating so a running daemon's PID survives a failed attempt
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    use std::io::Write;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Workers directory must exist before anything can be admitted
    if !config.workers.workers_dir.is_dir() {
        return Err(LifecycleError::WorkersDirMissing(
            config.workers.workers_dir.clone(),
        ));
    }

    // 4. Bind the control socket, replacing a stale one
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    // 5. Supervisor and background reconcile
    let adapter = TracedWorkers::new(ProcessWorkerAdapter::new(config.workers.clone()));
    let supervisor = Supervisor::with_defaults(config.supervisor.clone(), adapter);
    let kinds: Vec<String> = supervisor
        .kinds()
        .into_iter()
        .map(|info| info.kind.to_string())
        .collect();
    info!(
        workers_dir = %config.workers.workers_dir.display(),
        ?kinds,
        concurrency_limit = config.supervisor.concurrency_limit,
        "supervisor ready"
    );
    supervisor.start_reconciler();

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            supervisor,
            start_time: Instant::now(),
        },
        listener,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

/// Log supervisor events until the channel closes
pub fn spawn_event_logger(mut events: broadcast::Receiver<SupervisorEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &SupervisorEvent) {
    match event {
        SupervisorEvent::Progress { id, data } => {
            debug!(job_id = %id, %data, "progress");
        }
        SupervisorEvent::Stats { id, stats } => {
            debug!(
                job_id = %id,
                total_requests = stats.total_requests,
                total_errors = stats.total_errors,
                "worker stats"
            );
        }
        SupervisorEvent::JobStarted { .. } | SupervisorEvent::JobFinished { .. } => {
            debug!(event = event.name(), job_id = %event.job_id());
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
