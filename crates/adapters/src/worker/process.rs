// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker adapter backed by real child processes

use super::capture::TailBuffer;
use super::{
    StopSignal, WorkerAdapter, WorkerCommand, WorkerError, WorkerEvent, WorkerExit,
    WorkerHandle, WorkerKindInfo, WorkerSpawnConfig,
};
use async_trait::async_trait;
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use wd_core::{JobKind, WorkerConfig, WorkerMessage};

/// Longest stdout line considered for message decoding; longer lines are
/// captured as plain output in pieces.
const MAX_LINE_BYTES: u64 = 64 * 1024;

/// How long to keep reading pipes after the process exits. Grandchildren
/// that inherited the pipes can otherwise hold them open forever.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Runs `<workers_dir>/<kind>[.ext]`, directly or through an interpreter.
///
/// Each worker gets its own process group so stop signals also reach
/// anything it spawned. Stdout lines that decode as [`WorkerMessage`]s are
/// forwarded; everything else is captured.
#[derive(Clone, Debug)]
pub struct ProcessWorkerAdapter {
    config: Arc<WorkerConfig>,
}

impl ProcessWorkerAdapter {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    fn worker_path(&self, kind: &JobKind) -> PathBuf {
        let file = match &self.config.extension {
            Some(ext) => format!("{}.{}", kind, ext),
            None => kind.to_string(),
        };
        self.config.workers_dir.join(file)
    }

    fn kind_for_file(&self, path: &std::path::Path) -> Option<JobKind> {
        match &self.config.extension {
            Some(ext) => {
                if path.extension()?.to_str()? != ext {
                    return None;
                }
                Some(JobKind::new(path.file_stem()?.to_str()?))
            }
            None => Some(JobKind::new(path.file_name()?.to_str()?)),
        }
    }
}

#[async_trait]
impl WorkerAdapter for ProcessWorkerAdapter {
    fn resolve(&self, kind: &JobKind) -> Result<WorkerCommand, WorkerError> {
        if !kind.is_valid() {
            return Err(WorkerError::NotFound(kind.to_string()));
        }
        let path = self.worker_path(kind);
        let meta = match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta,
            _ => return Err(WorkerError::NotFound(kind.to_string())),
        };
        match &self.config.interpreter {
            Some(interpreter) => Ok(WorkerCommand {
                program: interpreter.clone(),
                leading_args: vec![path.to_string_lossy().into_owned()],
            }),
            None if meta.permissions().mode() & 0o111 != 0 => Ok(WorkerCommand {
                program: path,
                leading_args: Vec::new(),
            }),
            None => Err(WorkerError::NotFound(kind.to_string())),
        }
    }

    fn kinds(&self) -> Vec<WorkerKindInfo> {
        let entries = match std::fs::read_dir(&self.config.workers_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    dir = %self.config.workers_dir.display(),
                    error = %e,
                    "cannot list workers directory"
                );
                return Vec::new();
            }
        };
        let mut kinds: Vec<WorkerKindInfo> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let kind = self.kind_for_file(&entry.path())?;
                self.resolve(&kind).ok()?;
                Some(WorkerKindInfo {
                    path: self.worker_path(&kind),
                    kind,
                })
            })
            .collect();
        kinds.sort_by(|a, b| a.kind.cmp(&b.kind));
        kinds
    }

    fn spawn(
        &self,
        config: WorkerSpawnConfig,
        event_tx: mpsc::Sender<WorkerEvent>,
    ) -> Result<WorkerHandle, WorkerError> {
        let command = self.resolve(&config.kind)?;

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.leading_args)
            .args(&config.args)
            .env("WARDEN_JOB_ID", config.job_id.as_str())
            .env("WARDEN_JOB_KIND", config.kind.as_str())
            .envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .process_group(0);

        let mut child = cmd.spawn().map_err(|e| WorkerError::SpawnFailed {
            kind: config.kind.to_string(),
            message: e.to_string(),
        })?;

        let handle = WorkerHandle::new(config.job_id, child.id());

        let stdout_buf = Arc::new(Mutex::new(TailBuffer::new(self.config.stdout_cap)));
        let stderr_buf = Arc::new(Mutex::new(TailBuffer::new(self.config.stderr_tail)));

        let stdout_task = child.stdout.take().map(|stdout| {
            tokio::spawn(pump_stdout(stdout, event_tx.clone(), Arc::clone(&stdout_buf)))
        });
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(pump_raw(stderr, Arc::clone(&stderr_buf))));

        tokio::spawn(reap(
            child,
            handle.clone(),
            event_tx,
            (stdout_task, stdout_buf),
            (stderr_task, stderr_buf),
        ));

        Ok(handle)
    }

    async fn signal(&self, handle: &WorkerHandle, signal: StopSignal) -> Result<(), WorkerError> {
        if handle.has_exited() {
            return Ok(());
        }
        let Some(pid) = handle.pid.and_then(|pid| i32::try_from(pid).ok()) else {
            return Ok(());
        };
        let signal = match signal {
            StopSignal::Terminate => Signal::SIGTERM,
            StopSignal::Kill => Signal::SIGKILL,
        };
        match killpg(Pid::from_raw(pid), signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(WorkerError::SignalFailed {
                job_id: handle.job_id.to_string(),
                message: errno.desc().to_string(),
            }),
        }
    }

    async fn is_alive(&self, handle: &WorkerHandle) -> Result<bool, WorkerError> {
        if handle.has_exited() {
            return Ok(false);
        }
        let Some(pid) = handle.pid.and_then(|pid| i32::try_from(pid).ok()) else {
            return Ok(false);
        };
        match kill(Pid::from_raw(pid), None::<Signal>) {
            Ok(()) | Err(Errno::EPERM) => Ok(true),
            Err(Errno::ESRCH) => Ok(false),
            Err(errno) => Err(WorkerError::Io(std::io::Error::from(errno))),
        }
    }
}

type Capture = (Option<JoinHandle<()>>, Arc<Mutex<TailBuffer>>);

/// Wait for exit, collect captured output and send the final report.
async fn reap(
    mut child: Child,
    handle: WorkerHandle,
    event_tx: mpsc::Sender<WorkerEvent>,
    stdout: Capture,
    stderr: Capture,
) {
    let status = child.wait().await;
    handle.mark_exited();

    let (stdout, stdout_truncated) = finish_capture(stdout).await;
    let (stderr, _) = finish_capture(stderr).await;
    if stdout_truncated {
        tracing::debug!(job_id = %handle.job_id, "worker stdout exceeded capture limit");
    }

    let exit = match status {
        Ok(status) => WorkerExit {
            code: status.code(),
            signal: status.signal(),
            stdout,
            stdout_truncated,
            stderr,
            error: None,
        },
        Err(e) => WorkerExit {
            stdout,
            stdout_truncated,
            stderr,
            error: Some(e.to_string()),
            ..WorkerExit::default()
        },
    };
    tracing::debug!(job_id = %handle.job_id, status = %exit.describe(), "worker reaped");
    let _ = event_tx.send(WorkerEvent::Exited(exit)).await;
}

/// Retained text, and whether any was dropped
async fn finish_capture((task, buf): Capture) -> (String, bool) {
    if let Some(mut task) = task {
        if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut task)
            .await
            .is_err()
        {
            task.abort();
        }
    }
    let buf = buf.lock();
    (buf.contents(), buf.truncated())
}

/// Split stdout into lines, routing messages to the side channel.
async fn pump_stdout(
    stdout: ChildStdout,
    event_tx: mpsc::Sender<WorkerEvent>,
    capture: Arc<Mutex<TailBuffer>>,
) {
    let mut reader = BufReader::new(stdout);
    let mut line = Vec::new();
    loop {
        line.clear();
        match (&mut reader)
            .take(MAX_LINE_BYTES)
            .read_until(b'\n', &mut line)
            .await
        {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                match WorkerMessage::decode(&text) {
                    // A closed receiver means nobody listens any more; keep
                    // draining so the worker never blocks on a full pipe.
                    Some(message) => {
                        let _ = event_tx.send(WorkerEvent::Message(message)).await;
                    }
                    None => capture.lock().push(&text),
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "stdout read failed");
                break;
            }
        }
    }
}

async fn pump_raw<R: AsyncRead + Unpin>(mut pipe: R, capture: Arc<Mutex<TailBuffer>>) {
    let mut chunk = [0u8; 4096];
    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => capture.lock().push_bytes(&chunk[..n]),
            Err(e) => {
                tracing::debug!(error = %e, "stderr read failed");
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
