// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use wd_core::{JobId, WorkerStats};

fn write_script(dir: &Path, file: &str, body: &str, mode: u32) {
    let path = dir.join(file);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
}

/// Adapter that runs `<dir>/<kind>.sh` through `/bin/sh`, so tests never
/// exec a file they just wrote.
fn sh_adapter(dir: &TempDir) -> ProcessWorkerAdapter {
    ProcessWorkerAdapter::new(WorkerConfig {
        interpreter: Some(PathBuf::from("/bin/sh")),
        extension: Some("sh".to_string()),
        ..WorkerConfig::new(dir.path())
    })
}

fn spawn_config(id: &str, kind: &str, args: &[&str]) -> WorkerSpawnConfig {
    WorkerSpawnConfig {
        job_id: JobId::new(id),
        kind: JobKind::new(kind),
        args: args.iter().map(|a| a.to_string()).collect(),
        env: vec![],
    }
}

/// Collect events until the exit report arrives.
async fn run_to_exit(rx: &mut mpsc::Receiver<WorkerEvent>) -> (Vec<WorkerMessage>, WorkerExit) {
    let mut messages = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("worker did not exit in time")
            .expect("event channel closed before exit");
        match event {
            WorkerEvent::Message(msg) => messages.push(msg),
            WorkerEvent::Exited(exit) => return (messages, exit),
        }
    }
}

#[test]
fn resolve_rejects_unknown_and_unsafe_kinds() {
    let dir = TempDir::new().unwrap();
    let adapter = ProcessWorkerAdapter::new(WorkerConfig::new(dir.path()));
    for kind in ["missing", "../etc", ".hidden", ""] {
        let err = adapter.resolve(&JobKind::new(kind)).unwrap_err();
        assert!(matches!(err, WorkerError::NotFound(_)), "kind {kind:?}: {err}");
    }
}

#[test]
fn resolve_requires_execute_bit_without_interpreter() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "plain", "exit 0", 0o644);
    write_script(dir.path(), "runnable", "exit 0", 0o755);
    let adapter = ProcessWorkerAdapter::new(WorkerConfig::new(dir.path()));

    assert!(adapter.resolve(&JobKind::new("plain")).is_err());
    let command = adapter.resolve(&JobKind::new("runnable")).unwrap();
    assert_eq!(command.program, dir.path().join("runnable"));
    assert!(command.leading_args.is_empty());
}

#[test]
fn resolve_with_interpreter_passes_script_path() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "ping.sh", "exit 0", 0o644);
    let adapter = sh_adapter(&dir);

    let command = adapter.resolve(&JobKind::new("ping")).unwrap();
    assert_eq!(command.program, PathBuf::from("/bin/sh"));
    assert_eq!(
        command.leading_args,
        vec![dir.path().join("ping.sh").to_string_lossy().into_owned()]
    );
}

#[test]
fn kinds_lists_resolvable_workers_sorted() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "zeta.sh", "exit 0", 0o644);
    write_script(dir.path(), "alpha.sh", "exit 0", 0o644);
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
    std::fs::create_dir(dir.path().join("nested.sh")).unwrap();
    let adapter = sh_adapter(&dir);

    let kinds: Vec<String> = adapter
        .kinds()
        .into_iter()
        .map(|info| info.kind.to_string())
        .collect();
    assert_eq!(kinds, vec!["alpha", "zeta"]);
}

#[test]
fn kinds_is_empty_for_missing_directory() {
    let adapter = ProcessWorkerAdapter::new(WorkerConfig::new("/nonexistent/workers"));
    assert!(adapter.kinds().is_empty());
}

#[tokio::test]
async fn spawn_routes_messages_and_captures_output() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "report.sh",
        r#"echo "starting $1"
echo '{"type":"progress","data":{"percent":50}}'
echo '{"type":"stats","data":{"totalRequests":7,"totalErrors":2}}'
echo "done" >&2
exit 0"#,
        0o644,
    );
    let adapter = sh_adapter(&dir);
    let (tx, mut rx) = mpsc::channel(16);

    adapter
        .spawn(spawn_config("job-1", "report", &["target"]), tx)
        .unwrap();
    let (messages, exit) = run_to_exit(&mut rx).await;

    assert_eq!(
        messages,
        vec![
            WorkerMessage::Progress(json!({"percent": 50})),
            WorkerMessage::Stats(WorkerStats {
                total_requests: 7,
                total_errors: 2,
            }),
        ]
    );
    assert!(exit.success());
    assert_eq!(exit.stdout, "starting target\n");
    assert!(!exit.stdout_truncated);
    assert_eq!(exit.stderr, "done\n");
}

#[tokio::test]
async fn spawn_reports_nonzero_exit_with_stderr_tail() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "noisy.sh",
        "i=0; while [ $i -lt 200 ]; do echo \"line $i\" >&2; i=$((i+1)); done; exit 3",
        0o644,
    );
    let adapter = ProcessWorkerAdapter::new(WorkerConfig {
        stderr_tail: 20,
        ..sh_adapter(&dir).config().clone()
    });
    let (tx, mut rx) = mpsc::channel(16);

    adapter.spawn(spawn_config("job-2", "noisy", &[]), tx).unwrap();
    let (_, exit) = run_to_exit(&mut rx).await;

    assert_eq!(exit.code, Some(3));
    assert!(!exit.success());
    assert_eq!(exit.stderr.chars().count(), 20);
    assert!(exit.stderr.ends_with("line 199\n"), "got {:?}", exit.stderr);
}

#[tokio::test]
async fn stdout_past_the_cap_is_marked_truncated() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "chatty.sh",
        "i=0; while [ $i -lt 100 ]; do echo \"row $i\"; i=$((i+1)); done",
        0o644,
    );
    let adapter = ProcessWorkerAdapter::new(WorkerConfig {
        stdout_cap: 32,
        ..sh_adapter(&dir).config().clone()
    });
    let (tx, mut rx) = mpsc::channel(16);

    adapter.spawn(spawn_config("job-9", "chatty", &[]), tx).unwrap();
    let (_, exit) = run_to_exit(&mut rx).await;

    assert!(exit.success());
    assert!(exit.stdout_truncated);
    assert_eq!(exit.stdout.chars().count(), 32);
    assert!(exit.stdout.ends_with("row 99\n"), "got {:?}", exit.stdout);
}

#[tokio::test]
async fn spawn_exports_job_identity() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "whoami.sh", "echo \"$WARDEN_JOB_ID/$WARDEN_JOB_KIND/$EXTRA\"", 0o644);
    let adapter = sh_adapter(&dir);
    let (tx, mut rx) = mpsc::channel(16);
    let mut config = spawn_config("job-9", "whoami", &[]);
    config.env.push(("EXTRA".to_string(), "yes".to_string()));

    adapter.spawn(config, tx).unwrap();
    let (_, exit) = run_to_exit(&mut rx).await;

    assert_eq!(exit.stdout, "job-9/whoami/yes\n");
}

#[tokio::test]
async fn terminate_stops_a_sleeping_worker() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "sleeper.sh", "exec sleep 30", 0o644);
    let adapter = sh_adapter(&dir);
    let (tx, mut rx) = mpsc::channel(16);

    let handle = adapter.spawn(spawn_config("job-3", "sleeper", &[]), tx).unwrap();
    assert!(handle.pid.is_some());
    assert!(adapter.is_alive(&handle).await.unwrap());

    adapter.signal(&handle, StopSignal::Terminate).await.unwrap();
    let (_, exit) = run_to_exit(&mut rx).await;

    assert_eq!(exit.signal, Some(15));
    assert!(handle.has_exited());
    assert!(!adapter.is_alive(&handle).await.unwrap());
}

#[tokio::test]
async fn kill_stops_a_worker_that_ignores_sigterm() {
    let dir = TempDir::new().unwrap();
    write_script(
        dir.path(),
        "stubborn.sh",
        "trap '' TERM; while true; do sleep 1; done",
        0o644,
    );
    let adapter = sh_adapter(&dir);
    let (tx, mut rx) = mpsc::channel(16);

    let handle = adapter.spawn(spawn_config("job-4", "stubborn", &[]), tx).unwrap();
    // Give the shell a moment to install its trap
    tokio::time::sleep(Duration::from_millis(200)).await;
    adapter.signal(&handle, StopSignal::Terminate).await.unwrap();
    assert!(
        tokio::time::timeout(Duration::from_millis(300), rx.recv())
            .await
            .is_err(),
        "worker should survive SIGTERM"
    );

    adapter.signal(&handle, StopSignal::Kill).await.unwrap();
    let (_, exit) = run_to_exit(&mut rx).await;
    assert_eq!(exit.signal, Some(9));
}

#[tokio::test]
async fn signalling_an_exited_worker_is_a_noop() {
    let dir = TempDir::new().unwrap();
    write_script(dir.path(), "quick.sh", "exit 0", 0o644);
    let adapter = sh_adapter(&dir);
    let (tx, mut rx) = mpsc::channel(16);

    let handle = adapter.spawn(spawn_config("job-5", "quick", &[]), tx).unwrap();
    run_to_exit(&mut rx).await;

    adapter.signal(&handle, StopSignal::Kill).await.unwrap();
    assert!(!adapter.is_alive(&handle).await.unwrap());
}

#[tokio::test]
async fn spawn_unknown_kind_fails_before_starting() {
    let dir = TempDir::new().unwrap();
    let adapter = sh_adapter(&dir);
    let (tx, _rx) = mpsc::channel(16);
    let err = adapter
        .spawn(spawn_config("job-6", "absent", &[]), tx)
        .unwrap_err();
    assert!(matches!(err, WorkerError::NotFound(kind) if kind == "absent"));
}
