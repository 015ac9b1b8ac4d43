// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exit, stop and stop_all

use super::*;

#[tokio::test]
async fn clean_exit_completes_the_job() {
    let ctx = setup();
    let completion = ctx.spawn("a");
    ctx.clock.advance(std::time::Duration::from_millis(250));
    ctx.workers.exit("a", 0).await;

    let outcome = completion.await;
    assert_eq!(outcome.state, JobState::Completed);
    assert_eq!(outcome.failure, None);
    assert_eq!(outcome.exit, Some(WorkerExit::code(0)));
    assert_eq!(outcome.elapsed, std::time::Duration::from_millis(250));
    assert!(outcome.is_success());

    let stats = ctx.supervisor.stats();
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.active, 0);
    assert!(ctx.supervisor.get("a").is_none());
    assert!(ctx.workers.signals_for("a").is_empty());
}

#[tokio::test]
async fn nonzero_exit_fails_with_stderr_tail() {
    let ctx = setup();
    let completion = ctx.spawn("a");
    ctx.workers
        .finish(
            "a",
            WorkerExit {
                code: Some(3),
                stderr: "target unreachable".to_string(),
                ..WorkerExit::default()
            },
        )
        .await;

    let outcome = completion.await;
    assert_eq!(outcome.state, JobState::Failed);
    assert_eq!(failure_kind(&outcome), Some(FailureKind::WorkerFailure));
    let err = outcome.into_result().unwrap_err();
    assert_eq!(
        err,
        SupervisorError::WorkerFailure(
            "job a: exited with code 3: target unreachable".to_string()
        )
    );
    assert_eq!(ctx.supervisor.stats().failed, 1);
}

#[tokio::test]
async fn stop_unknown_id_is_a_noop() {
    let ctx = setup();
    ctx.spawn("a");
    assert!(!ctx.supervisor.stop("nope"));
    assert_eq!(ctx.active_ids(), vec!["a"]);
    assert_eq!(ctx.supervisor.stats().succeeded, 0);
}

#[tokio::test]
async fn stop_removes_the_job_and_terminates_it() {
    let ctx = setup();
    let completion = ctx.spawn("a");

    assert!(ctx.supervisor.stop("a"));
    assert!(ctx.supervisor.list_active().is_empty());
    assert!(!ctx.supervisor.stop("a"));

    let outcome = completion.await;
    assert_eq!(outcome.state, JobState::Stopped);
    assert_eq!(outcome.exit, Some(WorkerExit::signaled(15)));
    assert_eq!(ctx.workers.signals_for("a"), vec![StopSignal::Terminate]);
    assert!(!ctx.workers.is_running("a"));

    let stats = ctx.supervisor.stats();
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn exit_after_stop_does_not_change_the_outcome() {
    let ctx = setup();
    ctx.workers.set_ignore_terminate(true);
    let completion = ctx.spawn("a");

    assert!(ctx.supervisor.stop("a"));
    ctx.workers.exit("a", 1).await;

    let outcome = completion.await;
    assert_eq!(outcome.state, JobState::Stopped);
    assert_eq!(outcome.exit, Some(WorkerExit::code(1)));
    let stats = ctx.supervisor.stats();
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn stop_all_stops_every_job() {
    let ctx = setup();
    let completions = vec![ctx.spawn("a"), ctx.spawn("b"), ctx.spawn("c")];

    assert_eq!(ctx.supervisor.stop_all(), 3);
    assert!(ctx.supervisor.list_active().is_empty());
    assert_eq!(ctx.supervisor.stop_all(), 0);

    for completion in completions {
        assert_eq!(completion.await.state, JobState::Stopped);
    }
    assert_eq!(ctx.supervisor.stats().succeeded, 3);
}

#[tokio::test]
async fn lifecycle_events_are_published() {
    let ctx = setup();
    let mut rx = ctx.supervisor.subscribe();
    let completion = ctx.spawn("a");
    ctx.workers.exit("a", 0).await;
    completion.await;

    assert_eq!(
        rx.recv().await.unwrap(),
        SupervisorEvent::JobStarted {
            id: JobId::new("a"),
            kind: JobKind::new("ping"),
            started_at_ms: 1_000_000,
        }
    );
    assert_eq!(
        rx.recv().await.unwrap(),
        SupervisorEvent::JobFinished {
            id: JobId::new("a"),
            kind: JobKind::new("ping"),
            state: JobState::Completed,
            failure: None,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn lost_channel_fails_the_job() {
    let ctx = setup();
    let completion = ctx.spawn("a");
    ctx.workers.drop_channel("a");

    let outcome = completion.await;
    assert_eq!(outcome.state, JobState::Failed);
    assert_eq!(failure_kind(&outcome), Some(FailureKind::ProcessError));
    assert_eq!(outcome.exit, None);
    assert_eq!(
        ctx.workers.signals_for("a"),
        vec![StopSignal::Terminate, StopSignal::Kill]
    );
    assert_eq!(ctx.supervisor.stats().failed, 1);
}

#[tokio::test]
async fn counters_balance_after_mixed_outcomes() {
    let ctx = setup();
    let a = ctx.spawn("a");
    let b = ctx.spawn("b");
    let c = ctx.spawn("c");
    ctx.workers.exit("a", 0).await;
    ctx.workers.exit("b", 2).await;
    ctx.supervisor.stop("c");
    a.await;
    b.await;
    c.await;

    let stats = ctx.supervisor.stats();
    assert_eq!(stats.total_jobs, 3);
    assert_eq!(stats.succeeded + stats.failed, stats.total_jobs);
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.unfinished(), 0);
}
