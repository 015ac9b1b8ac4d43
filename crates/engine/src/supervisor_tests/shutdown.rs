// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shutdown draining and idempotence

use super::*;
use std::time::Duration;

#[tokio::test]
async fn shutdown_stops_every_job() {
    let ctx = setup();
    let completions = vec![ctx.spawn("a"), ctx.spawn("b"), ctx.spawn("c")];

    ctx.supervisor.shutdown().await;

    assert!(ctx.supervisor.list_active().is_empty());
    assert!(ctx.supervisor.is_shutting_down());
    for id in ["a", "b", "c"] {
        assert_eq!(ctx.workers.signals_for(id), vec![StopSignal::Terminate]);
        assert!(!ctx.workers.is_running(id));
    }
    for completion in completions {
        assert_eq!(completion.await.state, JobState::Stopped);
    }
    assert!(ctx.supervisor.inner.table.lock().tasks.is_empty());
}

#[tokio::test]
async fn second_shutdown_after_drain_returns_immediately() {
    let ctx = setup();
    ctx.spawn("a");
    ctx.spawn("b");
    ctx.spawn("c");

    ctx.supervisor.shutdown().await;
    ctx.supervisor.shutdown().await;

    assert_eq!(ctx.supervisor.stats().succeeded, 3);
    assert_eq!(ctx.workers.signals_for("a"), vec![StopSignal::Terminate]);
}

#[tokio::test]
async fn spawn_after_shutdown_is_rejected() {
    let ctx = setup();
    ctx.supervisor.shutdown().await;

    assert!(!ctx.supervisor.can_admit());
    let err = ctx
        .supervisor
        .spawn(SpawnRequest::new("ping"))
        .unwrap_err();
    assert_eq!(err, SupervisorError::ShuttingDown);
    assert_eq!(ctx.workers.spawn_count(), 0);
}

#[tokio::test]
async fn shutdown_stops_the_reconciler() {
    let ctx = setup();
    ctx.supervisor.start_reconciler();
    assert!(ctx.supervisor.inner.reconciler.lock().is_some());

    ctx.supervisor.shutdown().await;
    assert!(ctx.supervisor.inner.reconciler.lock().is_none());

    ctx.supervisor.start_reconciler();
    assert!(ctx.supervisor.inner.reconciler.lock().is_none());
}

#[tokio::test(start_paused = true)]
async fn shutdown_is_bounded_by_its_timeout() {
    let ctx = setup_with(SupervisorConfig {
        kill_grace: Duration::from_secs(30),
        shutdown_timeout: Duration::from_secs(1),
        ..SupervisorConfig::default()
    });
    ctx.workers.set_ignore_terminate(true);
    let completion = ctx.spawn("stubborn");

    let start = tokio::time::Instant::now();
    ctx.supervisor.shutdown().await;
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert!(start.elapsed() < Duration::from_secs(30));
    // Still running when the drain gave up, so it was killed directly
    assert_eq!(
        ctx.workers.signals_for("stubborn"),
        vec![StopSignal::Terminate, StopSignal::Kill]
    );
    assert!(!ctx.workers.is_running("stubborn"));

    let outcome = completion.await;
    assert_eq!(outcome.state, JobState::Failed);
    assert_eq!(
        outcome.failure.unwrap().message,
        "supervision ended before the job resolved"
    );
    assert_eq!(ctx.supervisor.stats().succeeded, 1);
}

#[tokio::test(start_paused = true)]
async fn grace_equal_to_shutdown_timeout_still_kills_stubborn_workers() {
    let ctx = setup_with(SupervisorConfig {
        kill_grace: Duration::from_secs(5),
        shutdown_timeout: Duration::from_secs(5),
        ..SupervisorConfig::default()
    });
    ctx.workers.set_ignore_terminate(true);
    ctx.spawn("a");
    ctx.spawn("b");

    ctx.supervisor.shutdown().await;

    for id in ["a", "b"] {
        assert_eq!(
            ctx.workers.signals_for(id),
            vec![StopSignal::Terminate, StopSignal::Kill]
        );
        assert!(!ctx.workers.is_running(id), "{id} survived shutdown");
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_shutdown_waits_for_the_drain() {
    let ctx = setup_with(SupervisorConfig {
        kill_grace: Duration::from_secs(2),
        shutdown_timeout: Duration::from_secs(10),
        ..SupervisorConfig::default()
    });
    ctx.workers.set_ignore_terminate(true);
    ctx.spawn("a");

    let start = tokio::time::Instant::now();
    let first = tokio::spawn({
        let supervisor = ctx.supervisor.clone();
        async move { supervisor.shutdown().await }
    });
    tokio::task::yield_now().await;
    assert!(ctx.supervisor.is_shutting_down());

    ctx.supervisor.shutdown().await;

    // Terminate is ignored, so draining took the whole grace window
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert!(!ctx.workers.is_running("a"));
    assert!(ctx.supervisor.inner.table.lock().tasks.is_empty());
    first.await.unwrap();
}
