// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timeout budgets and two-phase termination

use super::*;
use std::time::Duration;
use tokio::time::Instant;

fn spawn_with_timeout(ctx: &TestContext, id: &str, timeout: Option<Duration>) -> JobCompletion {
    let mut request = SpawnRequest::new("sleeper").with_id(id);
    request.timeout = timeout;
    ctx.supervisor.spawn(request).unwrap()
}

#[tokio::test(start_paused = true)]
async fn overrunning_job_times_out() {
    let ctx = setup();
    let start = Instant::now();
    let completion = spawn_with_timeout(&ctx, "slow", Some(Duration::from_millis(100)));

    let outcome = completion.await;
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(outcome.state, JobState::Failed);
    assert_eq!(failure_kind(&outcome), Some(FailureKind::Timeout));
    assert_eq!(outcome.exit, Some(WorkerExit::signaled(15)));
    assert_eq!(ctx.workers.signals_for("slow"), vec![StopSignal::Terminate]);
    assert!(!ctx.workers.is_running("slow"));

    let stats = ctx.supervisor.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.active, 0);
    assert!(matches!(
        outcome.into_result(),
        Err(SupervisorError::Timeout(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn ignored_terminate_escalates_to_kill() {
    let ctx = setup_with(SupervisorConfig {
        kill_grace: Duration::from_secs(2),
        ..SupervisorConfig::default()
    });
    ctx.workers.set_ignore_terminate(true);
    let start = Instant::now();
    let completion = spawn_with_timeout(&ctx, "stubborn", Some(Duration::from_millis(100)));

    let outcome = completion.await;
    assert!(start.elapsed() >= Duration::from_millis(2100));
    assert_eq!(failure_kind(&outcome), Some(FailureKind::Timeout));
    assert_eq!(outcome.exit, Some(WorkerExit::signaled(9)));
    assert_eq!(
        ctx.workers.signals_for("stubborn"),
        vec![StopSignal::Terminate, StopSignal::Kill]
    );
}

#[tokio::test(start_paused = true)]
async fn requested_budget_is_capped() {
    let ctx = setup_with(SupervisorConfig {
        max_timeout: Duration::from_secs(1),
        ..SupervisorConfig::default()
    });
    let start = Instant::now();
    let completion = spawn_with_timeout(&ctx, "capped", Some(Duration::from_secs(60)));

    let outcome = completion.await;
    assert_eq!(failure_kind(&outcome), Some(FailureKind::Timeout));
    assert!(start.elapsed() >= Duration::from_secs(1));
    assert!(start.elapsed() < Duration::from_secs(2));
}

async fn assert_uses_maximum(timeout: Option<Duration>) {
    let ctx = setup_with(SupervisorConfig {
        max_timeout: Duration::from_secs(3),
        ..SupervisorConfig::default()
    });
    let start = Instant::now();
    let outcome = spawn_with_timeout(&ctx, "default", timeout).await;

    assert_eq!(failure_kind(&outcome), Some(FailureKind::Timeout));
    assert!(start.elapsed() >= Duration::from_secs(3));
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[tokio::test(start_paused = true)]
async fn missing_budget_uses_the_maximum() {
    assert_uses_maximum(None).await;
}

#[tokio::test(start_paused = true)]
async fn zero_budget_uses_the_maximum() {
    assert_uses_maximum(Some(Duration::ZERO)).await;
}

#[tokio::test(start_paused = true)]
async fn exit_before_deadline_wins() {
    let ctx = setup();
    let completion = spawn_with_timeout(&ctx, "quick", Some(Duration::from_secs(1)));
    ctx.workers.exit("quick", 0).await;

    let outcome = completion.await;
    assert_eq!(outcome.state, JobState::Completed);
    assert!(ctx.workers.signals_for("quick").is_empty());

    // The deadline passing later changes nothing
    tokio::time::sleep(Duration::from_secs(2)).await;
    let stats = ctx.supervisor.stats();
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 0);
}
