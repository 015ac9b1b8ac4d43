// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconcile sweeps and the background reconciler

use super::*;
use std::time::Duration;

#[tokio::test]
async fn healthy_jobs_are_left_alone() {
    let ctx = setup();
    ctx.spawn("a");
    ctx.spawn("b");

    let report = ctx.supervisor.reconcile().await;
    assert_eq!(
        report,
        ReconcileReport {
            checked: 2,
            ..ReconcileReport::default()
        }
    );
    assert_eq!(ctx.active_ids(), vec!["a", "b"]);
}

#[tokio::test]
async fn vanished_process_is_reaped() {
    let ctx = setup();
    let completion = ctx.spawn("a");
    ctx.spawn("b");
    ctx.workers.vanish("a");

    let report = ctx.supervisor.reconcile().await;
    assert_eq!(report.vanished, 1);
    assert_eq!(report.reaped(), 1);
    assert_eq!(ctx.active_ids(), vec!["b"]);

    let outcome = completion.await;
    assert_eq!(outcome.state, JobState::Failed);
    assert_eq!(failure_kind(&outcome), Some(FailureKind::ProcessError));
    assert_eq!(
        outcome.failure.unwrap().message,
        "process exited without notification"
    );
    assert!(ctx.workers.signals_for("a").is_empty());
    assert_eq!(ctx.supervisor.stats().failed, 1);
}

#[tokio::test]
async fn stale_job_is_reaped_and_terminated() {
    let ctx = setup_with(SupervisorConfig {
        stale_job_ceiling: Duration::from_secs(60),
        ..SupervisorConfig::default()
    });
    let completion = ctx.spawn("old");
    ctx.clock.advance(Duration::from_secs(30));
    ctx.spawn("young");
    ctx.clock.advance(Duration::from_secs(31));

    let report = ctx.supervisor.reconcile().await;
    assert_eq!(report.stale, 1);
    assert_eq!(report.checked, 2);
    assert_eq!(ctx.active_ids(), vec!["young"]);

    let outcome = completion.await;
    assert_eq!(outcome.state, JobState::Failed);
    assert_eq!(failure_kind(&outcome), Some(FailureKind::Timeout));
    assert_eq!(ctx.workers.signals_for("old"), vec![StopSignal::Terminate]);
    assert!(!ctx.workers.is_running("old"));
}

#[tokio::test]
async fn liveness_errors_skip_the_entry() {
    let ctx = setup();
    ctx.spawn("a");
    ctx.workers.set_liveness_error(true);

    let report = ctx.supervisor.reconcile().await;
    assert_eq!(report.errors, 1);
    assert_eq!(report.reaped(), 0);
    assert_eq!(ctx.active_ids(), vec!["a"]);
    assert_eq!(ctx.supervisor.stats().failed, 0);
}

#[tokio::test]
async fn reaping_is_counted_once() {
    let ctx = setup();
    let completion = ctx.spawn("a");
    ctx.workers.vanish("a");

    assert_eq!(ctx.supervisor.reconcile().await.vanished, 1);
    assert_eq!(ctx.supervisor.reconcile().await, ReconcileReport::default());
    completion.await;
    assert_eq!(ctx.supervisor.stats().failed, 1);
    assert_eq!(ctx.supervisor.stats().total_jobs, 1);
}

#[tokio::test(start_paused = true)]
async fn reconciler_sweeps_periodically() {
    let ctx = setup_with(SupervisorConfig {
        reconcile_interval: Duration::from_secs(1),
        ..SupervisorConfig::default()
    });
    ctx.spawn("a");
    ctx.workers.vanish("a");
    ctx.supervisor.start_reconciler();
    ctx.supervisor.start_reconciler();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(ctx.active_ids(), vec!["a"]);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert!(ctx.supervisor.list_active().is_empty());
    assert_eq!(ctx.supervisor.stats().failed, 1);
}
