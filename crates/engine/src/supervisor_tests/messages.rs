// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Side-channel progress and stats messages

use super::*;
use serde_json::json;

fn stats(total_requests: u64, total_errors: u64) -> WorkerMessage {
    WorkerMessage::Stats(WorkerStats {
        total_requests,
        total_errors,
    })
}

#[tokio::test]
async fn stats_accumulate_across_messages_and_jobs() {
    let ctx = setup();
    let mut rx = ctx.supervisor.subscribe();
    ctx.spawn("a");
    ctx.spawn("b");

    ctx.workers.send_message("a", stats(10, 1)).await;
    ctx.workers.send_message("a", stats(5, 0)).await;
    ctx.workers.send_message("b", stats(7, 2)).await;
    for _ in 0..3 {
        next_matching(&mut rx, |e| matches!(e, SupervisorEvent::Stats { .. })).await;
    }

    let totals = ctx.supervisor.stats();
    assert_eq!(totals.total_requests, 22);
    assert_eq!(totals.total_errors, 3);
}

#[tokio::test]
async fn progress_is_broadcast_and_latest_wins() {
    let ctx = setup();
    let mut rx = ctx.supervisor.subscribe();
    ctx.spawn("a");

    ctx.workers
        .send_message("a", WorkerMessage::Progress(json!({"pct": 10})))
        .await;
    ctx.workers
        .send_message("a", WorkerMessage::Progress(json!({"pct": 55})))
        .await;

    let first = next_matching(&mut rx, |e| matches!(e, SupervisorEvent::Progress { .. })).await;
    assert_eq!(
        first,
        SupervisorEvent::Progress {
            id: JobId::new("a"),
            data: json!({"pct": 10}),
        }
    );
    next_matching(&mut rx, |e| matches!(e, SupervisorEvent::Progress { .. })).await;

    let job = ctx.supervisor.get("a").unwrap();
    assert_eq!(job.last_progress, Some(json!({"pct": 55})));
}

#[tokio::test]
async fn messages_before_exit_are_counted() {
    let ctx = setup();
    let completion = ctx.spawn("a");
    ctx.workers.send_message("a", stats(3, 1)).await;
    ctx.workers.exit("a", 0).await;
    completion.await;

    let totals = ctx.supervisor.stats();
    assert_eq!(totals.total_requests, 3);
    assert_eq!(totals.total_errors, 1);
}

#[tokio::test]
async fn late_messages_are_ignored() {
    let ctx = setup();
    ctx.workers.set_ignore_terminate(true);
    let completion = ctx.spawn("a");

    assert!(ctx.supervisor.stop("a"));
    ctx.workers.send_message("a", stats(100, 100)).await;
    ctx.workers
        .send_message("a", WorkerMessage::Progress(json!({"pct": 99})))
        .await;
    ctx.workers.exit("a", 0).await;
    completion.await;

    let totals = ctx.supervisor.stats();
    assert_eq!(totals.total_requests, 0);
    assert_eq!(totals.total_errors, 0);
}

#[tokio::test]
async fn stats_totals_saturate_instead_of_wrapping() {
    let ctx = setup();
    let mut rx = ctx.supervisor.subscribe();
    ctx.spawn("a");

    let half = u64::MAX / 2 + 1;
    ctx.workers.send_message("a", stats(half, half)).await;
    ctx.workers.send_message("a", stats(half, 1)).await;
    ctx.workers.send_message("a", stats(5, 0)).await;
    for _ in 0..3 {
        next_matching(&mut rx, |e| matches!(e, SupervisorEvent::Stats { .. })).await;
    }

    let totals = ctx.supervisor.stats();
    assert_eq!(totals.total_requests, u64::MAX);
    assert_eq!(totals.total_errors, u64::MAX);
}
