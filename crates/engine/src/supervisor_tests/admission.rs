// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission: ceiling, unknown kinds, duplicate ids, spawn failures

use super::*;

#[tokio::test]
async fn spawn_registers_a_running_job() {
    let ctx = setup();
    let completion = ctx
        .supervisor
        .spawn(SpawnRequest::new("ping").with_id("job-a").args(["x", "y"]))
        .unwrap();

    assert_eq!(completion.id(), "job-a");
    let active = ctx.supervisor.list_active();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "job-a");
    assert_eq!(active[0].kind, "ping");
    assert_eq!(active[0].status, JobState::Running);
    assert_eq!(active[0].started_at_ms, 1_000_000);
    assert_eq!(
        ctx.workers.spawned_args("job-a"),
        Some(vec!["x".to_string(), "y".to_string()])
    );

    let stats = ctx.supervisor.stats();
    assert_eq!(stats.total_jobs, 1);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.limit, 3);
    assert_eq!(stats.available, 2);
}

#[tokio::test]
async fn unknown_kind_is_not_found() {
    let ctx = setup();
    let err = ctx
        .supervisor
        .spawn(SpawnRequest::new("missing"))
        .unwrap_err();

    assert_eq!(err, SupervisorError::NotFound("missing".to_string()));
    assert!(ctx.supervisor.list_active().is_empty());
    assert_eq!(ctx.supervisor.stats().total_jobs, 0);
    assert_eq!(ctx.workers.spawn_count(), 0);
}

#[tokio::test]
async fn path_like_kind_is_not_found() {
    let ctx = setup();
    let err = ctx
        .supervisor
        .spawn(SpawnRequest::new("../ping"))
        .unwrap_err();
    assert!(matches!(err, SupervisorError::NotFound(_)));
}

#[tokio::test]
async fn rejects_spawn_at_the_ceiling() {
    let ctx = setup_with(config(2));
    ctx.spawn("a");
    ctx.spawn("b");
    assert!(!ctx.supervisor.can_admit());

    let err = ctx
        .supervisor
        .spawn(SpawnRequest::new("ping").with_id("c"))
        .unwrap_err();
    assert_eq!(err, SupervisorError::ResourceExhausted { limit: 2 });
    assert_eq!(ctx.workers.spawn_count(), 2);
    assert_eq!(ctx.supervisor.stats().available, 0);
}

#[tokio::test]
async fn stop_frees_a_slot() {
    let ctx = setup_with(config(2));
    ctx.spawn("a");
    ctx.spawn("b");
    assert!(ctx
        .supervisor
        .spawn(SpawnRequest::new("ping").with_id("c"))
        .is_err());

    assert!(ctx.supervisor.stop("a"));
    assert!(ctx.supervisor.can_admit());
    ctx.spawn("c");

    assert_eq!(ctx.active_ids(), vec!["b", "c"]);
    assert_eq!(ctx.supervisor.stats().total_jobs, 3);
}

#[tokio::test]
async fn duplicate_running_id_is_rejected() {
    let ctx = setup();
    ctx.spawn("same");
    let err = ctx
        .supervisor
        .spawn(SpawnRequest::new("sleeper").with_id("same"))
        .unwrap_err();

    assert_eq!(err, SupervisorError::DuplicateId("same".to_string()));
    assert_eq!(ctx.active_ids(), vec!["same"]);
    assert_eq!(ctx.workers.spawn_count(), 1);
}

#[tokio::test]
async fn id_can_be_reused_after_the_job_ends() {
    let ctx = setup();
    let first = ctx.spawn("again");
    ctx.workers.exit("again", 0).await;
    assert_eq!(first.await.state, JobState::Completed);

    let second = ctx.spawn("again");
    assert_eq!(ctx.active_ids(), vec!["again"]);
    ctx.workers.exit("again", 0).await;
    assert_eq!(second.await.state, JobState::Completed);
    assert_eq!(ctx.supervisor.stats().succeeded, 2);
}

#[tokio::test]
async fn spawn_failure_leaves_table_untouched() {
    let ctx = setup();
    ctx.workers.set_spawn_error(Some("exec format error"));

    let err = ctx
        .supervisor
        .spawn(SpawnRequest::new("ping"))
        .unwrap_err();
    assert!(matches!(err, SupervisorError::ProcessError(ref m) if m.contains("exec format error")));
    assert!(ctx.supervisor.list_active().is_empty());
    assert_eq!(ctx.supervisor.stats().total_jobs, 0);
}

#[tokio::test]
async fn arguments_are_truncated() {
    let ctx = setup_with(SupervisorConfig {
        max_arg_len: 4,
        ..SupervisorConfig::default()
    });
    ctx.supervisor
        .spawn(
            SpawnRequest::new("ping")
                .with_id("t")
                .arg("abcdefgh")
                .arg("ab")
                .arg("ééééé"),
        )
        .unwrap();

    assert_eq!(
        ctx.workers.spawned_args("t"),
        Some(vec![
            "abcd".to_string(),
            "ab".to_string(),
            "éééé".to_string()
        ])
    );
}

#[tokio::test]
async fn ids_are_generated_when_absent() {
    let ctx = setup();
    let first = ctx.supervisor.spawn(SpawnRequest::new("ping")).unwrap();
    let second = ctx.supervisor.spawn(SpawnRequest::new("ping")).unwrap();
    assert_eq!(first.id(), "job-1");
    assert_eq!(second.id(), "job-2");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_spawns_never_exceed_the_ceiling() {
    let ctx = setup_with(config(3));
    let mut tasks = Vec::new();
    for i in 0..24 {
        let supervisor = ctx.supervisor.clone();
        tasks.push(tokio::spawn(async move {
            supervisor
                .spawn(SpawnRequest::new("ping").with_id(format!("race-{i}")))
                .is_ok()
        }));
    }

    let mut admitted = 0;
    for task in tasks {
        if task.await.unwrap() {
            admitted += 1;
        }
    }

    assert_eq!(admitted, 3);
    assert_eq!(ctx.supervisor.list_active().len(), 3);
    assert_eq!(ctx.workers.spawn_count(), 3);
    assert_eq!(ctx.supervisor.stats().total_jobs, 3);
}

#[tokio::test]
async fn kinds_come_from_the_adapter() {
    let ctx = setup();
    let kinds: Vec<String> = ctx
        .supervisor
        .kinds()
        .into_iter()
        .map(|info| info.kind.to_string())
        .collect();
    assert_eq!(kinds, vec!["ping", "sleeper"]);
}
