//! Admission: the concurrency ceiling, kind resolution and id handling.

use crate::prelude::*;
use wd_engine::{SpawnRequest, SupervisorError};

#[tokio::test]
async fn unknown_kind_is_rejected_without_using_a_slot() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(2));

    let err = supervisor.spawn(SpawnRequest::new("missing")).unwrap_err();

    assert_eq!(err, SupervisorError::NotFound("missing".to_string()));
    assert_eq!(supervisor.stats().active, 0);
    assert_eq!(supervisor.stats().total_jobs, 0);
}

#[tokio::test]
async fn kind_cannot_escape_the_workers_directory() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(2));

    let err = supervisor.spawn(SpawnRequest::new("../quick")).unwrap_err();

    assert!(matches!(err, SupervisorError::NotFound(_)));
}

#[tokio::test]
async fn ceiling_rejects_then_admits_after_stop() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(2));

    let first = supervisor.spawn(SpawnRequest::new("sleeper").with_id("a")).unwrap();
    let _second = supervisor.spawn(SpawnRequest::new("sleeper").with_id("b")).unwrap();
    let err = supervisor.spawn(SpawnRequest::new("sleeper").with_id("c")).unwrap_err();
    assert_eq!(err, SupervisorError::ResourceExhausted { limit: 2 });

    assert!(supervisor.stop("a"));
    let outcome = outcome(first).await;
    assert_eq!(outcome.state, wd_core::JobState::Stopped);

    supervisor.spawn(SpawnRequest::new("sleeper").with_id("c")).unwrap();
    let stats = supervisor.stats();
    assert_eq!(stats.active, 2);
    assert_eq!(stats.available, 0);

    supervisor.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_spawns_never_exceed_the_ceiling() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(3));

    let mut attempts = Vec::new();
    for n in 0..16 {
        let supervisor = supervisor.clone();
        attempts.push(tokio::spawn(async move {
            supervisor
                .spawn(SpawnRequest::new("sleeper").with_id(format!("job-{n}")))
                .map(|_| ())
        }));
    }

    let mut admitted = 0;
    let mut rejected = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(()) => admitted += 1,
            Err(SupervisorError::ResourceExhausted { limit: 3 }) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(admitted, 3);
    assert_eq!(rejected, 13);
    assert_eq!(supervisor.list_active().len(), 3);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn running_id_cannot_be_reused() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(4));

    supervisor.spawn(SpawnRequest::new("sleeper").with_id("same")).unwrap();
    let err = supervisor.spawn(SpawnRequest::new("quick").with_id("same")).unwrap_err();

    assert_eq!(err, SupervisorError::DuplicateId("same".to_string()));
    assert_eq!(supervisor.stats().active, 1);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn kinds_lists_scripts_in_the_workers_directory() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(1));

    let mut kinds: Vec<String> = supervisor
        .kinds()
        .into_iter()
        .map(|info| info.kind.to_string())
        .collect();
    kinds.sort();

    assert_eq!(kinds, vec!["failing", "quick", "reporter", "sleeper", "stubborn"]);
}
