//! Lifecycle: exit classification, stopping and counters.

use crate::prelude::*;
use wd_core::{FailureKind, JobState, SupervisorEvent};
use wd_engine::{SpawnRequest, SupervisorError};

#[tokio::test]
async fn clean_exit_completes_and_frees_the_slot() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(1));

    let completion = supervisor.spawn(SpawnRequest::new("quick")).unwrap();
    let outcome = outcome(completion).await;

    assert_eq!(outcome.state, JobState::Completed);
    assert!(outcome.failure.is_none());
    assert_eq!(outcome.exit.as_ref().and_then(|e| e.code), Some(0));
    assert!(supervisor.list_active().is_empty());
    assert!(supervisor.can_admit());
}

#[tokio::test]
async fn nonzero_exit_fails_with_stderr_tail() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(1));

    let completion = supervisor.spawn(SpawnRequest::new("failing").with_id("f")).unwrap();
    let outcome = outcome(completion).await;

    assert_eq!(outcome.state, JobState::Failed);
    let failure = outcome.failure.clone().unwrap();
    assert_eq!(failure.kind, FailureKind::WorkerFailure);
    assert!(failure.message.contains("exited with code 3"), "{}", failure.message);
    assert!(failure.message.contains("target unreachable"), "{}", failure.message);

    let err = outcome.into_result().unwrap_err();
    assert!(matches!(err, SupervisorError::WorkerFailure(msg) if msg.starts_with("job f:")));
}

#[tokio::test]
async fn stop_unknown_job_returns_false() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(1));

    assert!(!supervisor.stop("nope"));
}

#[tokio::test]
async fn stop_terminates_the_process() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(1));
    let pid_path = pid_file(&workers, "stopped");

    let completion = supervisor
        .spawn(SpawnRequest::new("sleeper").with_id("s").arg(pid_path.clone()))
        .unwrap();
    let pid = read_pid(&pid_path).await;
    assert!(process_exists(pid));

    assert!(supervisor.stop("s"));
    assert!(supervisor.get("s").is_none());

    let outcome = outcome(completion).await;
    assert_eq!(outcome.state, JobState::Stopped);
    assert!(outcome.failure.is_none());
    assert!(wait_for(|| !process_exists(pid)).await);

    // A second stop finds nothing
    assert!(!supervisor.stop("s"));
}

#[tokio::test]
async fn counters_account_for_every_admitted_job() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(4));

    let quick = supervisor.spawn(SpawnRequest::new("quick")).unwrap();
    let failing = supervisor.spawn(SpawnRequest::new("failing")).unwrap();
    let stopped = supervisor.spawn(SpawnRequest::new("sleeper").with_id("s")).unwrap();
    let _running = supervisor.spawn(SpawnRequest::new("sleeper").with_id("r")).unwrap();

    outcome(quick).await;
    outcome(failing).await;
    supervisor.stop("s");
    outcome(stopped).await;

    let stats = supervisor.stats();
    assert_eq!(stats.total_jobs, 4);
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.available, 3);
    assert_eq!(stats.total_jobs, stats.succeeded + stats.failed + stats.active as u64);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn subscribers_see_start_and_finish() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(1));
    let mut events = supervisor.subscribe();

    let completion = supervisor.spawn(SpawnRequest::new("quick").with_id("q")).unwrap();
    outcome(completion).await;

    let started = events.recv().await.unwrap();
    assert!(matches!(started, SupervisorEvent::JobStarted { ref id, .. } if id == "q"));
    let finished = events.recv().await.unwrap();
    assert!(matches!(
        finished,
        SupervisorEvent::JobFinished { ref id, state: JobState::Completed, .. } if id == "q"
    ));
}
