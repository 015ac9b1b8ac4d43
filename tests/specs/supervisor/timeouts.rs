//! Per-job time budgets and two-phase termination.

use crate::prelude::*;
use std::time::{Duration, Instant};
use wd_core::{FailureKind, JobState};
use wd_engine::{SpawnRequest, SupervisorError};

#[tokio::test]
async fn job_past_its_budget_fails_with_timeout() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(1));
    let pid_path = pid_file(&workers, "late");

    let started = Instant::now();
    let completion = supervisor
        .spawn(
            SpawnRequest::new("sleeper")
                .arg(pid_path.clone())
                .timeout(Duration::from_millis(100)),
        )
        .unwrap();
    let pid = read_pid(&pid_path).await;
    let outcome = outcome(completion).await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(outcome.state, JobState::Failed);
    let failure = outcome.failure.clone().unwrap();
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert!(failure.message.contains("100ms"), "{}", failure.message);
    assert!(matches!(outcome.into_result(), Err(SupervisorError::Timeout(_))));

    assert!(wait_for(|| !process_exists(pid)).await);
    assert!(supervisor.can_admit());
}

#[tokio::test]
async fn worker_ignoring_terminate_is_killed() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(1));
    let pid_path = pid_file(&workers, "stubborn");

    let completion = supervisor
        .spawn(
            SpawnRequest::new("stubborn")
                .arg(pid_path.clone())
                .timeout(Duration::from_millis(200)),
        )
        .unwrap();
    let pid = read_pid(&pid_path).await;
    let outcome = outcome(completion).await;

    assert_eq!(outcome.state, JobState::Failed);
    assert_eq!(outcome.failure.unwrap().kind, FailureKind::Timeout);
    // SIGKILL
    assert_eq!(outcome.exit.and_then(|e| e.signal), Some(9));
    assert!(wait_for(|| !process_exists(pid)).await);
}

#[tokio::test]
async fn budget_is_capped_by_max_timeout() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(wd_core::SupervisorConfig {
        max_timeout: Duration::from_millis(150),
        ..config(1)
    });

    let completion = supervisor
        .spawn(SpawnRequest::new("sleeper").timeout(Duration::from_secs(3600)))
        .unwrap();
    let outcome = outcome(completion).await;

    assert_eq!(outcome.failure.unwrap().kind, FailureKind::Timeout);
}

#[tokio::test]
async fn job_finishing_within_budget_completes() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(1));

    let completion = supervisor
        .spawn(SpawnRequest::new("quick").timeout(Duration::from_secs(5)))
        .unwrap();

    assert_eq!(outcome(completion).await.state, JobState::Completed);
}

#[tokio::test]
async fn default_timing_escalates_past_ignored_terminate() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(scaled_defaults(1, 10));
    let pid_path = pid_file(&workers, "stubborn");

    let completion = supervisor
        .spawn(
            SpawnRequest::new("stubborn")
                .arg(pid_path.clone())
                .timeout(Duration::from_millis(100)),
        )
        .unwrap();
    let pid = read_pid(&pid_path).await;
    let outcome = outcome(completion).await;

    assert_eq!(outcome.failure.unwrap().kind, FailureKind::Timeout);
    assert_eq!(outcome.exit.and_then(|e| e.signal), Some(9));
    assert!(wait_for(|| !process_exists(pid)).await);
}
