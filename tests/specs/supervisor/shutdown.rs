//! Graceful shutdown of every running job.

use crate::prelude::*;
use std::time::Duration;
use wd_core::JobState;
use wd_engine::{SpawnRequest, SupervisorError};

#[tokio::test]
async fn shutdown_stops_all_jobs_and_reaps_processes() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(3));

    let mut completions = Vec::new();
    let mut pids = Vec::new();
    for n in 0..3 {
        let pid_path = pid_file(&workers, &format!("job-{n}"));
        completions.push(
            supervisor
                .spawn(SpawnRequest::new("sleeper").arg(pid_path.clone()))
                .unwrap(),
        );
        pids.push(read_pid(&pid_path).await);
    }

    tokio::time::timeout(Duration::from_secs(5), supervisor.shutdown())
        .await
        .unwrap();

    assert!(supervisor.list_active().is_empty());
    for completion in completions {
        assert_eq!(outcome(completion).await.state, JobState::Stopped);
    }
    for pid in pids {
        assert!(!process_exists(pid), "process {pid} outlived shutdown");
    }

    // Idempotent
    supervisor.shutdown().await;
    let stats = supervisor.stats();
    assert_eq!(stats.total_jobs, 3);
    assert_eq!(stats.succeeded, 3);
}

#[tokio::test]
async fn shutdown_escalates_for_stubborn_workers() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(1));
    let pid_path = pid_file(&workers, "stubborn");

    let completion = supervisor
        .spawn(SpawnRequest::new("stubborn").arg(pid_path.clone()))
        .unwrap();
    let pid = read_pid(&pid_path).await;

    supervisor.shutdown().await;

    assert_eq!(outcome(completion).await.state, JobState::Stopped);
    assert!(!process_exists(pid));
}

#[tokio::test]
async fn spawn_after_shutdown_is_refused() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(1));

    supervisor.shutdown().await;
    let err = supervisor.spawn(SpawnRequest::new("quick")).unwrap_err();

    assert_eq!(err, SupervisorError::ShuttingDown);
}

#[tokio::test]
async fn shutdown_with_default_timing_kills_stubborn_workers() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(scaled_defaults(2, 10));
    let mut pids = Vec::new();
    for n in 0..2 {
        let pid_path = pid_file(&workers, &format!("stubborn-{n}"));
        supervisor
            .spawn(SpawnRequest::new("stubborn").arg(pid_path.clone()))
            .unwrap();
        pids.push(read_pid(&pid_path).await);
    }

    let started = std::time::Instant::now();
    supervisor.shutdown().await;
    assert!(started.elapsed() < Duration::from_secs(2));

    for pid in pids {
        assert!(
            wait_for(|| !process_exists(pid)).await,
            "stubborn worker {pid} survived shutdown"
        );
    }
}
