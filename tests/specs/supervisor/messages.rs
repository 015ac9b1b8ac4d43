//! Side-channel messages reported on worker stdout.

use crate::prelude::*;
use wd_core::JobState;
use wd_engine::SpawnRequest;

#[tokio::test]
async fn stats_accumulate_and_plain_output_is_captured() {
    let workers = Workers::standard();
    let supervisor = workers.supervisor(config(1));

    let completion = supervisor.spawn(SpawnRequest::new("reporter")).unwrap();
    let outcome = outcome(completion).await;

    assert_eq!(outcome.state, JobState::Completed);
    let stats = supervisor.stats();
    assert_eq!(stats.total_requests, 15);
    assert_eq!(stats.total_errors, 2);

    let stdout = outcome.exit.unwrap().stdout;
    assert!(stdout.contains("plain output"));
    assert!(!stdout.contains("totalRequests"));
}

#[tokio::test]
async fn latest_progress_is_visible_while_running() {
    let workers = Workers::new().script(
        "slow_reporter",
        "echo '{\"type\":\"progress\",\"data\":{\"pct\":10}}'\n\
         echo '{\"type\":\"progress\",\"data\":{\"pct\":60}}'\n\
         exec sleep 10\n",
    );
    let supervisor = workers.supervisor(config(1));

    supervisor.spawn(SpawnRequest::new("slow_reporter").with_id("p")).unwrap();

    let expected = serde_json::json!({"pct": 60});
    assert!(
        wait_for(|| {
            supervisor
                .get("p")
                .and_then(|job| job.last_progress)
                .is_some_and(|progress| progress == expected)
        })
        .await
    );

    supervisor.shutdown().await;
}

#[tokio::test]
async fn malformed_json_counts_as_plain_output() {
    let workers = Workers::new().script("noisy", "echo '{not json'\nexit 0\n");
    let supervisor = workers.supervisor(config(1));

    let completion = supervisor.spawn(SpawnRequest::new("noisy")).unwrap();
    let outcome = outcome(completion).await;

    assert_eq!(outcome.state, JobState::Completed);
    assert!(outcome.exit.unwrap().stdout.contains("{not json"));
    assert_eq!(supervisor.stats().total_requests, 0);
}
