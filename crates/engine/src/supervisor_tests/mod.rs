// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor tests

mod admission;
mod lifecycle;
mod messages;
mod reconcile;
mod shutdown;
mod timeout;

use super::*;
use crate::{JobOutcome, SupervisorError};
use wd_adapters::{FakeWorkerAdapter, StopSignal, WorkerExit};
use wd_core::{FailureKind, FakeClock, JobState, SequentialIdGen, WorkerMessage, WorkerStats};

type TestSupervisor = Supervisor<FakeWorkerAdapter, FakeClock, SequentialIdGen>;

/// Test context holding the supervisor and its fakes
struct TestContext {
    supervisor: TestSupervisor,
    workers: FakeWorkerAdapter,
    clock: FakeClock,
}

impl TestContext {
    fn spawn(&self, id: &str) -> JobCompletion {
        self.supervisor
            .spawn(SpawnRequest::new("ping").with_id(id))
            .unwrap()
    }

    fn active_ids(&self) -> Vec<String> {
        self.supervisor
            .list_active()
            .into_iter()
            .map(|job| job.id.to_string())
            .collect()
    }
}

fn config(limit: usize) -> SupervisorConfig {
    SupervisorConfig {
        concurrency_limit: limit,
        ..SupervisorConfig::default()
    }
}

fn setup_with(config: SupervisorConfig) -> TestContext {
    let workers = FakeWorkerAdapter::with_kinds(&["ping", "sleeper"]);
    let clock = FakeClock::new();
    let supervisor = Supervisor::new(
        config,
        workers.clone(),
        clock.clone(),
        SequentialIdGen::default(),
    );
    TestContext {
        supervisor,
        workers,
        clock,
    }
}

fn setup() -> TestContext {
    setup_with(config(3))
}

/// Receive events until one matches, skipping the rest
async fn next_matching(
    rx: &mut broadcast::Receiver<SupervisorEvent>,
    pred: impl Fn(&SupervisorEvent) -> bool,
) -> SupervisorEvent {
    loop {
        let event = rx.recv().await.unwrap();
        if pred(&event) {
            return event;
        }
    }
}

fn failure_kind(outcome: &JobOutcome) -> Option<FailureKind> {
    outcome.failure.as_ref().map(|f| f.kind)
}
