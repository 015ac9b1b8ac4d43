// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for worker processes

pub mod traced;
pub mod worker;

pub use traced::TracedWorkers;
pub use worker::{
    ProcessWorkerAdapter, StopSignal, WorkerAdapter, WorkerCommand, WorkerError, WorkerEvent,
    WorkerExit, WorkerHandle, WorkerKindInfo, WorkerSpawnConfig,
};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use worker::{FakeWorkerAdapter, WorkerCall};
