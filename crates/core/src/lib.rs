// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wd-core: shared types for the warden job supervisor

pub mod clock;
pub mod config;
pub mod event;
pub mod id;
pub mod job;
pub mod message;
pub mod stats;
pub mod time_fmt;

pub use clock::{Clock, SystemClock};
pub use config::{ConfigError, SupervisorConfig, WorkerConfig};
pub use event::SupervisorEvent;
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use job::{
    tail_chars, truncate_chars, FailureKind, JobFailure, JobId, JobKind, JobState, JobSummary,
};
pub use message::{WorkerMessage, WorkerStats};
pub use stats::SupervisorStats;
pub use time_fmt::format_duration_ms;

#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
