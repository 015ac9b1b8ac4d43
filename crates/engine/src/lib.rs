// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Warden job supervisor

mod error;
mod outcome;
mod supervisor;
mod termination;

pub use error::SupervisorError;
pub use outcome::{JobCompletion, JobOutcome};
pub use supervisor::{ReconcileReport, SpawnRequest, Supervisor};
pub use termination::{Termination, TerminationPhase};
