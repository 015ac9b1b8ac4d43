// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the supervisor

use thiserror::Error;
use wd_adapters::WorkerError;

/// Errors returned by supervisor operations and failed job outcomes
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("no worker for kind: {0}")]
    NotFound(String),
    #[error("concurrency limit reached: {limit} jobs running")]
    ResourceExhausted { limit: usize },
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("process error: {0}")]
    ProcessError(String),
    #[error("worker failure: {0}")]
    WorkerFailure(String),
    #[error("job already running: {0}")]
    DuplicateId(String),
    #[error("supervisor is shutting down")]
    ShuttingDown,
}

impl From<WorkerError> for SupervisorError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::NotFound(kind) => SupervisorError::NotFound(kind),
            other => SupervisorError::ProcessError(other.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
