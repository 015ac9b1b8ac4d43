// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor and worker configuration.
//!
//! Both structs have usable defaults and can be overridden from `WARDEN_*`
//! environment variables.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors from loading or validating configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("{field} must be {requirement}")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
    },
}

/// Knobs for admission, timeouts and reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Ceiling on simultaneously running jobs (>= 1)
    pub concurrency_limit: usize,
    /// Upper bound applied to every job's timeout budget
    pub max_timeout: Duration,
    /// Period of the background reconcile sweep
    pub reconcile_interval: Duration,
    /// Age after which reconcile force-removes a job
    pub stale_job_ceiling: Duration,
    /// Delay between SIGTERM and SIGKILL
    pub kill_grace: Duration,
    /// How long `shutdown` waits for terminations to finish
    pub shutdown_timeout: Duration,
    /// Maximum characters kept per job argument
    pub max_arg_len: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 3,
            max_timeout: Duration::from_secs(120),
            reconcile_interval: Duration::from_secs(30),
            stale_job_ceiling: Duration::from_secs(600),
            kill_grace: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(5),
            max_arg_len: 1000,
        }
    }
}

impl SupervisorConfig {
    /// Defaults overridden by `WARDEN_*` variables, then validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            concurrency_limit: env_usize("WARDEN_CONCURRENCY_LIMIT")?
                .unwrap_or(defaults.concurrency_limit),
            max_timeout: env_ms("WARDEN_MAX_TIMEOUT_MS")?.unwrap_or(defaults.max_timeout),
            reconcile_interval: env_ms("WARDEN_RECONCILE_INTERVAL_MS")?
                .unwrap_or(defaults.reconcile_interval),
            stale_job_ceiling: env_ms("WARDEN_STALE_JOB_CEILING_MS")?
                .unwrap_or(defaults.stale_job_ceiling),
            kill_grace: env_ms("WARDEN_KILL_GRACE_MS")?.unwrap_or(defaults.kill_grace),
            shutdown_timeout: env_ms("WARDEN_SHUTDOWN_TIMEOUT_MS")?
                .unwrap_or(defaults.shutdown_timeout),
            max_arg_len: env_usize("WARDEN_MAX_ARG_LEN")?.unwrap_or(defaults.max_arg_len),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency_limit == 0 {
            return Err(out_of_range("concurrency_limit", "at least 1"));
        }
        let positive = [
            ("max_timeout", self.max_timeout),
            ("reconcile_interval", self.reconcile_interval),
            ("stale_job_ceiling", self.stale_job_ceiling),
        ];
        for (field, value) in positive {
            if value.is_zero() {
                return Err(out_of_range(field, "greater than zero"));
            }
        }
        if self.max_arg_len == 0 {
            return Err(out_of_range("max_arg_len", "greater than zero"));
        }
        Ok(())
    }

    /// The caller's budget capped at `max_timeout`; `None` or zero means the cap.
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        match requested {
            Some(budget) if !budget.is_zero() => budget.min(self.max_timeout),
            _ => self.max_timeout,
        }
    }
}

/// Where worker executables live and how much of their output is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Directory holding one executable (or script) per job kind
    pub workers_dir: PathBuf,
    /// Program used to run scripts, e.g. `node`; `None` executes directly
    pub interpreter: Option<PathBuf>,
    /// Extension appended to the kind when locating the file, e.g. `js`
    pub extension: Option<String>,
    /// Characters of ordinary stdout retained
    pub stdout_cap: usize,
    /// Characters of stderr retained for diagnostics
    pub stderr_tail: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            workers_dir: PathBuf::from("workers"),
            interpreter: None,
            extension: None,
            stdout_cap: 64 * 1024,
            stderr_tail: 500,
        }
    }
}

impl WorkerConfig {
    pub fn new(workers_dir: impl Into<PathBuf>) -> Self {
        Self {
            workers_dir: workers_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            workers_dir: std::env::var("WARDEN_WORKERS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.workers_dir),
            interpreter: non_empty_var("WARDEN_INTERPRETER").map(PathBuf::from),
            extension: non_empty_var("WARDEN_WORKER_EXT"),
            stdout_cap: env_usize("WARDEN_STDOUT_CAP")?.unwrap_or(defaults.stdout_cap),
            stderr_tail: env_usize("WARDEN_STDERR_TAIL")?.unwrap_or(defaults.stderr_tail),
        })
    }
}

fn out_of_range(field: &'static str, requirement: &'static str) -> ConfigError {
    ConfigError::OutOfRange { field, requirement }
}

fn non_empty_var(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn env_usize(var: &'static str) -> Result<Option<usize>, ConfigError> {
    match non_empty_var(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
    }
}

fn env_ms(var: &'static str) -> Result<Option<Duration>, ConfigError> {
    match non_empty_var(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(|ms| Some(Duration::from_millis(ms)))
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
