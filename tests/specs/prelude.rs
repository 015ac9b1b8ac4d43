//! Test helpers for behavioral specifications.
//!
//! Worker scripts are plain `sh` files run through `/bin/sh`, so no file
//! needs the execute bit.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::future::Future;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tempfile::TempDir;
use wd_adapters::ProcessWorkerAdapter;
use wd_core::{SupervisorConfig, WorkerConfig};
use wd_engine::{JobOutcome, Supervisor};

// Spec polling timeouts
pub const SPEC_POLL_INTERVAL_MS: u64 = 10;
pub const SPEC_WAIT_MAX_MS: u64 = 5000;

pub type RealSupervisor = Supervisor<ProcessWorkerAdapter>;

/// Exits cleanly
pub const QUICK: &str = "exit 0\n";

/// Fails with a diagnostic on stderr
pub const FAILING: &str = "echo 'target unreachable' >&2\nexit 3\n";

/// Runs far longer than any test budget; writes its pid to `$1` when given
pub const SLEEPER: &str = "[ -n \"$1\" ] && echo $$ > \"$1\"\nexec sleep 10\n";

/// Ignores SIGTERM, so only SIGKILL ends it; writes its pid to `$1` when given
pub const STUBBORN: &str =
    "trap '' TERM\n[ -n \"$1\" ] && echo $$ > \"$1\"\nwhile true; do sleep 0.05; done\n";

/// Reports progress and stats on the side channel, prints ordinary output, exits
pub const REPORTER: &str = r#"echo '{"type":"progress","data":{"pct":50}}'
echo 'plain output'
echo '{"type":"stats","data":{"totalRequests":10,"totalErrors":2}}'
echo '{"type":"stats","data":{"totalRequests":5,"totalErrors":0}}'
echo '{"type":"progress","data":{"pct":100}}'
exit 0
"#;

/// Temporary directory of worker scripts
pub struct Workers {
    dir: TempDir,
}

impl Workers {
    /// Directory holding the standard set of scripts
    pub fn standard() -> Self {
        Self::new()
            .script("quick", QUICK)
            .script("failing", FAILING)
            .script("sleeper", SLEEPER)
            .script("stubborn", STUBBORN)
            .script("reporter", REPORTER)
    }

    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn script(self, kind: &str, body: &str) -> Self {
        std::fs::write(self.dir.path().join(format!("{kind}.sh")), body).unwrap();
        self
    }

    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    pub fn config(&self) -> WorkerConfig {
        let mut config = WorkerConfig::new(self.dir.path());
        config.interpreter = Some("/bin/sh".into());
        config.extension = Some("sh".to_string());
        config
    }

    pub fn supervisor(&self, config: SupervisorConfig) -> RealSupervisor {
        Supervisor::with_defaults(config, ProcessWorkerAdapter::new(self.config()))
    }
}

/// Path under the scripts directory where a worker records its pid
pub fn pid_file(workers: &Workers, name: &str) -> String {
    workers.path().join(format!("{name}.pid")).display().to_string()
}

/// Wait for a worker to record its pid
pub async fn read_pid(path: &str) -> u32 {
    let mut pid = None;
    let found = wait_for(|| {
        pid = std::fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse().ok());
        pid.is_some()
    })
    .await;
    assert!(found, "worker never wrote {path}");
    pid.unwrap()
}

/// Supervisor config with a fast kill grace
pub fn config(limit: usize) -> SupervisorConfig {
    SupervisorConfig {
        concurrency_limit: limit,
        kill_grace: Duration::from_millis(300),
        shutdown_timeout: Duration::from_secs(3),
        ..SupervisorConfig::default()
    }
}

/// Default timings divided by `factor`, keeping their ratios
pub fn scaled_defaults(limit: usize, factor: u32) -> SupervisorConfig {
    let defaults = SupervisorConfig::default();
    SupervisorConfig {
        concurrency_limit: limit,
        max_timeout: defaults.max_timeout / factor,
        reconcile_interval: defaults.reconcile_interval / factor,
        stale_job_ceiling: defaults.stale_job_ceiling / factor,
        kill_grace: defaults.kill_grace / factor,
        shutdown_timeout: defaults.shutdown_timeout / factor,
        ..defaults
    }
}

/// Await a job outcome, failing the test if it takes too long
pub async fn outcome(completion: impl Future<Output = JobOutcome>) -> JobOutcome {
    tokio::time::timeout(Duration::from_millis(SPEC_WAIT_MAX_MS), completion)
        .await
        .expect("job did not resolve in time")
}

/// Poll until `condition` holds or the wait budget runs out
pub async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(SPEC_WAIT_MAX_MS);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(SPEC_POLL_INTERVAL_MS)).await;
    }
    condition()
}

/// Whether a process with this pid still exists
pub fn process_exists(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None::<Signal>).is_ok()
}
