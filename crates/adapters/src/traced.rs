// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrapper for consistent observability

use crate::worker::{
    StopSignal, WorkerAdapter, WorkerCommand, WorkerError, WorkerEvent, WorkerHandle,
    WorkerKindInfo, WorkerSpawnConfig,
};
use async_trait::async_trait;
use tokio::sync::mpsc;
use wd_core::JobKind;

/// Wrapper that adds tracing to any WorkerAdapter
#[derive(Clone)]
pub struct TracedWorkers<W> {
    inner: W,
}

impl<W> TracedWorkers<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }
}

#[async_trait]
impl<W: WorkerAdapter> WorkerAdapter for TracedWorkers<W> {
    fn resolve(&self, kind: &JobKind) -> Result<WorkerCommand, WorkerError> {
        let result = self.inner.resolve(kind);
        if let Err(ref e) = result {
            tracing::debug!(%kind, error = %e, "resolve failed");
        }
        result
    }

    fn kinds(&self) -> Vec<WorkerKindInfo> {
        self.inner.kinds()
    }

    fn spawn(
        &self,
        config: WorkerSpawnConfig,
        event_tx: mpsc::Sender<WorkerEvent>,
    ) -> Result<WorkerHandle, WorkerError> {
        let span = tracing::info_span!("worker.spawn", job_id = %config.job_id, kind = %config.kind);
        let _guard = span.enter();
        tracing::info!(arg_count = config.args.len(), "starting");
        let start = std::time::Instant::now();
        let result = self.inner.spawn(config, event_tx);
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(h) => tracing::info!(pid = ?h.pid, elapsed_ms, "worker spawned"),
            Err(e) => tracing::error!(elapsed_ms, error = %e, "spawn failed"),
        }
        result
    }

    async fn signal(&self, handle: &WorkerHandle, signal: StopSignal) -> Result<(), WorkerError> {
        let result = self.inner.signal(handle, signal).await;
        tracing::info_span!("worker.signal", job_id = %handle.job_id, ?signal).in_scope(
            || match &result {
                Ok(()) => tracing::info!(pid = ?handle.pid, "signalled"),
                Err(e) => tracing::warn!(error = %e, "signal failed (may be expected)"),
            },
        );
        result
    }

    async fn is_alive(&self, handle: &WorkerHandle) -> Result<bool, WorkerError> {
        let result = self.inner.is_alive(handle).await;
        tracing::trace!(job_id = %handle.job_id, alive = ?result.as_ref().ok(), "checked");
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
