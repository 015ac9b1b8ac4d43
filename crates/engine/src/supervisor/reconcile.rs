// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic sweep for vanished and overrunning jobs

use super::Supervisor;
use crate::outcome::Cause;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use wd_adapters::WorkerAdapter;
use wd_core::{Clock, IdGen};

/// What one reconcile pass found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Running jobs examined
    pub checked: usize,
    /// Jobs whose process was gone without an exit report
    pub vanished: usize,
    /// Jobs removed for exceeding the staleness ceiling
    pub stale: usize,
    /// Liveness queries that failed (entry skipped this pass)
    pub errors: usize,
}

impl ReconcileReport {
    pub fn reaped(&self) -> usize {
        self.vanished + self.stale
    }
}

impl<W, C, G> Supervisor<W, C, G>
where
    W: WorkerAdapter,
    C: Clock,
    G: IdGen,
{
    /// Remove jobs whose process has died or that have outlived the
    /// staleness ceiling.
    ///
    /// Liveness is queried outside the table lock; a job that resolves in the
    /// meantime is left alone.
    pub async fn reconcile(&self) -> ReconcileReport {
        let now = self.inner.clock.now();
        let ceiling = self.inner.config.stale_job_ceiling;
        let snapshot: Vec<_> = {
            let table = self.inner.table.lock();
            table
                .jobs
                .iter()
                .map(|(id, entry)| {
                    (
                        id.clone(),
                        entry.token,
                        entry.handle.clone(),
                        now.saturating_duration_since(entry.started_at),
                    )
                })
                .collect()
        };

        let mut report = ReconcileReport::default();
        for (id, token, handle, age) in snapshot {
            report.checked += 1;
            if age >= ceiling {
                if self.retire(id.as_str(), Some(token), Cause::Stale(age)) {
                    tracing::warn!(job_id = %id, age_ms = age.as_millis() as u64, "reaped stale job");
                    report.stale += 1;
                }
                continue;
            }
            match self.inner.adapter.is_alive(&handle).await {
                Ok(true) => {}
                Ok(false) => {
                    if self.retire(id.as_str(), Some(token), Cause::Vanished) {
                        tracing::warn!(job_id = %id, "reaped job whose process vanished");
                        report.vanished += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(job_id = %id, error = %e, "liveness check failed, skipping");
                    report.errors += 1;
                }
            }
        }

        if report.reaped() > 0 {
            tracing::info!(
                checked = report.checked,
                vanished = report.vanished,
                stale = report.stale,
                "reconcile reaped jobs"
            );
        }
        report
    }

    /// Run `reconcile` every `reconcile_interval` until shutdown.
    ///
    /// Calling it again while the loop is running has no effect.
    pub fn start_reconciler(&self) {
        let mut slot = self.inner.reconciler.lock();
        if slot.is_some() || self.is_shutting_down() {
            return;
        }
        let period = self.inner.config.reconcile_interval;
        let weak = Arc::downgrade(&self.inner);
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                Supervisor { inner }.reconcile().await;
            }
        }));
        tracing::debug!(interval_ms = period.as_millis() as u64, "reconciler started");
    }
}
