// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control protocol for the daemon socket.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

use serde::{Deserialize, Serialize};
use wd_adapters::WorkerKindInfo;
use wd_core::{JobSummary, SupervisorStats};
use wd_engine::ReconcileReport;

#[path = "protocol_wire.rs"]
mod wire;
pub use wire::{
    call, decode_payload, encode_frame, read_request, recv, send, write_response, ProtocolError,
    DEFAULT_TIMEOUT, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};

/// Request from a client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Start a job
    Spawn {
        /// Caller-chosen id; generated when absent
        #[serde(default)]
        id: Option<String>,
        kind: String,
        #[serde(default)]
        args: Vec<String>,
        /// Requested budget in milliseconds, capped by the daemon
        #[serde(default)]
        timeout_ms: Option<u64>,
    },

    /// Stop one running job
    Stop { id: String },

    /// Stop every running job
    StopAll,

    /// Running jobs in start order
    ListActive,

    /// One running job
    Get { id: String },

    /// Aggregate counters
    Stats,

    /// Worker kinds that can be started
    Kinds,

    /// Run a reconcile pass now
    Reconcile,

    /// Request daemon shutdown
    Shutdown,
}

/// Response from daemon to client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,

    /// Ping response
    Pong,

    /// Version handshake response
    Hello { version: String },

    /// Job admitted and running
    Spawned { id: String },

    /// Result of a stop; false when the id was not running
    Stopped { stopped: bool },

    /// Number of jobs stopped by `StopAll`
    StoppedAll { count: usize },

    Jobs { jobs: Vec<JobSummary> },

    Job { job: Option<Box<JobSummary>> },

    Stats { stats: SupervisorStats },

    Kinds { kinds: Vec<WorkerKindInfo> },

    Reconciled { report: ReconcileReport },

    /// Shutdown acknowledged
    ShuttingDown,

    /// Request failed
    Error { message: String },
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
