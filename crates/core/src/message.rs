// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structured messages a worker reports over its side channel.
//!
//! Workers print one JSON object per line on stdout:
//!
//! ```text
//! {"type":"progress","data":{"percent":40}}
//! {"type":"stats","data":{"totalRequests":120,"totalErrors":3}}
//! ```
//!
//! Lines that do not decode into a [`WorkerMessage`] are ordinary output.

use serde::{Deserialize, Deserializer, Serialize};

/// Message kinds a worker may send while running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// Opaque progress payload; only the latest value is kept.
    Progress(serde_json::Value),
    /// Counters to add to the supervisor totals.
    Stats(WorkerStats),
}

impl WorkerMessage {
    /// Decode one stdout line, returning `None` for ordinary output.
    pub fn decode(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        serde_json::from_str(line).ok()
    }

    /// Encode as a single line, the inverse of [`WorkerMessage::decode`].
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Request and error counts reported by a worker.
///
/// Each report is a delta; the supervisor accumulates them. Workers may
/// send any JSON number: fractions truncate, negatives count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStats {
    #[serde(default, deserialize_with = "count")]
    pub total_requests: u64,
    #[serde(default, deserialize_with = "count")]
    pub total_errors: u64,
}

fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(n) = number.as_u64() {
        return Ok(n);
    }
    // `as` saturates for out-of-range floats
    Ok(match number.as_f64() {
        Some(value) if value > 0.0 => value as u64,
        _ => 0,
    })
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
