// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded capture of worker output

use wd_core::tail_chars;

/// Keeps the most recent `limit` characters of a stream.
///
/// Memory stays within a small multiple of `limit` however much a worker
/// writes; older text is compacted away as new text arrives.
#[derive(Debug, Clone)]
pub struct TailBuffer {
    text: String,
    limit: usize,
    compacted: bool,
}

impl TailBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            limit,
            compacted: false,
        }
    }

    pub fn push(&mut self, chunk: &str) {
        self.text.push_str(chunk);
        if self.text.len() > self.compact_threshold() {
            self.text = tail_chars(&self.text, self.limit).to_string();
            self.compacted = true;
        }
    }

    pub fn push_bytes(&mut self, chunk: &[u8]) {
        self.push(&String::from_utf8_lossy(chunk));
    }

    /// The retained tail, at most `limit` characters
    pub fn contents(&self) -> String {
        tail_chars(&self.text, self.limit).to_string()
    }

    /// True if anything has been dropped
    pub fn truncated(&self) -> bool {
        self.compacted || self.text.chars().count() > self.limit
    }

    // A char is at most 4 bytes, so this never drops text still inside the tail
    fn compact_threshold(&self) -> usize {
        self.limit.saturating_mul(8).max(4096)
    }
}

#[cfg(test)]
#[path = "capture_tests.rs"]
mod tests;
