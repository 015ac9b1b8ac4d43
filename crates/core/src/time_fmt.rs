// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-readable job durations.

/// Format milliseconds as `"42s"`, `"3m 7s"` or `"2h 15m"`.
///
/// Only the two most significant units are shown; sub-second remainders are
/// dropped.
pub fn format_duration_ms(ms: u64) -> String {
    let secs = ms / 1000;
    let mins = secs / 60;
    let hours = mins / 60;
    if hours > 0 {
        format!("{}h {}m", hours, mins % 60)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
