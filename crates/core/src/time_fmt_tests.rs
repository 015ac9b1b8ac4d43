// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::format_duration_ms;

#[yare::parameterized(
    zero             = { 0,          "0s" },
    sub_second       = { 999,        "0s" },
    seconds          = { 42_000,     "42s" },
    one_minute       = { 60_000,     "1m 0s" },
    minute_seconds   = { 187_000,    "3m 7s" },
    one_hour         = { 3_600_000,  "1h 0m" },
    hours_minutes    = { 8_100_000,  "2h 15m" },
    past_a_day       = { 90_000_000, "25h 0m" },
)]
fn duration(ms: u64, expected: &str) {
    assert_eq!(format_duration_ms(ms), expected);
}
