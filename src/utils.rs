//! Utility functions for surge
//!
//! This module contains helper functions for parsing human-readable
//! duration strings and formatting counters for log output.

use std::time::Duration;

use anyhow::{anyhow, Result};

/// Parses a human-readable duration string (e.g., "30s", "500ms", "1.5m") into a Duration
///
/// A bare number is interpreted as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();

    // Find where the numeric part ends
    let numeric_end = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());

    let (num_str, unit) = s.split_at(numeric_end);
    let num: f64 = num_str
        .parse()
        .map_err(|_| anyhow!("Invalid number in duration: {}", s))?;

    let seconds = match unit.trim() {
        "" | "s" | "sec" | "secs" => num,
        "ms" => num / 1000.0,
        "m" | "min" | "mins" => num * 60.0,
        "h" | "hr" | "hrs" => num * 3600.0,
        _ => return Err(anyhow!("Unknown unit in duration: {}", unit)),
    };

    // from_secs_f64 panics on input a Duration cannot hold.
    Duration::try_from_secs_f64(seconds).map_err(|_| anyhow!("Duration out of range: {}", s))
}

/// Formats a duration into a compact human-readable string for logs
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs >= 3600.0 {
        format!("{:.1}h", secs / 3600.0)
    } else if secs >= 60.0 {
        format!("{:.1}m", secs / 60.0)
    } else if secs >= 1.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{}ms", d.as_millis())
    }
}

/// Formats a message count with appropriate units for better readability
pub fn format_count(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}
