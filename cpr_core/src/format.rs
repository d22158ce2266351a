//! Clock-style duration formatting.

/// `HH:MM:SS`, negative input shown as zero
pub fn format_clock(total_seconds: i64) -> String {
    let secs = total_seconds.max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// `MM:SS` for countdowns, negative input shown as zero
pub fn format_countdown(total_seconds: i64) -> String {
    let secs = total_seconds.max(0);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
