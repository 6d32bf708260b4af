//! String formatting utilities for log and audit output.

use chrono::Duration;

/// Truncates an identifier for display purposes.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
pub fn truncate_id(id: &str) -> String {
	match id.char_indices().nth(8) {
		Some((idx, _)) => format!("{}..", &id[..idx]),
		None => id.to_string(),
	}
}

/// Formats a duration as hours and minutes, e.g. `1h 05m`.
///
/// Negative durations are rendered with a leading minus sign.
pub fn format_duration(duration: Duration) -> String {
	let sign = if duration < Duration::zero() { "-" } else { "" };
	let total_minutes = duration.num_minutes().abs();
	format!("{}{}h {:02}m", sign, total_minutes / 60, total_minutes % 60)
}
