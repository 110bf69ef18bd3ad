//! Utility module for common functionality
//!
//! This module provides common utility functions used across the SDK.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

/// Truncate a string to a maximum number of characters, adding ellipsis if truncated
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

static SENSITIVE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"Bearer [A-Za-z0-9\-_\.]+", "Bearer [REDACTED]"),
        (r"(?i)api[_-]?key[=:]\s*[A-Za-z0-9\-_\.]+", "apikey=[REDACTED]"),
        (r"(?i)token[=:]\s*[^\s&]+", "token=[REDACTED]"),
        (r"(?i)secret[=:]\s*[^\s&]+", "secret=[REDACTED]"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Sanitize a string for logging (remove sensitive data patterns)
pub fn sanitize_for_logging(s: &str) -> String {
    let mut result = s.to_string();
    for (re, replacement) in SENSITIVE_PATTERNS.iter() {
        result = re.replace_all(&result, *replacement).to_string();
    }
    result
}

/// Generate the 8 character request ID sent with every analysis call
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Parse a duration from a string (e.g., "30s", "5m", "1h", "2000ms")
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim().to_lowercase();

    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim().parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else if let Some(hours) = s.strip_suffix('h') {
        hours.trim().parse::<u64>().ok().map(|h| Duration::from_secs(h * 3600))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
