// src/utils/format.rs

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Display form used in test history, e.g. `Jan 5, 2024 3:07pm`.
pub fn format_date_time(at: &DateTime<Utc>) -> String {
    at.format("%b %-d, %Y %-I:%M%P").to_string()
}

/// Download name for a topic's document: lower-case, runs of anything
/// outside `[a-z0-9]` collapsed to `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let cleaned = NON_ALNUM.replace_all(&lowered, "_");
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_date_time() {
        let afternoon = Utc.with_ymd_and_hms(2024, 1, 5, 15, 7, 0).unwrap();
        assert_eq!(format_date_time(&afternoon), "Jan 5, 2024 3:07pm");

        let midnight = Utc.with_ymd_and_hms(2024, 12, 25, 0, 30, 0).unwrap();
        assert_eq!(format_date_time(&midnight), "Dec 25, 2024 12:30am");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Newton's Laws: Part 1"), "newton_s_laws_part_1");
        assert_eq!(sanitize_file_name("***"), "document");
    }
}
