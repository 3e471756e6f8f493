//! Dynamic placeholder substitution for a descriptor's `systemPrompt`.
//!
//! The `{{DATE}}`..`{{DATETIME}}` family is resolved at load time against
//! current wall-clock time — restarting the process re-samples "today", by
//! design (see the store's parse pipeline). `{{TOOLS}}` is resolved
//! separately, at execution time, by the executor.

use chrono::{DateTime, Utc};

/// Substitute the `{{DATE}}`, `{{YEAR}}`, `{{MONTH}}`, `{{DAY}}`, `{{TIME}}`,
/// and `{{DATETIME}}` placeholders in `input` against `now`.
pub fn substitute_datetime_placeholders(input: &str, now: DateTime<Utc>) -> String {
    input
        .replace("{{DATETIME}}", &now.format("%Y-%m-%d %H:%M:%S").to_string())
        .replace("{{DATE}}", &now.format("%Y-%m-%d").to_string())
        .replace("{{YEAR}}", &now.format("%Y").to_string())
        .replace("{{MONTH}}", &now.format("%m").to_string())
        .replace("{{DAY}}", &now.format("%d").to_string())
        .replace("{{TIME}}", &now.format("%H:%M:%S").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn substitutes_all_placeholders() {
        let now = Utc.with_ymd_and_hms(2026, 3, 5, 14, 30, 0).unwrap();
        let rendered = substitute_datetime_placeholders(
            "{{DATE}} {{YEAR}}-{{MONTH}}-{{DAY}} {{TIME}} / {{DATETIME}}",
            now,
        );
        assert_eq!(rendered, "2026-03-05 2026-03-05 14:30:00 / 2026-03-05 14:30:00");
    }

    #[test]
    fn leaves_unrelated_text_untouched() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            substitute_datetime_placeholders("no placeholders here", now),
            "no placeholders here"
        );
    }
}
