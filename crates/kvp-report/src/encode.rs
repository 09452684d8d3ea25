//! Field joining, sanitation, and truncation.

use crate::MAX_REPORT_BYTES;
use std::borrow::Cow;
use tracing::debug;

/// Separator between report fields.
pub const FIELD_SEPARATOR: char = ',';

/// Quote used for fields that contain the separator or the quote itself.
pub const QUOTE_CHAR: char = '\'';

/// Join `field=value` lines into one bounded report.
///
/// Lines are sanitized, quoted only when needed, joined in the order given,
/// and the result is cut to [`MAX_REPORT_BYTES`].
pub fn encode_lines<I, S>(lines: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut report = String::new();
    for (i, line) in lines.into_iter().enumerate() {
        if i > 0 {
            report.push(FIELD_SEPARATOR);
        }
        let clean = sanitize(line.as_ref());
        report.push_str(&quote_field(&clean));
    }

    let truncated = truncate_report(&report, MAX_REPORT_BYTES);
    if truncated.len() < report.len() {
        debug!(
            original = report.len(),
            kept = truncated.len(),
            "Truncated provisioning report"
        );
    }
    truncated.to_string()
}

/// Replace every character outside printable ASCII with `?`.
pub fn sanitize(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_printable) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(
        text.chars()
            .map(|ch| if is_printable(ch) { ch } else { '?' })
            .collect(),
    )
}

/// Longest prefix of `report` no larger than `max_bytes`, cut on a char
/// boundary.
pub fn truncate_report(report: &str, max_bytes: usize) -> &str {
    if report.len() <= max_bytes {
        return report;
    }
    let mut end = max_bytes;
    while !report.is_char_boundary(end) {
        end -= 1;
    }
    &report[..end]
}

fn is_printable(ch: char) -> bool {
    (' '..='~').contains(&ch)
}

fn quote_field(field: &str) -> Cow<'_, str> {
    if !field.contains(FIELD_SEPARATOR) && !field.contains(QUOTE_CHAR) {
        return Cow::Borrowed(field);
    }
    let doubled = field.replace(QUOTE_CHAR, "''");
    Cow::Owned(format!("{QUOTE_CHAR}{doubled}{QUOTE_CHAR}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_lines_preserves_order() {
        let report = encode_lines(["result=success", "agent=Cloud-Init/1.0", "vm_id=foo"]);
        assert_eq!(report, "result=success,agent=Cloud-Init/1.0,vm_id=foo");
    }

    #[test]
    fn test_encode_lines_empty() {
        assert_eq!(encode_lines(Vec::<String>::new()), "");
    }

    #[test]
    fn test_field_with_separator_is_quoted() {
        let report = encode_lines(["reason=a, b", "kind=x"]);
        assert_eq!(report, "'reason=a, b',kind=x");
    }

    #[test]
    fn test_field_with_quote_is_escaped() {
        let report = encode_lines(["reason=can't"]);
        assert_eq!(report, "'reason=can''t'");
    }

    #[test]
    fn test_sanitize_replaces_non_printable() {
        assert_eq!(sanitize("caf\u{e9}\n"), "caf??");
        assert!(matches!(sanitize("plain text"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_truncate_keeps_prefix() {
        let report = "a".repeat(MAX_REPORT_BYTES + 10);
        let truncated = truncate_report(&report, MAX_REPORT_BYTES);
        assert_eq!(truncated.len(), MAX_REPORT_BYTES);
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // 'é' is two bytes in UTF-8; a cut at 2 would split it.
        assert_eq!(truncate_report("a\u{e9}b", 2), "a");
    }

    #[test]
    fn test_encode_lines_is_bounded() {
        let long = format!("reason={}", "x".repeat(5000));
        let report = encode_lines(["result=error", long.as_str(), "kind=k"]);
        assert_eq!(report.len(), MAX_REPORT_BYTES);
        assert!(report.starts_with("result=error,reason=xxx"));
    }
}
