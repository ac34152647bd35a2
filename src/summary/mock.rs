//! Deterministic local summary used when no external model is configured.

/// Marker placed in front of every local summary.
pub const MOCK_SUMMARY_PREFIX: &str = "MOCK SUMMARY: ";
/// Longest body kept verbatim.
pub const MOCK_SUMMARY_MAX_CHARS: usize = 300;
/// Characters kept before backing up to a word boundary.
const MOCK_SUMMARY_CUT_CHARS: usize = 297;
const ELLIPSIS: &str = "...";

/// Characters treated as line boundaries, in addition to `\r\n` pairs.
const fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Build the local fallback summary for `text`.
///
/// Line breaks collapse to single spaces. Bodies longer than
/// [`MOCK_SUMMARY_MAX_CHARS`] are cut to 297 characters, backed up to the
/// last space and suffixed with `...`. Lengths are counted in characters.
#[must_use]
pub fn mock_summary(text: &str) -> String {
    let joined = text
        .trim_matches(|c: char| c.is_whitespace() || is_line_break(c))
        .replace("\r\n", "\n")
        .split(is_line_break)
        .collect::<Vec<_>>()
        .join(" ");

    let body = if joined.chars().count() > MOCK_SUMMARY_MAX_CHARS {
        let head: String = joined.chars().take(MOCK_SUMMARY_CUT_CHARS).collect();
        let cut = head.rfind(' ').map_or(head.as_str(), |idx| &head[..idx]);
        format!("{cut}{ELLIPSIS}")
    } else {
        joined
    };

    format!("{MOCK_SUMMARY_PREFIX}{body}")
}

/// Upper bound on the length, in characters, of any [`mock_summary`] output.
#[must_use]
pub const fn mock_summary_max_len() -> usize {
    MOCK_SUMMARY_PREFIX.len() + MOCK_SUMMARY_CUT_CHARS + ELLIPSIS.len()
}
