//! Worksheet name cleanup.

/// Longest worksheet name Excel accepts, in characters.
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Name used when nothing printable survives sanitization.
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

const INVALID_SHEET_NAME_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Turn arbitrary text (usually a file stem) into a usable worksheet name.
///
/// Removes `[ ] : * ? / \`, trims surrounding whitespace, substitutes
/// [`DEFAULT_SHEET_NAME`] when nothing is left and truncates to
/// [`MAX_SHEET_NAME_LEN`] characters. Whitespace exposed by the truncation is
/// trimmed as well so that sanitizing twice never changes the result.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !INVALID_SHEET_NAME_CHARS.contains(c))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return DEFAULT_SHEET_NAME.to_string();
    }

    if cleaned.chars().count() <= MAX_SHEET_NAME_LEN {
        return cleaned.to_string();
    }
    let truncated: String = cleaned.chars().take(MAX_SHEET_NAME_LEN).collect();
    truncated.trim_end().to_string()
}
