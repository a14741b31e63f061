//! Filename sanitization shared by both storage backends

/// Name used when nothing usable survives sanitization
pub const DEFAULT_FILENAME: &str = "storybook.pdf";

pub const MAX_FILENAME_CHARS: usize = 120;

/// Reduce a suggested name to a single safe path component.
///
/// Only the final component is kept, anything outside `[A-Za-z0-9._-]`
/// becomes `_`, and leading dots are removed so the result can never be
/// hidden or refer to a parent directory.
pub fn sanitize_filename(name: &str) -> String {
    let last = name
        .trim()
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let mapped: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let capped: String = mapped
        .trim_start_matches('.')
        .chars()
        .take(MAX_FILENAME_CHARS)
        .collect();

    if capped.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        capped
    }
}
