/// Longest keyword accepted for substring search, in characters.
pub const MAX_KEYWORD_CHARS: usize = 30;

/// Turn user input into a literal fragment for a `LIKE '%…%'` pattern.
///
/// Trims and truncates to [`MAX_KEYWORD_CHARS`], then escapes `\`, `%` and `_`
/// so user input can never act as a wildcard. Returns `None` when nothing is left
/// to search for.
pub fn sanitize_like_keyword(input: &str) -> Option<String> {
    let trimmed: String = input.trim().chars().take(MAX_KEYWORD_CHARS).collect();
    if trimmed.is_empty() {
        return None;
    }

    let mut escaped = String::with_capacity(trimmed.len() + 4);
    for c in trimmed.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    Some(escaped)
}

/// Wrap a sanitised keyword as a contains-pattern.
pub fn contains_pattern(keyword: &str) -> String {
    format!("%{keyword}%")
}
