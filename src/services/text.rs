//! Text Helpers
//!
//! Character-safe truncation used when assembling analysis prompts and
//! event digests.

/// Truncate to at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Truncate to at most `max` characters, noting how much was dropped.
pub fn trim_marked(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    format!(
        "{}... [truncated {} chars]",
        truncate_chars(text, max),
        count - max
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_multibyte_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("ab", 10), "ab");
    }

    #[test]
    fn test_trim_marked() {
        assert_eq!(trim_marked("short", 10), "short");
        assert_eq!(trim_marked("abcdef", 4), "abcd... [truncated 2 chars]");
    }
}
