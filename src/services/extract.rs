//! Conversation Text Extraction
//!
//! Deterministic helpers applied at conversation-insert time: fenced code
//! blocks and file-path references. No model calls here.

use regex::Regex;
use std::sync::OnceLock;

use crate::models::conversation::CodeSnippet;

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```([A-Za-z0-9_+\-]*)\r?\n(.*?)```").expect("valid fence regex")
    })
}

fn path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Dotted path whose final segment carries a short extension.
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9_][A-Za-z0-9_./\-]*\.[A-Za-z][A-Za-z0-9]{0,5}\b")
            .expect("valid path regex")
    })
}

/// Extract each maximal fenced code block as `{language, text, line_count}`.
pub fn extract_code_snippets(text: &str) -> Vec<CodeSnippet> {
    fence_regex()
        .captures_iter(text)
        .map(|capture| {
            let language = capture.get(1).map(|m| m.as_str()).unwrap_or_default();
            let body = capture
                .get(2)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .trim_end_matches('\n');
            CodeSnippet {
                language: if language.is_empty() {
                    None
                } else {
                    Some(language.to_string())
                },
                text: body.to_string(),
                line_count: body.lines().count(),
            }
        })
        .collect()
}

/// Extract deduplicated file references occurring outside code fences.
/// Absolute URLs are excluded.
pub fn extract_file_references(text: &str) -> Vec<String> {
    let stripped = fence_regex().replace_all(text, " ");

    let mut seen = std::collections::HashSet::new();
    let mut references = Vec::new();
    for word in stripped.split_whitespace() {
        if word.contains("://") {
            continue;
        }
        for token in path_regex().find_iter(word) {
            let token_str = token.as_str();
            if seen.insert(token_str.to_string()) {
                references.push(token_str.to_string());
            }
        }
    }
    references
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_extraction() {
        let text = "Here you go:\n```python\ndef f():\n    return 1\n```\ndone";
        let snippets = extract_code_snippets(text);
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].language.as_deref(), Some("python"));
        assert_eq!(snippets[0].line_count, 2);
        assert!(snippets[0].text.contains("def f()"));
    }

    #[test]
    fn test_snippet_without_language_tag() {
        let text = "```\nplain\n```";
        let snippets = extract_code_snippets(text);
        assert_eq!(snippets.len(), 1);
        assert!(snippets[0].language.is_none());
        assert_eq!(snippets[0].line_count, 1);
    }

    #[test]
    fn test_multiple_snippets() {
        let text = "```rust\nfn a() {}\n```\nand\n```js\nconst b = 1;\n```";
        assert_eq!(extract_code_snippets(text).len(), 2);
    }

    #[test]
    fn test_file_reference_extraction() {
        let text = "I updated auth/token.py and src/main.rs for you.";
        let references = extract_file_references(text);
        assert_eq!(references, vec!["auth/token.py", "src/main.rs"]);
    }

    #[test]
    fn test_references_deduplicated() {
        let text = "auth/token.py then auth/token.py again";
        assert_eq!(extract_file_references(text).len(), 1);
    }

    #[test]
    fn test_references_inside_fences_excluded() {
        let text = "```python\nimport utils.helpers\nopen('data.csv')\n```\nSee notes.md";
        let references = extract_file_references(text);
        assert_eq!(references, vec!["notes.md"]);
    }

    #[test]
    fn test_urls_excluded() {
        let text = "Docs at https://docs.example.com/guide.html and code in app/views.py";
        let references = extract_file_references(text);
        assert_eq!(references, vec!["app/views.py"]);
    }

    #[test]
    fn test_long_extension_rejected() {
        let text = "the variable some.identifier123456 is not a file, but web/app.tsx is";
        let references = extract_file_references(text);
        assert_eq!(references, vec!["web/app.tsx"]);
    }
}
