//! Unified Diff Generation
//!
//! Renders a unified textual diff between two byte snapshots of a file.
//! Non-decodable content yields the literal `[binary file]` marker instead
//! of a diff.

use similar::{ChangeTag, TextDiff};

/// Marker emitted for content that does not decode as UTF-8.
pub const BINARY_MARKER: &str = "[binary file]";

/// Context lines either side of each hunk.
const CONTEXT_LINES: usize = 3;

/// Diff two byte snapshots of the file at `path`.
///
/// Either side failing UTF-8 decoding short-circuits to [`BINARY_MARKER`].
pub fn diff_bytes(old: &[u8], new: &[u8], path: &str) -> String {
    match (std::str::from_utf8(old), std::str::from_utf8(new)) {
        (Ok(old_text), Ok(new_text)) => unified_diff(old_text, new_text, path),
        _ => BINARY_MARKER.to_string(),
    }
}

/// Generate unified diff format between two strings.
pub fn unified_diff(old_content: &str, new_content: &str, path: &str) -> String {
    let diff = TextDiff::from_lines(old_content, new_content);

    let mut output = format!("--- a/{}\n+++ b/{}\n", path, path);

    for (idx, group) in diff.grouped_ops(CONTEXT_LINES).iter().enumerate() {
        if idx > 0 {
            output.push('\n');
        }

        // Hunk header covering the whole group
        let (old_start, old_count, new_start, new_count) = group.iter().fold(
            (usize::MAX, 0usize, usize::MAX, 0usize),
            |(os, oc, ns, nc), op| {
                let old_range = op.old_range();
                let new_range = op.new_range();
                (
                    os.min(old_range.start),
                    oc + old_range.len(),
                    ns.min(new_range.start),
                    nc + new_range.len(),
                )
            },
        );

        output.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            old_start + 1,
            old_count,
            new_start + 1,
            new_count
        ));

        for op in group {
            for change in diff.iter_changes(op) {
                let prefix = match change.tag() {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => " ",
                };

                output.push_str(prefix);
                output.push_str(change.value());
                if !change.value().ends_with('\n') {
                    output.push('\n');
                }
            }
        }
    }

    output
}
