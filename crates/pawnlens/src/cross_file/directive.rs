//
// cross_file/directive.rs
//
// Main-path directive parsing
//
// A file that is only ever compiled as part of another one can name that
// file in a comment, e.g. `// @lsp-included-by: ../plugin.sp`. Symbol
// resolution then starts from the named file.
//

use regex::Regex;
use std::sync::OnceLock;

/// Extract path from capture groups (double-quoted, single-quoted, or unquoted)
fn capture_path(caps: &regex::Captures, base_group: usize) -> Option<String> {
    (base_group..base_group + 3)
        .filter_map(|group| caps.get(group))
        .map(|m| m.as_str())
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn main_path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Groups: 1=double-quoted, 2=single-quoted, 3=unquoted
        Regex::new(
            r#"^(?://+|/\*+)\s*@?lsp-(?:included-by|main-path|main)(?:\s*:\s*|\s+)(?:"([^"]+)"|'([^']+)'|([^\s"'*:][^\s"'*]*))"#,
        )
        .unwrap()
    })
}

/// Path named by a main-path directive comment, if `comment` is one.
pub fn parse_main_path(comment: &str) -> Option<String> {
    let caps = main_path_pattern().captures(comment.trim_start())?;
    let path = capture_path(&caps, 1)?;
    log::trace!("Parsed main-path directive: path='{}'", path);
    Some(path)
}
