//
// position.rs
//
// Position -> items: the lookup behind hover, goto definition and references
//

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tower_lsp::lsp_types::{Position, Range, Url};

use crate::builtins::is_reserved_token;
use crate::cross_file::{path_to_uri, resolve_universe, SearchPaths};
use crate::items::{range_contains, Item, ItemDetail, Usage};
use crate::store::FileItemStore;
use crate::utf16::{byte_offset_to_utf16_column, utf16_column_to_byte_offset};

/// An identifier under the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word<'a> {
    pub text: &'a str,
    pub range: Range,
    /// Byte offset just past the word within its line
    pub end: usize,
}

pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Line `line` of `text`, without its line terminator.
pub fn line_at(text: &str, line: u32) -> Option<&str> {
    text.split('\n')
        .nth(line as usize)
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
}

/// Identifier containing (or ending right before) the cursor.
pub fn word_at(line_text: &str, position: Position) -> Option<Word<'_>> {
    let cursor = utf16_column_to_byte_offset(line_text, position.character);
    let start = line_text[..cursor]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_ident_char(*c))
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(cursor);
    let end = line_text[cursor..]
        .char_indices()
        .find(|(_, c)| !is_ident_char(*c))
        .map(|(idx, _)| cursor + idx)
        .unwrap_or(line_text.len());

    let text = &line_text[start..end];
    if text.is_empty() || text.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some(Word {
        text,
        range: Range::new(
            Position::new(position.line, byte_offset_to_utf16_column(line_text, start)),
            Position::new(position.line, byte_offset_to_utf16_column(line_text, end)),
        ),
        end,
    })
}

fn include_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Groups: 1=angle path, 2=quoted path
        Regex::new(r#"^\s*#\s*(?:try)?include\s+(?:<([A-Za-z0-9\-_/.]+)>|"([^"]+)")"#).unwrap()
    })
}

fn call_suffix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*\(").unwrap())
}

/// Include path on `line_text` when the cursor is on it, delimiters
/// included. Returns the path and the range covering the delimiters.
fn include_under_cursor<'a>(line_text: &'a str, position: Position) -> Option<(&'a str, Range)> {
    let caps = include_pattern().captures(line_text)?;
    let path = caps.get(1).or_else(|| caps.get(2))?;
    let open = path.start() - 1;
    let close = path.end() + 1;
    let cursor = utf16_column_to_byte_offset(line_text, position.character);
    if cursor < open || cursor > close {
        return None;
    }
    let range = Range::new(
        Position::new(position.line, byte_offset_to_utf16_column(line_text, open)),
        Position::new(position.line, byte_offset_to_utf16_column(line_text, close)),
    );
    Some((path.as_str(), range))
}

fn include_item(
    search: &SearchPaths,
    uri: &Url,
    path_text: &str,
    range: Range,
) -> Option<Arc<Item>> {
    let file_path = uri.to_file_path().ok()?;
    let target = search
        .resolve_include(path_text, &file_path)
        .and_then(|path| path_to_uri(&path))?;
    Some(Arc::new(Item {
        name: path_text.to_string(),
        range,
        full_range: range,
        uri: uri.clone(),
        doc: None,
        deprecated: None,
        parent: None,
        detail: ItemDetail::Include { target },
    }))
}

/// Configured main path as a traversal fallback.
pub fn fallback_main(search: &SearchPaths) -> Option<Url> {
    search
        .configured_main_path()
        .and_then(|path| path_to_uri(&path))
}

/// Whether `usage` in `uri` can name `item`, names aside. Member usages
/// (`x.name`) match members, plain usages match everything else, and locals
/// only match inside their own function.
pub fn usage_refers_to(item: &Item, uri: &Url, usage: &Usage) -> bool {
    match item.local_scope() {
        Some(scope) => &item.uri == uri && !usage.member && range_contains(scope, usage.range.start),
        None => usage.member == item.is_member(),
    }
}

/// Items the token at `position` of `uri` can refer to.
///
/// Every candidate is returned; callers pick. A cursor on a declaration
/// yields that declaration. A cursor on a usage yields the visible items of
/// that name accepted by [`usage_refers_to`].
pub fn items_at(
    store: &FileItemStore,
    search: &SearchPaths,
    uri: &Url,
    text: &str,
    position: Position,
) -> Vec<Arc<Item>> {
    let Some(line_text) = line_at(text, position.line) else {
        return Vec::new();
    };

    if let Some((path_text, range)) = include_under_cursor(line_text, position) {
        return include_item(search, uri, path_text, range)
            .into_iter()
            .collect();
    }

    let Some(word) = word_at(line_text, position) else {
        return Vec::new();
    };

    let fallback = fallback_main(search);
    let universe = resolve_universe(store, uri, fallback.as_ref());

    if is_reserved_token(word.text) {
        // `float(x)` is the conversion function; `float x` is a type
        if word.text == "float" && call_suffix_pattern().is_match(&line_text[word.end..]) {
            return universe
                .into_iter()
                .filter(|item| item.name == "float" && item.is_callable())
                .collect();
        }
        return Vec::new();
    }

    let usage = store
        .get(uri)
        .and_then(|set| set.usages_at(word.range).next().cloned());

    let matches: Vec<Arc<Item>> = universe
        .into_iter()
        .filter(|item| item.name == word.text)
        .filter(|item| {
            if &item.uri == uri && item.range == word.range {
                return true;
            }
            usage
                .as_ref()
                .is_some_and(|usage| usage_refers_to(item, uri, usage))
        })
        .collect();
    log::trace!(
        "items_at {}:{}:{} '{}' -> {} items",
        uri,
        position.line,
        position.character,
        word.text,
        matches.len()
    );
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cross_file::{link_includes, IndexConfig};
    use crate::items::ItemKind;
    use crate::walker::parse_file;
    use std::fs;
    use tempfile::TempDir;

    fn uri(name: &str) -> Url {
        Url::parse(&format!("file:///w/{}", name)).unwrap()
    }

    fn index(store: &FileItemStore, uri: &Url, text: &str) {
        store.put(uri.clone(), parse_file(uri, text));
    }

    #[test]
    fn test_word_at_boundaries() {
        let line = "  DoThing(value);";
        let word = word_at(line, Position::new(0, 4)).unwrap();
        assert_eq!(word.text, "DoThing");
        assert_eq!(word.range, Range::new(Position::new(0, 2), Position::new(0, 9)));
        // Just after the word still selects it
        assert_eq!(word_at(line, Position::new(0, 9)).unwrap().text, "DoThing");
        assert_eq!(word_at(line, Position::new(0, 0)), None);
        assert_eq!(word_at("x = 42;", Position::new(0, 5)), None);
    }

    #[test]
    fn test_declaration_and_usage_resolve_to_same_item() {
        let store = FileItemStore::new();
        let a = uri("a.sp");
        let text = "int g_count;\nvoid F()\n{\n    g_count++;\n}\n";
        index(&store, &a, text);
        let search = SearchPaths::default();

        let at_decl = items_at(&store, &search, &a, text, Position::new(0, 6));
        assert_eq!(at_decl.len(), 1);
        assert_eq!(at_decl[0].name, "g_count");

        let at_use = items_at(&store, &search, &a, text, Position::new(3, 6));
        assert_eq!(at_use, at_decl);
    }

    #[test]
    fn test_no_token_is_empty() {
        let store = FileItemStore::new();
        let a = uri("a.sp");
        let text = "int x;\n\n";
        index(&store, &a, text);
        let search = SearchPaths::default();
        assert!(items_at(&store, &search, &a, text, Position::new(1, 0)).is_empty());
        assert!(items_at(&store, &search, &a, text, Position::new(9, 0)).is_empty());
    }

    #[test]
    fn test_usage_across_include() {
        let store = FileItemStore::new();
        let lib = uri("lib.inc");
        index(&store, &lib, "native int Helper(int value);\n");
        let a = uri("a.sp");
        let text = "#include \"lib\"\nvoid F() { Helper(1); }\n";
        let mut set = parse_file(&a, text);
        set.includes.insert(
            "lib".into(),
            crate::items::IncludeRelation {
                uri: lib.clone(),
                range: Range::default(),
            },
        );
        store.put(a.clone(), set);

        let found = items_at(&store, &SearchPaths::default(), &a, text, Position::new(1, 13));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].uri, lib);
        assert_eq!(found[0].kind(), ItemKind::Function);
    }

    #[test]
    fn test_member_usage_matches_member_items() {
        let store = FileItemStore::new();
        let a = uri("a.sp");
        let text = "\
methodmap Timer {
    public native void Kill();
}
native void Kill();
void F(Timer t)
{
    t.Kill();
    Kill();
}
";
        index(&store, &a, text);
        let search = SearchPaths::default();

        let member = items_at(&store, &search, &a, text, Position::new(6, 6));
        assert_eq!(member.len(), 1);
        assert_eq!(member[0].parent.as_deref(), Some("Timer"));

        let plain = items_at(&store, &search, &a, text, Position::new(7, 6));
        assert_eq!(plain.len(), 1);
        assert_eq!(plain[0].range.start.line, 3);
    }

    #[test]
    fn test_locals_only_inside_their_function() {
        let store = FileItemStore::new();
        let a = uri("a.sp");
        let text = "\
void F()
{
    int n = 1;
    n++;
}
void G()
{
    int n;
    n--;
}
";
        index(&store, &a, text);
        let found = items_at(&store, &SearchPaths::default(), &a, text, Position::new(8, 4));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].range.start.line, 7);
    }

    #[test]
    fn test_float_call_vs_type() {
        let store = FileItemStore::new();
        let a = uri("a.sp");
        let text = "native float float(int value);\nvoid F()\n{\n    float x = float(3);\n}\n";
        index(&store, &a, text);
        let search = SearchPaths::default();

        let as_type = items_at(&store, &search, &a, text, Position::new(3, 6));
        assert!(as_type.is_empty());

        let as_call = items_at(&store, &search, &a, text, Position::new(3, 16));
        assert_eq!(as_call.len(), 1);
        assert!(as_call[0].is_callable());
    }

    #[test]
    fn test_include_line_resolves_to_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("include")).unwrap();
        fs::write(root.join("include/foo.inc"), "int foo;\n").unwrap();

        let a = Url::from_file_path(root.join("plugin.sp")).unwrap();
        let text = "#include <foo>\n#include <missing>\n";
        let search = SearchPaths::new(vec![root.to_path_buf()], IndexConfig::default());
        let store = FileItemStore::new();
        let mut set = parse_file(&a, text);
        link_includes(&mut set, &search);
        store.put(a.clone(), set);

        let found = items_at(&store, &search, &a, text, Position::new(0, 11));
        assert_eq!(found.len(), 1);
        let expected = Url::from_file_path(root.join("include/foo.inc")).unwrap();
        assert_eq!(found[0].detail, ItemDetail::Include { target: expected });
        assert_eq!(found[0].range, Range::new(Position::new(0, 9), Position::new(0, 14)));

        // Delimiters count as part of the path
        assert_eq!(items_at(&store, &search, &a, text, Position::new(0, 9)).len(), 1);
        assert!(items_at(&store, &search, &a, text, Position::new(1, 12)).is_empty());
    }

    #[test]
    fn test_reparse_drops_stale_items() {
        let store = FileItemStore::new();
        let a = uri("a.sp");
        let old = "int g_old;\nvoid F() { g_old = 1; }\n";
        index(&store, &a, old);
        assert_eq!(items_at(&store, &SearchPaths::default(), &a, old, Position::new(0, 5)).len(), 1);

        let new = "int g_new;\nvoid F() { g_new = 1; }\n";
        index(&store, &a, new);
        assert!(items_at(&store, &SearchPaths::default(), &a, old, Position::new(0, 5)).is_empty());
        let found = items_at(&store, &SearchPaths::default(), &a, new, Position::new(0, 5));
        assert_eq!(found[0].name, "g_new");
    }
}
