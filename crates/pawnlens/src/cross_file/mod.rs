//
// cross_file/mod.rs
//
// Include-graph awareness: search paths, main-path directives, traversal
//

pub mod config;
pub mod directive;
pub mod file_cache;
pub mod path_resolve;
pub mod universe;

#[cfg(test)]
mod property_tests;

pub use config::*;
pub use directive::*;
pub use file_cache::*;
pub use path_resolve::*;
pub use universe::*;

use crate::items::{FileItemSet, IncludeRelation};

/// Resolve the include directives and main-path directive of `set` against
/// the search paths, replacing any earlier edges.
///
/// Unresolved includes get no edge. When two directives name the same text
/// the first one keeps the edge. Files that are not on disk (untitled
/// buffers) have no directory to search from and get no edges.
pub fn link_includes(set: &mut FileItemSet, search: &SearchPaths) {
    set.includes.clear();
    set.main_uri = None;

    let Ok(file_path) = set.uri.to_file_path() else {
        log::trace!("Not linking includes of non-file URI {}", set.uri);
        return;
    };

    for directive in &set.directives {
        if set.includes.contains_key(&directive.text) {
            continue;
        }
        let Some(uri) = search
            .resolve_include(&directive.text, &file_path)
            .and_then(|path| path_to_uri(&path))
        else {
            continue;
        };
        set.includes.insert(
            directive.text.clone(),
            IncludeRelation {
                uri,
                range: directive.range,
            },
        );
    }

    set.main_uri = set
        .main_path
        .as_deref()
        .and_then(|raw| resolve_main_path(raw, &file_path))
        .and_then(|path| path_to_uri(&path));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::parse_file;
    use std::fs;
    use tempfile::TempDir;
    use tower_lsp::lsp_types::Url;

    #[test]
    fn test_link_includes_resolves_both_forms() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("include")).unwrap();
        fs::write(root.join("include/util.inc"), "").unwrap();
        fs::write(root.join("local.inc"), "").unwrap();

        let main = root.join("main.sp");
        let uri = Url::from_file_path(&main).unwrap();
        let src = "#include <util>\n#include \"local.inc\"\n#tryinclude <absent>\n#include <util>\n";
        let mut set = parse_file(&uri, src);
        link_includes(&mut set, &SearchPaths::new(vec![root.to_path_buf()], IndexConfig::default()));

        assert_eq!(set.directives.len(), 4);
        assert_eq!(set.includes.len(), 2);
        let util = &set.includes["util"];
        assert_eq!(util.uri, Url::from_file_path(root.join("include/util.inc")).unwrap());
        // First directive keeps the edge
        assert_eq!(util.range.start.line, 0);
        assert!(set.includes.contains_key("local.inc"));
        assert!(!set.includes.contains_key("absent"));
    }

    #[test]
    fn test_link_includes_resolves_main_path() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let file = root.join("include/part.inc");
        let uri = Url::from_file_path(&file).unwrap();
        let mut set = parse_file(&uri, "// @lsp-included-by: ../plugin.sp\nint x;\n");
        link_includes(&mut set, &SearchPaths::default());
        assert_eq!(
            set.main_uri,
            Some(Url::from_file_path(root.join("plugin.sp")).unwrap())
        );
    }

    #[test]
    fn test_relink_replaces_edges() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("a.inc"), "").unwrap();
        let uri = Url::from_file_path(root.join("main.sp")).unwrap();
        let mut set = parse_file(&uri, "#include \"a\"\n");
        let search = SearchPaths::new(vec![root.to_path_buf()], IndexConfig::default());
        link_includes(&mut set, &search);
        assert_eq!(set.includes.len(), 1);

        fs::remove_file(root.join("a.inc")).unwrap();
        link_includes(&mut set, &search);
        assert!(set.includes.is_empty());
    }

    #[test]
    fn test_non_file_uri_gets_no_edges() {
        let uri = Url::parse("untitled:Untitled-1").unwrap();
        let mut set = parse_file(&uri, "#include <sourcemod>\n// @lsp-main: x.sp\n");
        link_includes(&mut set, &SearchPaths::default());
        assert!(set.includes.is_empty());
        assert!(set.main_uri.is_none());
        assert_eq!(set.main_path.as_deref(), Some("x.sp"));
    }
}
