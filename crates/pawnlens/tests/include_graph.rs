//! Include graph behavior through `WorldState` on a real directory tree.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use tower_lsp::lsp_types::{
    GotoDefinitionResponse, Location, Position, Range, TextDocumentContentChangeEvent, Url,
};

use pawnlens::cross_file::reachable_files;
use pawnlens::handlers;
use pawnlens::state::WorldState;

fn write(dir: &Path, name: &str, text: &str) -> Url {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    Url::from_file_path(&path).unwrap()
}

const MAIN: &str = "#include \"b\"
#include \"c\"

public void OnPluginStart()
{
    Shared(1);
}
";

struct Diamond {
    _dir: TempDir,
    state: WorldState,
    main: Url,
    b: Url,
    c: Url,
    d: Url,
}

fn diamond() -> Diamond {
    let dir = TempDir::new().unwrap();
    let b = write(dir.path(), "b.inc", "#include \"d\"\nstock int FromB() { return 0; }\n");
    let c = write(dir.path(), "c.inc", "#include \"d\"\nstock int FromC() { return 0; }\n");
    let d = write(dir.path(), "d.inc", "stock int Shared(int x)\n{\n    return x;\n}\n");
    let main = write(dir.path(), "main.sp", MAIN);

    let mut state = WorldState::new();
    state.add_workspace_folder(Url::from_file_path(dir.path()).unwrap());
    state.open_document(main.clone(), MAIN, Some(1));
    let indexed = state.index_missing_includes(&main);
    assert_eq!(indexed, 3);

    Diamond {
        _dir: dir,
        state,
        main,
        b,
        c,
        d,
    }
}

#[test]
fn test_diamond_is_visited_depth_first_once() {
    let w = diamond();
    let files = reachable_files(&w.state.store, &w.main, None);
    assert_eq!(files, vec![w.main.clone(), w.b.clone(), w.d.clone(), w.c.clone()]);
}

#[test]
fn test_usage_resolves_to_declaration_in_shared_include() {
    let w = diamond();
    let items = w.state.items_at(&w.main, Position::new(5, 6));
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Shared");
    assert_eq!(items[0].uri, w.d);

    let refs = handlers::references(&w.state, &w.d, Position::new(0, 12), true).unwrap();
    assert_eq!(
        refs,
        vec![
            Location::new(w.d.clone(), items[0].range),
            Location::new(
                w.main.clone(),
                Range::new(Position::new(5, 4), Position::new(5, 10))
            ),
        ]
    );
}

#[test]
fn test_include_line_goes_to_target_file() {
    let w = diamond();
    let response = handlers::goto_definition(&w.state, &w.main, Position::new(1, 10)).unwrap();
    match response {
        GotoDefinitionResponse::Scalar(location) => {
            assert_eq!(location, Location::new(w.c.clone(), Range::default()));
        }
        other => panic!("expected a single location, got {:?}", other),
    }
}

#[test]
fn test_edit_drops_stale_items() {
    let mut w = diamond();
    assert!(!w.state.items_at(&w.main, Position::new(3, 14)).is_empty());

    w.state.apply_change(
        &w.main,
        TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: "#include \"b\"\n\npublic void OnMapStart()\n{\n}\n".to_string(),
        },
    );

    let set = w.state.store.get(&w.main).unwrap();
    assert!(set.items.iter().all(|i| i.name != "OnPluginStart"));
    assert!(set.items.iter().any(|i| i.name == "OnMapStart"));
    // c.inc is no longer reachable
    let files = reachable_files(&w.state.store, &w.main, None);
    assert_eq!(files, vec![w.main.clone(), w.b.clone(), w.d.clone()]);
}

#[test]
fn test_include_cycle_terminates() {
    let dir = TempDir::new().unwrap();
    let x_text = "#include \"y\"\nint g_x;\n";
    let x = write(dir.path(), "x.sp", x_text);
    let y = write(dir.path(), "y.inc", "#include \"x.sp\"\nint g_y;\n");

    let mut state = WorldState::new();
    state.open_document(x.clone(), x_text, None);
    state.index_missing_includes(&x);

    assert_eq!(reachable_files(&state.store, &x, None), vec![x.clone(), y.clone()]);
    assert_eq!(reachable_files(&state.store, &y, None), vec![y.clone(), x.clone()]);

    let names: Vec<String> = pawnlens::cross_file::resolve_universe(&state.store, &x, None)
        .iter()
        .map(|i| i.name.clone())
        .collect();
    assert_eq!(names, vec!["g_x", "g_y"]);
}

#[test]
fn test_included_by_directive_redirects_to_main_file() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("include")).unwrap();
    let main_text = "#include \"helpers\"\nint g_main;\n";
    let main = write(dir.path(), "main.sp", main_text);
    let helpers_text = "// @lsp-included-by: ../main.sp\nstock void Help() { g_main = 1; }\n";
    let helpers = write(&dir.path().join("include"), "helpers.inc", helpers_text);

    let mut state = WorldState::new();
    state.open_document(helpers.clone(), helpers_text, None);
    state.index_missing_includes(&helpers);

    assert_eq!(reachable_files(&state.store, &helpers, None), vec![main.clone(), helpers.clone()]);
    let items = state.items_at(&helpers, Position::new(1, 22));
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].uri, main);
}
