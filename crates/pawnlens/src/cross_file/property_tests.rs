//
// cross_file/property_tests.rs
//
// Property-based tests for include graph traversal and path handling
//

#![cfg(test)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use proptest::prelude::*;
use tower_lsp::lsp_types::{Range, Url};

use super::path_resolve::{include_file_name, normalize_path};
use super::universe::{reachable_files, resolve_universe};
use crate::items::IncludeRelation;
use crate::store::FileItemStore;
use crate::walker::parse_file;

// ============================================================================
// Generators
// ============================================================================

fn file_uri(index: usize) -> Url {
    Url::parse(&format!("file:///w/f{}.inc", index)).unwrap()
}

/// A graph of `n` files as (n, edges); cycles and self-edges allowed.
fn include_graph() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (1usize..8).prop_flat_map(|n| {
        let edges = prop::collection::vec((0..n, 0..n), 0..16);
        (Just(n), edges)
    })
}

/// Store one file per node, each declaring `int v<i>;`.
fn build_store(n: usize, edges: &[(usize, usize)]) -> FileItemStore {
    let store = FileItemStore::new();
    for i in 0..n {
        let uri = file_uri(i);
        let mut set = parse_file(&uri, &format!("int v{};", i));
        for to in edges.iter().filter(|(from, _)| *from == i).map(|(_, to)| to) {
            set.includes.insert(
                format!("f{}", to),
                IncludeRelation {
                    uri: file_uri(*to),
                    range: Range::default(),
                },
            );
        }
        store.put(uri, set);
    }
    store
}

/// Plain reachability over the edge list, for comparison.
fn reachable(n: usize, edges: &[(usize, usize)], start: usize) -> HashSet<usize> {
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if node >= n || !seen.insert(node) {
            continue;
        }
        for (from, to) in edges {
            if *from == node {
                stack.push(*to);
            }
        }
    }
    seen
}

// ============================================================================
// Property: every reachable file contributes its items exactly once
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_universe_is_reachable_set_without_duplicates((n, edges) in include_graph()) {
        let store = build_store(n, &edges);
        let universe = resolve_universe(&store, &file_uri(0), None);

        let names: Vec<String> = universe.iter().map(|i| i.name.clone()).collect();
        let unique: HashSet<&String> = names.iter().collect();
        prop_assert_eq!(unique.len(), names.len());

        let expected: HashSet<String> = reachable(n, &edges, 0)
            .into_iter()
            .map(|i| format!("v{}", i))
            .collect();
        let actual: HashSet<String> = names.into_iter().collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn prop_universe_is_idempotent((n, edges) in include_graph()) {
        let store = build_store(n, &edges);
        let first = resolve_universe(&store, &file_uri(0), None);
        let second = resolve_universe(&store, &file_uri(0), None);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_start_file_comes_first((n, edges) in include_graph()) {
        let store = build_store(n, &edges);
        let files = reachable_files(&store, &file_uri(0), None);
        prop_assert_eq!(files.first(), Some(&file_uri(0)));
    }
}

// ============================================================================
// Property: path helpers
// ============================================================================

fn path_component() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_]{0,10}"
}

proptest! {
    #[test]
    fn prop_normalize_removes_dot_segments(
        parts in prop::collection::vec(path_component(), 1..5),
        extra in path_component(),
    ) {
        let mut noisy = PathBuf::from("/");
        for part in &parts {
            noisy.push(part);
            noisy.push(".");
        }
        noisy.push(&extra);
        noisy.push("..");

        let mut clean = PathBuf::from("/");
        for part in &parts {
            clean.push(part);
        }
        prop_assert_eq!(normalize_path(&noisy), Some(clean));
    }

    #[test]
    fn prop_include_file_name_has_known_extension(name in path_component()) {
        let file = include_file_name(&name);
        prop_assert!(file.ends_with(".inc"));
        prop_assert_eq!(include_file_name(&file), file.clone());
        prop_assert!(Path::new(&file).extension().is_some());
    }
}
