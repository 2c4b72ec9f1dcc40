//
// cross_file/universe.rs
//
// Include graph traversal: the set of items visible from a file
//

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tower_lsp::lsp_types::{Range, Url};

use crate::items::{range_contains, Item, ItemKind};
use crate::store::FileItemStore;

/// Traversal entry for `start`.
///
/// A file that names a main path (or, failing that, the configured
/// `fallback`) is resolved from that file instead. Redirects chain until a
/// file names none, names one already seen, or names one missing from the
/// store.
pub fn main_entry(store: &FileItemStore, start: &Url, fallback: Option<&Url>) -> Url {
    let mut seen = IndexSet::new();
    let mut current = start.clone();
    seen.insert(current.clone());

    loop {
        let declared = store.get(&current).and_then(|set| set.main_uri.clone());
        let Some(target) = declared.or_else(|| fallback.cloned()) else {
            break;
        };
        if seen.contains(&target) {
            break;
        }
        if !store.contains(&target) {
            log::trace!("Main path {} of {} is not indexed; ignoring", target, current);
            break;
        }
        log::trace!("Redirecting resolution of {} to main path {}", current, target);
        seen.insert(target.clone());
        current = target;
    }
    current
}

/// Pre-order walk from `root` into `visited`. Uses an explicit stack so long
/// include chains cannot exhaust the thread stack; includes are pushed in
/// reverse to keep declaration order.
fn visit(store: &FileItemStore, root: &Url, visited: &mut IndexSet<Url>) {
    let mut stack = vec![root.clone()];
    while let Some(uri) = stack.pop() {
        if !visited.insert(uri.clone()) {
            continue;
        }
        let Some(set) = store.get(&uri) else {
            continue;
        };
        stack.extend(
            set.includes
                .values()
                .rev()
                .map(|relation| relation.uri.clone())
                .filter(|target| !visited.contains(target)),
        );
    }
}

/// Files visible from `start`, in pre-order. The main entry comes first; the
/// start file itself is always part of the result, traversed last when the
/// entry does not reach it.
///
/// Include targets that are not in the store are listed but contribute no
/// edges.
pub fn reachable_files(store: &FileItemStore, start: &Url, fallback: Option<&Url>) -> Vec<Url> {
    let entry = main_entry(store, start, fallback);
    let mut visited = IndexSet::new();
    visit(store, &entry, &mut visited);
    if !visited.contains(start) {
        visit(store, start, &mut visited);
    }
    visited.into_iter().collect()
}

/// Every item visible from `start`: the items of each reachable file, files
/// in traversal order and items in source order. No file contributes twice.
pub fn resolve_universe(
    store: &FileItemStore,
    start: &Url,
    fallback: Option<&Url>,
) -> Vec<Arc<Item>> {
    let mut items = Vec::new();
    for uri in reachable_files(store, start, fallback) {
        if let Some(set) = store.get(&uri) {
            items.extend(set.items.iter().cloned());
        }
    }
    items
}

/// Define name -> replacement text over the reachable files. A file visited
/// later overrides an earlier value.
pub fn resolve_defines(
    store: &FileItemStore,
    start: &Url,
    fallback: Option<&Url>,
) -> IndexMap<String, String> {
    let mut defines = IndexMap::new();
    for uri in reachable_files(store, start, fallback) {
        if let Some(set) = store.get(&uri) {
            for (name, value) in &set.defines {
                defines.insert(name.clone(), value.clone());
            }
        }
    }
    defines
}

/// Methodmaps in `items` by name; the first declaration wins.
pub fn methodmaps_in(items: &[Arc<Item>]) -> IndexMap<String, Arc<Item>> {
    let mut methodmaps = IndexMap::new();
    for item in items.iter().filter(|i| i.kind() == ItemKind::Methodmap) {
        methodmaps
            .entry(item.name.clone())
            .or_insert_with(|| Arc::clone(item));
    }
    methodmaps
}

pub fn resolve_methodmaps(
    store: &FileItemStore,
    start: &Url,
    fallback: Option<&Url>,
) -> IndexMap<String, Arc<Item>> {
    methodmaps_in(&resolve_universe(store, start, fallback))
}

/// `name` followed by its ancestors, nearest first. Stops at an unknown
/// parent or on a cycle.
pub fn inheritance_chain(methodmaps: &IndexMap<String, Arc<Item>>, name: &str) -> Vec<Arc<Item>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut next = Some(name.to_string());

    while let Some(current) = next.take() {
        if !seen.insert(current.clone()) {
            log::trace!("Methodmap inheritance cycle at {}", current);
            break;
        }
        let Some(item) = methodmaps.get(&current) else {
            break;
        };
        if let crate::items::ItemDetail::Methodmap { inherits, .. } = &item.detail {
            next = inherits.clone();
        }
        chain.push(Arc::clone(item));
    }
    chain
}

/// Places in stored files that refer to `item`: usages with the same name in
/// files that can see the item's file.
///
/// Member items only match `receiver.name` usages and other items only
/// plain ones. Locals and parameters only match inside their function.
pub fn back_references(
    store: &FileItemStore,
    item: &Item,
    fallback: Option<&Url>,
) -> Vec<(Url, Range)> {
    let mut uris = store.uris();
    uris.sort();

    let mut found = Vec::new();
    for uri in uris {
        if let Some(scope) = item.local_scope() {
            if uri != item.uri {
                continue;
            }
            if let Some(set) = store.get(&uri) {
                found.extend(
                    set.usages
                        .iter()
                        .filter(|u| !u.member && u.name == item.name)
                        .filter(|u| range_contains(scope, u.range.start))
                        .map(|u| (uri.clone(), u.range)),
                );
            }
            continue;
        }

        if !reachable_files(store, &uri, fallback).contains(&item.uri) {
            continue;
        }
        let Some(set) = store.get(&uri) else {
            continue;
        };
        let member = item.is_member();
        found.extend(
            set.usages
                .iter()
                .filter(|u| u.member == member && u.name == item.name)
                .map(|u| (uri.clone(), u.range)),
        );
    }
    found
}
