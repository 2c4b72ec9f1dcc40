//
// walker/enums.rs
//
// Enums, enum members and enum structs
//

use std::sync::Arc;

use indexmap::IndexMap;

use crate::items::{FunctionFlavor, Item, ItemDetail};
use crate::syntax::{Field, NodeKind, SyntaxNode};

use super::{function, variable, TreeWalker};

pub(super) fn read_enum(walker: &mut TreeWalker, node: &SyntaxNode) {
    let found = walker.doc(node, false);
    let declared = walker.declare(node);

    // Anonymous enums only contribute their members.
    let parent = declared.as_ref().map(|(name, _)| name.clone());
    if let Some((name, range)) = declared {
        walker.push(Item {
            name,
            range,
            full_range: walker.range(&node.span),
            uri: walker.uri.clone(),
            doc: found.doc,
            deprecated: found.deprecated,
            parent: None,
            detail: ItemDetail::Enum,
        });
    }

    for entry in node.children_of_kind(NodeKind::EnumEntry) {
        let Some((name, range)) = walker.declare(entry) else {
            continue;
        };
        let found = walker.doc(entry, true);
        walker.push(Item {
            name,
            range,
            full_range: walker.range(&entry.span),
            uri: walker.uri.clone(),
            doc: found.doc,
            deprecated: found.deprecated,
            parent: parent.clone(),
            detail: ItemDetail::EnumMember {
                value: walker.field_string(entry, Field::Value),
            },
        });
    }
}

pub(super) fn read_enum_struct(walker: &mut TreeWalker, node: &SyntaxNode) {
    let Some((name, range)) = walker.declare(node) else {
        return;
    };
    let found = walker.doc(node, false);

    let mut members = IndexMap::new();
    let mut flat = Vec::new();
    for child in &node.children {
        let emitted = match child.kind {
            NodeKind::EnumStructField => variable::field_items(walker, child, &name),
            NodeKind::EnumStructMethod => {
                function::build_function(walker, child, Some(&name), FunctionFlavor::Method)
                    .unwrap_or_default()
            }
            _ => continue,
        };
        collect_members(&mut members, &mut flat, emitted);
    }

    walker.push(Item {
        name,
        range,
        full_range: walker.range(&node.span),
        uri: walker.uri.clone(),
        doc: found.doc,
        deprecated: found.deprecated,
        parent: None,
        detail: ItemDetail::EnumStruct { members },
    });
    walker.push_all(flat);
}

/// Register the member items of `emitted` (everything but locals) and keep
/// all of them for the flat list.
pub(super) fn collect_members(
    members: &mut IndexMap<String, Arc<Item>>,
    flat: &mut Vec<Arc<Item>>,
    emitted: Vec<Arc<Item>>,
) {
    for item in emitted {
        if item.local_scope().is_none() {
            members
                .entry(item.name.clone())
                .or_insert_with(|| Arc::clone(&item));
        }
        flat.push(item);
    }
}
