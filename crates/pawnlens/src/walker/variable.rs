//
// walker/variable.rs
//
// Global variables, fields, parameters and locals
//

use std::sync::Arc;

use tower_lsp::lsp_types::Range;

use crate::builtins::GLOBAL_IDENTIFIER;
use crate::items::{Item, ItemDetail, VariableScope};
use crate::syntax::{Field, NodeKind, SyntaxNode};

use super::TreeWalker;

fn storage_of(walker: &TreeWalker, node: &SyntaxNode) -> Vec<String> {
    node.children_by_field(Field::Storage)
        .map(|s| walker.text(s).to_string())
        .filter(|s| s != "&")
        .collect()
}

/// One item per declarator of a declaration node (`GlobalVariable`,
/// `EnumStructField`, `StructField`).
fn declarator_items(
    walker: &mut TreeWalker,
    node: &SyntaxNode,
    scope: VariableScope,
    parent: &str,
) -> Vec<Arc<Item>> {
    let type_name = walker.field_string(node, Field::Type);
    let storage = storage_of(walker, node);
    let found = walker.doc(node, true);

    let mut items = Vec::new();
    for declarator in node.children_of_kind(NodeKind::VariableDeclarator) {
        let Some((name, range)) = walker.declare(declarator) else {
            continue;
        };
        items.push(Arc::new(Item {
            name,
            range,
            full_range: walker.range(&declarator.span),
            uri: walker.uri.clone(),
            doc: found.doc.clone(),
            deprecated: found.deprecated.clone(),
            parent: Some(parent.to_string()),
            detail: ItemDetail::Variable {
                type_name: type_name.clone(),
                dimensions: walker.field_string(declarator, Field::Dimensions),
                storage: storage.clone(),
                scope: scope.clone(),
            },
        }));
    }
    items
}

pub(super) fn read_global(walker: &mut TreeWalker, node: &SyntaxNode) {
    let items = declarator_items(walker, node, VariableScope::Global, GLOBAL_IDENTIFIER);
    walker.push_all(items);
}

pub(super) fn field_items(
    walker: &mut TreeWalker,
    node: &SyntaxNode,
    parent: &str,
) -> Vec<Arc<Item>> {
    declarator_items(walker, node, VariableScope::Field, parent)
}

/// Item for a `LocalVariable` or `Parameter` node scoped to `function`.
pub(super) fn local_item(
    walker: &mut TreeWalker,
    node: &SyntaxNode,
    function: &str,
    function_range: Range,
) -> Option<Arc<Item>> {
    if node.field_text(Field::Name, walker.src) == Some("...") {
        return None;
    }
    let (name, range) = walker.declare(node)?;
    Some(Arc::new(Item {
        name,
        range,
        full_range: walker.range(&node.span),
        uri: walker.uri.clone(),
        doc: None,
        deprecated: None,
        parent: Some(function.to_string()),
        detail: ItemDetail::Variable {
            type_name: walker.field_string(node, Field::Type),
            dimensions: walker.field_string(node, Field::Dimensions),
            storage: storage_of(walker, node),
            scope: VariableScope::Local {
                function: function.to_string(),
                function_range,
            },
        },
    }))
}

pub(super) fn body_locals(
    walker: &mut TreeWalker,
    body: &SyntaxNode,
    function: &str,
    function_range: Range,
) -> Vec<Arc<Item>> {
    body.children_of_kind(NodeKind::LocalVariable)
        .filter_map(|local| local_item(walker, local, function, function_range))
        .collect()
}
