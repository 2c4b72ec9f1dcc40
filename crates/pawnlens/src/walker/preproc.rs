//
// walker/preproc.rs
//
// Preprocessor directives: includes, defines and macros
//

use crate::items::{IncludeDirective, Item, ItemDetail};
use crate::syntax::{Field, SyntaxNode};

use super::TreeWalker;

pub(super) fn read_include(walker: &mut TreeWalker, node: &SyntaxNode) {
    let Some(path) = node.child_by_field(Field::Path) else {
        return;
    };
    let head = walker.text(node).trim_start_matches('#').trim_start();
    let angle = path
        .span
        .start
        .checked_sub(1)
        .map(|open| walker.src.as_bytes()[open] == b'<')
        .unwrap_or(false);
    walker.set.directives.push(IncludeDirective {
        text: walker.text(path).to_string(),
        range: walker.range(&path.span),
        angle,
        tryinclude: head.starts_with("tryinclude"),
    });
}

pub(super) fn read_define(walker: &mut TreeWalker, node: &SyntaxNode) {
    let Some((name, range)) = walker.declare(node) else {
        return;
    };
    let value = walker.field_string(node, Field::Value).unwrap_or_default();
    let found = walker.doc(node, true);
    walker.set.defines.insert(name.clone(), value.clone());
    walker.push(Item {
        name,
        range,
        full_range: walker.range(&node.span),
        uri: walker.uri.clone(),
        doc: found.doc,
        deprecated: found.deprecated,
        parent: None,
        detail: ItemDetail::Define { value },
    });
}

pub(super) fn read_macro(walker: &mut TreeWalker, node: &SyntaxNode) {
    let Some((name, range)) = walker.declare(node) else {
        return;
    };
    let params = walker.field_string(node, Field::Parameters).unwrap_or_default();
    let value = walker.field_string(node, Field::Value).unwrap_or_default();
    let found = walker.doc(node, false);
    walker.set.defines.insert(name.clone(), value.clone());
    walker.push(Item {
        name,
        range,
        full_range: walker.range(&node.span),
        uri: walker.uri.clone(),
        doc: found.doc,
        deprecated: found.deprecated,
        parent: None,
        detail: ItemDetail::Macro { params, value },
    });
}
