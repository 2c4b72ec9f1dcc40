//
// walker/methodmap.rs
//
// Methodmaps: constructors, methods, natives and properties
//

use std::sync::Arc;

use indexmap::IndexMap;

use crate::items::{FunctionFlavor, Item, ItemDetail};
use crate::syntax::{Field, NodeKind, SyntaxNode};

use super::enums::collect_members;
use super::{function, variable, TreeWalker};

pub(super) fn read_methodmap(walker: &mut TreeWalker, node: &SyntaxNode) {
    let Some((name, range)) = walker.declare(node) else {
        return;
    };
    let found = walker.doc(node, false);
    let inherits = walker.field_string(node, Field::Inherits);
    let nullable = node
        .children_by_field(Field::Storage)
        .any(|s| walker.text(s) == "__nullable__");

    let mut members = IndexMap::new();
    let mut flat = Vec::new();
    for child in &node.children {
        let emitted = match child.kind {
            NodeKind::MethodmapMethod | NodeKind::MethodmapNative => {
                let flavor = if child.field_text(Field::Name, walker.src) == Some(name.as_str()) {
                    FunctionFlavor::Constructor
                } else {
                    FunctionFlavor::Method
                };
                function::build_function(walker, child, Some(&name), flavor).unwrap_or_default()
            }
            NodeKind::MethodmapProperty => read_property(walker, child, &name),
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
        detail: ItemDetail::Methodmap {
            inherits,
            nullable,
            members,
        },
    });
    walker.push_all(flat);
}

/// Property item followed by locals declared in accessor bodies.
fn read_property(walker: &mut TreeWalker, node: &SyntaxNode, parent: &str) -> Vec<Arc<Item>> {
    let Some((name, range)) = walker.declare(node) else {
        return Vec::new();
    };
    let found = walker.doc(node, false);
    let accessors: Vec<&SyntaxNode> = node.children_of_kind(NodeKind::PropertyAccessor).collect();
    let has = |which: &str| {
        accessors
            .iter()
            .any(|a| a.field_text(Field::Name, walker.src) == Some(which))
    };
    let getter = has("get");
    let setter = has("set");

    let mut items = vec![Arc::new(Item {
        name: name.clone(),
        range,
        full_range: walker.range(&node.span),
        uri: walker.uri.clone(),
        doc: found.doc,
        deprecated: found.deprecated,
        parent: Some(parent.to_string()),
        detail: ItemDetail::Property {
            type_name: walker.field_string(node, Field::Type).unwrap_or_default(),
            getter,
            setter,
        },
    })];

    for accessor in accessors {
        let accessor_range = walker.range(&accessor.span);
        if let Some(params) = accessor.child_by_field(Field::Parameters) {
            if accessor.child_by_field(Field::Body).is_some() {
                for param in params.children_of_kind(NodeKind::Parameter) {
                    items.extend(variable::local_item(walker, param, &name, accessor_range));
                }
            }
        }
        if let Some(body) = accessor.child_by_field(Field::Body) {
            items.extend(variable::body_locals(walker, body, &name, accessor_range));
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use tower_lsp::lsp_types::Url;

    use crate::items::ItemDetail;
    use crate::walker::parse_file;

    #[test]
    fn test_nullable_methodmap_and_property_accessors() {
        let uri = Url::parse("file:///w/a.inc").unwrap();
        let src = "\
methodmap Handle __nullable__ {
    public native void Close();
    property bool Valid {
        public get() { bool ok = true; return ok; }
        public set(bool value) { }
    }
};
";
        let set = parse_file(&uri, src);
        match &set.items[0].detail {
            ItemDetail::Methodmap {
                nullable,
                inherits,
                members,
            } => {
                assert!(*nullable);
                assert!(inherits.is_none());
                assert_eq!(members.keys().collect::<Vec<_>>(), vec!["Close", "Valid"]);
            }
            other => panic!("unexpected detail {:?}", other),
        }
        let valid = set.items.iter().find(|i| i.name == "Valid").unwrap();
        match &valid.detail {
            ItemDetail::Property {
                type_name,
                getter,
                setter,
            } => {
                assert_eq!(type_name, "bool");
                assert!(*getter && *setter);
            }
            other => panic!("unexpected detail {:?}", other),
        }
        let names: Vec<_> = set.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Handle", "Close", "Valid", "ok", "value"]);
    }
}
