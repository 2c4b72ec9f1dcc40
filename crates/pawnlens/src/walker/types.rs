//
// walker/types.rs
//
// Typedefs, typesets and structs
//

use indexmap::IndexMap;

use crate::items::{Item, ItemDetail, Parameter};
use crate::syntax::{Field, NodeKind, SyntaxNode};

use super::enums::collect_members;
use super::function::read_parameters;
use super::{variable, TreeWalker};

fn signature_of(walker: &TreeWalker, signature: &SyntaxNode) -> (Option<String>, Vec<Parameter>) {
    let return_type = walker.field_string(signature, Field::Type);
    let params = signature
        .child_by_field(Field::Parameters)
        .map(|p| read_parameters(walker, p))
        .unwrap_or_default();
    (return_type, params)
}

pub(super) fn read_typedef(walker: &mut TreeWalker, node: &SyntaxNode) {
    let Some((name, range)) = walker.declare(node) else {
        return;
    };
    let found = walker.doc(node, false);
    let (return_type, params) = node
        .child_by_field(Field::Value)
        .map(|sig| signature_of(walker, sig))
        .unwrap_or_default();
    walker.push(Item {
        name,
        range,
        full_range: walker.range(&node.span),
        uri: walker.uri.clone(),
        doc: found.doc,
        deprecated: found.deprecated,
        parent: None,
        detail: ItemDetail::Typedef {
            return_type,
            params,
        },
    });
}

pub(super) fn read_typeset(walker: &mut TreeWalker, node: &SyntaxNode) {
    let Some((name, range)) = walker.declare(node) else {
        return;
    };
    let found = walker.doc(node, false);
    let signatures = node
        .children_of_kind(NodeKind::FunctionSignature)
        .map(|sig| signature_of(walker, sig))
        .collect();
    walker.push(Item {
        name,
        range,
        full_range: walker.range(&node.span),
        uri: walker.uri.clone(),
        doc: found.doc,
        deprecated: found.deprecated,
        parent: None,
        detail: ItemDetail::Typeset { signatures },
    });
}

pub(super) fn read_struct(walker: &mut TreeWalker, node: &SyntaxNode) {
    let Some((name, range)) = walker.declare(node) else {
        return;
    };
    let found = walker.doc(node, false);
    let mut members = IndexMap::new();
    let mut flat = Vec::new();
    for field in node.children_of_kind(NodeKind::StructField) {
        let emitted = variable::field_items(walker, field, &name);
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
        detail: ItemDetail::Struct { members },
    });
    walker.push_all(flat);
}

#[cfg(test)]
mod tests {
    use tower_lsp::lsp_types::Url;

    use crate::items::{ItemDetail, ItemKind};
    use crate::walker::parse_file;

    fn uri() -> Url {
        Url::parse("file:///w/a.inc").unwrap()
    }

    #[test]
    fn test_typedef_signature() {
        let set = parse_file(&uri(), "typedef SQLCallback = function void (Handle owner, any data);\n");
        assert_eq!(set.items[0].kind(), ItemKind::Typedef);
        assert_eq!(
            set.items[0].signature(),
            "typedef SQLCallback = function void(Handle owner, any data)"
        );
    }

    #[test]
    fn test_typeset_signatures() {
        let src = "typeset Listener {\n  function void (int a);\n  function Action (int a, int b);\n};\n";
        let set = parse_file(&uri(), src);
        match &set.items[0].detail {
            ItemDetail::Typeset { signatures } => {
                assert_eq!(signatures.len(), 2);
                assert_eq!(signatures[1].0.as_deref(), Some("Action"));
                assert_eq!(signatures[1].1.len(), 2);
            }
            other => panic!("unexpected detail {:?}", other),
        }
    }

    #[test]
    fn test_struct_fields() {
        let src = "struct Extension {\n  public const char[] name;\n  public const char[] file;\n};\n";
        let set = parse_file(&uri(), src);
        let names: Vec<_> = set.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Extension", "name", "file"]);
        assert_eq!(set.items[0].members().map(|m| m.len()), Some(2));
    }
}
