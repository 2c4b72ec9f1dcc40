//
// walker/function.rs
//
// Functions, methods and their parameter lists
//

use std::sync::Arc;

use crate::items::{FunctionFlavor, Item, ItemDetail, Parameter};
use crate::syntax::{Field, NodeKind, SyntaxNode};

use super::variable;
use super::TreeWalker;

pub(super) fn read_function(walker: &mut TreeWalker, node: &SyntaxNode) {
    if let Some(items) = build_function(walker, node, None, FunctionFlavor::Free) {
        walker.push_all(items);
    }
}

/// Function item followed by the items of its parameters and locals.
/// Parameters and locals are only emitted for definitions.
pub(super) fn build_function(
    walker: &mut TreeWalker,
    node: &SyntaxNode,
    parent: Option<&str>,
    flavor: FunctionFlavor,
) -> Option<Vec<Arc<Item>>> {
    let (name, range) = walker.declare(node)?;
    let full_range = walker.range(&node.span);
    let found = walker.doc(node, false);
    let params_node = node.child_by_field(Field::Parameters);
    let params = params_node
        .map(|p| read_parameters(walker, p))
        .unwrap_or_default();
    let storage = node
        .children_by_field(Field::Storage)
        .map(|s| walker.text(s).to_string())
        .collect();
    let body = node.child_by_field(Field::Body);

    let return_type = match flavor {
        FunctionFlavor::Constructor => None,
        _ => walker.field_string(node, Field::Type),
    };

    let mut items = vec![Arc::new(Item {
        name: name.clone(),
        range,
        full_range,
        uri: walker.uri.clone(),
        doc: found.doc,
        deprecated: found.deprecated,
        parent: parent.map(str::to_string),
        detail: ItemDetail::Function {
            return_type,
            params,
            storage,
            flavor,
            body: body.map(|b| walker.range(&b.span)),
        },
    })];

    if let Some(body) = body {
        if let Some(params_node) = params_node {
            for param in params_node.children_of_kind(NodeKind::Parameter) {
                items.extend(variable::local_item(walker, param, &name, full_range));
            }
        }
        items.extend(variable::body_locals(walker, body, &name, full_range));
    }
    Some(items)
}

/// Convert a `Parameters` node into parameter descriptions.
pub(super) fn read_parameters(walker: &TreeWalker, params: &SyntaxNode) -> Vec<Parameter> {
    params
        .children_of_kind(NodeKind::Parameter)
        .filter_map(|param| {
            let name = walker.field_string(param, Field::Name)?;
            let storage: Vec<&str> = param
                .children_by_field(Field::Storage)
                .map(|s| walker.text(s))
                .collect();
            Some(Parameter {
                is_variadic: name == "...",
                name,
                type_name: walker.field_string(param, Field::Type),
                default: walker.field_string(param, Field::Value),
                is_const: storage.contains(&"const"),
                is_reference: storage.contains(&"&"),
                dimensions: walker.field_string(param, Field::Dimensions),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use tower_lsp::lsp_types::Url;

    use crate::items::{ItemDetail, ItemKind};
    use crate::walker::parse_file;

    #[test]
    fn test_parameters_flags() {
        let uri = Url::parse("file:///w/a.inc").unwrap();
        let src = "native void Format(char[] buffer, int maxlen, const char[] fmt, any ...);";
        let set = parse_file(&uri, src);
        assert_eq!(set.items.len(), 1);
        let params = set.items[0].params();
        assert_eq!(params.len(), 4);
        assert_eq!(params[0].type_name.as_deref(), Some("char[]"));
        assert!(params[2].is_const);
        assert!(params[3].is_variadic);
        assert_eq!(params[3].type_name.as_deref(), Some("any"));
    }

    #[test]
    fn test_declarations_do_not_emit_parameter_items() {
        let uri = Url::parse("file:///w/a.inc").unwrap();
        let set = parse_file(&uri, "forward void OnThing(int client);");
        assert_eq!(set.items.len(), 1);
        assert_eq!(set.items[0].kind(), ItemKind::Function);
    }

    #[test]
    fn test_definition_body_range_recorded() {
        let uri = Url::parse("file:///w/a.sp").unwrap();
        let set = parse_file(&uri, "void F()\n{\n}\n");
        match &set.items[0].detail {
            ItemDetail::Function { body, storage, .. } => {
                let body = body.unwrap();
                assert_eq!(body.start.line, 1);
                assert_eq!(body.end.line, 2);
                assert!(storage.is_empty());
            }
            other => panic!("unexpected detail {:?}", other),
        }
    }

    #[test]
    fn test_reference_parameter_local() {
        let uri = Url::parse("file:///w/a.sp").unwrap();
        let set = parse_file(&uri, "void F(int &out) { out = 1; }");
        assert!(set.items[0].params()[0].is_reference);
        assert_eq!(set.items[1].name, "out");
    }
}
