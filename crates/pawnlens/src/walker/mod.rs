//
// walker/mod.rs
//
// Top-down walk over a parsed file, emitting items in source order
//

mod enums;
mod function;
mod methodmap;
mod preproc;
mod types;
mod variable;

use std::collections::HashSet;
use std::ops::Range as ByteRange;
use std::sync::Arc;

use tower_lsp::lsp_types::{Range, Url};

use crate::builtins::{is_keyword, is_reserved_token};
use crate::cross_file::parse_main_path;
use crate::docs::{DocLookup, FoundDoc};
use crate::items::{FileItemSet, Item, Usage};
use crate::syntax::{parse, Field, NodeKind, SyntaxNode, SyntaxTree, TokenKind};

/// Parse `text` and build the item set for `uri`.
///
/// Includes are recorded as raw directives only; resolving them against the
/// search path happens at link time (see `cross_file::link_includes`).
pub fn parse_file(uri: &Url, text: &str) -> FileItemSet {
    let tree = parse(text);
    let mut walker = TreeWalker::new(uri, text, &tree);
    walker.walk();
    let set = walker.finish();
    log::trace!(
        "Indexed {}: {} items, {} includes, {} usages",
        uri,
        set.items.len(),
        set.directives.len(),
        set.usages.len()
    );
    set
}

/// Walk state for one file.
pub(crate) struct TreeWalker<'a> {
    pub(crate) uri: &'a Url,
    pub(crate) src: &'a str,
    tree: &'a SyntaxTree,
    docs: DocLookup<'a>,
    pub(crate) set: FileItemSet,
    /// Start offsets of declaration identifiers
    declared: HashSet<usize>,
}

impl<'a> TreeWalker<'a> {
    fn new(uri: &'a Url, src: &'a str, tree: &'a SyntaxTree) -> Self {
        Self {
            uri,
            src,
            tree,
            docs: DocLookup::new(tree, src),
            set: FileItemSet::new(uri.clone()),
            declared: HashSet::new(),
        }
    }

    pub(crate) fn range(&self, span: &ByteRange<usize>) -> Range {
        self.tree.line_index.range(self.src, span)
    }

    pub(crate) fn text(&self, node: &SyntaxNode) -> &'a str {
        node.text(self.src)
    }

    pub(crate) fn field_string(&self, node: &SyntaxNode, field: Field) -> Option<String> {
        node.field_text(field, self.src).map(str::to_string)
    }

    pub(crate) fn doc(&self, node: &SyntaxNode, trailing: bool) -> FoundDoc {
        self.docs.find(node.span.start, node.span.end, trailing)
    }

    /// Name and identifier range of a declaration; marks the identifier so
    /// it is not recorded as a usage.
    pub(crate) fn declare(&mut self, node: &SyntaxNode) -> Option<(String, Range)> {
        let name = node.child_by_field(Field::Name)?;
        self.declared.insert(name.span.start);
        Some((self.text(name).to_string(), self.range(&name.span)))
    }

    pub(crate) fn push(&mut self, item: Item) -> Arc<Item> {
        let item = Arc::new(item);
        self.set.items.push(Arc::clone(&item));
        item
    }

    pub(crate) fn push_all(&mut self, items: Vec<Arc<Item>>) {
        self.set.items.extend(items);
    }

    fn walk(&mut self) {
        let tree = self.tree;
        for node in &tree.root.children {
            match node.kind {
                NodeKind::FunctionDefinition | NodeKind::FunctionDeclaration => {
                    function::read_function(self, node)
                }
                NodeKind::GlobalVariable => variable::read_global(self, node),
                NodeKind::Enum => enums::read_enum(self, node),
                NodeKind::EnumStruct => enums::read_enum_struct(self, node),
                NodeKind::Methodmap => methodmap::read_methodmap(self, node),
                NodeKind::Typedef => types::read_typedef(self, node),
                NodeKind::Typeset => types::read_typeset(self, node),
                NodeKind::Struct => types::read_struct(self, node),
                NodeKind::PreprocInclude => preproc::read_include(self, node),
                NodeKind::PreprocDefine => preproc::read_define(self, node),
                NodeKind::PreprocMacro => preproc::read_macro(self, node),
                NodeKind::PreprocPragma | NodeKind::PreprocOther | NodeKind::Error => {}
                NodeKind::SourceFile
                | NodeKind::VariableDeclarator
                | NodeKind::LocalVariable
                | NodeKind::EnumEntry
                | NodeKind::EnumStructField
                | NodeKind::EnumStructMethod
                | NodeKind::MethodmapMethod
                | NodeKind::MethodmapNative
                | NodeKind::MethodmapProperty
                | NodeKind::PropertyAccessor
                | NodeKind::FunctionSignature
                | NodeKind::StructField
                | NodeKind::Identifier
                | NodeKind::Type
                | NodeKind::Parameters
                | NodeKind::Parameter
                | NodeKind::Dimensions
                | NodeKind::Value
                | NodeKind::Body => {
                    log::trace!("Unexpected top-level {:?} node in {}", node.kind, self.uri);
                }
            }
        }
    }

    fn record_usages(&mut self) {
        let tokens = &self.tree.tokens;
        for (idx, token) in tokens.iter().enumerate() {
            if token.kind != TokenKind::Ident || self.declared.contains(&token.span.start) {
                continue;
            }
            let name = token.text(self.src);
            if is_keyword(name) || is_reserved_token(name) {
                continue;
            }
            let member = idx
                .checked_sub(1)
                .map(|prev| tokens[prev].kind == TokenKind::Dot)
                .unwrap_or(false);
            self.set.usages.push(Usage {
                name: name.to_string(),
                range: self.range(&token.span),
                member,
            });
        }
    }

    fn finish(mut self) -> FileItemSet {
        self.record_usages();
        self.set.main_path = self
            .tree
            .comments
            .iter()
            .find_map(|c| parse_main_path(c.text(self.src)));
        self.set
    }
}
