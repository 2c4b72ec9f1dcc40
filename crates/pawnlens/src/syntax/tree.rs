//
// syntax/tree.rs
//
// Concrete syntax tree nodes and byte-offset to LSP position mapping
//

use std::ops::Range as ByteRange;

use tower_lsp::lsp_types::{Position, Range};

use super::lexer::Token;

/// Node kinds emitted by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    SourceFile,
    FunctionDefinition,
    FunctionDeclaration,
    GlobalVariable,
    VariableDeclarator,
    LocalVariable,
    Enum,
    EnumEntry,
    EnumStruct,
    EnumStructField,
    EnumStructMethod,
    Methodmap,
    MethodmapMethod,
    MethodmapNative,
    MethodmapProperty,
    PropertyAccessor,
    Typedef,
    Typeset,
    FunctionSignature,
    Struct,
    StructField,
    PreprocInclude,
    PreprocDefine,
    PreprocMacro,
    PreprocPragma,
    PreprocOther,
    Identifier,
    Type,
    Parameters,
    Parameter,
    Dimensions,
    Value,
    Body,
    Error,
}

/// Role of a child inside its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Type,
    Parameters,
    Body,
    Value,
    Inherits,
    Path,
    Storage,
    Dimensions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    pub kind: NodeKind,
    pub span: ByteRange<usize>,
    pub field: Option<Field>,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    pub fn new(kind: NodeKind, span: ByteRange<usize>) -> Self {
        Self {
            kind,
            span,
            field: None,
            children: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.field = Some(field);
        self
    }

    pub fn push(&mut self, child: SyntaxNode) {
        self.children.push(child);
    }

    pub fn child_by_field(&self, field: Field) -> Option<&SyntaxNode> {
        self.children.iter().find(|c| c.field == Some(field))
    }

    pub fn children_by_field(&self, field: Field) -> impl Iterator<Item = &SyntaxNode> {
        self.children.iter().filter(move |c| c.field == Some(field))
    }

    pub fn children_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &SyntaxNode> {
        self.children.iter().filter(move |c| c.kind == kind)
    }

    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.span.clone()]
    }

    /// Text of the child with the given field, if present.
    pub fn field_text<'a>(&self, field: Field, src: &'a str) -> Option<&'a str> {
        self.child_by_field(field).map(|c| c.text(src))
    }
}

/// Maps byte offsets to zero-based LSP positions (UTF-16 columns).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(src: &str) -> Self {
        let mut line_starts = vec![0];
        for (idx, byte) in src.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(idx + 1);
            }
        }
        Self { line_starts }
    }

    pub fn line_of(&self, offset: usize) -> u32 {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line as u32,
            Err(next) => (next - 1) as u32,
        }
    }

    pub fn line_start(&self, line: u32) -> Option<usize> {
        self.line_starts.get(line as usize).copied()
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn position(&self, src: &str, offset: usize) -> Position {
        let offset = offset.min(src.len());
        let line = self.line_of(offset);
        let start = self.line_starts[line as usize];
        let character: usize = src[start..offset].chars().map(char::len_utf16).sum();
        Position::new(line, character as u32)
    }

    pub fn range(&self, src: &str, span: &ByteRange<usize>) -> Range {
        Range::new(self.position(src, span.start), self.position(src, span.end))
    }

    /// Text of a line without its terminator.
    pub fn line_text<'a>(&self, src: &'a str, line: u32) -> Option<&'a str> {
        let start = self.line_start(line)?;
        let end = self
            .line_start(line + 1)
            .map(|next| next - 1)
            .unwrap_or(src.len());
        Some(src[start..end.max(start)].trim_end_matches('\r'))
    }
}

/// A parsed file: root node, the code tokens it was built from, the comment
/// tokens (kept aside for documentation lookup) and a line index.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    pub root: SyntaxNode,
    pub tokens: Vec<Token>,
    pub comments: Vec<Token>,
    pub line_index: LineIndex,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index_positions() {
        let src = "int a;\nfloat b;\n";
        let index = LineIndex::new(src);
        assert_eq!(index.position(src, 0), Position::new(0, 0));
        assert_eq!(index.position(src, 4), Position::new(0, 4));
        assert_eq!(index.position(src, 7), Position::new(1, 0));
        assert_eq!(index.position(src, 13), Position::new(1, 6));
        assert_eq!(index.line_count(), 3);
    }

    #[test]
    fn test_line_index_utf16_columns() {
        // 'é' is 2 bytes in UTF-8 but one UTF-16 unit
        let src = "// é\nint x;";
        let index = LineIndex::new(src);
        let offset = src.find('\n').unwrap();
        assert_eq!(index.position(src, offset), Position::new(0, 4));
    }

    #[test]
    fn test_line_text_strips_terminators() {
        let src = "a\r\nb\nc";
        let index = LineIndex::new(src);
        assert_eq!(index.line_text(src, 0), Some("a"));
        assert_eq!(index.line_text(src, 1), Some("b"));
        assert_eq!(index.line_text(src, 2), Some("c"));
        assert_eq!(index.line_text(src, 3), None);
    }

    #[test]
    fn test_child_by_field() {
        let mut node = SyntaxNode::new(NodeKind::FunctionDefinition, 0..10);
        node.push(SyntaxNode::new(NodeKind::Identifier, 5..8).with_field(Field::Name));
        assert_eq!(
            node.child_by_field(Field::Name).map(|n| n.span.clone()),
            Some(5..8)
        );
        assert!(node.child_by_field(Field::Body).is_none());
    }
}
