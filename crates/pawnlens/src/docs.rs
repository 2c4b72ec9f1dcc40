//
// docs.rs
//
// Documentation comment extraction for declarations.
//
// A declaration's documentation is the contiguous block of `//` lines, or the
// single `/* */` block, that ends on the line directly above it. Comments that
// trail earlier code on their first line belong to that code. A
// `#pragma deprecated` line may sit between the block and the declaration.
//

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::syntax::{LineIndex, NodeKind, SyntaxTree, Token, TokenKind, Field};

/// Parsed documentation block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocBlock {
    /// Free text before (and between) tags
    pub description: String,
    /// `@param name text`, in declaration order
    pub params: IndexMap<String, String>,
    pub returns: Option<String>,
    pub error: Option<String>,
    pub notes: Vec<String>,
    pub deprecated: Option<String>,
}

impl DocBlock {
    pub fn is_empty(&self) -> bool {
        self.description.is_empty()
            && self.params.is_empty()
            && self.returns.is_none()
            && self.error.is_none()
            && self.notes.is_empty()
            && self.deprecated.is_none()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Markdown rendering used by hover and completion documentation.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        if !self.description.is_empty() {
            parts.push(self.description.clone());
        }
        if !self.params.is_empty() {
            let lines: Vec<String> = self
                .params
                .iter()
                .map(|(name, text)| format!("- `{}`: {}", name, text))
                .collect();
            parts.push(format!("**Parameters**\n{}", lines.join("\n")));
        }
        if let Some(returns) = &self.returns {
            parts.push(format!("**Returns** {}", returns));
        }
        if let Some(error) = &self.error {
            parts.push(format!("**Error** {}", error));
        }
        for note in &self.notes {
            parts.push(format!("**Note** {}", note));
        }
        parts.join("\n\n")
    }
}

/// Which tag a continuation line extends.
enum Section {
    Description,
    Param(String),
    Return,
    Error,
    Note,
    Deprecated,
}

fn append(target: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(text);
}

fn split_first_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(pos) => (&s[..pos], s[pos..].trim_start()),
        None => (s, ""),
    }
}

/// Strip comment markers from raw comment text, returning content lines.
fn comment_lines(raw: &str) -> Vec<String> {
    if let Some(inner) = raw.strip_prefix("/*") {
        let inner = inner.strip_suffix("*/").unwrap_or(inner);
        let inner = inner.trim_start_matches('*');
        inner
            .lines()
            .map(|line| {
                let line = line.trim();
                let line = line.strip_prefix('*').unwrap_or(line);
                line.trim().to_string()
            })
            .collect()
    } else {
        raw.lines()
            .map(|line| {
                let line = line.trim_start();
                let line = line.trim_start_matches('/');
                line.trim().to_string()
            })
            .collect()
    }
}

/// Parse documentation tags out of the raw text of one or more comments.
pub fn parse_doc_block(raw_comments: &[&str]) -> DocBlock {
    let mut block = DocBlock::default();
    let mut section = Section::Description;

    for raw in raw_comments {
        for line in comment_lines(raw) {
            if let Some(tag) = line.strip_prefix('@') {
                let (name, rest) = split_first_word(tag);
                section = match name {
                    "param" => {
                        let (param, text) = split_first_word(rest);
                        if param.is_empty() {
                            Section::Description
                        } else {
                            block.params.insert(param.to_string(), text.to_string());
                            Section::Param(param.to_string())
                        }
                    }
                    "return" | "returns" => {
                        block.returns = Some(rest.to_string());
                        Section::Return
                    }
                    "error" => {
                        block.error = Some(rest.to_string());
                        Section::Error
                    }
                    "note" => {
                        block.notes.push(rest.to_string());
                        Section::Note
                    }
                    "deprecated" => {
                        block.deprecated = Some(rest.to_string());
                        Section::Deprecated
                    }
                    _ => {
                        append(&mut block.description, &line);
                        Section::Description
                    }
                };
                continue;
            }

            match &section {
                Section::Description => {
                    if line.is_empty() {
                        if !block.description.is_empty() && !block.description.ends_with('\n') {
                            block.description.push('\n');
                        }
                    } else if block.description.ends_with('\n') {
                        block.description.push_str(&line);
                    } else {
                        append(&mut block.description, &line);
                    }
                }
                Section::Param(name) => {
                    if let Some(text) = block.params.get_mut(name) {
                        append(text, &line);
                    }
                }
                Section::Return => {
                    if let Some(text) = block.returns.as_mut() {
                        append(text, &line);
                    }
                }
                Section::Error => {
                    if let Some(text) = block.error.as_mut() {
                        append(text, &line);
                    }
                }
                Section::Note => {
                    if let Some(text) = block.notes.last_mut() {
                        append(text, &line);
                    }
                }
                Section::Deprecated => {
                    if let Some(text) = block.deprecated.as_mut() {
                        append(text, &line);
                    }
                }
            }
        }
    }
    block.description = block.description.trim().to_string();
    block
}

/// Documentation found for one declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoundDoc {
    pub doc: Option<DocBlock>,
    pub deprecated: Option<String>,
}

/// Per-file documentation lookup over the comments of a parsed tree.
pub struct DocLookup<'a> {
    src: &'a str,
    comments: &'a [Token],
    line_index: &'a LineIndex,
    /// line -> `#pragma deprecated` message
    pragmas: HashMap<u32, String>,
}

impl<'a> DocLookup<'a> {
    pub fn new(tree: &'a SyntaxTree, src: &'a str) -> Self {
        let pragmas = tree
            .root
            .children_of_kind(NodeKind::PreprocPragma)
            .map(|node| {
                let line = tree.line_index.line_of(node.span.start);
                let message = node.field_text(Field::Value, src).unwrap_or("").to_string();
                (line, message)
            })
            .collect();
        Self {
            src,
            comments: &tree.comments,
            line_index: &tree.line_index,
            pragmas,
        }
    }

    /// Whether only whitespace precedes `offset` on its line.
    fn starts_line(&self, offset: usize) -> bool {
        let line = self.line_index.line_of(offset);
        let start = self.line_index.line_start(line).unwrap_or(0);
        self.src[start..offset].trim().is_empty()
    }

    fn line_end_of(&self, token: &Token) -> u32 {
        self.line_index.line_of(token.span.end.saturating_sub(1).max(token.span.start))
    }

    /// Index of the last comment ending before `offset`.
    fn last_comment_before(&self, offset: usize) -> Option<usize> {
        let idx = self.comments.partition_point(|c| c.span.end <= offset);
        idx.checked_sub(1)
    }

    /// Documentation for a declaration whose full span starts at `start`.
    /// With `trailing`, a `//` comment after `end` on the same line is used
    /// when no leading block exists.
    pub fn find(&self, start: usize, end: usize, trailing: bool) -> FoundDoc {
        let decl_line = self.line_index.line_of(start);
        let mut found = FoundDoc::default();

        let mut target = decl_line.checked_sub(1);
        if let Some(line) = target {
            if let Some(message) = self.pragmas.get(&line) {
                found.deprecated = Some(message.clone());
                target = line.checked_sub(1);
            }
        }

        let mut raw: Vec<&str> = Vec::new();
        if let Some(idx) = self.last_comment_before(start) {
            let comment = &self.comments[idx];
            let same_line = self.line_index.line_of(comment.span.start) == decl_line
                && comment.kind == TokenKind::BlockComment
                && self.src[comment.span.end..start].trim().is_empty();
            if same_line && self.starts_line(comment.span.start) {
                raw.push(comment.text(self.src));
            } else if Some(self.line_end_of(comment)) == target && self.starts_line(comment.span.start) {
                match comment.kind {
                    TokenKind::BlockComment => raw.push(comment.text(self.src)),
                    _ => {
                        let mut first = idx;
                        while first > 0 {
                            let prev = &self.comments[first - 1];
                            let current_line = self.line_index.line_of(self.comments[first].span.start);
                            if prev.kind == TokenKind::LineComment
                                && self.line_index.line_of(prev.span.start) + 1 == current_line
                                && self.starts_line(prev.span.start)
                            {
                                first -= 1;
                            } else {
                                break;
                            }
                        }
                        raw.extend(self.comments[first..=idx].iter().map(|c| c.text(self.src)));
                    }
                }
            }
        }

        if raw.is_empty() && trailing {
            let end_line = self.line_index.line_of(end);
            let idx = self.comments.partition_point(|c| c.span.start < end);
            if let Some(comment) = self.comments.get(idx) {
                if comment.kind == TokenKind::LineComment
                    && self.line_index.line_of(comment.span.start) == end_line
                {
                    raw.push(comment.text(self.src));
                }
            }
        }

        if !raw.is_empty() {
            let block = parse_doc_block(&raw);
            if found.deprecated.is_none() {
                found.deprecated = block.deprecated.clone();
            }
            if !block.is_empty() {
                found.doc = Some(block);
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;

    fn doc_for(src: &str, needle: &str, trailing: bool) -> FoundDoc {
        let tree = parse(src);
        let lookup = DocLookup::new(&tree, src);
        let start = src.find(needle).unwrap();
        lookup.find(start, start + needle.len(), trailing)
    }

    #[test]
    fn test_line_comment_block_with_tags() {
        let src = "\
/**/
// Kicks a client.
//
// @param client    Client index.
// @param reason    Reason shown
//                  to the client.
// @return          True on success.
// @error           Invalid client.
native bool KickClient(int client, const char[] reason);
";
        let found = doc_for(src, "native bool", false);
        let doc = found.doc.unwrap();
        assert_eq!(doc.description, "Kicks a client.");
        assert_eq!(doc.param("client"), Some("Client index."));
        assert_eq!(doc.param("reason"), Some("Reason shown to the client."));
        assert_eq!(doc.returns.as_deref(), Some("True on success."));
        assert_eq!(doc.error.as_deref(), Some("Invalid client."));
        assert!(found.deprecated.is_none());
    }

    #[test]
    fn test_block_comment() {
        let src = "\
/**
 * Returns the client count.
 *
 * @note Includes bots.
 */
native int GetClientCount();
";
        let doc = doc_for(src, "native int", false).doc.unwrap();
        assert_eq!(doc.description, "Returns the client count.");
        assert_eq!(doc.notes, vec!["Includes bots.".to_string()]);
    }

    #[test]
    fn test_blank_line_breaks_association() {
        let src = "// unrelated\n\nint x;\n";
        assert!(doc_for(src, "int x", false).doc.is_none());
    }

    #[test]
    fn test_trailing_comment_of_previous_code_is_excluded() {
        let src = "int a; // about a\nint b;\n";
        assert!(doc_for(src, "int b", false).doc.is_none());
    }

    #[test]
    fn test_pragma_deprecated_between_doc_and_declaration() {
        let src = "// Old API.\n#pragma deprecated Use NewThing()\nnative void OldThing();\n";
        let found = doc_for(src, "native void", false);
        assert_eq!(found.deprecated.as_deref(), Some("Use NewThing()"));
        assert_eq!(found.doc.unwrap().description, "Old API.");
    }

    #[test]
    fn test_deprecated_tag() {
        let src = "/* @deprecated gone soon */\nstock void F() {}\n";
        assert_eq!(
            doc_for(src, "stock void", false).deprecated.as_deref(),
            Some("gone soon")
        );
    }

    #[test]
    fn test_trailing_comment_fallback() {
        let src = "enum Color {\n  Red, // the red one\n  Blue\n};\n";
        let found = doc_for(src, "Red", true);
        assert_eq!(found.doc.unwrap().description, "the red one");
        assert!(doc_for(src, "Blue", true).doc.is_none());
        assert!(doc_for(src, "Red", false).doc.is_none());
    }

    #[test]
    fn test_render_markdown() {
        let block = parse_doc_block(&["// Does a thing.\n", "// @param x The x."]);
        let rendered = block.render();
        assert!(rendered.starts_with("Does a thing."));
        assert!(rendered.contains("- `x`: The x."));
    }

    #[test]
    fn test_first_line_has_no_leading_doc() {
        let src = "int x;\n";
        assert_eq!(doc_for(src, "int x", false), FoundDoc::default());
    }
}
