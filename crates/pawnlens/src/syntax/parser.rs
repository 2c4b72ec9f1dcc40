//
// syntax/parser.rs
//
// Recovering recursive-descent parser for SourcePawn declarations.
//
// The parser only builds the part of the tree the indexer needs: top-level
// declarations, type members, parameter lists, and local declarations inside
// function bodies. Statements and expressions are skipped with bracket
// balancing. A construct that matches no known shape becomes an `Error` node
// and parsing resumes after the next `;` or balanced block.
//

use super::lexer::{lex, Token, TokenKind};
use super::tree::{Field, LineIndex, NodeKind, SyntaxNode, SyntaxTree};

const STORAGE_CLASSES: &[&str] = &[
    "public", "stock", "static", "native", "forward", "const", "new", "decl",
];

const LOCAL_STORAGE: &[&str] = &["static", "const", "new", "decl"];

const STATEMENT_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "switch", "case", "default", "return", "break",
    "continue", "delete", "sizeof", "view_as", "goto", "this", "null", "true", "false",
];

pub(crate) fn is_statement_keyword(word: &str) -> bool {
    STATEMENT_KEYWORDS.contains(&word)
}

/// Where a declaration appears; decides the node kinds produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclContext {
    Global,
    EnumStruct,
    Methodmap,
    Struct,
}

/// Parse a whole file. Never fails: unparseable input yields a `SourceFile`
/// root whose children are `Error` nodes (or nothing at all).
pub fn parse(src: &str) -> SyntaxTree {
    let line_index = LineIndex::new(src);
    let all = lex(src);

    let mut comments = Vec::new();
    let mut code = Vec::new();
    let mut directives = Vec::new();

    let mut idx = 0;
    while idx < all.len() {
        let token = &all[idx];
        if token.kind.is_comment() {
            comments.push(token.clone());
            idx += 1;
        } else if token.kind == TokenKind::Directive {
            let end = directive_end(src, token.span.start);
            let mut line_tokens = Vec::new();
            idx += 1;
            while idx < all.len() && all[idx].span.start < end {
                if all[idx].kind.is_comment() {
                    comments.push(all[idx].clone());
                } else {
                    line_tokens.push(all[idx].clone());
                }
                idx += 1;
            }
            directives.push(parse_directive(src, token, &line_tokens, end));
        } else {
            code.push(token.clone());
            idx += 1;
        }
    }

    let mut parser = Parser {
        src,
        tokens: &code,
        pos: 0,
    };
    let mut children = parser.parse_items();
    children.extend(directives);
    children.sort_by_key(|n| n.span.start);

    log::trace!(
        "Parsed {} bytes: {} top-level nodes, {} code tokens, {} comments",
        src.len(),
        children.len(),
        code.len(),
        comments.len()
    );

    let mut root = SyntaxNode::new(NodeKind::SourceFile, 0..src.len());
    root.children = children;

    SyntaxTree {
        root,
        tokens: code,
        comments,
        line_index,
    }
}

// ============================================================================
// Preprocessor
// ============================================================================

/// Byte offset where the directive starting at `start` ends (exclusive),
/// following `\` line continuations.
fn directive_end(src: &str, start: usize) -> usize {
    let mut cursor = start;
    loop {
        let Some(rel) = src[cursor..].find('\n') else {
            return src.len();
        };
        let newline = cursor + rel;
        let line = src[cursor..newline].trim_end_matches('\r');
        if line.ends_with('\\') {
            cursor = newline + 1;
        } else {
            return newline;
        }
    }
}

fn parse_directive(src: &str, head: &Token, line_tokens: &[Token], end: usize) -> SyntaxNode {
    let name = head.text(src).trim_start_matches('#').trim();
    let last_end = line_tokens
        .last()
        .map(|t| t.span.end)
        .unwrap_or(head.span.end);
    let span = head.span.start..last_end.max(head.span.end);

    match name {
        "include" | "tryinclude" => {
            parse_include(src, head, end).unwrap_or_else(|| SyntaxNode::new(NodeKind::PreprocOther, span))
        }
        "define" => parse_define(src, line_tokens, span),
        "pragma" => {
            let is_deprecated = line_tokens
                .first()
                .map(|t| t.kind == TokenKind::Ident && t.text(src) == "deprecated")
                .unwrap_or(false);
            if !is_deprecated {
                return SyntaxNode::new(NodeKind::PreprocOther, span);
            }
            let mut node = SyntaxNode::new(NodeKind::PreprocPragma, span);
            if let (Some(first), Some(last)) = (line_tokens.get(1), line_tokens.last()) {
                node.push(
                    SyntaxNode::new(NodeKind::Value, first.span.start..last.span.end)
                        .with_field(Field::Value),
                );
            }
            node
        }
        _ => SyntaxNode::new(NodeKind::PreprocOther, span),
    }
}

fn parse_include(src: &str, head: &Token, end: usize) -> Option<SyntaxNode> {
    let rest = &src[head.span.end..end];
    let open_rel = rest.find(|c: char| !c.is_whitespace())?;
    let open = head.span.end + open_rel;
    let close_char = match src[open..].chars().next()? {
        '<' => '>',
        '"' => '"',
        _ => return None,
    };
    let close = open + 1 + src[open + 1..end].find(close_char)?;
    if close == open + 1 {
        return None;
    }
    let mut node = SyntaxNode::new(NodeKind::PreprocInclude, head.span.start..close + 1);
    node.push(SyntaxNode::new(NodeKind::Value, open + 1..close).with_field(Field::Path));
    Some(node)
}

fn parse_define(src: &str, line_tokens: &[Token], span: std::ops::Range<usize>) -> SyntaxNode {
    let Some(name) = line_tokens.first().filter(|t| t.kind == TokenKind::Ident) else {
        return SyntaxNode::new(NodeKind::PreprocOther, span);
    };

    let is_macro = line_tokens
        .get(1)
        .map(|t| t.kind == TokenKind::LParen && t.span.start == name.span.end)
        .unwrap_or(false);

    let mut value_from = 1;
    let mut node = if is_macro {
        let mut node = SyntaxNode::new(NodeKind::PreprocMacro, span);
        node.push(SyntaxNode::new(NodeKind::Identifier, name.span.clone()).with_field(Field::Name));
        let mut depth = 0usize;
        let mut close = None;
        for (i, token) in line_tokens.iter().enumerate().skip(1) {
            match token.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        close = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let close = close.unwrap_or(line_tokens.len() - 1);
        node.push(
            SyntaxNode::new(
                NodeKind::Parameters,
                line_tokens[1].span.start..line_tokens[close].span.end,
            )
            .with_field(Field::Parameters),
        );
        value_from = close + 1;
        node
    } else {
        let mut node = SyntaxNode::new(NodeKind::PreprocDefine, span);
        node.push(SyntaxNode::new(NodeKind::Identifier, name.span.clone()).with_field(Field::Name));
        node
    };

    if let (Some(first), Some(last)) = (line_tokens.get(value_from), line_tokens.last()) {
        node.push(SyntaxNode::new(NodeKind::Value, first.span.start..last.span.end).with_field(Field::Value));
    }
    let _ = src;
    node
}

// ============================================================================
// Declarations
// ============================================================================

struct Parser<'a> {
    src: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

fn token_node(token: &Token, kind: NodeKind, field: Field) -> SyntaxNode {
    SyntaxNode::new(kind, token.span.clone()).with_field(field)
}

impl<'a> Parser<'a> {
    fn nth(&self, n: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + n)
    }

    fn peek(&self) -> Option<&'a Token> {
        self.nth(0)
    }

    fn nth_kind(&self, n: usize) -> Option<TokenKind> {
        self.nth(n).map(|t| t.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.nth_kind(0) == Some(kind)
    }

    fn nth_word(&self, n: usize, word: &str) -> bool {
        self.nth(n)
            .map(|t| t.kind == TokenKind::Ident && t.text(self.src) == word)
            .unwrap_or(false)
    }

    fn at_word(&self, word: &str) -> bool {
        self.nth_word(0, word)
    }

    fn text(&self, token: &Token) -> &'a str {
        &self.src[token.span.clone()]
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn eat(&mut self, kind: TokenKind) -> Option<&'a Token> {
        if self.at(kind) {
            self.bump()
        } else {
            None
        }
    }

    fn eat_word(&mut self, word: &str) -> Option<&'a Token> {
        if self.at_word(word) {
            self.bump()
        } else {
            None
        }
    }

    fn eat_ident(&mut self) -> Option<&'a Token> {
        self.eat(TokenKind::Ident)
    }

    /// End offset of the last consumed token.
    fn prev_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span.end)
            .unwrap_or(0)
    }

    fn current_offset(&self) -> usize {
        self.peek().map(|t| t.span.start).unwrap_or(self.src.len())
    }

    /// Consume a balanced group starting at an opening bracket.
    fn skip_balanced(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.bump() {
            match token.kind {
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    /// Skip an expression up to (not including) a stop token at depth 0, or a
    /// closing bracket that belongs to an enclosing construct.
    fn skip_expression(&mut self, stops: &[TokenKind]) {
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token.kind {
                kind if depth == 0 && stops.contains(&kind) => return,
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                TokenKind::Semi if depth == 0 => return,
                _ => {}
            }
            self.pos += 1;
        }
    }

    /// Skip one malformed statement. With `consume_stray_closer` false, a `}`
    /// at depth 0 is left for the enclosing member loop.
    fn recover(&mut self, consume_stray_closer: bool) -> SyntaxNode {
        let start = self.current_offset();
        let mut depth = 0usize;
        while let Some(token) = self.peek() {
            match token.kind {
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => {
                    if depth == 0 {
                        if consume_stray_closer || token.kind != TokenKind::RBrace {
                            self.pos += 1;
                        }
                        break;
                    }
                    depth -= 1;
                    if depth == 0 && token.kind == TokenKind::RBrace {
                        self.pos += 1;
                        self.eat(TokenKind::Semi);
                        break;
                    }
                }
                TokenKind::Semi if depth == 0 => {
                    self.pos += 1;
                    break;
                }
                _ => {}
            }
            self.pos += 1;
        }
        let end = self.prev_end().max(start);
        log::trace!("Recovered from unparseable input at bytes {}..{}", start, end);
        SyntaxNode::new(NodeKind::Error, start..end)
    }

    fn parse_items(&mut self) -> Vec<SyntaxNode> {
        let mut nodes = Vec::new();
        while self.peek().is_some() {
            let before = self.pos;
            if let Some(node) = self.parse_top_level() {
                nodes.push(node);
            }
            if self.pos == before {
                nodes.push(self.recover(true));
            }
        }
        nodes
    }

    fn parse_top_level(&mut self) -> Option<SyntaxNode> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::Semi => {
                self.bump();
                None
            }
            TokenKind::Ident => match self.text(token) {
                "enum" if self.nth_word(1, "struct") => self.parse_enum_struct(),
                "enum" => self.parse_enum(),
                "methodmap" => self.parse_methodmap(),
                "typedef" => self.parse_typedef(),
                "typeset" => self.parse_typeset(),
                "struct" => self.parse_struct(),
                "functag" | "funcenum" => None,
                _ => self.parse_declaration(DeclContext::Global),
            },
            _ => None,
        }
    }

    /// `Type` node for `ident ([...])*` at the cursor.
    fn parse_type(&mut self) -> Option<SyntaxNode> {
        let first = self.eat_ident()?;
        while self.at(TokenKind::LBracket) {
            self.skip_balanced();
        }
        Some(SyntaxNode::new(NodeKind::Type, first.span.start..self.prev_end()).with_field(Field::Type))
    }

    /// Type (optional) and name of a declaration. Handles `Tag:name`,
    /// implicit types (`name(`, `name =`), and `type[] name`.
    fn parse_type_and_name(&mut self) -> Option<(Option<SyntaxNode>, SyntaxNode)> {
        let first = self.peek().filter(|t| t.kind == TokenKind::Ident)?;
        if is_statement_keyword(self.text(first)) {
            return None;
        }

        // Old-style tag: `Float:value`
        if self.nth_kind(1) == Some(TokenKind::Colon) && self.nth_kind(2) == Some(TokenKind::Ident) {
            self.bump();
            self.bump();
            let name = self.bump()?;
            return Some((
                Some(token_node(first, NodeKind::Type, Field::Type)),
                token_node(name, NodeKind::Identifier, Field::Name),
            ));
        }

        match self.nth_kind(1) {
            Some(TokenKind::LParen | TokenKind::Eq | TokenKind::Semi | TokenKind::Comma) => {
                self.bump();
                Some((None, token_node(first, NodeKind::Identifier, Field::Name)))
            }
            Some(TokenKind::LBracket) => {
                // `int[] name` vs. old-style `name[5]`
                let save = self.pos;
                self.bump();
                while self.at(TokenKind::LBracket) {
                    self.skip_balanced();
                }
                if self.at(TokenKind::Ident) {
                    let ty = SyntaxNode::new(NodeKind::Type, first.span.start..self.prev_end())
                        .with_field(Field::Type);
                    let name = self.bump()?;
                    Some((Some(ty), token_node(name, NodeKind::Identifier, Field::Name)))
                } else {
                    self.pos = save + 1;
                    Some((None, token_node(first, NodeKind::Identifier, Field::Name)))
                }
            }
            Some(TokenKind::Ident) => {
                let ty = self.parse_type()?;
                let name = self.eat_ident()?;
                Some((Some(ty), token_node(name, NodeKind::Identifier, Field::Name)))
            }
            _ => None,
        }
    }

    fn parse_declaration(&mut self, ctx: DeclContext) -> Option<SyntaxNode> {
        let start = self.pos;
        let start_offset = self.current_offset();

        let mut storage = Vec::new();
        while let Some(token) = self.peek() {
            let word = self.text(token);
            if token.kind == TokenKind::Ident
                && STORAGE_CLASSES.contains(&word)
                && self.nth_kind(1) != Some(TokenKind::LParen)
            {
                storage.push(token_node(token, NodeKind::Identifier, Field::Storage));
                self.bump();
            } else {
                break;
            }
        }

        let Some((ty, name)) = self.parse_type_and_name() else {
            self.pos = start;
            return None;
        };

        if self.at(TokenKind::LParen) {
            return Some(self.parse_function_rest(ctx, start_offset, storage, ty, name));
        }

        let kind = match ctx {
            DeclContext::Global => NodeKind::GlobalVariable,
            DeclContext::EnumStruct => NodeKind::EnumStructField,
            DeclContext::Struct => NodeKind::StructField,
            DeclContext::Methodmap => {
                // Methodmaps cannot hold fields.
                self.pos = start;
                return None;
            }
        };

        let mut node = SyntaxNode::new(kind, start_offset..start_offset);
        node.children.extend(storage);
        if let Some(ty) = ty {
            node.push(ty);
        }
        let mut name = name;
        loop {
            node.push(self.parse_declarator_rest(name));
            if self.eat(TokenKind::Comma).is_none() {
                self.eat(TokenKind::Semi);
                break;
            }
            if self.nth_kind(0) == Some(TokenKind::Ident)
                && self.nth_kind(1) == Some(TokenKind::Colon)
                && self.nth_kind(2) == Some(TokenKind::Ident)
            {
                self.bump();
                self.bump();
            }
            match self.eat_ident() {
                Some(next) => name = token_node(next, NodeKind::Identifier, Field::Name),
                None => break,
            }
        }
        node.span.end = self.prev_end();
        Some(node)
    }

    /// Dimensions and initializer after a variable name.
    fn parse_declarator_rest(&mut self, name: SyntaxNode) -> SyntaxNode {
        let start = name.span.start;
        let mut declarator = SyntaxNode::new(NodeKind::VariableDeclarator, start..name.span.end);
        declarator.push(name);
        if self.at(TokenKind::LBracket) {
            let dims_start = self.current_offset();
            while self.at(TokenKind::LBracket) {
                self.skip_balanced();
            }
            declarator.push(
                SyntaxNode::new(NodeKind::Dimensions, dims_start..self.prev_end())
                    .with_field(Field::Dimensions),
            );
        }
        if self.eat(TokenKind::Eq).is_some() {
            let value_start = self.current_offset();
            self.skip_expression(&[TokenKind::Comma, TokenKind::Semi]);
            if self.prev_end() > value_start {
                declarator.push(
                    SyntaxNode::new(NodeKind::Value, value_start..self.prev_end())
                        .with_field(Field::Value),
                );
            }
        }
        declarator.span.end = self.prev_end().max(declarator.span.end);
        declarator
    }

    fn parse_function_rest(
        &mut self,
        ctx: DeclContext,
        start_offset: usize,
        storage: Vec<SyntaxNode>,
        ty: Option<SyntaxNode>,
        name: SyntaxNode,
    ) -> SyntaxNode {
        let is_native = storage
            .iter()
            .any(|s| s.text(self.src) == "native");

        let mut node = SyntaxNode::new(NodeKind::FunctionDeclaration, start_offset..start_offset);
        node.children.extend(storage);
        if let Some(ty) = ty {
            node.push(ty);
        }
        node.push(name);
        node.push(self.parse_parameters());

        let has_body = if self.at(TokenKind::LBrace) {
            node.push(self.parse_body());
            true
        } else {
            if self.eat(TokenKind::Eq).is_some() {
                // native alias: `native Foo() = Bar;`
                self.skip_expression(&[TokenKind::Semi]);
            }
            self.eat(TokenKind::Semi);
            false
        };

        node.kind = match ctx {
            DeclContext::Global | DeclContext::Struct if has_body => NodeKind::FunctionDefinition,
            DeclContext::Global | DeclContext::Struct => NodeKind::FunctionDeclaration,
            DeclContext::EnumStruct => NodeKind::EnumStructMethod,
            DeclContext::Methodmap if is_native => NodeKind::MethodmapNative,
            DeclContext::Methodmap => NodeKind::MethodmapMethod,
        };
        node.span.end = self.prev_end();
        node
    }

    // ------------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------------

    fn parse_parameters(&mut self) -> SyntaxNode {
        let open = self.current_offset();
        let mut segments: Vec<Vec<&'a Token>> = vec![Vec::new()];
        let mut depth = 0usize;
        while let Some(token) = self.bump() {
            match token.kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                    depth += 1;
                    if depth == 1 && token.kind == TokenKind::LParen {
                        continue;
                    }
                }
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        break;
                    }
                }
                TokenKind::Comma if depth == 1 => {
                    segments.push(Vec::new());
                    continue;
                }
                _ => {}
            }
            if let Some(segment) = segments.last_mut() {
                segment.push(token);
            }
        }

        let mut params = SyntaxNode::new(NodeKind::Parameters, open..self.prev_end())
            .with_field(Field::Parameters);
        for segment in segments.iter().filter(|s| !s.is_empty()) {
            if let Some(param) = self.build_parameter(segment) {
                params.push(param);
            }
        }
        params
    }

    fn build_parameter(&self, tokens: &[&'a Token]) -> Option<SyntaxNode> {
        let first = tokens.first()?;
        let last = tokens.last()?;
        let mut node = SyntaxNode::new(NodeKind::Parameter, first.span.start..last.span.end);

        let mut depth = 0usize;
        let mut eq = None;
        for (i, token) in tokens.iter().enumerate() {
            match token.kind {
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => {
                    depth = depth.saturating_sub(1)
                }
                TokenKind::Eq if depth == 0 => {
                    eq = Some(i);
                    break;
                }
                _ => {}
            }
        }
        let (left, default) = match eq {
            Some(i) => (&tokens[..i], &tokens[i + 1..]),
            None => (tokens, &tokens[tokens.len()..]),
        };

        let mut rest = left;
        while let Some((head, tail)) = rest.split_first() {
            if head.kind == TokenKind::Ident && self.text(head) == "const" {
                node.push(token_node(head, NodeKind::Identifier, Field::Storage));
                rest = tail;
            } else {
                break;
            }
        }

        let name_idx = if let Some(i) = rest.iter().position(|t| t.kind == TokenKind::Ellipsis) {
            i
        } else {
            let mut depth = 0usize;
            let mut found = None;
            for (i, token) in rest.iter().enumerate() {
                match token.kind {
                    TokenKind::LBracket => depth += 1,
                    TokenKind::RBracket => depth = depth.saturating_sub(1),
                    TokenKind::Ident if depth == 0 => found = Some(i),
                    _ => {}
                }
            }
            found?
        };

        let type_tokens: Vec<&&Token> = rest[..name_idx]
            .iter()
            .filter(|t| {
                if t.kind == TokenKind::Amp {
                    false
                } else {
                    t.kind != TokenKind::Colon
                }
            })
            .collect();
        for amp in rest[..name_idx].iter().filter(|t| t.kind == TokenKind::Amp) {
            node.push(token_node(amp, NodeKind::Identifier, Field::Storage));
        }
        if let (Some(ty_first), Some(ty_last)) = (type_tokens.first(), type_tokens.last()) {
            node.push(
                SyntaxNode::new(NodeKind::Type, ty_first.span.start..ty_last.span.end)
                    .with_field(Field::Type),
            );
        }

        node.push(token_node(rest[name_idx], NodeKind::Identifier, Field::Name));

        let dims = &rest[name_idx + 1..];
        if let (Some(d_first), Some(d_last)) = (dims.first(), dims.last()) {
            node.push(
                SyntaxNode::new(NodeKind::Dimensions, d_first.span.start..d_last.span.end)
                    .with_field(Field::Dimensions),
            );
        }
        if let (Some(v_first), Some(v_last)) = (default.first(), default.last()) {
            node.push(
                SyntaxNode::new(NodeKind::Value, v_first.span.start..v_last.span.end)
                    .with_field(Field::Value),
            );
        }
        Some(node)
    }

    // ------------------------------------------------------------------------
    // Function bodies
    // ------------------------------------------------------------------------

    /// Consume a `{ ... }` body, collecting local variable declarations.
    fn parse_body(&mut self) -> SyntaxNode {
        let start = self.current_offset();
        let mut body = SyntaxNode::new(NodeKind::Body, start..start).with_field(Field::Body);
        self.bump();

        let mut depth = 1usize;
        let mut statement_start = true;
        let mut prev_was_for = false;
        while let Some(token) = self.peek() {
            let is_for = token.kind == TokenKind::Ident && self.text(token) == "for";
            match token.kind {
                TokenKind::LBrace => {
                    depth += 1;
                    self.bump();
                    statement_start = true;
                }
                TokenKind::RBrace => {
                    depth -= 1;
                    self.bump();
                    if depth == 0 {
                        break;
                    }
                    statement_start = true;
                }
                TokenKind::Semi | TokenKind::Colon => {
                    self.bump();
                    statement_start = true;
                }
                TokenKind::LParen if prev_was_for => {
                    self.bump();
                    statement_start = true;
                }
                TokenKind::Ident if statement_start => {
                    statement_start = false;
                    let locals = self.parse_local_declaration();
                    if locals.is_empty() {
                        self.bump();
                    } else {
                        body.children.extend(locals);
                    }
                }
                _ => {
                    statement_start = false;
                    self.bump();
                }
            }
            prev_was_for = is_for;
        }
        body.span.end = self.prev_end();
        body
    }

    /// Try to read `[storage] Type name [dims] [= init] (, name ...)*` at a
    /// statement start. Consumes nothing and returns an empty list otherwise.
    fn parse_local_declaration(&mut self) -> Vec<SyntaxNode> {
        let save = self.pos;
        let start_offset = self.current_offset();

        let mut storage = Vec::new();
        let mut old_style = false;
        while let Some(token) = self.peek() {
            let word = self.text(token);
            if token.kind == TokenKind::Ident && LOCAL_STORAGE.contains(&word) {
                old_style |= word == "new" || word == "decl";
                storage.push(token_node(token, NodeKind::Identifier, Field::Storage));
                self.bump();
            } else {
                break;
            }
        }

        let Some(first) = self.peek().filter(|t| t.kind == TokenKind::Ident) else {
            self.pos = save;
            return Vec::new();
        };
        if is_statement_keyword(self.text(first)) {
            self.pos = save;
            return Vec::new();
        }

        let shape = match (self.nth_kind(1), self.nth_kind(2)) {
            (Some(TokenKind::Colon), Some(TokenKind::Ident)) if old_style => {
                self.bump();
                self.bump();
                let name = self.bump();
                name.map(|n| {
                    (
                        Some(token_node(first, NodeKind::Type, Field::Type)),
                        token_node(n, NodeKind::Identifier, Field::Name),
                    )
                })
            }
            (Some(TokenKind::Ident), _) => {
                self.bump();
                let ty = token_node(first, NodeKind::Type, Field::Type);
                self.bump().map(|n| (Some(ty), token_node(n, NodeKind::Identifier, Field::Name)))
            }
            (Some(TokenKind::LBracket), _) => {
                self.bump();
                while self.at(TokenKind::LBracket) {
                    self.skip_balanced();
                }
                if self.at(TokenKind::Ident) {
                    let ty = SyntaxNode::new(NodeKind::Type, first.span.start..self.prev_end())
                        .with_field(Field::Type);
                    self.bump().map(|n| (Some(ty), token_node(n, NodeKind::Identifier, Field::Name)))
                } else if old_style {
                    self.pos = self.pos.min(save + storage.len() + 1);
                    Some((None, token_node(first, NodeKind::Identifier, Field::Name)))
                } else {
                    None
                }
            }
            (Some(TokenKind::Eq | TokenKind::Semi | TokenKind::Comma), _) if old_style => {
                self.bump();
                Some((None, token_node(first, NodeKind::Identifier, Field::Name)))
            }
            _ => None,
        };

        let Some((ty, mut name)) = shape else {
            self.pos = save;
            return Vec::new();
        };
        if !matches!(
            self.nth_kind(0),
            Some(TokenKind::Eq | TokenKind::Semi | TokenKind::Comma | TokenKind::LBracket)
        ) {
            self.pos = save;
            return Vec::new();
        }

        let mut locals = Vec::new();
        loop {
            let declarator = self.parse_declarator_rest(name);
            let mut local =
                SyntaxNode::new(NodeKind::LocalVariable, start_offset..declarator.span.end);
            local.children.extend(storage.iter().cloned());
            if let Some(ty) = &ty {
                local.push(ty.clone());
            }
            local.children.extend(declarator.children);
            locals.push(local);

            if !(self.at(TokenKind::Comma) && self.nth_kind(1) == Some(TokenKind::Ident)) {
                break;
            }
            self.bump();
            match self.eat_ident() {
                Some(next) => name = token_node(next, NodeKind::Identifier, Field::Name),
                None => break,
            }
        }
        locals
    }

    // ------------------------------------------------------------------------
    // Type declarations
    // ------------------------------------------------------------------------

    fn parse_enum(&mut self) -> Option<SyntaxNode> {
        let start = self.pos;
        let start_offset = self.current_offset();
        self.bump();

        let mut node = SyntaxNode::new(NodeKind::Enum, start_offset..start_offset);
        if let Some(name) = self.eat_ident() {
            node.push(token_node(name, NodeKind::Identifier, Field::Name));
        }
        self.eat(TokenKind::Colon);
        if self.at(TokenKind::LParen) {
            self.skip_balanced();
        }
        if self.eat(TokenKind::LBrace).is_none() {
            self.pos = start;
            return None;
        }

        loop {
            match self.nth_kind(0) {
                None => break,
                Some(TokenKind::RBrace) => {
                    self.bump();
                    break;
                }
                Some(TokenKind::Comma) => {
                    self.bump();
                    continue;
                }
                _ => {}
            }
            let entry_start = self.current_offset();
            if self.nth_kind(0) == Some(TokenKind::Ident)
                && self.nth_kind(1) == Some(TokenKind::Colon)
                && self.nth_kind(2) == Some(TokenKind::Ident)
            {
                self.bump();
                self.bump();
            }
            let Some(name) = self.eat_ident() else {
                self.bump();
                continue;
            };
            let mut entry = SyntaxNode::new(NodeKind::EnumEntry, entry_start..name.span.end);
            entry.push(token_node(name, NodeKind::Identifier, Field::Name));
            while self.at(TokenKind::LBracket) {
                self.skip_balanced();
            }
            if self.eat(TokenKind::Eq).is_some() {
                let value_start = self.current_offset();
                self.skip_expression(&[TokenKind::Comma]);
                if self.prev_end() > value_start {
                    entry.push(
                        SyntaxNode::new(NodeKind::Value, value_start..self.prev_end())
                            .with_field(Field::Value),
                    );
                }
            }
            entry.span.end = self.prev_end();
            node.push(entry);
        }
        self.eat(TokenKind::Semi);
        node.span.end = self.prev_end();
        Some(node)
    }

    /// Shared member loop for `{ ... }` bodies of enum structs, methodmaps and structs.
    fn parse_members<F>(&mut self, node: &mut SyntaxNode, mut member: F)
    where
        F: FnMut(&mut Self) -> Option<SyntaxNode>,
    {
        loop {
            match self.nth_kind(0) {
                None => break,
                Some(TokenKind::RBrace) => {
                    self.bump();
                    break;
                }
                Some(TokenKind::Semi) => {
                    self.bump();
                    continue;
                }
                _ => {}
            }
            let before = self.pos;
            if let Some(child) = member(self) {
                node.push(child);
            }
            if self.pos == before {
                node.push(self.recover(false));
                if self.pos == before {
                    break;
                }
            }
        }
        self.eat(TokenKind::Semi);
    }

    fn parse_enum_struct(&mut self) -> Option<SyntaxNode> {
        let start = self.pos;
        let start_offset = self.current_offset();
        self.bump();
        self.bump();
        let Some(name) = self.eat_ident() else {
            self.pos = start;
            return None;
        };
        if self.eat(TokenKind::LBrace).is_none() {
            self.pos = start;
            return None;
        }
        let mut node = SyntaxNode::new(NodeKind::EnumStruct, start_offset..start_offset);
        node.push(token_node(name, NodeKind::Identifier, Field::Name));
        self.parse_members(&mut node, |p| p.parse_declaration(DeclContext::EnumStruct));
        node.span.end = self.prev_end();
        Some(node)
    }

    fn parse_struct(&mut self) -> Option<SyntaxNode> {
        let start = self.pos;
        let start_offset = self.current_offset();
        self.bump();
        let Some(name) = self.eat_ident() else {
            self.pos = start;
            return None;
        };
        if self.eat(TokenKind::LBrace).is_none() {
            self.pos = start;
            return None;
        }
        let mut node = SyntaxNode::new(NodeKind::Struct, start_offset..start_offset);
        node.push(token_node(name, NodeKind::Identifier, Field::Name));
        self.parse_members(&mut node, |p| p.parse_declaration(DeclContext::Struct));
        node.span.end = self.prev_end();
        Some(node)
    }

    fn parse_methodmap(&mut self) -> Option<SyntaxNode> {
        let start = self.pos;
        let start_offset = self.current_offset();
        self.bump();
        let Some(name) = self.eat_ident() else {
            self.pos = start;
            return None;
        };
        let mut node = SyntaxNode::new(NodeKind::Methodmap, start_offset..start_offset);
        node.push(token_node(name, NodeKind::Identifier, Field::Name));
        if let Some(nullable) = self.eat_word("__nullable__") {
            node.push(token_node(nullable, NodeKind::Identifier, Field::Storage));
        }
        if self.eat(TokenKind::Lt).is_some() {
            if let Some(parent) = self.eat_ident() {
                node.push(token_node(parent, NodeKind::Identifier, Field::Inherits));
            }
        }
        if self.eat(TokenKind::LBrace).is_some() {
            self.parse_members(&mut node, |p| {
                if p.at_word("property") {
                    p.parse_property()
                } else {
                    p.parse_declaration(DeclContext::Methodmap)
                }
            });
        } else if self.eat(TokenKind::Semi).is_none() {
            self.pos = start;
            return None;
        }
        node.span.end = self.prev_end();
        Some(node)
    }

    fn parse_property(&mut self) -> Option<SyntaxNode> {
        let start = self.pos;
        let start_offset = self.current_offset();
        self.bump();
        let Some(ty) = self.parse_type() else {
            self.pos = start;
            return None;
        };
        let Some(name) = self.eat_ident() else {
            self.pos = start;
            return None;
        };
        if self.eat(TokenKind::LBrace).is_none() {
            self.pos = start;
            return None;
        }
        let mut node = SyntaxNode::new(NodeKind::MethodmapProperty, start_offset..start_offset);
        node.push(ty);
        node.push(token_node(name, NodeKind::Identifier, Field::Name));
        self.parse_members(&mut node, |p| p.parse_accessor());
        node.span.end = self.prev_end();
        Some(node)
    }

    fn parse_accessor(&mut self) -> Option<SyntaxNode> {
        let start = self.pos;
        let start_offset = self.current_offset();
        let mut accessor = SyntaxNode::new(NodeKind::PropertyAccessor, start_offset..start_offset);
        while let Some(token) = self.peek() {
            if matches!(self.text(token), "public" | "native" | "static") {
                accessor.push(token_node(token, NodeKind::Identifier, Field::Storage));
                self.bump();
            } else {
                break;
            }
        }
        let name = match self.peek() {
            Some(t) if matches!(self.text(t), "get" | "set") => t,
            _ => {
                self.pos = start;
                return None;
            }
        };
        self.bump();
        accessor.push(token_node(name, NodeKind::Identifier, Field::Name));
        if self.at(TokenKind::LParen) {
            accessor.push(self.parse_parameters());
        }
        if self.at(TokenKind::LBrace) {
            accessor.push(self.parse_body());
        } else {
            self.eat(TokenKind::Semi);
        }
        accessor.span.end = self.prev_end();
        Some(accessor)
    }

    /// `function Type (params)`
    fn parse_function_signature(&mut self) -> Option<SyntaxNode> {
        let start = self.pos;
        let start_offset = self.current_offset();
        self.eat_word("function")?;
        let mut node = SyntaxNode::new(NodeKind::FunctionSignature, start_offset..start_offset);
        if self.at(TokenKind::Ident) {
            node.push(self.parse_type()?);
        }
        if !self.at(TokenKind::LParen) {
            self.pos = start;
            return None;
        }
        node.push(self.parse_parameters());
        node.span.end = self.prev_end();
        Some(node)
    }

    fn parse_typedef(&mut self) -> Option<SyntaxNode> {
        let start = self.pos;
        let start_offset = self.current_offset();
        self.bump();
        let (Some(name), Some(_)) = (self.eat_ident(), self.eat(TokenKind::Eq)) else {
            self.pos = start;
            return None;
        };
        let Some(signature) = self.parse_function_signature() else {
            self.pos = start;
            return None;
        };
        self.eat(TokenKind::Semi);
        let mut node = SyntaxNode::new(NodeKind::Typedef, start_offset..self.prev_end());
        node.push(token_node(name, NodeKind::Identifier, Field::Name));
        node.push(signature.with_field(Field::Value));
        Some(node)
    }

    fn parse_typeset(&mut self) -> Option<SyntaxNode> {
        let start = self.pos;
        let start_offset = self.current_offset();
        self.bump();
        let (Some(name), Some(_)) = (self.eat_ident(), self.eat(TokenKind::LBrace)) else {
            self.pos = start;
            return None;
        };
        let mut node = SyntaxNode::new(NodeKind::Typeset, start_offset..start_offset);
        node.push(token_node(name, NodeKind::Identifier, Field::Name));
        self.parse_members(&mut node, |p| {
            let signature = p.parse_function_signature()?;
            p.eat(TokenKind::Semi);
            Some(signature)
        });
        node.span.end = self.prev_end();
        Some(node)
    }
}
