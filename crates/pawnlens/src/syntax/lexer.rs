//
// syntax/lexer.rs
//
// Token stream for SourcePawn source text
//

use std::ops::Range;

use logos::Logos;

/// Token kinds produced by the lexer.
///
/// Whitespace is skipped; comments and preprocessor directive heads are kept
/// as tokens because documentation and include handling need them.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TokenKind {
    #[regex(r"//[^\n]*")]
    LineComment,
    #[token("/*", block_comment)]
    BlockComment,
    /// `#include`, `#define`, `#pragma`, ... (the rest of the line is handled by the parser)
    #[regex(r"#[ \t]*[A-Za-z_]+")]
    Directive,
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    #[regex(r"[0-9][0-9A-Za-z_.]*")]
    Number,
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    String,
    #[regex(r"'([^'\\\n]|\\.)*'")]
    Char,
    #[token("...")]
    Ellipsis,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("&")]
    Amp,
    #[token("~")]
    Tilde,
    #[regex(r"==|!=|<=|>=|&&|\|\||<<|>>|>>>|\+\+|--|::|[-+*/%&|^]=|<<=|>>=|>>>=")]
    #[regex(r"[-+*/%!^|?@]")]
    Operator,
}

/// Consume the rest of a block comment. An unterminated comment runs to the
/// end of the input.
fn block_comment(lex: &mut logos::Lexer<TokenKind>) -> bool {
    let rest = lex.remainder();
    let len = rest.find("*/").map_or(rest.len(), |idx| idx + 2);
    lex.bump(len);
    true
}

impl TokenKind {
    pub fn is_comment(self) -> bool {
        matches!(self, TokenKind::LineComment | TokenKind::BlockComment)
    }
}

/// A lexed token: kind plus byte span into the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

impl Token {
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.span.clone()]
    }
}

/// Lex the whole source. Characters the lexer does not recognise (stray `$`,
/// line-continuation backslashes, non-ASCII identifiers) are dropped; the
/// parser never needs them.
pub fn lex(src: &str) -> Vec<Token> {
    let mut lexer = TokenKind::lexer(src);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                span: lexer.span(),
            }),
            Err(()) => {
                log::trace!("Skipping unrecognised input at byte {}", lexer.span().start);
            }
        }
    }
    tokens
}
