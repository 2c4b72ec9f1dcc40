//
// syntax/mod.rs
//
// Grammar layer: lexer, recovering parser and syntax tree
//

pub mod lexer;
pub mod parser;
pub mod tree;

pub use lexer::{lex, Token, TokenKind};
pub use parser::parse;
pub use tree::{Field, LineIndex, NodeKind, SyntaxNode, SyntaxTree};
