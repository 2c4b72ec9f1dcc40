//
// builtins.rs
//
// Process-wide read-only tables of built-in symbols: the `$GLOBAL` pseudo
// scope, reserved type tokens, statement keywords and compiler constants.
//

use std::sync::{Arc, OnceLock};

use tower_lsp::lsp_types::{Position, Range, Url};

use crate::items::{Item, ItemDetail};

/// Parent scope name given to global variables.
pub const GLOBAL_IDENTIFIER: &str = "$GLOBAL";

/// Type tokens that never resolve to a declaration on their own.
pub const RESERVED_TOKENS: &[&str] = &[
    "float", "int", "char", "bool", "void", "any", "Float", "String", "_",
];

/// Language keywords excluded from usage recording.
pub const KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "switch", "case", "default", "return", "break",
    "continue", "delete", "sizeof", "view_as", "new", "decl", "public", "stock", "static",
    "native", "forward", "const", "enum", "struct", "methodmap", "property", "typedef",
    "typeset", "function", "this", "get", "set", "__nullable__", "functag", "funcenum",
    "operator", "goto", "cellsof", "tagof", "state", "sleep", "exit", "assert",
];

/// Compiler-provided constants offered in completions.
pub const BUILTIN_CONSTANTS: &[&str] = &[
    "null", "true", "false", "cellbits", "cellmax", "cellmin", "charbits", "charmax",
    "charmin", "ucharmax", "__Pawn", "__LINE__", "debug",
];

const BUILTIN_URI: &str = "sourcepawn-builtin:///builtins.inc";

/// Check if a token is a reserved type token. Case-sensitive.
pub fn is_reserved_token(name: &str) -> bool {
    matches!(
        name,
        "float" | "int" | "char" | "bool" | "void" | "any" | "Float" | "String" | "_"
    )
}

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Pseudo URI for items that have no defining file.
pub fn builtin_uri() -> &'static Url {
    static URI: OnceLock<Url> = OnceLock::new();
    URI.get_or_init(|| Url::parse(BUILTIN_URI).unwrap())
}

fn constant(name: &str) -> Arc<Item> {
    Arc::new(Item {
        name: name.to_string(),
        range: Range::new(Position::new(0, 0), Position::new(0, 0)),
        full_range: Range::new(Position::new(0, 0), Position::new(0, 0)),
        uri: builtin_uri().clone(),
        doc: None,
        deprecated: None,
        parent: None,
        detail: ItemDetail::Constant,
    })
}

/// Built-in constant items, in table order.
pub fn builtin_constants() -> &'static [Arc<Item>] {
    static CONSTANTS: OnceLock<Vec<Arc<Item>>> = OnceLock::new();
    CONSTANTS.get_or_init(|| BUILTIN_CONSTANTS.iter().map(|name| constant(name)).collect())
}
