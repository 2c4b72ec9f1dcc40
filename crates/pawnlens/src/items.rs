//
// items.rs
//
// Symbol table types: items emitted per file, and the per-file item set
//

use std::sync::Arc;

use indexmap::IndexMap;
use tower_lsp::lsp_types::{CompletionItemKind, Position, Range, SymbolKind, Url};

use crate::builtins::GLOBAL_IDENTIFIER;
use crate::docs::DocBlock;

/// Kind tag of an [`Item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Function,
    Variable,
    Constant,
    Define,
    Enum,
    EnumMember,
    EnumStruct,
    Methodmap,
    Macro,
    Include,
    Property,
    Typedef,
    Typeset,
    Struct,
}

/// How a function-like item was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionFlavor {
    /// Free function (definition, forward or native)
    Free,
    /// Method of a methodmap or enum struct
    Method,
    /// Methodmap constructor (named after the methodmap)
    Constructor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableScope {
    Global,
    /// Local or parameter; visible only inside `function_range`
    Local { function: String, function_range: Range },
    /// Field of an enum struct or struct
    Field,
}

/// A parameter of a function, method, macro or typedef.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub type_name: Option<String>,
    pub default: Option<String>,
    pub is_const: bool,
    pub is_reference: bool,
    pub dimensions: Option<String>,
    pub is_variadic: bool,
}

impl Parameter {
    /// Source-like label, e.g. `const char[] name` or `int &value = 0`.
    pub fn label(&self) -> String {
        let mut label = String::new();
        if self.is_const {
            label.push_str("const ");
        }
        if let Some(ty) = &self.type_name {
            label.push_str(ty);
            label.push(' ');
        }
        if self.is_reference {
            label.push('&');
        }
        label.push_str(&self.name);
        if let Some(dims) = &self.dimensions {
            label.push_str(dims);
        }
        if let Some(default) = &self.default {
            label.push_str(" = ");
            label.push_str(default);
        }
        label
    }
}

pub fn parameter_list(params: &[Parameter]) -> String {
    let labels: Vec<String> = params.iter().map(Parameter::label).collect();
    format!("({})", labels.join(", "))
}

/// Kind-specific payload of an item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemDetail {
    Function {
        return_type: Option<String>,
        params: Vec<Parameter>,
        storage: Vec<String>,
        flavor: FunctionFlavor,
        /// Range of the body, when the item is a definition
        body: Option<Range>,
    },
    Variable {
        type_name: Option<String>,
        dimensions: Option<String>,
        storage: Vec<String>,
        scope: VariableScope,
    },
    Constant,
    Define {
        value: String,
    },
    Macro {
        params: String,
        value: String,
    },
    Enum,
    EnumMember {
        value: Option<String>,
    },
    EnumStruct {
        members: IndexMap<String, Arc<Item>>,
    },
    Methodmap {
        inherits: Option<String>,
        nullable: bool,
        members: IndexMap<String, Arc<Item>>,
    },
    Include {
        target: Url,
    },
    Property {
        type_name: String,
        getter: bool,
        setter: bool,
    },
    Typedef {
        return_type: Option<String>,
        params: Vec<Parameter>,
    },
    Typeset {
        signatures: Vec<(Option<String>, Vec<Parameter>)>,
    },
    Struct {
        members: IndexMap<String, Arc<Item>>,
    },
}

/// One declared symbol.
///
/// `range` is the identifier range; together with `uri` it identifies the
/// declaration. `parent` names the enclosing scope: the type for members, the
/// function for locals, `$GLOBAL` for global variables, the enum for enum
/// members.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub name: String,
    pub range: Range,
    pub full_range: Range,
    pub uri: Url,
    pub doc: Option<DocBlock>,
    pub deprecated: Option<String>,
    pub parent: Option<String>,
    pub detail: ItemDetail,
}

impl Item {
    pub fn kind(&self) -> ItemKind {
        match &self.detail {
            ItemDetail::Function { .. } => ItemKind::Function,
            ItemDetail::Variable { .. } => ItemKind::Variable,
            ItemDetail::Constant => ItemKind::Constant,
            ItemDetail::Define { .. } => ItemKind::Define,
            ItemDetail::Macro { .. } => ItemKind::Macro,
            ItemDetail::Enum => ItemKind::Enum,
            ItemDetail::EnumMember { .. } => ItemKind::EnumMember,
            ItemDetail::EnumStruct { .. } => ItemKind::EnumStruct,
            ItemDetail::Methodmap { .. } => ItemKind::Methodmap,
            ItemDetail::Include { .. } => ItemKind::Include,
            ItemDetail::Property { .. } => ItemKind::Property,
            ItemDetail::Typedef { .. } => ItemKind::Typedef,
            ItemDetail::Typeset { .. } => ItemKind::Typeset,
            ItemDetail::Struct { .. } => ItemKind::Struct,
        }
    }

    /// Identity of the declaration: defining file plus identifier range.
    pub fn key(&self) -> (&Url, Range) {
        (&self.uri, self.range)
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self.detail,
            ItemDetail::Function { .. } | ItemDetail::Macro { .. }
        )
    }

    /// Items only reachable through `receiver.name`.
    pub fn is_member(&self) -> bool {
        match &self.detail {
            ItemDetail::Function { flavor, .. } => *flavor == FunctionFlavor::Method,
            ItemDetail::Variable { scope, .. } => *scope == VariableScope::Field,
            ItemDetail::Property { .. } => true,
            _ => false,
        }
    }

    /// The enclosing function range of a local or parameter.
    pub fn local_scope(&self) -> Option<&Range> {
        match &self.detail {
            ItemDetail::Variable {
                scope: VariableScope::Local { function_range, .. },
                ..
            } => Some(function_range),
            _ => None,
        }
    }

    pub fn is_global(&self) -> bool {
        self.parent.as_deref() == Some(GLOBAL_IDENTIFIER)
    }

    /// Members of a type item (methodmap, enum struct, struct).
    pub fn members(&self) -> Option<&IndexMap<String, Arc<Item>>> {
        match &self.detail {
            ItemDetail::EnumStruct { members }
            | ItemDetail::Methodmap { members, .. }
            | ItemDetail::Struct { members } => Some(members),
            _ => None,
        }
    }

    pub fn params(&self) -> &[Parameter] {
        match &self.detail {
            ItemDetail::Function { params, .. } | ItemDetail::Typedef { params, .. } => params,
            _ => &[],
        }
    }

    /// The type a value of this item has, used for `receiver.` lookups.
    pub fn value_type(&self) -> Option<&str> {
        match &self.detail {
            ItemDetail::Variable { type_name, .. } => type_name.as_deref(),
            ItemDetail::Property { type_name, .. } => Some(type_name),
            ItemDetail::Function {
                return_type, flavor, ..
            } => match flavor {
                FunctionFlavor::Constructor => Some(&self.name),
                _ => return_type.as_deref(),
            },
            _ => None,
        }
    }

    /// Declaration rendered as SourcePawn, for hover and signature labels.
    pub fn signature(&self) -> String {
        match &self.detail {
            ItemDetail::Function {
                return_type,
                params,
                storage,
                ..
            } => {
                let mut parts: Vec<&str> = storage.iter().map(String::as_str).collect();
                if let Some(ty) = return_type {
                    parts.push(ty);
                }
                let head = parts.join(" ");
                let sep = if head.is_empty() { "" } else { " " };
                format!("{}{}{}{}", head, sep, self.name, parameter_list(params))
            }
            ItemDetail::Variable {
                type_name,
                dimensions,
                storage,
                ..
            } => {
                let mut parts: Vec<String> = storage.clone();
                if let Some(ty) = type_name {
                    parts.push(ty.clone());
                }
                parts.push(format!(
                    "{}{}",
                    self.name,
                    dimensions.as_deref().unwrap_or("")
                ));
                format!("{};", parts.join(" "))
            }
            ItemDetail::Constant => self.name.clone(),
            ItemDetail::Define { value } => format!("#define {} {}", self.name, value)
                .trim_end()
                .to_string(),
            ItemDetail::Macro { params, value } => {
                format!("#define {}{} {}", self.name, params, value)
            }
            ItemDetail::Enum => format!("enum {}", self.name),
            ItemDetail::EnumMember { value } => match (&self.parent, value) {
                (Some(parent), Some(value)) => format!("{}::{} = {}", parent, self.name, value),
                (Some(parent), None) => format!("{}::{}", parent, self.name),
                (None, Some(value)) => format!("{} = {}", self.name, value),
                (None, None) => self.name.clone(),
            },
            ItemDetail::EnumStruct { .. } => format!("enum struct {}", self.name),
            ItemDetail::Methodmap { inherits, .. } => match inherits {
                Some(parent) => format!("methodmap {} < {}", self.name, parent),
                None => format!("methodmap {}", self.name),
            },
            ItemDetail::Include { target } => target.to_string(),
            ItemDetail::Property {
                type_name,
                getter,
                setter,
            } => {
                let mut accessors = Vec::new();
                if *getter {
                    accessors.push("get;");
                }
                if *setter {
                    accessors.push("set;");
                }
                format!("property {} {} {{ {} }}", type_name, self.name, accessors.join(" "))
            }
            ItemDetail::Typedef {
                return_type,
                params,
            } => format!(
                "typedef {} = function {}{}",
                self.name,
                return_type.as_deref().unwrap_or("void"),
                parameter_list(params)
            ),
            ItemDetail::Typeset { signatures } => {
                let lines: Vec<String> = signatures
                    .iter()
                    .map(|(ret, params)| {
                        format!(
                            "  function {}{};",
                            ret.as_deref().unwrap_or("void"),
                            parameter_list(params)
                        )
                    })
                    .collect();
                format!("typeset {}\n{{\n{}\n}}", self.name, lines.join("\n"))
            }
            ItemDetail::Struct { .. } => format!("struct {}", self.name),
        }
    }

    pub fn completion_kind(&self) -> CompletionItemKind {
        match &self.detail {
            ItemDetail::Function { flavor, .. } => match flavor {
                FunctionFlavor::Free => CompletionItemKind::FUNCTION,
                FunctionFlavor::Method => CompletionItemKind::METHOD,
                FunctionFlavor::Constructor => CompletionItemKind::CONSTRUCTOR,
            },
            ItemDetail::Variable { scope, .. } => match scope {
                VariableScope::Field => CompletionItemKind::FIELD,
                _ => CompletionItemKind::VARIABLE,
            },
            ItemDetail::Constant | ItemDetail::Define { .. } => CompletionItemKind::CONSTANT,
            ItemDetail::Macro { .. } => CompletionItemKind::FUNCTION,
            ItemDetail::Enum => CompletionItemKind::ENUM,
            ItemDetail::EnumMember { .. } => CompletionItemKind::ENUM_MEMBER,
            ItemDetail::EnumStruct { .. } | ItemDetail::Struct { .. } => CompletionItemKind::STRUCT,
            ItemDetail::Methodmap { .. } => CompletionItemKind::CLASS,
            ItemDetail::Include { .. } => CompletionItemKind::FILE,
            ItemDetail::Property { .. } => CompletionItemKind::PROPERTY,
            ItemDetail::Typedef { .. } | ItemDetail::Typeset { .. } => {
                CompletionItemKind::TYPE_PARAMETER
            }
        }
    }

    pub fn symbol_kind(&self) -> SymbolKind {
        match &self.detail {
            ItemDetail::Function { flavor, .. } => match flavor {
                FunctionFlavor::Free => SymbolKind::FUNCTION,
                FunctionFlavor::Method => SymbolKind::METHOD,
                FunctionFlavor::Constructor => SymbolKind::CONSTRUCTOR,
            },
            ItemDetail::Variable { scope, .. } => match scope {
                VariableScope::Field => SymbolKind::FIELD,
                _ => SymbolKind::VARIABLE,
            },
            ItemDetail::Constant | ItemDetail::Define { .. } => SymbolKind::CONSTANT,
            ItemDetail::Macro { .. } => SymbolKind::FUNCTION,
            ItemDetail::Enum => SymbolKind::ENUM,
            ItemDetail::EnumMember { .. } => SymbolKind::ENUM_MEMBER,
            ItemDetail::EnumStruct { .. } | ItemDetail::Struct { .. } => SymbolKind::STRUCT,
            ItemDetail::Methodmap { .. } => SymbolKind::CLASS,
            ItemDetail::Include { .. } => SymbolKind::FILE,
            ItemDetail::Property { .. } => SymbolKind::PROPERTY,
            ItemDetail::Typedef { .. } | ItemDetail::Typeset { .. } => SymbolKind::TYPE_PARAMETER,
        }
    }
}

/// A raw `#include`/`#tryinclude` directive, resolved or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    /// Path text between the delimiters
    pub text: String,
    /// Range of the path text, delimiters excluded
    pub range: Range,
    /// `<...>` rather than `"..."`
    pub angle: bool,
    pub tryinclude: bool,
}

/// A resolved include edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeRelation {
    pub uri: Url,
    pub range: Range,
}

/// An identifier occurrence that is not a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Usage {
    pub name: String,
    pub range: Range,
    /// Preceded by `.`
    pub member: bool,
}

/// All items of one file plus its include and usage data.
#[derive(Debug, Clone, PartialEq)]
pub struct FileItemSet {
    pub uri: Url,
    /// Source order; members follow their parent
    pub items: Vec<Arc<Item>>,
    /// Include text -> resolved edge (resolved includes only)
    pub includes: IndexMap<String, IncludeRelation>,
    pub directives: Vec<IncludeDirective>,
    /// Define/macro name -> replacement text
    pub defines: IndexMap<String, String>,
    pub usages: Vec<Usage>,
    /// Raw main-path directive text
    pub main_path: Option<String>,
    /// Main path resolved at link time
    pub main_uri: Option<Url>,
}

impl FileItemSet {
    pub fn new(uri: Url) -> Self {
        Self {
            uri,
            items: Vec::new(),
            includes: IndexMap::new(),
            directives: Vec::new(),
            defines: IndexMap::new(),
            usages: Vec::new(),
            main_path: None,
            main_uri: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Usages recorded at exactly `range`.
    pub fn usages_at(&self, range: Range) -> impl Iterator<Item = &Usage> {
        self.usages.iter().filter(move |u| u.range == range)
    }
}

/// Whether `position` lies within `range` (end inclusive).
pub fn range_contains(range: &Range, position: Position) -> bool {
    (range.start.line, range.start.character) <= (position.line, position.character)
        && (position.line, position.character) <= (range.end.line, range.end.character)
}
