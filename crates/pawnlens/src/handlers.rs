//
// handlers.rs
//
// LSP request handlers over the world state
//

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use regex::Regex;
use tower_lsp::lsp_types::*;

use crate::builtins::builtin_constants;
use crate::cross_file::{back_references, inheritance_chain, methodmaps_in, resolve_universe};
use crate::items::{range_contains, FunctionFlavor, Item, ItemDetail, ItemKind};
use crate::position::{is_ident_char, line_at, usage_refers_to};
use crate::state::WorldState;
use crate::utf16::utf16_column_to_byte_offset;

fn markdown(value: String) -> Documentation {
    Documentation::MarkupContent(MarkupContent {
        kind: MarkupKind::Markdown,
        value,
    })
}

// ============================================================================
// Hover
// ============================================================================

fn hover_markdown(item: &Item) -> String {
    if let ItemDetail::Include { target } = &item.detail {
        let shown = target
            .to_file_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| target.to_string());
        return format!("`{}`", shown);
    }

    let mut parts = vec![format!("```sourcepawn\n{}\n```", item.signature())];
    if let Some(doc) = item.doc.as_ref().filter(|d| !d.is_empty()) {
        parts.push(doc.render());
    }
    if let Some(message) = &item.deprecated {
        if message.is_empty() {
            parts.push("**Deprecated**".to_string());
        } else {
            parts.push(format!("**Deprecated** {}", message));
        }
    }
    parts.join("\n\n")
}

pub fn hover(state: &WorldState, uri: &Url, position: Position) -> Option<Hover> {
    let items = state.items_at(uri, position);
    let item = items.first()?;
    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: hover_markdown(item),
        }),
        range: (&item.uri == uri)
            .then_some(item.range)
            .filter(|r| range_contains(r, position)),
    })
}

// ============================================================================
// Goto Definition
// ============================================================================

fn definition_location(item: &Item) -> Location {
    match &item.detail {
        ItemDetail::Include { target } => Location::new(target.clone(), Range::default()),
        _ => Location::new(item.uri.clone(), item.range),
    }
}

/// Every candidate declaration of the token under the cursor.
pub fn goto_definition(
    state: &WorldState,
    uri: &Url,
    position: Position,
) -> Option<GotoDefinitionResponse> {
    let mut locations: Vec<Location> = Vec::new();
    for item in state.items_at(uri, position) {
        let location = definition_location(&item);
        if !locations.contains(&location) {
            locations.push(location);
        }
    }
    match locations.len() {
        0 => None,
        1 => locations.pop().map(GotoDefinitionResponse::Scalar),
        _ => Some(GotoDefinitionResponse::Array(locations)),
    }
}

// ============================================================================
// References
// ============================================================================

pub fn references(
    state: &WorldState,
    uri: &Url,
    position: Position,
    include_declaration: bool,
) -> Option<Vec<Location>> {
    let items = state.items_at(uri, position);
    if items.is_empty() {
        return None;
    }
    let fallback = state.fallback_main();

    let mut locations: Vec<Location> = Vec::new();
    for item in items.iter().filter(|i| i.kind() != ItemKind::Include) {
        if include_declaration {
            locations.push(Location::new(item.uri.clone(), item.range));
        }
        for (file, range) in back_references(&state.store, item, fallback.as_ref()) {
            locations.push(Location::new(file, range));
        }
    }
    dedup_locations(&mut locations);
    Some(locations)
}

/// Drop repeated locations, keeping the first of each. `Position` is not
/// `Hash`, so the key is spelled out.
fn dedup_locations(locations: &mut Vec<Location>) {
    let mut seen = HashSet::new();
    locations.retain(|l| {
        let Range { start, end } = l.range;
        seen.insert((
            l.uri.clone(),
            start.line,
            start.character,
            end.line,
            end.character,
        ))
    });
}

// ============================================================================
// Document Symbols
// ============================================================================

#[allow(deprecated)]
fn document_symbol_for(item: &Item, children: Option<Vec<DocumentSymbol>>) -> DocumentSymbol {
    DocumentSymbol {
        name: item.name.clone(),
        detail: Some(item.signature()).filter(|s| !s.contains('\n')),
        kind: item.symbol_kind(),
        tags: item
            .deprecated
            .as_ref()
            .map(|_| vec![SymbolTag::DEPRECATED]),
        deprecated: None,
        range: item.full_range,
        selection_range: item.range,
        children: children.filter(|c| !c.is_empty()),
    }
}

/// Top-level declarations of the file; type members and enum entries are
/// nested under their type.
pub fn document_symbol(state: &WorldState, uri: &Url) -> Option<DocumentSymbolResponse> {
    let set = state.store.get(uri)?;

    let mut symbols = Vec::new();
    for item in &set.items {
        let top_level = item.parent.is_none() || item.is_global();
        if !top_level || item.local_scope().is_some() || item.kind() == ItemKind::Include {
            continue;
        }
        let children = match item.kind() {
            ItemKind::Enum => Some(
                set.items
                    .iter()
                    .filter(|i| {
                        i.kind() == ItemKind::EnumMember
                            && i.parent.as_deref() == Some(item.name.as_str())
                    })
                    .map(|i| document_symbol_for(i, None))
                    .collect(),
            ),
            _ => item.members().map(|members| {
                members
                    .values()
                    .map(|m| document_symbol_for(m, None))
                    .collect()
            }),
        };
        symbols.push(document_symbol_for(item, children));
    }
    Some(DocumentSymbolResponse::Nested(symbols))
}

// ============================================================================
// Completion
// ============================================================================

fn completion_item(item: &Item) -> CompletionItem {
    CompletionItem {
        label: item.name.clone(),
        kind: Some(item.completion_kind()),
        detail: Some(item.signature()),
        documentation: item
            .doc
            .as_ref()
            .filter(|d| !d.is_empty())
            .map(|d| markdown(d.render())),
        tags: item
            .deprecated
            .as_ref()
            .map(|_| vec![CompletionItemTag::DEPRECATED]),
        ..Default::default()
    }
}

/// One link of a receiver chain such as `client.weapon.Ammo()`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    name: String,
    call: bool,
}

/// Receiver chain before a trailing `.` (plus an optional partial member
/// name), read backwards from the end of `prefix`.
fn receiver_chain(prefix: &str) -> Option<Vec<Segment>> {
    let trimmed = prefix.trim_end_matches(is_ident_char);
    let before_dot = trimmed.strip_suffix('.')?;

    let chars: Vec<char> = before_dot.chars().collect();
    let mut idx = chars.len();
    let mut segments = Vec::new();
    loop {
        let mut call = false;
        if idx > 0 && chars[idx - 1] == ')' {
            let mut depth = 0usize;
            loop {
                if idx == 0 {
                    return None;
                }
                idx -= 1;
                match chars[idx] {
                    ')' => depth += 1,
                    '(' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
            }
            call = true;
        }
        let end = idx;
        while idx > 0 && is_ident_char(chars[idx - 1]) {
            idx -= 1;
        }
        if idx == end {
            return None;
        }
        segments.push(Segment {
            name: chars[idx..end].iter().collect(),
            call,
        });
        if idx > 0 && chars[idx - 1] == '.' {
            idx -= 1;
        } else {
            break;
        }
    }
    segments.reverse();
    Some(segments)
}

/// Strip array dimensions from a type name (`int[]` -> `int`).
fn base_type(type_name: &str) -> &str {
    type_name.split('[').next().unwrap_or(type_name).trim()
}

/// Completion context over one file's universe.
struct Scope<'a> {
    uri: &'a Url,
    position: Position,
    universe: Vec<Arc<Item>>,
    methodmaps: IndexMap<String, Arc<Item>>,
}

impl<'a> Scope<'a> {
    fn new(state: &WorldState, uri: &'a Url, position: Position) -> Self {
        let fallback = state.fallback_main();
        let universe = resolve_universe(&state.store, uri, fallback.as_ref());
        let methodmaps = methodmaps_in(&universe);
        Self {
            uri,
            position,
            universe,
            methodmaps,
        }
    }

    fn local_visible(&self, item: &Item) -> bool {
        match item.local_scope() {
            Some(scope) => &item.uri == self.uri && range_contains(scope, self.position),
            None => true,
        }
    }

    fn type_item(&self, name: &str) -> Option<&Arc<Item>> {
        self.universe.iter().find(|i| {
            i.name == name
                && matches!(
                    i.kind(),
                    ItemKind::Methodmap | ItemKind::EnumStruct | ItemKind::Struct
                )
        })
    }

    /// Members reachable on a value of `type_name`, child members first.
    fn members_of(&self, type_name: &str) -> Vec<Arc<Item>> {
        let mut seen = HashSet::new();
        let mut members = Vec::new();
        let owners: Vec<Arc<Item>> = if self.methodmaps.contains_key(type_name) {
            inheritance_chain(&self.methodmaps, type_name)
        } else {
            self.type_item(type_name).cloned().into_iter().collect()
        };
        for owner in owners {
            for member in owner.members().into_iter().flat_map(|m| m.values()) {
                // Constructors are reached through `new`, not a receiver
                if member.is_member() && seen.insert(member.name.clone()) {
                    members.push(Arc::clone(member));
                }
            }
        }
        members
    }

    /// Type that owns the method or property body containing the cursor.
    fn enclosing_type(&self) -> Option<String> {
        self.universe
            .iter()
            .filter(|i| &i.uri == self.uri && range_contains(&i.full_range, self.position))
            .find(|i| match &i.detail {
                ItemDetail::Function { flavor, .. } => *flavor != FunctionFlavor::Free,
                ItemDetail::Property { .. } => true,
                _ => false,
            })
            .and_then(|i| i.parent.clone())
    }

    fn first_segment_type(&self, segment: &Segment) -> Option<String> {
        if segment.name == "this" {
            return self.enclosing_type();
        }
        let candidates = self
            .universe
            .iter()
            .filter(|i| i.name == segment.name && !i.is_member() && self.local_visible(i));
        // Locals shadow globals
        let mut best: Option<&Arc<Item>> = None;
        for item in candidates {
            if best.map_or(true, |b| b.local_scope().is_none() && item.local_scope().is_some()) {
                best = Some(item);
            }
        }
        match best {
            Some(item) if item.kind() == ItemKind::Methodmap && !segment.call => {
                Some(item.name.clone())
            }
            Some(item) => item.value_type().map(|t| base_type(t).to_string()),
            None => None,
        }
    }

    fn receiver_type(&self, chain: &[Segment]) -> Option<String> {
        let (first, rest) = chain.split_first()?;
        let mut current = self.first_segment_type(first)?;
        for segment in rest {
            let member = self
                .members_of(&current)
                .into_iter()
                .find(|m| m.name == segment.name)?;
            current = base_type(member.value_type()?).to_string();
        }
        Some(current)
    }
}

pub fn completion(state: &WorldState, uri: &Url, position: Position) -> Option<CompletionResponse> {
    let text = state.document_text(uri)?;
    let line = line_at(&text, position.line)?;
    let cursor = utf16_column_to_byte_offset(line, position.character);
    let prefix = &line[..cursor];

    let scope = Scope::new(state, uri, position);

    if let Some(chain) = receiver_chain(prefix) {
        let Some(type_name) = scope.receiver_type(&chain) else {
            log::trace!("No receiver type for {:?}", chain);
            return Some(CompletionResponse::Array(Vec::new()));
        };
        let items = scope
            .members_of(&type_name)
            .iter()
            .map(|m| completion_item(m))
            .collect();
        return Some(CompletionResponse::Array(items));
    }

    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for item in scope.universe.iter().chain(builtin_constants().iter()) {
        if item.is_member() || item.kind() == ItemKind::Include || !scope.local_visible(item) {
            continue;
        }
        if seen.insert(item.name.clone()) {
            items.push(completion_item(item));
        }
    }
    Some(CompletionResponse::Array(items))
}

// ============================================================================
// Signature Help
// ============================================================================

/// Innermost call left open before the end of `text`: callee name, whether
/// it is called through `.`, and the index of the active argument.
fn open_call(text: &str) -> Option<(String, bool, u32)> {
    let chars: Vec<char> = text.chars().collect();
    let mut stack: Vec<(usize, u32)> = Vec::new();
    let mut quote: Option<char> = None;
    let mut idx = 0;
    while idx < chars.len() {
        let c = chars[idx];
        if let Some(q) = quote {
            if c == '\\' {
                idx += 1;
            } else if c == q {
                quote = None;
            }
            idx += 1;
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => stack.push((idx, 0)),
            ')' => {
                stack.pop();
            }
            ',' => {
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
            }
            _ => {}
        }
        idx += 1;
    }

    let (open, commas) = stack.pop()?;
    let mut end = open;
    while end > 0 && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    let mut start = end;
    while start > 0 && is_ident_char(chars[start - 1]) {
        start -= 1;
    }
    if start == end {
        return None;
    }
    let name: String = chars[start..end].iter().collect();
    let member = start > 0 && chars[start - 1] == '.';
    Some((name, member, commas))
}

fn signature_information(item: &Item) -> SignatureInformation {
    let parameters = item
        .params()
        .iter()
        .map(|p| ParameterInformation {
            label: ParameterLabel::Simple(p.label()),
            documentation: item
                .doc
                .as_ref()
                .and_then(|d| d.param(&p.name))
                .map(|text| Documentation::String(text.to_string())),
        })
        .collect();
    SignatureInformation {
        label: item.signature(),
        documentation: item
            .doc
            .as_ref()
            .filter(|d| !d.description.is_empty())
            .map(|d| markdown(d.description.clone())),
        parameters: Some(parameters),
        active_parameter: None,
    }
}

pub fn signature_help(state: &WorldState, uri: &Url, position: Position) -> Option<SignatureHelp> {
    let text = state.document_text(uri)?;
    let line = line_at(&text, position.line)?;
    let cursor = utf16_column_to_byte_offset(line, position.character);

    let mut context = String::new();
    if let Some(previous) = position.line.checked_sub(1).and_then(|l| line_at(&text, l)) {
        context.push_str(previous);
        context.push('\n');
    }
    context.push_str(&line[..cursor]);

    let (name, member, active) = open_call(&context)?;
    let fallback = state.fallback_main();
    let signatures: Vec<SignatureInformation> =
        resolve_universe(&state.store, uri, fallback.as_ref())
            .iter()
            .filter(|i| i.name == name && i.is_callable() && i.is_member() == member)
            .map(|i| signature_information(i))
            .collect();
    if signatures.is_empty() {
        return None;
    }
    Some(SignatureHelp {
        signatures,
        active_signature: Some(0),
        active_parameter: Some(active),
    })
}

// ============================================================================
// Semantic Tokens
// ============================================================================

/// Indices into [`semantic_tokens_legend`] token types.
mod token_type {
    pub const VARIABLE: u32 = 0;
    pub const ENUM_MEMBER: u32 = 1;
    pub const FUNCTION: u32 = 2;
    pub const CLASS: u32 = 3;
    pub const METHOD: u32 = 4;
    pub const MACRO: u32 = 5;
}

/// Bits of [`semantic_tokens_legend`] token modifiers.
mod token_modifier {
    pub const READONLY: u32 = 1 << 0;
    pub const DECLARATION: u32 = 1 << 1;
    pub const DEPRECATED: u32 = 1 << 2;
    pub const MODIFICATION: u32 = 1 << 3;
}

pub fn semantic_tokens_legend() -> SemanticTokensLegend {
    SemanticTokensLegend {
        token_types: vec![
            SemanticTokenType::VARIABLE,
            SemanticTokenType::ENUM_MEMBER,
            SemanticTokenType::FUNCTION,
            SemanticTokenType::CLASS,
            SemanticTokenType::METHOD,
            SemanticTokenType::MACRO,
        ],
        token_modifiers: vec![
            SemanticTokenModifier::READONLY,
            SemanticTokenModifier::DECLARATION,
            SemanticTokenModifier::DEPRECATED,
            SemanticTokenModifier::MODIFICATION,
        ],
    }
}

fn semantic_type(item: &Item) -> Option<u32> {
    let token = match &item.detail {
        ItemDetail::Function {
            flavor: FunctionFlavor::Free,
            ..
        } => token_type::FUNCTION,
        ItemDetail::Function { .. } => token_type::METHOD,
        ItemDetail::Variable { .. } | ItemDetail::Constant | ItemDetail::Property { .. } => {
            token_type::VARIABLE
        }
        ItemDetail::EnumMember { .. } => token_type::ENUM_MEMBER,
        ItemDetail::Enum
        | ItemDetail::EnumStruct { .. }
        | ItemDetail::Methodmap { .. }
        | ItemDetail::Struct { .. }
        | ItemDetail::Typedef { .. }
        | ItemDetail::Typeset { .. } => token_type::CLASS,
        ItemDetail::Define { .. } | ItemDetail::Macro { .. } => token_type::MACRO,
        ItemDetail::Include { .. } => return None,
    };
    Some(token)
}

fn semantic_modifiers(item: &Item) -> u32 {
    let readonly = match &item.detail {
        ItemDetail::Constant | ItemDetail::EnumMember { .. } => true,
        ItemDetail::Variable { storage, .. } => storage.iter().any(|s| s == "const"),
        _ => false,
    };
    let mut modifiers = 0;
    if readonly {
        modifiers |= token_modifier::READONLY;
    }
    if item.deprecated.is_some() {
        modifiers |= token_modifier::DEPRECATED;
    }
    modifiers
}

fn assignment_after() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*(?:(?:(?:[-+*/%&|^]|<<|>>)?=(?:[^=]|$))|\+\+|--)").unwrap())
}

fn increment_before() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?:\+\+|--)\s*$").unwrap())
}

/// Whether the identifier at `range` is written to: assigned, compound
/// assigned, incremented or decremented.
fn is_modification(text: &str, range: Range) -> bool {
    let Some(line) = line_at(text, range.start.line) else {
        return false;
    };
    let start = utf16_column_to_byte_offset(line, range.start.character);
    let end = utf16_column_to_byte_offset(line, range.end.character);
    assignment_after().is_match(&line[end..]) || increment_before().is_match(&line[..start])
}

/// Delta-encode `(range, type, modifiers)` triples in document order.
/// Multi-line and empty ranges are dropped; of two tokens starting at the
/// same position the first wins.
fn encode_semantic_tokens(mut tokens: Vec<(Range, u32, u32)>) -> Vec<SemanticToken> {
    tokens.retain(|(range, ..)| {
        range.start.line == range.end.line && range.end.character > range.start.character
    });
    tokens.sort_by_key(|(range, ..)| (range.start.line, range.start.character));
    tokens.dedup_by_key(|(range, ..)| (range.start.line, range.start.character));

    let mut data = Vec::with_capacity(tokens.len());
    let mut prev_line = 0;
    let mut prev_char = 0;
    for (range, token_type, modifiers) in tokens {
        let Position { line, character } = range.start;
        let delta_line = line - prev_line;
        let delta_start = if delta_line > 0 {
            character
        } else {
            character - prev_char
        };
        data.push(SemanticToken {
            delta_line,
            delta_start,
            length: range.end.character - character,
            token_type,
            token_modifiers_bitset: modifiers,
        });
        prev_line = line;
        prev_char = character;
    }
    data
}

/// Tokens for every declaration of the file and every usage that resolves
/// to a visible item. Usages resolve with the same rules as [`references`].
pub fn semantic_tokens_full(state: &WorldState, uri: &Url) -> Option<SemanticTokensResult> {
    let set = state.store.get(uri)?;
    let text = state.document_text(uri).unwrap_or_default();
    let fallback = state.fallback_main();
    let universe = resolve_universe(&state.store, uri, fallback.as_ref());

    let mut by_name: HashMap<&str, Vec<&Arc<Item>>> = HashMap::new();
    for item in &universe {
        by_name.entry(item.name.as_str()).or_default().push(item);
    }

    let mut tokens = Vec::with_capacity(set.items.len() + set.usages.len());
    for item in &set.items {
        if let Some(token) = semantic_type(item) {
            tokens.push((
                item.range,
                token,
                semantic_modifiers(item) | token_modifier::DECLARATION,
            ));
        }
    }
    for usage in &set.usages {
        let Some(item) = by_name
            .get(usage.name.as_str())
            .and_then(|candidates| candidates.iter().find(|i| usage_refers_to(i, uri, usage)))
        else {
            continue;
        };
        let Some(token) = semantic_type(item) else {
            continue;
        };
        let mut modifiers = semantic_modifiers(item);
        if token == token_type::VARIABLE && is_modification(&text, usage.range) {
            modifiers |= token_modifier::MODIFICATION;
        }
        tokens.push((usage.range, token, modifiers));
    }

    let data = encode_semantic_tokens(tokens);
    log::trace!("semantic_tokens_full {} -> {} tokens", uri, data.len());
    Some(SemanticTokensResult::Tokens(SemanticTokens {
        result_id: None,
        data,
    }))
}
