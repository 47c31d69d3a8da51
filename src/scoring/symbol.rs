//! Identifier sanitisation and the per-evaluation symbol registry.
//!
//! Rule names, question ids and stat fields are authored by people: they carry
//! hyphens, spaces, brackets and non-Latin script. Formulas can only name
//! expression-legal symbols, so every identifier passes through [`sanitize`]
//! before it is bound into an evaluation context.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Non-ASCII characters the formula lexer treats as operators.
pub(crate) const UNICODE_OPERATORS: [char; 6] = ['≤', '≥', '≠', '×', '÷', '−'];

/// Expression-legal identifier derived from a human-authored id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn from_id(id: &str) -> Self {
        Self(sanitize(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Whether `ch` may appear inside a symbol.
///
/// ASCII is restricted to alphanumerics and `_`. Any other non-whitespace
/// character is accepted so that Thai or accented identifiers survive intact.
pub fn is_symbol_char(ch: char) -> bool {
    if ch.is_ascii() {
        ch.is_ascii_alphanumeric() || ch == '_'
    } else {
        !ch.is_whitespace() && !UNICODE_OPERATORS.contains(&ch)
    }
}

/// Converts an identifier into a symbol the formula parser accepts.
pub fn sanitize(id: &str) -> String {
    let mut symbol: String = id
        .trim()
        .chars()
        .map(|ch| if is_symbol_char(ch) { ch } else { '_' })
        .collect();

    if symbol.is_empty() {
        return "_".to_string();
    }
    if symbol.starts_with(|ch: char| ch.is_ascii_digit()) {
        symbol.insert(0, '_');
    }
    symbol
}

/// Removes every bracket character, so `[Q-1]` becomes `Q-1`.
pub fn strip_brackets(id: &str) -> String {
    id.trim()
        .chars()
        .filter(|ch| *ch != '[' && *ch != ']')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Two distinct identifiers mapped onto the same symbol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("identifiers '{first}' and '{second}' both map to symbol '{symbol}'")]
pub struct SymbolCollision {
    pub symbol: Symbol,
    pub first: String,
    pub second: String,
}

/// Bidirectional id/symbol table, built once per evaluation.
#[derive(Debug, Clone, Default)]
pub struct SymbolRegistry {
    owners: BTreeMap<Symbol, String>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` and returns its symbol. Re-registering the same id is a no-op.
    pub fn register(&mut self, id: &str) -> Result<Symbol, SymbolCollision> {
        let id = id.trim();
        let symbol = Symbol::from_id(id);
        match self.owners.get(&symbol) {
            Some(owner) if owner != id => Err(SymbolCollision {
                symbol,
                first: owner.clone(),
                second: id.to_string(),
            }),
            Some(_) => Ok(symbol),
            None => {
                self.owners.insert(symbol.clone(), id.to_string());
                Ok(symbol)
            }
        }
    }

    /// Registers `id` as the owner of its symbol, displacing any earlier owner.
    pub(crate) fn reassign(&mut self, id: &str) -> Symbol {
        let id = id.trim();
        let symbol = Symbol::from_id(id);
        self.owners.insert(symbol.clone(), id.to_string());
        symbol
    }

    /// Original identifier that produced `symbol`, if registered.
    pub fn id_of(&self, symbol: &str) -> Option<&str> {
        self.owners.get(symbol).map(String::as_str)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.owners.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}
