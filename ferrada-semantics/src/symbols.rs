//! Symbol interning
//!
//! Identifiers are case-insensitive, so every symbol is interned in its
//! lower-cased form. Operator designators keep their quotes (`"+"`) so that
//! they never collide with identifiers.

use std::fmt;
use string_interner::{DefaultBackend, DefaultSymbol, StringInterner, Symbol as _};

/// Interned, case-folded identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(DefaultSymbol);

impl Symbol {
    pub fn index(self) -> usize {
        self.0.to_usize()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sym{}", self.index())
    }
}

/// Symbol table shared by all environments of an analysis
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    names: StringInterner<DefaultBackend>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            names: StringInterner::new(),
        }
    }

    /// Intern `name`, folding case
    pub fn intern(&mut self, name: &str) -> Symbol {
        Symbol(self.names.get_or_intern(fold(name)))
    }

    /// Symbol for `name` if it was ever interned; unknown names cannot match
    /// any environment entry
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.names.get(fold(name)).map(Symbol)
    }

    pub fn resolve(&self, symbol: Symbol) -> Option<&str> {
        self.names.resolve(symbol.0)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Case folding used for symbols and unit names
pub fn fold(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Simple name of a possibly expanded name (`A.B.C` gives `C`)
pub fn simple_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
