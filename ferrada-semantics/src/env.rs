//! Lexical environments
//!
//! Environments map symbols to ordered declaration entries and are chained
//! through parent links. Besides their own entries they carry *references*
//! to other environments (use clauses, child-unit views on a parent's private
//! part, inherited primitives) that are resolved lazily at lookup time.
//!
//! Environments are filled during population and only grow afterwards
//! (instantiation environments and groups are added on demand).

use crate::entity::{EntityInfo, Metadata};
use crate::symbols::Symbol;
use ferrada_syntax::NodeId;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;

/// Index of an environment in the [`EnvArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvId(pub u32);

impl EnvId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "env{}", self.0)
    }
}

/// Walk only the environment itself, or its parents too
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    Flat,
    Recursive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Normal,
    /// Subprogram inherited by a derived type, only seen when requested
    InheritedPrimitive,
}

/// Set of entry categories a lookup accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Categories {
    pub normal: bool,
    pub inherited_primitives: bool,
}

impl Categories {
    pub const NORMAL: Categories = Categories {
        normal: true,
        inherited_primitives: false,
    };

    pub const ALL: Categories = Categories {
        normal: true,
        inherited_primitives: true,
    };

    pub fn accepts(self, category: Category) -> bool {
        match category {
            Category::Normal => self.normal,
            Category::InheritedPrimitive => self.inherited_primitives,
        }
    }
}

impl Default for Categories {
    fn default() -> Self {
        Categories::NORMAL
    }
}

/// One binding of a symbol
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvEntry {
    pub decl: NodeId,
    pub md: Metadata,
    pub category: Category,
    /// Fixed context for entries of instantiation environments; such entries
    /// are returned as is, without sequential filtering
    pub info: Option<EntityInfo>,
}

impl EnvEntry {
    pub fn new(decl: NodeId) -> Self {
        Self {
            decl,
            md: Metadata::default(),
            category: Category::Normal,
            info: None,
        }
    }

    pub fn fixed(decl: NodeId, info: EntityInfo) -> Self {
        Self {
            decl,
            md: info.md,
            category: Category::Normal,
            info: Some(info),
        }
    }
}

/// Lazily resolved reference from one environment to others
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvRef {
    /// Unconditional reference
    Env(EnvId),
    /// `use P;`: the public part of the package denoted by `name`
    UseClause { clause: NodeId, name: NodeId },
    /// `use type T;`: the operators declared next to the type denoted by `mark`
    UseType { clause: NodeId, mark: NodeId },
    /// Subprograms inherited by the derived type `type_decl`
    InheritedPrimitives { type_decl: NodeId },
}

impl EnvRef {
    /// Clause a reference comes from; it only takes effect after the clause
    pub fn clause(&self) -> Option<NodeId> {
        match self {
            EnvRef::UseClause { clause, .. } | EnvRef::UseType { clause, .. } => Some(*clause),
            EnvRef::InheritedPrimitives { type_decl } => Some(*type_decl),
            EnvRef::Env(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnvKind {
    /// Scope created for a node during population
    Lexical,
    /// Formal-to-actual bindings of one instantiation
    Instantiation,
    /// Logical union of several environments
    Group {
        members: Vec<EnvId>,
        md: Option<Metadata>,
    },
}

#[derive(Debug, Clone)]
pub struct LexicalEnv {
    pub parent: Option<EnvId>,
    /// Node owning the scope
    pub node: Option<NodeId>,
    pub kind: EnvKind,
    map: IndexMap<Symbol, Vec<EnvEntry>>,
    refs: Vec<EnvRef>,
}

impl LexicalEnv {
    fn new(parent: Option<EnvId>, node: Option<NodeId>, kind: EnvKind) -> Self {
        Self {
            parent,
            node,
            kind,
            map: IndexMap::new(),
            refs: Vec::new(),
        }
    }
}

/// Storage for all environments of an analysis
#[derive(Debug, Default)]
pub struct EnvArena {
    envs: Vec<LexicalEnv>,
    groups: HashMap<(Vec<EnvId>, Option<Metadata>), EnvId>,
}

impl EnvArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, parent: Option<EnvId>, node: Option<NodeId>) -> EnvId {
        self.push(LexicalEnv::new(parent, node, EnvKind::Lexical))
    }

    pub fn create_instantiation(&mut self, parent: Option<EnvId>, node: NodeId) -> EnvId {
        self.push(LexicalEnv::new(parent, Some(node), EnvKind::Instantiation))
    }

    fn push(&mut self, env: LexicalEnv) -> EnvId {
        let id = EnvId(self.envs.len() as u32);
        self.envs.push(env);
        id
    }

    /// Merged view over `members`, cached per key. Metadata, when given, is
    /// combined into every entry found through the group.
    pub fn group(&mut self, members: Vec<EnvId>, md: Option<Metadata>) -> EnvId {
        let key = (members.clone(), md);
        if let Some(id) = self.groups.get(&key) {
            return *id;
        }
        let id = self.push(LexicalEnv::new(None, None, EnvKind::Group { members, md }));
        self.groups.insert(key, id);
        id
    }

    /// Append a binding; overloads keep declaration order
    pub fn add(&mut self, env: EnvId, symbol: Symbol, entry: EnvEntry) {
        self.envs[env.index()]
            .map
            .entry(symbol)
            .or_default()
            .push(entry);
    }

    pub fn add_ref(&mut self, env: EnvId, reference: EnvRef) {
        let refs = &mut self.envs[env.index()].refs;
        if !refs.contains(&reference) {
            refs.push(reference);
        }
    }

    pub fn entries(&self, env: EnvId, symbol: Symbol) -> Vec<EnvEntry> {
        self.envs[env.index()]
            .map
            .get(&symbol)
            .cloned()
            .unwrap_or_default()
    }

    pub fn refs(&self, env: EnvId) -> Vec<EnvRef> {
        self.envs[env.index()].refs.clone()
    }

    pub fn symbols(&self, env: EnvId) -> Vec<Symbol> {
        self.envs[env.index()].map.keys().copied().collect()
    }

    pub fn parent(&self, env: EnvId) -> Option<EnvId> {
        self.envs[env.index()].parent
    }

    pub fn node(&self, env: EnvId) -> Option<NodeId> {
        self.envs[env.index()].node
    }

    pub fn kind(&self, env: EnvId) -> &EnvKind {
        &self.envs[env.index()].kind
    }

    /// Whether `descendant` is `ancestor` or reaches it through parent links
    pub fn is_descendant(&self, ancestor: EnvId, descendant: EnvId) -> bool {
        let mut current = Some(descendant);
        while let Some(env) = current {
            if env == ancestor {
                return true;
            }
            current = self.parent(env);
        }
        false
    }

    pub fn len(&self) -> usize {
        self.envs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolTable;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_entries_keep_insertion_order() {
        let mut symbols = SymbolTable::new();
        let mut arena = EnvArena::new();
        let env = arena.create(None, None);
        let p = symbols.intern("P");

        arena.add(env, p, EnvEntry::new(NodeId(3)));
        arena.add(env, p, EnvEntry::new(NodeId(1)));
        arena.add(env, p, EnvEntry::new(NodeId(2)));

        let decls: Vec<NodeId> = arena.entries(env, p).iter().map(|e| e.decl).collect();
        assert_eq!(decls, vec![NodeId(3), NodeId(1), NodeId(2)]);
    }

    #[test]
    fn test_missing_symbol_is_empty() {
        let mut symbols = SymbolTable::new();
        let mut arena = EnvArena::new();
        let env = arena.create(None, None);

        assert!(arena.entries(env, symbols.intern("X")).is_empty());
    }

    #[test]
    fn test_is_descendant() {
        let mut arena = EnvArena::new();
        let root = arena.create(None, None);
        let child = arena.create(Some(root), None);
        let grandchild = arena.create(Some(child), None);
        let other = arena.create(Some(root), None);

        assert!(arena.is_descendant(root, grandchild));
        assert!(arena.is_descendant(child, child));
        assert!(!arena.is_descendant(other, grandchild));
        assert!(!arena.is_descendant(grandchild, root));
    }

    #[test]
    fn test_groups_are_cached() {
        let mut arena = EnvArena::new();
        let a = arena.create(None, None);
        let b = arena.create(None, None);

        let first = arena.group(vec![a, b], None);
        let second = arena.group(vec![a, b], None);
        let with_md = arena.group(vec![a, b], Some(Metadata::dottable()));

        assert_eq!(first, second);
        assert_ne!(first, with_md);
        assert_eq!(
            arena.kind(first),
            &EnvKind::Group {
                members: vec![a, b],
                md: None
            }
        );
    }

    #[test]
    fn test_refs_are_deduplicated() {
        let mut arena = EnvArena::new();
        let a = arena.create(None, None);
        let b = arena.create(None, None);

        arena.add_ref(a, EnvRef::Env(b));
        arena.add_ref(a, EnvRef::Env(b));

        assert_eq!(arena.refs(a), vec![EnvRef::Env(b)]);
    }
}
