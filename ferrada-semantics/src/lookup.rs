//! Environment lookups
//!
//! Lookups walk an environment and, when recursive, its parents. At every
//! environment the rebinding chain is first shed of the instantiations the
//! environment is not part of; when the environment is the formal part of
//! the innermost remaining instantiation, the instantiation environment's
//! bindings come first and shadow the formals.

use crate::context::{AnalysisContext, RefTarget};
use crate::entity::{Entity, EntityInfo, Metadata, RebindingId};
use crate::env::{Categories, Category, EnvEntry, EnvId, EnvKind, EnvRef, LookupKind};
use crate::symbols::{simple_name, Symbol};
use ferrada_syntax::{NodeId, NodeKind};
use tracing::{trace, warn};

/// Parameters of one lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Lookup {
    pub kind: LookupKind,
    /// Visibility point for sequential filtering
    pub from: Option<NodeId>,
    pub categories: Categories,
    pub rebindings: Option<RebindingId>,
}

impl Lookup {
    pub fn recursive(from: Option<NodeId>) -> Self {
        Self {
            kind: LookupKind::Recursive,
            from,
            categories: Categories::NORMAL,
            rebindings: None,
        }
    }

    pub fn flat(from: Option<NodeId>) -> Self {
        Self {
            kind: LookupKind::Flat,
            ..Self::recursive(from)
        }
    }

    pub fn with_rebindings(self, rebindings: Option<RebindingId>) -> Self {
        Self { rebindings, ..self }
    }

    pub fn with_categories(self, categories: Categories) -> Self {
        Self { categories, ..self }
    }
}

impl AnalysisContext {
    /// All declarations `name` denotes from `env`, closest first
    pub fn lookup(
        &self,
        env: EnvId,
        name: &str,
        kind: LookupKind,
        from: Option<NodeId>,
        categories: Categories,
    ) -> Vec<Entity> {
        let Some(symbol) = self.symbol(name) else {
            return Vec::new();
        };
        let query = Lookup {
            kind,
            from,
            categories,
            rebindings: None,
        };
        self.lookup_symbol(env, symbol, &query)
    }

    pub fn get_first(
        &self,
        env: EnvId,
        name: &str,
        kind: LookupKind,
        from: Option<NodeId>,
        categories: Categories,
    ) -> Option<Entity> {
        self.lookup(env, name, kind, from, categories).into_iter().next()
    }

    /// Merged view over several environments
    pub fn env_group(&self, envs: Vec<EnvId>, md: Option<Metadata>) -> EnvId {
        self.envs.borrow_mut().group(envs, md)
    }

    pub fn is_descendant(&self, ancestor: EnvId, descendant: EnvId) -> bool {
        self.envs.borrow().is_descendant(ancestor, descendant)
    }

    pub(crate) fn lookup_name(&self, env: EnvId, name: &str, query: &Lookup) -> Vec<Entity> {
        match self.symbol(name) {
            Some(symbol) => self.lookup_symbol(env, symbol, query),
            None => Vec::new(),
        }
    }

    pub(crate) fn lookup_symbol(&self, env: EnvId, symbol: Symbol, query: &Lookup) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut current = Some(env);
        while let Some(scope) = current {
            let rebindings = self.shed_rebindings(query.rebindings, scope);
            self.collect(scope, symbol, query, rebindings, true, &mut out);
            if query.kind == LookupKind::Flat {
                break;
            }
            current = self.envs.borrow().parent(scope);
        }

        let mut unique: Vec<Entity> = Vec::with_capacity(out.len());
        for entity in out {
            if !unique.contains(&entity) {
                unique.push(entity);
            }
        }
        trace!(%env, %symbol, found = unique.len(), "lookup");
        unique
    }

    /// Drop the innermost instantiations `env` is not part of
    pub(crate) fn shed_rebindings(&self, rebindings: Option<RebindingId>, env: EnvId) -> Option<RebindingId> {
        let chains = self.rebindings.borrow();
        let envs = self.envs.borrow();
        let mut current = rebindings;
        while let Some(id) = current {
            let link = chains.get(id);
            if envs.is_descendant(link.old_env, env) {
                break;
            }
            current = link.parent;
        }
        current
    }

    fn collect(
        &self,
        env: EnvId,
        symbol: Symbol,
        query: &Lookup,
        rebindings: Option<RebindingId>,
        with_refs: bool,
        out: &mut Vec<Entity>,
    ) {
        let kind = self.envs.borrow().kind(env).clone();
        if let EnvKind::Group { members, md } = kind {
            for member in members {
                let start = out.len();
                let rebindings = self.shed_rebindings(rebindings, member);
                self.collect(member, symbol, query, rebindings, with_refs, out);
                if let Some(md) = md {
                    for entity in &mut out[start..] {
                        entity.info.md = entity.info.md.combine(md);
                    }
                }
            }
            return;
        }

        let mut substituted = false;
        if let Some(id) = rebindings {
            let link = self.rebindings.borrow().get(id);
            if link.old_env == env {
                let actuals = self.envs.borrow().entries(link.new_env, symbol);
                for entry in actuals {
                    if let Some(entity) = self.entry_entity(&entry, query, rebindings) {
                        out.push(entity);
                        substituted = true;
                    }
                }
            }
        }

        if !substituted {
            let entries = self.envs.borrow().entries(env, symbol);
            for entry in entries {
                if let Some(entity) = self.entry_entity(&entry, query, rebindings) {
                    out.push(entity);
                }
            }
        }

        if with_refs {
            let refs = self.envs.borrow().refs(env);
            for reference in refs {
                if self.reference_applies(&reference, query.from) {
                    self.collect_ref(reference, symbol, query, rebindings, out);
                }
            }
        }
    }

    fn entry_entity(&self, entry: &EnvEntry, query: &Lookup, rebindings: Option<RebindingId>) -> Option<Entity> {
        if !query.categories.accepts(entry.category) {
            return None;
        }
        if let Some(info) = entry.info {
            return Some(Entity::with_info(entry.decl, info));
        }
        if !self.is_visible_from(entry.decl, query.from) {
            return None;
        }
        Some(Entity::with_info(
            entry.decl,
            EntityInfo {
                md: entry.md,
                rebindings,
                from_rebound: false,
            },
        ))
    }

    fn collect_ref(
        &self,
        reference: EnvRef,
        symbol: Symbol,
        query: &Lookup,
        rebindings: Option<RebindingId>,
        out: &mut Vec<Entity>,
    ) {
        match reference {
            EnvRef::Env(target) => {
                let rebindings = self.shed_rebindings(rebindings, target);
                self.collect(target, symbol, query, rebindings, true, out);
            }
            EnvRef::UseClause { .. } => {
                if let RefTarget::Envs(targets) = self.ref_target(reference, rebindings) {
                    for (target, target_rebindings) in targets {
                        self.collect(target, symbol, query, target_rebindings, false, out);
                        // Primitives inherited in the used package are used too
                        let inherited = self.envs.borrow().refs(target);
                        for inner in inherited {
                            if matches!(inner, EnvRef::InheritedPrimitives { .. }) {
                                self.collect_ref(inner, symbol, query, target_rebindings, out);
                            }
                        }
                    }
                }
            }
            EnvRef::UseType { .. } => {
                let is_operator = self
                    .symbols
                    .borrow()
                    .resolve(symbol)
                    .is_some_and(|name| name.starts_with('"'));
                if !is_operator {
                    return;
                }
                if let RefTarget::Envs(targets) = self.ref_target(reference, rebindings) {
                    for (target, target_rebindings) in targets {
                        let start = out.len();
                        self.collect(target, symbol, query, target_rebindings, false, out);
                        let mut index = start;
                        while index < out.len() {
                            if self.is_subprogram(out[index].node) {
                                index += 1;
                            } else {
                                out.remove(index);
                            }
                        }
                    }
                }
            }
            EnvRef::InheritedPrimitives { type_decl } => {
                if !query.categories.accepts(Category::InheritedPrimitive) {
                    return;
                }
                let derived = Entity::with_info(
                    type_decl,
                    EntityInfo {
                        rebindings,
                        ..EntityInfo::default()
                    },
                );
                for primitive in self.inherited_primitives(&derived) {
                    if self.decl_symbol(primitive.node) == Some(symbol) {
                        out.push(primitive);
                    }
                }
            }
        }
    }

    /// Use clauses and inherited primitives only apply after their clause
    fn reference_applies(&self, reference: &EnvRef, from: Option<NodeId>) -> bool {
        match (reference.clause(), from) {
            (Some(clause), Some(from)) => {
                self.ast.unit_of(clause) != self.ast.unit_of(from) || self.ast.precedes(clause, from)
            }
            _ => true,
        }
    }

    /// Sequential visibility: a declaration of the same unit is visible only
    /// after it, and inside itself only when it is a scope that may be named
    /// from within
    pub(crate) fn is_visible_from(&self, decl: NodeId, from: Option<NodeId>) -> bool {
        let Some(from) = from else {
            return true;
        };
        if self.ast.unit_of(decl) != self.ast.unit_of(from) {
            return true;
        }
        if self.ast.is_ancestor_or_self(decl, from) {
            return matches!(
                self.ast.kind(decl),
                NodeKind::PackageDecl { .. }
                    | NodeKind::PackageBody { .. }
                    | NodeKind::GenericPackageDecl { .. }
                    | NodeKind::GenericSubpDecl { .. }
                    | NodeKind::SubpDecl { .. }
                    | NodeKind::SubpBody { .. }
                    | NodeKind::TypeDecl { .. }
            );
        }
        self.ast.precedes(decl, from)
    }

    /// Environments a use clause or use type clause makes visible, resolved
    /// once per rebinding chain. A reference reached again while it is being
    /// resolved denotes nothing.
    fn ref_target(&self, reference: EnvRef, rebindings: Option<RebindingId>) -> RefTarget {
        let key = (reference, rebindings);
        if let Some(target) = self.caches.ref_targets.borrow().get(&key) {
            return target.clone();
        }
        self.caches
            .ref_targets
            .borrow_mut()
            .insert(key, RefTarget::InProgress);

        let target = match reference {
            EnvRef::UseClause { name, .. } => self
                .static_entities(name, rebindings)
                .into_iter()
                .find_map(|entity| self.package_env(&entity, None))
                .map_or(RefTarget::Nothing, |target| RefTarget::Envs(vec![target])),
            EnvRef::UseType { mark, .. } => self
                .designated_type(mark, rebindings)
                .map(|ty| self.canonical_type(&ty))
                .and_then(|ty| {
                    let decl = self.type_specific(&ty);
                    self.node_env(decl.node).map(|env| (env, decl.rebindings()))
                })
                .map_or(RefTarget::Nothing, |target| RefTarget::Envs(vec![target])),
            EnvRef::Env(target) => RefTarget::Envs(vec![(target, rebindings)]),
            EnvRef::InheritedPrimitives { .. } => RefTarget::Nothing,
        };

        self.caches
            .ref_targets
            .borrow_mut()
            .insert(key, target.clone());
        target
    }

    /// Environment holding the declarations selectable from a package
    /// entity (`P.X`), with the rebindings they are seen through. The
    /// private part is included when `origin` is inside it.
    pub(crate) fn package_env(&self, package: &Entity, origin: Option<EnvId>) -> Option<(EnvId, Option<RebindingId>)> {
        match self.ast.kind(package.node) {
            NodeKind::PackageDecl { .. } => {
                let public = self.decl_env(package.node)?;
                let private = self.private_env(package.node);
                match (private, origin) {
                    (Some(private), Some(origin)) if self.is_descendant(private, origin) => {
                        Some((self.env_group(vec![private, public], None), package.rebindings()))
                    }
                    _ => Some((public, package.rebindings())),
                }
            }
            NodeKind::GenericPackageDecl { package: inner, .. } => {
                self.package_env(&package.sibling(*inner), origin)
            }
            NodeKind::PackageBody { .. } => {
                let spec = self.scopes.body_of.get(&package.node).copied()?;
                self.package_env(&package.sibling(spec), origin)
            }
            NodeKind::GenericInstantiation { .. } | NodeKind::FormalPackageDecl { .. } => {
                let instance = match self.instantiation(package) {
                    Ok(instance) => instance?,
                    Err(error) => {
                        warn!(package = %package.node, %error, "no instantiation environment");
                        return None;
                    }
                };
                let inner = match self.ast.kind(instance.generic.node) {
                    NodeKind::GenericPackageDecl { package, .. } => *package,
                    _ => return None,
                };
                let public = self.decl_env(inner)?;
                Some((public, Some(instance.rebindings)))
            }
            _ => None,
        }
    }

    /// Symbol of the first defining name of a declaration
    pub(crate) fn decl_symbol(&self, decl: NodeId) -> Option<Symbol> {
        let text = self.ast.decl_name(decl)?;
        self.symbol(simple_name(text))
    }

    pub(crate) fn is_subprogram(&self, decl: NodeId) -> bool {
        matches!(
            self.ast.kind(decl),
            NodeKind::SubpDecl { .. } | NodeKind::SubpBody { .. } | NodeKind::FormalSubpDecl { .. }
        )
    }
}
