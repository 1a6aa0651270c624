//! Static name resolution and candidate sets
//!
//! Static resolution needs no equation: package names, subtype marks,
//! generic names. Candidate sets feed the overload equations and
//! `matching_nodes`.

use crate::context::AnalysisContext;
use crate::entity::{Entity, RebindingId};
use crate::env::Categories;
use crate::error::Result;
use crate::lookup::Lookup;
use crate::symbols::{simple_name, Symbol};
use ferrada_syntax::{InstantiationKind, NodeId, NodeKind};

impl AnalysisContext {
    /// Declarations a name denotes without overload resolution, closest
    /// first. Dotted names select in the package their prefix denotes.
    pub(crate) fn static_entities(&self, name: NodeId, rebindings: Option<RebindingId>) -> Vec<Entity> {
        match self.ast.kind(name) {
            NodeKind::Identifier { text } => {
                let Some(env) = self.node_env(name) else {
                    return Vec::new();
                };
                let query = Lookup::recursive(Some(name)).with_rebindings(rebindings);
                self.lookup_name(env, simple_name(text), &query)
            }
            NodeKind::DottedName { prefix, suffix } => {
                let Some(text) = self.ast.text(*suffix) else {
                    return Vec::new();
                };
                let origin = self.node_env(name);
                let selected = self
                    .static_entities(*prefix, rebindings)
                    .into_iter()
                    .find_map(|entity| self.package_env(&entity, origin));
                match selected {
                    Some((env, rebindings)) => {
                        let query = Lookup::flat(Some(name)).with_rebindings(rebindings);
                        self.lookup_name(env, text, &query)
                    }
                    None => Vec::new(),
                }
            }
            NodeKind::AttributeRef { .. } => self.designated_type(name, rebindings).into_iter().collect(),
            NodeKind::SubtypeIndication { mark, .. } => self.static_entities(*mark, rebindings),
            _ => Vec::new(),
        }
    }

    /// Package-like declarations a dotted name can select into
    pub(crate) fn is_package_like(&self, decl: NodeId) -> bool {
        match self.ast.kind(decl) {
            NodeKind::PackageDecl { .. }
            | NodeKind::PackageBody { .. }
            | NodeKind::GenericPackageDecl { .. }
            | NodeKind::FormalPackageDecl { .. } => true,
            NodeKind::GenericInstantiation { kind, .. } => *kind == InstantiationKind::Package,
            _ => false,
        }
    }

    /// Package statically denoted by the prefix of a dotted name
    pub(crate) fn static_package(&self, prefix: NodeId) -> Option<Entity> {
        if !matches!(self.ast.kind(prefix), NodeKind::Identifier { .. } | NodeKind::DottedName { .. }) {
            return None;
        }
        self.static_entities(prefix, None)
            .into_iter()
            .next()
            .filter(|entity| self.is_package_like(entity.node))
    }

    /// Visible declarations named like `name`, inherited primitives
    /// included, after hiding by non-overloadable declarations
    pub(crate) fn visible_candidates(&self, name: NodeId, symbol: Symbol) -> Result<Vec<Entity>> {
        let Some(env) = self.node_env(name) else {
            return Ok(Vec::new());
        };
        let query = Lookup::recursive(Some(name)).with_categories(Categories::ALL);
        self.overload_set(self.lookup_symbol(env, symbol, &query))
    }

    /// Candidates selected by `Pkg.Name`
    pub(crate) fn selected_candidates(&self, name: NodeId, package: &Entity, symbol: Symbol) -> Result<Vec<Entity>> {
        let Some((env, rebindings)) = self.package_env(package, self.node_env(name)) else {
            return Ok(Vec::new());
        };
        let query = Lookup::flat(Some(name))
            .with_rebindings(rebindings)
            .with_categories(Categories::ALL);
        self.overload_set(self.lookup_symbol(env, symbol, &query))
    }

    /// Overloadable declarations accumulate until the first declaration
    /// that is not overloadable, which hides everything after it. Subprogram
    /// instances stand for the subprogram they declare; bodies completing a
    /// visible declaration are dropped.
    fn overload_set(&self, found: Vec<Entity>) -> Result<Vec<Entity>> {
        let mut set: Vec<Entity> = Vec::new();
        for entity in found {
            let entity = if self.is_subprogram_instantiation(entity.node) {
                match self.instantiated_subprogram(&entity)? {
                    Some(subp) => subp,
                    None => continue,
                }
            } else {
                entity
            };
            if !self.is_overloadable(entity.node) {
                if set.is_empty() {
                    set.push(entity);
                }
                break;
            }
            set.push(entity);
        }

        let specs: Vec<Entity> = set
            .iter()
            .filter(|e| matches!(self.ast.kind(e.node), NodeKind::SubpDecl { .. }))
            .copied()
            .collect();
        set.retain(|candidate| {
            !matches!(self.ast.kind(candidate.node), NodeKind::SubpBody { .. })
                || !specs.iter().any(|spec| self.completes(candidate, spec))
        });
        Ok(set)
    }

    fn is_overloadable(&self, decl: NodeId) -> bool {
        self.is_subprogram(decl) || matches!(self.ast.kind(decl), NodeKind::EnumLiteralDecl { .. })
    }

    /// Whether a subprogram body completes a declaration: same name and
    /// conforming profile
    pub(crate) fn completes(&self, body: &Entity, spec: &Entity) -> bool {
        if self.decl_symbol(body.node) != self.decl_symbol(spec.node)
            || self.is_function(body.node) != self.is_function(spec.node)
        {
            return false;
        }
        let (body_formals, spec_formals) = (self.subp_formals(body), self.subp_formals(spec));
        body_formals.len() == spec_formals.len()
            && body_formals.iter().zip(&spec_formals).all(|(b, s)| {
                match (self.type_of_decl(&b.spec), self.type_of_decl(&s.spec)) {
                    (Some(bt), Some(st)) => self.canonical_type(&bt) == self.canonical_type(&st),
                    _ => false,
                }
            })
    }

    /// Simple name of the declaration a name node may refer to
    pub(crate) fn name_symbol(&self, name: NodeId) -> Option<Symbol> {
        match self.ast.kind(name) {
            NodeKind::Identifier { text } => self.symbol(simple_name(text)),
            NodeKind::DottedName { suffix, .. } => self.name_symbol(*suffix),
            NodeKind::CallExpr { name, .. } => self.name_symbol(*name),
            NodeKind::Op { op } => op.designator().and_then(|d| self.symbol(d)),
            NodeKind::BinOp { op, .. } | NodeKind::UnOp { op, .. } => self.name_symbol(*op),
            _ => None,
        }
    }
}
