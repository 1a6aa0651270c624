//! Type relation engine
//!
//! Pure queries over type entities: type and subtype declarations, classwide
//! views, anonymous types and the universal numeric types of `Standard`.
//! Everything goes through `canonical_type`, which strips subtypes and
//! private views; derived types are classified by their root type.

use crate::context::AnalysisContext;
use crate::entity::{Entity, EntityInfo, Metadata, RebindingId};
use crate::lookup::Lookup;
use crate::symbols::{simple_name, Symbol};
use ferrada_syntax::{NodeId, NodeKind, UniversalKind};
use std::collections::HashSet;

impl AnalysisContext {
    /// Type denoted by a subtype mark or subtype indication, resolved
    /// statically in the mark's environment under `rebindings`
    pub fn designated_type(&self, mark: NodeId, rebindings: Option<RebindingId>) -> Option<Entity> {
        let key = (mark, rebindings);
        if let Some(cached) = self.caches.designated_types.borrow().get(&key) {
            return *cached;
        }
        let ty = self.compute_designated_type(mark, rebindings);
        self.caches.designated_types.borrow_mut().insert(key, ty);
        ty
    }

    fn compute_designated_type(&self, mark: NodeId, rebindings: Option<RebindingId>) -> Option<Entity> {
        match self.ast.kind(mark) {
            NodeKind::Identifier { text } => {
                let env = self.node_env(mark)?;
                let query = Lookup::recursive(Some(mark)).with_rebindings(rebindings);
                self.lookup_name(env, simple_name(text), &query)
                    .into_iter()
                    .find(|entity| self.is_type(entity.node))
            }
            NodeKind::DottedName { .. } => self
                .static_entities(mark, rebindings)
                .into_iter()
                .find(|entity| self.is_type(entity.node)),
            NodeKind::AttributeRef { prefix, attribute, .. } => {
                let ty = self.designated_type(*prefix, rebindings)?;
                match self.ast.text(*attribute).map(str::to_ascii_lowercase).as_deref() {
                    Some("class") => self.classwide_type(&ty),
                    Some("base") => Some(self.canonical_type(&ty)),
                    _ => None,
                }
            }
            NodeKind::SubtypeIndication { mark, .. } | NodeKind::BoxRange { mark } => {
                self.designated_type(*mark, rebindings)
            }
            NodeKind::AnonymousTypeDecl { .. } => Some(Entity::with_info(
                mark,
                EntityInfo {
                    rebindings,
                    ..EntityInfo::default()
                },
            )),
            _ => None,
        }
    }

    pub(crate) fn is_type(&self, node: NodeId) -> bool {
        self.ast.kind(node).is_type_decl()
    }

    /// Declared type of an object-like declaration
    pub fn type_of_decl(&self, decl: &Entity) -> Option<Entity> {
        match self.ast.kind(decl.node) {
            NodeKind::ObjectDecl { subtype, .. }
            | NodeKind::ComponentDecl { subtype, .. }
            | NodeKind::DiscriminantSpec { subtype, .. }
            | NodeKind::ParamSpec { subtype, .. } => self.designated_type(*subtype, decl.rebindings()),
            NodeKind::NumberDecl { expr, .. } => {
                let standard = self.standard?;
                if self.has_real_literal(*expr) {
                    Some(standard.universal_real_type())
                } else {
                    Some(standard.universal_int_type())
                }
            }
            NodeKind::EnumLiteralDecl { .. } => {
                let def = self.ast.parent(decl.node)?;
                let ty = self.ast.parent(def)?;
                Some(decl.sibling(ty))
            }
            NodeKind::ForLoopVarDecl { .. } => {
                let spec = self.ast.parent(decl.node)?;
                let ty = self.loop_parameter_type(spec)?;
                Some(self.root_numeric(&ty))
            }
            _ => None,
        }
    }

    fn has_real_literal(&self, expr: NodeId) -> bool {
        self.ast
            .descendants(expr)
            .iter()
            .any(|node| matches!(self.ast.kind(*node), NodeKind::RealLiteral { .. }))
    }

    /// Universal numeric types map to `Integer` and `Float`
    pub(crate) fn root_numeric(&self, ty: &Entity) -> Entity {
        match (self.standard, self.universal_kind(ty)) {
            (Some(standard), Some(UniversalKind::Integer)) => standard.integer_type(),
            (Some(standard), Some(UniversalKind::Real)) => standard.float_type(),
            _ => *ty,
        }
    }

    /// Full type behind subtypes and private views
    pub fn canonical_type(&self, ty: &Entity) -> Entity {
        let key = strip(ty);
        if let Some(cached) = self.caches.canonical_types.borrow().get(&key) {
            return *cached;
        }

        let mut current = key;
        for _ in 0..self.config.max_derivation_depth {
            let next = match self.ast.kind(current.node) {
                NodeKind::SubtypeDecl { subtype, .. } => self.designated_type(*subtype, current.rebindings()),
                NodeKind::TypeDecl { def, .. } if self.is_partial_view(*def) => self.full_view(&current),
                NodeKind::ClasswideTypeDecl { specific } => {
                    let full = self.canonical_type(&current.sibling(*specific));
                    match self.ast.kind(full.node) {
                        NodeKind::TypeDecl {
                            classwide: Some(classwide),
                            ..
                        } if full.node != *specific => Some(full.sibling(*classwide)),
                        _ => None,
                    }
                }
                _ => None,
            };
            match next {
                Some(next) => current = strip(&next),
                None => break,
            }
        }

        self.caches.canonical_types.borrow_mut().insert(key, current);
        current
    }

    fn is_partial_view(&self, def: NodeId) -> bool {
        matches!(
            self.ast.kind(def),
            NodeKind::PrivateTypeDef { .. }
                | NodeKind::DerivedTypeDef {
                    private_extension: true,
                    ..
                }
        )
    }

    /// Completion of a private type declared in a package's public part
    pub fn full_view(&self, ty: &Entity) -> Option<Entity> {
        let key = strip(ty);
        if let Some(cached) = self.caches.full_views.borrow().get(&key) {
            return *cached;
        }

        let view = self.ast.parent(ty.node).and_then(|package| {
            if !matches!(self.ast.kind(package), NodeKind::PackageDecl { .. }) {
                return None;
            }
            let private = self.private_env(package)?;
            let symbol = self.decl_symbol(ty.node)?;
            let entries = self.envs.borrow().entries(private, symbol);
            entries
                .into_iter()
                .find(|entry| {
                    entry.decl != ty.node
                        && matches!(self.ast.kind(entry.decl), NodeKind::TypeDecl { def, .. } if !self.is_partial_view(*def))
                })
                .map(|entry| ty.sibling(entry.decl))
        });

        self.caches.full_views.borrow_mut().insert(key, view);
        view
    }

    /// `T'Class` of a tagged type
    pub fn classwide_type(&self, ty: &Entity) -> Option<Entity> {
        let canonical = self.canonical_type(ty);
        match self.ast.kind(canonical.node) {
            NodeKind::ClasswideTypeDecl { .. } => Some(canonical),
            NodeKind::TypeDecl {
                classwide: Some(classwide),
                ..
            } => Some(canonical.sibling(*classwide)),
            _ => None,
        }
    }

    /// Specific type of a classwide view; other types are returned as is
    pub(crate) fn type_specific(&self, ty: &Entity) -> Entity {
        match self.ast.kind(ty.node) {
            NodeKind::ClasswideTypeDecl { specific } => ty.sibling(*specific),
            _ => *ty,
        }
    }

    /// Parent type and progenitors of a derived type
    pub fn base_types(&self, ty: &Entity) -> Vec<Entity> {
        let canonical = self.canonical_type(&self.type_specific(ty));
        match self.ast.kind(canonical.node) {
            NodeKind::TypeDecl { def, .. } => match self.ast.kind(*def) {
                NodeKind::DerivedTypeDef { parent, interfaces, .. } => std::iter::once(parent)
                    .chain(interfaces.iter())
                    .filter_map(|mark| self.designated_type(*mark, canonical.rebindings()))
                    .collect(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    pub fn parent_type(&self, ty: &Entity) -> Option<Entity> {
        let canonical = self.canonical_type(&self.type_specific(ty));
        let NodeKind::TypeDecl { def, .. } = self.ast.kind(canonical.node) else {
            return None;
        };
        let NodeKind::DerivedTypeDef { parent, .. } = self.ast.kind(*def) else {
            return None;
        };
        self.designated_type(*parent, canonical.rebindings())
    }

    /// Whether `a` is `b` or derives from it through parents and progenitors
    pub fn is_derived_type(&self, a: &Entity, b: &Entity) -> bool {
        let target = self.canonical_type(&self.type_specific(b));
        let mut visited = HashSet::new();
        self.derives_from(a, &target, 0, &mut visited)
    }

    fn derives_from(&self, a: &Entity, target: &Entity, depth: usize, visited: &mut HashSet<Entity>) -> bool {
        if depth > self.config.max_derivation_depth {
            return false;
        }
        let current = self.canonical_type(&self.type_specific(a));
        if current == *target {
            return true;
        }
        if !visited.insert(current) {
            return false;
        }
        self.base_types(&current)
            .iter()
            .any(|base| self.derives_from(base, target, depth + 1, visited))
    }

    /// Root of the derivation chain, canonical
    pub fn root_type(&self, ty: &Entity) -> Entity {
        let mut current = self.canonical_type(&self.type_specific(ty));
        for _ in 0..self.config.max_derivation_depth {
            match self.parent_type(&current) {
                Some(parent) => current = self.canonical_type(&parent),
                None => break,
            }
        }
        current
    }

    /// Type definition of the root type
    fn root_def(&self, ty: &Entity) -> Option<(Entity, NodeId)> {
        let root = self.root_type(ty);
        match self.ast.kind(root.node) {
            NodeKind::TypeDecl { def, .. } | NodeKind::AnonymousTypeDecl { def } => Some((root, *def)),
            _ => None,
        }
    }

    fn root_def_kind(&self, ty: &Entity) -> Option<&NodeKind> {
        self.root_def(ty).map(|(_, def)| self.ast.kind(def))
    }

    fn universal_kind(&self, ty: &Entity) -> Option<UniversalKind> {
        match self.ast.kind(ty.node) {
            NodeKind::TypeDecl { def, .. } => match self.ast.kind(*def) {
                NodeKind::UniversalTypeDef { kind } => Some(*kind),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_universal_type(&self, ty: &Entity) -> bool {
        self.universal_kind(ty).is_some()
    }

    pub fn is_integer_type(&self, ty: &Entity) -> bool {
        matches!(
            self.root_def_kind(ty),
            Some(
                NodeKind::SignedIntTypeDef { .. }
                    | NodeKind::ModIntTypeDef { .. }
                    | NodeKind::FormalRangeTypeDef
                    | NodeKind::UniversalTypeDef {
                        kind: UniversalKind::Integer
                    }
            )
        )
    }

    pub fn is_modular_type(&self, ty: &Entity) -> bool {
        matches!(self.root_def_kind(ty), Some(NodeKind::ModIntTypeDef { .. }))
    }

    pub fn is_real_type(&self, ty: &Entity) -> bool {
        matches!(
            self.root_def_kind(ty),
            Some(
                NodeKind::FloatTypeDef { .. }
                    | NodeKind::FormalDigitsTypeDef
                    | NodeKind::UniversalTypeDef {
                        kind: UniversalKind::Real
                    }
            )
        )
    }

    pub fn is_numeric_type(&self, ty: &Entity) -> bool {
        self.is_integer_type(ty) || self.is_real_type(ty)
    }

    pub fn is_enum_type(&self, ty: &Entity) -> bool {
        matches!(self.root_def_kind(ty), Some(NodeKind::EnumTypeDef { .. }))
    }

    pub fn is_discrete_type(&self, ty: &Entity) -> bool {
        self.is_integer_type(ty)
            || self.is_enum_type(ty)
            || matches!(self.root_def_kind(ty), Some(NodeKind::FormalDiscreteTypeDef))
    }

    pub fn is_scalar_type(&self, ty: &Entity) -> bool {
        self.is_discrete_type(ty) || self.is_real_type(ty)
    }

    pub fn is_boolean_type(&self, ty: &Entity) -> bool {
        self.standard
            .is_some_and(|standard| self.root_type(ty).node == standard.boolean)
    }

    pub fn is_character_type(&self, ty: &Entity) -> bool {
        self.standard
            .is_some_and(|standard| self.root_type(ty).node == standard.character)
    }

    pub fn is_array_type(&self, ty: &Entity) -> bool {
        !self.is_classwide_type(ty) && matches!(self.root_def_kind(ty), Some(NodeKind::ArrayTypeDef { .. }))
    }

    /// One-dimensional array of characters
    pub fn is_string_type(&self, ty: &Entity) -> bool {
        self.is_array_type(ty)
            && self.index_types(ty).len() == 1
            && self
                .component_type(ty)
                .is_some_and(|component| self.is_character_type(&component))
    }

    pub fn is_record_type(&self, ty: &Entity) -> bool {
        matches!(self.root_def_kind(ty), Some(NodeKind::RecordTypeDef { .. }))
    }

    pub fn is_access_type(&self, ty: &Entity) -> bool {
        !self.is_classwide_type(ty) && matches!(self.root_def_kind(ty), Some(NodeKind::AccessTypeDef { .. }))
    }

    pub fn is_classwide_type(&self, ty: &Entity) -> bool {
        matches!(
            self.ast.kind(self.canonical_type(ty).node),
            NodeKind::ClasswideTypeDecl { .. }
        )
    }

    pub fn is_tagged_type(&self, ty: &Entity) -> bool {
        if self.is_classwide_type(ty) {
            return true;
        }
        let canonical = self.canonical_type(ty);
        if let NodeKind::TypeDecl { classwide: Some(_), .. } = self.ast.kind(canonical.node) {
            return true;
        }
        matches!(
            self.root_def_kind(ty),
            Some(
                NodeKind::RecordTypeDef { tagged: true, .. }
                    | NodeKind::PrivateTypeDef { tagged: true, .. }
                    | NodeKind::InterfaceTypeDef
            )
        )
    }

    pub fn is_limited_type(&self, ty: &Entity) -> bool {
        matches!(
            self.root_def_kind(ty),
            Some(NodeKind::RecordTypeDef { limited: true, .. } | NodeKind::PrivateTypeDef { limited: true, .. })
        )
    }

    /// Scalar types and one-dimensional arrays of discrete components
    pub fn is_orderable_type(&self, ty: &Entity) -> bool {
        self.is_scalar_type(ty)
            || (self.is_array_type(ty)
                && self.index_types(ty).len() == 1
                && self
                    .component_type(ty)
                    .is_some_and(|component| self.is_discrete_type(&component)))
    }

    /// Designated type of an access type
    pub fn accessed_type(&self, ty: &Entity) -> Option<Entity> {
        if self.is_classwide_type(ty) {
            return None;
        }
        let (root, def) = self.root_def(ty)?;
        match self.ast.kind(def) {
            NodeKind::AccessTypeDef { target, .. } => self.designated_type(*target, root.rebindings()),
            _ => None,
        }
    }

    pub fn component_type(&self, ty: &Entity) -> Option<Entity> {
        let (root, def) = self.root_def(ty)?;
        match self.ast.kind(def) {
            NodeKind::ArrayTypeDef { component, .. } => self.designated_type(*component, root.rebindings()),
            _ => None,
        }
    }

    pub fn index_types(&self, ty: &Entity) -> Vec<Entity> {
        if self.is_classwide_type(ty) {
            return Vec::new();
        }
        let Some((root, def)) = self.root_def(ty) else {
            return Vec::new();
        };
        match self.ast.kind(def) {
            NodeKind::ArrayTypeDef { indices, .. } => indices
                .iter()
                .filter_map(|index| self.index_type(*index, root.rebindings()))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn index_type(&self, index: NodeId, rebindings: Option<RebindingId>) -> Option<Entity> {
        match self.ast.kind(index) {
            NodeKind::BinOp { left, right, .. } => self
                .bound_type(*left, rebindings)
                .or_else(|| self.bound_type(*right, rebindings))
                .or_else(|| self.standard.map(|standard| standard.integer_type())),
            _ => self.designated_type(index, rebindings),
        }
    }

    /// Static type of a range bound; literals give nothing
    fn bound_type(&self, bound: NodeId, rebindings: Option<RebindingId>) -> Option<Entity> {
        match self.ast.kind(bound) {
            NodeKind::Identifier { .. } | NodeKind::DottedName { .. } => self
                .static_entities(bound, rebindings)
                .first()
                .and_then(|decl| self.type_of_decl(decl))
                .filter(|ty| !self.is_universal_type(ty)),
            NodeKind::AttributeRef { prefix, .. } => self.designated_type(*prefix, rebindings),
            NodeKind::UnOp { operand, .. } => self.bound_type(*operand, rebindings),
            _ => None,
        }
    }

    /// Discriminants and components, inherited ones first
    pub fn components(&self, ty: &Entity) -> Vec<Entity> {
        let mut out = Vec::new();
        self.collect_components(&self.canonical_type(&self.type_specific(ty)), 0, &mut out);
        out
    }

    fn collect_components(&self, ty: &Entity, depth: usize, out: &mut Vec<Entity>) {
        if depth > self.config.max_derivation_depth {
            return;
        }
        let NodeKind::TypeDecl { discriminants, def, .. } = self.ast.kind(ty.node) else {
            return;
        };
        out.extend(discriminants.iter().map(|d| ty.sibling(*d)));
        match self.ast.kind(*def) {
            NodeKind::RecordTypeDef { components, .. } => out.extend(components.iter().map(|c| ty.sibling(*c))),
            NodeKind::DerivedTypeDef { extension, .. } => {
                if let Some(parent) = self.parent_type(ty) {
                    self.collect_components(&self.canonical_type(&parent), depth + 1, out);
                }
                if let Some(extension) = extension {
                    out.extend(extension.iter().map(|c| ty.sibling(*c)));
                }
            }
            _ => {}
        }
    }

    /// Component or discriminant named `symbol`
    pub(crate) fn component_named(&self, ty: &Entity, symbol: Symbol) -> Option<Entity> {
        let mut current = self.canonical_type(&self.type_specific(ty));
        for _ in 0..=self.config.max_derivation_depth {
            if let Some(record_env) = self.decl_env(current.node) {
                let entries = self.envs.borrow().entries(record_env, symbol);
                let found = entries.into_iter().find(|entry| {
                    matches!(
                        self.ast.kind(entry.decl),
                        NodeKind::ComponentDecl { .. } | NodeKind::DiscriminantSpec { .. }
                    )
                });
                if let Some(entry) = found {
                    return Some(current.sibling(entry.decl));
                }
            }
            current = self.canonical_type(&self.parent_type(&current)?);
        }
        None
    }

    /// Primitive operations: subprograms of the type's declarative region
    /// with a parameter or result of the type, then inherited ones that are
    /// not overridden. Each carries the type in its metadata.
    pub fn primitives(&self, ty: &Entity) -> Vec<Entity> {
        let canonical = self.canonical_type(&self.type_specific(ty));
        if let Some(cached) = self.caches.primitives.borrow().get(&canonical) {
            return cached.clone();
        }
        // Re-entrant requests see no primitives
        self.caches.primitives.borrow_mut().insert(canonical, Vec::new());

        let mut all = self.own_primitives(&canonical);
        all.extend(self.inherited_primitives(&canonical));

        self.caches.primitives.borrow_mut().insert(canonical, all.clone());
        all
    }

    fn own_primitives(&self, ty: &Entity) -> Vec<Entity> {
        let md = Metadata::primitive_of(ty.node);
        let mut out = Vec::new();
        for region in self.declarative_region(ty.node) {
            for decl in region {
                if !matches!(self.ast.kind(decl), NodeKind::SubpDecl { .. } | NodeKind::SubpBody { .. }) {
                    continue;
                }
                let subp = ty.sibling(decl);
                if self.is_primitive_of(&subp, ty) {
                    out.push(subp.with_metadata(md));
                }
            }
        }
        out
    }

    /// Declaration lists of the region `decl` is declared in; a package
    /// region spans both its public and private parts
    fn declarative_region(&self, decl: NodeId) -> Vec<Vec<NodeId>> {
        let Some(parent) = self.ast.parent(decl) else {
            return Vec::new();
        };
        match self.ast.kind(parent) {
            NodeKind::PackageDecl { public, private, .. } => {
                let mut lists = vec![public.clone()];
                if let Some(private) = private {
                    lists.push(private.clone());
                }
                lists
            }
            NodeKind::PackageBody { decls, .. } | NodeKind::SubpBody { decls, .. } | NodeKind::BlockStmt { decls, .. } => {
                vec![decls.clone()]
            }
            _ => Vec::new(),
        }
    }

    fn is_primitive_of(&self, subp: &Entity, ty: &Entity) -> bool {
        let controls = |t: Option<Entity>| {
            t.is_some_and(|t| {
                let t = if self.is_anonymous_access(&t) {
                    match self.accessed_type(&t) {
                        Some(target) => target,
                        None => return false,
                    }
                } else {
                    t
                };
                !self.is_classwide_type(&t) && self.canonical_type(&t) == *ty
            })
        };
        self.param_specs(subp)
            .into_iter()
            .any(|param| controls(self.type_of_decl(&param)))
            || controls(self.raw_return_type(subp))
    }

    /// Primitives of the parent type (and progenitors) seen as primitives of
    /// `derived`, minus those `derived` overrides
    pub(crate) fn inherited_primitives(&self, derived: &Entity) -> Vec<Entity> {
        let canonical = self.canonical_type(&self.type_specific(derived));
        let own = self.own_primitives(&canonical);
        let md = Metadata::primitive_of(canonical.node);
        let mut out: Vec<Entity> = Vec::new();
        for base in self.base_types(&canonical) {
            for inherited in self.primitives(&base) {
                let overridden = own.iter().any(|mine| self.same_profile_shape(mine, &inherited));
                let duplicate = out.iter().any(|seen| seen.node == inherited.node);
                if !overridden && !duplicate {
                    out.push(inherited.with_metadata(md));
                }
            }
        }
        out
    }

    /// Same name, same kind and same number of parameters
    fn same_profile_shape(&self, a: &Entity, b: &Entity) -> bool {
        let (Some(sa), Some(sb)) = (self.subp_spec(a.node), self.subp_spec(b.node)) else {
            return false;
        };
        let (
            NodeKind::SubpSpec { kind: ka, params: pa, .. },
            NodeKind::SubpSpec { kind: kb, params: pb, .. },
        ) = (self.ast.kind(sa), self.ast.kind(sb))
        else {
            return false;
        };
        self.decl_symbol(a.node) == self.decl_symbol(b.node)
            && ka == kb
            && self.param_count(pa) == self.param_count(pb)
    }

    fn param_count(&self, params: &[NodeId]) -> usize {
        params
            .iter()
            .map(|p| match self.ast.kind(*p) {
                NodeKind::ParamSpec { names, .. } => names.len(),
                _ => 0,
            })
            .sum()
    }

    pub(crate) fn is_anonymous_access(&self, ty: &Entity) -> bool {
        matches!(self.ast.kind(ty.node), NodeKind::AnonymousTypeDecl { def } if matches!(self.ast.kind(*def), NodeKind::AccessTypeDef { .. }))
    }

    /// Specification of a subprogram-like declaration
    pub(crate) fn subp_spec(&self, decl: NodeId) -> Option<NodeId> {
        match self.ast.kind(decl) {
            NodeKind::SubpDecl { spec, .. } | NodeKind::SubpBody { spec, .. } | NodeKind::FormalSubpDecl { spec, .. } => {
                Some(*spec)
            }
            NodeKind::GenericSubpDecl { subp, .. } => self.subp_spec(*subp),
            NodeKind::SubpSpec { .. } => Some(decl),
            _ => None,
        }
    }

    /// Parameter specifications of a subprogram, seen through its rebindings
    pub(crate) fn param_specs(&self, subp: &Entity) -> Vec<Entity> {
        let Some(spec) = self.subp_spec(subp.node) else {
            return Vec::new();
        };
        match self.ast.kind(spec) {
            NodeKind::SubpSpec { params, .. } => params.iter().map(|p| subp.sibling(*p)).collect(),
            _ => Vec::new(),
        }
    }

    pub(crate) fn is_function(&self, decl: NodeId) -> bool {
        self.subp_spec(decl).is_some_and(|spec| {
            matches!(
                self.ast.kind(spec),
                NodeKind::SubpSpec {
                    kind: ferrada_syntax::SubpKind::Function,
                    ..
                }
            )
        })
    }

    fn raw_return_type(&self, subp: &Entity) -> Option<Entity> {
        let spec = self.subp_spec(subp.node)?;
        match self.ast.kind(spec) {
            NodeKind::SubpSpec { returns: Some(returns), .. } => self.designated_type(*returns, subp.rebindings()),
            _ => None,
        }
    }

    /// Result type of a function, with the controlling type substituted for
    /// inherited primitives
    pub fn return_type(&self, subp: &Entity) -> Option<Entity> {
        let ty = self.raw_return_type(subp)?;
        Some(self.substitute_controlling(subp, ty))
    }

    /// Type of a formal parameter of `subp`
    pub(crate) fn formal_type(&self, subp: &Entity, param: &Entity) -> Option<Entity> {
        let ty = self.type_of_decl(param)?;
        Some(self.substitute_controlling(subp, ty))
    }

    /// An inherited primitive of `D` takes and returns `D` where its
    /// declaration says the ancestor type
    fn substitute_controlling(&self, subp: &Entity, ty: Entity) -> Entity {
        let Some(owner) = subp.md().primitive else {
            return ty;
        };
        let owner = Entity::new(owner);
        if self.is_classwide_type(&ty) || self.is_anonymous_access(&ty) {
            return ty;
        }
        let canonical = self.canonical_type(&ty);
        if canonical != self.canonical_type(&owner) && self.is_derived_type(&owner, &canonical) {
            owner
        } else {
            ty
        }
    }

    /// Built-in relation: `a` and `b` are the same type, or a universal
    /// numeric type meets a type of its class, or two access types designate
    /// the same type and one of them is anonymous
    pub fn matching_type(&self, a: &Entity, b: &Entity) -> bool {
        let (ca, cb) = (self.canonical_type(a), self.canonical_type(b));
        if ca == cb {
            return true;
        }
        match (self.universal_kind(&ca), self.universal_kind(&cb)) {
            (Some(UniversalKind::Integer), _) => return self.is_integer_type(&cb),
            (_, Some(UniversalKind::Integer)) => return self.is_integer_type(&ca),
            (Some(UniversalKind::Real), _) => return self.is_real_type(&cb),
            (_, Some(UniversalKind::Real)) => return self.is_real_type(&ca),
            _ => {}
        }
        if (self.is_anonymous_access(&ca) || self.is_anonymous_access(&cb))
            && self.is_access_type(&ca)
            && self.is_access_type(&cb)
        {
            return match (self.accessed_type(&ca), self.accessed_type(&cb)) {
                (Some(ta), Some(tb)) => self.canonical_type(&ta) == self.canonical_type(&tb),
                _ => false,
            };
        }
        false
    }

    /// Actual against formal: classwide formals accept descendants, and a
    /// classwide actual may be passed to a controlling formal (dispatching)
    pub fn matching_formal_type(&self, actual: &Entity, formal: &Entity) -> bool {
        if self.matching_type(actual, formal) {
            return true;
        }
        if self.is_classwide_type(formal) && self.is_derived_type(actual, formal) {
            return true;
        }
        if self.is_classwide_type(actual)
            && !self.is_classwide_type(formal)
            && self.is_tagged_type(formal)
            && self.is_derived_type(actual, formal)
        {
            return true;
        }
        if self.is_access_type(actual) && self.is_anonymous_access(&self.canonical_type(formal)) {
            if let (Some(ta), Some(tf)) = (self.accessed_type(actual), self.accessed_type(formal)) {
                return self.canonical_type(&ta) == self.canonical_type(&tf)
                    || (self.is_classwide_type(&tf) && self.is_derived_type(&ta, &tf));
            }
        }
        false
    }

    pub fn matching_formal_type_inverted(&self, formal: &Entity, actual: &Entity) -> bool {
        self.matching_formal_type(actual, formal)
    }

    /// Value against assignment target
    pub fn matching_assign_type(&self, value: &Entity, target: &Entity) -> bool {
        if self.matching_type(value, target) {
            return true;
        }
        if self.is_classwide_type(target) && self.is_derived_type(value, target) {
            return true;
        }
        if self.is_access_type(value) && self.is_access_type(target) {
            if let (Some(tv), Some(tt)) = (self.accessed_type(value), self.accessed_type(target)) {
                return (self.is_anonymous_access(&self.canonical_type(value))
                    || self.is_anonymous_access(&self.canonical_type(target)))
                    && (self.canonical_type(&tv) == self.canonical_type(&tt)
                        || (self.is_classwide_type(&tt) && self.is_derived_type(&tv, &tt)));
            }
        }
        false
    }

    /// Prefix of a dot-notation call against the first formal; the prefix
    /// may be implicitly dereferenced, or implicitly referenced for an
    /// access formal
    pub fn matching_prefix_type(&self, prefix: &Entity, formal: &Entity) -> bool {
        if self.matching_formal_type(prefix, formal) {
            return true;
        }
        if let Some(target) = self.accessed_type(prefix) {
            if self.matching_formal_type(&target, formal) {
                return true;
            }
        }
        if let Some(target) = self.accessed_type(formal) {
            if self.matching_formal_type(prefix, &target) {
                return true;
            }
        }
        false
    }

    /// Allocated type against the access type of the allocator
    pub fn matching_allocator_type(&self, allocated: &Entity, access: &Entity) -> bool {
        match self.accessed_type(access) {
            Some(target) => self.matching_type(allocated, &target) || self.is_derived_type(allocated, &target),
            None => false,
        }
    }
}

/// Entity without metadata, for memo keys
fn strip(entity: &Entity) -> Entity {
    entity.with_metadata(Metadata::default())
}
