//! Environment population
//!
//! One walk per compilation unit. Declarations are inserted into the
//! environment they are declared in before their children are visited, so
//! that forward references inside a scope see every declaration of the scope
//! (sequential visibility is applied at lookup time, not here).

use crate::context::AnalysisContext;
use crate::env::{EnvArena, EnvEntry, EnvId, EnvRef};
use crate::standard::is_universal_decl;
use crate::symbols::{simple_name, SymbolTable};
use ferrada_syntax::{Ast, NodeId, NodeKind, UnitId, UnitKind};
use std::collections::HashMap;
use tracing::trace;

/// Environments created by population, keyed by the nodes that own them
#[derive(Debug, Clone)]
pub(crate) struct Scopes {
    pub root: EnvId,
    /// Environment every populated node was visited in
    pub node_env: HashMap<NodeId, EnvId>,
    /// Scope opened by a declaration
    pub decl_env: HashMap<NodeId, EnvId>,
    /// Private part of a package declaration
    pub private_env: HashMap<NodeId, EnvId>,
    /// Package body to the package declaration it completes
    pub body_of: HashMap<NodeId, NodeId>,
}

impl Scopes {
    pub fn new(root: EnvId) -> Self {
        Self {
            root,
            node_env: HashMap::new(),
            decl_env: HashMap::new(),
            private_env: HashMap::new(),
            body_of: HashMap::new(),
        }
    }
}

impl AnalysisContext {
    pub(crate) fn populate_unit(&mut self, unit: UnitId) {
        let mut populator = Populator {
            ast: &self.ast,
            symbols: self.symbols.get_mut(),
            envs: self.envs.get_mut(),
            scopes: &mut self.scopes,
        };
        populator.unit(unit);
    }
}

struct Populator<'a> {
    ast: &'a Ast,
    symbols: &'a mut SymbolTable,
    envs: &'a mut EnvArena,
    scopes: &'a mut Scopes,
}

impl Populator<'_> {
    fn unit(&mut self, unit: UnitId) {
        let ast = self.ast;
        let info = ast.unit(unit);
        let root = info.root;
        let NodeKind::CompilationUnit { prelude, item } = ast.kind(root) else {
            return;
        };
        let item = *item;
        let parent_name = info.name.rsplit_once('.').map(|(parent, _)| parent.to_string());

        // Where the library item is registered, and what its unit scope sees
        let (register_env, scope_parent) = match (info.kind, ast.kind(item)) {
            (UnitKind::Body, NodeKind::PackageBody { .. }) => {
                let spec = self.library_package(&info.name);
                let private = spec.and_then(|s| self.scopes.private_env.get(&s).copied());
                (None, private.unwrap_or(self.scopes.root))
            }
            (UnitKind::Body, _) => {
                let parent = parent_name.as_deref().and_then(|p| self.library_package(p));
                let register = parent
                    .and_then(|p| self.scopes.decl_env.get(&p).copied())
                    .unwrap_or(self.scopes.root);
                let scope = parent
                    .and_then(|p| self.scopes.private_env.get(&p).copied())
                    .unwrap_or(register);
                (Some(register), scope)
            }
            (UnitKind::Spec, _) => {
                let parent = parent_name.as_deref().and_then(|p| self.library_package(p));
                let register = parent
                    .and_then(|p| self.scopes.decl_env.get(&p).copied())
                    .unwrap_or(self.scopes.root);
                (Some(register), register)
            }
        };

        let unit_env = self.envs.create(Some(scope_parent), Some(root));
        self.scopes.node_env.insert(root, unit_env);
        for clause in prelude {
            self.walk(*clause, unit_env);
        }

        if let Some(register_env) = register_env {
            self.register(register_env, item);
        }
        self.walk_item(item, unit_env, true);

        // A child unit's private part sees its parent's private part
        if info.kind == UnitKind::Spec {
            let parent = parent_name.as_deref().and_then(|p| self.library_package(p));
            let parent_private = parent.and_then(|p| self.scopes.private_env.get(&p).copied());
            let own = self.package_of(item);
            let own_private = own.and_then(|p| self.scopes.private_env.get(&p).copied());
            if let (Some(parent_private), Some(own_private)) = (parent_private, own_private) {
                self.envs.add_ref(own_private, EnvRef::Env(parent_private));
            }
        }
        trace!(unit = %info.name, envs = self.envs.len(), "unit populated");
    }

    /// Package declaration of the library unit `name`, if populated
    fn library_package(&self, name: &str) -> Option<NodeId> {
        let unit = self.ast.find_unit(name, UnitKind::Spec)?;
        let NodeKind::CompilationUnit { item, .. } = self.ast.kind(self.ast.unit(unit).root) else {
            return None;
        };
        self.package_of(*item)
    }

    /// The package declaration of a package or generic package item
    fn package_of(&self, item: NodeId) -> Option<NodeId> {
        match self.ast.kind(item) {
            NodeKind::PackageDecl { .. } => Some(item),
            NodeKind::GenericPackageDecl { package, .. } => Some(*package),
            _ => None,
        }
    }

    /// Insert every defining name of `decl` into `env`
    fn register(&mut self, env: EnvId, decl: NodeId) {
        if is_universal_decl(self.ast, decl) {
            return;
        }
        for name in self.ast.defining_names(decl) {
            if let Some(text) = self.ast.text(name) {
                let symbol = self.symbols.intern(simple_name(text));
                self.envs.add(env, symbol, EnvEntry::new(decl));
            }
        }
    }

    fn walk_all(&mut self, nodes: &[NodeId], env: EnvId) {
        for node in nodes {
            self.walk(*node, env);
        }
    }

    /// Visit `node` (registering it when it declares something) and its children
    fn walk(&mut self, node: NodeId, env: EnvId) {
        match self.ast.kind(node) {
            NodeKind::PackageDecl { .. }
            | NodeKind::GenericPackageDecl { .. }
            | NodeKind::GenericSubpDecl { .. }
            | NodeKind::GenericInstantiation { .. }
            | NodeKind::FormalSubpDecl { .. }
            | NodeKind::FormalPackageDecl { .. }
            | NodeKind::TypeDecl { .. }
            | NodeKind::SubtypeDecl { .. }
            | NodeKind::EnumLiteralDecl { .. }
            | NodeKind::ComponentDecl { .. }
            | NodeKind::DiscriminantSpec { .. }
            | NodeKind::ObjectDecl { .. }
            | NodeKind::NumberDecl { .. }
            | NodeKind::ParamSpec { .. }
            | NodeKind::SubpDecl { .. }
            | NodeKind::SubpBody { .. }
            | NodeKind::ForLoopVarDecl { .. } => self.register(env, node),
            _ => {}
        }
        self.walk_item(node, env, false);
    }

    /// Visit a node that has already been registered (or never is)
    fn walk_item(&mut self, node: NodeId, env: EnvId, library: bool) {
        self.scopes.node_env.insert(node, env);
        let ast = self.ast;
        match ast.kind(node) {
            NodeKind::UseClause { names } => {
                for name in names {
                    self.envs.add_ref(env, EnvRef::UseClause { clause: node, name: *name });
                }
                self.walk_all(names, env);
            }
            NodeKind::UseTypeClause { names } => {
                for mark in names {
                    self.envs.add_ref(env, EnvRef::UseType { clause: node, mark: *mark });
                }
                self.walk_all(names, env);
            }
            NodeKind::PackageDecl { name, public, private } => {
                let public_env = self.envs.create(Some(env), Some(node));
                let private_env = self.envs.create(Some(public_env), Some(node));
                self.scopes.decl_env.insert(node, public_env);
                self.scopes.private_env.insert(node, private_env);
                self.walk(*name, env);
                self.walk_all(public, public_env);
                if let Some(private) = private {
                    self.walk_all(private, private_env);
                }
            }
            NodeKind::PackageBody { name, decls, stmts } => {
                let spec = self.body_spec(node, env, library);
                let parent = match spec {
                    Some(spec) if !library => self.scopes.private_env.get(&spec).copied().unwrap_or(env),
                    _ => env,
                };
                if let Some(spec) = spec {
                    self.scopes.body_of.insert(node, spec);
                }
                let body_env = self.envs.create(Some(parent), Some(node));
                self.scopes.decl_env.insert(node, body_env);
                self.walk(*name, env);
                self.walk_all(decls, body_env);
                self.walk_all(stmts, body_env);
            }
            NodeKind::GenericPackageDecl { formals, package } => {
                let formal_env = self.envs.create(Some(env), Some(node));
                self.scopes.decl_env.insert(node, formal_env);
                self.walk_all(formals, formal_env);
                self.walk_item(*package, formal_env, false);
            }
            NodeKind::GenericSubpDecl { formals, subp } => {
                let formal_env = self.envs.create(Some(env), Some(node));
                self.scopes.decl_env.insert(node, formal_env);
                self.walk_all(formals, formal_env);
                self.walk_item(*subp, formal_env, false);
            }
            NodeKind::FormalSubpDecl { spec, .. } | NodeKind::SubpDecl { spec, .. } => {
                let subp_env = self.envs.create(Some(env), Some(node));
                self.scopes.decl_env.insert(node, subp_env);
                self.walk_item(*spec, subp_env, false);
            }
            NodeKind::SubpBody { spec, decls, stmts } => {
                let body_env = self.envs.create(Some(env), Some(node));
                self.scopes.decl_env.insert(node, body_env);
                self.walk_item(*spec, body_env, false);
                self.walk_all(decls, body_env);
                self.walk_all(stmts, body_env);
            }
            NodeKind::TypeDecl {
                name,
                discriminants,
                def,
                classwide,
            } => {
                if let Some(classwide) = classwide {
                    self.scopes.node_env.insert(*classwide, env);
                }
                let has_components = !discriminants.is_empty()
                    || matches!(
                        ast.kind(*def),
                        NodeKind::RecordTypeDef { .. } | NodeKind::DerivedTypeDef { extension: Some(_), .. }
                    );
                let inner = if has_components {
                    let record_env = self.envs.create(Some(env), Some(node));
                    self.scopes.decl_env.insert(node, record_env);
                    record_env
                } else {
                    env
                };
                if matches!(ast.kind(*def), NodeKind::DerivedTypeDef { .. }) {
                    self.envs.add_ref(env, EnvRef::InheritedPrimitives { type_decl: node });
                }
                self.walk(*name, env);
                self.walk_all(discriminants, inner);
                self.walk_type_def(*def, env, inner);
            }
            NodeKind::ForLoop { spec, stmts } => {
                let loop_env = self.envs.create(Some(env), Some(node));
                self.scopes.decl_env.insert(node, loop_env);
                self.walk(*spec, loop_env);
                self.walk_all(stmts, loop_env);
            }
            NodeKind::ForLoopSpec { var, iter, .. } => {
                self.walk(*var, env);
                // The iteration range is evaluated outside the loop
                let outer = self.envs.parent(env).unwrap_or(env);
                self.walk(*iter, outer);
            }
            NodeKind::BlockStmt { decls, stmts } => {
                let block_env = self.envs.create(Some(env), Some(node));
                self.scopes.decl_env.insert(node, block_env);
                self.walk_all(decls, block_env);
                self.walk_all(stmts, block_env);
            }
            kind => {
                for child in kind.children() {
                    self.walk(child, env);
                }
            }
        }
    }

    /// Type definitions: enumeration literals go next to the type, record
    /// components into the type's own scope
    fn walk_type_def(&mut self, def: NodeId, env: EnvId, inner: EnvId) {
        self.scopes.node_env.insert(def, env);
        let ast = self.ast;
        match ast.kind(def) {
            NodeKind::RecordTypeDef { components, .. } => self.walk_all(components, inner),
            NodeKind::DerivedTypeDef {
                parent,
                interfaces,
                extension,
                ..
            } => {
                self.walk(*parent, env);
                self.walk_all(interfaces, env);
                if let Some(extension) = extension {
                    self.walk_all(extension, inner);
                }
            }
            kind => {
                for child in kind.children() {
                    self.walk(child, env);
                }
            }
        }
    }

    /// Package declaration completed by a package body
    fn body_spec(&self, body: NodeId, env: EnvId, library: bool) -> Option<NodeId> {
        if library {
            let unit = self.ast.unit_of(body)?;
            return self.library_package(&self.ast.unit(unit).name);
        }
        let text = self.ast.decl_name(body)?;
        let symbol = self.symbols.get(simple_name(text))?;
        let mut current = Some(env);
        while let Some(scope) = current {
            let found = self.envs.entries(scope, symbol).into_iter().find_map(|entry| {
                self.package_of(entry.decl)
            });
            if found.is_some() {
                return found;
            }
            current = self.envs.parent(scope);
        }
        None
    }
}
