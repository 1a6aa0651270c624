//! Analysis context
//!
//! Owns the syntax tree, the symbol table, environments, rebinding chains,
//! memo tables and committed resolution results. Building and population
//! need `&mut self`; every query afterwards works through `&self`, with the
//! memo tables behind `RefCell`s.

use crate::config::AnalysisConfig;
use crate::dependency_graph::{unit_dependencies, DependencyGraph};
use crate::entity::{Entity, RebindingArena, RebindingId};
use crate::env::{EnvArena, EnvId, EnvRef};
use crate::error::{Result, SemanticError};
use crate::generics::Instantiation;
use crate::logic::LogicVar;
use crate::population::Scopes;
use crate::standard::Standard;
use crate::symbols::{Symbol, SymbolTable};
use ferrada_syntax::{Ast, AstBuilder, NodeId, UnitId, UnitKind};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

/// Source of compilation units requested by `with` clauses and parent names
pub trait UnitProvider {
    /// Find the unit `name` of the given kind. When `load_if_needed` is set
    /// and the unit is not in `ast` yet, the provider may build it there.
    fn get_unit(&self, ast: &mut Ast, name: &str, kind: UnitKind, load_if_needed: bool) -> Option<UnitId>;
}

/// Resolution state of an entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResolveStatus {
    Resolving,
    Resolved(bool),
}

/// Lazily resolved target of an environment reference
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RefTarget {
    InProgress,
    /// Environments to search flat, each with its rebindings
    Envs(Vec<(EnvId, Option<RebindingId>)>),
    /// The reference denotes nothing
    Nothing,
}

/// Memo tables; never invalidated once environments are populated
#[derive(Debug, Default)]
pub(crate) struct Caches {
    pub canonical_types: RefCell<HashMap<Entity, Entity>>,
    pub full_views: RefCell<HashMap<Entity, Option<Entity>>>,
    pub designated_types: RefCell<HashMap<(NodeId, Option<RebindingId>), Option<Entity>>>,
    pub primitives: RefCell<HashMap<Entity, Vec<Entity>>>,
    pub ref_targets: RefCell<HashMap<(EnvRef, Option<RebindingId>), RefTarget>>,
    pub instantiations: RefCell<HashMap<(NodeId, Option<RebindingId>), Result<Option<Instantiation>>>>,
}

/// Committed results of name resolution
#[derive(Debug, Default)]
pub(crate) struct ResolutionState {
    pub status: RefCell<HashMap<NodeId, ResolveStatus>>,
    pub bindings: RefCell<HashMap<LogicVar, Entity>>,
}

/// Everything one analysis needs
pub struct AnalysisContext {
    pub(crate) config: AnalysisConfig,
    pub(crate) ast: Ast,
    pub(crate) symbols: RefCell<SymbolTable>,
    pub(crate) envs: RefCell<EnvArena>,
    pub(crate) rebindings: RefCell<RebindingArena>,
    pub(crate) scopes: Scopes,
    pub(crate) standard: Option<Standard>,
    pub(crate) caches: Caches,
    pub(crate) resolution: ResolutionState,
    provider: Option<Box<dyn UnitProvider>>,
    populated: HashSet<UnitId>,
}

impl fmt::Debug for AnalysisContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisContext")
            .field("config", &self.config)
            .field("nodes", &self.ast.len())
            .field("envs", &self.envs.borrow().len())
            .field("populated", &self.populated.len())
            .finish()
    }
}

impl AnalysisContext {
    /// Context with the default configuration and `Standard` loaded
    pub fn new() -> Result<Self> {
        Self::with_config(AnalysisConfig::default())
    }

    pub fn with_config(config: AnalysisConfig) -> Result<Self> {
        let mut ast = Ast::new();
        let standard = if config.load_standard {
            Some(Standard::build(&mut ast)?)
        } else {
            None
        };

        let mut envs = EnvArena::new();
        let root = envs.create(None, None);

        let mut context = Self {
            config,
            ast,
            symbols: RefCell::new(SymbolTable::new()),
            envs: RefCell::new(envs),
            rebindings: RefCell::new(RebindingArena::new()),
            scopes: Scopes::new(root),
            standard,
            caches: Caches::default(),
            resolution: ResolutionState::default(),
            provider: None,
            populated: HashSet::new(),
        };

        if let Some(standard) = context.standard {
            context.populate_unit(standard.unit);
            context.populated.insert(standard.unit);
            if let Some(public) = context.scopes.decl_env.get(&standard.package).copied() {
                context.envs.get_mut().add_ref(root, EnvRef::Env(public));
            }
        }
        Ok(context)
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn standard(&self) -> Option<&Standard> {
        self.standard.as_ref()
    }

    pub fn root_env(&self) -> EnvId {
        self.scopes.root
    }

    pub fn set_unit_provider(&mut self, provider: Box<dyn UnitProvider>) {
        self.provider = Some(provider);
    }

    /// Build a compilation unit; it is populated by the next [`Self::populate`]
    pub fn add_unit<F>(&mut self, name: &str, kind: UnitKind, f: F) -> Result<UnitId>
    where
        F: FnOnce(&AstBuilder<'_>) -> NodeId,
    {
        Ok(self.ast.build_unit(name, kind, f)?)
    }

    /// Unit lookup without loading; the only form used during resolution
    pub fn get_unit(&self, name: &str, kind: UnitKind) -> Option<UnitId> {
        self.ast.find_unit(name, kind)
    }

    pub fn is_populated(&self, unit: UnitId) -> bool {
        self.populated.contains(&unit)
    }

    /// Populate every unit added so far, in dependency order, loading
    /// missing dependencies from the unit provider
    pub fn populate(&mut self) -> Result<()> {
        self.load_missing_units();

        let pending: Vec<UnitId> = self
            .ast
            .units()
            .map(|(id, _)| id)
            .filter(|id| !self.populated.contains(id))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let result = DependencyGraph::build(&self.ast, &pending).resolve();
        if let Some(cycle) = result.circular_dependencies.first() {
            let names: Vec<&str> = cycle.iter().map(|u| self.ast.unit(*u).name.as_str()).collect();
            return Err(SemanticError::CircularDependency {
                cycle: names.join(" -> "),
            });
        }
        for (unit, missing) in &result.unresolved_dependencies {
            warn!(unit = %self.ast.unit(*unit).name, ?missing, "units not available");
        }

        for unit in result.compilation_order {
            debug!(unit = %self.ast.unit(unit).name, "populating unit");
            self.populate_unit(unit);
            self.populated.insert(unit);
        }
        Ok(())
    }

    fn load_missing_units(&mut self) {
        let Some(provider) = self.provider.take() else {
            return;
        };
        let mut seen = HashSet::new();
        loop {
            let mut loaded = false;
            let units: Vec<UnitId> = self.ast.units().map(|(id, _)| id).collect();
            for unit in units {
                for dep in unit_dependencies(&self.ast, unit) {
                    if !dep.required || self.ast.find_unit(&dep.name, dep.kind).is_some() {
                        continue;
                    }
                    if !seen.insert((dep.name.clone(), dep.kind)) {
                        continue;
                    }
                    if provider
                        .get_unit(&mut self.ast, &dep.name, dep.kind, true)
                        .is_some()
                    {
                        debug!(unit = %dep.name, "loaded unit from provider");
                        loaded = true;
                    }
                }
            }
            if !loaded {
                break;
            }
        }
        self.provider = Some(provider);
    }

    /// Fail with `NotPopulated` unless the unit holding `node` is populated
    pub(crate) fn check_populated(&self, node: NodeId) -> Result<()> {
        match self.ast.unit_of(node) {
            Some(unit) if self.populated.contains(&unit) => Ok(()),
            _ => Err(SemanticError::NotPopulated),
        }
    }

    pub(crate) fn intern(&self, name: &str) -> Symbol {
        self.symbols.borrow_mut().intern(name)
    }

    pub(crate) fn symbol(&self, name: &str) -> Option<Symbol> {
        self.symbols.borrow().get(name)
    }

    /// Environment a node was populated in
    pub fn node_env(&self, node: NodeId) -> Option<EnvId> {
        self.scopes.node_env.get(&node).copied()
    }

    /// Scope opened by a declaration (package public part, subprogram,
    /// record, generic formal part, loop, block)
    pub fn decl_env(&self, node: NodeId) -> Option<EnvId> {
        self.scopes.decl_env.get(&node).copied()
    }

    /// Private part of a package declaration
    pub fn private_env(&self, package: NodeId) -> Option<EnvId> {
        self.scopes.private_env.get(&package).copied()
    }
}
