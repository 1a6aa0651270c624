//! Generic instantiation
//!
//! An instantiation gets its own environment binding each generic formal to
//! its actual, and a rebinding link from the generic's formal part to that
//! environment. Lookups made under the link see the actuals in place of the
//! formals; formal objects keep their declaration and are typed through the
//! rebound formal types. A formal package is instantiated the same way, its
//! `(<>)` form binding nothing.

use crate::calls::{match_formals, SingleFormal};
use crate::context::AnalysisContext;
use crate::entity::{rebind, Entity, RebindingId};
use crate::env::{EnvEntry, EnvId};
use crate::error::Result;
use crate::lookup::Lookup;
use crate::symbols::Symbol;
use ferrada_syntax::{FormalSubpDefault, InstantiationKind, NodeId, NodeKind};
use tracing::debug;

/// Instantiation environment of one generic instantiation under one
/// rebinding context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instantiation {
    pub generic: Entity,
    pub env: EnvId,
    /// Link from the generic's formal part to `env`, on top of the chain
    /// the generic was reached through
    pub rebindings: RebindingId,
}

impl AnalysisContext {
    /// Instantiation environment of a generic instantiation (or formal
    /// package) entity, built on first request
    pub fn instantiation(&self, instance: &Entity) -> Result<Option<Instantiation>> {
        let key = (instance.node, instance.rebindings());
        if let Some(cached) = self.caches.instantiations.borrow().get(&key) {
            return cached.clone();
        }
        // Re-entrant requests (an actual naming the instance itself) see nothing
        self.caches.instantiations.borrow_mut().insert(key, Ok(None));

        let Some(created) = self.create_instantiation(instance) else {
            return Ok(None);
        };
        self.caches.instantiations.borrow_mut().insert(key, Ok(Some(created)));
        let result = self.bind_actuals(instance, &created).map(|()| Some(created));
        self.caches.instantiations.borrow_mut().insert(key, result.clone());
        result
    }

    /// Generic name and actuals of a generic instantiation or formal
    /// package; `None` actuals stand for `(<>)`
    pub(crate) fn instance_parts(&self, node: NodeId) -> Option<(NodeId, Option<&[NodeId]>)> {
        match self.ast.kind(node) {
            NodeKind::GenericInstantiation { generic, actuals, .. } => Some((*generic, Some(actuals.as_slice()))),
            NodeKind::FormalPackageDecl { generic, actuals, .. } => Some((*generic, actuals.as_deref())),
            _ => None,
        }
    }

    fn create_instantiation(&self, instance: &Entity) -> Option<Instantiation> {
        let (generic, _) = self.instance_parts(instance.node)?;
        let generic = self
            .static_entities(generic, instance.rebindings())
            .into_iter()
            .find(|e| {
                matches!(
                    self.ast.kind(e.node),
                    NodeKind::GenericPackageDecl { .. } | NodeKind::GenericSubpDecl { .. }
                )
            })?;
        let formal_env = self.decl_env(generic.node)?;
        let env = self
            .envs
            .borrow_mut()
            .create_instantiation(self.node_env(instance.node), instance.node);
        let rebindings = self
            .rebindings
            .borrow_mut()
            .append(generic.rebindings(), formal_env, env);
        debug!(
            instance = %instance.node,
            generic = %generic.node,
            %env,
            "created instantiation environment"
        );
        Some(Instantiation {
            generic,
            env,
            rebindings,
        })
    }

    /// Bind each formal of the generic to its actual in the instantiation
    /// environment. Formals left unbound are seen as themselves.
    fn bind_actuals(&self, instance: &Entity, created: &Instantiation) -> Result<()> {
        let Some((_, Some(actuals))) = self.instance_parts(instance.node) else {
            return Ok(());
        };
        let formals = self.generic_formals(&created.generic);
        let actuals = self.actuals(actuals);
        let matches = match_formals(&formals, &actuals, false).unwrap_or_default();

        // Types and packages first: subprogram profiles are compared through them
        for m in &matches {
            let Some(actual) = m.actual else {
                continue;
            };
            let bound = match self.ast.kind(m.formal.spec.node) {
                NodeKind::TypeDecl { .. } => self.designated_type(actual.expr, instance.rebindings()),
                NodeKind::FormalPackageDecl { .. } => self.formal_package_actual(&m.formal.spec, actual.expr, instance)?,
                _ => None,
            };
            if let Some(bound) = bound {
                self.bind_formal(created.env, m.formal.name, &bound);
            }
        }
        for m in &matches {
            let NodeKind::FormalSubpDecl { default, .. } = self.ast.kind(m.formal.spec.node) else {
                continue;
            };
            let formal = self.rebind_entity(&m.formal.spec, Some(created.rebindings))?;
            let actual = match m.actual {
                Some(actual) if matches!(self.ast.kind(actual.expr), NodeKind::BoxExpr) => {
                    self.box_actual(&m.formal, &formal, instance, true)
                }
                Some(actual) => self
                    .static_entities(actual.expr, instance.rebindings())
                    .into_iter()
                    .find(|candidate| self.subp_decl_match_signature(&formal, candidate)),
                None => match default {
                    FormalSubpDefault::Box => self.box_actual(&m.formal, &formal, instance, false),
                    FormalSubpDefault::Name(name) => self
                        .static_entities(*name, Some(created.rebindings))
                        .into_iter()
                        .find(|candidate| self.subp_decl_match_signature(&formal, candidate)),
                    FormalSubpDefault::None => None,
                },
            };
            if let Some(actual) = actual {
                self.bind_formal(created.env, m.formal.name, &actual);
            }
        }
        Ok(())
    }

    /// Package named by the actual of a formal package: an instance of the
    /// generic package the formal names
    pub(crate) fn formal_package_actual(&self, formal: &Entity, actual: NodeId, instance: &Entity) -> Result<Option<Entity>> {
        let NodeKind::FormalPackageDecl { generic, .. } = self.ast.kind(formal.node) else {
            return Ok(None);
        };
        let Some(expected) = self
            .static_entities(*generic, formal.rebindings())
            .into_iter()
            .find(|e| matches!(self.ast.kind(e.node), NodeKind::GenericPackageDecl { .. }))
        else {
            return Ok(None);
        };
        for candidate in self.static_entities(actual, instance.rebindings()) {
            if self.instance_of(&candidate)? == Some(expected.node) {
                return Ok(Some(candidate));
            }
        }
        debug!(formal = %formal.node, %actual, "actual is not an instance of the formal's generic");
        Ok(None)
    }

    /// Generic unit a package instance or formal package instantiates
    pub fn instance_of(&self, package: &Entity) -> Result<Option<NodeId>> {
        if self.instance_parts(package.node).is_none() {
            return Ok(None);
        }
        Ok(self.instantiation(package)?.map(|created| created.generic.node))
    }

    /// Graft a rebinding chain onto an entity, checking that it extends the
    /// entity's own chain
    pub fn rebind_entity(&self, entity: &Entity, rebindings: Option<RebindingId>) -> Result<Entity> {
        rebind(&self.rebindings.borrow(), entity, rebindings)
    }

    fn bind_formal(&self, env: EnvId, name: Symbol, actual: &Entity) {
        self.envs
            .borrow_mut()
            .add(env, name, EnvEntry::fixed(actual.node, actual.info));
    }

    /// Subprogram named like the formal at the instantiation point. An
    /// explicit `<>` actual for a box formal accepts any such subprogram
    /// when none has a matching profile.
    fn box_actual(&self, formal: &SingleFormal, rebound: &Entity, instance: &Entity, any_formal: bool) -> Option<Entity> {
        let env = self.node_env(instance.node)?;
        let query = Lookup::recursive(Some(instance.node)).with_rebindings(instance.rebindings());
        let candidates: Vec<Entity> = self
            .lookup_symbol(env, formal.name, &query)
            .into_iter()
            .filter(|c| self.is_subprogram(c.node))
            .collect();
        let matching = candidates
            .iter()
            .find(|candidate| self.subp_decl_match_signature(rebound, candidate))
            .copied();
        if matching.is_some() || !any_formal {
            return matching;
        }
        candidates.first().copied()
    }

    /// Profile conformance of an actual subprogram against a formal one
    pub fn subp_decl_match_signature(&self, formal: &Entity, actual: &Entity) -> bool {
        if !self.is_subprogram(actual.node) || self.is_function(formal.node) != self.is_function(actual.node) {
            return false;
        }
        let formal_params = self.subp_formals(formal);
        let actual_params = self.subp_formals(actual);
        if formal_params.len() != actual_params.len() {
            return false;
        }
        let params_match = formal_params.iter().zip(&actual_params).all(|(f, a)| {
            match (self.formal_type(formal, &f.spec), self.formal_type(actual, &a.spec)) {
                (Some(ft), Some(at)) => self.matching_type(&at, &ft),
                _ => false,
            }
        });
        let returns_match = match (self.return_type(formal), self.return_type(actual)) {
            (Some(ft), Some(at)) => self.matching_type(&at, &ft),
            (None, None) => true,
            _ => false,
        };
        params_match && returns_match
    }

    /// Subprogram declared by a generic subprogram instantiation, seen
    /// through the instantiation
    pub fn instantiated_subprogram(&self, instance: &Entity) -> Result<Option<Entity>> {
        let Some(created) = self.instantiation(instance)? else {
            return Ok(None);
        };
        let NodeKind::GenericSubpDecl { subp, .. } = self.ast.kind(created.generic.node) else {
            return Ok(None);
        };
        self.rebind_entity(&created.generic.sibling(*subp), Some(created.rebindings))
            .map(Some)
    }

    /// Whether `node` is a generic instantiation of a subprogram
    pub(crate) fn is_subprogram_instantiation(&self, node: NodeId) -> bool {
        matches!(
            self.ast.kind(node),
            NodeKind::GenericInstantiation { kind, .. } if *kind != InstantiationKind::Package
        )
    }
}
