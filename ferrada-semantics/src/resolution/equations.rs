//! Equation construction
//!
//! One builder per solve. It turns an entry point into an equation over the
//! reference and type variables of the nodes below it, and serves as the
//! solver's theory: relations, conversions and predicates are answered by
//! the type relation engine, expansions build the equations that need a
//! bound prefix type.

use super::{ref_var, type_var};
use crate::calls::{is_matching_param_list, match_formals, ParamMatch};
use crate::context::AnalysisContext;
use crate::entity::{Entity, Metadata};
use crate::error::{Result, SemanticError};
use crate::logic::{Conversion, Equation, ExpandRule, LogicVar, Pred, Relation, Theory};
use crate::symbols::{simple_name, Symbol};
use ferrada_syntax::{FormalSubpDefault, NodeId, NodeKind, Operator};
use std::cell::RefCell;
use std::iter;
use tracing::trace;

/// How a name is used: as the callee of a call (with the call's
/// arguments), and whether that call is a statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct Usage {
    pub call: Option<NodeId>,
    pub statement: bool,
}

pub(crate) struct EquationBuilder<'a> {
    pub(super) ctx: &'a AnalysisContext,
    error: RefCell<Option<SemanticError>>,
    stopped: RefCell<Vec<NodeId>>,
}

impl<'a> EquationBuilder<'a> {
    pub fn new(ctx: &'a AnalysisContext) -> Self {
        Self {
            ctx,
            error: RefCell::new(None),
            stopped: RefCell::new(Vec::new()),
        }
    }

    /// First contract violation met while building or expanding
    pub fn take_error(&self) -> Result<()> {
        match self.error.borrow_mut().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Aggregates met while building, to be solved once their type is known
    pub fn take_stopped(&self) -> Vec<NodeId> {
        std::mem::take(&mut *self.stopped.borrow_mut())
    }

    fn stash(&self, error: SemanticError) {
        let mut slot = self.error.borrow_mut();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    pub(super) fn rv(&self, node: NodeId) -> LogicVar {
        ref_var(&self.ctx.ast, node)
    }

    pub(super) fn tv(&self, node: NodeId) -> LogicVar {
        type_var(&self.ctx.ast, node)
    }

    pub(super) fn bind_opt(&self, var: LogicVar, value: Option<Entity>) -> Equation {
        value.map_or_else(Equation::falsity, |value| Equation::bind(var, value))
    }

    pub(super) fn boolean(&self) -> Option<Entity> {
        self.ctx.standard().map(|s| s.boolean_type())
    }

    pub(super) fn universal_int(&self) -> Option<Entity> {
        self.ctx.standard().map(|s| s.universal_int_type())
    }

    pub(super) fn string(&self) -> Option<Entity> {
        self.ctx.standard().map(|s| s.string_type())
    }

    fn pred(&self, pred: Pred, nodes: &[NodeId]) -> Equation {
        Equation::predicate(pred, nodes.iter().map(|n| self.tv(*n)).collect())
    }

    pub(super) fn call_args(&self, call: NodeId) -> Vec<NodeId> {
        match self.ctx.ast.kind(call) {
            NodeKind::CallExpr { args, .. } => args.clone(),
            _ => Vec::new(),
        }
    }

    /// Equation of an entry point
    pub fn entry_equation(&self, entry: NodeId) -> Equation {
        let ast = &self.ctx.ast;
        trace!(%entry, kind = ast.kind(entry).name(), "building equation");
        match ast.kind(entry) {
            NodeKind::AssignStmt { target, expr } => {
                self.expr(*target)
                    & self.expr(*expr)
                    & Equation::unify(self.tv(*expr), self.tv(*target), Relation::MatchingAssign)
            }
            NodeKind::CallStmt { call } => match ast.kind(*call) {
                NodeKind::CallExpr { .. } => self.call(*call, true),
                _ => self.name(
                    *call,
                    Usage {
                        call: None,
                        statement: true,
                    },
                ),
            },
            NodeKind::ReturnStmt { expr: Some(expr) } => {
                let result = ast
                    .enclosing(entry, |k| matches!(k, NodeKind::SubpBody { .. }))
                    .and_then(|body| self.ctx.return_type(&Entity::new(body)));
                match result {
                    Some(ty) => self.expr(*expr) & Equation::bind_with(self.tv(*expr), ty, Relation::MatchingAssign),
                    None => Equation::falsity(),
                }
            }
            NodeKind::IfStmt { cond, alternatives, .. } => {
                let elsifs = alternatives.iter().filter_map(|alt| match ast.kind(*alt) {
                    NodeKind::ElsifPart { cond, .. } => Some(self.condition(*cond)),
                    _ => None,
                });
                Equation::and(iter::once(self.condition(*cond)).chain(elsifs))
            }
            NodeKind::WhileLoop { cond, .. } => self.condition(*cond),
            NodeKind::ForLoopSpec { iter, .. } => self.loop_range(*iter),
            NodeKind::Pragma { args, .. } => self.pragma(args),
            NodeKind::WithClause { names } => Equation::and(names.iter().map(|n| self.static_name(*n, |_| true))),
            NodeKind::UseClause { names } => Equation::and(
                names
                    .iter()
                    .map(|n| self.static_name(*n, |e| self.ctx.is_package_like(e.node))),
            ),
            NodeKind::UseTypeClause { names } => Equation::and(names.iter().map(|n| self.mark(*n))),
            NodeKind::GenericInstantiation { .. } | NodeKind::FormalPackageDecl { .. } => self.instantiation(entry),
            NodeKind::TypeDecl { def, .. } => self.type_def(*def),
            NodeKind::SubtypeDecl { subtype, .. } => self.mark(*subtype),
            NodeKind::ObjectDecl { subtype, default, .. }
            | NodeKind::ComponentDecl { subtype, default, .. }
            | NodeKind::DiscriminantSpec { subtype, default, .. }
            | NodeKind::ParamSpec { subtype, default, .. } => self.typed_decl(*subtype, *default),
            NodeKind::NumberDecl { expr, .. } => self.expr(*expr) & self.pred(Pred::IsNumeric, &[*expr]),
            NodeKind::SubpSpec { returns, .. } => returns.map_or_else(Equation::truth, |r| self.mark(r)),
            NodeKind::FormalSubpDecl {
                default: FormalSubpDefault::Name(name),
                ..
            } => Equation::or([
                self.static_name(*name, |e| self.ctx.is_subprogram(e.node)),
                Equation::truth(),
            ]),
            _ => Equation::truth(),
        }
    }

    fn condition(&self, cond: NodeId) -> Equation {
        match self.boolean() {
            Some(boolean) => self.expr(cond) & Equation::bind_with(self.tv(cond), boolean, Relation::MatchingType),
            None => self.expr(cond) & self.pred(Pred::IsBoolean, &[cond]),
        }
    }

    fn loop_range(&self, iter: NodeId) -> Equation {
        if matches!(
            self.ctx.ast.kind(iter),
            NodeKind::Identifier { .. } | NodeKind::DottedName { .. } | NodeKind::SubtypeIndication { .. }
        ) {
            if let Some(ty) = self.ctx.designated_type(iter, None) {
                return self.bind_mark(iter, &ty)
                    & Equation::bind(self.tv(iter), ty)
                    & self.pred(Pred::IsDiscrete, &[iter]);
            }
        }
        self.expr(iter) & self.pred(Pred::IsDiscrete, &[iter])
    }

    /// Pragma arguments are resolved when possible; an unresolvable argument
    /// does not fail the pragma
    fn pragma(&self, args: &[NodeId]) -> Equation {
        let mut eqs = Vec::new();
        for arg in args {
            match self.ctx.ast.kind(*arg) {
                NodeKind::ParamAssoc { expr, .. } => eqs.push(Equation::or([self.expr(*expr), Equation::truth()])),
                kind => self.stash(SemanticError::illegal_query(
                    "resolve_names",
                    *arg,
                    kind.name(),
                    "pragma arguments must be associations",
                    self.ctx.ast.span(*arg),
                )),
            }
        }
        Equation::and(eqs)
    }

    /// Static name: bound to the first visible declaration `accept` takes
    fn static_name(&self, name: NodeId, accept: impl Fn(&Entity) -> bool) -> Equation {
        match self.ctx.static_entities(name, None).into_iter().find(|e| accept(e)) {
            Some(entity) => self.bind_static(name, &entity),
            None => Equation::falsity(),
        }
    }

    fn bind_static(&self, name: NodeId, entity: &Entity) -> Equation {
        let own = Equation::bind(self.rv(name), *entity);
        match self.ctx.ast.kind(name) {
            NodeKind::DottedName { prefix, .. } => own & self.static_name(*prefix, |_| true),
            _ => own,
        }
    }

    /// Subtype mark or indication, resolved statically
    pub(super) fn mark(&self, mark: NodeId) -> Equation {
        match self.ctx.designated_type(mark, None) {
            Some(ty) => self.bind_mark(mark, &ty),
            None => Equation::falsity(),
        }
    }

    pub(super) fn bind_mark(&self, mark: NodeId, ty: &Entity) -> Equation {
        match self.ctx.ast.kind(mark) {
            NodeKind::Identifier { .. } => Equation::bind(self.rv(mark), *ty),
            NodeKind::DottedName { prefix, .. } => {
                Equation::bind(self.rv(mark), *ty) & self.static_name(*prefix, |_| true)
            }
            NodeKind::SubtypeIndication { mark, constraint } => {
                let constraint = match constraint {
                    Some(range) => self.expr(*range) & Equation::bind_with(self.tv(*range), *ty, Relation::MatchingType),
                    None => Equation::truth(),
                };
                self.bind_mark(*mark, ty) & constraint
            }
            NodeKind::BoxRange { mark } => self.bind_mark(*mark, ty),
            NodeKind::AttributeRef { prefix, .. } => self.mark(*prefix) & Equation::bind(self.tv(mark), *ty),
            NodeKind::AnonymousTypeDecl { def } => self.type_def(*def),
            _ => Equation::truth(),
        }
    }

    fn type_def(&self, def: NodeId) -> Equation {
        match self.ctx.ast.kind(def) {
            NodeKind::SignedIntTypeDef { range: expr }
            | NodeKind::ModIntTypeDef { modulus: expr }
            | NodeKind::FloatTypeDef { digits: expr } => self.expr(*expr) & self.pred(Pred::IsInteger, &[*expr]),
            NodeKind::DerivedTypeDef { parent, interfaces, .. } => {
                Equation::and(iter::once(parent).chain(interfaces).map(|m| self.mark(*m)))
            }
            NodeKind::ArrayTypeDef { indices, component } => {
                let indices = indices.iter().map(|index| match self.ctx.ast.kind(*index) {
                    NodeKind::BinOp { .. } => self.expr(*index) & self.pred(Pred::IsDiscrete, &[*index]),
                    _ => self.mark(*index),
                });
                Equation::and(indices.chain(iter::once(self.mark(*component))))
            }
            NodeKind::AccessTypeDef { target, .. } => self.mark(*target),
            _ => Equation::truth(),
        }
    }

    fn typed_decl(&self, subtype: NodeId, default: Option<NodeId>) -> Equation {
        let Some(ty) = self.ctx.designated_type(subtype, None) else {
            return Equation::falsity();
        };
        let declared = self.bind_mark(subtype, &ty);
        match default {
            Some(init) => {
                declared & self.expr(init) & Equation::bind_with(self.tv(init), ty, Relation::MatchingAssign)
            }
            None => declared,
        }
    }

    /// Generic name, actual types and subprograms as bound in the
    /// instantiation environment, actual packages as instances of the
    /// formal's generic, formal objects against their rebound type
    fn instantiation(&self, entry: NodeId) -> Equation {
        let ctx = self.ctx;
        let Some((generic, actuals)) = ctx.instance_parts(entry) else {
            return Equation::falsity();
        };
        let formal_package = matches!(ctx.ast.kind(entry), NodeKind::FormalPackageDecl { .. });
        let generic_eq = self.static_name(generic, |e| match ctx.ast.kind(e.node) {
            NodeKind::GenericPackageDecl { .. } => true,
            NodeKind::GenericSubpDecl { .. } => !formal_package,
            _ => false,
        });
        // `with package P is new G (<>)`
        let Some(actuals) = actuals else {
            return generic_eq;
        };
        let instance = match ctx.instantiation(&Entity::new(entry)) {
            Ok(Some(instance)) => instance,
            Ok(None) => return Equation::falsity(),
            Err(error) => {
                self.stash(error);
                return Equation::falsity();
            }
        };
        let formals = ctx.generic_formals(&instance.generic);
        let actuals = ctx.actuals(actuals);
        let Some(matches) = match_formals(&formals, &actuals, false) else {
            return Equation::falsity();
        };

        let mut eqs = vec![generic_eq];
        for m in &matches {
            let Some(actual) = m.actual else {
                if !m.formal.has_default {
                    return Equation::falsity();
                }
                continue;
            };
            if let Some(designator) = actual.designator {
                eqs.push(Equation::bind(self.rv(designator), m.formal.spec));
            }
            let eq = match ctx.ast.kind(m.formal.spec.node) {
                NodeKind::TypeDecl { .. } => self.mark(actual.expr),
                NodeKind::FormalSubpDecl { .. } if matches!(ctx.ast.kind(actual.expr), NodeKind::BoxExpr) => {
                    Equation::truth()
                }
                NodeKind::FormalSubpDecl { .. } => {
                    let bound = ctx.envs.borrow().entries(instance.env, m.formal.name).first().copied();
                    match bound {
                        Some(entry) => {
                            self.bind_static(actual.expr, &Entity::with_info(entry.decl, entry.info.unwrap_or_default()))
                        }
                        None => Equation::falsity(),
                    }
                }
                NodeKind::FormalPackageDecl { .. } => {
                    match ctx.formal_package_actual(&m.formal.spec, actual.expr, &Entity::new(entry)) {
                        Ok(Some(package)) => self.bind_static(actual.expr, &package),
                        Ok(None) => Equation::falsity(),
                        Err(error) => {
                            self.stash(error);
                            Equation::falsity()
                        }
                    }
                }
                NodeKind::ObjectDecl { .. } => match ctx.rebind_entity(&m.formal.spec, Some(instance.rebindings)) {
                    Ok(rebound) => match ctx.type_of_decl(&rebound) {
                        Some(ty) => {
                            self.expr(actual.expr)
                                & Equation::bind_with(self.tv(actual.expr), ty, Relation::MatchingFormal)
                        }
                        None => Equation::falsity(),
                    },
                    Err(error) => {
                        self.stash(error);
                        Equation::falsity()
                    }
                },
                _ => Equation::truth(),
            };
            eqs.push(eq);
        }
        Equation::and(eqs)
    }

    /// Overload candidates, or none when computing them broke a contract
    fn overloads(&self, candidates: Result<Vec<Entity>>) -> Vec<Entity> {
        candidates.unwrap_or_else(|error| {
            self.stash(error);
            Vec::new()
        })
    }

    /// Equation of an expression in a value context
    pub(super) fn expr(&self, node: NodeId) -> Equation {
        let ctx = self.ctx;
        let t = self.tv(node);
        let standard = ctx.standard();
        match ctx.ast.kind(node) {
            NodeKind::IntLiteral { .. } => {
                let default = standard.map_or_else(Equation::truth, |s| Equation::default_value(t, s.universal_int_type()));
                Equation::predicate(Pred::IsInteger, vec![t]) & default
            }
            NodeKind::RealLiteral { .. } => {
                let default = standard.map_or_else(Equation::truth, |s| Equation::default_value(t, s.universal_real_type()));
                Equation::predicate(Pred::IsReal, vec![t]) & default
            }
            NodeKind::StringLiteral { .. } => {
                let default = standard.map_or_else(Equation::truth, |s| Equation::default_value(t, s.string_type()));
                Equation::predicate(Pred::IsString, vec![t]) & default
            }
            NodeKind::CharLiteral { .. } => {
                let default = standard.map_or_else(Equation::truth, |s| Equation::default_value(t, s.character_type()));
                Equation::predicate(Pred::IsCharacter, vec![t]) & default
            }
            NodeKind::NullLiteral => Equation::predicate(Pred::IsAccess, vec![t]),
            NodeKind::Identifier { .. } | NodeKind::DottedName { .. } => self.name(node, Usage::default()),
            NodeKind::CallExpr { .. } => self.call(node, false),
            NodeKind::BinOp { .. } => self.binary(node),
            NodeKind::UnOp { .. } => self.unary(node),
            NodeKind::QualExpr { mark, expr } => match ctx.designated_type(*mark, None) {
                Some(ty) => {
                    self.bind_mark(*mark, &ty)
                        & Equation::bind(t, ty)
                        & self.expr(*expr)
                        & Equation::bind_with(self.tv(*expr), ty, Relation::MatchingAssign)
                }
                None => Equation::falsity(),
            },
            NodeKind::AttributeRef { .. } => self.attribute(node, &[]),
            NodeKind::Aggregate { .. } => {
                self.stopped.borrow_mut().push(node);
                Equation::truth()
            }
            NodeKind::Allocator { subtype } => {
                let (eq, allocated) = match ctx.ast.kind(*subtype) {
                    NodeKind::QualExpr { mark, .. } => (self.expr(*subtype), ctx.designated_type(*mark, None)),
                    _ => (self.mark(*subtype), ctx.designated_type(*subtype, None)),
                };
                match allocated {
                    Some(allocated) => eq & Equation::predicate(Pred::AllocatorFor(allocated), vec![t]),
                    None => Equation::falsity(),
                }
            }
            NodeKind::ExplicitDeref { prefix } => {
                self.expr(*prefix) & Equation::propagate(t, self.tv(*prefix), Conversion::DesignatedType)
            }
            NodeKind::ParamAssoc { expr, .. } => self.expr(*expr),
            _ => Equation::truth(),
        }
    }

    /// Identifier or dotted name, overloaded through its candidates
    pub(super) fn name(&self, node: NodeId, usage: Usage) -> Equation {
        let ctx = self.ctx;
        match ctx.ast.kind(node) {
            NodeKind::Identifier { text } => {
                let Some(symbol) = ctx.symbol(simple_name(text)) else {
                    return Equation::falsity();
                };
                let candidates = self.overloads(ctx.visible_candidates(node, symbol));
                self.candidates(node, &candidates, usage)
            }
            NodeKind::DottedName { prefix, suffix } => {
                let Some(symbol) = ctx.name_symbol(*suffix) else {
                    return Equation::falsity();
                };
                if let Some(package) = ctx.static_package(*prefix) {
                    let candidates = self.overloads(ctx.selected_candidates(node, &package, symbol));
                    return self.bind_static(*prefix, &package) & self.candidates(node, &candidates, usage);
                }
                self.expr(*prefix)
                    & Equation::expand(
                        vec![self.tv(*prefix)],
                        ExpandRule::SelectedComponent {
                            name: node,
                            call: usage.call,
                            statement: usage.statement,
                        },
                    )
            }
            _ => self.expr(node),
        }
    }

    fn candidates(&self, node: NodeId, candidates: &[Entity], usage: Usage) -> Equation {
        let branches: Vec<Equation> = candidates
            .iter()
            .filter_map(|candidate| self.candidate(node, candidate, usage))
            .collect();
        trace!(%node, candidates = candidates.len(), branches = branches.len(), "name candidates");
        Equation::any(branches)
    }

    /// Equation of `node` denoting `candidate`, or `None` when the candidate
    /// cannot be used that way
    fn candidate(&self, node: NodeId, candidate: &Entity, usage: Usage) -> Option<Equation> {
        let ctx = self.ctx;
        let reference = Equation::bind(self.rv(node), *candidate);
        match ctx.ast.kind(candidate.node) {
            NodeKind::ObjectDecl { .. }
            | NodeKind::ParamSpec { .. }
            | NodeKind::ComponentDecl { .. }
            | NodeKind::DiscriminantSpec { .. }
            | NodeKind::NumberDecl { .. }
            | NodeKind::ForLoopVarDecl { .. } => {
                if usage.statement {
                    return None;
                }
                let ty = ctx.type_of_decl(candidate)?;
                let value = reference & Equation::bind(self.tv(node), ty);
                match usage.call {
                    None => Some(value),
                    Some(call) => Some(value & self.indexing(call, &ty)?),
                }
            }
            NodeKind::EnumLiteralDecl { .. } => {
                if usage != Usage::default() {
                    return None;
                }
                Some(reference & self.bind_opt(self.tv(node), ctx.type_of_decl(candidate)))
            }
            NodeKind::SubpDecl { .. } | NodeKind::SubpBody { .. } | NodeKind::FormalSubpDecl { .. } => {
                self.subprogram(node, candidate, usage)
            }
            NodeKind::TypeDecl { .. } | NodeKind::SubtypeDecl { .. } | NodeKind::ClasswideTypeDecl { .. } => {
                match usage.call {
                    // Type conversion
                    Some(call) if !usage.statement => {
                        let args = self.call_args(call);
                        let actuals = ctx.actuals(&args);
                        (actuals.len() == 1 && actuals[0].name.is_none())
                            .then(|| reference & Equation::bind(self.tv(call), *candidate))
                    }
                    None if !usage.statement => Some(reference),
                    _ => None,
                }
            }
            _ if ctx.is_package_like(candidate.node) => (usage == Usage::default()).then_some(reference),
            _ => None,
        }
    }

    /// Call of a subprogram candidate: procedures in statements, functions
    /// in expressions, actuals against formals
    fn subprogram(&self, node: NodeId, subp: &Entity, usage: Usage) -> Option<Equation> {
        let ctx = self.ctx;
        let is_function = ctx.is_function(subp.node);
        if usage.statement == is_function {
            return None;
        }
        let formals = ctx.subp_formals(subp);
        let args = usage.call.map(|call| self.call_args(call)).unwrap_or_default();
        let actuals = ctx.actuals(&args);
        let result = usage.call.map_or_else(|| self.tv(node), |call| self.tv(call));
        let reference = Equation::bind(self.rv(node), *subp);

        match match_formals(&formals, &actuals, subp.md().dottable) {
            Some(matches) if is_matching_param_list(&matches) => {
                let mut eqs = vec![reference];
                if is_function {
                    eqs.push(Equation::bind(result, ctx.return_type(subp)?));
                }
                eqs.extend(self.param_matches(subp, &matches)?);
                Some(Equation::and(eqs))
            }
            // `F (I)` indexing the result of a parameterless function
            _ if is_function && formals.iter().all(|f| f.has_default) && !subp.md().dottable => {
                let call = usage.call?;
                let result_type = ctx.return_type(subp)?;
                Some(reference & Equation::bind(self.tv(node), result_type) & self.indexing(call, &result_type)?)
            }
            _ => None,
        }
    }

    fn param_matches(&self, subp: &Entity, matches: &[ParamMatch]) -> Option<Vec<Equation>> {
        let mut eqs = Vec::new();
        for m in matches {
            let Some(actual) = m.actual else {
                continue;
            };
            let formal_type = self.ctx.formal_type(subp, &m.formal.spec)?;
            eqs.push(Equation::bind_with(self.tv(actual.expr), formal_type, Relation::MatchingFormal));
            if let Some(designator) = actual.designator {
                eqs.push(Equation::bind(self.rv(designator), m.formal.spec));
            }
        }
        Some(eqs)
    }

    /// Call expression: arguments, then the callee
    pub(super) fn call(&self, node: NodeId, statement: bool) -> Equation {
        let NodeKind::CallExpr { name, args } = self.ctx.ast.kind(node) else {
            return Equation::falsity();
        };
        let mut eqs: Vec<Equation> = Vec::new();
        match self.ctx.ast.kind(*name) {
            NodeKind::Identifier { .. } | NodeKind::DottedName { .. } => {
                eqs.extend(args.iter().map(|arg| self.expr(*arg)));
                eqs.push(self.name(
                    *name,
                    Usage {
                        call: Some(node),
                        statement,
                    },
                ));
            }
            NodeKind::AttributeRef { .. } if !statement => {
                eqs.push(self.attribute(*name, args));
                eqs.push(Equation::unify(self.tv(node), self.tv(*name), Relation::Equal));
            }
            _ if !statement => {
                eqs.extend(args.iter().map(|arg| self.expr(*arg)));
                eqs.push(self.expr(*name));
                eqs.push(Equation::expand(
                    vec![self.tv(*name)],
                    ExpandRule::IndexValue { call: node },
                ));
            }
            _ => return Equation::falsity(),
        }
        Equation::and(eqs)
    }

    /// Indexing or slicing a value of type `ty`, through an implicit
    /// dereference when `ty` is an access type
    fn indexing(&self, call: NodeId, ty: &Entity) -> Option<Equation> {
        let ctx = self.ctx;
        let array = if ctx.is_access_type(ty) {
            ctx.accessed_type(ty)?
        } else {
            *ty
        };
        if !ctx.is_array_type(&array) {
            return None;
        }
        let indices = ctx.index_types(&array);
        let actuals = ctx.actuals(&self.call_args(call));
        if actuals.len() != indices.len() || actuals.iter().any(|a| a.name.is_some()) {
            return None;
        }
        if actuals.len() == 1 && self.is_range(actuals[0].expr) {
            return Some(
                Equation::bind(self.tv(call), array)
                    & Equation::bind_with(self.tv(actuals[0].expr), indices[0], Relation::MatchingType),
            );
        }
        let component = ctx.component_type(&array)?;
        let subscripts = actuals
            .iter()
            .zip(indices)
            .map(|(actual, index)| Equation::bind_with(self.tv(actual.expr), index, Relation::MatchingType));
        Some(Equation::and(iter::once(Equation::bind(self.tv(call), component)).chain(subscripts)))
    }

    fn is_range(&self, expr: NodeId) -> bool {
        let ast = &self.ctx.ast;
        match ast.kind(expr) {
            NodeKind::BinOp { op, .. } => matches!(
                ast.kind(*op),
                NodeKind::Op {
                    op: Operator::DoubleDot
                }
            ),
            NodeKind::AttributeRef { attribute, .. } => {
                ast.text(*attribute).is_some_and(|a| a.eq_ignore_ascii_case("range"))
            }
            _ => false,
        }
    }

    fn binary(&self, node: NodeId) -> Equation {
        let ast = &self.ctx.ast;
        let NodeKind::BinOp { left, op: op_node, right } = ast.kind(node) else {
            return Equation::falsity();
        };
        let NodeKind::Op { op } = ast.kind(*op_node) else {
            return Equation::falsity();
        };
        let (l, r) = (*left, *right);
        let (tl, tr, tn) = (self.tv(l), self.tv(r), self.tv(node));
        let operands = self.expr(l) & self.expr(r);
        match op {
            Operator::AndThen | Operator::OrElse => {
                operands
                    & Equation::unify(tl, tr, Relation::MatchingType)
                    & Equation::unify(tn, tl, Relation::MatchingType)
                    & Equation::predicate(Pred::IsBoolean, vec![tn])
            }
            Operator::DoubleDot => {
                operands
                    & Equation::unify(tl, tr, Relation::MatchingType)
                    & Equation::unify(tn, tl, Relation::MatchingType)
                    & Equation::predicate(Pred::IsScalar, vec![tn])
            }
            op => {
                let user = self.operator_candidates(node, *op_node, *op, &[l, r]);
                operands & Equation::any(user.into_iter().chain(iter::once(self.builtin_binary(node, *op, l, r))))
            }
        }
    }

    fn unary(&self, node: NodeId) -> Equation {
        let ast = &self.ctx.ast;
        let NodeKind::UnOp { op: op_node, operand } = ast.kind(node) else {
            return Equation::falsity();
        };
        let NodeKind::Op { op } = ast.kind(*op_node) else {
            return Equation::falsity();
        };
        let (to, tn) = (self.tv(*operand), self.tv(node));
        let builtin = match op {
            Operator::Plus | Operator::Minus | Operator::Abs => {
                Equation::unify(tn, to, Relation::MatchingType) & Equation::predicate(Pred::IsNumeric, vec![tn])
            }
            Operator::Not => {
                Equation::unify(tn, to, Relation::MatchingType)
                    & Equation::predicate(Pred::IsBooleanOrModular, vec![tn])
            }
            _ => Equation::falsity(),
        };
        let user = self.operator_candidates(node, *op_node, *op, &[*operand]);
        self.expr(*operand) & Equation::any(user.into_iter().chain(iter::once(builtin)))
    }

    /// User-defined operator functions visible at the operator, and for
    /// `/=` the ones derived from a user-defined `=`
    fn operator_candidates(&self, node: NodeId, op_node: NodeId, op: Operator, operands: &[NodeId]) -> Vec<Equation> {
        let ctx = self.ctx;
        let visible = |designator: &str| -> Vec<Entity> {
            ctx.symbol(designator)
                .map(|symbol| self.overloads(ctx.visible_candidates(op_node, symbol)))
                .unwrap_or_default()
        };

        let mut candidates = op.designator().map(visible).unwrap_or_default();
        if op == Operator::Neq {
            candidates.extend(Operator::Eq.designator().map(visible).unwrap_or_default());
        }
        candidates
            .iter()
            .filter_map(|candidate| self.operator_call(node, op_node, candidate, operands))
            .collect()
    }

    fn operator_call(&self, node: NodeId, op_node: NodeId, subp: &Entity, operands: &[NodeId]) -> Option<Equation> {
        let ctx = self.ctx;
        if !ctx.is_function(subp.node) {
            return None;
        }
        let formals = ctx.subp_formals(subp);
        if formals.len() != operands.len() {
            return None;
        }
        let mut eqs = vec![
            Equation::bind(self.rv(op_node), *subp),
            Equation::bind(self.tv(node), ctx.return_type(subp)?),
        ];
        for (formal, operand) in formals.iter().zip(operands) {
            let formal_type = ctx.formal_type(subp, &formal.spec)?;
            eqs.push(Equation::bind_with(self.tv(*operand), formal_type, Relation::MatchingFormal));
        }
        Some(Equation::and(eqs))
    }

    /// Predefined operators: operand and result types are tied together
    /// and the operator's class is checked once they are known
    fn builtin_binary(&self, node: NodeId, op: Operator, l: NodeId, r: NodeId) -> Equation {
        let (tl, tr, tn) = (self.tv(l), self.tv(r), self.tv(node));
        let same = Equation::unify(tl, tr, Relation::MatchingType);
        let arithmetic = |class: Pred| {
            Equation::unify(tl, tr, Relation::MatchingType)
                & Equation::unify(tn, tl, Relation::MatchingType)
                & Equation::unify(tn, tr, Relation::MatchingType)
                & Equation::predicate(class, vec![tn])
        };
        match op {
            Operator::Plus | Operator::Minus | Operator::Mult | Operator::Div => arithmetic(Pred::IsNumeric),
            Operator::Mod | Operator::Rem => arithmetic(Pred::IsInteger),
            Operator::Pow => {
                Equation::unify(tn, tl, Relation::MatchingType)
                    & Equation::predicate(Pred::IsNumeric, vec![tn])
                    & Equation::predicate(Pred::IsInteger, vec![tr])
            }
            Operator::Eq | Operator::Neq => same & self.bind_opt(tn, self.boolean()),
            Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => {
                same & self.bind_opt(tn, self.boolean()) & Equation::predicate(Pred::IsOrderable, vec![tl])
            }
            Operator::And | Operator::Or | Operator::Xor => {
                same & Equation::unify(tn, tl, Relation::MatchingType)
                    & Equation::predicate(Pred::IsBooleanOrModular, vec![tn])
            }
            Operator::Concat => Equation::any([
                same & Equation::unify(tn, tl, Relation::MatchingType) & Equation::predicate(Pred::IsArray, vec![tn]),
                Equation::unify(tn, tl, Relation::MatchingType)
                    & Equation::predicate(Pred::IsArray, vec![tn])
                    & Equation::predicate(Pred::ComponentMatches, vec![tn, tr]),
                Equation::unify(tn, tr, Relation::MatchingType)
                    & Equation::predicate(Pred::IsArray, vec![tn])
                    & Equation::predicate(Pred::ComponentMatches, vec![tn, tl]),
            ]),
            _ => Equation::falsity(),
        }
    }

    /// Components and dot-callable primitives of a prefix type
    fn selected_component(&self, name: NodeId, usage: Usage, prefix_type: Option<&Entity>) -> Equation {
        let ctx = self.ctx;
        let (Some(prefix_type), NodeKind::DottedName { suffix, .. }) = (prefix_type, ctx.ast.kind(name)) else {
            return Equation::falsity();
        };
        let Some(symbol) = ctx.name_symbol(*suffix) else {
            return Equation::falsity();
        };
        let implicit_deref = ctx.is_access_type(prefix_type);
        let record = if implicit_deref {
            match ctx.accessed_type(prefix_type) {
                Some(target) => target,
                None => return Equation::falsity(),
            }
        } else {
            *prefix_type
        };

        let mut branches = Vec::new();
        if let Some(component) = ctx.component_named(&record, symbol) {
            let component = component.with_metadata(Metadata {
                implicit_deref,
                ..Metadata::default()
            });
            branches.extend(self.candidate(name, &component, usage));
        }
        if ctx.is_tagged_type(&record) {
            let dot = Metadata {
                implicit_deref,
                ..Metadata::dottable()
            };
            for primitive in ctx.primitives(&record) {
                if ctx.decl_symbol(primitive.node) != Some(symbol) {
                    continue;
                }
                let primitive = primitive.with_metadata(primitive.md().combine(dot));
                let Some(first) = ctx.subp_formals(&primitive).first().copied() else {
                    continue;
                };
                let accepts_prefix = ctx
                    .formal_type(&primitive, &first.spec)
                    .is_some_and(|formal| ctx.matching_prefix_type(prefix_type, &formal));
                if accepts_prefix {
                    branches.extend(self.candidate(name, &primitive, usage));
                }
            }
        }
        trace!(%name, branches = branches.len(), "selected component");
        Equation::any(branches)
    }

    /// Equation of an aggregate whose type is known
    pub fn aggregate_equation(&self, aggregate: NodeId, ty: &Entity) -> Equation {
        let ctx = self.ctx;
        let NodeKind::Aggregate { assocs } = ctx.ast.kind(aggregate) else {
            return Equation::falsity();
        };
        let ty = ctx.canonical_type(ty);

        if ctx.is_array_type(&ty) {
            let (Some(component), Some(index)) = (ctx.component_type(&ty), ctx.index_types(&ty).first().copied()) else {
                return Equation::falsity();
            };
            let mut eqs = Vec::new();
            for assoc in assocs {
                let NodeKind::AggregateAssoc { choices, expr } = ctx.ast.kind(*assoc) else {
                    continue;
                };
                eqs.push(self.expr(*expr) & Equation::bind_with(self.tv(*expr), component, Relation::MatchingAssign));
                for choice in choices {
                    if !matches!(ctx.ast.kind(*choice), NodeKind::OthersDesignator) {
                        eqs.push(
                            self.expr(*choice) & Equation::bind_with(self.tv(*choice), index, Relation::MatchingType),
                        );
                    }
                }
            }
            return Equation::and(eqs);
        }

        if !ctx.is_record_type(&ty) {
            return Equation::falsity();
        }
        // One slot per component name, in declaration order
        let slots: Vec<(Option<Symbol>, Entity)> = ctx
            .components(&ty)
            .into_iter()
            .flat_map(|component| {
                ctx.ast
                    .defining_names(component.node)
                    .into_iter()
                    .map(move |name| (name, component))
            })
            .map(|(name, component)| (ctx.ast.text(name).and_then(|t| ctx.symbol(t)), component))
            .collect();
        let mut covered = vec![false; slots.len()];
        let mut position = 0;
        let mut eqs = Vec::new();
        for assoc in assocs {
            let NodeKind::AggregateAssoc { choices, expr } = ctx.ast.kind(*assoc) else {
                continue;
            };
            let mut targets = Vec::new();
            if choices.is_empty() {
                if position >= slots.len() {
                    return Equation::falsity();
                }
                targets.push(position);
                position += 1;
            }
            for choice in choices {
                match ctx.ast.kind(*choice) {
                    NodeKind::OthersDesignator => targets.extend((0..slots.len()).filter(|i| !covered[*i])),
                    NodeKind::Identifier { text } => {
                        let symbol = ctx.symbol(simple_name(text));
                        let Some(index) = slots.iter().position(|(s, _)| symbol.is_some() && *s == symbol) else {
                            return Equation::falsity();
                        };
                        eqs.push(Equation::bind(self.rv(*choice), slots[index].1));
                        targets.push(index);
                    }
                    _ => return Equation::falsity(),
                }
            }
            eqs.push(self.expr(*expr));
            for index in targets {
                covered[index] = true;
                match ctx.type_of_decl(&slots[index].1) {
                    Some(component_type) => {
                        eqs.push(Equation::bind_with(self.tv(*expr), component_type, Relation::MatchingAssign))
                    }
                    None => return Equation::falsity(),
                }
            }
        }
        Equation::and(eqs)
    }
}

impl Theory for EquationBuilder<'_> {
    fn relate(&self, relation: Relation, first: &Entity, second: &Entity) -> bool {
        let ctx = self.ctx;
        match relation {
            Relation::Equal => first == second,
            Relation::MatchingType => ctx.matching_type(first, second),
            Relation::MatchingFormal => ctx.matching_formal_type(first, second),
            Relation::MatchingFormalInverted => ctx.matching_formal_type_inverted(first, second),
            Relation::MatchingAssign => ctx.matching_assign_type(first, second),
            Relation::MatchingPrefix => ctx.matching_prefix_type(first, second),
            Relation::MatchingAllocator => ctx.matching_allocator_type(first, second),
        }
    }

    fn convert(&self, conversion: Conversion, value: &Entity) -> Option<Entity> {
        let ctx = self.ctx;
        match conversion {
            Conversion::DesignatedType => ctx.accessed_type(value),
            Conversion::ComponentType => ctx.component_type(value),
            Conversion::FirstIndexType => {
                let array = if ctx.is_access_type(value) {
                    ctx.accessed_type(value)?
                } else {
                    *value
                };
                if ctx.is_array_type(&array) {
                    ctx.index_types(&array).first().copied()
                } else if ctx.is_scalar_type(value) {
                    Some(*value)
                } else {
                    None
                }
            }
            Conversion::CanonicalType => Some(ctx.canonical_type(value)),
            Conversion::ClasswideType => ctx.classwide_type(value),
            Conversion::RootNumeric => Some(ctx.root_numeric(value)),
        }
    }

    fn check(&self, pred: &Pred, values: &[Entity]) -> bool {
        let ctx = self.ctx;
        let first = |test: &dyn Fn(&Entity) -> bool| values.first().is_some_and(test);
        match pred {
            Pred::IsInteger => first(&|t| ctx.is_integer_type(t)),
            Pred::IsReal => first(&|t| ctx.is_real_type(t)),
            Pred::IsNumeric => first(&|t| ctx.is_numeric_type(t)),
            Pred::IsDiscrete => first(&|t| ctx.is_discrete_type(t)),
            Pred::IsScalar => first(&|t| ctx.is_scalar_type(t)),
            Pred::IsBoolean => first(&|t| ctx.is_boolean_type(t)),
            Pred::IsBooleanOrModular => first(&|t| ctx.is_boolean_type(t) || ctx.is_modular_type(t)),
            Pred::IsCharacter => first(&|t| ctx.is_character_type(t)),
            Pred::IsString => first(&|t| ctx.is_string_type(t)),
            Pred::IsArray => first(&|t| ctx.is_array_type(t)),
            Pred::IsAccess => first(&|t| ctx.is_access_type(t)),
            Pred::IsTagged => first(&|t| ctx.is_tagged_type(t)),
            Pred::IsOrderable => first(&|t| ctx.is_orderable_type(t)),
            Pred::ComponentMatches => match values {
                [array, component] => ctx
                    .component_type(array)
                    .is_some_and(|expected| ctx.matching_type(component, &expected)),
                _ => false,
            },
            Pred::Designates => match values {
                [access, target] => ctx.accessed_type(access).is_some_and(|designated| {
                    ctx.matching_type(target, &designated)
                        || (ctx.is_classwide_type(&designated) && ctx.is_derived_type(target, &designated))
                }),
                _ => false,
            },
            Pred::AllocatorFor(allocated) => first(&|access| ctx.matching_allocator_type(allocated, access)),
            Pred::Holds(relation) => match values {
                [a, b] => self.relate(*relation, a, b),
                _ => false,
            },
        }
    }

    fn expand(&self, rule: &ExpandRule, values: &[Entity]) -> Equation {
        match rule {
            ExpandRule::SelectedComponent { name, call, statement } => self.selected_component(
                *name,
                Usage {
                    call: *call,
                    statement: *statement,
                },
                values.first(),
            ),
            ExpandRule::IndexValue { call } => values
                .first()
                .and_then(|ty| self.indexing(*call, ty))
                .unwrap_or_else(Equation::falsity),
        }
    }
}
