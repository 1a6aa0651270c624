//! Name resolution driver
//!
//! Resolution works per entry point: the closest enclosing node that is an
//! independent unit of resolution (a statement, a declaration, a clause).
//! Its equation is built from the tree, solved, and the bindings committed.
//! Aggregates stop resolution: they are solved afterwards, once the
//! enclosing equation has fixed their type.

mod attributes;
mod equations;
mod names;

pub(crate) use equations::EquationBuilder;

use crate::context::{AnalysisContext, ResolveStatus};
use crate::entity::Entity;
use crate::error::{Result, SemanticError};
use crate::logic::{solve, Equation, LogicVar, Outcome};
use ferrada_syntax::{Ast, NodeId, NodeKind};
use tracing::{debug, trace, warn};

/// Variable holding the declaration a name refers to. Dotted names and
/// calls share the variable of their selector and callee.
pub(crate) fn ref_var(ast: &Ast, node: NodeId) -> LogicVar {
    match ast.kind(node) {
        NodeKind::DottedName { suffix, .. } => ref_var(ast, *suffix),
        NodeKind::CallExpr { name, .. } => ref_var(ast, *name),
        NodeKind::QualExpr { mark, .. } => ref_var(ast, *mark),
        NodeKind::ParamAssoc { expr, .. } => ref_var(ast, *expr),
        _ => LogicVar::reference(node),
    }
}

/// Variable holding the type of an expression
pub(crate) fn type_var(ast: &Ast, node: NodeId) -> LogicVar {
    match ast.kind(node) {
        NodeKind::DottedName { suffix, .. } => type_var(ast, *suffix),
        NodeKind::ParamAssoc { expr, .. } => type_var(ast, *expr),
        _ => LogicVar::type_of(node),
    }
}

impl AnalysisContext {
    /// Resolve the entry point enclosing `node`. `Ok(false)` when its
    /// equation has no solution; repeated calls return the memoized result.
    pub fn resolve_names(&self, node: NodeId) -> Result<bool> {
        self.check_populated(node)?;
        let Some(entry) = self.entry_point(node) else {
            return Err(SemanticError::illegal_query(
                "resolve_names",
                node,
                self.ast.kind(node).name(),
                "the node is not inside a resolvable construct",
                self.ast.span(node),
            ));
        };
        self.resolve_entry(entry)
    }

    /// Closest enclosing entry point, the node itself included
    pub(crate) fn entry_point(&self, node: NodeId) -> Option<NodeId> {
        self.ast.enclosing(node, NodeKind::is_xref_entry_point)
    }

    pub(crate) fn resolve_entry(&self, entry: NodeId) -> Result<bool> {
        let status = self.resolution.status.borrow().get(&entry).copied();
        match status {
            Some(ResolveStatus::Resolved(solved)) => return Ok(solved),
            Some(ResolveStatus::Resolving) => {
                warn!(%entry, kind = self.ast.kind(entry).name(), "resolution cycle");
                return Ok(false);
            }
            None => {}
        }

        self.resolution
            .status
            .borrow_mut()
            .insert(entry, ResolveStatus::Resolving);
        let result = self.resolve_internal(entry, None);
        match result {
            Ok(solved) => {
                self.resolution
                    .status
                    .borrow_mut()
                    .insert(entry, ResolveStatus::Resolved(solved));
            }
            Err(_) => {
                self.resolution.status.borrow_mut().remove(&entry);
            }
        }
        result
    }

    /// Build and solve the equation of `entry`, conjoined with `extra`
    pub(crate) fn resolve_internal(&self, entry: NodeId, extra: Option<Equation>) -> Result<bool> {
        let builder = EquationBuilder::new(self);
        let mut equation = builder.entry_equation(entry);
        if let Some(extra) = extra {
            equation = equation & extra;
        }
        builder.take_error()?;
        trace!(%entry, size = equation.size(), "built equation");

        if !self.solve_and_commit(entry, &equation, &builder)? {
            return Ok(false);
        }

        // Aggregates, outermost first; nested ones are queued as they appear
        let mut solved = true;
        let mut pending = builder.take_stopped();
        while let Some(aggregate) = pending.pop() {
            let Some(ty) = self.bound(type_var(&self.ast, aggregate)) else {
                debug!(%aggregate, "aggregate type not determined");
                solved = false;
                continue;
            };
            let inner = EquationBuilder::new(self);
            let equation = inner.aggregate_equation(aggregate, &ty) & Equation::bind(type_var(&self.ast, aggregate), ty);
            inner.take_error()?;
            if self.solve_and_commit(aggregate, &equation, &inner)? {
                pending.extend(inner.take_stopped());
            } else {
                solved = false;
            }
        }
        Ok(solved)
    }

    fn solve_and_commit(&self, node: NodeId, equation: &Equation, builder: &EquationBuilder<'_>) -> Result<bool> {
        let outcome = solve(equation, builder, self.config.solver_step_budget);
        // Errors raised while expanding are contract violations too
        builder.take_error()?;
        match outcome {
            Outcome::Solved(bindings) => {
                debug!(%node, bound = bindings.len(), "resolved");
                self.resolution.bindings.borrow_mut().extend(bindings);
                Ok(true)
            }
            Outcome::Unsatisfiable => {
                debug!(%node, kind = self.ast.kind(node).name(), "no solution");
                Ok(false)
            }
            Outcome::BudgetExhausted => {
                warn!(%node, budget = self.config.solver_step_budget, "resolution abandoned");
                Ok(false)
            }
        }
    }

    /// Committed value of a variable
    pub(crate) fn bound(&self, var: LogicVar) -> Option<Entity> {
        self.resolution.bindings.borrow().get(&var).copied()
    }

    /// Type of the loop parameter declared by a `for` loop specification
    pub(crate) fn loop_parameter_type(&self, spec: NodeId) -> Option<Entity> {
        let NodeKind::ForLoopSpec { iter, .. } = self.ast.kind(spec) else {
            return None;
        };
        if !self.resolve_entry(spec).ok()? {
            return None;
        }
        self.bound(type_var(&self.ast, *iter))
    }
}
