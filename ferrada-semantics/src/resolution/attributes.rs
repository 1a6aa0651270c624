//! Attribute references
//!
//! The supported attributes live in a table built once; each kind knows
//! whether its prefix must be a subtype mark and what type it yields.

use super::equations::EquationBuilder;
use crate::entity::Entity;
use crate::logic::{Conversion, Equation, Pred, Relation};
use ferrada_syntax::{NodeId, NodeKind};
use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::trace;

lazy_static! {
    static ref ATTRIBUTES: HashMap<&'static str, AttributeKind> = build_attribute_table();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeKind {
    /// `First`, `Last`
    Bound,
    Range,
    Length,
    Size,
    Class,
    Base,
    /// `Access`, `Unchecked_Access`
    Access,
    Image,
    Value,
    Pos,
    Val,
    /// `Succ`, `Pred`
    Step,
    /// `Min`, `Max`
    Extremum,
}

/// Names are stored folded
fn build_attribute_table() -> HashMap<&'static str, AttributeKind> {
    use AttributeKind::*;
    [
        ("first", Bound),
        ("last", Bound),
        ("range", Range),
        ("length", Length),
        ("size", Size),
        ("class", Class),
        ("base", Base),
        ("access", Access),
        ("unchecked_access", Access),
        ("image", Image),
        ("value", Value),
        ("pos", Pos),
        ("val", Val),
        ("succ", Step),
        ("pred", Step),
        ("min", Extremum),
        ("max", Extremum),
    ]
    .into_iter()
    .collect()
}

impl EquationBuilder<'_> {
    /// Equation of `Prefix'Attribute (Args)`; `extra` holds arguments given
    /// through an enclosing call
    pub(super) fn attribute(&self, node: NodeId, extra: &[NodeId]) -> Equation {
        let ctx = self.ctx;
        let NodeKind::AttributeRef { prefix, attribute, args } = ctx.ast.kind(node) else {
            return Equation::falsity();
        };
        let Some(kind) = ctx
            .ast
            .text(*attribute)
            .and_then(|name| ATTRIBUTES.get(name.to_ascii_lowercase().as_str()).copied())
        else {
            trace!(%node, "unknown attribute");
            return Equation::falsity();
        };

        let prefix = *prefix;
        let args: Vec<NodeId> = args.iter().chain(extra).copied().collect();
        let actuals: Vec<NodeId> = ctx.actuals(&args).into_iter().map(|a| a.expr).collect();
        let t = self.tv(node);
        let prefix_type = self.type_prefix(prefix);

        match (kind, prefix_type) {
            (AttributeKind::Bound | AttributeKind::Range, Some(ty)) => {
                let bound = if ctx.is_array_type(&ty) {
                    ctx.index_types(&ty).first().copied()
                } else {
                    Some(ty)
                };
                self.bind_mark(prefix, &ty) & self.bind_opt(t, bound)
            }
            (AttributeKind::Bound | AttributeKind::Range, None) => {
                self.expr(prefix) & Equation::propagate(t, self.tv(prefix), Conversion::FirstIndexType)
            }
            (AttributeKind::Length | AttributeKind::Size, ty) => {
                self.prefix_eq(prefix, ty.as_ref()) & self.bind_opt(t, self.universal_int())
            }
            (AttributeKind::Class, Some(ty)) => self.bind_mark(prefix, &ty) & self.bind_opt(t, ctx.classwide_type(&ty)),
            (AttributeKind::Base, Some(ty)) => {
                self.bind_mark(prefix, &ty) & Equation::bind(t, ctx.canonical_type(&ty))
            }
            (AttributeKind::Access, None) => {
                self.expr(prefix) & Equation::predicate(Pred::Designates, vec![t, self.tv(prefix)])
            }
            (AttributeKind::Image, ty) => {
                let operand = match (&ty, actuals.first()) {
                    (Some(ty), Some(arg)) => self.argument(*arg, ty),
                    _ => Equation::truth(),
                };
                self.prefix_eq(prefix, ty.as_ref()) & operand & self.bind_opt(t, self.string())
            }
            (AttributeKind::Value, Some(ty)) => {
                let Some(string) = self.string() else {
                    return Equation::falsity();
                };
                self.bind_mark(prefix, &ty) & self.arguments(&actuals, &[string]) & Equation::bind(t, ty)
            }
            (AttributeKind::Pos, Some(ty)) => {
                self.bind_mark(prefix, &ty) & self.arguments(&actuals, &[ty]) & self.bind_opt(t, self.universal_int())
            }
            (AttributeKind::Val, Some(ty)) => {
                let [arg] = actuals[..] else {
                    return Equation::falsity();
                };
                self.bind_mark(prefix, &ty)
                    & self.expr(arg)
                    & Equation::predicate(Pred::IsInteger, vec![self.tv(arg)])
                    & Equation::bind(t, ty)
            }
            (AttributeKind::Step, Some(ty)) => {
                self.bind_mark(prefix, &ty) & self.arguments(&actuals, &[ty]) & Equation::bind(t, ty)
            }
            (AttributeKind::Extremum, Some(ty)) => {
                self.bind_mark(prefix, &ty) & self.arguments(&actuals, &[ty, ty]) & Equation::bind(t, ty)
            }
            _ => Equation::falsity(),
        }
    }

    /// Type denoted by an attribute prefix, when the prefix is a subtype mark
    fn type_prefix(&self, prefix: NodeId) -> Option<Entity> {
        let ctx = self.ctx;
        if !matches!(
            ctx.ast.kind(prefix),
            NodeKind::Identifier { .. } | NodeKind::DottedName { .. } | NodeKind::AttributeRef { .. }
        ) {
            return None;
        }
        let first = ctx.static_entities(prefix, None).into_iter().next()?;
        if !ctx.is_type(first.node) {
            return None;
        }
        ctx.designated_type(prefix, None)
    }

    fn prefix_eq(&self, prefix: NodeId, ty: Option<&Entity>) -> Equation {
        match ty {
            Some(ty) => self.bind_mark(prefix, ty),
            None => self.expr(prefix),
        }
    }

    fn argument(&self, arg: NodeId, ty: &Entity) -> Equation {
        self.expr(arg) & Equation::bind_with(self.tv(arg), *ty, Relation::MatchingType)
    }

    /// Arguments matched positionally against their expected types
    fn arguments(&self, args: &[NodeId], types: &[Entity]) -> Equation {
        if args.len() != types.len() {
            return Equation::falsity();
        }
        Equation::and(args.iter().zip(types).map(|(arg, ty)| self.argument(*arg, ty)))
    }
}
