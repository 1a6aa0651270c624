//! Public queries over resolution results
//!
//! Every query resolves the enclosing entry point on demand; results come
//! from the committed bindings, so asking twice never solves twice.

use crate::calls::match_formals;
use crate::context::AnalysisContext;
use crate::entity::Entity;
use crate::error::{to_source_span, Result, SemanticError};
use crate::resolution::{ref_var, type_var};
use crate::symbols::Symbol;
use ferrada_syntax::{NodeId, NodeKind, Operator};
use tracing::debug;

impl AnalysisContext {
    /// Declaration a name refers to.
    ///
    /// `Ok(None)` when resolution succeeded without binding the name, as for
    /// predefined operators. When resolution failed the result is an
    /// `UnresolvedReference` error, unless `imprecise_fallback` asks for the
    /// first lexically visible declaration with the same simple name.
    pub fn referenced_decl(&self, name: NodeId, imprecise_fallback: bool) -> Result<Option<Entity>> {
        self.check_populated(name)?;
        let name = self.reference_node("referenced_decl", name)?;
        let solved = self.resolve_names(name)?;
        if let Some(decl) = self.bound(ref_var(&self.ast, name)) {
            return Ok(Some(decl));
        }
        if solved {
            return Ok(None);
        }
        if imprecise_fallback {
            let guess = self.imprecise_candidate(name)?;
            debug!(%name, found = guess.is_some(), "imprecise fallback");
            return Ok(guess);
        }
        Err(SemanticError::UnresolvedReference {
            node: name,
            text: self.name_text(name),
            span: to_source_span(self.ast.span(name)),
        })
    }

    /// Defining name of the declaration a name refers to
    pub fn referenced_defining_name(&self, name: NodeId, imprecise_fallback: bool) -> Result<Option<NodeId>> {
        let Some(decl) = self.referenced_decl(name, imprecise_fallback)? else {
            return Ok(None);
        };
        let symbol = self.name_symbol(self.reference_node("referenced_defining_name", name)?);
        let names = self.ast.defining_names(decl.node);
        let same_name = names
            .iter()
            .find(|n| symbol.is_some() && self.ast.text(**n).and_then(|t| self.symbol(t)) == symbol);
        Ok(same_name.or(names.first()).copied())
    }

    /// Resolved type of an expression
    pub fn expression_type(&self, expr: NodeId) -> Result<Option<Entity>> {
        self.check_populated(expr)?;
        let solved = self.resolve_names(expr)?;
        match self.bound(type_var(&self.ast, expr)) {
            Some(ty) => Ok(Some(ty)),
            None if solved => Ok(None),
            None => Err(SemanticError::UnresolvedType {
                node: expr,
                kind: self.ast.kind(expr).name(),
                span: to_source_span(self.ast.span(expr)),
            }),
        }
    }

    /// Declarations a name could denote before overload resolution
    pub fn matching_nodes(&self, expr: NodeId) -> Result<Vec<Entity>> {
        self.check_populated(expr)?;
        let ast = &self.ast;
        let candidates = match ast.kind(expr) {
            NodeKind::Identifier { .. } => match self.name_symbol(expr) {
                Some(symbol) => self.visible_candidates(expr, symbol)?,
                None => Vec::new(),
            },
            NodeKind::DottedName { prefix, suffix } => {
                let Some(symbol) = self.name_symbol(*suffix) else {
                    return Ok(Vec::new());
                };
                if let Some(package) = self.static_package(*prefix) {
                    self.selected_candidates(expr, &package, symbol)?
                } else {
                    self.selected_by_type(*prefix, symbol)?
                }
            }
            NodeKind::CallExpr { name, .. } => return self.matching_nodes(*name),
            NodeKind::BinOp { op, .. } | NodeKind::UnOp { op, .. } => return self.matching_nodes(*op),
            NodeKind::Op { op } => {
                let symbol = op.designator().and_then(|d| self.symbol(d));
                match symbol {
                    Some(symbol) => self.visible_candidates(expr, symbol)?,
                    None => Vec::new(),
                }
            }
            _ => Vec::new(),
        };
        Ok(candidates)
    }

    /// Components and primitives named `symbol` of the prefix's type
    fn selected_by_type(&self, prefix: NodeId, symbol: Symbol) -> Result<Vec<Entity>> {
        let Some(prefix_type) = self.expression_type(prefix).ok().flatten() else {
            return Ok(Vec::new());
        };
        let record = if self.is_access_type(&prefix_type) {
            match self.accessed_type(&prefix_type) {
                Some(target) => target,
                None => return Ok(Vec::new()),
            }
        } else {
            prefix_type
        };
        let mut out: Vec<Entity> = self.component_named(&record, symbol).into_iter().collect();
        if self.is_tagged_type(&record) {
            out.extend(
                self.primitives(&record)
                    .into_iter()
                    .filter(|p| self.decl_symbol(p.node) == Some(symbol)),
            );
        }
        Ok(out)
    }

    /// Static expression: literals, named numbers, constants with a static
    /// value, enumeration literals and predefined operators over them
    pub fn is_static_expr(&self, expr: NodeId) -> Result<bool> {
        let ast = &self.ast;
        let is_static = match ast.kind(expr) {
            NodeKind::IntLiteral { .. }
            | NodeKind::RealLiteral { .. }
            | NodeKind::CharLiteral { .. }
            | NodeKind::StringLiteral { .. } => true,
            NodeKind::Identifier { .. } | NodeKind::DottedName { .. } => match self.referenced_decl(expr, false) {
                Ok(Some(decl)) => self.is_static_decl(&decl)?,
                Ok(None) | Err(SemanticError::UnresolvedReference { .. }) => false,
                Err(error) => return Err(error),
            },
            NodeKind::BinOp { left, op, right } => {
                self.is_predefined_operator(*op)? && self.is_static_expr(*left)? && self.is_static_expr(*right)?
            }
            NodeKind::UnOp { op, operand } => self.is_predefined_operator(*op)? && self.is_static_expr(*operand)?,
            NodeKind::QualExpr { mark, expr } => self.is_static_subtype(*mark)? && self.is_static_expr(*expr)?,
            NodeKind::AttributeRef { prefix, .. } => {
                self.static_attribute(expr).is_some() && self.is_static_subtype(*prefix)?
            }
            NodeKind::ParamAssoc { expr, .. } => self.is_static_expr(*expr)?,
            _ => false,
        };
        Ok(is_static)
    }

    fn is_static_decl(&self, decl: &Entity) -> Result<bool> {
        match self.ast.kind(decl.node) {
            NodeKind::NumberDecl { .. } | NodeKind::EnumLiteralDecl { .. } => Ok(true),
            NodeKind::ObjectDecl {
                constant: true,
                default: Some(init),
                ..
            } => self.is_static_expr(*init),
            _ => Ok(false),
        }
    }

    /// Operator node not bound to a user-defined function
    fn is_predefined_operator(&self, op: NodeId) -> Result<bool> {
        self.resolve_names(op)?;
        Ok(self.bound(ref_var(&self.ast, op)).is_none())
    }

    /// Value of a static integer expression; `None` when the expression is
    /// not static, not discrete, or overflows
    pub fn static_value(&self, expr: NodeId) -> Result<Option<i128>> {
        let ast = &self.ast;
        let value = match ast.kind(expr) {
            NodeKind::IntLiteral { value } => Some(*value),
            NodeKind::CharLiteral { value } => Some(i128::from(u32::from(*value))),
            NodeKind::Identifier { .. } | NodeKind::DottedName { .. } => match self.referenced_decl(expr, false) {
                Ok(Some(decl)) => self.static_decl_value(&decl)?,
                Ok(None) | Err(SemanticError::UnresolvedReference { .. }) => None,
                Err(error) => return Err(error),
            },
            NodeKind::BinOp { left, op, right } => {
                let NodeKind::Op { op: operator } = ast.kind(*op) else {
                    return Ok(None);
                };
                if !self.is_predefined_operator(*op)? {
                    return Ok(None);
                }
                match (self.static_value(*left)?, self.static_value(*right)?) {
                    (Some(l), Some(r)) => fold_binary(*operator, l, r),
                    _ => None,
                }
            }
            NodeKind::UnOp { op, operand } => {
                let NodeKind::Op { op: operator } = ast.kind(*op) else {
                    return Ok(None);
                };
                if !self.is_predefined_operator(*op)? {
                    return Ok(None);
                }
                match (operator, self.static_value(*operand)?) {
                    (Operator::Plus, v) => v,
                    (Operator::Minus, v) => v.and_then(i128::checked_neg),
                    (Operator::Abs, v) => v.and_then(i128::checked_abs),
                    _ => None,
                }
            }
            NodeKind::QualExpr { expr, .. } | NodeKind::ParamAssoc { expr, .. } => self.static_value(*expr)?,
            NodeKind::AttributeRef { prefix, .. } => match self.static_attribute(expr) {
                Some(last) => self.designated_type(*prefix, None).map_or(Ok(None), |ty| {
                    self.static_bounds(&ty).map(|b| b.map(|(lo, hi)| if last { hi } else { lo }))
                })?,
                None => None,
            },
            _ => None,
        };
        Ok(value)
    }

    fn static_decl_value(&self, decl: &Entity) -> Result<Option<i128>> {
        match self.ast.kind(decl.node) {
            NodeKind::NumberDecl { expr, .. } => self.static_value(*expr),
            NodeKind::ObjectDecl {
                constant: true,
                default: Some(init),
                ..
            } => self.static_value(*init),
            NodeKind::EnumLiteralDecl { .. } => {
                let position = self.ast.parent(decl.node).and_then(|def| match self.ast.kind(def) {
                    NodeKind::EnumTypeDef { literals } => literals.iter().position(|l| *l == decl.node),
                    _ => None,
                });
                Ok(position.and_then(|p| i128::try_from(p).ok()))
            }
            _ => Ok(None),
        }
    }

    /// `Some(true)` for `'Last`, `Some(false)` for `'First`
    fn static_attribute(&self, attr: NodeId) -> Option<bool> {
        let NodeKind::AttributeRef { attribute, .. } = self.ast.kind(attr) else {
            return None;
        };
        match self.ast.text(*attribute)?.to_ascii_lowercase().as_str() {
            "first" => Some(false),
            "last" => Some(true),
            _ => None,
        }
    }

    /// Static subtype: a scalar subtype whose bounds are static
    pub fn is_static_subtype(&self, mark: NodeId) -> Result<bool> {
        self.check_populated(mark)?;
        match self.designated_type(mark, None) {
            Some(ty) if self.is_scalar_type(&ty) => self.is_static_type(&ty, 0),
            _ => Ok(false),
        }
    }

    fn is_static_type(&self, ty: &Entity, depth: usize) -> Result<bool> {
        if depth > self.config.max_derivation_depth {
            return Ok(false);
        }
        match self.ast.kind(ty.node) {
            NodeKind::SubtypeDecl { subtype, .. } => match self.ast.kind(*subtype) {
                NodeKind::SubtypeIndication { mark, constraint } => {
                    let constrained = match constraint {
                        Some(range) => self.is_static_range(*range)?,
                        None => true,
                    };
                    Ok(constrained && self.is_static_subtype(*mark)?)
                }
                _ => self.is_static_subtype(*subtype),
            },
            NodeKind::TypeDecl { def, .. } => match self.ast.kind(*def) {
                NodeKind::SignedIntTypeDef { range } => self.is_static_range(*range),
                NodeKind::ModIntTypeDef { modulus: expr } | NodeKind::FloatTypeDef { digits: expr } => {
                    self.is_static_expr(*expr)
                }
                NodeKind::EnumTypeDef { .. } | NodeKind::UniversalTypeDef { .. } => Ok(true),
                NodeKind::DerivedTypeDef { parent, .. } => match self.designated_type(*parent, ty.rebindings()) {
                    Some(parent) => self.is_static_type(&parent, depth + 1),
                    None => Ok(false),
                },
                _ => Ok(false),
            },
            _ => Ok(false),
        }
    }

    fn is_static_range(&self, range: NodeId) -> Result<bool> {
        match self.ast.kind(range) {
            NodeKind::BinOp { left, right, .. } => Ok(self.is_static_expr(*left)? && self.is_static_expr(*right)?),
            _ => self.is_static_expr(range),
        }
    }

    /// Bounds of a static discrete subtype
    fn static_bounds(&self, ty: &Entity) -> Result<Option<(i128, i128)>> {
        let range = match self.ast.kind(ty.node) {
            NodeKind::SubtypeDecl { subtype, .. } => match self.ast.kind(*subtype) {
                NodeKind::SubtypeIndication {
                    constraint: Some(range),
                    ..
                } => Some(*range),
                NodeKind::SubtypeIndication { mark, .. } => {
                    return self.designated_type(*mark, ty.rebindings()).map_or(Ok(None), |t| self.static_bounds(&t));
                }
                _ => None,
            },
            NodeKind::TypeDecl { def, .. } => match self.ast.kind(*def) {
                NodeKind::SignedIntTypeDef { range } => Some(*range),
                NodeKind::EnumTypeDef { literals } => {
                    return Ok(i128::try_from(literals.len()).ok().filter(|n| *n > 0).map(|n| (0, n - 1)));
                }
                _ => None,
            },
            _ => None,
        };
        match range.map(|r| self.ast.kind(r)) {
            Some(NodeKind::BinOp { left, right, .. }) => {
                Ok(self.static_value(*left)?.zip(self.static_value(*right)?))
            }
            _ => Ok(None),
        }
    }

    /// Call through a controlling formal whose actual is classwide
    pub fn is_dispatching_call(&self, node: NodeId) -> Result<bool> {
        let Some(subp) = self.called_subprogram(node)? else {
            return Ok(false);
        };
        let (callee, args) = match self.ast.kind(node) {
            NodeKind::CallExpr { name, args } => (*name, args.clone()),
            _ => (node, Vec::new()),
        };
        let dot_prefix = match self.ast.kind(callee) {
            NodeKind::DottedName { prefix, .. } if subp.md().dottable => Some(*prefix),
            _ => None,
        };

        let formals = self.subp_formals(&subp);
        let actuals = self.actuals(&args);
        let Some(matches) = match_formals(&formals, &actuals, dot_prefix.is_some()) else {
            return Ok(false);
        };
        for (position, m) in matches.iter().enumerate() {
            let actual = match (position, dot_prefix, m.actual) {
                (0, Some(prefix), _) => prefix,
                (_, _, Some(actual)) => actual.expr,
                _ => continue,
            };
            if !self.is_controlling_formal(&subp, &m.formal.spec) {
                continue;
            }
            if let Some(actual_type) = self.expression_type(actual).ok().flatten() {
                if self.is_classwide_type(&actual_type) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn is_controlling_formal(&self, subp: &Entity, param: &Entity) -> bool {
        let Some(formal_type) = self.type_of_decl(param) else {
            return false;
        };
        if !self.is_tagged_type(&formal_type) || self.is_classwide_type(&formal_type) {
            return false;
        }
        self.primitives(&formal_type).iter().any(|p| p.node == subp.node)
    }

    fn called_subprogram(&self, node: NodeId) -> Result<Option<Entity>> {
        let name = match self.ast.kind(node) {
            NodeKind::CallExpr { .. } | NodeKind::Identifier { .. } | NodeKind::DottedName { .. } => node,
            _ => return Ok(None),
        };
        match self.referenced_decl(name, false) {
            Ok(Some(decl)) if self.is_subprogram(decl.node) => Ok(Some(decl)),
            Ok(_) | Err(SemanticError::UnresolvedReference { .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }

    /// Whether a node calls a subprogram: call expressions, parameterless
    /// calls and operators bound to user-defined functions
    pub fn is_call(&self, node: NodeId) -> Result<bool> {
        let access_prefix = self.ast.parent(node).is_some_and(|parent| match self.ast.kind(parent) {
            NodeKind::AttributeRef { prefix, attribute, .. } => {
                *prefix == node
                    && self
                        .ast
                        .text(*attribute)
                        .is_some_and(|a| a.eq_ignore_ascii_case("access") || a.eq_ignore_ascii_case("unchecked_access"))
            }
            _ => false,
        });
        if access_prefix {
            return Ok(false);
        }
        let target = match self.ast.kind(node) {
            NodeKind::BinOp { op, .. } | NodeKind::UnOp { op, .. } => *op,
            NodeKind::CallExpr { .. } | NodeKind::Identifier { .. } | NodeKind::DottedName { .. } | NodeKind::Op { .. } => {
                node
            }
            _ => return Ok(false),
        };
        match self.referenced_decl(target, false) {
            Ok(decl) => Ok(decl.is_some_and(|d| self.is_subprogram(d.node))),
            Err(SemanticError::UnresolvedReference { .. }) => Ok(false),
            Err(error) => Err(error),
        }
    }

    /// Whether a name denotes a subprogram called in dot notation
    pub fn is_dot_call(&self, node: NodeId) -> Result<bool> {
        if !matches!(self.ast.kind(node), NodeKind::DottedName { .. } | NodeKind::CallExpr { .. }) {
            return Ok(false);
        }
        match self.referenced_decl(node, false) {
            Ok(decl) => Ok(decl.is_some_and(|d| d.md().dottable && self.is_subprogram(d.node))),
            Err(SemanticError::UnresolvedReference { .. }) => Ok(false),
            Err(error) => Err(error),
        }
    }

    pub fn is_defining(&self, node: NodeId) -> bool {
        self.ast.is_defining(node)
    }

    /// Node whose reference variable answers `referenced_decl`
    fn reference_node(&self, query: &'static str, node: NodeId) -> Result<NodeId> {
        let kind = self.ast.kind(node);
        if self.ast.is_defining(node) {
            return Err(SemanticError::illegal_query(
                query,
                node,
                kind.name(),
                "defining names do not refer to a declaration",
                self.ast.span(node),
            ));
        }
        match kind {
            NodeKind::BinOp { op, .. } | NodeKind::UnOp { op, .. } => Ok(*op),
            kind if kind.is_name() => Ok(node),
            kind => Err(SemanticError::illegal_query(
                query,
                node,
                kind.name(),
                "only names refer to declarations",
                self.ast.span(node),
            )),
        }
    }

    fn imprecise_candidate(&self, name: NodeId) -> Result<Option<Entity>> {
        let Some(symbol) = self.name_symbol(name) else {
            return Ok(None);
        };
        let anchor = match self.ast.kind(name) {
            NodeKind::DottedName { suffix, .. } => *suffix,
            NodeKind::CallExpr { name, .. } => *name,
            _ => name,
        };
        Ok(self.visible_candidates(anchor, symbol)?.into_iter().next())
    }

    pub(crate) fn name_text(&self, name: NodeId) -> String {
        match self.ast.kind(name) {
            NodeKind::Identifier { text } => text.clone(),
            NodeKind::DottedName { prefix, suffix } => format!("{}.{}", self.name_text(*prefix), self.name_text(*suffix)),
            NodeKind::CallExpr { name, .. } => self.name_text(*name),
            NodeKind::Op { op } => op.to_string(),
            kind => kind.name().to_string(),
        }
    }
}

/// Predefined integer operators over static values
pub(crate) fn fold_binary(op: Operator, l: i128, r: i128) -> Option<i128> {
    match op {
        Operator::Plus => l.checked_add(r),
        Operator::Minus => l.checked_sub(r),
        Operator::Mult => l.checked_mul(r),
        Operator::Div => l.checked_div(r),
        Operator::Rem => l.checked_rem(r),
        Operator::Mod => l.checked_rem_euclid(r).map(|m| if r < 0 && m != 0 { m + r } else { m }),
        Operator::Pow => u32::try_from(r).ok().and_then(|e| l.checked_pow(e)),
        Operator::Eq => Some(i128::from(l == r)),
        Operator::Neq => Some(i128::from(l != r)),
        Operator::Lt => Some(i128::from(l < r)),
        Operator::Lte => Some(i128::from(l <= r)),
        Operator::Gt => Some(i128::from(l > r)),
        Operator::Gte => Some(i128::from(l >= r)),
        _ => None,
    }
}

