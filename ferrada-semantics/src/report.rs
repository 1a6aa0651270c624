//! Per-unit name resolution reports
//!
//! Resolves every entry point of a unit, keeps going after failures, and
//! lists what each name and expression resolved to.

use crate::context::AnalysisContext;
use crate::entity::Entity;
use crate::error::{to_source_span, ResolutionDiagnostic, Result, SemanticError};
use crate::resolution::{ref_var, type_var};
use ferrada_syntax::{NodeId, NodeKind, UnitId};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info_span};

/// Resolution result of one name or expression
#[derive(Debug, Clone, PartialEq)]
pub struct ReportLine {
    pub node: NodeId,
    pub kind: &'static str,
    /// Source text for names, node kind otherwise
    pub text: String,
    pub decl: Option<Entity>,
    pub decl_name: Option<String>,
    pub ty: Option<Entity>,
    pub type_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionReport {
    pub unit: UnitId,
    pub unit_name: String,
    pub entry_points: usize,
    pub failed_entry_points: usize,
    pub lines: Vec<ReportLine>,
    pub diagnostics: Vec<ResolutionDiagnostic>,
}

impl ResolutionReport {
    /// Every entry point resolved
    pub fn is_clean(&self) -> bool {
        self.failed_entry_points == 0 && self.diagnostics.is_empty()
    }

    /// Line of a node, when the node is a name or an expression
    pub fn line(&self, node: NodeId) -> Option<&ReportLine> {
        self.lines.iter().find(|line| line.node == node)
    }
}

impl fmt::Display for ResolutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Resolving xrefs for {} ({} entry points, {} failed)",
            self.unit_name, self.entry_points, self.failed_entry_points
        )?;
        for line in &self.lines {
            write!(f, "  {} {}", line.kind, line.text)?;
            if let Some(decl) = &line.decl_name {
                write!(f, " references {decl}")?;
            }
            if let Some(ty) = &line.type_name {
                write!(f, " : {ty}")?;
            }
            writeln!(f)?;
        }
        for diagnostic in &self.diagnostics {
            writeln!(f, "  ! {diagnostic}")?;
        }
        Ok(())
    }
}

impl AnalysisContext {
    /// Resolve every entry point of `unit` and report the outcome
    pub fn resolve_unit(&self, unit: UnitId) -> Result<ResolutionReport> {
        let root = self.ast.unit(unit).root;
        self.check_populated(root)?;
        let unit_name = self.ast.unit(unit).name.clone();
        let _span = info_span!("resolve_unit", unit = %unit_name).entered();

        let nodes = self.ast.descendants(root);
        let mut diagnostics = Vec::new();
        let mut failed: HashSet<NodeId> = HashSet::new();
        let mut entry_points = 0;
        for node in nodes.iter().copied() {
            let kind = self.ast.kind(node);
            if !kind.is_xref_entry_point() {
                continue;
            }
            entry_points += 1;
            match self.resolve_entry(node) {
                Ok(true) => {}
                Ok(false) => {
                    failed.insert(node);
                    diagnostics.push(ResolutionDiagnostic::ResolutionFailed {
                        node,
                        kind: kind.name(),
                        span: to_source_span(self.ast.span(node)),
                    });
                }
                Err(error) if error.is_internal() => {
                    failed.insert(node);
                    diagnostics.push((node, error).into());
                }
                Err(error) => return Err(error),
            }
        }

        let mut lines = Vec::new();
        for node in nodes {
            let kind = self.ast.kind(node);
            if !(kind.is_expression() || kind.is_name()) || matches!(kind, NodeKind::Op { .. }) {
                continue;
            }
            let line = self.report_line(node);
            let in_failed_entry = self.entry_point(node).is_some_and(|entry| failed.contains(&entry));
            if in_failed_entry
                && line.decl.is_none()
                && matches!(kind, NodeKind::Identifier { .. } | NodeKind::DottedName { .. })
                && !self.is_designator(node)
            {
                diagnostics.push(ResolutionDiagnostic::NoReferenceFound {
                    node,
                    text: line.text.clone(),
                    span: to_source_span(self.ast.span(node)),
                });
            }
            lines.push(line);
        }

        debug!(entry_points, failed = failed.len(), "unit resolved");
        Ok(ResolutionReport {
            unit,
            unit_name,
            entry_points,
            failed_entry_points: failed.len(),
            lines,
            diagnostics,
        })
    }

    fn report_line(&self, node: NodeId) -> ReportLine {
        let kind = self.ast.kind(node);
        let reference = match kind {
            NodeKind::BinOp { op, .. } | NodeKind::UnOp { op, .. } => *op,
            _ => node,
        };
        let decl = self.bound(ref_var(&self.ast, reference));
        let ty = if kind.is_expression() {
            self.bound(type_var(&self.ast, node))
        } else {
            None
        };
        let text = match kind {
            NodeKind::Identifier { .. } | NodeKind::DottedName { .. } | NodeKind::CallExpr { .. } => self.name_text(node),
            NodeKind::IntLiteral { value } => value.to_string(),
            NodeKind::StringLiteral { value } => format!("{value:?}"),
            NodeKind::CharLiteral { value } => format!("'{value}'"),
            _ => String::new(),
        };
        ReportLine {
            node,
            kind: kind.name(),
            text,
            decl,
            decl_name: decl.map(|d| self.entity_name(&d)),
            ty,
            type_name: ty.map(|t| self.entity_name(&t)),
        }
    }

    /// Display name of a declaration or type
    pub fn entity_name(&self, entity: &Entity) -> String {
        match self.ast.kind(entity.node) {
            NodeKind::ClasswideTypeDecl { specific } => {
                format!("{}'Class", self.ast.decl_name(*specific).unwrap_or("?"))
            }
            NodeKind::AnonymousTypeDecl { .. } => "<anonymous>".to_string(),
            kind => self
                .ast
                .decl_name(entity.node)
                .map_or_else(|| kind.name().to_string(), str::to_string),
        }
    }

    /// Formal designators in named associations
    fn is_designator(&self, node: NodeId) -> bool {
        self.ast.parent(node).is_some_and(|parent| {
            matches!(self.ast.kind(parent), NodeKind::ParamAssoc { designator: Some(d), .. } if *d == node)
        })
    }
}

impl From<(NodeId, SemanticError)> for ResolutionDiagnostic {
    fn from((node, error): (NodeId, SemanticError)) -> Self {
        ResolutionDiagnostic::Internal { node, error }
    }
}
