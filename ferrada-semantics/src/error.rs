//! Error types for the Ferrada semantic core
//!
//! Following the syntax crate's miette patterns. Lookup misses and failed
//! solves are not errors: they surface as empty results and `false`. The
//! variants here are contract violations and unreadable results.

use ferrada_syntax::{NodeId, Span, SyntaxError};
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SemanticError>;

/// Main semantic error type
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum SemanticError {
    #[error("Illegal query '{query}' on {kind} node {node}: {reason}")]
    #[diagnostic(
        code(ferrada::semantics::illegal_query),
        help("This query is meaningless for this node; the caller is at fault")
    )]
    IllegalQuery {
        query: &'static str,
        node: NodeId,
        kind: &'static str,
        reason: &'static str,
        #[label("queried here")]
        span: Option<SourceSpan>,
    },

    #[error("Incorrect rebindings on entity {node}")]
    #[diagnostic(
        code(ferrada::semantics::incorrect_rebindings),
        help("A rebinding chain can only be extended from the entity's own chain")
    )]
    IncorrectRebindings { node: NodeId },

    #[error("No reference found for '{text}'")]
    #[diagnostic(
        code(ferrada::semantics::unresolved_reference),
        help("Name resolution of the enclosing construct failed; request an imprecise fallback for a best-effort answer")
    )]
    UnresolvedReference {
        node: NodeId,
        text: String,
        #[label("unresolved")]
        span: Option<SourceSpan>,
    },

    #[error("No type found for {kind} node {node}")]
    #[diagnostic(
        code(ferrada::semantics::unresolved_type),
        help("Name resolution of the enclosing construct failed")
    )]
    UnresolvedType {
        node: NodeId,
        kind: &'static str,
        #[label("untyped")]
        span: Option<SourceSpan>,
    },

    #[error("Circular unit dependency: {cycle}")]
    #[diagnostic(
        code(ferrada::semantics::circular_dependency),
        help("Units cannot depend on themselves through with clauses or parent units")
    )]
    CircularDependency { cycle: String },

    #[error("Unit '{name}' is not available")]
    #[diagnostic(code(ferrada::semantics::missing_unit))]
    MissingUnit { name: String },

    #[error("Environments are not populated")]
    #[diagnostic(
        code(ferrada::semantics::not_populated),
        help("Call `AnalysisContext::populate` after adding units and before querying")
    )]
    NotPopulated,

    #[error("Invalid syntax tree")]
    #[diagnostic(code(ferrada::semantics::syntax))]
    Syntax(#[from] SyntaxError),
}

impl SemanticError {
    pub fn illegal_query(
        query: &'static str,
        node: NodeId,
        kind: &'static str,
        reason: &'static str,
        span: Option<Span>,
    ) -> Self {
        Self::IllegalQuery {
            query,
            node,
            kind,
            reason,
            span: to_source_span(span),
        }
    }

    /// Whether this error reports a defect of the caller or of the core,
    /// rather than a property of the analyzed program
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            SemanticError::IllegalQuery { .. } | SemanticError::IncorrectRebindings { .. }
        )
    }
}

/// Non-fatal findings recorded by unit resolution reports
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum ResolutionDiagnostic {
    #[error("No reference found for '{text}'")]
    #[diagnostic(code(ferrada::semantics::no_reference), severity(Warning))]
    NoReferenceFound {
        node: NodeId,
        text: String,
        #[label("could not be resolved")]
        span: Option<SourceSpan>,
    },

    #[error("Name resolution failed for {kind}")]
    #[diagnostic(code(ferrada::semantics::resolution_failed), severity(Warning))]
    ResolutionFailed {
        node: NodeId,
        kind: &'static str,
        #[label("in this construct")]
        span: Option<SourceSpan>,
    },

    #[error("{error}")]
    #[diagnostic(code(ferrada::semantics::internal), severity(Error))]
    Internal { node: NodeId, error: SemanticError },
}

/// Helper for creating source spans from optional spans
pub fn to_source_span(span: Option<Span>) -> Option<SourceSpan> {
    span.map(|s| SourceSpan::new(s.start.into(), s.end - s.start))
}
