// Ferrada Syntax Error Handling
// Misuse of the tree builder, reported through miette

use crate::ast::NodeId;
use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while assembling a compilation unit
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("Compilation unit has an empty name")]
    #[diagnostic(
        code(ferrada::syntax::empty_unit_name),
        help("Give every unit its library name, e.g. \"ada.text_io\"")
    )]
    EmptyUnitName,

    #[error("Duplicate compilation unit '{name}'")]
    #[diagnostic(
        code(ferrada::syntax::duplicate_unit),
        help("A library name may have at most one specification and one body")
    )]
    DuplicateUnit { name: String },

    #[error("Unit root must be a CompilationUnit, found {found}")]
    #[diagnostic(
        code(ferrada::syntax::invalid_root),
        help("Wrap the library item with `compilation_unit(prelude, item)`")
    )]
    InvalidRoot { found: String },

    #[error("Node {node} is attached to more than one parent")]
    #[diagnostic(
        code(ferrada::syntax::node_reused),
        help("Build a fresh node for every occurrence")
    )]
    NodeReused { node: NodeId },

    #[error("Node {node} belongs to another compilation unit")]
    #[diagnostic(code(ferrada::syntax::foreign_node))]
    ForeignNode { node: NodeId },

    #[error("{kind} node {node} was built but never attached to the tree")]
    #[diagnostic(
        code(ferrada::syntax::detached_node),
        help("Every node built for a unit must be reachable from its root")
    )]
    DetachedNode { node: NodeId, kind: String },
}
