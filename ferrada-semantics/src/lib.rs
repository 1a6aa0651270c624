// Ferrada Semantics Library
// Name resolution and type analysis over the Ferrada syntax tree

//! Name resolution and type analysis core for Ferrada, an Ada-like language.
//!
//! ## Architecture
//!
//! - **Environments**: lexical scopes populated once per unit, looked up
//!   with sequential visibility, use clauses and generic rebindings
//! - **Type relations**: canonical views, derivation, classwide types,
//!   primitives and the matching relations used by overload resolution
//! - **Logic equations**: each entry point becomes an equation over
//!   reference and type variables, solved with backtracking over overloads
//! - **Queries**: `referenced_decl`, `expression_type` and friends resolve
//!   on demand and memoize the result
//!
//! All state lives in an [`AnalysisContext`]; queries take `&self`.

pub mod calls;
pub mod config;
pub mod context;
pub mod dependency_graph;
pub mod entity;
pub mod env;
pub mod error;
pub mod generics;
pub mod logic;
pub mod lookup;
pub mod population;
pub mod queries;
pub mod report;
pub mod resolution;
pub mod standard;
pub mod symbols;
pub mod types;

// Re-export public API
pub use calls::{is_matching_param_list, match_formals, ParamMatch, SingleActual, SingleFormal};
pub use config::AnalysisConfig;
pub use context::{AnalysisContext, UnitProvider};
pub use entity::{Entity, EntityInfo, Metadata, RebindingId};
pub use env::{Categories, EnvId, EnvKind, LookupKind};
pub use error::{ResolutionDiagnostic, Result, SemanticError};
pub use generics::Instantiation;
pub use logic::{solve, Equation, LogicVar, Outcome, Theory};
pub use report::{ReportLine, ResolutionReport};
pub use standard::Standard;

// Version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests;
