// Ferrada Syntax Library
// Syntax tree consumed by the semantic core

//! The syntax tree model for Ferrada, an Ada-like language.
//!
//! Parsing is a collaborator's job; this crate only defines the tree the
//! semantic core consumes: an arena of [`Node`]s with a closed [`NodeKind`]
//! sum type, compilation [`Unit`]s, source order, parent navigation, and the
//! per-kind static tables (children, defining names, entry points).
//! Trees are assembled with [`AstBuilder`].

pub mod ast;
pub mod builder;
pub mod error;

pub use ast::*;
pub use builder::AstBuilder;
pub use error::SyntaxError;

// Version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests;
