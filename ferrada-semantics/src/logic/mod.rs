//! Logic variables, equations and their solver

pub mod equation;
pub mod solver;

pub use equation::{Conversion, Equation, EquationKind, ExpandRule, LogicVar, Pred, Relation, Slot};
pub use solver::{solve, Bindings, Outcome, Theory};
