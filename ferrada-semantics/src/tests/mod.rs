//! Tests for environments, type relations, the solver and name resolution

mod support;

mod test_context;
mod test_generics;
mod test_queries;
mod test_resolution;
mod test_solver;
