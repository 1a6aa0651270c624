//! Tests for tree construction and the per-kind static tables

mod test_builder;
mod test_navigation;
