//! Context setup: population order, unit providers and contract errors

use super::support::*;
use crate::*;
use ferrada_syntax::{Ast, NodeKind, SyntaxError, UnitId, UnitKind};
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::rc::Rc;

#[test]
fn test_standard_is_loaded_and_visible() {
    let ctx = analysis();
    let standard = ctx.standard().copied().expect("Standard");
    let integer = ctx.get_first(ctx.root_env(), "INTEGER", LookupKind::Recursive, None, Categories::NORMAL);
    assert_eq!(integer, Some(standard.integer_type()));
    assert!(ctx.is_populated(standard.unit));
}

#[test]
fn test_without_standard() {
    let ctx = AnalysisContext::with_config(AnalysisConfig::new().with_standard(false)).expect("context");
    assert!(ctx.standard().is_none());
    assert_eq!(ctx.lookup(ctx.root_env(), "Integer", LookupKind::Recursive, None, Categories::NORMAL), vec![]);
}

#[test]
fn test_population_follows_dependencies() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    // The client is added first but needs A populated before it
    let client = client(&mut ctx, &mut marks);
    let a = package_a(&mut ctx, &mut marks);
    assert!(!ctx.is_populated(client));
    ctx.populate().expect("populate");
    assert!(ctx.is_populated(client));
    assert!(ctx.is_populated(a));

    let f = ctx.referenced_decl(marks.get("F (5)"), false).expect("query");
    assert_eq!(f.map(|e| e.node), Some(marks.get("A.F")));
}

#[test]
fn test_queries_before_population_fail() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    package_a(&mut ctx, &mut marks);
    client(&mut ctx, &mut marks);
    let result = ctx.referenced_decl(marks.get("F (5)"), false);
    assert_eq!(result, Err(SemanticError::NotPopulated));
    assert_eq!(ctx.expression_type(marks.get("5")), Err(SemanticError::NotPopulated));
}

#[test]
fn test_circular_with_clauses() {
    let mut ctx = analysis();
    ctx.add_unit("x", UnitKind::Spec, |b| {
        b.compilation_unit(vec![b.with_clause(&["Y"])], b.package("X", vec![], None))
    })
    .expect("x");
    ctx.add_unit("y", UnitKind::Spec, |b| {
        b.compilation_unit(vec![b.with_clause(&["X"])], b.package("Y", vec![], None))
    })
    .expect("y");

    match ctx.populate() {
        Err(SemanticError::CircularDependency { cycle }) => {
            assert!(cycle.contains('x') && cycle.contains('y'), "cycle: {cycle}");
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}

#[test]
fn test_duplicate_unit_is_rejected() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    package_a(&mut ctx, &mut marks);
    let again = ctx.add_unit("A", UnitKind::Spec, |b| b.compilation_unit(vec![], b.package("A", vec![], None)));
    assert!(matches!(again, Err(SemanticError::Syntax(SyntaxError::DuplicateUnit { .. }))));
}

/// Builds package `A` on request and counts the requests
struct LoadA {
    calls: Rc<Cell<usize>>,
}

impl UnitProvider for LoadA {
    fn get_unit(&self, ast: &mut Ast, name: &str, kind: UnitKind, load_if_needed: bool) -> Option<UnitId> {
        self.calls.set(self.calls.get() + 1);
        if name != "a" || kind != UnitKind::Spec {
            return None;
        }
        if let Some(unit) = ast.find_unit(name, kind) {
            return Some(unit);
        }
        if !load_if_needed {
            return None;
        }
        ast.build_unit(name, kind, |b| {
            let int = b.type_decl("Int", b.range_def(b.int(1), b.int(10)));
            let f = b.subp_decl(b.function_spec("F", vec![b.in_param(&["X"], b.name("Int"))], b.name("Int")));
            b.compilation_unit(vec![], b.package("A", vec![int, f], None))
        })
        .ok()
    }
}

#[test]
fn test_provider_loads_missing_units() {
    let mut ctx = analysis();
    let calls = Rc::new(Cell::new(0));
    ctx.set_unit_provider(Box::new(LoadA { calls: calls.clone() }));
    let mut marks = Marks::default();
    client(&mut ctx, &mut marks);
    ctx.populate().expect("populate");

    assert_eq!(calls.get(), 1);
    let a = ctx.get_unit("A", UnitKind::Spec).expect("A was loaded");
    assert!(ctx.is_populated(a));

    let f = ctx
        .referenced_decl(marks.get("F (5)"), false)
        .expect("query")
        .expect("F resolves");
    assert_eq!(ctx.ast().unit_of(f.node), Some(a));
    assert!(matches!(ctx.ast().kind(f.node), NodeKind::SubpDecl { .. }));
}

#[test]
fn test_missing_unit_leaves_names_unresolved() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    client(&mut ctx, &mut marks);
    ctx.populate().expect("missing units are only warned about");

    let call = marks.get("F (5)");
    assert_eq!(ctx.resolve_names(call), Ok(false));
    assert!(matches!(
        ctx.referenced_decl(call, false),
        Err(SemanticError::UnresolvedReference { .. })
    ));
}
