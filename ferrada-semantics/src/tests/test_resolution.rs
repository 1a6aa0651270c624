//! Name resolution through the public queries

use super::support::*;
use crate::*;
use ferrada_syntax::{NodeKind, Operator, ParamMode, UnitKind};
use pretty_assertions::assert_eq;

#[test]
fn test_call_across_units() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    package_a(&mut ctx, &mut marks);
    client(&mut ctx, &mut marks);
    ctx.populate().expect("populate");

    let call = marks.get("F (5)");
    assert_eq!(ctx.resolve_names(call), Ok(true));
    let f = ctx.referenced_decl(call, false).expect("query").expect("bound");
    assert_eq!(f.node, marks.get("A.F"));

    let int = marks.get("A.Int");
    assert_eq!(ctx.expression_type(marks.get("5")).expect("query").map(|t| t.node), Some(int));
    assert_eq!(ctx.expression_type(call).expect("query").map(|t| t.node), Some(int));
    assert_eq!(ctx.designated_type(marks.get("Int mark"), None).map(|t| t.node), Some(int));

    let defining = ctx.referenced_defining_name(call, false).expect("query").expect("bound");
    assert_eq!(ctx.ast().text(defining), Some("F"));
}

#[test]
fn test_overloads_are_chosen_by_argument_type() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    main_body(&mut ctx, &[], |b| {
        let p_int = marks.set(
            "P Integer",
            b.subp_body(b.procedure_spec("P", vec![b.in_param(&["X"], b.name("Integer"))]), vec![], vec![b.null_stmt()]),
        );
        let p_float = marks.set(
            "P Float",
            b.subp_body(b.procedure_spec("P", vec![b.in_param(&["X"], b.name("Float"))]), vec![], vec![b.null_stmt()]),
        );
        let int_call = marks.set("P (1)", b.call(b.name("P"), vec![b.int(1)]));
        let float_call = marks.set("P (1.0)", b.call(b.name("P"), vec![b.real(1.0)]));
        let named = marks.set("X => 2", b.named("X", b.int(2)));
        let named_call = marks.set("P (X => 2)", b.call(b.name("P"), vec![named]));
        (
            vec![p_int, p_float],
            vec![b.call_stmt(int_call), b.call_stmt(float_call), b.call_stmt(named_call)],
        )
    });
    ctx.populate().expect("populate");

    let decl = |label: &str| ctx.referenced_decl(marks.get(label), false).expect("query").map(|e| e.node);
    assert_eq!(decl("P (1)"), Some(marks.get("P Integer")));
    assert_eq!(decl("P (1.0)"), Some(marks.get("P Float")));
    assert_eq!(decl("P (X => 2)"), Some(marks.get("P Integer")));
    assert_eq!(ctx.matching_nodes(marks.get("P (1)")).expect("query").len(), 2);
    assert!(ctx.is_call(marks.get("P (1)")).expect("query"));
}

#[test]
fn test_failed_entry_point_does_not_affect_others() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    main_body(&mut ctx, &[], |b| {
        let x = b.object(&["X"], b.name("Integer"), None);
        let bad = marks.set("Undefined_Proc (1)", b.call(b.name("Undefined_Proc"), vec![b.int(1)]));
        let target = marks.set("X target", b.name("X"));
        let assign = b.assign(target, b.int(2));
        (vec![x], vec![b.call_stmt(bad), assign])
    });
    ctx.populate().expect("populate");

    let bad = marks.get("Undefined_Proc (1)");
    assert_eq!(ctx.resolve_names(bad), Ok(false));
    match ctx.referenced_decl(bad, false) {
        Err(SemanticError::UnresolvedReference { text, .. }) => assert_eq!(text, "Undefined_Proc"),
        other => panic!("expected an unresolved reference, got {other:?}"),
    }
    assert_eq!(ctx.resolve_names(marks.get("X target")), Ok(true));
}

#[test]
fn test_resolution_is_idempotent() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    package_a(&mut ctx, &mut marks);
    client(&mut ctx, &mut marks);
    ctx.populate().expect("populate");

    let call = marks.get("F (5)");
    let first = ctx.referenced_decl(call, false);
    let first_type = ctx.expression_type(marks.get("5"));
    for _ in 0..3 {
        assert_eq!(ctx.resolve_names(call), Ok(true));
        assert_eq!(ctx.referenced_decl(call, false), first);
        assert_eq!(ctx.expression_type(marks.get("5")), first_type);
    }
}

#[test]
fn test_querying_a_defining_name_is_illegal() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    let unit = package_a(&mut ctx, &mut marks);
    ctx.populate().expect("populate");

    let defining = ctx.ast().defining_names(marks.get("A.Int"))[0];
    assert!(ctx.is_defining(defining));
    assert!(matches!(
        ctx.referenced_decl(defining, false),
        Err(SemanticError::IllegalQuery { query: "referenced_decl", .. })
    ));
    let root = ctx.ast().unit(unit).root;
    assert!(matches!(ctx.referenced_decl(root, false), Err(SemanticError::IllegalQuery { .. })));
}

fn dot_calls() -> (AnalysisContext, Marks) {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    shapes(&mut ctx, &mut marks);
    ctx.add_unit("main", UnitKind::Body, |b| {
        let s = b.object(&["S"], b.name("Shape"), None);
        let c = b.object(&["C"], b.name("Circle"), None);
        let i = b.object(&["I"], b.name("Integer"), None);
        let prefixed = marks.set("Shapes.Area (S)", b.call(b.path("Shapes.Area"), vec![b.name("S")]));
        let dot = marks.set("S.Area", b.dotted(b.name("S"), "Area"));
        let inherited = marks.set("C.Area", b.dotted(b.name("C"), "Area"));
        let component = marks.set("S.X", b.dotted(b.name("S"), "X"));
        let stmts = vec![
            b.assign(b.name("I"), prefixed),
            b.assign(b.name("I"), dot),
            b.assign(b.name("I"), inherited),
            b.assign(b.name("I"), component),
        ];
        let prelude = vec![b.with_clause(&["Shapes"]), b.use_clause(&["Shapes"])];
        b.compilation_unit(prelude, b.subp_body(b.procedure_spec("Main", vec![]), vec![s, c, i], stmts))
    })
    .expect("main");
    ctx.populate().expect("populate");
    (ctx, marks)
}

#[test]
fn test_dot_notation_reaches_the_same_primitive() {
    let (ctx, marks) = dot_calls();
    let area = marks.get("Area");

    let prefixed = ctx.referenced_decl(marks.get("Shapes.Area (S)"), false).expect("query").expect("bound");
    let dot = ctx.referenced_decl(marks.get("S.Area"), false).expect("query").expect("bound");
    assert_eq!(prefixed.node, area);
    assert_eq!(dot.node, area);

    assert!(ctx.is_dot_call(marks.get("S.Area")).expect("query"));
    assert!(!ctx.is_dot_call(marks.get("Shapes.Area (S)")).expect("query"));
    assert!(ctx.is_call(marks.get("S.Area")).expect("query"));
    assert!(!ctx.is_dispatching_call(marks.get("S.Area")).expect("query"));
}

#[test]
fn test_dot_notation_on_inherited_primitive() {
    let (ctx, marks) = dot_calls();
    let inherited = ctx.referenced_decl(marks.get("C.Area"), false).expect("query").expect("bound");
    assert_eq!(inherited.node, marks.get("Area"));
    assert_eq!(inherited.md().primitive, Some(marks.get("Circle")));
    assert!(inherited.md().dottable);
}

#[test]
fn test_component_selection() {
    let (ctx, marks) = dot_calls();
    let component = ctx.referenced_decl(marks.get("S.X"), false).expect("query").expect("bound");
    assert!(matches!(ctx.ast().kind(component.node), NodeKind::ComponentDecl { .. }));
    assert_eq!(ctx.ast().decl_name(component.node), Some("X"));
    assert!(!ctx.is_dot_call(marks.get("S.X")).expect("query"));
    assert_eq!(
        name_of(&ctx, ctx.expression_type(marks.get("S.X")).expect("query")),
        Some("Integer".to_string())
    );
}

#[test]
fn test_predefined_and_user_operators() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    main_body(&mut ctx, &[], |b| {
        let money = b.type_decl("Money", b.record_def(false, vec![b.component(&["Cents"], b.name("Integer"), None)]));
        let plus = marks.set(
            "\"+\"",
            b.subp_decl(b.function_spec(
                "\"+\"",
                vec![b.in_param(&["L", "R"], b.name("Money"))],
                b.name("Money"),
            )),
        );
        let one = marks.set("1", b.int(1));
        let sum = marks.set("1 + 2", b.bin(one, Operator::Plus, b.int(2)));
        let x = b.object(&["X"], b.name("Integer"), Some(sum));
        let a = b.object(&["A", "B"], b.name("Money"), None);
        let money_sum = marks.set("A + B", b.bin(b.name("A"), Operator::Plus, b.name("B")));
        let c = b.object(&["C"], b.name("Money"), Some(money_sum));
        (vec![money, plus, x, a, c], vec![b.null_stmt()])
    });
    ctx.populate().expect("populate");

    let sum = marks.get("1 + 2");
    assert_eq!(ctx.referenced_decl(sum, false), Ok(None));
    assert_eq!(name_of(&ctx, ctx.expression_type(sum).expect("query")), Some("Integer".to_string()));
    assert_eq!(name_of(&ctx, ctx.expression_type(marks.get("1")).expect("query")), Some("Integer".to_string()));
    assert!(!ctx.is_call(sum).expect("query"));

    let money_sum = marks.get("A + B");
    let plus = ctx.referenced_decl(money_sum, false).expect("query").map(|e| e.node);
    assert_eq!(plus, Some(marks.get("\"+\"")));
    assert_eq!(name_of(&ctx, ctx.expression_type(money_sum).expect("query")), Some("Money".to_string()));
    assert!(ctx.is_call(money_sum).expect("query"));
}

#[test]
fn test_record_aggregate_takes_its_type_from_context() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    main_body(&mut ctx, &[], |b| {
        let pt = b.type_decl("Pt", b.record_def(false, vec![b.component(&["X", "Y"], b.name("Integer"), None)]));
        let first = marks.set("1", b.int(1));
        let named = marks.set("2", b.int(2));
        let aggregate = marks.set("(1, Y => 2)", b.aggregate(vec![first, b.agg_assoc(vec![b.name("Y")], named)]));
        let p = b.object(&["P"], b.name("Pt"), Some(aggregate));
        (vec![pt, p], vec![b.null_stmt()])
    });
    ctx.populate().expect("populate");

    let type_name = |label: &str| name_of(&ctx, ctx.expression_type(marks.get(label)).expect("query"));
    assert_eq!(type_name("(1, Y => 2)"), Some("Pt".to_string()));
    assert_eq!(type_name("1"), Some("Integer".to_string()));
    assert_eq!(type_name("2"), Some("Integer".to_string()));
}

#[test]
fn test_control_flow_statements() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    main_body(&mut ctx, &[], |b| {
        let flag = b.object(&["Flag"], b.name("Boolean"), None);
        let total = b.object(&["Total"], b.name("Integer"), Some(b.int(0)));
        let cond = marks.set("Total < 10", b.bin(b.name("Total"), Operator::Lt, b.int(10)));
        let bump = b.assign(b.name("Total"), b.bin(b.name("Total"), Operator::Plus, b.int(1)));
        let lo = b.int(1);
        let loop_var = marks.set("I", b.name("I"));
        let body = b.assign(b.name("Total"), loop_var);
        let for_loop = b.for_loop("I", false, b.range(lo, b.int(3)), vec![body]);
        let check = b.if_stmt(b.name("Flag"), vec![b.null_stmt()], vec![], vec![]);
        (vec![flag, total], vec![b.while_loop(cond, vec![bump]), for_loop, check])
    });
    ctx.populate().expect("populate");

    assert_eq!(
        name_of(&ctx, ctx.expression_type(marks.get("Total < 10")).expect("query")),
        Some("Boolean".to_string())
    );
    assert_eq!(
        name_of(&ctx, ctx.expression_type(marks.get("I")).expect("query")),
        Some("Integer".to_string())
    );
    let var = ctx.referenced_decl(marks.get("I"), false).expect("query").expect("bound");
    assert!(matches!(ctx.ast().kind(var.node), NodeKind::ForLoopVarDecl { .. }));
}

/// ```text
/// package Objs is
///    type Obj_T is tagged null record;
///    procedure Foo (O : Obj_T; N : Integer);
/// end Objs;
/// ```
#[test]
fn test_dot_call_with_arguments_matches_prefixed_call() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    ctx.add_unit("objs", UnitKind::Spec, |b| {
        let obj_t = b.type_decl("Obj_T", b.record_def(true, vec![]));
        let foo = marks.set(
            "Foo",
            b.subp_decl(b.procedure_spec(
                "Foo",
                vec![b.in_param(&["O"], b.name("Obj_T")), b.in_param(&["N"], b.name("Integer"))],
            )),
        );
        b.compilation_unit(vec![], b.package("Objs", vec![obj_t, foo], None))
    })
    .expect("Objs");
    ctx.add_unit("main", UnitKind::Body, |b| {
        let obj = b.object(&["Obj"], b.name("Obj_T"), None);
        let dot = marks.set("Obj.Foo (5)", b.call(b.dotted(b.name("Obj"), "Foo"), vec![b.int(5)]));
        let prefixed = marks.set("Foo (Obj, 5)", b.call(b.name("Foo"), vec![b.name("Obj"), b.int(5)]));
        let prelude = vec![b.with_clause(&["Objs"]), b.use_clause(&["Objs"])];
        let stmts = vec![b.call_stmt(dot), b.call_stmt(prefixed)];
        b.compilation_unit(prelude, b.subp_body(b.procedure_spec("Main", vec![]), vec![obj], stmts))
    })
    .expect("main");
    ctx.populate().expect("populate");

    let dot = marks.get("Obj.Foo (5)");
    let prefixed = marks.get("Foo (Obj, 5)");
    assert_eq!(ctx.resolve_names(dot), Ok(true));
    assert_eq!(ctx.resolve_names(prefixed), Ok(true));

    let decl = |node| ctx.referenced_decl(node, false).expect("query").map(|e| e.node);
    assert_eq!(decl(dot), Some(marks.get("Foo")));
    assert_eq!(decl(prefixed), Some(marks.get("Foo")));
    assert!(ctx.is_dot_call(dot).expect("query"));
    assert!(!ctx.is_dot_call(prefixed).expect("query"));
}

#[test]
fn test_inequality_uses_a_user_equality() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    main_body(&mut ctx, &[], |b| {
        let money = b.type_decl("Money", b.record_def(false, vec![b.component(&["Cents"], b.name("Integer"), None)]));
        let eq = marks.set(
            "\"=\"",
            b.subp_decl(b.function_spec(
                "\"=\"",
                vec![b.in_param(&["L", "R"], b.name("Money"))],
                b.name("Boolean"),
            )),
        );
        let a = b.object(&["A", "B"], b.name("Money"), None);
        let ne = marks.set("A /= B", b.bin(b.name("A"), Operator::Neq, b.name("B")));
        let x = b.object(&["X"], b.name("Boolean"), Some(ne));
        (vec![money, eq, a, x], vec![b.null_stmt()])
    });
    ctx.populate().expect("populate");

    let ne = marks.get("A /= B");
    assert_eq!(ctx.resolve_names(ne), Ok(true));
    let decl = ctx.referenced_decl(ne, false).expect("query").map(|e| e.node);
    assert_eq!(decl, Some(marks.get("\"=\"")));
    assert_eq!(name_of(&ctx, ctx.expression_type(ne).expect("query")), Some("Boolean".to_string()));
}

/// `procedure P (A : Integer; B : Integer := 0)` called with each shape
/// of actual list
#[test]
fn test_actual_lists_must_match_the_formals() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    main_body(&mut ctx, &[], |b| {
        let p = marks.set(
            "P",
            b.subp_body(
                b.procedure_spec(
                    "P",
                    vec![
                        b.in_param(&["A"], b.name("Integer")),
                        b.param(&["B"], ParamMode::In, b.name("Integer"), Some(b.int(0))),
                    ],
                ),
                vec![],
                vec![b.null_stmt()],
            ),
        );
        let calls = vec![
            marks.set("P (1)", b.call(b.name("P"), vec![b.int(1)])),
            marks.set("P (1, C => 2)", b.call(b.name("P"), vec![b.int(1), b.named("C", b.int(2))])),
            marks.set("P (1, 2, 3)", b.call(b.name("P"), vec![b.int(1), b.int(2), b.int(3)])),
            marks.set("P (B => 2)", b.call(b.name("P"), vec![b.named("B", b.int(2))])),
        ];
        (vec![p], calls.into_iter().map(|call| b.call_stmt(call)).collect())
    });
    ctx.populate().expect("populate");

    let labels = ["P (1)", "P (1, C => 2)", "P (1, 2, 3)", "P (B => 2)"];
    let solved: Vec<_> = labels.iter().map(|label| ctx.resolve_names(marks.get(label))).collect();
    assert_eq!(solved, vec![Ok(true), Ok(false), Ok(false), Ok(false)]);

    // Nothing resolved, but P is the visible declaration of that name
    let too_many = marks.get("P (1, 2, 3)");
    assert!(ctx.referenced_decl(too_many, false).is_err());
    let guess = ctx.referenced_decl(too_many, true).expect("query").map(|e| e.node);
    assert_eq!(guess, Some(marks.get("P")));
}
