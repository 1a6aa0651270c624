//! Static evaluation and unit reports

use super::support::*;
use crate::queries::fold_binary;
use crate::*;
use ferrada_syntax::Operator;
use pretty_assertions::assert_eq;

fn statics() -> (AnalysisContext, Marks) {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    main_body(&mut ctx, &[], |b| {
        let n = b.number(&["N"], b.int(10));
        let folded = marks.set("2 + 3 * 4", b.bin(b.int(2), Operator::Plus, b.bin(b.int(3), Operator::Mult, b.int(4))));
        let k = b.constant(&["K"], b.name("Integer"), Some(folded));
        let m = b.object(&["M"], b.name("Integer"), Some(b.int(5)));
        let color = b.type_decl("Color", b.enum_def(&["Red", "Green", "Blue"]));
        let small = b.subtype_decl(
            "Small",
            b.subtype_indication(b.name("Integer"), Some(b.range(b.int(1), b.name("N")))),
        );
        let k_ref = marks.set("K", b.name("K"));
        let m_ref = marks.set("M", b.name("M"));
        let blue = marks.set("Blue", b.name("Blue"));
        let last = marks.set("Small'Last", b.attr(b.name("Small"), "Last", vec![]));
        let small_mark = marks.set("Small mark", b.name("Small"));
        let float_mark = marks.set("Float mark", b.name("Float"));
        let negated = marks.set("-K", b.un(Operator::Minus, b.name("K")));
        let decls = vec![
            n,
            k,
            m,
            color,
            small,
            b.object(&["A"], b.name("Integer"), Some(k_ref)),
            b.object(&["B"], b.name("Integer"), Some(m_ref)),
            b.object(&["C"], b.name("Color"), Some(blue)),
            b.object(&["D"], b.name("Integer"), Some(last)),
            b.object(&["E"], small_mark, None),
            b.object(&["F"], float_mark, None),
            b.object(&["G"], b.name("Integer"), Some(negated)),
        ];
        (decls, vec![b.null_stmt()])
    });
    ctx.populate().expect("populate");
    (ctx, marks)
}

#[test]
fn test_static_values() {
    let (ctx, marks) = statics();
    let value = |label: &str| ctx.static_value(marks.get(label)).expect("query");
    assert_eq!(value("2 + 3 * 4"), Some(14));
    assert_eq!(value("K"), Some(14));
    assert_eq!(value("-K"), Some(-14));
    assert_eq!(value("Blue"), Some(2));
    assert_eq!(value("Small'Last"), Some(10));
    assert_eq!(value("M"), None);
}

#[test]
fn test_static_expressions_and_subtypes() {
    let (ctx, marks) = statics();
    let is_static = |label: &str| ctx.is_static_expr(marks.get(label)).expect("query");
    assert!(is_static("2 + 3 * 4"));
    assert!(is_static("K"));
    assert!(is_static("Blue"));
    assert!(is_static("Small'Last"));
    assert!(!is_static("M"));

    assert!(ctx.is_static_subtype(marks.get("Small mark")).expect("query"));
    assert!(ctx.is_static_subtype(marks.get("Float mark")).expect("query"));
}

#[test]
fn test_integer_folding_follows_language_rules() {
    assert_eq!(fold_binary(Operator::Mod, 7, -3), Some(-2));
    assert_eq!(fold_binary(Operator::Mod, -7, 3), Some(2));
    assert_eq!(fold_binary(Operator::Rem, -7, 3), Some(-1));
    assert_eq!(fold_binary(Operator::Div, -7, 2), Some(-3));
    assert_eq!(fold_binary(Operator::Div, 1, 0), None);
    assert_eq!(fold_binary(Operator::Pow, 2, 10), Some(1024));
    assert_eq!(fold_binary(Operator::Pow, 2, -1), None);
    assert_eq!(fold_binary(Operator::Lt, 1, 2), Some(1));
}

#[test]
fn test_report_of_a_clean_unit() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    package_a(&mut ctx, &mut marks);
    let client = client(&mut ctx, &mut marks);
    ctx.populate().expect("populate");

    let report = ctx.resolve_unit(client).expect("report");
    assert!(report.is_clean(), "{report}");
    assert_eq!(report.unit_name, "client");
    assert!(report.entry_points >= 3);

    let line = report.line(marks.get("F (5)")).expect("call line");
    assert_eq!(line.text, "F");
    assert_eq!(line.decl_name.as_deref(), Some("F"));
    assert_eq!(line.type_name.as_deref(), Some("Int"));
    assert!(report.to_string().starts_with("Resolving xrefs for client"));
}

#[test]
fn test_report_collects_failures() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    let main = main_body(&mut ctx, &[], |b| {
        let x = b.object(&["X"], b.name("Integer"), None);
        let bad = b.call(b.name("Undefined_Proc"), vec![b.int(1)]);
        let assign = marks.set("X := 2", b.assign(b.name("X"), b.int(2)));
        (vec![x], vec![b.call_stmt(bad), assign])
    });
    ctx.populate().expect("populate");

    let report = ctx.resolve_unit(main).expect("report");
    assert!(!report.is_clean());
    assert_eq!(report.failed_entry_points, 1);
    let unresolved: Vec<&str> = report
        .diagnostics
        .iter()
        .filter_map(|d| match d {
            ResolutionDiagnostic::NoReferenceFound { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(unresolved, vec!["Undefined_Proc"]);
    assert!(report
        .diagnostics
        .iter()
        .any(|d| matches!(d, ResolutionDiagnostic::ResolutionFailed { kind, .. } if *kind == "CallStmt")));

    // The assignment after the failure still resolved
    assert_eq!(ctx.resolve_names(marks.get("X := 2")), Ok(true));
}

#[test]
fn test_report_requires_population() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    let unit = package_a(&mut ctx, &mut marks);
    assert_eq!(ctx.resolve_unit(unit), Err(SemanticError::NotPopulated));
}
