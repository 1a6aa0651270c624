//! Generic instantiation: actuals replace formals through rebindings

use super::support::*;
use crate::*;
use ferrada_syntax::{FormalSubpDefault, InstantiationKind, NodeKind, UnitKind};
use pretty_assertions::assert_eq;

/// ```text
/// generic
///    type T is private;
///    with function Image (X : T) return String is <>;
/// package G is
///    X : T;
///    function Get return T;
/// end G;
/// ```
fn generic_g(ctx: &mut AnalysisContext, marks: &mut Marks) {
    ctx.add_unit("g", UnitKind::Spec, |b| {
        let t = marks.set("T", b.type_decl("T", b.private_def(false, false)));
        let image = marks.set(
            "formal Image",
            b.formal_subp(
                b.function_spec("Image", vec![b.in_param(&["X"], b.name("T"))], b.name("String")),
                FormalSubpDefault::Box,
            ),
        );
        let x = marks.set("G.X", b.object(&["X"], b.name("T"), None));
        let get = marks.set("G.Get", b.subp_decl(b.function_spec("Get", vec![], b.name("T"))));
        let package = b.package("G", vec![x, get], None);
        marks.set("G", b.generic_package(vec![t, image], package));
        b.compilation_unit(vec![], marks.get("G"))
    })
    .expect("G should build");
}

/// ```text
/// with G;
/// procedure Main is
///    function Image (X : Integer) return String;
///    package I is new G (Integer);
///    V : Integer := I.X;
///    W : Integer := I.Get;
/// begin null; end Main;
/// ```
fn instance(ctx: &mut AnalysisContext, marks: &mut Marks) {
    main_body(ctx, &["G"], |b| {
        let image = marks.set(
            "Image",
            b.subp_decl(b.function_spec("Image", vec![b.in_param(&["X"], b.name("Integer"))], b.name("String"))),
        );
        let generic_name = marks.set("G ref", b.name("G"));
        let actual = marks.set("Integer actual", b.name("Integer"));
        let inst = marks.set(
            "I",
            b.instantiation(InstantiationKind::Package, "I", generic_name, vec![actual]),
        );
        let x = marks.set("I.X", b.path("I.X"));
        let v = b.object(&["V"], b.name("Integer"), Some(x));
        let get = marks.set("I.Get", b.path("I.Get"));
        let w = b.object(&["W"], b.name("Integer"), Some(get));
        (vec![image, inst, v, w], vec![b.null_stmt()])
    });
}

fn setup() -> (AnalysisContext, Marks) {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    generic_g(&mut ctx, &mut marks);
    instance(&mut ctx, &mut marks);
    ctx.populate().expect("populate");
    (ctx, marks)
}

#[test]
fn test_instantiation_names_its_generic() {
    let (ctx, marks) = setup();
    let generic = ctx.referenced_decl(marks.get("G ref"), false).expect("query").expect("bound");
    assert_eq!(generic.node, marks.get("G"));

    let actual = ctx.referenced_decl(marks.get("Integer actual"), false).expect("query").expect("bound");
    assert_eq!(Some(actual), ctx.standard().map(|s| s.integer_type()));

    let created = ctx.instantiation(&Entity::new(marks.get("I"))).expect("query").expect("instantiation");
    assert_eq!(created.generic.node, marks.get("G"));
}

#[test]
fn test_formal_types_are_replaced_by_actuals() {
    let (ctx, marks) = setup();
    let integer = ctx.standard().map(|s| s.integer_type().node);

    let x = ctx.referenced_decl(marks.get("I.X"), false).expect("query").expect("bound");
    assert_eq!(x.node, marks.get("G.X"));
    assert!(x.rebindings().is_some());
    let x_type = ctx.expression_type(marks.get("I.X")).expect("query");
    assert_eq!(x_type.map(|t| ctx.canonical_type(&t).node), integer);

    let get_type = ctx.expression_type(marks.get("I.Get")).expect("query");
    assert_eq!(get_type.map(|t| ctx.canonical_type(&t).node), integer);
}

#[test]
fn test_box_default_picks_a_visible_subprogram() {
    let (ctx, marks) = setup();
    assert_eq!(ctx.resolve_names(marks.get("I")), Ok(true));

    let created = ctx.instantiation(&Entity::new(marks.get("I"))).expect("query").expect("instantiation");
    let formal = Entity::new(marks.get("formal Image"));
    let actual = Entity::new(marks.get("Image"));
    // Seen through the instantiation, the formal profile takes Integer
    let rebound = Entity::with_info(
        formal.node,
        EntityInfo {
            rebindings: Some(created.rebindings),
            ..EntityInfo::default()
        },
    );
    assert!(ctx.subp_decl_match_signature(&rebound, &actual));
    assert!(!ctx.subp_decl_match_signature(&formal, &actual));
}

#[test]
fn test_generic_subprogram_instance_is_callable() {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    main_body(&mut ctx, &[], |b| {
        let t = b.type_decl("T", b.private_def(false, false));
        let identity = marks.set(
            "Identity",
            b.generic_subp(
                vec![t],
                b.subp_decl(b.function_spec("Identity", vec![b.in_param(&["X"], b.name("T"))], b.name("T"))),
            ),
        );
        let inst = b.instantiation(InstantiationKind::Function, "Int_Identity", b.name("Identity"), vec![b.name("Integer")]);
        let call = marks.set("Int_Identity (5)", b.call(b.name("Int_Identity"), vec![b.int(5)]));
        let v = b.object(&["V"], b.name("Integer"), Some(call));
        (vec![identity, inst, v], vec![b.null_stmt()])
    });
    ctx.populate().expect("populate");

    let call = marks.get("Int_Identity (5)");
    assert_eq!(ctx.resolve_names(call), Ok(true));
    let subp = ctx.referenced_decl(call, false).expect("query").expect("bound");
    assert!(matches!(ctx.ast().kind(subp.node), NodeKind::SubpDecl { .. }));
    assert!(subp.rebindings().is_some());
    assert_eq!(
        name_of(&ctx, ctx.expression_type(call).expect("query").map(|t| ctx.canonical_type(&t))),
        Some("Integer".to_string())
    );
}

/// ```text
/// generic
///    type T is private;
/// package Lists is
///    subtype Elem is T;
///    Count : Integer;
/// end Lists;
///
/// with Lists;
/// generic
///    with package P is new Lists (<>);
/// package Sorting is
///    N : Integer := P.Count;
///    Y : P.Elem;
/// end Sorting;
/// ```
fn formal_package_units(ctx: &mut AnalysisContext, marks: &mut Marks) {
    ctx.add_unit("lists", UnitKind::Spec, |b| {
        let t = b.type_decl("T", b.private_def(false, false));
        let elem = b.subtype_decl("Elem", b.subtype_indication(b.name("T"), None));
        let count = marks.set("Lists.Count", b.object(&["Count"], b.name("Integer"), None));
        let package = b.package("Lists", vec![elem, count], None);
        marks.set("Lists", b.generic_package(vec![t], package));
        b.compilation_unit(vec![], marks.get("Lists"))
    })
    .expect("Lists should build");
    ctx.add_unit("sorting", UnitKind::Spec, |b| {
        let lists_ref = marks.set("Lists ref", b.name("Lists"));
        let p = marks.set("P", b.formal_package("P", lists_ref, None));
        let count = marks.set("P.Count", b.path("P.Count"));
        let n = b.object(&["N"], b.name("Integer"), Some(count));
        let elem = marks.set("P.Elem", b.path("P.Elem"));
        let y = marks.set("Sorting.Y", b.object(&["Y"], elem, None));
        let package = b.package("Sorting", vec![n, y], None);
        let generic = b.generic_package(vec![p], package);
        b.compilation_unit(vec![b.with_clause(&["Lists"])], generic)
    })
    .expect("Sorting should build");
}

/// ```text
/// with Lists, Sorting;
/// procedure Main is
///    package Plain is end Plain;
///    package Int_Lists is new Lists (Integer);
///    package Int_Sorting is new Sorting (Int_Lists);
///    package Bad_Sorting is new Sorting (Plain);
///    V : Integer := Int_Sorting.Y;
/// begin null; end Main;
/// ```
fn formal_package_setup() -> (AnalysisContext, Marks) {
    let mut ctx = analysis();
    let mut marks = Marks::default();
    formal_package_units(&mut ctx, &mut marks);
    main_body(&mut ctx, &["Lists", "Sorting"], |b| {
        let plain = b.package("Plain", vec![], None);
        let int_lists = b.instantiation(InstantiationKind::Package, "Int_Lists", b.name("Lists"), vec![b.name("Integer")]);
        let actual = marks.set("Int_Lists actual", b.name("Int_Lists"));
        let int_sorting = marks.set(
            "Int_Sorting",
            b.instantiation(InstantiationKind::Package, "Int_Sorting", b.name("Sorting"), vec![actual]),
        );
        let bad = marks.set(
            "Bad_Sorting",
            b.instantiation(InstantiationKind::Package, "Bad_Sorting", b.name("Sorting"), vec![b.name("Plain")]),
        );
        let y = marks.set("Int_Sorting.Y", b.path("Int_Sorting.Y"));
        let v = b.object(&["V"], b.name("Integer"), Some(y));
        (vec![plain, int_lists, int_sorting, bad, v], vec![b.null_stmt()])
    });
    ctx.populate().expect("populate");
    (ctx, marks)
}

#[test]
fn test_names_select_through_a_formal_package() {
    let (ctx, marks) = formal_package_setup();

    assert_eq!(ctx.resolve_names(marks.get("P")), Ok(true));
    let generic = ctx.referenced_decl(marks.get("Lists ref"), false).expect("query").expect("bound");
    assert_eq!(generic.node, marks.get("Lists"));

    let count = ctx.referenced_decl(marks.get("P.Count"), false).expect("query").expect("bound");
    assert_eq!(count.node, marks.get("Lists.Count"));
    assert!(count.rebindings().is_some());
    assert_eq!(
        name_of(&ctx, ctx.expression_type(marks.get("P.Count")).expect("query")),
        Some("Integer".to_string())
    );

    // `(<>)` binds nothing: inside the generic the element type is the formal
    let elem = ctx.designated_type(marks.get("P.Elem"), None).expect("element type");
    assert!(matches!(ctx.ast().kind(ctx.canonical_type(&elem).node), NodeKind::TypeDecl { .. }));
    assert_eq!(ctx.instance_of(&Entity::new(marks.get("P"))), Ok(Some(marks.get("Lists"))));
}

#[test]
fn test_formal_package_actual_must_instantiate_its_generic() {
    let (ctx, marks) = formal_package_setup();
    let integer = ctx.standard().map(|s| s.integer_type().node);

    assert_eq!(ctx.resolve_names(marks.get("Int_Sorting")), Ok(true));
    let actual = ctx.referenced_decl(marks.get("Int_Lists actual"), false).expect("query").expect("bound");
    assert!(matches!(ctx.ast().kind(actual.node), NodeKind::GenericInstantiation { .. }));
    assert_eq!(ctx.instance_of(&actual), Ok(Some(marks.get("Lists"))));

    let y = ctx.referenced_decl(marks.get("Int_Sorting.Y"), false).expect("query").expect("bound");
    assert_eq!(y.node, marks.get("Sorting.Y"));
    let y_type = ctx.expression_type(marks.get("Int_Sorting.Y")).expect("query");
    assert_eq!(y_type.map(|t| ctx.canonical_type(&t).node), integer);

    // Plain is a package, but not an instance of Lists
    assert_eq!(ctx.resolve_names(marks.get("Bad_Sorting")), Ok(false));
}

#[test]
fn test_rebinding_must_extend_the_entity_chain() {
    let (ctx, marks) = setup();
    let created = ctx.instantiation(&Entity::new(marks.get("I"))).expect("query").expect("instantiation");
    let formal = Entity::new(marks.get("formal Image"));

    let rebound = ctx.rebind_entity(&formal, Some(created.rebindings)).expect("first link");
    assert_eq!(rebound.rebindings(), Some(created.rebindings));
    assert!(rebound.info.from_rebound);
    assert_eq!(ctx.rebind_entity(&rebound, Some(created.rebindings)), Ok(rebound));
    assert_eq!(ctx.rebind_entity(&rebound, None), Ok(rebound));

    // A chain that does not grow out of the entity's own one
    let unrelated = Entity::with_info(
        marks.get("G.X"),
        EntityInfo {
            rebindings: Some(created.rebindings),
            ..EntityInfo::default()
        },
    );
    let other = ctx
        .rebindings
        .borrow_mut()
        .append(None, created.env, created.env);
    assert_eq!(
        ctx.rebind_entity(&unrelated, Some(other)),
        Err(SemanticError::IncorrectRebindings { node: marks.get("G.X") })
    );
    let extended = ctx
        .rebindings
        .borrow_mut()
        .append(Some(created.rebindings), created.env, created.env);
    assert!(ctx.rebind_entity(&unrelated, Some(extended)).is_ok());
}
