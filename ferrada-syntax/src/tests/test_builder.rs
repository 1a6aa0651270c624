use crate::*;
use pretty_assertions::assert_eq;

fn package_a(ast: &mut Ast) -> UnitId {
    ast.build_unit("A", UnitKind::Spec, |b| {
        let int = b.type_decl("Int", b.range_def(b.int(1), b.int(10)));
        let f = b.subp_decl(b.function_spec(
            "F",
            vec![b.in_param(&["X"], b.name("Int"))],
            b.name("Int"),
        ));
        b.compilation_unit(vec![], b.package("A", vec![int, f], None))
    })
    .unwrap()
}

#[test]
fn test_unit_names_are_lowercased() {
    let mut ast = Ast::new();
    let unit = package_a(&mut ast);

    assert_eq!(ast.unit(unit).name, "a");
    assert_eq!(ast.find_unit("A", UnitKind::Spec), Some(unit));
    assert_eq!(ast.find_unit("a", UnitKind::Body), None);
}

#[test]
fn test_duplicate_unit_is_rejected() {
    let mut ast = Ast::new();
    package_a(&mut ast);
    let before = ast.len();

    let result = ast.build_unit("a", UnitKind::Spec, |b| {
        b.compilation_unit(vec![], b.package("A", vec![], None))
    });

    assert_eq!(
        result,
        Err(SyntaxError::DuplicateUnit {
            name: "a".to_string()
        })
    );
    assert_eq!(ast.len(), before);
}

#[test]
fn test_root_must_be_compilation_unit() {
    let mut ast = Ast::new();
    let result = ast.build_unit("p", UnitKind::Spec, |b| b.package("P", vec![], None));

    assert_eq!(
        result,
        Err(SyntaxError::InvalidRoot {
            found: "PackageDecl".to_string()
        })
    );
    assert!(ast.is_empty(), "failed units must not leave nodes behind");
}

#[test]
fn test_reused_node_is_rejected() {
    let mut ast = Ast::new();
    let result = ast.build_unit("p", UnitKind::Spec, |b| {
        let mark = b.name("Integer");
        let x = b.object(&["X"], mark, None);
        let y = b.object(&["Y"], mark, None);
        b.compilation_unit(vec![], b.package("P", vec![x, y], None))
    });

    assert!(matches!(result, Err(SyntaxError::NodeReused { .. })));
}

#[test]
fn test_detached_node_is_rejected() {
    let mut ast = Ast::new();
    let result = ast.build_unit("p", UnitKind::Spec, |b| {
        b.name("Orphan");
        b.compilation_unit(vec![], b.package("P", vec![], None))
    });

    assert!(matches!(result, Err(SyntaxError::DetachedNode { .. })));
}

#[test]
fn test_tagged_types_get_a_classwide_view() {
    let mut ast = Ast::new();
    let unit = ast
        .build_unit("shapes", UnitKind::Spec, |b| {
            let shape = b.type_decl("Shape", b.record_def(true, vec![]));
            let count = b.type_decl("Count", b.range_def(b.int(0), b.int(5)));
            b.compilation_unit(vec![], b.package("Shapes", vec![shape, count], None))
        })
        .unwrap();

    let root = ast.unit(unit).root;
    let types: Vec<NodeId> = ast
        .descendants(root)
        .into_iter()
        .filter(|n| matches!(ast.kind(*n), NodeKind::TypeDecl { .. }))
        .collect();
    assert_eq!(types.len(), 2);

    let NodeKind::TypeDecl { classwide, .. } = ast.kind(types[0]) else {
        panic!("Expected type declaration");
    };
    let classwide = classwide.expect("tagged record should have a classwide view");
    assert_eq!(ast.kind(classwide), &NodeKind::ClasswideTypeDecl { specific: types[0] });
    assert_eq!(ast.parent(classwide), Some(types[0]));
    assert_eq!(ast.node(classwide).order, ast.node(types[0]).order);
    assert_eq!(ast.decl_name(classwide), Some("Shape"));

    let NodeKind::TypeDecl { classwide, .. } = ast.kind(types[1]) else {
        panic!("Expected type declaration");
    };
    assert_eq!(*classwide, None);
}

#[test]
fn test_call_arguments_are_wrapped_in_associations() {
    let mut ast = Ast::new();
    let mut call = None;
    ast.build_unit("main", UnitKind::Body, |b| {
        let c = b.call(b.name("P"), vec![b.int(1), b.named("Y", b.int(2))]);
        call = Some(c);
        let body = b.subp_body(b.procedure_spec("Main", vec![]), vec![], vec![b.call_stmt(c)]);
        b.compilation_unit(vec![], body)
    })
    .unwrap();

    let NodeKind::CallExpr { args, .. } = ast.kind(call.unwrap()) else {
        panic!("Expected call expression");
    };
    assert_eq!(args.len(), 2);
    assert!(matches!(
        ast.kind(args[0]),
        NodeKind::ParamAssoc { designator: None, .. }
    ));
    let NodeKind::ParamAssoc {
        designator: Some(designator),
        ..
    } = ast.kind(args[1])
    else {
        panic!("Expected named association");
    };
    assert_eq!(ast.text(*designator), Some("Y"));
}

#[test]
fn test_formal_packages() {
    let mut ast = Ast::new();
    let mut formals = Vec::new();
    ast.build_unit("sorting", UnitKind::Spec, |b| {
        let boxed = b.formal_package("P", b.name("Lists"), None);
        let explicit = b.formal_package("Q", b.name("Lists"), Some(vec![b.name("Integer")]));
        formals = vec![boxed, explicit];
        let generic = b.generic_package(formals.clone(), b.package("Sorting", vec![], None));
        b.compilation_unit(vec![], generic)
    })
    .unwrap();

    let (boxed, explicit) = (formals[0], formals[1]);
    assert_eq!(ast.decl_name(boxed), Some("P"));
    assert!(ast.kind(boxed).is_decl());
    assert!(ast.kind(boxed).is_xref_entry_point());
    assert_eq!(ast.kind(boxed).name(), "FormalPackageDecl");
    // Defining name and generic name only: `(<>)` has no node
    assert_eq!(ast.kind(boxed).children().len(), 2);

    let NodeKind::FormalPackageDecl {
        actuals: Some(actuals),
        ..
    } = ast.kind(explicit)
    else {
        panic!("Expected explicit actuals");
    };
    assert_eq!(actuals.len(), 1);
    assert!(matches!(ast.kind(actuals[0]), NodeKind::ParamAssoc { designator: None, .. }));
}

#[test]
fn test_spans_are_recorded() {
    let mut ast = Ast::new();
    let mut lit = None;
    ast.build_unit("p", UnitKind::Spec, |b| {
        let l = b.spanned(b.int(3), 10, 11);
        lit = Some(l);
        let n = b.number(&["N"], l);
        b.compilation_unit(vec![], b.package("P", vec![n], None))
    })
    .unwrap();

    assert_eq!(ast.span(lit.unwrap()), Some(Span::new(10, 11)));
}
