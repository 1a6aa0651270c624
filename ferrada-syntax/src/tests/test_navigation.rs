use crate::*;
use pretty_assertions::assert_eq;

struct Fixture {
    ast: Ast,
    first: NodeId,
    second: NodeId,
    init: NodeId,
}

/// `package P is X : Integer; Y : Integer := X; end P;`
fn fixture() -> Fixture {
    let mut ast = Ast::new();
    let mut ids = (None, None, None);
    ast.build_unit("p", UnitKind::Spec, |b| {
        let first = b.object(&["X"], b.name("Integer"), None);
        let init = b.name("X");
        let second = b.object(&["Y"], b.name("Integer"), Some(init));
        ids = (Some(first), Some(second), Some(init));
        b.compilation_unit(vec![], b.package("P", vec![first, second], None))
    })
    .unwrap();
    Fixture {
        ast,
        first: ids.0.unwrap(),
        second: ids.1.unwrap(),
        init: ids.2.unwrap(),
    }
}

#[test]
fn test_source_order_follows_preorder() {
    let f = fixture();

    assert!(f.ast.precedes(f.first, f.second));
    assert!(f.ast.precedes(f.second, f.init), "parents precede their children");
    assert!(!f.ast.precedes(f.second, f.first));
    assert_eq!(f.ast.compare(f.first, f.first), std::cmp::Ordering::Equal);
}

#[test]
fn test_ancestors_walk_to_the_root() {
    let f = fixture();
    let kinds: Vec<&str> = f
        .ast
        .ancestors(f.init)
        .map(|a| f.ast.kind(a).name())
        .collect();

    assert_eq!(kinds, vec!["ObjectDecl", "PackageDecl", "CompilationUnit"]);
    assert!(f.ast.is_ancestor_or_self(f.second, f.init));
    assert!(!f.ast.is_ancestor_or_self(f.first, f.init));
}

#[test]
fn test_defining_names_and_text() {
    let f = fixture();
    let names = f.ast.defining_names(f.first);

    assert_eq!(names.len(), 1);
    assert!(f.ast.is_defining(names[0]));
    assert!(!f.ast.is_defining(f.init));
    assert_eq!(f.ast.decl_name(f.second), Some("Y"));
    assert_eq!(f.ast.text(f.init), Some("X"));
}

#[test]
fn test_static_kind_tables() {
    let f = fixture();

    assert!(f.ast.kind(f.first).is_xref_entry_point());
    assert!(f.ast.kind(f.first).is_decl());
    assert!(f.ast.kind(f.init).is_expression());
    assert!(f.ast.kind(f.init).is_name());
    assert!(!f.ast.kind(f.init).is_xref_entry_point());
    assert!(NodeKind::Aggregate { assocs: vec![] }.stops_resolution());
    assert!(!NodeKind::NullStmt.stops_resolution());
}

#[test]
fn test_operator_designators() {
    assert_eq!(Operator::Plus.designator(), Some("\"+\""));
    assert_eq!(Operator::Neq.designator(), Some("\"/=\""));
    assert_eq!(Operator::AndThen.designator(), None);
    assert_eq!(Operator::Mod.to_string(), "mod");
    assert_eq!(Operator::OrElse.to_string(), "or else");
    assert!(Operator::Lte.is_relational());
    assert!(Operator::Xor.is_logical());
}
