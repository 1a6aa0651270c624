//! Shared fixtures: labelled nodes and the packages most tests start from

use crate::*;
use ferrada_syntax::{NodeId, UnitId, UnitKind};
use std::collections::HashMap;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Context with `Standard` loaded
pub fn analysis() -> AnalysisContext {
    init_tracing();
    AnalysisContext::new().expect("Standard should build")
}

/// Nodes captured while building units, by label
#[derive(Debug, Default)]
pub struct Marks(HashMap<&'static str, NodeId>);

impl Marks {
    pub fn set(&mut self, label: &'static str, node: NodeId) -> NodeId {
        self.0.insert(label, node);
        node
    }

    pub fn get(&self, label: &str) -> NodeId {
        *self
            .0
            .get(label)
            .unwrap_or_else(|| panic!("no node marked '{label}'"))
    }
}

/// `package A is type Int is range 1 .. 10; function F (X : Int) return Int; end A;`
pub fn package_a(ctx: &mut AnalysisContext, marks: &mut Marks) -> UnitId {
    ctx.add_unit("a", UnitKind::Spec, |b| {
        let int = marks.set("A.Int", b.type_decl("Int", b.range_def(b.int(1), b.int(10))));
        let f = marks.set(
            "A.F",
            b.subp_decl(b.function_spec(
                "F",
                vec![b.in_param(&["X"], b.name("Int"))],
                b.name("Int"),
            )),
        );
        b.compilation_unit(vec![], b.package("A", vec![int, f], None))
    })
    .expect("package A should build")
}

/// `with A; use A; package Client is V : Int := F (5); end Client;`
pub fn client(ctx: &mut AnalysisContext, marks: &mut Marks) -> UnitId {
    ctx.add_unit("client", UnitKind::Spec, |b| {
        let mark = marks.set("Int mark", b.name("Int"));
        let five = marks.set("5", b.int(5));
        let call = marks.set("F (5)", b.call(b.name("F"), vec![five]));
        let v = marks.set("V", b.object(&["V"], mark, Some(call)));
        let prelude = vec![b.with_clause(&["A"]), b.use_clause(&["A"])];
        b.compilation_unit(prelude, b.package("Client", vec![v], None))
    })
    .expect("client should build")
}

/// Library-level procedure body `Main`
pub fn main_body<F>(ctx: &mut AnalysisContext, prelude: &[&str], f: F) -> UnitId
where
    F: FnOnce(&ferrada_syntax::AstBuilder<'_>) -> (Vec<NodeId>, Vec<NodeId>),
{
    let withs: Vec<String> = prelude.iter().map(|s| s.to_string()).collect();
    ctx.add_unit("main", UnitKind::Body, |b| {
        let (decls, stmts) = f(b);
        let names: Vec<&str> = withs.iter().map(String::as_str).collect();
        let prelude = if names.is_empty() {
            vec![]
        } else {
            vec![b.with_clause(&names)]
        };
        b.compilation_unit(prelude, b.subp_body(b.procedure_spec("Main", vec![]), decls, stmts))
    })
    .expect("main should build")
}

/// Display name of the type or declaration bound to a node
pub fn name_of(ctx: &AnalysisContext, entity: Option<Entity>) -> Option<String> {
    entity.map(|e| ctx.entity_name(&e))
}

/// ```text
/// package Shapes is
///    type Shape is tagged record X : Integer; end record;
///    function Area (S : Shape) return Integer;
///    type Circle is new Shape with record R : Integer; end record;
///    type T1 is range 1 .. 10;
///    type T2 is new T1;
///    type T3 is new T2;
///    subtype S1 is T1;
///    type Hidden is private;
/// private
///    type Hidden is new Integer;
/// end Shapes;
/// ```
pub fn shapes(ctx: &mut AnalysisContext, marks: &mut Marks) -> UnitId {
    ctx.add_unit("shapes", UnitKind::Spec, |b| {
        let shape = marks.set(
            "Shape",
            b.type_decl("Shape", b.record_def(true, vec![b.component(&["X"], b.name("Integer"), None)])),
        );
        let area = marks.set(
            "Area",
            b.subp_decl(b.function_spec(
                "Area",
                vec![b.in_param(&["S"], b.name("Shape"))],
                b.name("Integer"),
            )),
        );
        let circle = marks.set(
            "Circle",
            b.type_decl(
                "Circle",
                b.derived_def(
                    b.name("Shape"),
                    vec![],
                    Some(vec![b.component(&["R"], b.name("Integer"), None)]),
                ),
            ),
        );
        let t1 = marks.set("T1", b.type_decl("T1", b.range_def(b.int(1), b.int(10))));
        let t2 = marks.set("T2", b.type_decl("T2", b.derived_def(b.name("T1"), vec![], None)));
        let t3 = marks.set("T3", b.type_decl("T3", b.derived_def(b.name("T2"), vec![], None)));
        let s1 = marks.set("S1", b.subtype_decl("S1", b.subtype_indication(b.name("T1"), None)));
        let hidden = marks.set("Hidden", b.type_decl("Hidden", b.private_def(false, false)));
        let full = marks.set(
            "Hidden full",
            b.type_decl("Hidden", b.derived_def(b.name("Integer"), vec![], None)),
        );
        let public = vec![shape, area, circle, t1, t2, t3, s1, hidden];
        b.compilation_unit(vec![], b.package("Shapes", public, Some(vec![full])))
    })
    .expect("Shapes should build")
}
