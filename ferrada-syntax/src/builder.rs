// Ferrada AST Builder
// Programmatic construction of compilation units

use crate::ast::*;
use crate::error::SyntaxError;
use std::cell::RefCell;

/// Builds the nodes of one compilation unit.
///
/// All methods take `&self` so that trees can be written as nested calls:
///
/// ```
/// use ferrada_syntax::{Ast, UnitKind};
///
/// let mut ast = Ast::new();
/// let unit = ast
///     .build_unit("a", UnitKind::Spec, |b| {
///         let int = b.type_decl("Int", b.range_def(b.int(1), b.int(10)));
///         b.compilation_unit(vec![], b.package("A", vec![int], None))
///     })
///     .unwrap();
/// assert_eq!(ast.unit(unit).name, "a");
/// ```
pub struct AstBuilder<'a> {
    ast: RefCell<&'a mut Ast>,
    unit: UnitId,
    start: usize,
    error: RefCell<Option<SyntaxError>>,
}

impl Ast {
    /// Build a compilation unit with `f`, which must return the unit's
    /// `CompilationUnit` root. Nothing is added to the tree on error.
    pub fn build_unit<F>(&mut self, name: &str, kind: UnitKind, f: F) -> Result<UnitId, SyntaxError>
    where
        F: FnOnce(&AstBuilder<'_>) -> NodeId,
    {
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            return Err(SyntaxError::EmptyUnitName);
        }
        if self.find_unit(&name, kind).is_some() {
            return Err(SyntaxError::DuplicateUnit { name });
        }

        let unit = UnitId(self.units.len() as u32);
        let start = self.nodes.len();
        let (root, error) = {
            let builder = AstBuilder {
                ast: RefCell::new(self),
                unit,
                start,
                error: RefCell::new(None),
            };
            let root = f(&builder);
            (root, builder.error.into_inner())
        };

        if let Err(err) = self.finish_unit(name, kind, unit, start, root, error) {
            self.nodes.truncate(start);
            return Err(err);
        }
        Ok(unit)
    }

    fn finish_unit(
        &mut self,
        name: String,
        kind: UnitKind,
        unit: UnitId,
        start: usize,
        root: NodeId,
        error: Option<SyntaxError>,
    ) -> Result<(), SyntaxError> {
        if let Some(err) = error {
            return Err(err);
        }
        if root.index() < start || root.index() >= self.nodes.len() {
            return Err(SyntaxError::ForeignNode { node: root });
        }
        if !matches!(self.kind(root), NodeKind::CompilationUnit { .. }) {
            return Err(SyntaxError::InvalidRoot {
                found: self.kind(root).name().to_string(),
            });
        }

        // Assign source order by pre-order walk
        let mut order = 0u32;
        for id in self.descendants(root) {
            let node = &mut self.nodes[id.index()];
            node.unit = Some(unit);
            node.order = order;
            order += 1;
        }

        // Synthesized classwide views share the order of their specific type
        for index in start..self.nodes.len() {
            if let NodeKind::ClasswideTypeDecl { specific } = self.nodes[index].kind {
                let specific = self.nodes[specific.index()].clone();
                let node = &mut self.nodes[index];
                node.unit = specific.unit;
                node.order = specific.order;
            }
        }

        if let Some(index) = (start..self.nodes.len()).find(|i| self.nodes[*i].unit.is_none()) {
            return Err(SyntaxError::DetachedNode {
                node: NodeId(index as u32),
                kind: self.nodes[index].kind.name().to_string(),
            });
        }

        self.units.push(Unit {
            name,
            kind,
            root,
            file_name: None,
        });
        Ok(())
    }
}

impl AstBuilder<'_> {
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    fn push(&self, kind: NodeKind) -> NodeId {
        let mut ast = self.ast.borrow_mut();
        let id = NodeId(ast.nodes.len() as u32);
        for child in kind.children() {
            if child.index() < self.start || child.index() >= ast.nodes.len() {
                self.fail(SyntaxError::ForeignNode { node: child });
                continue;
            }
            let slot = &mut ast.nodes[child.index()].parent;
            if slot.is_some() {
                self.fail(SyntaxError::NodeReused { node: child });
            }
            *slot = Some(id);
        }
        ast.nodes.push(Node {
            kind,
            parent: None,
            span: None,
            unit: None,
            order: 0,
        });
        id
    }

    fn fail(&self, err: SyntaxError) {
        let mut slot = self.error.borrow_mut();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    /// Attach a source span to an already built node
    pub fn spanned(&self, node: NodeId, start: usize, end: usize) -> NodeId {
        if let Some(n) = self.ast.borrow_mut().nodes.get_mut(node.index()) {
            n.span = Some(Span::new(start, end));
        }
        node
    }

    // Names

    pub fn def(&self, text: &str) -> NodeId {
        self.push(NodeKind::DefiningName {
            text: text.to_string(),
        })
    }

    pub fn name(&self, text: &str) -> NodeId {
        self.push(NodeKind::Identifier {
            text: text.to_string(),
        })
    }

    /// `A.B.C` as nested dotted names; a single segment gives an identifier
    pub fn path(&self, text: &str) -> NodeId {
        let mut segments = text.split('.');
        let first = segments.next().unwrap_or_default();
        let mut current = self.name(first);
        for segment in segments {
            current = self.dotted(current, segment);
        }
        current
    }

    pub fn dotted(&self, prefix: NodeId, suffix: &str) -> NodeId {
        let suffix = self.name(suffix);
        self.push(NodeKind::DottedName { prefix, suffix })
    }

    /// Call with positional arguments; `ParamAssoc` nodes are kept as they are
    pub fn call(&self, name: NodeId, args: Vec<NodeId>) -> NodeId {
        let args = args.into_iter().map(|arg| self.assoc_arg(arg)).collect();
        self.push(NodeKind::CallExpr { name, args })
    }

    fn assoc_arg(&self, arg: NodeId) -> NodeId {
        let is_assoc = matches!(
            self.ast.borrow().nodes.get(arg.index()).map(|n| &n.kind),
            Some(NodeKind::ParamAssoc { .. })
        );
        if is_assoc {
            arg
        } else {
            self.push(NodeKind::ParamAssoc {
                designator: None,
                expr: arg,
            })
        }
    }

    /// Named association `Name => Expr`
    pub fn named(&self, designator: &str, expr: NodeId) -> NodeId {
        let designator = self.name(designator);
        self.push(NodeKind::ParamAssoc {
            designator: Some(designator),
            expr,
        })
    }

    pub fn box_expr(&self) -> NodeId {
        self.push(NodeKind::BoxExpr)
    }

    // Literals

    pub fn int(&self, value: i128) -> NodeId {
        self.push(NodeKind::IntLiteral { value })
    }

    pub fn real(&self, value: f64) -> NodeId {
        self.push(NodeKind::RealLiteral { value })
    }

    pub fn string(&self, value: &str) -> NodeId {
        self.push(NodeKind::StringLiteral {
            value: value.to_string(),
        })
    }

    pub fn char_lit(&self, value: char) -> NodeId {
        self.push(NodeKind::CharLiteral { value })
    }

    pub fn null(&self) -> NodeId {
        self.push(NodeKind::NullLiteral)
    }

    // Expressions

    pub fn op(&self, op: Operator) -> NodeId {
        self.push(NodeKind::Op { op })
    }

    pub fn bin(&self, left: NodeId, op: Operator, right: NodeId) -> NodeId {
        let op = self.op(op);
        self.push(NodeKind::BinOp { left, op, right })
    }

    pub fn un(&self, op: Operator, operand: NodeId) -> NodeId {
        let op = self.op(op);
        self.push(NodeKind::UnOp { op, operand })
    }

    /// `Low .. High`
    pub fn range(&self, low: NodeId, high: NodeId) -> NodeId {
        self.bin(low, Operator::DoubleDot, high)
    }

    pub fn qual(&self, mark: NodeId, expr: NodeId) -> NodeId {
        self.push(NodeKind::QualExpr { mark, expr })
    }

    pub fn attr(&self, prefix: NodeId, attribute: &str, args: Vec<NodeId>) -> NodeId {
        let attribute = self.name(attribute);
        self.push(NodeKind::AttributeRef {
            prefix,
            attribute,
            args,
        })
    }

    /// Aggregate; bare expressions become positional associations
    pub fn aggregate(&self, assocs: Vec<NodeId>) -> NodeId {
        let assocs = assocs
            .into_iter()
            .map(|assoc| {
                let is_assoc = matches!(
                    self.ast.borrow().nodes.get(assoc.index()).map(|n| &n.kind),
                    Some(NodeKind::AggregateAssoc { .. })
                );
                if is_assoc {
                    assoc
                } else {
                    self.push(NodeKind::AggregateAssoc {
                        choices: vec![],
                        expr: assoc,
                    })
                }
            })
            .collect();
        self.push(NodeKind::Aggregate { assocs })
    }

    /// `Choice | Choice => Expr`
    pub fn agg_assoc(&self, choices: Vec<NodeId>, expr: NodeId) -> NodeId {
        self.push(NodeKind::AggregateAssoc { choices, expr })
    }

    pub fn others(&self) -> NodeId {
        self.push(NodeKind::OthersDesignator)
    }

    pub fn allocator(&self, subtype: NodeId) -> NodeId {
        self.push(NodeKind::Allocator { subtype })
    }

    pub fn deref(&self, prefix: NodeId) -> NodeId {
        self.push(NodeKind::ExplicitDeref { prefix })
    }

    // Statements

    pub fn null_stmt(&self) -> NodeId {
        self.push(NodeKind::NullStmt)
    }

    pub fn assign(&self, target: NodeId, expr: NodeId) -> NodeId {
        self.push(NodeKind::AssignStmt { target, expr })
    }

    pub fn call_stmt(&self, call: NodeId) -> NodeId {
        self.push(NodeKind::CallStmt { call })
    }

    pub fn ret(&self, expr: Option<NodeId>) -> NodeId {
        self.push(NodeKind::ReturnStmt { expr })
    }

    pub fn if_stmt(
        &self,
        cond: NodeId,
        then_stmts: Vec<NodeId>,
        alternatives: Vec<NodeId>,
        else_stmts: Vec<NodeId>,
    ) -> NodeId {
        self.push(NodeKind::IfStmt {
            cond,
            then_stmts,
            alternatives,
            else_stmts,
        })
    }

    pub fn elsif(&self, cond: NodeId, stmts: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::ElsifPart { cond, stmts })
    }

    pub fn while_loop(&self, cond: NodeId, stmts: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::WhileLoop { cond, stmts })
    }

    /// `for Var in [reverse] Iter loop Stmts end loop;`
    pub fn for_loop(&self, var: &str, reverse: bool, iter: NodeId, stmts: Vec<NodeId>) -> NodeId {
        let name = self.def(var);
        let var = self.push(NodeKind::ForLoopVarDecl { name });
        let spec = self.push(NodeKind::ForLoopSpec { var, reverse, iter });
        self.push(NodeKind::ForLoop { spec, stmts })
    }

    pub fn block(&self, decls: Vec<NodeId>, stmts: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::BlockStmt { decls, stmts })
    }

    pub fn pragma(&self, name: &str, args: Vec<NodeId>) -> NodeId {
        let name = self.name(name);
        let args = args.into_iter().map(|arg| self.assoc_arg(arg)).collect();
        self.push(NodeKind::Pragma { name, args })
    }

    // Type definitions

    /// `range Low .. High`
    pub fn range_def(&self, low: NodeId, high: NodeId) -> NodeId {
        let range = self.range(low, high);
        self.push(NodeKind::SignedIntTypeDef { range })
    }

    pub fn mod_def(&self, modulus: NodeId) -> NodeId {
        self.push(NodeKind::ModIntTypeDef { modulus })
    }

    pub fn float_def(&self, digits: NodeId) -> NodeId {
        self.push(NodeKind::FloatTypeDef { digits })
    }

    pub fn enum_def(&self, literals: &[&str]) -> NodeId {
        let literals = literals
            .iter()
            .map(|lit| {
                let name = self.def(lit);
                self.push(NodeKind::EnumLiteralDecl { name })
            })
            .collect();
        self.push(NodeKind::EnumTypeDef { literals })
    }

    pub fn record_def(&self, tagged: bool, components: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::RecordTypeDef {
            tagged,
            limited: false,
            components,
        })
    }

    pub fn limited_record_def(&self, tagged: bool, components: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::RecordTypeDef {
            tagged,
            limited: true,
            components,
        })
    }

    /// `new Parent [and Interfaces] [with record ... end record]`
    pub fn derived_def(
        &self,
        parent: NodeId,
        interfaces: Vec<NodeId>,
        extension: Option<Vec<NodeId>>,
    ) -> NodeId {
        self.push(NodeKind::DerivedTypeDef {
            parent,
            interfaces,
            extension,
            private_extension: false,
        })
    }

    /// `new Parent with private`
    pub fn private_extension_def(&self, parent: NodeId) -> NodeId {
        self.push(NodeKind::DerivedTypeDef {
            parent,
            interfaces: vec![],
            extension: None,
            private_extension: true,
        })
    }

    pub fn array_def(&self, indices: Vec<NodeId>, component: NodeId) -> NodeId {
        self.push(NodeKind::ArrayTypeDef { indices, component })
    }

    /// `Mark range <>`
    pub fn box_range(&self, mark: NodeId) -> NodeId {
        self.push(NodeKind::BoxRange { mark })
    }

    pub fn access_def(&self, target: NodeId, all: bool) -> NodeId {
        self.push(NodeKind::AccessTypeDef { target, all })
    }

    pub fn private_def(&self, tagged: bool, limited: bool) -> NodeId {
        self.push(NodeKind::PrivateTypeDef { tagged, limited })
    }

    pub fn interface_def(&self) -> NodeId {
        self.push(NodeKind::InterfaceTypeDef)
    }

    /// `(<>)`
    pub fn formal_discrete_def(&self) -> NodeId {
        self.push(NodeKind::FormalDiscreteTypeDef)
    }

    /// `range <>`
    pub fn formal_range_def(&self) -> NodeId {
        self.push(NodeKind::FormalRangeTypeDef)
    }

    /// `digits <>`
    pub fn formal_digits_def(&self) -> NodeId {
        self.push(NodeKind::FormalDigitsTypeDef)
    }

    pub fn universal_def(&self, kind: UniversalKind) -> NodeId {
        self.push(NodeKind::UniversalTypeDef { kind })
    }

    /// Anonymous type in an object or parameter declaration (`access T`)
    pub fn anonymous_type(&self, def: NodeId) -> NodeId {
        self.push(NodeKind::AnonymousTypeDecl { def })
    }

    pub fn subtype_indication(&self, mark: NodeId, constraint: Option<NodeId>) -> NodeId {
        self.push(NodeKind::SubtypeIndication { mark, constraint })
    }

    // Declarations

    pub fn type_decl(&self, name: &str, def: NodeId) -> NodeId {
        self.type_decl_with_discriminants(name, vec![], def)
    }

    pub fn type_decl_with_discriminants(
        &self,
        name: &str,
        discriminants: Vec<NodeId>,
        def: NodeId,
    ) -> NodeId {
        let name = self.def(name);
        let has_classwide = {
            let ast = self.ast.borrow();
            match ast.nodes.get(def.index()).map(|n| &n.kind) {
                Some(NodeKind::RecordTypeDef { tagged, .. })
                | Some(NodeKind::PrivateTypeDef { tagged, .. }) => *tagged,
                Some(NodeKind::DerivedTypeDef {
                    extension,
                    private_extension,
                    ..
                }) => extension.is_some() || *private_extension,
                Some(NodeKind::InterfaceTypeDef) => true,
                _ => false,
            }
        };
        let decl = self.push(NodeKind::TypeDecl {
            name,
            discriminants,
            def,
            classwide: None,
        });
        if has_classwide {
            let classwide = self.push(NodeKind::ClasswideTypeDecl { specific: decl });
            let mut ast = self.ast.borrow_mut();
            ast.nodes[classwide.index()].parent = Some(decl);
            if let NodeKind::TypeDecl { classwide: slot, .. } = &mut ast.nodes[decl.index()].kind {
                *slot = Some(classwide);
            }
        }
        decl
    }

    pub fn subtype_decl(&self, name: &str, subtype: NodeId) -> NodeId {
        let name = self.def(name);
        self.push(NodeKind::SubtypeDecl { name, subtype })
    }

    fn names(&self, names: &[&str]) -> Vec<NodeId> {
        names.iter().map(|n| self.def(n)).collect()
    }

    pub fn component(&self, names: &[&str], subtype: NodeId, default: Option<NodeId>) -> NodeId {
        let names = self.names(names);
        self.push(NodeKind::ComponentDecl {
            names,
            subtype,
            default,
        })
    }

    pub fn discriminant(&self, names: &[&str], subtype: NodeId, default: Option<NodeId>) -> NodeId {
        let names = self.names(names);
        self.push(NodeKind::DiscriminantSpec {
            names,
            subtype,
            default,
        })
    }

    pub fn object(&self, names: &[&str], subtype: NodeId, default: Option<NodeId>) -> NodeId {
        let names = self.names(names);
        self.push(NodeKind::ObjectDecl {
            names,
            constant: false,
            subtype,
            default,
        })
    }

    pub fn constant(&self, names: &[&str], subtype: NodeId, default: Option<NodeId>) -> NodeId {
        let names = self.names(names);
        self.push(NodeKind::ObjectDecl {
            names,
            constant: true,
            subtype,
            default,
        })
    }

    /// Named number (`N : constant := 10;`)
    pub fn number(&self, names: &[&str], expr: NodeId) -> NodeId {
        let names = self.names(names);
        self.push(NodeKind::NumberDecl { names, expr })
    }

    pub fn param(&self, names: &[&str], mode: ParamMode, subtype: NodeId, default: Option<NodeId>) -> NodeId {
        let names = self.names(names);
        self.push(NodeKind::ParamSpec {
            names,
            mode,
            subtype,
            default,
        })
    }

    pub fn in_param(&self, names: &[&str], subtype: NodeId) -> NodeId {
        self.param(names, ParamMode::In, subtype, None)
    }

    pub fn function_spec(&self, name: &str, params: Vec<NodeId>, returns: NodeId) -> NodeId {
        let name = self.def(name);
        self.push(NodeKind::SubpSpec {
            kind: SubpKind::Function,
            name,
            params,
            returns: Some(returns),
        })
    }

    pub fn procedure_spec(&self, name: &str, params: Vec<NodeId>) -> NodeId {
        let name = self.def(name);
        self.push(NodeKind::SubpSpec {
            kind: SubpKind::Procedure,
            name,
            params,
            returns: None,
        })
    }

    pub fn subp_decl(&self, spec: NodeId) -> NodeId {
        self.push(NodeKind::SubpDecl {
            spec,
            is_abstract: false,
        })
    }

    pub fn abstract_subp_decl(&self, spec: NodeId) -> NodeId {
        self.push(NodeKind::SubpDecl {
            spec,
            is_abstract: true,
        })
    }

    pub fn subp_body(&self, spec: NodeId, decls: Vec<NodeId>, stmts: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::SubpBody { spec, decls, stmts })
    }

    pub fn package(&self, name: &str, public: Vec<NodeId>, private: Option<Vec<NodeId>>) -> NodeId {
        let name = self.def(name);
        self.push(NodeKind::PackageDecl {
            name,
            public,
            private,
        })
    }

    pub fn package_body(&self, name: &str, decls: Vec<NodeId>, stmts: Vec<NodeId>) -> NodeId {
        let name = self.def(name);
        self.push(NodeKind::PackageBody { name, decls, stmts })
    }

    pub fn generic_package(&self, formals: Vec<NodeId>, package: NodeId) -> NodeId {
        self.push(NodeKind::GenericPackageDecl { formals, package })
    }

    pub fn generic_subp(&self, formals: Vec<NodeId>, subp: NodeId) -> NodeId {
        self.push(NodeKind::GenericSubpDecl { formals, subp })
    }

    pub fn formal_subp(&self, spec: NodeId, default: FormalSubpDefault) -> NodeId {
        self.push(NodeKind::FormalSubpDecl { spec, default })
    }

    /// `with package P is new G (actuals)`; `None` builds `(<>)`
    pub fn formal_package(&self, name: &str, generic: NodeId, actuals: Option<Vec<NodeId>>) -> NodeId {
        let name = self.def(name);
        let actuals = actuals.map(|a| a.into_iter().map(|arg| self.assoc_arg(arg)).collect());
        self.push(NodeKind::FormalPackageDecl {
            name,
            generic,
            actuals,
        })
    }

    pub fn instantiation(
        &self,
        kind: InstantiationKind,
        name: &str,
        generic: NodeId,
        actuals: Vec<NodeId>,
    ) -> NodeId {
        let name = self.def(name);
        let actuals = actuals.into_iter().map(|arg| self.assoc_arg(arg)).collect();
        self.push(NodeKind::GenericInstantiation {
            kind,
            name,
            generic,
            actuals,
        })
    }

    // Context clauses and units

    pub fn with_clause(&self, names: &[&str]) -> NodeId {
        let names = names.iter().map(|n| self.path(n)).collect();
        self.push(NodeKind::WithClause { names })
    }

    pub fn use_clause(&self, names: &[&str]) -> NodeId {
        let names = names.iter().map(|n| self.path(n)).collect();
        self.push(NodeKind::UseClause { names })
    }

    pub fn use_type_clause(&self, marks: Vec<NodeId>) -> NodeId {
        self.push(NodeKind::UseTypeClause { names: marks })
    }

    pub fn compilation_unit(&self, prelude: Vec<NodeId>, item: NodeId) -> NodeId {
        self.push(NodeKind::CompilationUnit { prelude, item })
    }
}
