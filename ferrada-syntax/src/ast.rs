// Ferrada AST Definitions
// Arena-allocated syntax tree with source order and per-kind static tables

use std::cmp::Ordering;
use std::fmt;

/// Source position information for AST nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub start_line_col: Option<(usize, usize)>,
    pub end_line_col: Option<(usize, usize)>,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            start_line_col: None,
            end_line_col: None,
        }
    }

    pub fn with_line_col(
        start: usize,
        end: usize,
        start_line_col: (usize, usize),
        end_line_col: (usize, usize),
    ) -> Self {
        Self {
            start,
            end,
            start_line_col: Some(start_line_col),
            end_line_col: Some(end_line_col),
        }
    }
}

/// Index of a node in the [`Ast`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a compilation unit in the [`Ast`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u32);

impl UnitId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Whether a compilation unit holds a specification or a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    Spec,
    Body,
}

/// Library-level compilation unit
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    /// Lower-cased, dot-separated unit name (`ada.text_io`)
    pub name: String,
    pub kind: UnitKind,
    pub root: NodeId,
    pub file_name: Option<String>,
}

/// Parameter passing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamMode {
    In,
    Out,
    InOut,
    Access,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubpKind {
    Procedure,
    Function,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstantiationKind {
    Package,
    Procedure,
    Function,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniversalKind {
    Integer,
    Real,
}

/// Default of a generic formal subprogram (`is <>`, `is Name`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormalSubpDefault {
    None,
    Box,
    Name(NodeId),
}

/// Operators, both as syntax (`Op` nodes) and as overloadable designators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    And,
    Or,
    Xor,
    AndThen,
    OrElse,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Plus,
    Minus,
    Mult,
    Div,
    Mod,
    Rem,
    Pow,
    Concat,
    Abs,
    Not,
    DoubleDot,
}

impl Operator {
    /// Operator designator as written in a subprogram declaration (`"+"`)
    pub fn designator(self) -> Option<&'static str> {
        let text = match self {
            Operator::And => "\"and\"",
            Operator::Or => "\"or\"",
            Operator::Xor => "\"xor\"",
            Operator::Eq => "\"=\"",
            Operator::Neq => "\"/=\"",
            Operator::Lt => "\"<\"",
            Operator::Lte => "\"<=\"",
            Operator::Gt => "\">\"",
            Operator::Gte => "\">=\"",
            Operator::Plus => "\"+\"",
            Operator::Minus => "\"-\"",
            Operator::Mult => "\"*\"",
            Operator::Div => "\"/\"",
            Operator::Mod => "\"mod\"",
            Operator::Rem => "\"rem\"",
            Operator::Pow => "\"**\"",
            Operator::Concat => "\"&\"",
            Operator::Abs => "\"abs\"",
            Operator::Not => "\"not\"",
            // Short-circuit forms and ranges cannot be overloaded
            Operator::AndThen | Operator::OrElse | Operator::DoubleDot => return None,
        };
        Some(text)
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            Operator::Eq | Operator::Neq | Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(
            self,
            Operator::And | Operator::Or | Operator::Xor | Operator::AndThen | Operator::OrElse
        )
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            Operator::Plus
                | Operator::Minus
                | Operator::Mult
                | Operator::Div
                | Operator::Mod
                | Operator::Rem
                | Operator::Pow
                | Operator::Abs
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Operator::AndThen => "and then",
            Operator::OrElse => "or else",
            Operator::DoubleDot => "..",
            other => other
                .designator()
                .map(|d| d.trim_matches('"'))
                .unwrap_or("?"),
        };
        write!(f, "{text}")
    }
}

/// Closed set of node kinds.
///
/// Fields hold child node ids; `children()` lists them in source order.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // Units and context clauses
    CompilationUnit {
        prelude: Vec<NodeId>,
        item: NodeId,
    },
    WithClause {
        names: Vec<NodeId>,
    },
    UseClause {
        names: Vec<NodeId>,
    },
    UseTypeClause {
        names: Vec<NodeId>,
    },

    // Packages and generics
    PackageDecl {
        name: NodeId,
        public: Vec<NodeId>,
        private: Option<Vec<NodeId>>,
    },
    PackageBody {
        name: NodeId,
        decls: Vec<NodeId>,
        stmts: Vec<NodeId>,
    },
    GenericPackageDecl {
        formals: Vec<NodeId>,
        package: NodeId,
    },
    GenericSubpDecl {
        formals: Vec<NodeId>,
        subp: NodeId,
    },
    GenericInstantiation {
        kind: InstantiationKind,
        name: NodeId,
        generic: NodeId,
        actuals: Vec<NodeId>,
    },
    FormalSubpDecl {
        spec: NodeId,
        default: FormalSubpDefault,
    },
    /// `with package P is new G (...)`; `None` actuals stand for `(<>)`
    FormalPackageDecl {
        name: NodeId,
        generic: NodeId,
        actuals: Option<Vec<NodeId>>,
    },

    // Types
    TypeDecl {
        name: NodeId,
        discriminants: Vec<NodeId>,
        def: NodeId,
        /// Synthesized classwide view; not a syntactic child
        classwide: Option<NodeId>,
    },
    SubtypeDecl {
        name: NodeId,
        subtype: NodeId,
    },
    ClasswideTypeDecl {
        specific: NodeId,
    },
    AnonymousTypeDecl {
        def: NodeId,
    },
    SignedIntTypeDef {
        range: NodeId,
    },
    ModIntTypeDef {
        modulus: NodeId,
    },
    FloatTypeDef {
        digits: NodeId,
    },
    EnumTypeDef {
        literals: Vec<NodeId>,
    },
    RecordTypeDef {
        tagged: bool,
        limited: bool,
        components: Vec<NodeId>,
    },
    DerivedTypeDef {
        parent: NodeId,
        interfaces: Vec<NodeId>,
        extension: Option<Vec<NodeId>>,
        private_extension: bool,
    },
    ArrayTypeDef {
        indices: Vec<NodeId>,
        component: NodeId,
    },
    AccessTypeDef {
        target: NodeId,
        all: bool,
    },
    PrivateTypeDef {
        tagged: bool,
        limited: bool,
    },
    InterfaceTypeDef,
    FormalDiscreteTypeDef,
    FormalRangeTypeDef,
    FormalDigitsTypeDef,
    UniversalTypeDef {
        kind: UniversalKind,
    },
    EnumLiteralDecl {
        name: NodeId,
    },
    SubtypeIndication {
        mark: NodeId,
        constraint: Option<NodeId>,
    },
    /// `Integer range <>` in unconstrained array index positions
    BoxRange {
        mark: NodeId,
    },

    // Objects and subprograms
    ComponentDecl {
        names: Vec<NodeId>,
        subtype: NodeId,
        default: Option<NodeId>,
    },
    DiscriminantSpec {
        names: Vec<NodeId>,
        subtype: NodeId,
        default: Option<NodeId>,
    },
    ObjectDecl {
        names: Vec<NodeId>,
        constant: bool,
        subtype: NodeId,
        default: Option<NodeId>,
    },
    NumberDecl {
        names: Vec<NodeId>,
        expr: NodeId,
    },
    SubpSpec {
        kind: SubpKind,
        name: NodeId,
        params: Vec<NodeId>,
        returns: Option<NodeId>,
    },
    ParamSpec {
        names: Vec<NodeId>,
        mode: ParamMode,
        subtype: NodeId,
        default: Option<NodeId>,
    },
    SubpDecl {
        spec: NodeId,
        is_abstract: bool,
    },
    SubpBody {
        spec: NodeId,
        decls: Vec<NodeId>,
        stmts: Vec<NodeId>,
    },
    DefiningName {
        text: String,
    },

    // Names and expressions
    Identifier {
        text: String,
    },
    DottedName {
        prefix: NodeId,
        suffix: NodeId,
    },
    CallExpr {
        name: NodeId,
        args: Vec<NodeId>,
    },
    ParamAssoc {
        designator: Option<NodeId>,
        expr: NodeId,
    },
    BoxExpr,
    IntLiteral {
        value: i128,
    },
    RealLiteral {
        value: f64,
    },
    StringLiteral {
        value: String,
    },
    CharLiteral {
        value: char,
    },
    NullLiteral,
    Op {
        op: Operator,
    },
    BinOp {
        left: NodeId,
        op: NodeId,
        right: NodeId,
    },
    UnOp {
        op: NodeId,
        operand: NodeId,
    },
    QualExpr {
        mark: NodeId,
        expr: NodeId,
    },
    AttributeRef {
        prefix: NodeId,
        attribute: NodeId,
        args: Vec<NodeId>,
    },
    Aggregate {
        assocs: Vec<NodeId>,
    },
    AggregateAssoc {
        choices: Vec<NodeId>,
        expr: NodeId,
    },
    OthersDesignator,
    Allocator {
        subtype: NodeId,
    },
    ExplicitDeref {
        prefix: NodeId,
    },

    // Statements
    NullStmt,
    AssignStmt {
        target: NodeId,
        expr: NodeId,
    },
    CallStmt {
        call: NodeId,
    },
    ReturnStmt {
        expr: Option<NodeId>,
    },
    IfStmt {
        cond: NodeId,
        then_stmts: Vec<NodeId>,
        alternatives: Vec<NodeId>,
        else_stmts: Vec<NodeId>,
    },
    ElsifPart {
        cond: NodeId,
        stmts: Vec<NodeId>,
    },
    WhileLoop {
        cond: NodeId,
        stmts: Vec<NodeId>,
    },
    ForLoop {
        spec: NodeId,
        stmts: Vec<NodeId>,
    },
    ForLoopSpec {
        var: NodeId,
        reverse: bool,
        iter: NodeId,
    },
    ForLoopVarDecl {
        name: NodeId,
    },
    BlockStmt {
        decls: Vec<NodeId>,
        stmts: Vec<NodeId>,
    },
    Pragma {
        name: NodeId,
        args: Vec<NodeId>,
    },
}

impl NodeKind {
    /// Short, stable name of the kind (used in reports and diagnostics)
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::CompilationUnit { .. } => "CompilationUnit",
            NodeKind::WithClause { .. } => "WithClause",
            NodeKind::UseClause { .. } => "UseClause",
            NodeKind::UseTypeClause { .. } => "UseTypeClause",
            NodeKind::PackageDecl { .. } => "PackageDecl",
            NodeKind::PackageBody { .. } => "PackageBody",
            NodeKind::GenericPackageDecl { .. } => "GenericPackageDecl",
            NodeKind::GenericSubpDecl { .. } => "GenericSubpDecl",
            NodeKind::GenericInstantiation { .. } => "GenericInstantiation",
            NodeKind::FormalSubpDecl { .. } => "FormalSubpDecl",
            NodeKind::FormalPackageDecl { .. } => "FormalPackageDecl",
            NodeKind::TypeDecl { .. } => "TypeDecl",
            NodeKind::SubtypeDecl { .. } => "SubtypeDecl",
            NodeKind::ClasswideTypeDecl { .. } => "ClasswideTypeDecl",
            NodeKind::AnonymousTypeDecl { .. } => "AnonymousTypeDecl",
            NodeKind::SignedIntTypeDef { .. } => "SignedIntTypeDef",
            NodeKind::ModIntTypeDef { .. } => "ModIntTypeDef",
            NodeKind::FloatTypeDef { .. } => "FloatTypeDef",
            NodeKind::EnumTypeDef { .. } => "EnumTypeDef",
            NodeKind::RecordTypeDef { .. } => "RecordTypeDef",
            NodeKind::DerivedTypeDef { .. } => "DerivedTypeDef",
            NodeKind::ArrayTypeDef { .. } => "ArrayTypeDef",
            NodeKind::AccessTypeDef { .. } => "AccessTypeDef",
            NodeKind::PrivateTypeDef { .. } => "PrivateTypeDef",
            NodeKind::InterfaceTypeDef => "InterfaceTypeDef",
            NodeKind::FormalDiscreteTypeDef => "FormalDiscreteTypeDef",
            NodeKind::FormalRangeTypeDef => "FormalRangeTypeDef",
            NodeKind::FormalDigitsTypeDef => "FormalDigitsTypeDef",
            NodeKind::UniversalTypeDef { .. } => "UniversalTypeDef",
            NodeKind::EnumLiteralDecl { .. } => "EnumLiteralDecl",
            NodeKind::SubtypeIndication { .. } => "SubtypeIndication",
            NodeKind::BoxRange { .. } => "BoxRange",
            NodeKind::ComponentDecl { .. } => "ComponentDecl",
            NodeKind::DiscriminantSpec { .. } => "DiscriminantSpec",
            NodeKind::ObjectDecl { .. } => "ObjectDecl",
            NodeKind::NumberDecl { .. } => "NumberDecl",
            NodeKind::SubpSpec { .. } => "SubpSpec",
            NodeKind::ParamSpec { .. } => "ParamSpec",
            NodeKind::SubpDecl { .. } => "SubpDecl",
            NodeKind::SubpBody { .. } => "SubpBody",
            NodeKind::DefiningName { .. } => "DefiningName",
            NodeKind::Identifier { .. } => "Identifier",
            NodeKind::DottedName { .. } => "DottedName",
            NodeKind::CallExpr { .. } => "CallExpr",
            NodeKind::ParamAssoc { .. } => "ParamAssoc",
            NodeKind::BoxExpr => "BoxExpr",
            NodeKind::IntLiteral { .. } => "IntLiteral",
            NodeKind::RealLiteral { .. } => "RealLiteral",
            NodeKind::StringLiteral { .. } => "StringLiteral",
            NodeKind::CharLiteral { .. } => "CharLiteral",
            NodeKind::NullLiteral => "NullLiteral",
            NodeKind::Op { .. } => "Op",
            NodeKind::BinOp { .. } => "BinOp",
            NodeKind::UnOp { .. } => "UnOp",
            NodeKind::QualExpr { .. } => "QualExpr",
            NodeKind::AttributeRef { .. } => "AttributeRef",
            NodeKind::Aggregate { .. } => "Aggregate",
            NodeKind::AggregateAssoc { .. } => "AggregateAssoc",
            NodeKind::OthersDesignator => "OthersDesignator",
            NodeKind::Allocator { .. } => "Allocator",
            NodeKind::ExplicitDeref { .. } => "ExplicitDeref",
            NodeKind::NullStmt => "NullStmt",
            NodeKind::AssignStmt { .. } => "AssignStmt",
            NodeKind::CallStmt { .. } => "CallStmt",
            NodeKind::ReturnStmt { .. } => "ReturnStmt",
            NodeKind::IfStmt { .. } => "IfStmt",
            NodeKind::ElsifPart { .. } => "ElsifPart",
            NodeKind::WhileLoop { .. } => "WhileLoop",
            NodeKind::ForLoop { .. } => "ForLoop",
            NodeKind::ForLoopSpec { .. } => "ForLoopSpec",
            NodeKind::ForLoopVarDecl { .. } => "ForLoopVarDecl",
            NodeKind::BlockStmt { .. } => "BlockStmt",
            NodeKind::Pragma { .. } => "Pragma",
        }
    }

    /// Syntactic children in source order
    pub fn children(&self) -> Vec<NodeId> {
        fn chain(parts: &[&[NodeId]]) -> Vec<NodeId> {
            parts.iter().flat_map(|p| p.iter().copied()).collect()
        }

        match self {
            NodeKind::CompilationUnit { prelude, item } => chain(&[prelude, &[*item]]),
            NodeKind::WithClause { names }
            | NodeKind::UseClause { names }
            | NodeKind::UseTypeClause { names } => names.clone(),
            NodeKind::PackageDecl {
                name,
                public,
                private,
            } => {
                let mut out = vec![*name];
                out.extend(public.iter().copied());
                if let Some(private) = private {
                    out.extend(private.iter().copied());
                }
                out
            }
            NodeKind::PackageBody { name, decls, stmts } => chain(&[&[*name], decls, stmts]),
            NodeKind::GenericPackageDecl { formals, package } => chain(&[formals, &[*package]]),
            NodeKind::GenericSubpDecl { formals, subp } => chain(&[formals, &[*subp]]),
            NodeKind::GenericInstantiation {
                name,
                generic,
                actuals,
                ..
            } => chain(&[&[*name, *generic], actuals]),
            NodeKind::FormalSubpDecl { spec, default } => match default {
                FormalSubpDefault::Name(name) => vec![*spec, *name],
                _ => vec![*spec],
            },
            NodeKind::FormalPackageDecl {
                name,
                generic,
                actuals,
            } => chain(&[&[*name, *generic], actuals.as_deref().unwrap_or_default()]),
            NodeKind::TypeDecl {
                name,
                discriminants,
                def,
                ..
            } => chain(&[&[*name], discriminants, &[*def]]),
            NodeKind::SubtypeDecl { name, subtype } => vec![*name, *subtype],
            NodeKind::ClasswideTypeDecl { .. } => vec![],
            NodeKind::AnonymousTypeDecl { def } => vec![*def],
            NodeKind::SignedIntTypeDef { range } => vec![*range],
            NodeKind::ModIntTypeDef { modulus } => vec![*modulus],
            NodeKind::FloatTypeDef { digits } => vec![*digits],
            NodeKind::EnumTypeDef { literals } => literals.clone(),
            NodeKind::RecordTypeDef { components, .. } => components.clone(),
            NodeKind::DerivedTypeDef {
                parent,
                interfaces,
                extension,
                ..
            } => {
                let mut out = vec![*parent];
                out.extend(interfaces.iter().copied());
                if let Some(extension) = extension {
                    out.extend(extension.iter().copied());
                }
                out
            }
            NodeKind::ArrayTypeDef { indices, component } => chain(&[indices, &[*component]]),
            NodeKind::AccessTypeDef { target, .. } => vec![*target],
            NodeKind::PrivateTypeDef { .. }
            | NodeKind::InterfaceTypeDef
            | NodeKind::FormalDiscreteTypeDef
            | NodeKind::FormalRangeTypeDef
            | NodeKind::FormalDigitsTypeDef
            | NodeKind::UniversalTypeDef { .. } => vec![],
            NodeKind::EnumLiteralDecl { name } => vec![*name],
            NodeKind::SubtypeIndication { mark, constraint } => {
                let mut out = vec![*mark];
                out.extend(constraint.iter().copied());
                out
            }
            NodeKind::BoxRange { mark } => vec![*mark],
            NodeKind::ComponentDecl {
                names,
                subtype,
                default,
            }
            | NodeKind::DiscriminantSpec {
                names,
                subtype,
                default,
            }
            | NodeKind::ParamSpec {
                names,
                subtype,
                default,
                ..
            }
            | NodeKind::ObjectDecl {
                names,
                subtype,
                default,
                ..
            } => {
                let mut out = names.clone();
                out.push(*subtype);
                out.extend(default.iter().copied());
                out
            }
            NodeKind::NumberDecl { names, expr } => chain(&[names, &[*expr]]),
            NodeKind::SubpSpec {
                name,
                params,
                returns,
                ..
            } => {
                let mut out = vec![*name];
                out.extend(params.iter().copied());
                out.extend(returns.iter().copied());
                out
            }
            NodeKind::SubpDecl { spec, .. } => vec![*spec],
            NodeKind::SubpBody { spec, decls, stmts } => chain(&[&[*spec], decls, stmts]),
            NodeKind::DefiningName { .. }
            | NodeKind::Identifier { .. }
            | NodeKind::BoxExpr
            | NodeKind::IntLiteral { .. }
            | NodeKind::RealLiteral { .. }
            | NodeKind::StringLiteral { .. }
            | NodeKind::CharLiteral { .. }
            | NodeKind::NullLiteral
            | NodeKind::Op { .. }
            | NodeKind::OthersDesignator
            | NodeKind::NullStmt => vec![],
            NodeKind::DottedName { prefix, suffix } => vec![*prefix, *suffix],
            NodeKind::CallExpr { name, args } => chain(&[&[*name], args]),
            NodeKind::ParamAssoc { designator, expr } => {
                let mut out: Vec<NodeId> = designator.iter().copied().collect();
                out.push(*expr);
                out
            }
            NodeKind::BinOp { left, op, right } => vec![*left, *op, *right],
            NodeKind::UnOp { op, operand } => vec![*op, *operand],
            NodeKind::QualExpr { mark, expr } => vec![*mark, *expr],
            NodeKind::AttributeRef {
                prefix,
                attribute,
                args,
            } => chain(&[&[*prefix, *attribute], args]),
            NodeKind::Aggregate { assocs } => assocs.clone(),
            NodeKind::AggregateAssoc { choices, expr } => chain(&[choices, &[*expr]]),
            NodeKind::Allocator { subtype } => vec![*subtype],
            NodeKind::ExplicitDeref { prefix } => vec![*prefix],
            NodeKind::AssignStmt { target, expr } => vec![*target, *expr],
            NodeKind::CallStmt { call } => vec![*call],
            NodeKind::ReturnStmt { expr } => expr.iter().copied().collect(),
            NodeKind::IfStmt {
                cond,
                then_stmts,
                alternatives,
                else_stmts,
            } => chain(&[&[*cond], then_stmts, alternatives, else_stmts]),
            NodeKind::ElsifPart { cond, stmts } | NodeKind::WhileLoop { cond, stmts } => {
                chain(&[&[*cond], stmts])
            }
            NodeKind::ForLoop { spec, stmts } => chain(&[&[*spec], stmts]),
            NodeKind::ForLoopSpec { var, iter, .. } => vec![*var, *iter],
            NodeKind::ForLoopVarDecl { name } => vec![*name],
            NodeKind::BlockStmt { decls, stmts } => chain(&[decls, stmts]),
            NodeKind::Pragma { name, args } => chain(&[&[*name], args]),
        }
    }

    /// Defining names introduced by this declaration kind
    pub fn defining_names(&self) -> Vec<NodeId> {
        match self {
            NodeKind::PackageDecl { name, .. }
            | NodeKind::PackageBody { name, .. }
            | NodeKind::GenericInstantiation { name, .. }
            | NodeKind::FormalPackageDecl { name, .. }
            | NodeKind::TypeDecl { name, .. }
            | NodeKind::SubtypeDecl { name, .. }
            | NodeKind::EnumLiteralDecl { name }
            | NodeKind::SubpSpec { name, .. }
            | NodeKind::ForLoopVarDecl { name } => vec![*name],
            NodeKind::ComponentDecl { names, .. }
            | NodeKind::DiscriminantSpec { names, .. }
            | NodeKind::ObjectDecl { names, .. }
            | NodeKind::NumberDecl { names, .. }
            | NodeKind::ParamSpec { names, .. } => names.clone(),
            _ => vec![],
        }
    }

    /// Whether the kind is a basic declaration (something an entity can wrap)
    pub fn is_decl(&self) -> bool {
        matches!(
            self,
            NodeKind::PackageDecl { .. }
                | NodeKind::PackageBody { .. }
                | NodeKind::GenericPackageDecl { .. }
                | NodeKind::GenericSubpDecl { .. }
                | NodeKind::GenericInstantiation { .. }
                | NodeKind::FormalSubpDecl { .. }
                | NodeKind::FormalPackageDecl { .. }
                | NodeKind::TypeDecl { .. }
                | NodeKind::SubtypeDecl { .. }
                | NodeKind::ClasswideTypeDecl { .. }
                | NodeKind::AnonymousTypeDecl { .. }
                | NodeKind::EnumLiteralDecl { .. }
                | NodeKind::ComponentDecl { .. }
                | NodeKind::DiscriminantSpec { .. }
                | NodeKind::ObjectDecl { .. }
                | NodeKind::NumberDecl { .. }
                | NodeKind::ParamSpec { .. }
                | NodeKind::SubpDecl { .. }
                | NodeKind::SubpBody { .. }
                | NodeKind::ForLoopVarDecl { .. }
        )
    }

    pub fn is_type_decl(&self) -> bool {
        matches!(
            self,
            NodeKind::TypeDecl { .. }
                | NodeKind::SubtypeDecl { .. }
                | NodeKind::ClasswideTypeDecl { .. }
                | NodeKind::AnonymousTypeDecl { .. }
        )
    }

    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            NodeKind::NullStmt
                | NodeKind::AssignStmt { .. }
                | NodeKind::CallStmt { .. }
                | NodeKind::ReturnStmt { .. }
                | NodeKind::IfStmt { .. }
                | NodeKind::WhileLoop { .. }
                | NodeKind::ForLoop { .. }
                | NodeKind::BlockStmt { .. }
        )
    }

    /// Whether the kind denotes a value-producing expression carrying a type variable
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::Identifier { .. }
                | NodeKind::DottedName { .. }
                | NodeKind::CallExpr { .. }
                | NodeKind::IntLiteral { .. }
                | NodeKind::RealLiteral { .. }
                | NodeKind::StringLiteral { .. }
                | NodeKind::CharLiteral { .. }
                | NodeKind::NullLiteral
                | NodeKind::BinOp { .. }
                | NodeKind::UnOp { .. }
                | NodeKind::QualExpr { .. }
                | NodeKind::AttributeRef { .. }
                | NodeKind::Aggregate { .. }
                | NodeKind::Allocator { .. }
                | NodeKind::ExplicitDeref { .. }
        )
    }

    /// Whether the kind is a name (something with a referenced declaration)
    pub fn is_name(&self) -> bool {
        matches!(
            self,
            NodeKind::Identifier { .. }
                | NodeKind::DottedName { .. }
                | NodeKind::CallExpr { .. }
                | NodeKind::AttributeRef { .. }
                | NodeKind::Op { .. }
                | NodeKind::ExplicitDeref { .. }
                | NodeKind::QualExpr { .. }
        )
    }

    /// Whether nodes of this kind are independent units of name resolution
    pub fn is_xref_entry_point(&self) -> bool {
        self.is_statement()
            || matches!(
                self,
                NodeKind::WithClause { .. }
                    | NodeKind::UseClause { .. }
                    | NodeKind::UseTypeClause { .. }
                    | NodeKind::GenericInstantiation { .. }
                    | NodeKind::TypeDecl { .. }
                    | NodeKind::SubtypeDecl { .. }
                    | NodeKind::ObjectDecl { .. }
                    | NodeKind::NumberDecl { .. }
                    | NodeKind::ComponentDecl { .. }
                    | NodeKind::DiscriminantSpec { .. }
                    | NodeKind::ParamSpec { .. }
                    | NodeKind::SubpSpec { .. }
                    | NodeKind::FormalSubpDecl { .. }
                    | NodeKind::FormalPackageDecl { .. }
                    | NodeKind::ForLoopSpec { .. }
                    | NodeKind::Pragma { .. }
            )
    }

    /// Entry points nested inside expressions: solved after (and using the
    /// result of) the enclosing equation
    pub fn stops_resolution(&self) -> bool {
        matches!(self, NodeKind::Aggregate { .. })
    }
}

/// A node in the arena
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub span: Option<Span>,
    pub unit: Option<UnitId>,
    /// Pre-order position within the unit
    pub order: u32,
}

/// Arena of nodes shared by every compilation unit of an analysis
#[derive(Debug, Clone, Default)]
pub struct Ast {
    pub(crate) nodes: Vec<Node>,
    pub(crate) units: Vec<Unit>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn span(&self, id: NodeId) -> Option<Span> {
        self.nodes[id.index()].span
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.kind(id).children()
    }

    pub fn unit_of(&self, id: NodeId) -> Option<UnitId> {
        self.nodes[id.index()].unit
    }

    pub fn units(&self) -> impl Iterator<Item = (UnitId, &Unit)> {
        self.units
            .iter()
            .enumerate()
            .map(|(i, u)| (UnitId(i as u32), u))
    }

    pub fn unit(&self, id: UnitId) -> &Unit {
        &self.units[id.index()]
    }

    /// Find a unit by (case-insensitive) dotted name and kind
    pub fn find_unit(&self, name: &str, kind: UnitKind) -> Option<UnitId> {
        let wanted = name.to_ascii_lowercase();
        self.units()
            .find(|(_, u)| u.name == wanted && u.kind == kind)
            .map(|(id, _)| id)
    }

    /// Iterate over the strict ancestors of a node, innermost first
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            ast: self,
            next: self.parent(id),
        }
    }

    /// Whether `ancestor` is `node` or one of its ancestors
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor == node || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Closest node (self included) satisfying `pred`
    pub fn enclosing(&self, id: NodeId, pred: impl Fn(&NodeKind) -> bool) -> Option<NodeId> {
        if pred(self.kind(id)) {
            return Some(id);
        }
        self.ancestors(id).find(|a| pred(self.kind(*a)))
    }

    /// Source order comparison; nodes of different units compare by unit index
    pub fn compare(&self, a: NodeId, b: NodeId) -> Ordering {
        let (na, nb) = (self.node(a), self.node(b));
        (na.unit, na.order).cmp(&(nb.unit, nb.order))
    }

    /// `a` strictly precedes `b` in the same unit
    pub fn precedes(&self, a: NodeId, b: NodeId) -> bool {
        let (na, nb) = (self.node(a), self.node(b));
        na.unit == nb.unit && na.order < nb.order
    }

    /// Text of a defining name or identifier
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::DefiningName { text } | NodeKind::Identifier { text } => Some(text),
            _ => None,
        }
    }

    /// Defining names of a declaration
    pub fn defining_names(&self, decl: NodeId) -> Vec<NodeId> {
        match self.kind(decl) {
            NodeKind::SubpDecl { spec, .. } | NodeKind::SubpBody { spec, .. } => {
                self.defining_names(*spec)
            }
            NodeKind::FormalSubpDecl { spec, .. } => self.defining_names(*spec),
            NodeKind::GenericPackageDecl { package, .. } => self.defining_names(*package),
            NodeKind::GenericSubpDecl { subp, .. } => self.defining_names(*subp),
            NodeKind::ClasswideTypeDecl { specific } => self.defining_names(*specific),
            kind => kind.defining_names(),
        }
    }

    /// Text of the first defining name of a declaration (`A.B` for child units)
    pub fn decl_name(&self, decl: NodeId) -> Option<&str> {
        self.defining_names(decl)
            .first()
            .and_then(|name| self.text(*name))
    }

    /// Whether `node` is the defining name of some declaration
    pub fn is_defining(&self, node: NodeId) -> bool {
        matches!(self.kind(node), NodeKind::DefiningName { .. })
    }

    /// Pre-order walk of a subtree (self included)
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            let children = self.children(id);
            stack.extend(children.into_iter().rev());
        }
        out
    }
}

/// Iterator returned by [`Ast::ancestors`]
pub struct Ancestors<'a> {
    ast: &'a Ast,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.ast.parent(current);
        Some(current)
    }
}
