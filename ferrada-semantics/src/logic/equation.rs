//! Logic variables and constraint equations
//!
//! Equations are immutable trees built per entry point and consumed by the
//! [`crate::logic::solver`]. Cloning is cheap: nodes are reference counted.

use crate::entity::Entity;
use ferrada_syntax::NodeId;
use std::fmt;
use std::ops::BitAnd;
use std::rc::Rc;

/// Which property of a node a variable stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    /// Referenced declaration of a name
    Ref,
    /// Type of an expression
    Type,
}

/// A (node, slot) unification cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicVar {
    pub node: NodeId,
    pub slot: Slot,
}

impl LogicVar {
    pub fn reference(node: NodeId) -> Self {
        Self {
            node,
            slot: Slot::Ref,
        }
    }

    pub fn type_of(node: NodeId) -> Self {
        Self {
            node,
            slot: Slot::Type,
        }
    }
}

impl fmt::Display for LogicVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot {
            Slot::Ref => write!(f, "{}.ref", self.node),
            Slot::Type => write!(f, "{}.type", self.node),
        }
    }
}

/// Binary relations between two bound values.
///
/// Arguments are always ordered (actual side, expected side): the value
/// an expression produced first, the type its context asks for second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    /// Same entity
    Equal,
    MatchingType,
    /// (actual type, formal type)
    MatchingFormal,
    /// (formal type, actual type)
    MatchingFormalInverted,
    /// (value type, target type)
    MatchingAssign,
    /// (prefix type, first formal type) of a dot-notation call
    MatchingPrefix,
    /// (allocated type, access type)
    MatchingAllocator,
}

/// Value-to-value conversions used by [`EquationKind::Propagate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conversion {
    /// Access type to its designated type
    DesignatedType,
    /// Array type to its component type
    ComponentType,
    /// Array type to its first index type; scalar types map to themselves
    FirstIndexType,
    CanonicalType,
    ClasswideType,
    /// Universal numeric types to their root type in `Standard`
    RootNumeric,
}

/// Late-checked properties of bound values
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pred {
    IsInteger,
    IsReal,
    IsNumeric,
    IsDiscrete,
    IsScalar,
    IsBoolean,
    IsBooleanOrModular,
    IsCharacter,
    /// One-dimensional array of a character type
    IsString,
    IsArray,
    IsAccess,
    IsTagged,
    /// Scalar or one-dimensional discrete array (`<`, `<=`, ...)
    IsOrderable,
    /// `[array, component]`: component matches the array's component type
    ComponentMatches,
    /// `[access, target]`: the access type designates the target type
    Designates,
    /// `[access]`: an allocator of the given type fits the access type
    AllocatorFor(Entity),
    /// `[a, b]`: the relation holds in the given order
    Holds(Relation),
}

/// Sub-equation generators run once their inputs are bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpandRule {
    /// Components and dot-callable primitives of the prefix type of `name`;
    /// `call` is the enclosing call when `name` is its callee
    SelectedComponent {
        name: NodeId,
        call: Option<NodeId>,
        statement: bool,
    },
    /// Indexing of the value produced by the callee of `call`
    IndexValue { call: NodeId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum EquationKind {
    True,
    False,
    /// `var = value`
    Bind(LogicVar, Entity),
    /// `var = value` unless `var` is bound by something stronger, in which
    /// case `relation(bound, value)` must hold
    BindWith(LogicVar, Entity, Relation),
    /// Copy a bound side to an unbound one; check `relation(a, b)` once both
    /// are bound
    Unify(LogicVar, LogicVar, Relation),
    /// `dest = conversion(src)` once `src` is bound
    Propagate {
        dest: LogicVar,
        src: LogicVar,
        conversion: Conversion,
    },
    /// Backtracking choice among candidate values
    Domain(LogicVar, Vec<Entity>),
    Predicate(Pred, Vec<LogicVar>),
    /// Applied only when solving stalls
    Default(LogicVar, Entity),
    Expand(Vec<LogicVar>, ExpandRule),
    And(Vec<Equation>),
    /// Committed choice: the first branch satisfiable on its own is kept
    Or(Vec<Equation>),
    /// Backtracking disjunction: the first branch for which the whole
    /// equation is satisfiable
    Any(Vec<Equation>),
}

/// Cheaply clonable equation tree
#[derive(Clone, PartialEq)]
pub struct Equation(Rc<EquationKind>);

impl Equation {
    fn new(kind: EquationKind) -> Self {
        Equation(Rc::new(kind))
    }

    pub fn kind(&self) -> &EquationKind {
        &self.0
    }

    pub fn truth() -> Self {
        Self::new(EquationKind::True)
    }

    pub fn falsity() -> Self {
        Self::new(EquationKind::False)
    }

    pub fn bind(var: LogicVar, value: Entity) -> Self {
        Self::new(EquationKind::Bind(var, value))
    }

    pub fn bind_with(var: LogicVar, value: Entity, relation: Relation) -> Self {
        Self::new(EquationKind::BindWith(var, value, relation))
    }

    pub fn unify(a: LogicVar, b: LogicVar, relation: Relation) -> Self {
        Self::new(EquationKind::Unify(a, b, relation))
    }

    pub fn propagate(dest: LogicVar, src: LogicVar, conversion: Conversion) -> Self {
        Self::new(EquationKind::Propagate {
            dest,
            src,
            conversion,
        })
    }

    pub fn domain(var: LogicVar, candidates: Vec<Entity>) -> Self {
        if candidates.is_empty() {
            return Self::falsity();
        }
        Self::new(EquationKind::Domain(var, candidates))
    }

    pub fn predicate(pred: Pred, vars: Vec<LogicVar>) -> Self {
        Self::new(EquationKind::Predicate(pred, vars))
    }

    pub fn default_value(var: LogicVar, value: Entity) -> Self {
        Self::new(EquationKind::Default(var, value))
    }

    pub fn expand(inputs: Vec<LogicVar>, rule: ExpandRule) -> Self {
        Self::new(EquationKind::Expand(inputs, rule))
    }

    /// Conjunction; trivially true members are dropped and nested
    /// conjunctions flattened
    pub fn and(eqs: impl IntoIterator<Item = Equation>) -> Self {
        let mut flat = Vec::new();
        for eq in eqs {
            match eq.kind() {
                EquationKind::True => {}
                EquationKind::False => return Self::falsity(),
                EquationKind::And(inner) => flat.extend(inner.iter().cloned()),
                _ => flat.push(eq),
            }
        }
        match flat.len() {
            0 => Self::truth(),
            1 => flat.remove(0),
            _ => Self::new(EquationKind::And(flat)),
        }
    }

    /// Committed choice; false branches are dropped
    pub fn or(eqs: impl IntoIterator<Item = Equation>) -> Self {
        let branches: Vec<Equation> = eqs.into_iter().filter(|e| !e.is_false()).collect();
        match branches.len() {
            0 => Self::falsity(),
            1 => branches.into_iter().next().unwrap_or_else(Self::falsity),
            _ => Self::new(EquationKind::Or(branches)),
        }
    }

    /// Backtracking disjunction; false branches are dropped
    pub fn any(eqs: impl IntoIterator<Item = Equation>) -> Self {
        let branches: Vec<Equation> = eqs.into_iter().filter(|e| !e.is_false()).collect();
        match branches.len() {
            0 => Self::falsity(),
            1 => branches.into_iter().next().unwrap_or_else(Self::falsity),
            _ => Self::new(EquationKind::Any(branches)),
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self.kind(), EquationKind::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self.kind(), EquationKind::False)
    }

    /// Number of combinator nodes, for tracing
    pub fn size(&self) -> usize {
        match self.kind() {
            EquationKind::And(eqs) | EquationKind::Or(eqs) | EquationKind::Any(eqs) => {
                1 + eqs.iter().map(Equation::size).sum::<usize>()
            }
            _ => 1,
        }
    }
}

impl BitAnd for Equation {
    type Output = Equation;

    fn bitand(self, rhs: Equation) -> Equation {
        Equation::and([self, rhs])
    }
}

impl fmt::Debug for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, name: &str, eqs: &[Equation]) -> fmt::Result {
            write!(f, "{name}(")?;
            for (i, eq) in eqs.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{eq}")?;
            }
            write!(f, ")")
        }

        match self.kind() {
            EquationKind::True => write!(f, "true"),
            EquationKind::False => write!(f, "false"),
            EquationKind::Bind(var, value) => write!(f, "{var} <- {value}"),
            EquationKind::BindWith(var, value, rel) => write!(f, "{var} <~ {value} [{rel:?}]"),
            EquationKind::Unify(a, b, rel) => write!(f, "{a} ~ {b} [{rel:?}]"),
            EquationKind::Propagate {
                dest,
                src,
                conversion,
            } => write!(f, "{dest} <- {conversion:?}({src})"),
            EquationKind::Domain(var, values) => write!(f, "{var} in {} values", values.len()),
            EquationKind::Predicate(pred, vars) => write!(f, "{pred:?}{vars:?}"),
            EquationKind::Default(var, value) => write!(f, "{var} default {value}"),
            EquationKind::Expand(vars, rule) => write!(f, "expand {rule:?} on {vars:?}"),
            EquationKind::And(eqs) => list(f, "and", eqs),
            EquationKind::Or(eqs) => list(f, "or", eqs),
            EquationKind::Any(eqs) => list(f, "any", eqs),
        }
    }
}
