//! Equation solver
//!
//! Depth-first solving over an agenda of pending equations:
//!
//! 1. Queued equations are processed in order. Strong bindings happen
//!    immediately; goals whose inputs are unbound are deferred and woken up
//!    on the next binding.
//! 2. When the queue stalls, weak steps (`BindWith`, one-sided `Unify`) are
//!    applied in FIFO order, then defaults, one at a time.
//! 3. When nothing is left, deferred predicates, expansions and propagations
//!    fail; unifications between two unbound variables are dropped.
//!
//! `Any` and `Domain` branch: every alternative gets a copy of the remaining
//! agenda and the bindings made by a failed alternative are rolled back
//! through the trail before the next one is tried. `Or` is a committed choice
//! solved locally: the first branch that does not fail on its own is kept.

use super::equation::{Conversion, Equation, EquationKind, ExpandRule, LogicVar, Pred, Relation};
use crate::entity::Entity;
use std::collections::{HashMap, VecDeque};
use tracing::warn;

/// Domain knowledge the solver consults for relations, conversions,
/// predicates and expansions
pub trait Theory {
    /// Whether `relation(first, second)` holds
    fn relate(&self, relation: Relation, first: &Entity, second: &Entity) -> bool;

    fn convert(&self, conversion: Conversion, value: &Entity) -> Option<Entity>;

    fn check(&self, pred: &Pred, values: &[Entity]) -> bool;

    /// Build the sub-equation of `rule` from the values of its inputs
    fn expand(&self, rule: &ExpandRule, values: &[Entity]) -> Equation;
}

pub type Bindings = HashMap<LogicVar, Entity>;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Solved(Bindings),
    Unsatisfiable,
    /// The step budget ran out; treated as a failure by callers
    BudgetExhausted,
}

impl Outcome {
    pub fn is_solved(&self) -> bool {
        matches!(self, Outcome::Solved(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Run until the agenda is exhausted
    Full,
    /// Run the queue only; stalled goals are handed back to the caller
    Local,
}

#[derive(Debug, Clone, Default)]
struct Agenda {
    queue: VecDeque<Equation>,
    deferred: Vec<Equation>,
    weak: VecDeque<Equation>,
    defaults: VecDeque<Equation>,
}

impl Agenda {
    fn with(eq: Equation) -> Self {
        let mut agenda = Self::default();
        agenda.queue.push_back(eq);
        agenda
    }

    fn wake(&mut self) {
        for eq in self.deferred.drain(..) {
            self.queue.push_back(eq);
        }
    }

    fn absorb(&mut self, other: Agenda) {
        self.queue.extend(other.queue);
        self.deferred.extend(other.deferred);
        self.weak.extend(other.weak);
        self.defaults.extend(other.defaults);
    }
}

struct Solver<'t> {
    theory: &'t dyn Theory,
    bindings: Bindings,
    trail: Vec<LogicVar>,
    steps: usize,
    budget: usize,
}

/// Solve `eq`, taking at most `budget` steps
pub fn solve(eq: &Equation, theory: &dyn Theory, budget: usize) -> Outcome {
    let mut solver = Solver {
        theory,
        bindings: HashMap::new(),
        trail: Vec::new(),
        steps: 0,
        budget,
    };
    let solved = solver.run(Agenda::with(eq.clone()), Mode::Full).is_some();
    if solver.exhausted() {
        warn!(budget, "solver step budget exhausted");
        return Outcome::BudgetExhausted;
    }
    if solved {
        Outcome::Solved(solver.bindings)
    } else {
        Outcome::Unsatisfiable
    }
}

impl Solver<'_> {
    fn exhausted(&self) -> bool {
        self.steps > self.budget
    }

    fn value(&self, var: &LogicVar) -> Option<Entity> {
        self.bindings.get(var).copied()
    }

    fn values(&self, vars: &[LogicVar]) -> Option<Vec<Entity>> {
        vars.iter().map(|v| self.value(v)).collect()
    }

    fn bind(&mut self, agenda: &mut Agenda, var: LogicVar, value: Entity) -> bool {
        if let Some(bound) = self.value(&var) {
            return bound == value;
        }
        self.bindings.insert(var, value);
        self.trail.push(var);
        agenda.wake();
        true
    }

    fn rollback(&mut self, mark: usize) {
        while self.trail.len() > mark {
            if let Some(var) = self.trail.pop() {
                self.bindings.remove(&var);
            }
        }
    }

    /// Returns the leftover agenda on success (empty in full mode)
    fn run(&mut self, mut agenda: Agenda, mode: Mode) -> Option<Agenda> {
        loop {
            self.steps += 1;
            if self.exhausted() {
                return None;
            }

            if let Some(eq) = agenda.queue.pop_front() {
                match eq.kind() {
                    EquationKind::True => {}
                    EquationKind::False => return None,
                    EquationKind::Bind(var, value) => {
                        if !self.bind(&mut agenda, *var, *value) {
                            return None;
                        }
                    }
                    EquationKind::BindWith(var, value, relation) => match self.value(var) {
                        Some(bound) => {
                            if !self.theory.relate(*relation, &bound, value) {
                                return None;
                            }
                        }
                        None => agenda.weak.push_back(eq.clone()),
                    },
                    EquationKind::Unify(a, b, relation) => match (self.value(a), self.value(b)) {
                        (Some(x), Some(y)) => {
                            if !self.theory.relate(*relation, &x, &y) {
                                return None;
                            }
                        }
                        (None, None) => agenda.deferred.push(eq.clone()),
                        _ => agenda.weak.push_back(eq.clone()),
                    },
                    EquationKind::Propagate {
                        dest,
                        src,
                        conversion,
                    } => match self.value(src) {
                        Some(value) => match self.theory.convert(*conversion, &value) {
                            Some(converted) => {
                                if !self.bind(&mut agenda, *dest, converted) {
                                    return None;
                                }
                            }
                            None => return None,
                        },
                        None => agenda.deferred.push(eq.clone()),
                    },
                    EquationKind::Domain(var, candidates) => match self.value(var) {
                        Some(bound) => {
                            if !candidates.contains(&bound) {
                                return None;
                            }
                        }
                        None => {
                            let branches = candidates
                                .iter()
                                .map(|c| Equation::bind(*var, *c))
                                .collect();
                            return self.branch(agenda, branches, mode);
                        }
                    },
                    EquationKind::Predicate(pred, vars) => match self.values(vars) {
                        Some(values) => {
                            if !self.theory.check(pred, &values) {
                                return None;
                            }
                        }
                        None => agenda.deferred.push(eq.clone()),
                    },
                    EquationKind::Default(_, _) => agenda.defaults.push_back(eq.clone()),
                    EquationKind::Expand(inputs, rule) => match self.values(inputs) {
                        Some(values) => {
                            let generated = self.theory.expand(rule, &values);
                            agenda.queue.push_front(generated);
                        }
                        None => agenda.deferred.push(eq.clone()),
                    },
                    EquationKind::And(eqs) => {
                        for sub in eqs.iter().rev() {
                            agenda.queue.push_front(sub.clone());
                        }
                    }
                    EquationKind::Or(eqs) => {
                        let mut committed = false;
                        for branch in eqs {
                            let mark = self.trail.len();
                            match self.run(Agenda::with(branch.clone()), Mode::Local) {
                                Some(leftover) => {
                                    if self.trail.len() > mark {
                                        agenda.wake();
                                    }
                                    agenda.absorb(leftover);
                                    committed = true;
                                    break;
                                }
                                None => {
                                    self.rollback(mark);
                                    if self.exhausted() {
                                        return None;
                                    }
                                }
                            }
                        }
                        if !committed {
                            return None;
                        }
                    }
                    EquationKind::Any(eqs) => return self.branch(agenda, eqs.clone(), mode),
                }
                continue;
            }

            if mode == Mode::Local {
                return Some(agenda);
            }

            if let Some(eq) = agenda.weak.pop_front() {
                if !self.apply_weak(&mut agenda, &eq) {
                    return None;
                }
                continue;
            }

            if let Some(eq) = agenda.defaults.pop_front() {
                if let EquationKind::Default(var, value) = eq.kind() {
                    if self.value(var).is_none() {
                        self.bind(&mut agenda, *var, *value);
                    }
                }
                continue;
            }

            let stuck = agenda.deferred.iter().any(|eq| {
                matches!(
                    eq.kind(),
                    EquationKind::Predicate(..)
                        | EquationKind::Expand(..)
                        | EquationKind::Propagate { .. }
                )
            });
            if stuck {
                return None;
            }
            return Some(Agenda::default());
        }
    }

    fn apply_weak(&mut self, agenda: &mut Agenda, eq: &Equation) -> bool {
        match eq.kind() {
            EquationKind::BindWith(var, value, relation) => match self.value(var) {
                Some(bound) => self.theory.relate(*relation, &bound, value),
                None => self.bind(agenda, *var, *value),
            },
            EquationKind::Unify(a, b, relation) => match (self.value(a), self.value(b)) {
                (Some(x), Some(y)) => self.theory.relate(*relation, &x, &y),
                (Some(x), None) => self.bind(agenda, *b, x),
                (None, Some(y)) => self.bind(agenda, *a, y),
                (None, None) => {
                    agenda.deferred.push(eq.clone());
                    true
                }
            },
            _ => true,
        }
    }

    fn branch(&mut self, agenda: Agenda, branches: Vec<Equation>, mode: Mode) -> Option<Agenda> {
        for branch in branches {
            let mark = self.trail.len();
            let mut trial = agenda.clone();
            trial.queue.push_front(branch);
            if let Some(result) = self.run(trial, mode) {
                return Some(result);
            }
            self.rollback(mark);
            if self.exhausted() {
                return None;
            }
        }
        None
    }
}
