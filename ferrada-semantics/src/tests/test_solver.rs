//! Solver behaviour over a toy theory where entities are plain numbers

use crate::logic::*;
use crate::Entity;
use ferrada_syntax::NodeId;
use pretty_assertions::assert_eq;

/// `MatchingType` holds when the first value does not exceed the second;
/// conversions add one; predicates check evenness
struct Numbers;

impl Theory for Numbers {
    fn relate(&self, relation: Relation, first: &Entity, second: &Entity) -> bool {
        match relation {
            Relation::Equal => first == second,
            _ => first.node.0 <= second.node.0,
        }
    }

    fn convert(&self, _conversion: Conversion, value: &Entity) -> Option<Entity> {
        Some(n(value.node.0 + 1))
    }

    fn check(&self, pred: &Pred, values: &[Entity]) -> bool {
        match pred {
            Pred::IsInteger => values.iter().all(|v| v.node.0 % 2 == 0),
            _ => true,
        }
    }

    fn expand(&self, rule: &ExpandRule, values: &[Entity]) -> Equation {
        match (rule, values) {
            (ExpandRule::IndexValue { call }, [value]) => Equation::bind(LogicVar::type_of(*call), n(value.node.0 * 10)),
            _ => Equation::falsity(),
        }
    }
}

fn n(value: u32) -> Entity {
    Entity::new(NodeId(value))
}

fn var(id: u32) -> LogicVar {
    LogicVar::reference(NodeId(id))
}

fn solved(eq: &Equation) -> Bindings {
    match solve(eq, &Numbers, 10_000) {
        Outcome::Solved(bindings) => bindings,
        outcome => panic!("expected a solution, got {outcome:?}"),
    }
}

#[test]
fn test_bind_and_unify() {
    let eq = Equation::bind(var(1), n(4)) & Equation::unify(var(1), var(2), Relation::Equal);
    let bindings = solved(&eq);
    assert_eq!(bindings.get(&var(2)), Some(&n(4)));
}

#[test]
fn test_conflicting_binds_fail() {
    let eq = Equation::bind(var(1), n(4)) & Equation::bind(var(1), n(5));
    assert_eq!(solve(&eq, &Numbers, 10_000), Outcome::Unsatisfiable);
}

#[test]
fn test_domain_backtracks_to_a_later_candidate() {
    let eq = Equation::domain(var(1), vec![n(3), n(5), n(6)])
        & Equation::predicate(Pred::IsInteger, vec![var(1)]);
    assert_eq!(solved(&eq).get(&var(1)), Some(&n(6)));
}

#[test]
fn test_any_rolls_back_failed_branches() {
    let eq = Equation::any([
        Equation::bind(var(1), n(1)) & Equation::bind(var(2), n(3)),
        Equation::bind(var(1), n(2)) & Equation::bind(var(2), n(4)),
    ]) & Equation::predicate(Pred::IsInteger, vec![var(2)]);
    let bindings = solved(&eq);
    assert_eq!(bindings.get(&var(1)), Some(&n(2)));
    assert_eq!(bindings.get(&var(2)), Some(&n(4)));
}

#[test]
fn test_bind_with_checks_an_existing_binding() {
    let fits = Equation::bind(var(1), n(3)) & Equation::bind_with(var(1), n(7), Relation::MatchingType);
    assert!(solve(&fits, &Numbers, 10_000).is_solved());

    let too_big = Equation::bind(var(1), n(9)) & Equation::bind_with(var(1), n(7), Relation::MatchingType);
    assert_eq!(solve(&too_big, &Numbers, 10_000), Outcome::Unsatisfiable);
}

#[test]
fn test_weak_binding_yields_to_strong_one() {
    // The strong bind comes later in the queue but still wins
    let eq = Equation::bind_with(var(1), n(7), Relation::MatchingType) & Equation::bind(var(1), n(2));
    assert_eq!(solved(&eq).get(&var(1)), Some(&n(2)));

    let alone = Equation::bind_with(var(1), n(7), Relation::MatchingType);
    assert_eq!(solved(&alone).get(&var(1)), Some(&n(7)));
}

#[test]
fn test_default_applies_only_to_unbound_variables() {
    let eq = Equation::default_value(var(1), n(8)) & Equation::default_value(var(2), n(8)) & Equation::bind(var(2), n(4));
    let bindings = solved(&eq);
    assert_eq!(bindings.get(&var(1)), Some(&n(8)));
    assert_eq!(bindings.get(&var(2)), Some(&n(4)));
}

#[test]
fn test_propagate_waits_for_its_source() {
    let eq = Equation::propagate(var(2), var(1), Conversion::CanonicalType) & Equation::bind(var(1), n(4));
    assert_eq!(solved(&eq).get(&var(2)), Some(&n(5)));
}

#[test]
fn test_stuck_predicate_fails() {
    let eq = Equation::predicate(Pred::IsInteger, vec![var(1)]);
    assert_eq!(solve(&eq, &Numbers, 10_000), Outcome::Unsatisfiable);
}

#[test]
fn test_expand_adds_generated_equation() {
    let call = NodeId(50);
    let eq = Equation::expand(vec![var(1)], ExpandRule::IndexValue { call }) & Equation::bind(var(1), n(3));
    assert_eq!(solved(&eq).get(&LogicVar::type_of(call)), Some(&n(30)));
}

#[test]
fn test_or_commits_to_first_locally_consistent_branch() {
    let eq = Equation::or([Equation::bind(var(1), n(1)), Equation::bind(var(1), n(2))])
        & Equation::predicate(Pred::IsInteger, vec![var(1)]);
    // The first branch succeeds on its own, so the choice is not revisited
    assert_eq!(solve(&eq, &Numbers, 10_000), Outcome::Unsatisfiable);
}

#[test]
fn test_budget_exhaustion() {
    let candidates: Vec<Entity> = (1..200).map(|i| n(i * 2 + 1)).collect();
    let eq = Equation::domain(var(1), candidates.clone())
        & Equation::domain(var(2), candidates)
        & Equation::predicate(Pred::IsInteger, vec![var(1)]);
    assert_eq!(solve(&eq, &Numbers, 50), Outcome::BudgetExhausted);
}

#[test]
fn test_constructors_simplify() {
    assert!(Equation::and([Equation::truth(), Equation::truth()]).is_true());
    assert!((Equation::bind(var(1), n(1)) & Equation::falsity()).is_false());
    assert!(Equation::any(Vec::<Equation>::new()).is_false());
}
