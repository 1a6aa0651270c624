//! Formal/actual parameter matching
//!
//! Pairs the actuals of a call (or of a generic instantiation) with the
//! formals of a candidate, positionally then by name. Shape only: types are
//! checked by the equations built from the pairs.

use crate::context::AnalysisContext;
use crate::entity::Entity;
use crate::symbols::{simple_name, Symbol};
use ferrada_syntax::{FormalSubpDefault, NodeId, NodeKind};

/// One formal, one defining name (`A, B : Integer` gives two)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingleFormal {
    pub name: Symbol,
    /// Defining name node
    pub defining: NodeId,
    /// Declaration holding the formal (parameter spec, formal type, ...)
    pub spec: Entity,
    pub has_default: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingleActual {
    /// Designator of a named association
    pub name: Option<Symbol>,
    pub designator: Option<NodeId>,
    pub expr: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamMatch {
    pub formal: SingleFormal,
    pub actual: Option<SingleActual>,
    /// Also set for the first formal of a dot call, matched by the prefix
    pub has_matched: bool,
}

/// Pair `actuals` with `formals`. `None` when an actual has no formal: too
/// many positionals, an unknown designator, or a formal given twice.
pub fn match_formals(formals: &[SingleFormal], actuals: &[SingleActual], is_dot_call: bool) -> Option<Vec<ParamMatch>> {
    let mut matches: Vec<ParamMatch> = formals
        .iter()
        .map(|formal| ParamMatch {
            formal: *formal,
            actual: None,
            has_matched: false,
        })
        .collect();

    let offset = if is_dot_call {
        matches.first_mut()?.has_matched = true;
        1
    } else {
        0
    };

    let mut position = offset;
    for actual in actuals {
        let slot = match actual.name {
            None => {
                let slot = matches.get_mut(position)?;
                position += 1;
                slot
            }
            Some(name) => matches
                .iter_mut()
                .skip(offset)
                .find(|m| m.formal.name == name)?,
        };
        if slot.has_matched {
            return None;
        }
        slot.actual = Some(*actual);
        slot.has_matched = true;
    }
    Some(matches)
}

/// Whether pairs from [`match_formals`] give every formal without a
/// default an actual
pub fn is_matching_param_list(matches: &[ParamMatch]) -> bool {
    matches.iter().all(|m| m.has_matched || m.formal.has_default)
}

impl AnalysisContext {
    /// Formals of a subprogram, seen through its rebindings
    pub fn subp_formals(&self, subp: &Entity) -> Vec<SingleFormal> {
        let mut formals = Vec::new();
        for param in self.param_specs(subp) {
            let NodeKind::ParamSpec { names, default, .. } = self.ast.kind(param.node) else {
                continue;
            };
            for name in names {
                formals.push(SingleFormal {
                    name: self.defining_symbol(*name),
                    defining: *name,
                    spec: param,
                    has_default: default.is_some(),
                });
            }
        }
        formals
    }

    /// Formals of a generic unit's formal part
    pub fn generic_formals(&self, generic: &Entity) -> Vec<SingleFormal> {
        let formals = match self.ast.kind(generic.node) {
            NodeKind::GenericPackageDecl { formals, .. } | NodeKind::GenericSubpDecl { formals, .. } => formals,
            _ => return Vec::new(),
        };
        let mut out = Vec::new();
        for formal in formals {
            let has_default = match self.ast.kind(*formal) {
                NodeKind::ObjectDecl { default, .. } => default.is_some(),
                NodeKind::FormalSubpDecl { default, .. } => *default != FormalSubpDefault::None,
                // Formal types and formal packages always take an actual
                _ => false,
            };
            for name in self.ast.defining_names(*formal) {
                out.push(SingleFormal {
                    name: self.defining_symbol(name),
                    defining: name,
                    spec: generic.sibling(*formal),
                    has_default,
                });
            }
        }
        out
    }

    /// Actuals of an association list; bare expressions count as positional
    pub fn actuals(&self, args: &[NodeId]) -> Vec<SingleActual> {
        args.iter()
            .map(|arg| match self.ast.kind(*arg) {
                NodeKind::ParamAssoc { designator, expr } => SingleActual {
                    name: designator.and_then(|d| self.ast.text(d)).map(|text| self.intern(text)),
                    designator: *designator,
                    expr: *expr,
                },
                _ => SingleActual {
                    name: None,
                    designator: None,
                    expr: *arg,
                },
            })
            .collect()
    }

    fn defining_symbol(&self, name: NodeId) -> Symbol {
        self.intern(simple_name(self.ast.text(name).unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::symbols::SymbolTable;
    use pretty_assertions::assert_eq;

    /// `procedure P (A : Integer; B : Integer := 0)`
    fn formals(symbols: &mut SymbolTable) -> Vec<SingleFormal> {
        vec![
            SingleFormal {
                name: symbols.intern("A"),
                defining: NodeId(1),
                spec: Entity::new(NodeId(2)),
                has_default: false,
            },
            SingleFormal {
                name: symbols.intern("B"),
                defining: NodeId(3),
                spec: Entity::new(NodeId(4)),
                has_default: true,
            },
        ]
    }

    fn positional(expr: u32) -> SingleActual {
        SingleActual {
            name: None,
            designator: None,
            expr: NodeId(expr),
        }
    }

    fn named(symbols: &mut SymbolTable, name: &str, expr: u32) -> SingleActual {
        SingleActual {
            name: Some(symbols.intern(name)),
            designator: Some(NodeId(expr + 100)),
            expr: NodeId(expr),
        }
    }

    #[test]
    fn test_param_list_shapes() {
        let mut symbols = SymbolTable::new();
        let formals = formals(&mut symbols);
        let shapes = [
            // P (1)
            vec![positional(10)],
            // P (1, C => 2)
            vec![positional(10), named(&mut symbols, "C", 11)],
            // P (1, 2, 3)
            vec![positional(10), positional(11), positional(12)],
            // P (B => 2)
            vec![named(&mut symbols, "B", 11)],
        ];

        let matching: Vec<bool> = shapes
            .iter()
            .map(|actuals| match_formals(&formals, actuals, false).is_some_and(|m| is_matching_param_list(&m)))
            .collect();
        assert_eq!(matching, vec![true, false, false, false]);

        // The missing mandatory formal still pairs; only completeness fails
        assert!(match_formals(&formals, &shapes[3], false).is_some());
        assert_eq!(match_formals(&formals, &shapes[1], false), None);
        assert_eq!(match_formals(&formals, &shapes[2], false), None);
    }

    #[test]
    fn test_dot_call_skips_first_formal() {
        let mut symbols = SymbolTable::new();
        let formals = formals(&mut symbols);

        let matches = match_formals(&formals, &[positional(10)], true).expect("pairs");
        assert!(is_matching_param_list(&matches));
        assert!(matches[0].has_matched);
        assert_eq!(matches[0].actual, None);
        assert_eq!(matches[1].actual, Some(positional(10)));

        // `A` is the prefix and cannot be named again
        assert_eq!(match_formals(&formals, &[named(&mut symbols, "A", 10)], true), None);
    }

    #[test]
    fn test_formal_given_twice() {
        let mut symbols = SymbolTable::new();
        let formals = formals(&mut symbols);
        let actuals = [positional(10), named(&mut symbols, "A", 11)];

        assert_eq!(match_formals(&formals, &actuals, false), None);
    }
}
