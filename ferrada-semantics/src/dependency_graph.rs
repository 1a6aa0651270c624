//! Unit dependency ordering using petgraph
//!
//! Environment population of a unit must happen after the units it depends
//! on: the units named in its `with` clauses, its parent units, and, for a
//! body, its own specification.

use crate::symbols::fold;
use ferrada_syntax::{Ast, NodeKind, UnitId, UnitKind};
use petgraph::graph::NodeIndex;
use petgraph::{algo, Graph as PetGraph};
use std::collections::HashMap;

/// A dependency graph over compilation units
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: PetGraph<UnitId, ()>,
    unit_to_node: HashMap<UnitId, NodeIndex>,
    unresolved: HashMap<UnitId, Vec<String>>,
}

/// Result of dependency analysis
#[derive(Debug, Clone, Default)]
pub struct DependencyResult {
    /// Units in topological order (dependencies first)
    pub compilation_order: Vec<UnitId>,
    /// Units that form circular dependencies
    pub circular_dependencies: Vec<Vec<UnitId>>,
    /// Names of required units that are not in the tree
    pub unresolved_dependencies: HashMap<UnitId, Vec<String>>,
}

/// A unit a compilation unit requires
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnitDependency {
    pub name: String,
    pub kind: UnitKind,
    /// Whether the dependency must exist (with clauses, parents, package specs)
    pub required: bool,
}

impl DependencyGraph {
    /// Build the graph over `units`; dependencies outside the set are ignored
    /// unless they are missing from the tree altogether
    pub fn build(ast: &Ast, units: &[UnitId]) -> Self {
        let mut graph = PetGraph::new();
        let mut unit_to_node = HashMap::new();
        for unit in units {
            unit_to_node.insert(*unit, graph.add_node(*unit));
        }

        let mut unresolved: HashMap<UnitId, Vec<String>> = HashMap::new();
        for unit in units {
            for dep in unit_dependencies(ast, *unit) {
                match ast.find_unit(&dep.name, dep.kind) {
                    Some(dep_unit) if dep_unit != *unit => {
                        if let Some(dep_node) = unit_to_node.get(&dep_unit) {
                            // Edge from dependency to dependent
                            graph.add_edge(*dep_node, unit_to_node[unit], ());
                        }
                    }
                    Some(_) => {}
                    None if dep.required => unresolved.entry(*unit).or_default().push(dep.name),
                    None => {}
                }
            }
        }

        Self {
            graph,
            unit_to_node,
            unresolved,
        }
    }

    pub fn resolve(&self) -> DependencyResult {
        let mut result = DependencyResult {
            unresolved_dependencies: self.unresolved.clone(),
            ..DependencyResult::default()
        };

        match algo::toposort(&self.graph, None) {
            Ok(sorted) => {
                result.compilation_order = sorted.iter().map(|idx| self.graph[*idx]).collect();
            }
            Err(_) => {
                // Report every strongly connected component with more than one unit
                for component in algo::kosaraju_scc(&self.graph) {
                    let is_cycle = component.len() > 1
                        || component
                            .first()
                            .is_some_and(|n| self.graph.contains_edge(*n, *n));
                    if is_cycle {
                        let mut units: Vec<UnitId> = component.iter().map(|n| self.graph[*n]).collect();
                        units.sort();
                        result.circular_dependencies.push(units);
                    }
                }
            }
        }

        result
    }

    pub fn contains(&self, unit: UnitId) -> bool {
        self.unit_to_node.contains_key(&unit)
    }
}

/// Units `unit` depends on, in clause order
pub fn unit_dependencies(ast: &Ast, unit: UnitId) -> Vec<UnitDependency> {
    let info = ast.unit(unit);
    let mut deps = Vec::new();
    let mut push = |name: String, kind: UnitKind, required: bool| {
        let dep = UnitDependency {
            name,
            kind,
            required,
        };
        if !deps.contains(&dep) {
            deps.push(dep);
        }
    };

    if let NodeKind::CompilationUnit { prelude, .. } = ast.kind(info.root) {
        for clause in prelude {
            if let NodeKind::WithClause { names } = ast.kind(*clause) {
                for name in names {
                    if let Some(text) = expanded_name(ast, *name) {
                        for prefix in prefixes(&text) {
                            push(prefix, UnitKind::Spec, true);
                        }
                    }
                }
            }
        }
    }

    // Parent units of a child unit
    let segments: Vec<&str> = info.name.split('.').collect();
    for end in 1..segments.len() {
        push(segments[..end].join("."), UnitKind::Spec, true);
    }

    if info.kind == UnitKind::Body {
        let is_package = matches!(
            ast.kind(info.root),
            NodeKind::CompilationUnit { item, .. } if matches!(ast.kind(*item), NodeKind::PackageBody { .. })
        );
        push(info.name.clone(), UnitKind::Spec, is_package);
    }

    deps
}

/// Text of an identifier or dotted name (`A.B.C`), folded
pub fn expanded_name(ast: &Ast, name: ferrada_syntax::NodeId) -> Option<String> {
    match ast.kind(name) {
        NodeKind::Identifier { text } | NodeKind::DefiningName { text } => Some(fold(text)),
        NodeKind::DottedName { prefix, suffix } => {
            let prefix = expanded_name(ast, *prefix)?;
            let suffix = expanded_name(ast, *suffix)?;
            Some(format!("{prefix}.{suffix}"))
        }
        _ => None,
    }
}

/// `a.b.c` gives `a`, `a.b`, `a.b.c`
fn prefixes(name: &str) -> Vec<String> {
    let segments: Vec<&str> = name.split('.').collect();
    (1..=segments.len()).map(|end| segments[..end].join(".")).collect()
}
