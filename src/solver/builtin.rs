//! In-process backend: unit propagation plus chronological backtracking
//!
//! Decisions are made on variables no clause defines first, so for the
//! definitional components the generator emits the search never backtracks:
//! once the free inputs are fixed, propagation determines everything else.

use std::collections::BTreeSet;
use tracing::trace;

use super::{SolverBackend, SolverVerdict};
use crate::contract::{Assignment, Expr, VariableId};
use crate::error::SolverError;
use crate::parser::ParsedQuery;

pub const DEFAULT_DECISION_LIMIT: usize = 1 << 16;

#[derive(Debug, Clone, Copy)]
pub struct BuiltinBackend {
    decision_limit: usize,
}

impl Default for BuiltinBackend {
    fn default() -> Self {
        Self::new()
    }
}

enum Search {
    Found(Assignment),
    Exhausted,
    Limit,
}

impl BuiltinBackend {
    pub fn new() -> Self {
        Self {
            decision_limit: DEFAULT_DECISION_LIMIT,
        }
    }

    pub fn with_decision_limit(mut self, limit: usize) -> Self {
        self.decision_limit = limit;
        self
    }

    /// Decides the conjunction of `clauses`
    pub fn solve(&self, clauses: &[Expr]) -> SolverVerdict {
        let mut variables = BTreeSet::new();
        for clause in clauses {
            clause.collect_variables(&mut variables);
        }
        let defined: BTreeSet<VariableId> = clauses.iter().filter_map(defined_variable).collect();
        let order: Vec<VariableId> = variables
            .iter()
            .filter(|v| !defined.contains(v))
            .chain(variables.iter().filter(|v| defined.contains(v)))
            .copied()
            .collect();

        let mut decisions = 0;
        let verdict = match self.search(clauses, &order, Assignment::new(), &mut decisions) {
            Search::Found(assignment) => SolverVerdict::Satisfiable {
                witness: Some(
                    assignment
                        .into_iter()
                        .map(|(id, value)| (id.to_string(), value))
                        .collect(),
                ),
            },
            Search::Exhausted => SolverVerdict::Unsatisfiable,
            Search::Limit => SolverVerdict::Unproven {
                reason: format!("decision limit {} reached", self.decision_limit),
            },
        };
        trace!(clauses = clauses.len(), decisions, verdict = verdict.label(), "builtin search done");
        verdict
    }

    fn search(
        &self,
        clauses: &[Expr],
        order: &[VariableId],
        mut assignment: Assignment,
        decisions: &mut usize,
    ) -> Search {
        if !propagate(clauses, &mut assignment) {
            return Search::Exhausted;
        }
        let Some(&next) = order.iter().find(|v| !assignment.contains_key(v)) else {
            // Every variable assigned and no clause false: all clauses hold
            return Search::Found(assignment);
        };
        for value in [false, true] {
            *decisions += 1;
            if *decisions > self.decision_limit {
                return Search::Limit;
            }
            let mut branch = assignment.clone();
            branch.insert(next, value);
            match self.search(clauses, order, branch, decisions) {
                Search::Exhausted => continue,
                other => return other,
            }
        }
        Search::Exhausted
    }
}

impl SolverBackend for BuiltinBackend {
    fn name(&self) -> &str {
        "builtin"
    }

    fn check_query(&self, query: &str) -> Result<SolverVerdict, SolverError> {
        let parsed = ParsedQuery::parse(query)?;
        Ok(self.solve(&parsed.clauses))
    }
}

/// The variable a clause of the form `x = ...` defines
fn defined_variable(clause: &Expr) -> Option<VariableId> {
    match clause {
        Expr::Eq(lhs, _) => match lhs.as_ref() {
            Expr::Var(id) => Some(*id),
            _ => None,
        },
        _ => None,
    }
}

/// Assigns every variable a clause forces until nothing changes.
/// Returns false as soon as some clause is false under the assignment.
pub fn propagate(clauses: &[Expr], assignment: &mut Assignment) -> bool {
    loop {
        let mut changed = false;
        for clause in clauses {
            match clause.eval(assignment) {
                Some(false) => return false,
                Some(true) => {}
                None => {
                    if let Some((id, value)) = forced(clause, assignment) {
                        assignment.insert(id, value);
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            return true;
        }
    }
}

/// A single assignment that `clause` being true implies
fn forced(clause: &Expr, assignment: &Assignment) -> Option<(VariableId, bool)> {
    match clause {
        Expr::Var(id) if !assignment.contains_key(id) => Some((*id, true)),
        Expr::Not(inner) => match inner.as_ref() {
            Expr::Var(id) if !assignment.contains_key(id) => Some((*id, false)),
            _ => None,
        },
        Expr::Eq(lhs, rhs) => match (lhs.as_ref(), rhs.as_ref()) {
            (Expr::Var(id), other) | (other, Expr::Var(id)) if !assignment.contains_key(id) => {
                other.eval(assignment).map(|value| (*id, value))
            }
            _ => None,
        },
        Expr::And(terms) => terms
            .iter()
            .filter(|t| t.eval(assignment).is_none())
            .find_map(|t| forced(t, assignment)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompose::NibbleDecomposer;
    use crate::isa::InstructionKind;

    #[test]
    fn test_generated_components_are_satisfiable() {
        let backend = BuiltinBackend::new();
        let decomposer = NibbleDecomposer::with_width(8).unwrap();
        for kind in InstructionKind::ALL {
            let plan = decomposer.decompose(kind).unwrap();
            for component in &plan.components {
                let verdict = backend.check_query(&component.serialize()).unwrap();
                let SolverVerdict::Satisfiable { witness: Some(witness) } = verdict else {
                    panic!("{} not satisfiable", component.name());
                };
                let assignment: Assignment = witness
                    .iter()
                    .map(|(name, value)| (name.parse().unwrap(), *value))
                    .collect();
                for clause in component.contract.clauses() {
                    assert_eq!(clause.eval(&assignment), Some(true), "{}", component.name());
                }
            }
        }
    }

    #[test]
    fn test_contradiction_is_unsatisfiable() {
        let verdict = BuiltinBackend::new()
            .check_query("solve add_a0=1 && add_b0=add_a0 && add_b0=0\n\nquit\n")
            .unwrap();
        assert_eq!(verdict, SolverVerdict::Unsatisfiable);
    }

    #[test]
    fn test_search_backtracks() {
        // a0=0 is tried first and refuted
        let verdict = BuiltinBackend::new()
            .check_query("solve (add_a0+add_b0)' && add_b0")
            .unwrap();
        let SolverVerdict::Satisfiable { witness: Some(witness) } = verdict else {
            panic!("expected a witness");
        };
        assert!(witness["add_a0"]);
        assert!(witness["add_b0"]);
    }

    #[test]
    fn test_decision_limit_leaves_query_unproven() {
        let verdict = BuiltinBackend::new()
            .with_decision_limit(0)
            .check_query("solve add_a0=0|add_a0=1")
            .unwrap();
        assert!(matches!(verdict, SolverVerdict::Unproven { .. }));
    }

    #[test]
    fn test_empty_conjunction() {
        let verdict = BuiltinBackend::new().check_query("solve 1\nquit\n").unwrap();
        assert!(verdict.is_satisfiable());
    }
}
