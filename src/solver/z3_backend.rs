//! z3 backend: each clause becomes a z3 Boolean term

use std::collections::BTreeMap;
use std::time::Duration;
use z3::ast::{Ast, Bool};
use z3::{Config, Context, Params, SatResult, Solver};

use super::{SolverBackend, SolverVerdict};
use crate::contract::{Expr, VariableId};
use crate::error::SolverError;
use crate::parser::ParsedQuery;

#[derive(Debug, Clone)]
pub struct Z3Backend {
    timeout: Duration,
}

impl Z3Backend {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn solve(&self, clauses: &[Expr]) -> SolverVerdict {
        let mut cfg = Config::new();
        cfg.set_model_generation(true);
        let ctx = Context::new(&cfg);
        let solver = Solver::new(&ctx);
        let mut params = Params::new(&ctx);
        params.set_u32("timeout", self.timeout.as_millis().min(u32::MAX as u128) as u32);
        solver.set_params(&params);

        let mut vars: BTreeMap<VariableId, Bool<'_>> = BTreeMap::new();
        for clause in clauses {
            let term = translate(&ctx, clause, &mut vars);
            solver.assert(&term);
        }

        match solver.check() {
            SatResult::Sat => {
                let witness = solver.get_model().map(|model| {
                    vars.iter()
                        .filter_map(|(id, var)| {
                            model
                                .eval(var, true)
                                .and_then(|value| value.as_bool())
                                .map(|value| (id.to_string(), value))
                        })
                        .collect()
                });
                SolverVerdict::Satisfiable { witness }
            }
            SatResult::Unsat => SolverVerdict::Unsatisfiable,
            SatResult::Unknown => SolverVerdict::Unproven {
                reason: solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "z3 returned unknown".to_string()),
            },
        }
    }
}

fn translate<'ctx>(
    ctx: &'ctx Context,
    expr: &Expr,
    vars: &mut BTreeMap<VariableId, Bool<'ctx>>,
) -> Bool<'ctx> {
    match expr {
        Expr::Const(value) => Bool::from_bool(ctx, *value),
        Expr::Var(id) => vars
            .entry(*id)
            .or_insert_with(|| Bool::new_const(ctx, id.to_string()))
            .clone(),
        Expr::Not(inner) => translate(ctx, inner, vars).not(),
        Expr::And(terms) | Expr::Or(terms) => {
            let terms: Vec<Bool<'ctx>> = terms.iter().map(|t| translate(ctx, t, vars)).collect();
            let refs: Vec<&Bool<'ctx>> = terms.iter().collect();
            if matches!(expr, Expr::And(_)) {
                Bool::and(ctx, &refs)
            } else {
                Bool::or(ctx, &refs)
            }
        }
        Expr::Xor(terms) => {
            let mut acc = Bool::from_bool(ctx, false);
            for term in terms {
                acc = acc.xor(&translate(ctx, term, vars));
            }
            acc
        }
        Expr::Eq(lhs, rhs) => {
            let lhs = translate(ctx, lhs, vars);
            let rhs = translate(ctx, rhs, vars);
            lhs._eq(&rhs)
        }
    }
}

impl SolverBackend for Z3Backend {
    fn name(&self) -> &str {
        "z3"
    }

    fn check_query(&self, query: &str) -> Result<SolverVerdict, SolverError> {
        let parsed = ParsedQuery::parse(query)?;
        Ok(self.solve(&parsed.clauses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z3_agrees_on_simple_queries() {
        let backend = Z3Backend::new(Duration::from_secs(5));
        assert!(backend
            .check_query("solve add_ci1=0|add_ci1=1 && add_r4=(add_a4+add_ci1)")
            .unwrap()
            .is_satisfiable());
        assert_eq!(
            backend.check_query("solve add_a0=1 && add_a0=0").unwrap(),
            SolverVerdict::Unsatisfiable
        );
    }
}
