//! HiGHS-backed implementation of [`SolverBackend`].

use crate::backend::{SolveOptions, SolverBackend};
use crate::model::{Model, Relation, Solution, SolveStatus, VarDomain};
use exopf_core::{ExopfError, ExopfResult};
use highs::{HighsModelStatus, RowProblem, Sense};

/// The HiGHS solver: simplex/interior LP plus branch-and-cut MIP.
///
/// Row duals are read only for models without integrality; a MIP has no
/// meaningful duals. Quadratic constraints are rejected.
#[derive(Debug, Clone, Default)]
pub struct HighsBackend;

impl HighsBackend {
    pub fn new() -> Self {
        Self
    }
}

impl SolverBackend for HighsBackend {
    fn name(&self) -> &str {
        "highs"
    }

    fn supports_integrality(&self) -> bool {
        true
    }

    fn solve(&self, model: &Model, options: &SolveOptions) -> ExopfResult<Solution> {
        if model.is_quadratic() {
            return Err(ExopfError::Config(
                "model carries quadratic constraints; HiGHS solves LP/MIP only".into(),
            ));
        }
        if model.num_vars() == 0 {
            return Ok(Solution {
                status: SolveStatus::Optimal,
                objective: model.objective().constant,
                values: Vec::new(),
                duals: Vec::new(),
            });
        }

        // Objective coefficients per column.
        let mut obj = vec![0.0; model.num_vars()];
        for (var, coeff) in &model.objective().terms {
            obj[var.index()] += coeff;
        }

        let mut pb = RowProblem::default();
        let mut cols = Vec::with_capacity(model.num_vars());
        for (i, def) in model.variables().iter().enumerate() {
            let col = match def.domain {
                VarDomain::Continuous => pb.add_column(obj[i], def.lb..=def.ub),
                VarDomain::Integer => pb.add_integer_column(obj[i], def.lb..=def.ub),
                VarDomain::Binary => pb.add_integer_column(obj[i], 0.0..=1.0),
            };
            cols.push(col);
        }
        for con in model.constraints() {
            // merge duplicate variable entries; a row may accumulate the
            // same variable twice (e.g. a cyclic recurrence on a
            // single-snapshot horizon)
            let mut merged: Vec<(usize, f64)> = con
                .expr
                .terms
                .iter()
                .map(|(var, coeff)| (var.index(), *coeff))
                .collect();
            merged.sort_by_key(|(idx, _)| *idx);
            merged.dedup_by(|next, acc| {
                if next.0 == acc.0 {
                    acc.1 += next.1;
                    true
                } else {
                    false
                }
            });
            let factors: Vec<_> = merged
                .into_iter()
                .map(|(idx, coeff)| (cols[idx], coeff))
                .collect();
            match con.relation {
                Relation::Le => pb.add_row(..=con.rhs, factors),
                Relation::Ge => pb.add_row(con.rhs.., factors),
                Relation::Eq => pb.add_row(con.rhs..=con.rhs, factors),
            };
        }

        let mut solver = pb.optimise(Sense::Minimise);
        solver.set_option("output_flag", options.verbose);
        if let Some(limit) = options.time_limit {
            solver.set_option("time_limit", limit);
        }
        if let Some(gap) = options.mip_gap {
            solver.set_option("mip_rel_gap", gap);
        }

        let solved = solver.solve();
        match solved.status() {
            HighsModelStatus::Optimal => {
                let raw = solved.get_solution();
                let values = raw.columns().to_vec();
                let duals = if model.has_integrality() {
                    Vec::new()
                } else {
                    raw.dual_rows().to_vec()
                };
                let objective = model.objective().constant
                    + obj
                        .iter()
                        .zip(values.iter())
                        .map(|(c, v)| c * v)
                        .sum::<f64>();
                Ok(Solution {
                    status: SolveStatus::Optimal,
                    objective,
                    values,
                    duals,
                })
            }
            HighsModelStatus::Infeasible => Ok(Solution::failed(SolveStatus::Infeasible)),
            HighsModelStatus::Unbounded => Ok(Solution::failed(SolveStatus::Unbounded)),
            other => {
                let label = format!("{other:?}");
                if label.contains("TimeLimit") {
                    Ok(Solution::failed(SolveStatus::TimeLimit))
                } else {
                    Ok(Solution::failed(SolveStatus::Error(label)))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::solve_elastic;
    use crate::model::{Cut, LinExpr, ModelKind};

    #[test]
    fn test_solve_lp_with_duals() {
        // min x + 2y  s.t.  x + y >= 10,  x <= 4
        let mut m = Model::new(ModelKind::Lp);
        let x = m.add_variable("x", VarDomain::Continuous, 0.0, f64::INFINITY);
        let y = m.add_variable("y", VarDomain::Continuous, 0.0, f64::INFINITY);
        let lo = m.add_constraint(
            "demand",
            LinExpr::term(x, 1.0).with(y, 1.0),
            Relation::Ge,
            10.0,
        );
        let cap = m.add_constraint("cap", LinExpr::term(x, 1.0), Relation::Le, 4.0);
        m.set_objective(LinExpr::term(x, 1.0).with(y, 2.0));

        let solution = HighsBackend::new()
            .solve(&m, &SolveOptions::default())
            .unwrap();
        assert!(solution.is_optimal());
        assert!((solution.value(x) - 4.0).abs() < 1e-6);
        assert!((solution.value(y) - 6.0).abs() < 1e-6);
        assert!((solution.objective - 16.0).abs() < 1e-6);
        // shadow prices: d(obj)/d(rhs)
        assert!((solution.dual(lo) - 2.0).abs() < 1e-6);
        assert!((solution.dual(cap) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_solve_mip_integer_rounding() {
        // min x  s.t.  x >= 2.5,  x integer
        let mut m = Model::new(ModelKind::Mip);
        let x = m.add_variable("x", VarDomain::Integer, 0.0, 10.0);
        m.add_constraint("lo", LinExpr::term(x, 1.0), Relation::Ge, 2.5);
        m.set_objective(LinExpr::term(x, 1.0));

        let solution = HighsBackend::new()
            .solve(&m, &SolveOptions::default())
            .unwrap();
        assert!(solution.is_optimal());
        assert!((solution.value(x) - 3.0).abs() < 1e-6);
        // no duals for a MIP
        assert!(!solution.has_duals());
    }

    #[test]
    fn test_infeasible_reported_not_error() {
        let mut m = Model::new(ModelKind::Lp);
        let x = m.add_variable("x", VarDomain::Continuous, 0.0, f64::INFINITY);
        m.add_constraint("lo", LinExpr::term(x, 1.0), Relation::Ge, 5.0);
        m.add_constraint("hi", LinExpr::term(x, 1.0), Relation::Le, 3.0);
        m.set_objective(LinExpr::term(x, 1.0));

        let solution = HighsBackend::new()
            .solve(&m, &SolveOptions::default())
            .unwrap();
        assert_eq!(solution.status, SolveStatus::Infeasible);
    }

    #[test]
    fn test_elastic_certificate() {
        // x >= 5 and x <= 3 violate by 2
        let mut m = Model::new(ModelKind::Lp);
        let x = m.add_variable("x", VarDomain::Continuous, 0.0, f64::INFINITY);
        m.add_constraint("lo", LinExpr::term(x, 1.0), Relation::Ge, 5.0);
        m.add_constraint("hi", LinExpr::term(x, 1.0), Relation::Le, 3.0);
        m.set_objective(LinExpr::term(x, 1.0));

        let relaxed = solve_elastic(&HighsBackend::new(), &m, &SolveOptions::default()).unwrap();
        assert!(relaxed.is_optimal());
        assert!((relaxed.objective - 2.0).abs() < 1e-6);
        assert!(relaxed.has_duals());
    }

    #[test]
    fn test_lazy_cut_loop() {
        // min x over [0, 10]; the callback tightens x >= 3 once.
        let mut m = Model::new(ModelKind::Mip);
        let x = m.add_variable("x", VarDomain::Integer, 0.0, 10.0);
        m.set_objective(LinExpr::term(x, 1.0));

        let mut rounds = 0;
        let solution = HighsBackend::new()
            .solve_with_lazy_cuts(&mut m, &SolveOptions::default(), &mut |incumbent| {
                rounds += 1;
                if incumbent.value(x) < 3.0 {
                    Ok(vec![Cut {
                        name: "tighten".into(),
                        expr: LinExpr::term(x, 1.0),
                        relation: Relation::Ge,
                        rhs: 3.0,
                    }])
                } else {
                    Ok(Vec::new())
                }
            })
            .unwrap();

        assert!(solution.is_optimal());
        assert!((solution.value(x) - 3.0).abs() < 1e-6);
        assert_eq!(rounds, 2);
    }
}
