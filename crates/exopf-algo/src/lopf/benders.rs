//! Lazy-constraint Benders decomposition.
//!
//! The master model carries the investment variables plus one optimistic
//! value variable (ALPHA) per cut group; the slaves carry operation over
//! one snapshot each (`split_subproblems`) or the whole horizon. A lazy
//! callback on the master pushes each integer incumbent's values into the
//! slave right-hand sides, solves the slaves, and answers with optimality
//! cuts (from slave duals) or feasibility cuts (from elastic-relaxation
//! duals). The incumbent is accepted when every slave is optimal and the
//! gap between total slave cost and the ALPHA values is within tolerance.

use super::builder::{
    build_lopf_model, BuildParams, LopfModel, MasterVar, Role, SnapshotSlice, VarTables,
};
use super::monolithic::{write_solution, LopfOutcome};
use super::rescaling::Rescaling;
use super::LopfConfig;
use crate::sparse::PtdfCache;
use exopf_core::{ExopfError, ExopfResult, Network};
use exopf_solver::{
    solve_elastic, Cut, LinExpr, Relation, Solution, SolveOptions, SolveStatus, SolverBackend,
    VarId,
};
use tracing::{debug, info, warn};

/// Pushed right-hand sides below this magnitude are clamped to zero.
const RHS_CLAMP: f64 = 1e-4;

/// Master variable handle referenced by a coupled constraint.
fn master_var_id(vars: &VarTables, var: MasterVar) -> VarId {
    match var {
        MasterVar::GenNom(e) => vars.gen_p_nom[e],
        MasterVar::LineNom(e) => vars.line_s_nom[e],
        MasterVar::LinkNom(e) => vars.link_p_nom[e],
        MasterVar::LineCand(e, c) => vars.line_opt_cand[e][c],
    }
}

/// Run the Benders decomposition. Master infeasibility is terminal; slave
/// infeasibility produces a feasibility cut in-band.
pub fn run_benders(
    network: &mut Network,
    backend: &dyn SolverBackend,
    config: &LopfConfig,
    ptdf_cache: &mut PtdfCache,
) -> ExopfResult<LopfOutcome> {
    let t_total = network.snapshot_count();
    let n_groups = if config.individualcuts { t_total } else { 1 };

    let mut master = build_lopf_model(
        network,
        config,
        BuildParams {
            role: Role::Master,
            slice: SnapshotSlice::All,
            n_groups,
        },
        ptdf_cache,
    )?;
    debug_assert_eq!(master.vars.alpha.len(), n_groups);

    let slices: Vec<SnapshotSlice> = if config.split_subproblems {
        (0..t_total).map(SnapshotSlice::Single).collect()
    } else {
        vec![SnapshotSlice::All]
    };
    // one PTDF inversion serves every slave build of a round
    let mut slaves: Vec<LopfModel> = slices
        .iter()
        .map(|slice| {
            build_lopf_model(
                network,
                config,
                BuildParams {
                    role: Role::Slave,
                    slice: *slice,
                    n_groups: 1,
                },
                &mut *ptdf_cache,
            )
        })
        .collect::<ExopfResult<_>>()?;

    let baseline_x: Vec<f64> = network.lines.iter().map(|l| l.x).collect();
    let baseline_np: Vec<f64> = network.lines.iter().map(|l| l.num_parallel).collect();

    let master_options = SolveOptions {
        mip_gap: Some(config.mip_gap),
        ..SolveOptions::default()
    };
    let slave_options = SolveOptions::default();
    let benderscut = Rescaling::from_config(config.rescaling).benderscut;

    let mut last_slave_solutions: Vec<Option<Solution>> = vec![None; slaves.len()];
    let mut rounds = 0usize;

    let master_solution = {
        // split the master: the solve loop owns the math model, the
        // callback reads the variable tables
        let LopfModel {
            model: master_model,
            vars: master_vars,
            lines: master_lines,
            ..
        } = &mut master;
        let master_vars = &*master_vars;
        let master_lines = &*master_lines;

        let mut callback = |incumbent: &Solution| -> ExopfResult<Vec<Cut>> {
            rounds += 1;

            if config.update_x {
                // reactance follows the incumbent circuit additions; the
                // slaves are rebuilt against the updated network
                for e in 0..master_lines.n_ext() {
                    let orig = master_lines.original(master_lines.n_fixed() + e);
                    let inv = incumbent.value(master_vars.line_inv[e]).max(0.0);
                    network.lines[orig].x = baseline_x[orig] * baseline_np[orig]
                        / (baseline_np[orig] + inv);
                }
                slaves = slices
                    .iter()
                    .map(|slice| {
                        build_lopf_model(
                            network,
                            config,
                            BuildParams {
                                role: Role::Slave,
                                slice: *slice,
                                n_groups: 1,
                            },
                            &mut *ptdf_cache,
                        )
                    })
                    .collect::<ExopfResult<_>>()?;
            }

            // push incumbent values into every coupled right-hand side
            for slave in slaves.iter_mut() {
                for i in 0..slave.coupled.len() {
                    let coupling = slave.coupled[i];
                    let value = incumbent.value(master_var_id(master_vars, coupling.master));
                    let mut rhs = coupling.scale * (coupling.coeff * value + coupling.offset);
                    if rhs.abs() < RHS_CLAMP {
                        rhs = 0.0;
                    }
                    slave.model.set_rhs(coupling.con, rhs);
                }
            }

            // solve slaves; collect optimality data or feasibility cuts
            let mut feasibility_cuts: Vec<Cut> = Vec::new();
            let mut groups: Vec<CutData> = vec![CutData::default(); n_groups];
            let mut total_slave_objective = 0.0;
            for (s, slave) in slaves.iter().enumerate() {
                let group = if config.individualcuts { s } else { 0 };
                let solution = backend.solve(&slave.model, &slave_options)?;
                match solution.status {
                    SolveStatus::Optimal => {
                        total_slave_objective += solution.objective;
                        groups[group].absorb(slave, &solution.duals);
                        last_slave_solutions[s] = Some(solution);
                    }
                    SolveStatus::Infeasible => {
                        warn!(slave = s, "slave infeasible, deriving feasibility cut");
                        let relaxed = solve_elastic(backend, &slave.model, &slave_options)?;
                        debug!(violation = relaxed.objective, "elastic certificate");
                        let mut data = CutData::default();
                        data.absorb(slave, &relaxed.duals);
                        feasibility_cuts.push(data.into_cut(
                            format!("feasibility_cut({rounds},{s})"),
                            None,
                            master_vars,
                            benderscut,
                        ));
                        last_slave_solutions[s] = None;
                    }
                    status => {
                        return Err(ExopfError::Solver(format!(
                            "Benders slave {s}: {status}"
                        )))
                    }
                }
            }
            if !feasibility_cuts.is_empty() {
                return Ok(feasibility_cuts);
            }

            let alpha_total: f64 = master_vars
                .alpha
                .iter()
                .map(|a| incumbent.value(*a))
                .sum();
            let gap = total_slave_objective - alpha_total;
            info!(
                round = rounds,
                slave_objective = total_slave_objective,
                alpha = alpha_total,
                gap,
                "Benders round"
            );
            if gap.abs() <= config.tolerance {
                info!(round = rounds, gap, "Benders converged");
                return Ok(Vec::new());
            }

            let mut cuts = Vec::with_capacity(n_groups);
            for (g, data) in groups.into_iter().enumerate() {
                if !data.touched {
                    continue;
                }
                cuts.push(data.into_cut(
                    format!("optimality_cut({rounds},{g})"),
                    Some(master_vars.alpha[g]),
                    master_vars,
                    benderscut,
                ));
            }
            Ok(cuts)
        };

        backend.solve_with_lazy_cuts(master_model, &master_options, &mut callback)?
    };

    match &master_solution.status {
        SolveStatus::Optimal => {}
        SolveStatus::Infeasible => {
            return Err(ExopfError::Infeasible("Benders master".into()))
        }
        status => return Err(ExopfError::Solver(format!("Benders master: {status}"))),
    }

    // investment from the master, operation from the accepted incumbent's
    // slave solutions
    write_solution(network, &master, &master_solution);
    for (slave, solution) in slaves.iter().zip(last_slave_solutions.iter()) {
        if let Some(solution) = solution {
            write_solution(network, slave, solution);
        }
    }

    Ok(LopfOutcome {
        objective: master_solution.objective,
        model: master,
        solution: master_solution,
    })
}

/// Cut under construction: symbolic master references with accumulated
/// coefficients plus the constant from uncoupled rows.
#[derive(Debug, Clone, Default)]
struct CutData {
    terms: Vec<(MasterVar, f64)>,
    constant: f64,
    touched: bool,
}

impl CutData {
    /// Fold one solved slave into the cut. `duals` follow the
    /// d(objective)/d(rhs) convention, so `sum(dual * rhs)` over all rows
    /// equals the slave objective (optimality) or the elastic violation
    /// (feasibility).
    fn absorb(&mut self, slave: &LopfModel, duals: &[f64]) {
        self.touched = true;
        let coupled_rows = slave.coupled_row_set();
        for coupling in &slave.coupled {
            let dual = duals[coupling.con.index()];
            if dual == 0.0 {
                continue;
            }
            self.push_term(coupling.master, dual * coupling.scale * coupling.coeff);
            self.constant += dual * coupling.scale * coupling.offset;
        }
        for (row, con) in slave.model.constraints().iter().enumerate() {
            if coupled_rows.contains(&row) {
                continue;
            }
            let dual = duals[row];
            if dual != 0.0 {
                self.constant += dual * con.rhs;
            }
        }
    }

    fn push_term(&mut self, var: MasterVar, coeff: f64) {
        for (existing, value) in self.terms.iter_mut() {
            if *existing == var {
                *value += coeff;
                return;
            }
        }
        self.terms.push((var, coeff));
    }

    /// Emit `alpha >= sum(terms) + constant` (optimality, with `alpha`) or
    /// `0 >= sum(terms) + constant` (feasibility, without), rescaled by the
    /// benderscut factor.
    fn into_cut(
        self,
        name: String,
        alpha: Option<VarId>,
        master_vars: &VarTables,
        benderscut: f64,
    ) -> Cut {
        let mut expr = LinExpr::new();
        if let Some(alpha) = alpha {
            expr.push(alpha, benderscut);
        }
        for (var, coeff) in self.terms {
            expr.push(master_var_id(master_vars, var), -benderscut * coeff);
        }
        Cut {
            name,
            expr,
            relation: Relation::Ge,
            rhs: benderscut * self.constant,
        }
    }
}
