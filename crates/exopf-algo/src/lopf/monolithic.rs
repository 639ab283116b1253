//! Monolithic LOPF: build, solve, write back.

use super::builder::{build_lopf_model, BuildParams, LopfModel, Role, SnapshotSlice};
use super::LopfConfig;
use crate::sparse::PtdfCache;
use exopf_core::{ExopfError, ExopfResult, Network};
use exopf_solver::{Solution, SolveOptions, SolveStatus, SolverBackend};
use tracing::info;

/// Result of one LOPF run: the solved model for programmatic inspection
/// plus the raw solution. The network has already been updated.
#[derive(Debug)]
pub struct LopfOutcome {
    pub objective: f64,
    pub model: LopfModel,
    pub solution: Solution,
}

/// Build and solve the monolithic model; write the solution back into the
/// network. Infeasibility is returned to the caller as a distinct error.
pub fn run_monolithic(
    network: &mut Network,
    backend: &dyn SolverBackend,
    config: &LopfConfig,
    ptdf_cache: &mut PtdfCache,
) -> ExopfResult<LopfOutcome> {
    let model = build_lopf_model(
        network,
        config,
        BuildParams {
            role: Role::Monolithic,
            slice: SnapshotSlice::All,
            n_groups: 1,
        },
        ptdf_cache,
    )?;
    let options = SolveOptions {
        mip_gap: Some(config.mip_gap),
        ..SolveOptions::default()
    };
    let solution = backend.solve(&model.model, &options)?;
    match &solution.status {
        SolveStatus::Optimal => {}
        SolveStatus::Infeasible => {
            return Err(ExopfError::Infeasible("monolithic LOPF".into()))
        }
        status => {
            return Err(ExopfError::Solver(format!("monolithic LOPF: {status}")))
        }
    }
    info!(
        objective = solution.objective,
        vars = model.model.num_vars(),
        rows = model.model.num_cons(),
        "monolithic LOPF solved"
    );
    write_solution(network, &model, &solution);
    Ok(LopfOutcome {
        objective: solution.objective,
        model,
        solution,
    })
}

/// Size every per-snapshot result vector to the horizon.
pub(crate) fn ensure_result_horizon(network: &mut Network) {
    let t = network.snapshot_count();
    for bus in &mut network.buses {
        bus.marginal_price.resize(t, 0.0);
    }
    for line in &mut network.lines {
        line.p.resize(t, 0.0);
    }
    for link in &mut network.links {
        link.p.resize(t, 0.0);
    }
    for gen in &mut network.generators {
        gen.p.resize(t, 0.0);
    }
    for su in &mut network.storage_units {
        su.p.resize(t, 0.0);
        su.state_of_charge.resize(t, 0.0);
        su.spill.resize(t, 0.0);
    }
    for st in &mut network.stores {
        st.p.resize(t, 0.0);
        st.state_of_charge.resize(t, 0.0);
        st.spill.resize(t, 0.0);
    }
}

/// Write optimized capacities, dispatch, flows, state of charge, spill and
/// nodal marginal prices into the network. Used for the monolithic model
/// and, in Benders, for the master (investment) and every slave
/// (operation over its slice).
pub(crate) fn write_solution(network: &mut Network, model: &LopfModel, solution: &Solution) {
    ensure_result_horizon(network);
    let policy = model.policy();

    if policy.investment {
        for (pos, orig) in model.gens.positions() {
            let gen = &mut network.generators[orig];
            gen.p_nom_opt = match model.gens.ext_index(pos) {
                Some(e) => solution.value(model.vars.gen_p_nom[e]),
                None => gen.p_nom,
            };
        }
        for (pos, orig) in model.lines.positions() {
            let line = &mut network.lines[orig];
            line.s_nom_opt = match model.lines.ext_index(pos) {
                Some(e) => solution.value(model.vars.line_s_nom[e]),
                None => line.s_nom,
            };
        }
        for (pos, orig) in model.links.positions() {
            let link = &mut network.links[orig];
            link.p_nom_opt = match model.links.ext_index(pos) {
                Some(e) => solution.value(model.vars.link_p_nom[e]),
                None => link.p_nom,
            };
        }
        for (pos, orig) in model.storage_units.positions() {
            let su = &mut network.storage_units[orig];
            su.p_nom_opt = match model.storage_units.ext_index(pos) {
                Some(e) => solution.value(model.vars.su_p_nom[e]),
                None => su.p_nom,
            };
        }
        for (pos, orig) in model.stores.positions() {
            let st = &mut network.stores[orig];
            st.e_nom_opt = match model.stores.ext_index(pos) {
                Some(e) => solution.value(model.vars.store_e_nom[e]),
                None => st.e_nom,
            };
        }
    }

    if policy.operation {
        for (k, &t) in model.snapshot_indices.iter().enumerate() {
            for (pos, orig) in model.gens.positions() {
                network.generators[orig].p[t] = solution.value(model.vars.gen_p[k][pos]);
            }
            for (pos, orig) in model.lines.positions() {
                network.lines[orig].p[t] = solution.value(model.vars.line_p[k][pos]);
            }
            for (pos, orig) in model.links.positions() {
                network.links[orig].p[t] = solution.value(model.vars.link_p[k][pos]);
            }
            for (pos, orig) in model.storage_units.positions() {
                let su = &mut network.storage_units[orig];
                su.p[t] = solution.value(model.vars.su_dispatch[k][pos])
                    - solution.value(model.vars.su_store[k][pos]);
                su.state_of_charge[t] = solution.value(model.vars.su_soc[k][pos]);
                su.spill[t] = solution.value(model.vars.su_spill[k][pos]);
            }
            for (pos, orig) in model.stores.positions() {
                let st = &mut network.stores[orig];
                st.p[t] = solution.value(model.vars.st_dispatch[k][pos])
                    - solution.value(model.vars.st_store[k][pos]);
                st.state_of_charge[t] = solution.value(model.vars.st_soc[k][pos]);
                st.spill[t] = solution.value(model.vars.st_spill[k][pos]);
            }
            if solution.has_duals() {
                for (n, bus) in network.buses.iter_mut().enumerate() {
                    bus.marginal_price[t] = solution.dual(model.balance[k][n]);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exopf_core::*;
    use exopf_solver::HighsBackend;

    /// Two buses, one congested line, cheap generation behind it.
    fn congested_pair() -> Network {
        let mut network = Network::new("pair");
        network.snapshots = vec![Snapshot::new(1.0)];
        network.buses.push(Bus::new(BusId::new(0), "a", 380.0));
        network.buses.push(Bus::new(BusId::new(1), "b", 380.0));
        network
            .lines
            .push(Line::new(LineId::new(0), "a-b", "a", "b", 14.44, 300.0));
        network.generators.push(
            Generator::new(GenId::new(0), "cheap", "a", "gas", 1000.0).with_marginal_cost(10.0),
        );
        network.generators.push(
            Generator::new(GenId::new(1), "dear", "b", "gas", 1000.0).with_marginal_cost(50.0),
        );
        network
            .loads
            .push(Load::new(LoadId::new(0), "d", "b", vec![500.0]));
        network
    }

    #[test]
    fn test_congestion_dispatch_and_prices() {
        let mut network = congested_pair();
        let config = crate::lopf::LopfConfig::default();
        let outcome = run_monolithic(
            &mut network,
            &HighsBackend::new(),
            &config,
            &mut PtdfCache::new(),
        )
        .unwrap();

        // 300 MW cheap over the line, 200 MW dear locally
        assert!((outcome.objective - (300.0 * 10.0 + 200.0 * 50.0)).abs() < 1e-4);
        assert!((network.generators[0].p[0] - 300.0).abs() < 1e-5);
        assert!((network.generators[1].p[0] - 200.0).abs() < 1e-5);
        assert!((network.lines[0].p[0] - 300.0).abs() < 1e-5);

        // congestion separates the prices
        assert!((network.buses[0].marginal_price[0] - 10.0).abs() < 1e-5);
        assert!((network.buses[1].marginal_price[0] - 50.0).abs() < 1e-5);

        // fixed assets report their nominal capacity as optimal
        assert!((network.lines[0].s_nom_opt - 300.0).abs() < 1e-9);
        assert!((network.generators[0].p_nom_opt - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_infeasible_is_distinct_error() {
        let mut network = congested_pair();
        // demand beyond total capacity behind a 300 MW line
        network.loads[0].p = vec![1500.0];
        let config = crate::lopf::LopfConfig::default();
        let err = run_monolithic(
            &mut network,
            &HighsBackend::new(),
            &config,
            &mut PtdfCache::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ExopfError::Infeasible(_)));
    }
}
