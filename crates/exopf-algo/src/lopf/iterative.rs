//! Iterative LOPF: fixed-point coupling of line reactance to installed
//! capacity.
//!
//! In the angle and cycle formulations the linear model takes reactance as
//! data, but physically more parallel circuits mean lower reactance. The
//! loop re-solves with reactances updated from the previous capacities
//! until the objective settles or the iteration budget is exhausted.
//! Optionally the continuous circuit additions are discretized: per
//! iteration (`seq_discretization`) or in a final threshold sweep
//! (`post_discretization`).

use super::monolithic::LopfOutcome;
use super::{run_lopf_cached, LopfConfig};
use crate::sparse::PtdfCache;
use exopf_core::{ExopfError, ExopfResult, Network};
use exopf_solver::SolverBackend;
use tracing::{debug, info};

/// Reactance sentinel for zero-capacity extendable lines. Keeps the line
/// out of play numerically without an infinite coefficient.
pub const X_SENTINEL: f64 = 1e7;

/// Capacity below which an extendable line counts as not built.
const S_NOM_ZERO: f64 = 1e-4;

/// Objective change below which the fixed point counts as converged.
const OBJECTIVE_TOLERANCE: f64 = 1.0;

/// Per-iteration record: objectives, line capacities and the reactances
/// each solve actually used.
#[derive(Debug, Clone, Default)]
pub struct IterationTrace {
    pub objectives: Vec<f64>,
    pub capacities: Vec<Vec<f64>>,
    pub reactances: Vec<Vec<f64>>,
}

impl IterationTrace {
    pub fn iterations(&self) -> usize {
        self.objectives.len()
    }
}

/// Round a fractional circuit count at `threshold`: fractional parts at or
/// above it round up, below it down. Never negative.
fn round_circuits(value: f64, threshold: f64) -> f64 {
    let floor = value.floor();
    let rounded = if value - floor >= threshold {
        floor + 1.0
    } else {
        floor
    };
    rounded.max(0.0)
}

/// Apply a rounded extension to every originally-extendable line: capacity,
/// parallel-circuit count and reactance are set to the discretized values
/// and the line is fixed (`s_nom_extendable = false`) for the re-solve.
fn round_line_extension(
    network: &mut Network,
    baseline: &Baseline,
    continuous_s_nom: &[f64],
    threshold: f64,
) {
    for (i, line) in network.lines.iter_mut().enumerate() {
        if !baseline.extendable[i] {
            continue;
        }
        let ratio = (continuous_s_nom[i] / baseline.s_nom[i] - 1.0) * baseline.num_parallel[i];
        let added = round_circuits(ratio, threshold);
        let circuits = baseline.num_parallel[i] + added;
        line.s_nom = baseline.s_nom[i] * circuits / baseline.num_parallel[i];
        line.num_parallel = circuits;
        line.x = baseline.x[i] * baseline.num_parallel[i] / circuits;
        line.s_nom_extendable = false;
    }
}

/// Pre-loop snapshot of the mutable line quantities.
struct Baseline {
    x: Vec<f64>,
    s_nom: Vec<f64>,
    num_parallel: Vec<f64>,
    extendable: Vec<bool>,
}

impl Baseline {
    fn capture(network: &Network) -> Self {
        Self {
            x: network.lines.iter().map(|l| l.x).collect(),
            s_nom: network.lines.iter().map(|l| l.s_nom).collect(),
            num_parallel: network.lines.iter().map(|l| l.num_parallel).collect(),
            extendable: network.lines.iter().map(|l| l.s_nom_extendable).collect(),
        }
    }
}

/// Run the iterative LOPF. Returns the final outcome and the per-iteration
/// trace (objectives, capacities, reactances).
pub fn run_lopf_iterative(
    network: &mut Network,
    backend: &dyn SolverBackend,
    config: &LopfConfig,
) -> ExopfResult<(LopfOutcome, IterationTrace)> {
    if config.iterations == 0 {
        return Err(ExopfError::Config("iterations must be at least 1".into()));
    }
    let baseline = Baseline::capture(network);
    // shared across iterations: re-solves at an unchanged reactance
    // fingerprint skip the PTDF inversion
    let mut ptdf_cache = PtdfCache::new();
    let mut trace = IterationTrace::default();
    let mut outcome: Option<LopfOutcome> = None;
    let mut previous_objective = f64::INFINITY;

    for iteration in 1..=config.iterations {
        let solved = run_lopf_cached(network, backend, config, &mut ptdf_cache)?;

        trace.objectives.push(solved.objective);
        trace
            .capacities
            .push(network.lines.iter().map(|l| l.s_nom_opt).collect());
        trace
            .reactances
            .push(network.lines.iter().map(|l| l.x).collect());

        update_reactances(network, &baseline, config);

        let delta = (solved.objective - previous_objective).abs();
        debug!(iteration, objective = solved.objective, delta, "iterative LOPF step");
        previous_objective = solved.objective;
        outcome = Some(solved);

        if iteration > 1 && delta <= OBJECTIVE_TOLERANCE {
            info!(iteration, "iterative LOPF converged");
            break;
        }
    }

    let outcome = outcome.expect("at least one iteration ran");
    let outcome = if config.post_discretization {
        post_discretize(network, backend, config, &baseline, &trace, &mut ptdf_cache)?
    } else {
        outcome
    };

    Ok((outcome, trace))
}

/// Reactance update from the previous capacities.
fn update_reactances(network: &mut Network, baseline: &Baseline, config: &LopfConfig) {
    for (i, line) in network.lines.iter_mut().enumerate() {
        if !baseline.extendable[i] {
            continue;
        }
        if line.s_nom_opt <= S_NOM_ZERO {
            debug!(line = %line.name, "zero-capacity line, clamping reactance to sentinel");
            line.x = X_SENTINEL;
        } else if config.seq_discretization {
            let ratio =
                (line.s_nom_opt / baseline.s_nom[i] - 1.0) * baseline.num_parallel[i];
            let added = round_circuits(ratio, config.seq_discretization_threshold);
            line.x = baseline.x[i] * baseline.num_parallel[i]
                / (added + baseline.num_parallel[i]);
        } else {
            line.x = baseline.x[i] * baseline.s_nom[i] / line.s_nom_opt;
        }
    }
}

/// Threshold sweep: round the retained continuous capacities at each
/// candidate threshold, re-solve with capacity fixed, keep the best, and
/// finalize with it. Extendability flags are restored afterwards.
fn post_discretize(
    network: &mut Network,
    backend: &dyn SolverBackend,
    config: &LopfConfig,
    baseline: &Baseline,
    trace: &IterationTrace,
    ptdf_cache: &mut PtdfCache,
) -> ExopfResult<LopfOutcome> {
    if config.discretization_thresholds.is_empty() {
        return Err(ExopfError::Config(
            "post_discretization needs at least one threshold".into(),
        ));
    }
    let continuous_s_nom: Vec<f64> = trace
        .capacities
        .last()
        .cloned()
        .ok_or_else(|| ExopfError::Solver("no iteration recorded".into()))?;

    let mut best: Option<(f64, f64)> = None;
    for &threshold in &config.discretization_thresholds {
        round_line_extension(network, baseline, &continuous_s_nom, threshold);
        let solved = run_lopf_cached(network, backend, config, &mut *ptdf_cache)?;
        info!(threshold, objective = solved.objective, "post-discretization candidate");
        let better = best
            .map(|(objective, _)| solved.objective < objective)
            .unwrap_or(true);
        if better {
            best = Some((solved.objective, threshold));
        }
    }

    let (_, chosen) = best.expect("at least one threshold swept");
    info!(threshold = chosen, "post-discretization finalized");
    round_line_extension(network, baseline, &continuous_s_nom, chosen);
    let outcome = run_lopf_cached(network, backend, config, ptdf_cache)?;

    // rounded capacities stay written back; the extendability pattern of
    // the original network is restored
    for (i, line) in network.lines.iter_mut().enumerate() {
        line.s_nom_extendable = baseline.extendable[i];
    }
    Ok(outcome)
}
