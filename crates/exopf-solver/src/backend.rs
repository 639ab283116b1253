//! Backend trait and the lazy-cut solve loop.

use crate::model::{Cut, Model, Solution, SolveStatus};
use exopf_core::{ExopfError, ExopfResult};
use tracing::debug;

/// Options passed through to the backend.
#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Wall-clock limit in seconds.
    pub time_limit: Option<f64>,
    /// Relative MIP gap.
    pub mip_gap: Option<f64>,
    pub verbose: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            time_limit: None,
            mip_gap: None,
            verbose: false,
        }
    }
}

/// Upper bound on lazy-cut rounds. Benders terminates by emitting no cuts;
/// this guard only catches a callback that never converges.
const MAX_CUT_ROUNDS: usize = 10_000;

/// An LP/MIP backend.
///
/// Backends are interchangeable behind this trait; capability flags let the
/// runners fail fast when a formulation needs integrality or quadratic
/// constraints the backend cannot provide.
pub trait SolverBackend {
    fn name(&self) -> &str;

    fn supports_integrality(&self) -> bool;

    fn supports_quadratic(&self) -> bool {
        false
    }

    /// Solve the model as given. Must populate duals for pure LPs.
    fn solve(&self, model: &Model, options: &SolveOptions) -> ExopfResult<Solution>;

    /// Solve with a lazy-constraint callback.
    ///
    /// The callback observes each accepted integer incumbent and returns
    /// the cuts to append; an empty return accepts the incumbent and ends
    /// the solve. Backends without native incumbent callbacks use this
    /// default cut-loop emulation: solve to optimality, invoke the
    /// callback, append its cuts and re-solve.
    fn solve_with_lazy_cuts(
        &self,
        model: &mut Model,
        options: &SolveOptions,
        callback: &mut dyn FnMut(&Solution) -> ExopfResult<Vec<Cut>>,
    ) -> ExopfResult<Solution> {
        for round in 0..MAX_CUT_ROUNDS {
            let incumbent = self.solve(model, options)?;
            if !incumbent.is_optimal() {
                return Ok(incumbent);
            }
            let cuts = callback(&incumbent)?;
            if cuts.is_empty() {
                debug!(rounds = round + 1, "lazy cut loop converged");
                return Ok(incumbent);
            }
            debug!(round, added = cuts.len(), "appending lazy cuts");
            for cut in cuts {
                model.add_cut(cut);
            }
        }
        Err(ExopfError::Solver(format!(
            "lazy cut loop did not converge within {MAX_CUT_ROUNDS} rounds"
        )))
    }
}

/// Solve an elastic relaxation of `model` and return its solution.
///
/// Used to extract an infeasibility certificate: when the returned
/// objective (total violation) is positive, the relaxation's row duals
/// certify infeasibility of the original model.
pub fn solve_elastic(
    backend: &dyn SolverBackend,
    model: &Model,
    options: &SolveOptions,
) -> ExopfResult<Solution> {
    let relaxed = model.elastic();
    let solution = backend.solve(&relaxed, options)?;
    match solution.status {
        SolveStatus::Optimal => Ok(solution),
        status => Err(ExopfError::Solver(format!(
            "elastic relaxation not solvable: {status}"
        ))),
    }
}
