//! Expansion-aware linear optimal power flow.
//!
//! Entry points:
//! - [`run_lopf`]: one solve (monolithic, or Benders when configured),
//!   solution written back into the network;
//! - [`run_lopf_iterative`]: the fixed-point reactance loop with optional
//!   sequential and post discretization of integer line extensions.
//!
//! The model assembly itself lives in [`builder`]; the runners parameterize
//! it by role and snapshot slice.

pub mod benders;
pub mod builder;
pub mod iterative;
pub mod monolithic;
pub mod rescaling;

pub use benders::run_benders;
pub use builder::{build_lopf_model, BuildParams, LopfModel, Role, SnapshotSlice};
pub use iterative::{run_lopf_iterative, IterationTrace};
pub use monolithic::{run_monolithic, LopfOutcome};
pub use rescaling::Rescaling;

use crate::sparse::PtdfCache;
use exopf_core::{ExopfError, ExopfResult, Network};
use exopf_solver::SolverBackend;
use serde::{Deserialize, Serialize};

/// Power-flow formulation of the linearized network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Formulation {
    /// Angle variables, linear flow-angle equality.
    #[default]
    AnglesLinear,
    /// Angle variables with big-M relaxed flow equalities per integer
    /// line-extension candidate.
    AnglesLinearIntegerBigm,
    /// Angle variables with the capacity-dependent susceptance kept as a
    /// bilinear product. Needs a quadratic-capable backend.
    AnglesBilinear,
    /// No angles; nodal balance plus cycle voltage-law rows.
    KirchhoffLinear,
    /// Cycle rows with capacity-dependent impedance weights (bilinear).
    KirchhoffBilinear,
    /// Flows tied to net injections through the PTDF matrix.
    Ptdf,
}

impl std::fmt::Display for Formulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Formulation::AnglesLinear => "angles_linear",
            Formulation::AnglesLinearIntegerBigm => "angles_linear_integer_bigm",
            Formulation::AnglesBilinear => "angles_bilinear",
            Formulation::KirchhoffLinear => "kirchhoff_linear",
            Formulation::KirchhoffBilinear => "kirchhoff_bilinear",
            Formulation::Ptdf => "ptdf",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for Formulation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "angles_linear" => Ok(Formulation::AnglesLinear),
            "angles_linear_integer_bigm" => Ok(Formulation::AnglesLinearIntegerBigm),
            "angles_bilinear" => Ok(Formulation::AnglesBilinear),
            "kirchhoff_linear" => Ok(Formulation::KirchhoffLinear),
            "kirchhoff_bilinear" => Ok(Formulation::KirchhoffBilinear),
            "ptdf" => Ok(Formulation::Ptdf),
            other => Err(format!("unknown formulation: {other}")),
        }
    }
}

impl Formulation {
    pub fn is_bilinear(&self) -> bool {
        matches!(
            self,
            Formulation::AnglesBilinear | Formulation::KirchhoffBilinear
        )
    }

    pub fn has_angles(&self) -> bool {
        matches!(
            self,
            Formulation::AnglesLinear
                | Formulation::AnglesLinearIntegerBigm
                | Formulation::AnglesBilinear
        )
    }
}

/// Integrality of the line-investment decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvestmentType {
    /// Continuous circuit additions.
    #[default]
    Continuous,
    /// Whole parallel circuits.
    Integer,
    /// Build-or-not switch with a minimum extension size (big-M).
    Binary,
    /// One binary selector per candidate circuit count (big-M flow
    /// relaxation, `angles_linear_integer_bigm` only).
    IntegerBigm,
}

impl std::fmt::Display for InvestmentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            InvestmentType::Continuous => "continuous",
            InvestmentType::Integer => "integer",
            InvestmentType::Binary => "binary",
            InvestmentType::IntegerBigm => "integer_bigm",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for InvestmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "continuous" => Ok(InvestmentType::Continuous),
            "integer" => Ok(InvestmentType::Integer),
            "binary" => Ok(InvestmentType::Binary),
            "integer_bigm" => Ok(InvestmentType::IntegerBigm),
            other => Err(format!("unknown investment type: {other}")),
        }
    }
}

impl InvestmentType {
    pub fn is_integral(&self) -> bool {
        !matches!(self, InvestmentType::Continuous)
    }
}

/// Decomposition applied above the builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decomposition {
    #[default]
    None,
    Benders,
}

impl std::str::FromStr for Decomposition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" => Ok(Decomposition::None),
            "benders" => Ok(Decomposition::Benders),
            other => Err(format!("unknown decomposition: {other}")),
        }
    }
}

/// Configuration of a LOPF run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LopfConfig {
    pub formulation: Formulation,
    pub investment_type: InvestmentType,
    pub rescaling: bool,
    pub blockmodel: bool,
    pub decomposition: Decomposition,

    // iterative runner
    pub iterations: usize,
    pub post_discretization: bool,
    pub seq_discretization: bool,
    pub seq_discretization_threshold: f64,
    pub discretization_thresholds: Vec<f64>,

    // Benders
    pub split_subproblems: bool,
    pub individualcuts: bool,
    pub tolerance: f64,
    pub mip_gap: f64,
    pub big_m: f64,
    pub update_x: bool,
}

impl Default for LopfConfig {
    fn default() -> Self {
        Self {
            formulation: Formulation::AnglesLinear,
            investment_type: InvestmentType::Continuous,
            rescaling: false,
            blockmodel: false,
            decomposition: Decomposition::None,
            iterations: 100,
            post_discretization: false,
            seq_discretization: false,
            seq_discretization_threshold: 0.3,
            discretization_thresholds: vec![0.2, 0.3],
            split_subproblems: false,
            individualcuts: false,
            tolerance: 100.0,
            mip_gap: 1e-8,
            big_m: 1e12,
            update_x: false,
        }
    }
}

impl LopfConfig {
    /// Fail fast on incompatible options, before any solver call.
    pub fn validate(
        &self,
        backend: &dyn SolverBackend,
        network: &Network,
    ) -> ExopfResult<()> {
        if self.investment_type == InvestmentType::IntegerBigm
            && self.formulation != Formulation::AnglesLinearIntegerBigm
        {
            return Err(ExopfError::Config(format!(
                "investment_type integer_bigm requires formulation angles_linear_integer_bigm, got {}",
                self.formulation
            )));
        }
        if self.formulation == Formulation::AnglesLinearIntegerBigm
            && self.investment_type != InvestmentType::IntegerBigm
        {
            return Err(ExopfError::Config(format!(
                "formulation angles_linear_integer_bigm requires investment_type integer_bigm, got {}",
                self.investment_type
            )));
        }
        if self.update_x && self.investment_type == InvestmentType::IntegerBigm {
            return Err(ExopfError::Config(
                "update_x is incompatible with integer_bigm investment".into(),
            ));
        }
        if self.blockmodel && self.decomposition != Decomposition::None {
            return Err(ExopfError::Config(
                "blockmodel cannot be combined with a decomposition".into(),
            ));
        }
        if self.formulation.is_bilinear() && !backend.supports_quadratic() {
            return Err(ExopfError::Config(format!(
                "formulation {} needs a nonlinear-capable backend; {} is linear only",
                self.formulation,
                backend.name()
            )));
        }
        if self.investment_type.is_integral() && !backend.supports_integrality() {
            return Err(ExopfError::Config(format!(
                "investment_type {} needs a MIP-capable backend",
                self.investment_type
            )));
        }
        if self.decomposition == Decomposition::Benders {
            if self.formulation.is_bilinear() {
                return Err(ExopfError::Config(
                    "Benders decomposition requires a linear formulation".into(),
                ));
            }
            if !network.storage_units.is_empty() || !network.stores.is_empty() {
                return Err(ExopfError::Unsupported(
                    "Benders decomposition does not support storage units or stores".into(),
                ));
            }
            if self.individualcuts && !self.split_subproblems {
                return Err(ExopfError::Config(
                    "individualcuts requires split_subproblems".into(),
                ));
            }
            if self.tolerance <= 0.0 {
                return Err(ExopfError::Config("tolerance must be positive".into()));
            }
        }
        Ok(())
    }
}

/// Build and solve one LOPF, writing the solution back into the network.
///
/// Dispatches to the Benders driver when configured; otherwise solves the
/// monolithic model. Uses a fresh PTDF cache; callers that re-solve in a
/// loop should use [`run_lopf_cached`] with a cache they own.
pub fn run_lopf(
    network: &mut Network,
    backend: &dyn SolverBackend,
    config: &LopfConfig,
) -> ExopfResult<LopfOutcome> {
    let mut ptdf_cache = PtdfCache::new();
    run_lopf_cached(network, backend, config, &mut ptdf_cache)
}

/// [`run_lopf`] with a caller-owned PTDF cache, so repeated solves against
/// unchanged topology and reactances reuse the factor matrix.
pub fn run_lopf_cached(
    network: &mut Network,
    backend: &dyn SolverBackend,
    config: &LopfConfig,
    ptdf_cache: &mut PtdfCache,
) -> ExopfResult<LopfOutcome> {
    let issues = network.validate();
    if !issues.is_empty() {
        return Err(ExopfError::Validation(issues.join("; ")));
    }
    config.validate(backend, network)?;

    match config.decomposition {
        Decomposition::None => {
            monolithic::run_monolithic(network, backend, config, ptdf_cache)
        }
        Decomposition::Benders => {
            benders::run_benders(network, backend, config, ptdf_cache)
        }
    }
}
