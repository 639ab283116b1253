//! # exopf-algo: Expansion-aware LOPF
//!
//! Builds and solves the joint dispatch-plus-investment linear optimal
//! power flow over a [`exopf_core::Network`]:
//!
//! - [`lopf::run_lopf`]: monolithic solve, or lazy-constraint Benders
//!   decomposition when configured;
//! - [`lopf::run_lopf_iterative`]: fixed-point reactance loop with
//!   optional sequential/post discretization of integer line extensions;
//! - [`sparse`]: susceptance matrix and cached PTDF;
//! - [`cycles`]: fundamental cycle basis for the Kirchhoff formulations.

pub mod cycles;
pub mod lopf;
pub mod sparse;

pub use cycles::{cycle_basis, Cycle, CycleBasis};
pub use lopf::{
    run_lopf, run_lopf_cached, run_lopf_iterative, Decomposition, Formulation, InvestmentType,
    IterationTrace, LopfConfig, LopfOutcome,
};
pub use sparse::{compute_ptdf, PtdfCache, PtdfMatrix};
