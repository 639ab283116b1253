//! Sparse derived quantities of the linearized network.

pub mod ptdf;
pub mod susceptance;

pub use ptdf::{compute_ptdf, topology_fingerprint, PtdfCache, PtdfError, PtdfMatrix};
pub use susceptance::{SusceptanceError, SusceptanceMatrix};
