//! Sparse nodal susceptance matrix (B') for the linearized network.
//!
//! ```text
//! B'[i,j] = -b_ij        for i != j (off-diagonal = -susceptance)
//! B'[i,i] = sum_k b_ik   (diagonal = sum of connected susceptances)
//! ```
//!
//! Susceptances are per-unit, `b = 1 / x_pu`. The slack bus is the first
//! bus of the network table; the reduced matrix removes its row and column.

use exopf_core::Network;
use sprs::{CsMat, TriMat};
use thiserror::Error;

/// Errors from susceptance matrix assembly.
#[derive(Debug, Error)]
pub enum SusceptanceError {
    #[error("network has no buses")]
    NoBuses,

    #[error("network has no lines")]
    NoLines,

    #[error("line {0} has zero or near-zero per-unit reactance")]
    ZeroReactance(String),

    #[error("line {0} references unknown bus {1}")]
    UnknownBus(String, String),
}

/// Sparse B' matrix in CSR format, bus order = network table order.
#[derive(Debug, Clone)]
pub struct SusceptanceMatrix {
    matrix: CsMat<f64>,
    n_bus: usize,
    slack_idx: usize,
}

impl SusceptanceMatrix {
    /// Assemble B' from per-unit line reactances. `x_pu` is indexed like
    /// the line table; the first bus is the slack.
    pub fn from_network(network: &Network, x_pu: &[f64]) -> Result<Self, SusceptanceError> {
        let n = network.buses.len();
        if n == 0 {
            return Err(SusceptanceError::NoBuses);
        }
        if network.lines.is_empty() {
            return Err(SusceptanceError::NoLines);
        }

        let bus_index = network.bus_index_map();
        let mut triplets = TriMat::new((n, n));
        for (line, &x) in network.lines.iter().zip(x_pu.iter()) {
            if x.abs() < 1e-12 {
                return Err(SusceptanceError::ZeroReactance(line.name.clone()));
            }
            let b = 1.0 / x;
            let i = *bus_index.get(&line.bus0).ok_or_else(|| {
                SusceptanceError::UnknownBus(line.name.clone(), line.bus0.clone())
            })?;
            let j = *bus_index.get(&line.bus1).ok_or_else(|| {
                SusceptanceError::UnknownBus(line.name.clone(), line.bus1.clone())
            })?;

            triplets.add_triplet(i, j, -b);
            triplets.add_triplet(j, i, -b);
            triplets.add_triplet(i, i, b);
            triplets.add_triplet(j, j, b);
        }

        Ok(Self {
            matrix: triplets.to_csr(),
            n_bus: n,
            slack_idx: 0,
        })
    }

    pub fn n_bus(&self) -> usize {
        self.n_bus
    }

    pub fn slack_idx(&self) -> usize {
        self.slack_idx
    }

    /// Element B'[i,j].
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix.get(i, j).copied().unwrap_or(0.0)
    }

    /// Dense reduced matrix with the slack row and column removed.
    ///
    /// The PTDF computation inverts this; (n-1)^2 dense storage is fine at
    /// transmission-network sizes.
    pub fn reduced_dense(&self) -> Vec<Vec<f64>> {
        let m = self.n_bus - 1;
        let mut dense = vec![vec![0.0; m]; m];
        for (value, (i, j)) in self.matrix.iter() {
            if i == self.slack_idx || j == self.slack_idx {
                continue;
            }
            let ri = if i > self.slack_idx { i - 1 } else { i };
            let rj = if j > self.slack_idx { j - 1 } else { j };
            dense[ri][rj] += *value;
        }
        dense
    }
}
