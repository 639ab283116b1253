//! Power Transfer Distribution Factors.
//!
//! `PTDF[l,n]` is the sensitivity of flow on line `l` to a net injection at
//! bus `n` (balanced at the slack). It is computed from the reduced nodal
//! susceptance matrix:
//!
//! 1. build B' and drop the slack row/column (slack = bus index 0),
//! 2. invert the reduced matrix with dense partial-pivot LU,
//! 3. extend the inverse with zeros on the slack row/column,
//! 4. `PTDF[l,n] = (X[i,n] - X[j,n]) / x_pu_l` for line `l` from `i` to `j`.
//!
//! The matrix is a function of topology and reactances only, so it is
//! cached keyed by a fingerprint of (bus count, line endpoints, x_pu bits);
//! reactance updates from the iterative loop change the fingerprint and
//! invalidate the entry.

use super::susceptance::{SusceptanceError, SusceptanceMatrix};
use exopf_core::{ExopfResult, Network};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use thiserror::Error;
use tracing::debug;

/// Errors from PTDF computation.
#[derive(Debug, Error)]
pub enum PtdfError {
    #[error("susceptance matrix error: {0}")]
    Susceptance(#[from] SusceptanceError),

    #[error("network must have at least 2 buses")]
    TooFewBuses,

    #[error("nodal susceptance matrix is singular (islanded network?)")]
    Singular,
}

/// Dense PTDF matrix, rows = line table order, columns = bus table order.
#[derive(Debug, Clone)]
pub struct PtdfMatrix {
    values: Vec<Vec<f64>>,
    fingerprint: u64,
}

impl PtdfMatrix {
    pub fn get(&self, line_idx: usize, bus_idx: usize) -> f64 {
        self.values[line_idx][bus_idx]
    }

    pub fn num_lines(&self) -> usize {
        self.values.len()
    }

    pub fn num_buses(&self) -> usize {
        self.values.first().map(|row| row.len()).unwrap_or(0)
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Row of factors for one line.
    pub fn row(&self, line_idx: usize) -> &[f64] {
        &self.values[line_idx]
    }
}

/// Fingerprint of the quantities PTDF depends on.
pub fn topology_fingerprint(network: &Network, x_pu: &[f64]) -> u64 {
    let mut hasher = DefaultHasher::new();
    network.buses.len().hash(&mut hasher);
    for line in &network.lines {
        line.bus0.hash(&mut hasher);
        line.bus1.hash(&mut hasher);
    }
    for x in x_pu {
        x.to_bits().hash(&mut hasher);
    }
    hasher.finish()
}

/// Compute the PTDF matrix for the current reactances.
pub fn compute_ptdf(network: &Network, x_pu: &[f64]) -> Result<PtdfMatrix, PtdfError> {
    let n_bus = network.buses.len();
    if n_bus < 2 {
        return Err(PtdfError::TooFewBuses);
    }

    let susceptance = SusceptanceMatrix::from_network(network, x_pu)?;
    let slack = susceptance.slack_idx();

    let reduced = susceptance.reduced_dense();
    let inverse = lu_inverse(&reduced).ok_or(PtdfError::Singular)?;

    // Extend back to full bus dimension; slack row/column stays zero.
    let mut extended = vec![vec![0.0; n_bus]; n_bus];
    let full_of_reduced: Vec<usize> = (0..n_bus).filter(|&i| i != slack).collect();
    for (ri, &fi) in full_of_reduced.iter().enumerate() {
        for (rj, &fj) in full_of_reduced.iter().enumerate() {
            extended[fi][fj] = inverse[ri][rj];
        }
    }

    let bus_index = network.bus_index_map();
    let mut values = vec![vec![0.0; n_bus]; network.lines.len()];
    for (line_idx, (line, &x)) in network.lines.iter().zip(x_pu.iter()).enumerate() {
        let i = bus_index[&line.bus0];
        let j = bus_index[&line.bus1];
        for n in 0..n_bus {
            values[line_idx][n] = (extended[i][n] - extended[j][n]) / x;
        }
    }

    Ok(PtdfMatrix {
        values,
        fingerprint: topology_fingerprint(network, x_pu),
    })
}

/// Single-entry PTDF cache, invalidated by fingerprint mismatch.
#[derive(Debug, Default)]
pub struct PtdfCache {
    entry: Option<PtdfMatrix>,
}

impl PtdfCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached matrix for the network's current reactances, recomputing on
    /// topology or reactance change.
    pub fn get_or_compute(&mut self, network: &Network) -> ExopfResult<&PtdfMatrix> {
        let x_pu = network.x_pu_vector()?;
        let fingerprint = topology_fingerprint(network, &x_pu);
        let stale = self
            .entry
            .as_ref()
            .map(|m| m.fingerprint() != fingerprint)
            .unwrap_or(true);
        if stale {
            debug!(fingerprint, "recomputing PTDF");
            let matrix = compute_ptdf(network, &x_pu)
                .map_err(|e| exopf_core::ExopfError::Validation(e.to_string()))?;
            self.entry = Some(matrix);
        }
        Ok(self.entry.as_ref().expect("entry just populated"))
    }
}

/// Dense matrix inverse via LU decomposition with partial pivoting.
/// Returns `None` for a singular matrix.
fn lu_inverse(a: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    if n == 0 {
        return Some(Vec::new());
    }

    let mut lu: Vec<Vec<f64>> = a.to_vec();
    let mut perm: Vec<usize> = (0..n).collect();

    for k in 0..n {
        let mut pivot_row = k;
        let mut pivot_val = lu[k][k].abs();
        for row in (k + 1)..n {
            if lu[row][k].abs() > pivot_val {
                pivot_val = lu[row][k].abs();
                pivot_row = row;
            }
        }
        if pivot_val < 1e-12 {
            return None;
        }
        if pivot_row != k {
            lu.swap(k, pivot_row);
            perm.swap(k, pivot_row);
        }
        for row in (k + 1)..n {
            lu[row][k] /= lu[k][k];
            let factor = lu[row][k];
            for col in (k + 1)..n {
                lu[row][col] -= factor * lu[k][col];
            }
        }
    }

    let mut inverse = vec![vec![0.0; n]; n];
    for col in 0..n {
        // permuted identity column
        let mut rhs = vec![0.0; n];
        for (i, &p) in perm.iter().enumerate() {
            if p == col {
                rhs[i] = 1.0;
            }
        }

        // forward substitution, L y = rhs
        let mut y = vec![0.0; n];
        for i in 0..n {
            y[i] = rhs[i];
            for j in 0..i {
                y[i] -= lu[i][j] * y[j];
            }
        }

        // back substitution, U x = y
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            x[i] = y[i];
            for j in (i + 1)..n {
                x[i] -= lu[i][j] * x[j];
            }
            x[i] /= lu[i][i];
        }

        for i in 0..n {
            inverse[i][col] = x[i];
        }
    }

    Some(inverse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use exopf_core::{Bus, BusId, Line, LineId, Snapshot};

    fn triangle() -> Network {
        let mut network = Network::new("triangle");
        network.s_base = 100.0;
        network.snapshots = vec![Snapshot::new(1.0)];
        for i in 0..3 {
            // v_nom chosen so x_pu == x
            network
                .buses
                .push(Bus::new(BusId::new(i), format!("b{i}"), 10.0));
        }
        let defs = [(0usize, 1usize, 0.1), (1, 2, 0.1), (0, 2, 0.2)];
        for (idx, (a, b, x)) in defs.iter().enumerate() {
            network.lines.push(Line::new(
                LineId::new(idx),
                format!("l{idx}"),
                format!("b{a}"),
                format!("b{b}"),
                *x,
                100.0,
            ));
        }
        network
    }

    #[test]
    fn test_lu_inverse_identity() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let inv = lu_inverse(&a).unwrap();
        // a * inv = I
        for i in 0..2 {
            for j in 0..2 {
                let v: f64 = (0..2).map(|k| a[i][k] * inv[k][j]).sum();
                let expect = if i == j { 1.0 } else { 0.0 };
                assert!((v - expect).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_lu_inverse_singular() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(lu_inverse(&a).is_none());
    }

    #[test]
    fn test_ptdf_slack_column_zero() {
        let network = triangle();
        let x_pu = network.x_pu_vector().unwrap();
        let ptdf = compute_ptdf(&network, &x_pu).unwrap();
        for l in 0..ptdf.num_lines() {
            assert!(ptdf.get(l, 0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_ptdf_triangle_split() {
        // Injection at b1 withdrawn at slack b0: the two parallel paths
        // b1->b0 (x=0.1) and b1->b2->b0 (x=0.1+0.2) split 3:1.
        let network = triangle();
        let x_pu = network.x_pu_vector().unwrap();
        let ptdf = compute_ptdf(&network, &x_pu).unwrap();

        // line 0 is b0->b1, so flow towards b0 is negative
        assert!((ptdf.get(0, 1) + 0.75).abs() < 1e-9);
        // line 1 (b1->b2) carries the remaining quarter
        assert!((ptdf.get(1, 1) - 0.25).abs() < 1e-9);
        // line 2 (b0->b2) carries it back to the slack
        assert!((ptdf.get(2, 1) + 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_cache_invalidation_on_reactance_change() {
        let mut network = triangle();
        let mut cache = PtdfCache::new();
        let fp1 = cache.get_or_compute(&network).unwrap().fingerprint();
        let fp_again = cache.get_or_compute(&network).unwrap().fingerprint();
        assert_eq!(fp1, fp_again);

        network.lines[0].x *= 2.0;
        let fp2 = cache.get_or_compute(&network).unwrap().fingerprint();
        assert_ne!(fp1, fp2);
    }
}
