//! Snapshot-indexed attributes.
//!
//! Several component attributes (`p_max_pu`, `p_min_pu`, inflow) are either
//! a scalar that applies to every snapshot or a full per-snapshot series.

use serde::{Deserialize, Serialize};

/// A scalar-or-per-snapshot attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSeries {
    /// One value for every snapshot.
    Static(f64),
    /// One value per snapshot, indexed by snapshot position.
    Varying(Vec<f64>),
}

impl TimeSeries {
    /// Value at snapshot `t`. A varying series is indexed directly; callers
    /// are expected to have validated the series length against the horizon.
    pub fn at(&self, t: usize) -> f64 {
        match self {
            TimeSeries::Static(v) => *v,
            TimeSeries::Varying(values) => values[t],
        }
    }

    /// Length check against the snapshot horizon.
    pub fn matches_horizon(&self, n_snapshots: usize) -> bool {
        match self {
            TimeSeries::Static(_) => true,
            TimeSeries::Varying(values) => values.len() == n_snapshots,
        }
    }
}

impl Default for TimeSeries {
    fn default() -> Self {
        TimeSeries::Static(0.0)
    }
}

impl From<f64> for TimeSeries {
    fn from(v: f64) -> Self {
        TimeSeries::Static(v)
    }
}

impl From<Vec<f64>> for TimeSeries {
    fn from(values: Vec<f64>) -> Self {
        TimeSeries::Varying(values)
    }
}
