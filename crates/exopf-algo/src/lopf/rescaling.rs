//! Numeric preconditioning factors for constraint families.
//!
//! A factor multiplies both the coefficients and the right-hand side of
//! every row in its family, shrinking the numerical range the solver sees.
//! Feasibility and the optimum are unchanged. The default table is all
//! ones; `rescaling: true` selects the preconditioning preset.

/// Per-family rescaling factors. All strictly positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rescaling {
    /// Generator dispatch bound rows.
    pub bounds_g: f64,
    /// Line flow bound rows.
    pub bounds_ln: f64,
    /// Link dispatch bound rows.
    pub bounds_lk: f64,
    /// Flow-definition rows (angle couplings, cycle sums, PTDF rows).
    pub flows: f64,
    /// The availability-proxy renewable target row.
    pub approx_restarget: f64,
    /// Benders optimality and feasibility cut rows.
    pub benderscut: f64,
}

impl Default for Rescaling {
    fn default() -> Self {
        Self {
            bounds_g: 1.0,
            bounds_ln: 1.0,
            bounds_lk: 1.0,
            flows: 1.0,
            approx_restarget: 1.0,
            benderscut: 1.0,
        }
    }
}

impl Rescaling {
    /// The tuned preset used when rescaling is enabled.
    pub fn preconditioning() -> Self {
        Self {
            bounds_g: 1e-2,
            bounds_ln: 1e-2,
            bounds_lk: 1e-2,
            flows: 1e-1,
            approx_restarget: 1e-5,
            benderscut: 1e-6,
        }
    }

    pub fn from_config(enabled: bool) -> Self {
        if enabled {
            Self::preconditioning()
        } else {
            Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_identity() {
        let r = Rescaling::default();
        assert_eq!(r.bounds_g, 1.0);
        assert_eq!(r.benderscut, 1.0);
    }

    #[test]
    fn test_preset_is_positive() {
        let r = Rescaling::preconditioning();
        for f in [
            r.bounds_g,
            r.bounds_ln,
            r.bounds_lk,
            r.flows,
            r.approx_restarget,
            r.benderscut,
        ] {
            assert!(f > 0.0);
        }
    }
}
