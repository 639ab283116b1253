//! Owned optimization model with stable handles.
//!
//! The model is a plain constraint store decoupled from any vendor API:
//! variables and constraints are appended to tables and addressed by
//! contiguous [`VarId`]/[`ConId`] handles that stay valid for the lifetime
//! of the model. Right-hand sides are mutable in place, which is what the
//! Benders driver needs to push master values into slave problems between
//! cut rounds.

use serde::{Deserialize, Serialize};

/// Handle to a variable. Stable and contiguous over the model lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarId(usize);

impl VarId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Handle to a linear constraint row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConId(usize);

impl ConId {
    #[inline]
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Variable domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarDomain {
    Continuous,
    Integer,
    Binary,
}

/// Constraint relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relation {
    Le,
    Ge,
    Eq,
}

/// What kind of problem the model is intended to become.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Lp,
    Mip,
    /// A model with annotated block structure (per-snapshot blocks).
    Block,
}

/// A linear expression `sum(coeff * var) + constant`.
#[derive(Debug, Clone, Default)]
pub struct LinExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-term expression.
    pub fn term(var: VarId, coeff: f64) -> Self {
        Self {
            terms: vec![(var, coeff)],
            constant: 0.0,
        }
    }

    /// Append a term in place.
    pub fn push(&mut self, var: VarId, coeff: f64) -> &mut Self {
        if coeff != 0.0 {
            self.terms.push((var, coeff));
        }
        self
    }

    pub fn add_constant(&mut self, value: f64) -> &mut Self {
        self.constant += value;
        self
    }

    /// Builder-style variant of [`LinExpr::push`].
    pub fn with(mut self, var: VarId, coeff: f64) -> Self {
        self.push(var, coeff);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluate against a dense value vector.
    pub fn value_in(&self, values: &[f64]) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|(v, c)| c * values[v.index()])
                .sum::<f64>()
    }
}

/// A quadratic expression: linear part plus `sum(coeff * var_a * var_b)`.
/// Only the bilinear formulations emit these; backends advertise support.
#[derive(Debug, Clone, Default)]
pub struct QuadExpr {
    pub lin: LinExpr,
    pub quad: Vec<(VarId, VarId, f64)>,
}

impl QuadExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bilinear(&mut self, a: VarId, b: VarId, coeff: f64) -> &mut Self {
        if coeff != 0.0 {
            self.quad.push((a, b, coeff));
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct VarDef {
    pub name: String,
    pub domain: VarDomain,
    pub lb: f64,
    pub ub: f64,
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub name: String,
    pub expr: LinExpr,
    pub relation: Relation,
    pub rhs: f64,
}

#[derive(Debug, Clone)]
pub struct QuadConstraint {
    pub name: String,
    pub expr: QuadExpr,
    pub relation: Relation,
    pub rhs: f64,
}

/// A cut emitted by a lazy-constraint callback.
#[derive(Debug, Clone)]
pub struct Cut {
    pub name: String,
    pub expr: LinExpr,
    pub relation: Relation,
    pub rhs: f64,
}

/// Solve status reported by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    TimeLimit,
    Error(String),
}

impl SolveStatus {
    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveStatus::Optimal)
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "optimal"),
            SolveStatus::Infeasible => write!(f, "infeasible"),
            SolveStatus::Unbounded => write!(f, "unbounded"),
            SolveStatus::TimeLimit => write!(f, "time limit"),
            SolveStatus::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

/// Primal (and, for pure LPs, dual) solution of a model.
#[derive(Debug, Clone)]
pub struct Solution {
    pub status: SolveStatus,
    pub objective: f64,
    /// Variable values, indexed by [`VarId`]. Empty unless optimal.
    pub values: Vec<f64>,
    /// Row duals with the d(objective)/d(rhs) sign convention, indexed by
    /// [`ConId`]. Empty for models with integrality.
    pub duals: Vec<f64>,
}

impl Solution {
    pub fn failed(status: SolveStatus) -> Self {
        Self {
            status,
            objective: f64::NAN,
            values: Vec::new(),
            duals: Vec::new(),
        }
    }

    pub fn value(&self, var: VarId) -> f64 {
        self.values[var.index()]
    }

    pub fn dual(&self, con: ConId) -> f64 {
        self.duals[con.index()]
    }

    pub fn has_duals(&self) -> bool {
        !self.duals.is_empty()
    }

    pub fn is_optimal(&self) -> bool {
        self.status.is_optimal()
    }
}

/// The owned model.
#[derive(Debug, Clone)]
pub struct Model {
    kind: ModelKind,
    vars: Vec<VarDef>,
    cons: Vec<Constraint>,
    quad_cons: Vec<QuadConstraint>,
    objective: LinExpr,
}

impl Model {
    pub fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            vars: Vec::new(),
            cons: Vec::new(),
            quad_cons: Vec::new(),
            objective: LinExpr::new(),
        }
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        domain: VarDomain,
        lb: f64,
        ub: f64,
    ) -> VarId {
        let id = VarId(self.vars.len());
        self.vars.push(VarDef {
            name: name.into(),
            domain,
            lb,
            ub,
        });
        id
    }

    /// Add `expr relation rhs`. A nonzero expression constant is folded
    /// into the right-hand side so rows stay in `a^T x (rel) b` form.
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        mut expr: LinExpr,
        relation: Relation,
        rhs: f64,
    ) -> ConId {
        let id = ConId(self.cons.len());
        let folded = rhs - expr.constant;
        expr.constant = 0.0;
        self.cons.push(Constraint {
            name: name.into(),
            expr,
            relation,
            rhs: folded,
        });
        id
    }

    pub fn add_cut(&mut self, cut: Cut) -> ConId {
        self.add_constraint(cut.name, cut.expr, cut.relation, cut.rhs)
    }

    pub fn add_quadratic_constraint(
        &mut self,
        name: impl Into<String>,
        expr: QuadExpr,
        relation: Relation,
        rhs: f64,
    ) {
        self.quad_cons.push(QuadConstraint {
            name: name.into(),
            expr,
            relation,
            rhs,
        });
    }

    /// Replace the right-hand side of a row in place; the handle stays valid.
    pub fn set_rhs(&mut self, con: ConId, rhs: f64) {
        self.cons[con.index()].rhs = rhs;
    }

    pub fn rhs(&self, con: ConId) -> f64 {
        self.cons[con.index()].rhs
    }

    /// Minimization objective; `expr.constant` is carried as an offset.
    pub fn set_objective(&mut self, expr: LinExpr) {
        self.objective = expr;
    }

    pub fn objective(&self) -> &LinExpr {
        &self.objective
    }

    pub fn variables(&self) -> &[VarDef] {
        &self.vars
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.cons
    }

    pub fn quadratic_constraints(&self) -> &[QuadConstraint] {
        &self.quad_cons
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_cons(&self) -> usize {
        self.cons.len()
    }

    pub fn has_integrality(&self) -> bool {
        self.vars
            .iter()
            .any(|v| !matches!(v.domain, VarDomain::Continuous))
    }

    pub fn is_quadratic(&self) -> bool {
        !self.quad_cons.is_empty()
    }

    /// Elastic relaxation: same rows with penalized nonnegative slacks and
    /// a minimize-total-violation objective. Row handles are preserved, so
    /// duals of the relaxation index the original constraints one to one.
    /// Integrality is dropped; the relaxation is always an LP.
    ///
    /// The relaxation is feasible by construction. If its optimum is
    /// positive the original model is infeasible and the row duals form a
    /// certificate usable for Benders feasibility cuts.
    pub fn elastic(&self) -> Model {
        let mut relaxed = Model::new(ModelKind::Lp);
        for def in &self.vars {
            relaxed.add_variable(def.name.clone(), VarDomain::Continuous, def.lb, def.ub);
        }
        let mut penalty = LinExpr::new();
        for (i, con) in self.cons.iter().enumerate() {
            let mut expr = con.expr.clone();
            match con.relation {
                Relation::Le => {
                    let s = relaxed.add_variable(
                        format!("elastic_dn_{i}"),
                        VarDomain::Continuous,
                        0.0,
                        f64::INFINITY,
                    );
                    expr.push(s, -1.0);
                    penalty.push(s, 1.0);
                }
                Relation::Ge => {
                    let s = relaxed.add_variable(
                        format!("elastic_up_{i}"),
                        VarDomain::Continuous,
                        0.0,
                        f64::INFINITY,
                    );
                    expr.push(s, 1.0);
                    penalty.push(s, 1.0);
                }
                Relation::Eq => {
                    let up = relaxed.add_variable(
                        format!("elastic_up_{i}"),
                        VarDomain::Continuous,
                        0.0,
                        f64::INFINITY,
                    );
                    let dn = relaxed.add_variable(
                        format!("elastic_dn_{i}"),
                        VarDomain::Continuous,
                        0.0,
                        f64::INFINITY,
                    );
                    expr.push(up, 1.0);
                    expr.push(dn, -1.0);
                    penalty.push(up, 1.0);
                    penalty.push(dn, 1.0);
                }
            }
            relaxed.add_constraint(con.name.clone(), expr, con.relation, con.rhs);
        }
        relaxed.set_objective(penalty);
        relaxed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_contiguous() {
        let mut m = Model::new(ModelKind::Lp);
        let x = m.add_variable("x", VarDomain::Continuous, 0.0, 10.0);
        let y = m.add_variable("y", VarDomain::Continuous, 0.0, 10.0);
        assert_eq!(x.index(), 0);
        assert_eq!(y.index(), 1);

        let c = m.add_constraint(
            "c",
            LinExpr::term(x, 1.0).with(y, 2.0),
            Relation::Le,
            5.0,
        );
        assert_eq!(c.index(), 0);
        assert_eq!(m.rhs(c), 5.0);
        m.set_rhs(c, 7.0);
        assert_eq!(m.rhs(c), 7.0);
    }

    #[test]
    fn test_constant_folded_into_rhs() {
        let mut m = Model::new(ModelKind::Lp);
        let x = m.add_variable("x", VarDomain::Continuous, 0.0, 10.0);
        let mut expr = LinExpr::term(x, 1.0);
        expr.add_constant(3.0);
        let c = m.add_constraint("c", expr, Relation::Le, 5.0);
        assert_eq!(m.rhs(c), 2.0);
        assert_eq!(m.constraints()[0].expr.constant, 0.0);
    }

    #[test]
    fn test_integrality_detection() {
        let mut m = Model::new(ModelKind::Mip);
        m.add_variable("x", VarDomain::Continuous, 0.0, 1.0);
        assert!(!m.has_integrality());
        m.add_variable("z", VarDomain::Binary, 0.0, 1.0);
        assert!(m.has_integrality());
    }

    #[test]
    fn test_elastic_preserves_row_handles() {
        let mut m = Model::new(ModelKind::Lp);
        let x = m.add_variable("x", VarDomain::Continuous, 0.0, 10.0);
        m.add_constraint("lo", LinExpr::term(x, 1.0), Relation::Ge, 5.0);
        m.add_constraint("hi", LinExpr::term(x, 1.0), Relation::Le, 3.0);

        let relaxed = m.elastic();
        assert_eq!(relaxed.num_cons(), m.num_cons());
        assert_eq!(relaxed.constraints()[0].name, "lo");
        assert_eq!(relaxed.constraints()[1].name, "hi");
        // one slack per inequality row
        assert_eq!(relaxed.num_vars(), m.num_vars() + 2);
        assert!(!relaxed.has_integrality());
    }

    #[test]
    fn test_expr_value_in() {
        let mut m = Model::new(ModelKind::Lp);
        let x = m.add_variable("x", VarDomain::Continuous, 0.0, 10.0);
        let y = m.add_variable("y", VarDomain::Continuous, 0.0, 10.0);
        let expr = LinExpr::term(x, 2.0).with(y, -1.0);
        assert_eq!(expr.value_in(&[3.0, 4.0]), 2.0);
    }
}
