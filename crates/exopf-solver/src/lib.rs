//! # exopf-solver: Solver Abstraction
//!
//! An owned LP/MIP model representation with stable variable/constraint
//! handles and in-place right-hand-side mutation, a backend trait with
//! capability flags, a lazy-cut solve loop, and a HiGHS-backed default
//! backend.
//!
//! The model layer is deliberately decoupled from any vendor API: the
//! Benders driver keeps slave models alive across many cut rounds, pushing
//! new RHS values and re-reading duals against handles that never move.

pub mod backend;
pub mod highs_backend;
pub mod model;

pub use backend::{solve_elastic, SolveOptions, SolverBackend};
pub use highs_backend::HighsBackend;
pub use model::{
    ConId, Constraint, Cut, LinExpr, Model, ModelKind, QuadConstraint, QuadExpr, Relation,
    Solution, SolveStatus, VarDef, VarDomain, VarId,
};
