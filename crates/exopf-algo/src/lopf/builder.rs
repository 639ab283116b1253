//! Role-gated assembly of the LOPF optimization model.
//!
//! One builder serves the monolithic model, the Benders master and the
//! Benders slaves. Instead of branching on the role throughout, every
//! emission site consults a [`RolePolicy`] saying which variable and
//! constraint families exist in this model:
//!
//! | role       | investment | operation | alpha |
//! |------------|------------|-----------|-------|
//! | monolithic | yes        | yes       | no    |
//! | master     | yes        | no        | yes   |
//! | slave      | no         | yes       | no    |
//!
//! Slave models additionally register every constraint whose right-hand
//! side depends on a master variable in a contiguous coupled-constraint
//! table, so the Benders driver can push incumbent values and assemble
//! cuts as plain array operations.

use super::rescaling::Rescaling;
use super::{Formulation, InvestmentType, LopfConfig};
use crate::cycles::{cycle_basis, CycleBasis};
use crate::sparse::PtdfCache;
use exopf_core::{ExopfError, ExopfResult, Network};
use exopf_solver::{ConId, LinExpr, Model, ModelKind, QuadExpr, Relation, VarDomain, VarId};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Decomposition role of the model being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Monolithic,
    Master,
    Slave,
}

/// Which families a role emits.
#[derive(Debug, Clone, Copy)]
pub struct RolePolicy {
    pub investment: bool,
    pub operation: bool,
    pub alpha: bool,
}

impl Role {
    pub fn policy(self) -> RolePolicy {
        match self {
            Role::Monolithic => RolePolicy {
                investment: true,
                operation: true,
                alpha: false,
            },
            Role::Master => RolePolicy {
                investment: true,
                operation: false,
                alpha: true,
            },
            Role::Slave => RolePolicy {
                investment: false,
                operation: true,
                alpha: false,
            },
        }
    }
}

/// Snapshot coverage of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSlice {
    All,
    Single(usize),
}

impl SnapshotSlice {
    pub fn indices(&self, n_snapshots: usize) -> Vec<usize> {
        match self {
            SnapshotSlice::All => (0..n_snapshots).collect(),
            SnapshotSlice::Single(t) => vec![*t],
        }
    }
}

/// Build parameters beyond the configuration.
#[derive(Debug, Clone, Copy)]
pub struct BuildParams {
    pub role: Role,
    pub slice: SnapshotSlice,
    /// Number of ALPHA cut groups (master role only).
    pub n_groups: usize,
}

/// Fixed-first permutation of a component table.
///
/// `order[pos]` is the original table index of the component at builder
/// position `pos`; positions `>= n_fixed` are the extendable subset, so the
/// extendable position is simply `pos - n_fixed` and variable vectors built
/// fixed-first stay contiguous.
#[derive(Debug, Clone, Default)]
pub struct ComponentOrder {
    order: Vec<usize>,
    inverse: Vec<usize>,
    n_fixed: usize,
}

impl ComponentOrder {
    pub fn partition(n: usize, is_extendable: impl Fn(usize) -> bool) -> Self {
        let mut order: Vec<usize> = (0..n).filter(|&i| !is_extendable(i)).collect();
        let n_fixed = order.len();
        order.extend((0..n).filter(|&i| is_extendable(i)));
        let mut inverse = vec![0; n];
        for (pos, &orig) in order.iter().enumerate() {
            inverse[orig] = pos;
        }
        Self {
            order,
            inverse,
            n_fixed,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn n_fixed(&self) -> usize {
        self.n_fixed
    }

    pub fn n_ext(&self) -> usize {
        self.order.len() - self.n_fixed
    }

    /// Original table index at builder position `pos`.
    pub fn original(&self, pos: usize) -> usize {
        self.order[pos]
    }

    /// Builder position of original table index `orig`.
    pub fn position_of(&self, orig: usize) -> usize {
        self.inverse[orig]
    }

    pub fn is_extendable(&self, pos: usize) -> bool {
        pos >= self.n_fixed
    }

    /// Extendable-subset index of a builder position, if extendable.
    pub fn ext_index(&self, pos: usize) -> Option<usize> {
        if pos >= self.n_fixed {
            Some(pos - self.n_fixed)
        } else {
            None
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.order.iter().copied().enumerate()
    }
}

/// A master variable referenced by a slave coupled constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterVar {
    /// `G_p_nom` of extendable generator (ext index).
    GenNom(usize),
    /// `LN_s_nom` of extendable line (ext index).
    LineNom(usize),
    /// `LK_p_nom` of extendable link (ext index).
    LinkNom(usize),
    /// `LN_opt[line, candidate]` selector (ext index, candidate position).
    LineCand(usize, usize),
}

/// A slave constraint whose RHS is a function of one master variable:
/// `rhs = scale * (coeff * value(master) + offset)`.
#[derive(Debug, Clone, Copy)]
pub struct CoupledRhs {
    pub con: ConId,
    pub master: MasterVar,
    pub coeff: f64,
    pub offset: f64,
    pub scale: f64,
}

/// Variable handle tables, snapshot-major for operation variables.
#[derive(Debug, Clone, Default)]
pub struct VarTables {
    // investment (indexed by extendable-subset position)
    pub gen_p_nom: Vec<VarId>,
    pub line_s_nom: Vec<VarId>,
    pub line_inv: Vec<VarId>,
    pub line_opt: Vec<VarId>,
    pub line_opt_cand: Vec<Vec<VarId>>,
    pub link_p_nom: Vec<VarId>,
    pub su_p_nom: Vec<VarId>,
    pub store_e_nom: Vec<VarId>,
    /// Optimistic slave value per cut group (master only).
    pub alpha: Vec<VarId>,
    // operation `[slice position][component position]`
    pub gen_p: Vec<Vec<VarId>>,
    pub line_p: Vec<Vec<VarId>>,
    pub link_p: Vec<Vec<VarId>>,
    pub su_dispatch: Vec<Vec<VarId>>,
    pub su_store: Vec<Vec<VarId>>,
    pub su_soc: Vec<Vec<VarId>>,
    pub su_spill: Vec<Vec<VarId>>,
    pub st_dispatch: Vec<Vec<VarId>>,
    pub st_store: Vec<Vec<VarId>>,
    pub st_soc: Vec<Vec<VarId>>,
    pub st_spill: Vec<Vec<VarId>>,
    pub theta: Vec<Vec<VarId>>,
    /// Net-injection variables (`ptdf` formulation).
    pub injection: Vec<Vec<VarId>>,
    /// Effective-flow auxiliaries for extendable lines
    /// (`kirchhoff_bilinear`), indexed `[slice position][ext position]`.
    pub line_eff: Vec<Vec<VarId>>,
}

/// The assembled model plus every index table the runners need.
#[derive(Debug)]
pub struct LopfModel {
    pub model: Model,
    pub role: Role,
    pub slice: SnapshotSlice,
    pub snapshot_indices: Vec<usize>,
    pub gens: ComponentOrder,
    pub lines: ComponentOrder,
    pub links: ComponentOrder,
    pub storage_units: ComponentOrder,
    pub stores: ComponentOrder,
    pub vars: VarTables,
    /// Nodal balance rows `[slice position][bus]`; their duals are the
    /// marginal prices.
    pub balance: Vec<Vec<ConId>>,
    /// Slave coupled-constraint table (empty otherwise).
    pub coupled: Vec<CoupledRhs>,
    /// Integer big-M candidate circuit counts per extendable line.
    pub candidates: Vec<Vec<usize>>,
    pub n_groups: usize,
}

impl LopfModel {
    pub fn policy(&self) -> RolePolicy {
        self.role.policy()
    }

    /// Row indices of the coupled constraints, for skipping them when the
    /// cut constant sums `dual * rhs` over uncoupled rows.
    pub fn coupled_row_set(&self) -> HashSet<usize> {
        self.coupled.iter().map(|c| c.con.index()).collect()
    }
}

/// Candidate parallel-circuit additions `{0, .., C}` for one extendable
/// line, `C = floor((s_nom_max / s_nom - 1) * num_parallel)`.
pub fn line_candidates(line: &exopf_core::Line) -> ExopfResult<Vec<usize>> {
    if line.s_nom <= 0.0 {
        return Err(ExopfError::Config(format!(
            "line {}: integer big-M candidates need s_nom > 0",
            line.name
        )));
    }
    if !line.s_nom_max.is_finite() {
        return Err(ExopfError::Config(format!(
            "line {}: integer big-M candidates need a finite s_nom_max",
            line.name
        )));
    }
    let top = ((line.s_nom_max / line.s_nom - 1.0) * line.num_parallel).floor();
    let top = top.max(0.0) as usize;
    Ok((0..=top).collect())
}

/// Assemble a model for `(network, config, role, slice)`.
///
/// `ptdf_cache` is consulted (and filled) only by the `ptdf` formulation;
/// the caller owns it so repeated builds against unchanged reactances
/// (Benders slaves, converged iterative re-solves) skip the matrix
/// inversion.
pub fn build_lopf_model(
    network: &Network,
    config: &LopfConfig,
    params: BuildParams,
    ptdf_cache: &mut PtdfCache,
) -> ExopfResult<LopfModel> {
    let policy = params.role.policy();
    let n_snapshots = network.snapshot_count();

    if let SnapshotSlice::Single(t) = params.slice {
        if params.role != Role::Slave {
            return Err(ExopfError::Config(
                "single-snapshot slices are only valid for slave models".into(),
            ));
        }
        if t >= n_snapshots {
            return Err(ExopfError::Config(format!(
                "snapshot {t} out of range ({n_snapshots} snapshots)"
            )));
        }
    }
    if policy.alpha && params.n_groups == 0 {
        return Err(ExopfError::Config("master needs at least one cut group".into()));
    }

    let commitable = network.generators.iter().filter(|g| g.commitable).count();
    if commitable > 0 {
        warn!(
            commitable,
            "unit commitment is not implemented; commitable generators are dispatched as ordinary units"
        );
    }

    let mut b = Builder::new(network, config, params, ptdf_cache)?;
    b.add_investment_variables()?;
    b.add_alpha();
    b.add_operation_variables();
    b.add_capacity_bounds();
    b.add_storage_recurrences();
    b.add_flow_constraints()?;
    b.add_global_constraints();
    b.set_objective();
    Ok(b.finish())
}

/// Internal builder state.
struct Builder<'a> {
    network: &'a Network,
    config: &'a LopfConfig,
    ptdf_cache: &'a mut PtdfCache,
    role: Role,
    policy: RolePolicy,
    slice: SnapshotSlice,
    n_groups: usize,
    scale: Rescaling,
    t_indices: Vec<usize>,
    bus_index: HashMap<String, usize>,
    x_pu: Vec<f64>,
    gens: ComponentOrder,
    lines: ComponentOrder,
    links: ComponentOrder,
    storage_units: ComponentOrder,
    stores: ComponentOrder,
    candidates: Vec<Vec<usize>>,
    model: Model,
    vars: VarTables,
    balance: Vec<Vec<ConId>>,
    coupled: Vec<CoupledRhs>,
}

impl<'a> Builder<'a> {
    fn new(
        network: &'a Network,
        config: &'a LopfConfig,
        params: BuildParams,
        ptdf_cache: &'a mut PtdfCache,
    ) -> ExopfResult<Self> {
        let policy = params.role.policy();
        let t_indices = params.slice.indices(network.snapshot_count());
        let x_pu = network.x_pu_vector()?;

        let gens = ComponentOrder::partition(network.generators.len(), |i| {
            network.generators[i].p_nom_extendable
        });
        let lines = ComponentOrder::partition(network.lines.len(), |i| {
            network.lines[i].s_nom_extendable
        });
        let links =
            ComponentOrder::partition(network.links.len(), |i| network.links[i].p_nom_extendable);
        let storage_units = ComponentOrder::partition(network.storage_units.len(), |i| {
            network.storage_units[i].p_nom_extendable
        });
        let stores = ComponentOrder::partition(network.stores.len(), |i| {
            network.stores[i].e_nom_extendable
        });

        let candidates = if config.investment_type == InvestmentType::IntegerBigm {
            if lines.n_ext() == 0 {
                warn!("integer big-M investment with no extendable lines");
            }
            (0..lines.n_ext())
                .map(|e| line_candidates(&network.lines[lines.original(lines.n_fixed() + e)]))
                .collect::<ExopfResult<Vec<_>>>()?
        } else {
            if config.investment_type.is_integral() && lines.n_ext() == 0 {
                warn!(
                    investment_type = %config.investment_type,
                    "integral line investment with no extendable lines"
                );
            }
            Vec::new()
        };

        let has_integrality =
            policy.investment && config.investment_type.is_integral() && lines.n_ext() > 0;
        let kind = if config.blockmodel {
            ModelKind::Block
        } else if has_integrality {
            ModelKind::Mip
        } else {
            ModelKind::Lp
        };

        Ok(Self {
            bus_index: network.bus_index_map(),
            network,
            config,
            ptdf_cache,
            role: params.role,
            policy,
            slice: params.slice,
            n_groups: params.n_groups,
            scale: Rescaling::from_config(config.rescaling),
            t_indices,
            x_pu,
            gens,
            lines,
            links,
            storage_units,
            stores,
            candidates,
            model: Model::new(kind),
            vars: VarTables::default(),
            balance: Vec::new(),
            coupled: Vec::new(),
        })
    }

    fn weighting(&self, t: usize) -> f64 {
        self.network.snapshots[t].weighting
    }

    /// Demand at a bus in a snapshot.
    fn load_at(&self, bus: usize, t: usize) -> f64 {
        let name = &self.network.buses[bus].name;
        self.network
            .loads
            .iter()
            .filter(|l| &l.bus == name)
            .map(|l| l.p[t])
            .sum()
    }

    // ----- variables ------------------------------------------------------

    fn add_investment_variables(&mut self) -> ExopfResult<()> {
        if !self.policy.investment {
            return Ok(());
        }

        for e in 0..self.gens.n_ext() {
            let g = &self.network.generators[self.gens.original(self.gens.n_fixed() + e)];
            let v = self.model.add_variable(
                format!("G_p_nom({})", g.name),
                VarDomain::Continuous,
                g.p_nom_min,
                g.p_nom_max,
            );
            self.vars.gen_p_nom.push(v);
        }
        for e in 0..self.links.n_ext() {
            let lk = &self.network.links[self.links.original(self.links.n_fixed() + e)];
            let v = self.model.add_variable(
                format!("LK_p_nom({})", lk.name),
                VarDomain::Continuous,
                lk.p_nom_min,
                lk.p_nom_max,
            );
            self.vars.link_p_nom.push(v);
        }
        for e in 0..self.storage_units.n_ext() {
            let su = &self.network.storage_units
                [self.storage_units.original(self.storage_units.n_fixed() + e)];
            let v = self.model.add_variable(
                format!("SU_p_nom({})", su.name),
                VarDomain::Continuous,
                su.p_nom_min,
                su.p_nom_max,
            );
            self.vars.su_p_nom.push(v);
        }
        for e in 0..self.stores.n_ext() {
            let st = &self.network.stores[self.stores.original(self.stores.n_fixed() + e)];
            let v = self.model.add_variable(
                format!("ST_e_nom({})", st.name),
                VarDomain::Continuous,
                st.e_nom_min,
                st.e_nom_max,
            );
            self.vars.store_e_nom.push(v);
        }

        self.add_line_investment_variables()
    }

    /// Line capacity variables plus the integrality companion selected by
    /// the investment type.
    fn add_line_investment_variables(&mut self) -> ExopfResult<()> {
        let big_m = self.config.big_m;
        for e in 0..self.lines.n_ext() {
            let orig = self.lines.original(self.lines.n_fixed() + e);
            let line = &self.network.lines[orig];
            let s_nom = self.model.add_variable(
                format!("LN_s_nom({})", line.name),
                VarDomain::Continuous,
                line.s_nom_min,
                line.s_nom_max,
            );
            self.vars.line_s_nom.push(s_nom);

            match self.config.investment_type {
                InvestmentType::Continuous | InvestmentType::Integer => {
                    let domain = if self.config.investment_type == InvestmentType::Integer {
                        VarDomain::Integer
                    } else {
                        VarDomain::Continuous
                    };
                    let inv = self.model.add_variable(
                        format!("LN_inv({})", line.name),
                        domain,
                        0.0,
                        f64::INFINITY,
                    );
                    self.vars.line_inv.push(inv);
                    self.capacity_link(line, s_nom, inv);
                }
                InvestmentType::Binary => {
                    let opt = self.model.add_variable(
                        format!("LN_opt({})", line.name),
                        VarDomain::Binary,
                        0.0,
                        1.0,
                    );
                    let inv = self.model.add_variable(
                        format!("LN_inv({})", line.name),
                        VarDomain::Continuous,
                        0.0,
                        f64::INFINITY,
                    );
                    self.vars.line_opt.push(opt);
                    self.vars.line_inv.push(inv);
                    // 0 <= inv <= M * opt
                    self.model.add_constraint(
                        format!("LN_inv_ub({})", line.name),
                        LinExpr::term(inv, 1.0).with(opt, -big_m),
                        Relation::Le,
                        0.0,
                    );
                    // inv >= s_nom_ext_min - M * (1 - opt)
                    self.model.add_constraint(
                        format!("LN_inv_lb({})", line.name),
                        LinExpr::term(inv, 1.0).with(opt, -big_m),
                        Relation::Ge,
                        line.s_nom_ext_min - big_m,
                    );
                    self.capacity_link(line, s_nom, inv);
                }
                InvestmentType::IntegerBigm => {
                    let cands = self.candidates[e].clone();
                    let mut selectors = Vec::with_capacity(cands.len());
                    let mut pick_one = LinExpr::new();
                    // LN_s_nom = s_nom * (1 + sum_c c*opt_c / num_parallel)
                    let mut capacity = LinExpr::term(s_nom, 1.0);
                    for &c in &cands {
                        let opt = self.model.add_variable(
                            format!("LN_opt({},{c})", line.name),
                            VarDomain::Binary,
                            0.0,
                            1.0,
                        );
                        pick_one.push(opt, 1.0);
                        capacity.push(opt, -line.s_nom * c as f64 / line.num_parallel);
                        selectors.push(opt);
                    }
                    self.model.add_constraint(
                        format!("LN_pick_one({})", line.name),
                        pick_one,
                        Relation::Eq,
                        1.0,
                    );
                    self.model.add_constraint(
                        format!("LN_capacity({})", line.name),
                        capacity,
                        Relation::Eq,
                        line.s_nom,
                    );
                    self.vars.line_opt_cand.push(selectors);
                }
            }
        }
        Ok(())
    }

    /// `LN_s_nom = (1 + LN_inv / num_parallel) * s_nom`.
    fn capacity_link(&mut self, line: &exopf_core::Line, s_nom: VarId, inv: VarId) {
        self.model.add_constraint(
            format!("LN_capacity({})", line.name),
            LinExpr::term(s_nom, 1.0).with(inv, -line.s_nom / line.num_parallel),
            Relation::Eq,
            line.s_nom,
        );
    }

    fn add_alpha(&mut self) {
        if !self.policy.alpha {
            return;
        }
        for g in 0..self.n_groups {
            let v = self.model.add_variable(
                format!("ALPHA({g})"),
                VarDomain::Continuous,
                0.0,
                f64::INFINITY,
            );
            self.vars.alpha.push(v);
        }
    }

    fn add_operation_variables(&mut self) {
        if !self.policy.operation {
            return;
        }
        let (lb, ub) = (f64::NEG_INFINITY, f64::INFINITY);
        for &t in self.t_indices.clone().iter() {
            let mut gen_p = Vec::with_capacity(self.gens.len());
            for (_, orig) in self.gens.positions() {
                let name = &self.network.generators[orig].name;
                gen_p.push(self.model.add_variable(
                    format!("G({name},{t})"),
                    VarDomain::Continuous,
                    lb,
                    ub,
                ));
            }
            self.vars.gen_p.push(gen_p);

            let mut line_p = Vec::with_capacity(self.lines.len());
            for (_, orig) in self.lines.positions() {
                let name = &self.network.lines[orig].name;
                line_p.push(self.model.add_variable(
                    format!("LN({name},{t})"),
                    VarDomain::Continuous,
                    lb,
                    ub,
                ));
            }
            self.vars.line_p.push(line_p);

            let mut link_p = Vec::with_capacity(self.links.len());
            for (_, orig) in self.links.positions() {
                let name = &self.network.links[orig].name;
                link_p.push(self.model.add_variable(
                    format!("LK({name},{t})"),
                    VarDomain::Continuous,
                    lb,
                    ub,
                ));
            }
            self.vars.link_p.push(link_p);

            let mut su_dispatch = Vec::new();
            let mut su_store = Vec::new();
            let mut su_soc = Vec::new();
            let mut su_spill = Vec::new();
            for (_, orig) in self.storage_units.positions() {
                let name = &self.network.storage_units[orig].name;
                su_dispatch.push(self.model.add_variable(
                    format!("SU_dispatch({name},{t})"),
                    VarDomain::Continuous,
                    0.0,
                    f64::INFINITY,
                ));
                su_store.push(self.model.add_variable(
                    format!("SU_store({name},{t})"),
                    VarDomain::Continuous,
                    0.0,
                    f64::INFINITY,
                ));
                su_soc.push(self.model.add_variable(
                    format!("SU_soc({name},{t})"),
                    VarDomain::Continuous,
                    0.0,
                    f64::INFINITY,
                ));
                su_spill.push(self.model.add_variable(
                    format!("SU_spill({name},{t})"),
                    VarDomain::Continuous,
                    0.0,
                    f64::INFINITY,
                ));
            }
            self.vars.su_dispatch.push(su_dispatch);
            self.vars.su_store.push(su_store);
            self.vars.su_soc.push(su_soc);
            self.vars.su_spill.push(su_spill);

            let mut st_dispatch = Vec::new();
            let mut st_store = Vec::new();
            let mut st_soc = Vec::new();
            let mut st_spill = Vec::new();
            for (_, orig) in self.stores.positions() {
                let name = &self.network.stores[orig].name;
                st_dispatch.push(self.model.add_variable(
                    format!("ST_dispatch({name},{t})"),
                    VarDomain::Continuous,
                    0.0,
                    f64::INFINITY,
                ));
                st_store.push(self.model.add_variable(
                    format!("ST_store({name},{t})"),
                    VarDomain::Continuous,
                    0.0,
                    f64::INFINITY,
                ));
                st_soc.push(self.model.add_variable(
                    format!("ST_soc({name},{t})"),
                    VarDomain::Continuous,
                    0.0,
                    f64::INFINITY,
                ));
                st_spill.push(self.model.add_variable(
                    format!("ST_spill({name},{t})"),
                    VarDomain::Continuous,
                    0.0,
                    f64::INFINITY,
                ));
            }
            self.vars.st_dispatch.push(st_dispatch);
            self.vars.st_store.push(st_store);
            self.vars.st_soc.push(st_soc);
            self.vars.st_spill.push(st_spill);

            if self.config.formulation.has_angles() {
                let mut theta = Vec::with_capacity(self.network.buses.len());
                for bus in &self.network.buses {
                    theta.push(self.model.add_variable(
                        format!("THETA({},{t})", bus.name),
                        VarDomain::Continuous,
                        lb,
                        ub,
                    ));
                }
                self.vars.theta.push(theta);
            }
            if self.config.formulation == Formulation::Ptdf {
                let mut injection = Vec::with_capacity(self.network.buses.len());
                for bus in &self.network.buses {
                    injection.push(self.model.add_variable(
                        format!("INJ({},{t})", bus.name),
                        VarDomain::Continuous,
                        lb,
                        ub,
                    ));
                }
                self.vars.injection.push(injection);
            }
            if self.config.formulation == Formulation::KirchhoffBilinear
                && self.policy.investment
            {
                let mut line_eff = Vec::with_capacity(self.lines.n_ext());
                for e in 0..self.lines.n_ext() {
                    let orig = self.lines.original(self.lines.n_fixed() + e);
                    let name = &self.network.lines[orig].name;
                    line_eff.push(self.model.add_variable(
                        format!("LN_eff({name},{t})"),
                        VarDomain::Continuous,
                        lb,
                        ub,
                    ));
                }
                self.vars.line_eff.push(line_eff);
            }
        }
    }

    // ----- bound and capacity-coupling rows -------------------------------

    /// Register a coupled constraint (slave role only).
    fn couple(&mut self, con: ConId, master: MasterVar, coeff: f64, offset: f64, scale: f64) {
        if self.role == Role::Slave {
            self.coupled.push(CoupledRhs {
                con,
                master,
                coeff,
                offset,
                scale,
            });
        }
    }

    fn add_capacity_bounds(&mut self) {
        if !self.policy.operation {
            return;
        }
        for (k, &t) in self.t_indices.clone().iter().enumerate() {
            self.add_gen_bounds(k, t);
            self.add_line_bounds(k, t);
            self.add_link_bounds(k, t);
            self.add_storage_bounds(k, t);
        }
    }

    fn add_gen_bounds(&mut self, k: usize, t: usize) {
        let f = self.scale.bounds_g;
        for (pos, orig) in self.gens.positions().collect::<Vec<_>>() {
            let gen = &self.network.generators[orig];
            let p = self.vars.gen_p[k][pos];
            let p_max = gen.p_max_pu.at(t);
            let p_min = gen.p_min_pu.at(t);
            match (self.gens.ext_index(pos), self.policy.investment) {
                (Some(e), true) => {
                    let nom = self.vars.gen_p_nom[e];
                    self.model.add_constraint(
                        format!("G_ub({},{t})", gen.name),
                        LinExpr::term(p, f).with(nom, -f * p_max),
                        Relation::Le,
                        0.0,
                    );
                    self.model.add_constraint(
                        format!("G_lb({},{t})", gen.name),
                        LinExpr::term(p, f).with(nom, -f * p_min),
                        Relation::Ge,
                        0.0,
                    );
                }
                (ext, _) => {
                    let ub = self.model.add_constraint(
                        format!("G_ub({},{t})", gen.name),
                        LinExpr::term(p, f),
                        Relation::Le,
                        f * p_max * gen.p_nom,
                    );
                    let lb = self.model.add_constraint(
                        format!("G_lb({},{t})", gen.name),
                        LinExpr::term(p, f),
                        Relation::Ge,
                        f * p_min * gen.p_nom,
                    );
                    if let Some(e) = ext {
                        self.couple(ub, MasterVar::GenNom(e), p_max, 0.0, f);
                        self.couple(lb, MasterVar::GenNom(e), p_min, 0.0, f);
                    }
                }
            }
        }
    }

    fn add_line_bounds(&mut self, k: usize, t: usize) {
        let f = self.scale.bounds_ln;
        for (pos, orig) in self.lines.positions().collect::<Vec<_>>() {
            let line = &self.network.lines[orig];
            let p = self.vars.line_p[k][pos];
            let cap = line.s_max_pu;
            match (self.lines.ext_index(pos), self.policy.investment) {
                (Some(e), true) => {
                    let nom = self.vars.line_s_nom[e];
                    self.model.add_constraint(
                        format!("LN_ub({},{t})", line.name),
                        LinExpr::term(p, f).with(nom, -f * cap),
                        Relation::Le,
                        0.0,
                    );
                    self.model.add_constraint(
                        format!("LN_lb({},{t})", line.name),
                        LinExpr::term(p, f).with(nom, f * cap),
                        Relation::Ge,
                        0.0,
                    );
                }
                (ext, _) => {
                    let ub = self.model.add_constraint(
                        format!("LN_ub({},{t})", line.name),
                        LinExpr::term(p, f),
                        Relation::Le,
                        f * cap * line.s_nom,
                    );
                    let lb = self.model.add_constraint(
                        format!("LN_lb({},{t})", line.name),
                        LinExpr::term(p, f),
                        Relation::Ge,
                        -f * cap * line.s_nom,
                    );
                    if let Some(e) = ext {
                        self.couple(ub, MasterVar::LineNom(e), cap, 0.0, f);
                        self.couple(lb, MasterVar::LineNom(e), -cap, 0.0, f);
                    }
                }
            }
        }
    }

    fn add_link_bounds(&mut self, k: usize, t: usize) {
        let f = self.scale.bounds_lk;
        for (pos, orig) in self.links.positions().collect::<Vec<_>>() {
            let link = &self.network.links[orig];
            let p = self.vars.link_p[k][pos];
            match (self.links.ext_index(pos), self.policy.investment) {
                (Some(e), true) => {
                    let nom = self.vars.link_p_nom[e];
                    self.model.add_constraint(
                        format!("LK_ub({},{t})", link.name),
                        LinExpr::term(p, f).with(nom, -f * link.p_max_pu),
                        Relation::Le,
                        0.0,
                    );
                    self.model.add_constraint(
                        format!("LK_lb({},{t})", link.name),
                        LinExpr::term(p, f).with(nom, -f * link.p_min_pu),
                        Relation::Ge,
                        0.0,
                    );
                }
                (ext, _) => {
                    let ub = self.model.add_constraint(
                        format!("LK_ub({},{t})", link.name),
                        LinExpr::term(p, f),
                        Relation::Le,
                        f * link.p_max_pu * link.p_nom,
                    );
                    let lb = self.model.add_constraint(
                        format!("LK_lb({},{t})", link.name),
                        LinExpr::term(p, f),
                        Relation::Ge,
                        f * link.p_min_pu * link.p_nom,
                    );
                    if let Some(e) = ext {
                        self.couple(ub, MasterVar::LinkNom(e), link.p_max_pu, 0.0, f);
                        self.couple(lb, MasterVar::LinkNom(e), link.p_min_pu, 0.0, f);
                    }
                }
            }
        }
    }

    fn add_storage_bounds(&mut self, k: usize, t: usize) {
        for (pos, orig) in self.storage_units.positions().collect::<Vec<_>>() {
            let su = &self.network.storage_units[orig];
            let dispatch = self.vars.su_dispatch[k][pos];
            let store = self.vars.su_store[k][pos];
            let soc = self.vars.su_soc[k][pos];
            let spill = self.vars.su_spill[k][pos];
            let ext = self
                .storage_units
                .ext_index(pos)
                .filter(|_| self.policy.investment);
            match ext {
                Some(e) => {
                    let nom = self.vars.su_p_nom[e];
                    self.model.add_constraint(
                        format!("SU_dispatch_ub({},{t})", su.name),
                        LinExpr::term(dispatch, 1.0).with(nom, -su.p_max_pu),
                        Relation::Le,
                        0.0,
                    );
                    self.model.add_constraint(
                        format!("SU_store_ub({},{t})", su.name),
                        LinExpr::term(store, 1.0).with(nom, su.p_min_pu),
                        Relation::Le,
                        0.0,
                    );
                    self.model.add_constraint(
                        format!("SU_soc_ub({},{t})", su.name),
                        LinExpr::term(soc, 1.0).with(nom, -su.max_hours),
                        Relation::Le,
                        0.0,
                    );
                }
                None => {
                    self.model.add_constraint(
                        format!("SU_dispatch_ub({},{t})", su.name),
                        LinExpr::term(dispatch, 1.0),
                        Relation::Le,
                        su.p_max_pu * su.p_nom,
                    );
                    self.model.add_constraint(
                        format!("SU_store_ub({},{t})", su.name),
                        LinExpr::term(store, 1.0),
                        Relation::Le,
                        -su.p_min_pu * su.p_nom,
                    );
                    self.model.add_constraint(
                        format!("SU_soc_ub({},{t})", su.name),
                        LinExpr::term(soc, 1.0),
                        Relation::Le,
                        su.max_hours * su.p_nom,
                    );
                }
            }
            self.model.add_constraint(
                format!("SU_spill_ub({},{t})", su.name),
                LinExpr::term(spill, 1.0),
                Relation::Le,
                su.inflow.at(t),
            );
        }

        for (pos, orig) in self.stores.positions().collect::<Vec<_>>() {
            let st = &self.network.stores[orig];
            let soc = self.vars.st_soc[k][pos];
            let spill = self.vars.st_spill[k][pos];
            let ext = self
                .stores
                .ext_index(pos)
                .filter(|_| self.policy.investment);
            match ext {
                Some(e) => {
                    let nom = self.vars.store_e_nom[e];
                    self.model.add_constraint(
                        format!("ST_soc_ub({},{t})", st.name),
                        LinExpr::term(soc, 1.0).with(nom, -st.e_max_pu),
                        Relation::Le,
                        0.0,
                    );
                    self.model.add_constraint(
                        format!("ST_soc_lb({},{t})", st.name),
                        LinExpr::term(soc, 1.0).with(nom, -st.e_min_pu),
                        Relation::Ge,
                        0.0,
                    );
                }
                None => {
                    self.model.add_constraint(
                        format!("ST_soc_ub({},{t})", st.name),
                        LinExpr::term(soc, 1.0),
                        Relation::Le,
                        st.e_max_pu * st.e_nom,
                    );
                    self.model.add_constraint(
                        format!("ST_soc_lb({},{t})", st.name),
                        LinExpr::term(soc, 1.0),
                        Relation::Ge,
                        st.e_min_pu * st.e_nom,
                    );
                }
            }
            self.model.add_constraint(
                format!("ST_spill_ub({},{t})", st.name),
                LinExpr::term(spill, 1.0),
                Relation::Le,
                st.inflow.at(t),
            );
        }
    }

    // ----- storage recurrences --------------------------------------------

    fn add_storage_recurrences(&mut self) {
        if !self.policy.operation {
            return;
        }
        let horizon = self.t_indices.len();
        for (pos, orig) in self.storage_units.positions().collect::<Vec<_>>() {
            let su = self.network.storage_units[orig].clone();
            for k in 0..horizon {
                let t = self.t_indices[k];
                let mut expr = LinExpr::term(self.vars.su_soc[k][pos], 1.0)
                    .with(self.vars.su_dispatch[k][pos], 1.0 / su.efficiency_dispatch)
                    .with(self.vars.su_store[k][pos], -su.efficiency_store)
                    .with(self.vars.su_spill[k][pos], 1.0);
                let mut rhs = su.inflow.at(t);
                if k > 0 {
                    expr.push(self.vars.su_soc[k - 1][pos], -1.0);
                } else if su.cyclic_state_of_charge {
                    expr.push(self.vars.su_soc[horizon - 1][pos], -1.0);
                } else {
                    rhs += su.state_of_charge_initial;
                }
                self.model.add_constraint(
                    format!("SU_soc_def({},{t})", su.name),
                    expr,
                    Relation::Eq,
                    rhs,
                );
            }
        }
        for (pos, orig) in self.stores.positions().collect::<Vec<_>>() {
            let st = self.network.stores[orig].clone();
            for k in 0..horizon {
                let t = self.t_indices[k];
                let mut expr = LinExpr::term(self.vars.st_soc[k][pos], 1.0)
                    .with(self.vars.st_dispatch[k][pos], 1.0 / st.efficiency_dispatch)
                    .with(self.vars.st_store[k][pos], -st.efficiency_store)
                    .with(self.vars.st_spill[k][pos], 1.0);
                let mut rhs = st.inflow.at(t);
                if k > 0 {
                    expr.push(self.vars.st_soc[k - 1][pos], -1.0);
                } else if st.cyclic_state_of_charge {
                    expr.push(self.vars.st_soc[horizon - 1][pos], -1.0);
                } else {
                    rhs += st.state_of_charge_initial;
                }
                self.model.add_constraint(
                    format!("ST_soc_def({},{t})", st.name),
                    expr,
                    Relation::Eq,
                    rhs,
                );
            }
        }
    }

    // ----- flow formulation -----------------------------------------------

    /// Injection terms at a bus excluding line flows: generators, link
    /// arrivals/departures, storage dispatch/store.
    fn injection_terms(&self, k: usize, bus: usize) -> LinExpr {
        let name = &self.network.buses[bus].name;
        let mut expr = LinExpr::new();
        for (pos, orig) in self.gens.positions() {
            if &self.network.generators[orig].bus == name {
                expr.push(self.vars.gen_p[k][pos], 1.0);
            }
        }
        for (pos, orig) in self.links.positions() {
            let link = &self.network.links[orig];
            if &link.bus1 == name {
                expr.push(self.vars.link_p[k][pos], link.efficiency);
            }
            if &link.bus0 == name {
                expr.push(self.vars.link_p[k][pos], -1.0);
            }
        }
        for (pos, orig) in self.storage_units.positions() {
            if &self.network.storage_units[orig].bus == name {
                expr.push(self.vars.su_dispatch[k][pos], 1.0);
                expr.push(self.vars.su_store[k][pos], -1.0);
            }
        }
        for (pos, orig) in self.stores.positions() {
            if &self.network.stores[orig].bus == name {
                expr.push(self.vars.st_dispatch[k][pos], 1.0);
                expr.push(self.vars.st_store[k][pos], -1.0);
            }
        }
        expr
    }

    /// Nodal balance rows: injections minus net line outflow equal demand.
    /// Their duals are the nodal marginal prices.
    fn add_balance_rows(&mut self) {
        for (k, &t) in self.t_indices.clone().iter().enumerate() {
            let mut rows = Vec::with_capacity(self.network.buses.len());
            for bus in 0..self.network.buses.len() {
                let name = self.network.buses[bus].name.clone();
                let mut expr = self.injection_terms(k, bus);
                for (pos, orig) in self.lines.positions() {
                    let line = &self.network.lines[orig];
                    if line.bus0 == name {
                        expr.push(self.vars.line_p[k][pos], -1.0);
                    }
                    if line.bus1 == name {
                        expr.push(self.vars.line_p[k][pos], 1.0);
                    }
                }
                let demand = self.load_at(bus, t);
                let con = self.model.add_constraint(
                    format!("balance({name},{t})"),
                    expr,
                    Relation::Eq,
                    demand,
                );
                rows.push(con);
            }
            self.balance.push(rows);
        }
    }

    fn add_flow_constraints(&mut self) -> ExopfResult<()> {
        if !self.policy.operation {
            return Ok(());
        }
        match self.config.formulation {
            Formulation::AnglesLinear => {
                self.add_balance_rows();
                self.add_angle_rows(AngleMode::Linear);
            }
            Formulation::AnglesBilinear => {
                self.add_balance_rows();
                self.add_angle_rows(AngleMode::Bilinear);
            }
            Formulation::AnglesLinearIntegerBigm => {
                self.add_balance_rows();
                self.add_angle_rows(AngleMode::IntegerBigm);
            }
            Formulation::KirchhoffLinear | Formulation::KirchhoffBilinear => {
                self.add_balance_rows();
                let basis = cycle_basis(self.network)?;
                self.add_cycle_rows(&basis);
            }
            Formulation::Ptdf => self.add_ptdf_rows()?,
        }
        Ok(())
    }

    fn add_angle_rows(&mut self, mode: AngleMode) {
        let f = self.scale.flows;
        let big_m = self.config.big_m;
        for (k, &t) in self.t_indices.clone().iter().enumerate() {
            // angle reference
            self.model.add_constraint(
                format!("slack_angle({t})"),
                LinExpr::term(self.vars.theta[k][0], 1.0),
                Relation::Eq,
                0.0,
            );

            for (pos, orig) in self.lines.positions().collect::<Vec<_>>() {
                let line = self.network.lines[orig].clone();
                let x_pu = self.x_pu[orig];
                let b0 = self.bus_index[&line.bus0];
                let b1 = self.bus_index[&line.bus1];
                let theta0 = self.vars.theta[k][b0];
                let theta1 = self.vars.theta[k][b1];
                let flow = self.vars.line_p[k][pos];
                let ext = self.lines.ext_index(pos);

                match (mode, ext) {
                    (AngleMode::Linear, _) | (AngleMode::Bilinear, None) | (AngleMode::IntegerBigm, None) => {
                        // LN = (theta0 - theta1) / x_pu
                        self.model.add_constraint(
                            format!("flow({},{t})", line.name),
                            LinExpr::term(flow, f)
                                .with(theta0, -f / x_pu)
                                .with(theta1, f / x_pu),
                            Relation::Eq,
                            0.0,
                        );
                    }
                    (AngleMode::Bilinear, Some(e)) => {
                        // LN = (1 + inv/num_parallel) / x_pu * (theta0 - theta1)
                        let inv = self.vars.line_inv[e];
                        let mut quad = QuadExpr::new();
                        quad.lin = LinExpr::term(flow, f)
                            .with(theta0, -f / x_pu)
                            .with(theta1, f / x_pu);
                        quad.push_bilinear(inv, theta0, -f / (line.num_parallel * x_pu));
                        quad.push_bilinear(inv, theta1, f / (line.num_parallel * x_pu));
                        self.model.add_quadratic_constraint(
                            format!("flow({},{t})", line.name),
                            quad,
                            Relation::Eq,
                            0.0,
                        );
                    }
                    (AngleMode::IntegerBigm, Some(e)) => {
                        self.add_bigm_flow_rows(t, e, &line, x_pu, theta0, theta1, flow, big_m);
                    }
                }
            }
        }
    }

    /// Big-M relaxed flow equalities, one pair per extension candidate.
    /// The pair is tight exactly for the selected candidate.
    #[allow(clippy::too_many_arguments)]
    fn add_bigm_flow_rows(
        &mut self,
        t: usize,
        ext: usize,
        line: &exopf_core::Line,
        x_pu: f64,
        theta0: VarId,
        theta1: VarId,
        flow: VarId,
        big_m: f64,
    ) {
        let f = self.scale.flows;
        let cands = self.candidates[ext].clone();
        for (c_pos, &c) in cands.iter().enumerate() {
            let kappa = (1.0 + c as f64 / line.num_parallel) / x_pu;
            let base = LinExpr::term(theta0, f * kappa)
                .with(theta1, -f * kappa)
                .with(flow, -f);

            if self.policy.investment {
                let opt = self.vars.line_opt_cand[ext][c_pos];
                // kappa*dtheta - LN >= (opt - 1) * M
                self.model.add_constraint(
                    format!("flow_lower({},{c},{t})", line.name),
                    base.clone().with(opt, -f * big_m),
                    Relation::Ge,
                    -f * big_m,
                );
                // kappa*dtheta - LN <= (1 - opt) * M
                self.model.add_constraint(
                    format!("flow_upper({},{c},{t})", line.name),
                    base.with(opt, f * big_m),
                    Relation::Le,
                    f * big_m,
                );
            } else {
                // slave: the selector lives in the master, its value
                // arrives through the RHS. Initialized fully relaxed.
                let lower = self.model.add_constraint(
                    format!("flow_lower({},{c},{t})", line.name),
                    base.clone(),
                    Relation::Ge,
                    -f * big_m,
                );
                let upper = self.model.add_constraint(
                    format!("flow_upper({},{c},{t})", line.name),
                    base,
                    Relation::Le,
                    f * big_m,
                );
                self.couple(lower, MasterVar::LineCand(ext, c_pos), big_m, -big_m, f);
                self.couple(upper, MasterVar::LineCand(ext, c_pos), -big_m, big_m, f);
            }
        }
    }

    /// Kirchhoff voltage-law rows, one per fundamental cycle and snapshot.
    fn add_cycle_rows(&mut self, basis: &CycleBasis) {
        let f = self.scale.flows;
        let bilinear = self.config.formulation == Formulation::KirchhoffBilinear;
        for k in 0..self.t_indices.len() {
            let t = self.t_indices[k];

            if bilinear && self.policy.investment {
                // tie the effective flow to the physical flow:
                // y * (1 + inv/num_parallel) = LN
                for e in 0..self.lines.n_ext() {
                    let orig = self.lines.original(self.lines.n_fixed() + e);
                    let line = &self.network.lines[orig];
                    let pos = self.lines.position_of(orig);
                    let y = self.vars.line_eff[k][e];
                    let inv = self.vars.line_inv[e];
                    let mut quad = QuadExpr::new();
                    quad.lin = LinExpr::term(y, 1.0).with(self.vars.line_p[k][pos], -1.0);
                    quad.push_bilinear(y, inv, 1.0 / line.num_parallel);
                    self.model.add_quadratic_constraint(
                        format!("flow_eff({},{t})", line.name),
                        quad,
                        Relation::Eq,
                        0.0,
                    );
                }
            }

            for (c_idx, cycle) in basis.cycles.iter().enumerate() {
                let mut expr = LinExpr::new();
                for (line_orig, dir) in cycle.lines.iter().zip(cycle.directions.iter()) {
                    let pos = self.lines.position_of(*line_orig);
                    let weight = f * *dir as f64 * self.x_pu[*line_orig];
                    let use_effective = bilinear
                        && self.policy.investment
                        && self.lines.is_extendable(pos);
                    if use_effective {
                        let e = self.lines.ext_index(pos).expect("extendable position");
                        expr.push(self.vars.line_eff[k][e], weight);
                    } else {
                        expr.push(self.vars.line_p[k][pos], weight);
                    }
                }
                self.model.add_constraint(
                    format!("cycle({c_idx},{t})"),
                    expr,
                    Relation::Eq,
                    0.0,
                );
            }
        }
    }

    /// PTDF rows: injection definitions (the balance/price rows), flow
    /// couplings, and the system-wide balance.
    fn add_ptdf_rows(&mut self) -> ExopfResult<()> {
        let f = self.scale.flows;
        // the clone releases the cache borrow before row emission; copying
        // the dense factors is cheap next to the inversion the cache saves
        let ptdf = self.ptdf_cache.get_or_compute(self.network)?.clone();

        for (k, &t) in self.t_indices.clone().iter().enumerate() {
            let mut rows = Vec::with_capacity(self.network.buses.len());
            for bus in 0..self.network.buses.len() {
                let name = self.network.buses[bus].name.clone();
                let expr = self
                    .injection_terms(k, bus)
                    .with(self.vars.injection[k][bus], -1.0);
                let demand = self.load_at(bus, t);
                let con = self.model.add_constraint(
                    format!("balance({name},{t})"),
                    expr,
                    Relation::Eq,
                    demand,
                );
                rows.push(con);
            }
            self.balance.push(rows);

            for (pos, orig) in self.lines.positions().collect::<Vec<_>>() {
                let mut expr = LinExpr::term(self.vars.line_p[k][pos], f);
                for bus in 0..self.network.buses.len() {
                    let factor = ptdf.get(orig, bus);
                    if factor.abs() > 1e-10 {
                        expr.push(self.vars.injection[k][bus], -f * factor);
                    }
                }
                self.model.add_constraint(
                    format!("flow({},{t})", self.network.lines[orig].name),
                    expr,
                    Relation::Eq,
                    0.0,
                );
            }

            let mut system = LinExpr::new();
            for bus in 0..self.network.buses.len() {
                system.push(self.vars.injection[k][bus], 1.0);
            }
            self.model.add_constraint(
                format!("system_balance({t})"),
                system,
                Relation::Eq,
                0.0,
            );
        }
        Ok(())
    }

    // ----- global constraints ---------------------------------------------

    fn add_global_constraints(&mut self) {
        use exopf_core::GlobalConstraintKind as Kind;
        for gc in self.network.global_constraints.clone() {
            match gc.kind {
                Kind::Co2Limit if self.policy.operation => self.add_co2_limit(gc.constant),
                Kind::ResTarget if self.policy.operation => self.add_restarget(gc.constant),
                Kind::ApproxResTarget if self.policy.investment => {
                    self.add_approx_restarget(gc.constant)
                }
                Kind::MwkmLimit if self.policy.investment => self.add_mwkm_limit(gc.constant),
                _ => {}
            }
        }
    }

    fn add_co2_limit(&mut self, limit: f64) {
        let mut expr = LinExpr::new();
        for (k, &t) in self.t_indices.iter().enumerate() {
            let w = self.weighting(t);
            for (pos, orig) in self.gens.positions() {
                let gen = &self.network.generators[orig];
                let co2 = self.network.carrier_co2(&gen.carrier);
                if co2 != 0.0 {
                    expr.push(self.vars.gen_p[k][pos], w * co2 / gen.efficiency);
                }
            }
        }
        self.model
            .add_constraint("co2_limit", expr, Relation::Le, limit);
    }

    /// Weighted demand over the slice, the reference for renewable targets.
    fn weighted_demand(&self) -> f64 {
        self.t_indices
            .iter()
            .map(|&t| {
                self.weighting(t)
                    * self
                        .network
                        .loads
                        .iter()
                        .map(|l| l.p[t])
                        .sum::<f64>()
            })
            .sum()
    }

    fn add_restarget(&mut self, target: f64) {
        let mut expr = LinExpr::new();
        for (k, &t) in self.t_indices.iter().enumerate() {
            let w = self.weighting(t);
            for (pos, orig) in self.gens.positions() {
                let gen = &self.network.generators[orig];
                if self.network.carrier_co2(&gen.carrier) == 0.0 {
                    expr.push(self.vars.gen_p[k][pos], w);
                }
            }
        }
        let rhs = target * self.weighted_demand();
        self.model
            .add_constraint("restarget", expr, Relation::Ge, rhs);
    }

    /// Maximum-availability proxy for the renewable target: weighted
    /// `p_max_pu * p_nom` stands in for actual generation, which makes the
    /// row a pure investment constraint.
    fn add_approx_restarget(&mut self, target: f64) {
        let f = self.scale.approx_restarget;
        let mut expr = LinExpr::new();
        let mut fixed_avail = 0.0;
        for (pos, orig) in self.gens.positions().collect::<Vec<_>>() {
            let gen = &self.network.generators[orig];
            if self.network.carrier_co2(&gen.carrier) != 0.0 {
                continue;
            }
            let avail: f64 = self
                .t_indices
                .iter()
                .map(|&t| self.weighting(t) * gen.p_max_pu.at(t))
                .sum();
            match self.gens.ext_index(pos) {
                Some(e) => {
                    expr.push(self.vars.gen_p_nom[e], f * avail);
                }
                None => fixed_avail += avail * gen.p_nom,
            }
        }
        let rhs = f * (target * self.weighted_demand() - fixed_avail);
        self.model
            .add_constraint("approx_restarget", expr, Relation::Ge, rhs);
    }

    fn add_mwkm_limit(&mut self, limit: f64) {
        let existing: f64 = self
            .network
            .lines
            .iter()
            .map(|l| l.s_nom * l.length)
            .sum();
        let mut expr = LinExpr::new();
        let mut fixed_volume = 0.0;
        for (pos, orig) in self.lines.positions().collect::<Vec<_>>() {
            let line = &self.network.lines[orig];
            match self.lines.ext_index(pos) {
                Some(e) => {
                    expr.push(self.vars.line_s_nom[e], line.length);
                }
                None => fixed_volume += line.s_nom * line.length,
            }
        }
        self.model.add_constraint(
            "mwkm_limit",
            expr,
            Relation::Le,
            limit * existing - fixed_volume,
        );
    }

    // ----- objective ------------------------------------------------------

    fn set_objective(&mut self) {
        let mut obj = LinExpr::new();

        if self.policy.operation {
            for (k, &t) in self.t_indices.iter().enumerate() {
                let w = self.weighting(t);
                for (pos, orig) in self.gens.positions() {
                    let mc = self.network.generators[orig].marginal_cost;
                    if mc != 0.0 {
                        obj.push(self.vars.gen_p[k][pos], w * mc);
                    }
                }
                for (pos, orig) in self.storage_units.positions() {
                    let mc = self.network.storage_units[orig].marginal_cost;
                    if mc != 0.0 {
                        obj.push(self.vars.su_dispatch[k][pos], w * mc);
                    }
                }
                for (pos, orig) in self.stores.positions() {
                    let mc = self.network.stores[orig].marginal_cost;
                    if mc != 0.0 {
                        obj.push(self.vars.st_dispatch[k][pos], w * mc);
                    }
                }
            }
        }

        if self.policy.investment {
            for (pos, orig) in self.gens.positions() {
                let gen = &self.network.generators[orig];
                match self.gens.ext_index(pos) {
                    Some(e) => {
                        obj.push(self.vars.gen_p_nom[e], gen.capital_cost);
                    }
                    None => {
                        obj.add_constant(gen.capital_cost * gen.p_nom);
                    }
                }
            }
            for (pos, orig) in self.lines.positions() {
                let line = &self.network.lines[orig];
                match self.lines.ext_index(pos) {
                    Some(e) => {
                        obj.push(self.vars.line_s_nom[e], line.capital_cost);
                    }
                    None => {
                        obj.add_constant(line.capital_cost * line.s_nom);
                    }
                }
            }
            for (pos, orig) in self.links.positions() {
                let link = &self.network.links[orig];
                match self.links.ext_index(pos) {
                    Some(e) => {
                        obj.push(self.vars.link_p_nom[e], link.capital_cost);
                    }
                    None => {
                        obj.add_constant(link.capital_cost * link.p_nom);
                    }
                }
            }
            for (pos, orig) in self.storage_units.positions() {
                let su = &self.network.storage_units[orig];
                match self.storage_units.ext_index(pos) {
                    Some(e) => {
                        obj.push(self.vars.su_p_nom[e], su.capital_cost);
                    }
                    None => {
                        obj.add_constant(su.capital_cost * su.p_nom);
                    }
                }
            }
            for (pos, orig) in self.stores.positions() {
                let st = &self.network.stores[orig];
                match self.stores.ext_index(pos) {
                    Some(e) => {
                        obj.push(self.vars.store_e_nom[e], st.capital_cost);
                    }
                    None => {
                        obj.add_constant(st.capital_cost * st.e_nom);
                    }
                }
            }
        }

        for g in 0..self.vars.alpha.len() {
            obj.push(self.vars.alpha[g], 1.0);
        }

        self.model.set_objective(obj);
    }

    fn finish(self) -> LopfModel {
        LopfModel {
            model: self.model,
            role: self.role,
            slice: self.slice,
            snapshot_indices: self.t_indices,
            gens: self.gens,
            lines: self.lines,
            links: self.links,
            storage_units: self.storage_units,
            stores: self.stores,
            vars: self.vars,
            balance: self.balance,
            coupled: self.coupled,
            candidates: self.candidates,
            n_groups: self.n_groups,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AngleMode {
    Linear,
    Bilinear,
    IntegerBigm,
}
