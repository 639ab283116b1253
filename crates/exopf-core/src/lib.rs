//! # exopf-core: Power Network Data Model
//!
//! In-memory model of a power system for expansion-aware linear optimal
//! power flow: buses, AC lines, controllable DC links, generators, storage
//! units, stores, loads, carriers and global policy constraints over an
//! ordered horizon of weighted snapshots.
//!
//! Components live in plain tables on [`Network`] and reference buses by
//! name. The optimization layer re-sorts and indexes these tables; keeping
//! them as `Vec`s (rather than a graph of heterogeneous nodes) makes the
//! fixed-first partitioning and contiguous variable indexing of the model
//! builder a direct array operation. A graph view of the line topology is
//! built on demand by the algorithm crate.
//!
//! ## Quick start
//!
//! ```rust
//! use exopf_core::*;
//!
//! let mut network = Network::new("two-bus");
//! network.snapshots = vec![Snapshot::new(1.0); 3];
//! network.buses.push(Bus::new(BusId::new(0), "a", 380.0));
//! network.buses.push(Bus::new(BusId::new(1), "b", 380.0));
//! network.lines.push(
//!     Line::new(LineId::new(0), "a-b", "a", "b", 0.1, 1000.0),
//! );
//! network.generators.push(
//!     Generator::new(GenId::new(0), "gas a", "a", "gas", 800.0)
//!         .with_marginal_cost(50.0),
//! );
//! network.loads.push(Load::new(LoadId::new(0), "d b", "b", vec![400.0; 3]));
//! assert!(network.validate().is_empty());
//! ```

use serde::{Deserialize, Serialize};

pub mod diagnostics;
pub mod error;
pub mod series;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{ExopfError, ExopfResult};
pub use series::TimeSeries;

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageUnitId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(usize);
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoadId(usize);

macro_rules! impl_id {
    ($($id:ident),*) => {
        $(
            impl $id {
                #[inline]
                pub fn new(value: usize) -> Self {
                    $id(value)
                }
                #[inline]
                pub fn value(&self) -> usize {
                    self.0
                }
            }
        )*
    };
}

impl_id!(BusId, LineId, LinkId, GenId, StorageUnitId, StoreId, LoadId);

/// Topology node. Created at load time, read-only during a solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    /// Nominal voltage in kV, used for per-unit conversion of line reactance.
    pub v_nom: f64,
    /// Nodal marginal price per snapshot, written back from balance duals.
    pub marginal_price: Vec<f64>,
}

impl Bus {
    pub fn new(id: BusId, name: impl Into<String>, v_nom: f64) -> Self {
        Self {
            id,
            name: name.into(),
            v_nom,
            marginal_price: Vec::new(),
        }
    }
}

/// An AC transmission branch between two buses.
///
/// `x`, `s_nom`, `s_nom_extendable`, `s_nom_opt` and `num_parallel` are
/// mutated by the iterative and discretization loops between solves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub id: LineId,
    pub name: String,
    pub bus0: String,
    pub bus1: String,
    /// Series reactance (Ohm).
    pub x: f64,
    /// Series resistance (Ohm). Carried for completeness; unused in the
    /// linear formulations.
    pub r: f64,
    /// Nominal apparent power rating (MVA).
    pub s_nom: f64,
    pub s_nom_min: f64,
    pub s_nom_max: f64,
    pub s_nom_extendable: bool,
    /// Minimum size of an extension if any extension is built (binary
    /// investment big-M switch).
    pub s_nom_ext_min: f64,
    /// Number of parallel circuits the nominal rating represents.
    pub num_parallel: f64,
    /// Per-unit usable share of the rating.
    pub s_max_pu: f64,
    /// Route length (km), used by the mwkm expansion-volume constraint.
    pub length: f64,
    /// Annualized capital cost per MVA of new capacity.
    pub capital_cost: f64,
    /// Optimized rating after a solve.
    pub s_nom_opt: f64,
    /// Active power flow per snapshot (bus0 -> bus1 positive).
    pub p: Vec<f64>,
}

impl Line {
    pub fn new(
        id: LineId,
        name: impl Into<String>,
        bus0: impl Into<String>,
        bus1: impl Into<String>,
        x: f64,
        s_nom: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            bus0: bus0.into(),
            bus1: bus1.into(),
            x,
            r: 0.0,
            s_nom,
            s_nom_min: 0.0,
            s_nom_max: f64::INFINITY,
            s_nom_extendable: false,
            s_nom_ext_min: 0.0,
            num_parallel: 1.0,
            s_max_pu: 1.0,
            length: 1.0,
            capital_cost: 0.0,
            s_nom_opt: s_nom,
            p: Vec::new(),
        }
    }

    /// Mark the line extendable between `s_nom_min` and `s_nom_max`.
    pub fn extendable(mut self, s_nom_min: f64, s_nom_max: f64) -> Self {
        self.s_nom_extendable = true;
        self.s_nom_min = s_nom_min;
        self.s_nom_max = s_nom_max;
        self
    }

    pub fn with_capital_cost(mut self, capital_cost: f64) -> Self {
        self.capital_cost = capital_cost;
        self
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = length;
        self
    }

    pub fn with_num_parallel(mut self, num_parallel: f64) -> Self {
        self.num_parallel = num_parallel;
        self
    }
}

/// A controllable DC branch with a transfer efficiency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub name: String,
    pub bus0: String,
    pub bus1: String,
    pub p_nom: f64,
    pub p_nom_min: f64,
    pub p_nom_max: f64,
    pub p_nom_extendable: bool,
    /// Lower per-unit dispatch bound; negative allows reverse flow.
    pub p_min_pu: f64,
    pub p_max_pu: f64,
    /// Share of power sent at bus0 that arrives at bus1.
    pub efficiency: f64,
    pub capital_cost: f64,
    pub p_nom_opt: f64,
    /// Dispatch at bus0 per snapshot.
    pub p: Vec<f64>,
}

impl Link {
    pub fn new(
        id: LinkId,
        name: impl Into<String>,
        bus0: impl Into<String>,
        bus1: impl Into<String>,
        p_nom: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            bus0: bus0.into(),
            bus1: bus1.into(),
            p_nom,
            p_nom_min: 0.0,
            p_nom_max: f64::INFINITY,
            p_nom_extendable: false,
            p_min_pu: 0.0,
            p_max_pu: 1.0,
            efficiency: 1.0,
            capital_cost: 0.0,
            p_nom_opt: p_nom,
            p: Vec::new(),
        }
    }

    pub fn extendable(mut self, p_nom_min: f64, p_nom_max: f64) -> Self {
        self.p_nom_extendable = true;
        self.p_nom_min = p_nom_min;
        self.p_nom_max = p_nom_max;
        self
    }

    pub fn bidirectional(mut self) -> Self {
        self.p_min_pu = -1.0;
        self
    }

    pub fn with_efficiency(mut self, efficiency: f64) -> Self {
        self.efficiency = efficiency;
        self
    }

    pub fn with_capital_cost(mut self, capital_cost: f64) -> Self {
        self.capital_cost = capital_cost;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generator {
    pub id: GenId,
    pub name: String,
    pub bus: String,
    /// Carrier name, resolved against [`Carrier`] for CO2 accounting.
    pub carrier: String,
    pub p_nom: f64,
    pub p_nom_min: f64,
    pub p_nom_max: f64,
    pub p_nom_extendable: bool,
    /// Unit commitment flag. Commitment is not implemented; flagged units
    /// are dispatched as ordinary generators and a notice is logged.
    pub commitable: bool,
    pub p_min_pu: TimeSeries,
    /// Availability per snapshot (capacity factor for renewables).
    pub p_max_pu: TimeSeries,
    pub marginal_cost: f64,
    pub capital_cost: f64,
    /// Thermal efficiency; divides dispatch in CO2 accounting.
    pub efficiency: f64,
    pub p_nom_opt: f64,
    pub p: Vec<f64>,
}

impl Generator {
    pub fn new(
        id: GenId,
        name: impl Into<String>,
        bus: impl Into<String>,
        carrier: impl Into<String>,
        p_nom: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            bus: bus.into(),
            carrier: carrier.into(),
            p_nom,
            p_nom_min: 0.0,
            p_nom_max: f64::INFINITY,
            p_nom_extendable: false,
            commitable: false,
            p_min_pu: TimeSeries::Static(0.0),
            p_max_pu: TimeSeries::Static(1.0),
            marginal_cost: 0.0,
            capital_cost: 0.0,
            efficiency: 1.0,
            p_nom_opt: p_nom,
            p: Vec::new(),
        }
    }

    pub fn extendable(mut self, p_nom_min: f64, p_nom_max: f64) -> Self {
        self.p_nom_extendable = true;
        self.p_nom_min = p_nom_min;
        self.p_nom_max = p_nom_max;
        self
    }

    pub fn with_marginal_cost(mut self, marginal_cost: f64) -> Self {
        self.marginal_cost = marginal_cost;
        self
    }

    pub fn with_capital_cost(mut self, capital_cost: f64) -> Self {
        self.capital_cost = capital_cost;
        self
    }

    pub fn with_p_max_pu(mut self, p_max_pu: impl Into<TimeSeries>) -> Self {
        self.p_max_pu = p_max_pu.into();
        self
    }

    pub fn with_efficiency(mut self, efficiency: f64) -> Self {
        self.efficiency = efficiency;
        self
    }
}

/// A bus-connected storage unit rated in power (MW) with an energy capacity
/// tied to the rating through `max_hours`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageUnit {
    pub id: StorageUnitId,
    pub name: String,
    pub bus: String,
    pub p_nom: f64,
    pub p_nom_min: f64,
    pub p_nom_max: f64,
    pub p_nom_extendable: bool,
    pub p_min_pu: f64,
    pub p_max_pu: f64,
    /// Energy capacity as hours at full rating.
    pub max_hours: f64,
    pub cyclic_state_of_charge: bool,
    pub state_of_charge_initial: f64,
    pub efficiency_store: f64,
    pub efficiency_dispatch: f64,
    /// Natural inflow (MW) per snapshot, e.g. hydro.
    pub inflow: TimeSeries,
    pub marginal_cost: f64,
    pub capital_cost: f64,
    pub p_nom_opt: f64,
    /// Net injection (dispatch minus store) per snapshot.
    pub p: Vec<f64>,
    pub state_of_charge: Vec<f64>,
    pub spill: Vec<f64>,
}

impl StorageUnit {
    pub fn new(
        id: StorageUnitId,
        name: impl Into<String>,
        bus: impl Into<String>,
        p_nom: f64,
        max_hours: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            bus: bus.into(),
            p_nom,
            p_nom_min: 0.0,
            p_nom_max: f64::INFINITY,
            p_nom_extendable: false,
            p_min_pu: -1.0,
            p_max_pu: 1.0,
            max_hours,
            cyclic_state_of_charge: false,
            state_of_charge_initial: 0.0,
            efficiency_store: 1.0,
            efficiency_dispatch: 1.0,
            inflow: TimeSeries::Static(0.0),
            marginal_cost: 0.0,
            capital_cost: 0.0,
            p_nom_opt: p_nom,
            p: Vec::new(),
            state_of_charge: Vec::new(),
            spill: Vec::new(),
        }
    }

    pub fn cyclic(mut self) -> Self {
        self.cyclic_state_of_charge = true;
        self
    }

    pub fn with_efficiencies(mut self, store: f64, dispatch: f64) -> Self {
        self.efficiency_store = store;
        self.efficiency_dispatch = dispatch;
        self
    }

    pub fn with_inflow(mut self, inflow: impl Into<TimeSeries>) -> Self {
        self.inflow = inflow.into();
        self
    }
}

/// A bus-connected energy store rated in energy (MWh).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub name: String,
    pub bus: String,
    pub e_nom: f64,
    pub e_nom_min: f64,
    pub e_nom_max: f64,
    pub e_nom_extendable: bool,
    pub e_min_pu: f64,
    pub e_max_pu: f64,
    pub max_hours: f64,
    pub cyclic_state_of_charge: bool,
    pub state_of_charge_initial: f64,
    pub efficiency_store: f64,
    pub efficiency_dispatch: f64,
    pub inflow: TimeSeries,
    pub marginal_cost: f64,
    pub capital_cost: f64,
    pub e_nom_opt: f64,
    pub p: Vec<f64>,
    pub state_of_charge: Vec<f64>,
    pub spill: Vec<f64>,
}

impl Store {
    pub fn new(
        id: StoreId,
        name: impl Into<String>,
        bus: impl Into<String>,
        e_nom: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            bus: bus.into(),
            e_nom,
            e_nom_min: 0.0,
            e_nom_max: f64::INFINITY,
            e_nom_extendable: false,
            e_min_pu: 0.0,
            e_max_pu: 1.0,
            max_hours: 1.0,
            cyclic_state_of_charge: false,
            state_of_charge_initial: 0.0,
            efficiency_store: 1.0,
            efficiency_dispatch: 1.0,
            inflow: TimeSeries::Static(0.0),
            marginal_cost: 0.0,
            capital_cost: 0.0,
            e_nom_opt: e_nom,
            p: Vec::new(),
            state_of_charge: Vec::new(),
            spill: Vec::new(),
        }
    }

    pub fn cyclic(mut self) -> Self {
        self.cyclic_state_of_charge = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Load {
    pub id: LoadId,
    pub name: String,
    pub bus: String,
    /// Demand (MW) per snapshot.
    pub p: Vec<f64>,
}

impl Load {
    pub fn new(
        id: LoadId,
        name: impl Into<String>,
        bus: impl Into<String>,
        p: Vec<f64>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            bus: bus.into(),
            p,
        }
    }
}

/// Energy carrier with its specific CO2 emissions (t/MWh thermal).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Carrier {
    pub name: String,
    pub co2_emissions: f64,
}

impl Carrier {
    pub fn new(name: impl Into<String>, co2_emissions: f64) -> Self {
        Self {
            name: name.into(),
            co2_emissions,
        }
    }
}

/// System-wide policy constraint kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalConstraintKind {
    /// Cap on weighted CO2 emissions from generation.
    Co2Limit,
    /// Cap on transmission expansion volume relative to the existing
    /// MW-km of the network.
    MwkmLimit,
    /// Floor on the renewable share of served demand.
    ResTarget,
    /// Renewable-share floor approximated by maximum availability.
    ApproxResTarget,
}

impl std::fmt::Display for GlobalConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlobalConstraintKind::Co2Limit => write!(f, "co2_limit"),
            GlobalConstraintKind::MwkmLimit => write!(f, "mwkm_limit"),
            GlobalConstraintKind::ResTarget => write!(f, "restarget"),
            GlobalConstraintKind::ApproxResTarget => write!(f, "approx_restarget"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConstraint {
    pub kind: GlobalConstraintKind,
    pub constant: f64,
}

impl GlobalConstraint {
    pub fn new(kind: GlobalConstraintKind, constant: f64) -> Self {
        Self { kind, constant }
    }
}

/// A single time slice with its weighting (e.g. hours represented).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Snapshot {
    pub weighting: f64,
}

impl Snapshot {
    pub fn new(weighting: f64) -> Self {
        Self { weighting }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self { weighting: 1.0 }
    }
}

/// The in-memory power network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Network {
    pub name: String,
    /// System base power (MVA) for per-unit conversions.
    pub s_base: f64,
    pub snapshots: Vec<Snapshot>,
    pub buses: Vec<Bus>,
    pub lines: Vec<Line>,
    pub links: Vec<Link>,
    pub generators: Vec<Generator>,
    pub storage_units: Vec<StorageUnit>,
    pub stores: Vec<Store>,
    pub loads: Vec<Load>,
    pub carriers: Vec<Carrier>,
    pub global_constraints: Vec<GlobalConstraint>,
}

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            s_base: 100.0,
            ..Self::default()
        }
    }

    /// Number of snapshots in the horizon.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Map from bus name to its position in `buses`.
    pub fn bus_index_map(&self) -> std::collections::HashMap<String, usize> {
        self.buses
            .iter()
            .enumerate()
            .map(|(i, b)| (b.name.clone(), i))
            .collect()
    }

    /// Per-unit reactance of a line: `x / (v_nom^2 / s_base)` on the bus0
    /// voltage level.
    pub fn line_x_pu(&self, line: &Line) -> ExopfResult<f64> {
        let bus = self
            .buses
            .iter()
            .find(|b| b.name == line.bus0)
            .ok_or_else(|| {
                ExopfError::Validation(format!(
                    "line {} references unknown bus {}",
                    line.name, line.bus0
                ))
            })?;
        if bus.v_nom <= 0.0 {
            return Err(ExopfError::Validation(format!(
                "bus {} has nonpositive v_nom",
                bus.name
            )));
        }
        Ok(line.x / (bus.v_nom * bus.v_nom / self.s_base))
    }

    /// Per-unit reactances of all lines, in table order.
    pub fn x_pu_vector(&self) -> ExopfResult<Vec<f64>> {
        self.lines.iter().map(|l| self.line_x_pu(l)).collect()
    }

    /// Specific CO2 emissions of a carrier, 0 for unknown carriers.
    pub fn carrier_co2(&self, name: &str) -> f64 {
        self.carriers
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.co2_emissions)
            .unwrap_or(0.0)
    }

    /// Compute basic statistics about the network.
    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            num_buses: self.buses.len(),
            num_lines: self.lines.len(),
            num_links: self.links.len(),
            num_gens: self.generators.len(),
            num_storage: self.storage_units.len() + self.stores.len(),
            num_loads: self.loads.len(),
            num_snapshots: self.snapshots.len(),
            total_load_mw: self
                .loads
                .iter()
                .flat_map(|l| l.p.iter())
                .copied()
                .sum::<f64>()
                / self.snapshots.len().max(1) as f64,
            total_gen_capacity_mw: self
                .generators
                .iter()
                .map(|g| g.p_nom)
                .filter(|v| v.is_finite())
                .sum(),
        }
    }

    /// Validate network data for issues that cause solver failures.
    ///
    /// Populates the provided [`Diagnostics`] with any warnings and errors
    /// found. This is the preferred validation method; [`Network::validate`]
    /// is the error-only convenience wrapper.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        let t = self.snapshots.len();

        if self.buses.is_empty() {
            diag.add_error("structure", "network has no buses");
            return; // nothing else to check against
        }
        if t == 0 {
            diag.add_error("structure", "network has no snapshots");
        }
        if self.generators.is_empty() {
            diag.add_error("structure", "network has no generators");
        }

        let bus_names: std::collections::HashSet<&str> =
            self.buses.iter().map(|b| b.name.as_str()).collect();

        for line in &self.lines {
            let entity = format!("line {}", line.name);
            for bus in [&line.bus0, &line.bus1] {
                if !bus_names.contains(bus.as_str()) {
                    diag.add_error_with_entity(
                        "reference",
                        &format!("{entity} references unknown bus {bus}"),
                        &entity,
                    );
                }
            }
            if line.x <= 0.0 {
                diag.add_error_with_entity(
                    "bounds",
                    &format!("line {} has nonpositive reactance", line.name),
                    &entity,
                );
            }
            if line.s_nom_extendable && line.s_nom_min > line.s_nom_max {
                diag.add_error_with_entity(
                    "bounds",
                    &format!("line {} has s_nom_min > s_nom_max", line.name),
                    &entity,
                );
            }
        }
        for link in &self.links {
            let entity = format!("link {}", link.name);
            for bus in [&link.bus0, &link.bus1] {
                if !bus_names.contains(bus.as_str()) {
                    diag.add_error_with_entity(
                        "reference",
                        &format!("{entity} references unknown bus {bus}"),
                        &entity,
                    );
                }
            }
            if link.p_nom_extendable && link.p_nom_min > link.p_nom_max {
                diag.add_error_with_entity(
                    "bounds",
                    &format!("link {} has p_nom_min > p_nom_max", link.name),
                    &entity,
                );
            }
        }
        for gen in &self.generators {
            let entity = format!("generator {}", gen.name);
            if !bus_names.contains(gen.bus.as_str()) {
                diag.add_error_with_entity(
                    "reference",
                    &format!("{entity} references unknown bus {}", gen.bus),
                    &entity,
                );
            }
            if gen.p_nom_extendable && gen.p_nom_min > gen.p_nom_max {
                diag.add_error_with_entity(
                    "bounds",
                    &format!("generator {} has p_nom_min > p_nom_max", gen.name),
                    &entity,
                );
            }
            if !gen.p_max_pu.matches_horizon(t) || !gen.p_min_pu.matches_horizon(t) {
                diag.add_error_with_entity(
                    "series",
                    &format!(
                        "generator {} has a per-unit series not matching the horizon",
                        gen.name
                    ),
                    &entity,
                );
            }
        }
        for su in &self.storage_units {
            let entity = format!("storage unit {}", su.name);
            if !bus_names.contains(su.bus.as_str()) {
                diag.add_error_with_entity(
                    "reference",
                    &format!("{entity} references unknown bus {}", su.bus),
                    &entity,
                );
            }
            if su.p_nom_extendable && su.p_nom_min > su.p_nom_max {
                diag.add_error_with_entity(
                    "bounds",
                    &format!("storage unit {} has p_nom_min > p_nom_max", su.name),
                    &entity,
                );
            }
            if !su.inflow.matches_horizon(t) {
                diag.add_error_with_entity(
                    "series",
                    &format!(
                        "storage unit {} has an inflow series not matching the horizon",
                        su.name
                    ),
                    &entity,
                );
            }
        }
        for store in &self.stores {
            let entity = format!("store {}", store.name);
            if !bus_names.contains(store.bus.as_str()) {
                diag.add_error_with_entity(
                    "reference",
                    &format!("{entity} references unknown bus {}", store.bus),
                    &entity,
                );
            }
            if store.e_nom_extendable && store.e_nom_min > store.e_nom_max {
                diag.add_error_with_entity(
                    "bounds",
                    &format!("store {} has e_nom_min > e_nom_max", store.name),
                    &entity,
                );
            }
            if !store.inflow.matches_horizon(t) {
                diag.add_error_with_entity(
                    "series",
                    &format!(
                        "store {} has an inflow series not matching the horizon",
                        store.name
                    ),
                    &entity,
                );
            }
        }
        for load in &self.loads {
            let entity = format!("load {}", load.name);
            if !bus_names.contains(load.bus.as_str()) {
                diag.add_error_with_entity(
                    "reference",
                    &format!("{entity} references unknown bus {}", load.bus),
                    &entity,
                );
            }
            if load.p.len() != t {
                diag.add_error_with_entity(
                    "series",
                    &format!(
                        "load {} has {} demand values for {} snapshots",
                        load.name,
                        load.p.len(),
                        t
                    ),
                    &entity,
                );
            }
        }

        let total_load: f64 = self.loads.iter().flat_map(|l| l.p.iter()).sum();
        if !self.loads.is_empty() && total_load.abs() < 1e-9 {
            diag.add_error(
                "capacity",
                &format!("total load is 0 MW but {} loads exist", self.loads.len()),
            );
        }

        // peak demand vs installed capacity, extendable headroom included;
        // a generator with unbounded headroom makes the check moot
        let unbounded = self
            .generators
            .iter()
            .any(|g| g.p_nom_extendable && !g.p_nom_max.is_finite());
        let capacity: f64 = self
            .generators
            .iter()
            .map(|g| {
                if g.p_nom_extendable {
                    g.p_nom.max(g.p_nom_max)
                } else {
                    g.p_nom
                }
            })
            .filter(|v| v.is_finite())
            .sum();
        let peak_load = (0..t)
            .map(|k| {
                self.loads
                    .iter()
                    .map(|l| l.p.get(k).copied().unwrap_or(0.0))
                    .sum::<f64>()
            })
            .fold(0.0_f64, f64::max);
        if !unbounded && peak_load > 0.0 && capacity < peak_load {
            diag.add_warning(
                "capacity",
                &format!(
                    "total generation capacity ({capacity:.1} MW) is less than peak load ({peak_load:.1} MW)"
                ),
            );
        }
    }

    /// Error messages from [`Network::validate_into`]; an empty vector
    /// means the network is structurally sound (warnings may still exist).
    pub fn validate(&self) -> Vec<String> {
        let mut diag = Diagnostics::new();
        self.validate_into(&mut diag);
        diag.errors().map(|i| i.message.clone()).collect()
    }
}

/// Statistics about a network's size and capacity.
#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_lines: usize,
    pub num_links: usize,
    pub num_gens: usize,
    pub num_storage: usize,
    pub num_loads: usize,
    pub num_snapshots: usize,
    /// Mean demand across snapshots.
    pub total_load_mw: f64,
    pub total_gen_capacity_mw: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} lines, {} links, {} gens ({:.0} MW), {} loads ({:.0} MW avg), {} snapshots",
            self.num_buses,
            self.num_lines,
            self.num_links,
            self.num_gens,
            self.total_gen_capacity_mw,
            self.num_loads,
            self.total_load_mw,
            self.num_snapshots
        )
    }
}
