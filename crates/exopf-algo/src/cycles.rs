//! Fundamental cycle basis of the transmission graph.
//!
//! The Kirchhoff flow formulations replace angle variables with one voltage
//! law constraint per fundamental cycle: around every loop,
//! `sum(direction * x_pu * flow) = 0`. A spanning forest of the undirected
//! line multigraph yields the basis: every non-tree line closes exactly
//! one cycle with the tree path between its endpoints.

use exopf_core::{ExopfError, ExopfResult, Network};
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use std::collections::{HashMap, HashSet};

/// One fundamental cycle: line table indices with the parallel direction
/// vector (`+1` = traversed bus0 -> bus1, `-1` = opposite).
#[derive(Debug, Clone)]
pub struct Cycle {
    pub lines: Vec<usize>,
    pub directions: Vec<i8>,
}

impl Cycle {
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Arena of fundamental cycles.
#[derive(Debug, Clone, Default)]
pub struct CycleBasis {
    pub cycles: Vec<Cycle>,
}

impl CycleBasis {
    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }
}

/// Compute the fundamental cycle basis of the line graph.
///
/// Cycles of length <= 2 (self-loops and pairs of parallel circuits) are
/// discarded; a two-line loop carries no independent voltage-law
/// information at the fidelity of the linear formulations.
pub fn cycle_basis(network: &Network) -> ExopfResult<CycleBasis> {
    let bus_index = network.bus_index_map();

    let mut graph: UnGraph<(), usize> = UnGraph::default();
    let nodes: Vec<NodeIndex> = (0..network.buses.len())
        .map(|_| graph.add_node(()))
        .collect();

    for (line_idx, line) in network.lines.iter().enumerate() {
        let a = *bus_index.get(&line.bus0).ok_or_else(|| {
            ExopfError::Validation(format!(
                "line {} references unknown bus {}",
                line.name, line.bus0
            ))
        })?;
        let b = *bus_index.get(&line.bus1).ok_or_else(|| {
            ExopfError::Validation(format!(
                "line {} references unknown bus {}",
                line.name, line.bus1
            ))
        })?;
        // edge orientation (source, target) mirrors (bus0, bus1)
        graph.add_edge(nodes[a], nodes[b], line_idx);
    }

    // Spanning forest by iterative DFS over every component.
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut tree_edges: HashSet<EdgeIndex> = HashSet::new();
    let mut parent: HashMap<NodeIndex, (NodeIndex, EdgeIndex)> = HashMap::new();
    let mut depth: HashMap<NodeIndex, usize> = HashMap::new();

    for root in graph.node_indices() {
        if visited.contains(&root) {
            continue;
        }
        visited.insert(root);
        depth.insert(root, 0);
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let mut walker = graph.neighbors(node).detach();
            while let Some((edge, neighbor)) = walker.next(&graph) {
                if visited.contains(&neighbor) {
                    continue;
                }
                visited.insert(neighbor);
                tree_edges.insert(edge);
                parent.insert(neighbor, (node, edge));
                depth.insert(neighbor, depth[&node] + 1);
                stack.push(neighbor);
            }
        }
    }

    // Every chord closes one cycle: chord traversed bus0 -> bus1, then the
    // tree path from bus1 back to bus0 through the lowest common ancestor.
    let mut basis = CycleBasis::default();
    for edge in graph.edge_indices() {
        if tree_edges.contains(&edge) {
            continue;
        }
        let (source, target) = graph
            .edge_endpoints(edge)
            .expect("edge endpoints exist");
        if source == target {
            continue; // self-loop
        }

        let mut from_target = Vec::new(); // steps target -> lca
        let mut from_source = Vec::new(); // steps source -> lca
        let mut u = target;
        let mut v = source;
        while depth[&u] > depth[&v] {
            u = climb(&graph, &parent, u, &mut from_target);
        }
        while depth[&v] > depth[&u] {
            v = climb(&graph, &parent, v, &mut from_source);
        }
        while u != v {
            u = climb(&graph, &parent, u, &mut from_target);
            v = climb(&graph, &parent, v, &mut from_source);
        }

        let mut lines = vec![graph[edge]];
        let mut directions: Vec<i8> = vec![1];
        for (line, dir) in &from_target {
            lines.push(*line);
            directions.push(*dir);
        }
        // the source-side path is traversed lca -> source, i.e. reversed
        // and flipped
        for (line, dir) in from_source.iter().rev() {
            lines.push(*line);
            directions.push(-dir);
        }

        if lines.len() <= 2 {
            continue;
        }
        basis.cycles.push(Cycle { lines, directions });
    }

    Ok(basis)
}

/// One step from `node` to its tree parent; records the traversed line and
/// its direction relative to the stored bus0 -> bus1 orientation.
fn climb(
    graph: &UnGraph<(), usize>,
    parent: &HashMap<NodeIndex, (NodeIndex, EdgeIndex)>,
    node: NodeIndex,
    steps: &mut Vec<(usize, i8)>,
) -> NodeIndex {
    let (up, edge) = parent[&node];
    let (source, _) = graph.edge_endpoints(edge).expect("edge endpoints exist");
    let dir = if source == node { 1 } else { -1 };
    steps.push((graph[edge], dir));
    up
}
