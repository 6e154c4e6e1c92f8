use aquaguard_core::Topology;
use ndarray::{Array2, ArrayView1};

use super::GnnError;
use crate::algorithms::stats::{mean, population_std};

/// Sensor graph in incoming-adjacency (CSR) form, ready for message passing.
///
/// Every undirected edge is materialized in both directions and every node
/// gets a self-loop. Edge attributes are standardized per column; self-loops
/// carry a zero attribute vector (the standardized mean).
#[derive(Debug, Clone)]
pub struct SensorGraph {
    num_nodes: usize,
    edge_dim: usize,
    /// `offsets[i]..offsets[i + 1]` indexes the incoming slots of node `i`.
    offsets: Vec<usize>,
    /// Source node of each incoming slot.
    sources: Vec<usize>,
    /// Attributes of each incoming slot, `slots x edge_dim`.
    attributes: Array2<f64>,
}

impl SensorGraph {
    /// Build from resolved `(source, target)` index pairs with optional
    /// per-edge attribute rows.
    pub fn new(
        num_nodes: usize,
        edges: &[(usize, usize)],
        edge_attributes: Option<&[Vec<f64>]>,
    ) -> Self {
        let edge_dim = edge_attributes
            .and_then(|a| a.first().map(Vec::len))
            .unwrap_or(0);
        let standardized = edge_attributes
            .filter(|_| edge_dim > 0)
            .map(standardize_columns)
            .unwrap_or_default();

        // (target, source, attribute row) for both directions plus self-loops.
        let mut incoming: Vec<Vec<(usize, Option<usize>)>> = vec![Vec::new(); num_nodes];
        for (e, &(a, b)) in edges.iter().enumerate() {
            if a == b || a >= num_nodes || b >= num_nodes {
                continue;
            }
            let attr = (edge_dim > 0).then_some(e);
            incoming[b].push((a, attr));
            incoming[a].push((b, attr));
        }

        let mut offsets = Vec::with_capacity(num_nodes + 1);
        let mut sources = Vec::new();
        let mut slot_edges = Vec::new();
        offsets.push(0);
        for (target, slots) in incoming.iter().enumerate() {
            sources.push(target);
            slot_edges.push(None);
            for &(source, attr) in slots {
                sources.push(source);
                slot_edges.push(attr);
            }
            offsets.push(sources.len());
        }

        let mut attributes = Array2::zeros((sources.len(), edge_dim));
        for (mut row, edge) in attributes.rows_mut().into_iter().zip(&slot_edges) {
            if let Some(e) = edge {
                for (dst, v) in row.iter_mut().zip(&standardized[*e]) {
                    *dst = *v;
                }
            }
        }

        Self {
            num_nodes,
            edge_dim,
            offsets,
            sources,
            attributes,
        }
    }

    /// Resolve the topology's sensor edges against the series' node columns.
    pub fn from_topology(topology: &Topology, nodes: &[String]) -> Result<Self, GnnError> {
        if !topology.has_sensor_graph() {
            return Err(GnnError::MissingTopology);
        }
        let edges = topology
            .edge_indices(nodes)
            .map_err(|e| GnnError::TopologyMismatch(e.to_string()))?;
        let attributes: Option<Vec<Vec<f64>>> = topology
            .edge_attribute_dim()
            .map(|_| topology.edges.iter().map(|e| e.attributes.clone()).collect());
        Ok(Self::new(nodes.len(), &edges, attributes.as_deref()))
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn edge_dim(&self) -> usize {
        self.edge_dim
    }

    /// Incoming slot range of `target`.
    pub fn slots(&self, target: usize) -> std::ops::Range<usize> {
        self.offsets[target]..self.offsets[target + 1]
    }

    pub fn num_slots(&self) -> usize {
        self.sources.len()
    }

    pub fn source(&self, slot: usize) -> usize {
        self.sources[slot]
    }

    pub fn attributes(&self, slot: usize) -> ArrayView1<'_, f64> {
        self.attributes.row(slot)
    }

    /// Attributes of every slot, one row per slot.
    pub fn attribute_matrix(&self) -> &Array2<f64> {
        &self.attributes
    }
}

/// Zero-mean, unit-variance scaling per column; constant columns are only centred.
fn standardize_columns(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let dim = rows.first().map_or(0, Vec::len);
    let mut out = rows.to_vec();
    for c in 0..dim {
        let column: Vec<f64> = rows.iter().map(|r| r[c]).collect();
        let m = mean(&column);
        let s = population_std(&column);
        let s = if s > f64::EPSILON { s } else { 1.0 };
        for row in out.iter_mut() {
            row[c] = (row[c] - m) / s;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_directions_and_self_loops() {
        let g = SensorGraph::new(3, &[(0, 1), (1, 2)], None);
        assert_eq!(g.num_slots(), 3 + 4);
        let sources_of = |t: usize| -> Vec<usize> { g.slots(t).map(|s| g.source(s)).collect() };
        assert_eq!(sources_of(0), vec![0, 1]);
        assert_eq!(sources_of(1), vec![1, 0, 2]);
        assert_eq!(sources_of(2), vec![2, 1]);
        assert_eq!(g.edge_dim(), 0);
    }

    #[test]
    fn attributes_are_standardized() {
        let attrs = vec![vec![100.0, 0.3], vec![300.0, 0.3]];
        let g = SensorGraph::new(3, &[(0, 1), (1, 2)], Some(&attrs));
        assert_eq!(g.edge_dim(), 2);
        // Slot 1 of node 0 is the edge from node 1 (first edge).
        let slot = g.slots(0).start + 1;
        assert_eq!(g.attributes(slot).to_vec(), vec![-1.0, 0.0]);
        // Self-loop is all zeros.
        assert_eq!(g.attributes(g.slots(0).start).to_vec(), vec![0.0, 0.0]);
        assert_eq!(g.attribute_matrix().dim(), (g.num_slots(), 2));
    }
}
