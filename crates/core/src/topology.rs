use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{LeakError, Result};

/// Planar node position in network units (typically metres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Coordinate) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn midpoint(&self, other: &Coordinate) -> Coordinate {
        Coordinate::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Undirected link between two sensor nodes, with optional static attributes
/// (length, diameter, roughness, in that order when loaded from file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub attributes: Vec<f64>,
}

/// A network pipe, used to place ground-truth leaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipe {
    pub id: String,
    pub start_node: String,
    pub end_node: String,
    pub length: f64,
    pub diameter: f64,
    pub roughness: f64,
}

/// Static network description consumed by the detector: node positions,
/// the sensor graph and the pipe table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Topology {
    pub coordinates: IndexMap<String, Coordinate>,
    pub edges: Vec<Edge>,
    pub pipes: IndexMap<String, Pipe>,
}

impl Topology {
    pub fn coordinate(&self, node: &str) -> Option<Coordinate> {
        self.coordinates.get(node).copied()
    }

    pub fn has_sensor_graph(&self) -> bool {
        !self.edges.is_empty()
    }

    /// Midpoint of a pipe's end nodes, if the pipe and both coordinates exist.
    pub fn pipe_midpoint(&self, pipe_id: &str) -> Option<Coordinate> {
        let pipe = self.pipes.get(pipe_id)?;
        let a = self.coordinate(&pipe.start_node)?;
        let b = self.coordinate(&pipe.end_node)?;
        Some(a.midpoint(&b))
    }

    /// Resolve edges to column indices of `nodes`.
    ///
    /// Any endpoint missing from `nodes` is a topology mismatch.
    pub fn edge_indices(&self, nodes: &[String]) -> Result<Vec<(usize, usize)>> {
        let lookup = |name: &str| {
            nodes
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| LeakError::NodeNotFound(name.to_string()))
        };
        self.edges
            .iter()
            .map(|e| Ok((lookup(&e.source)?, lookup(&e.target)?)))
            .collect()
    }

    /// Width of the edge attribute vectors, or `None` when edges carry no
    /// attributes or disagree on their width.
    pub fn edge_attribute_dim(&self) -> Option<usize> {
        let first = self.edges.first()?.attributes.len();
        if first == 0 || self.edges.iter().any(|e| e.attributes.len() != first) {
            return None;
        }
        Some(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> Topology {
        let mut t = Topology::default();
        t.coordinates.insert("a".into(), Coordinate::new(0.0, 0.0));
        t.coordinates.insert("b".into(), Coordinate::new(4.0, 2.0));
        t.pipes.insert(
            "p1".into(),
            Pipe {
                id: "p1".into(),
                start_node: "a".into(),
                end_node: "b".into(),
                length: 10.0,
                diameter: 0.2,
                roughness: 100.0,
            },
        );
        t.edges.push(Edge {
            source: "a".into(),
            target: "b".into(),
            attributes: vec![10.0, 0.2, 100.0],
        });
        t
    }

    #[test]
    fn pipe_midpoint() {
        let mid = topology().pipe_midpoint("p1").unwrap();
        assert_eq!(mid, Coordinate::new(2.0, 1.0));
        assert!(topology().pipe_midpoint("nope").is_none());
    }

    #[test]
    fn edge_indices_mismatch() {
        let t = topology();
        let ok = t.edge_indices(&["b".into(), "a".into()]).unwrap();
        assert_eq!(ok, vec![(1, 0)]);
        assert!(matches!(
            t.edge_indices(&["a".into()]),
            Err(LeakError::NodeNotFound(n)) if n == "b"
        ));
    }

    #[test]
    fn attribute_dim() {
        let mut t = topology();
        assert_eq!(t.edge_attribute_dim(), Some(3));
        t.edges[0].attributes.clear();
        assert_eq!(t.edge_attribute_dim(), None);
    }

    #[test]
    fn distance() {
        let d = Coordinate::new(0.0, 0.0).distance(&Coordinate::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-12);
    }
}
