use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A time-indexed table with one numeric column per node.
///
/// Used for the aggregated anomaly series and for the CUSUM statistic.
/// Columns are stored contiguously: `columns[node][t]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTable {
    pub timestamps: Vec<NaiveDateTime>,
    pub nodes: Vec<String>,
    pub columns: Vec<Vec<f64>>,
}

impl NodeTable {
    /// All-zero table with the given index and node columns.
    pub fn zeros(timestamps: Vec<NaiveDateTime>, nodes: Vec<String>) -> Self {
        let rows = timestamps.len();
        let columns = vec![vec![0.0; rows]; nodes.len()];
        Self {
            timestamps,
            nodes,
            columns,
        }
    }

    pub fn rows(&self) -> usize {
        self.timestamps.len()
    }

    pub fn column(&self, node_index: usize) -> &[f64] {
        &self.columns[node_index]
    }

    pub fn node_index(&self, node: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n == node)
    }

    pub fn time_index(&self, ts: NaiveDateTime) -> Option<usize> {
        self.timestamps.binary_search(&ts).ok()
    }

    /// Values of every node at row `t`, in column order.
    pub fn row(&self, t: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[t]).collect()
    }

    pub fn get(&self, node_index: usize, t: usize) -> f64 {
        self.columns[node_index][t]
    }
}
