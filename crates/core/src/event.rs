use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::topology::Coordinate;

/// First CUSUM threshold crossing for a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakEvent {
    pub node: String,
    pub node_index: usize,
    pub onset: NaiveDateTime,
    /// Row of `onset` in the CUSUM table.
    pub onset_index: usize,
    /// CUSUM value at onset.
    pub severity: f64,
}

/// Weighted-centroid position estimate for one leak event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangulationResult {
    pub coordinate: Coordinate,
    pub nodes: Vec<String>,
    /// Non-negative, sums to 1, aligned with `nodes`.
    pub weights: Vec<f64>,
}

/// One row of the detection report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizedLeak {
    pub detected_node: String,
    pub estimated_start_time: NaiveDateTime,
    pub estimated_cusum_severity: f64,
    pub localization: Option<TriangulationResult>,
}
