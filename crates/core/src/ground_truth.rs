use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::topology::{Coordinate, Topology};

/// Time-indexed leak flags/severities per pipe, used for evaluation only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundTruth {
    pub timestamps: Vec<NaiveDateTime>,
    pub pipes: IndexMap<String, Vec<f64>>,
}

impl GroundTruth {
    /// Pipes whose maximum flag is positive at any point in time.
    pub fn active_pipes(&self) -> Vec<&str> {
        self.pipes
            .iter()
            .filter(|(_, values)| {
                values
                    .iter()
                    .filter(|v| v.is_finite())
                    .any(|v| *v > 0.0)
            })
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Midpoints of active pipes that the topology can place.
    pub fn leak_positions(&self, topology: &Topology) -> Vec<(String, Coordinate)> {
        self.active_pipes()
            .into_iter()
            .filter_map(|id| topology.pipe_midpoint(id).map(|c| (id.to_string(), c)))
            .collect()
    }
}
