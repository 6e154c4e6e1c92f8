use std::sync::{Arc, RwLock};

use aquaguard_core::{LeakError, Result, TimeWindow};

use super::residual::PairwiseResidualModeler;
use crate::gnn::GnnDetector;

/// Everything fitted on a calibration window.
///
/// Written only by the training phase; detection reads it through the
/// [`SharedDetectorState`] handle.
#[derive(Debug, Default)]
pub struct DetectorState {
    /// Calibration window the models were fitted on.
    pub calibration: Option<TimeWindow>,
    /// Pressure columns the models were fitted on, in column order.
    pub nodes: Vec<String>,
    pub residuals: Option<PairwiseResidualModeler>,
    /// Trained autoencoder with its scaler and graph. `None` when the GNN
    /// stage was skipped.
    pub gnn: Option<GnnDetector>,
}

impl DetectorState {
    pub fn is_trained(&self) -> bool {
        self.residuals.is_some()
    }

    /// Models address sensors by column position, so a series must carry
    /// exactly the trained columns in the trained order.
    pub fn check_nodes(&self, nodes: &[String]) -> Result<()> {
        if nodes.len() != self.nodes.len() {
            return Err(LeakError::ShapeMismatch(format!(
                "series has {} pressure columns, detector was trained on {}",
                nodes.len(),
                self.nodes.len()
            )));
        }
        match nodes.iter().zip(&self.nodes).position(|(a, b)| a != b) {
            Some(p) => Err(LeakError::ShapeMismatch(format!(
                "pressure column {p} is '{}', detector was trained with '{}'",
                nodes[p], self.nodes[p]
            ))),
            None => Ok(()),
        }
    }
}

/// Thread-safe handle to detector state; retraining takes the write lock.
pub type SharedDetectorState = Arc<RwLock<DetectorState>>;

pub fn new_shared_state() -> SharedDetectorState {
    Arc::new(RwLock::new(DetectorState::default()))
}
