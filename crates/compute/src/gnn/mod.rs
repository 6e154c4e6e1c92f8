//! Graph autoencoder over the sensor network.
//!
//! Nodes are pressure sensors, features are summaries of sliding pressure
//! windows. A model trained on calibration windows reconstructs normal
//! behaviour; per-node reconstruction error at a leak onset is one of the
//! triangulation signals.

pub mod detector;
pub mod features;
pub mod graph;
pub mod layer;
pub mod model;
pub mod norm;
pub mod optimizer;
pub mod scaler;
pub mod trainer;

use thiserror::Error;

pub use detector::GnnDetector;
pub use features::WindowSummary;
pub use graph::SensorGraph;
pub use layer::{GatLayer, LayerSpec, MessagePassing};
pub use model::{GraphAutoencoder, ModelShape};
pub use trainer::TrainingReport;

#[derive(Debug, Error)]
pub enum GnnError {
    #[error("no sensor graph available")]
    MissingTopology,

    #[error("sensor graph does not match pressure columns: {0}")]
    TopologyMismatch(String),

    #[error("calibration window {0} selects no rows")]
    EmptyCalibration(String),

    #[error("calibration span has {rows} rows, need at least {window} for one window")]
    InsufficientData { rows: usize, window: usize },
}
