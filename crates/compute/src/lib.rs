pub mod algorithms;
pub mod gnn;
pub mod pipeline;

pub use algorithms::cusum::{CusumDetector, CusumOutcome};
pub use algorithms::entropy::EntropyFeature;
pub use gnn::{GnnDetector, GnnError};
pub use pipeline::evaluate::{evaluate, Evaluation};
pub use pipeline::metrics::PipelineMetrics;
pub use pipeline::residual::{PairwiseResidualModeler, ResidualTensor};
pub use pipeline::state::{new_shared_state, DetectorState, SharedDetectorState};
pub use pipeline::triangulate::Triangulator;
pub use pipeline::{DetectionReport, LeakPipeline, PipelineSummary};
