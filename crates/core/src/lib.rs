pub mod config;
pub mod error;
pub mod event;
pub mod ground_truth;
pub mod series;
pub mod table;
pub mod time;
pub mod topology;

pub use config::{
    Config, CusumConfig, DataConfig, DetectorConfig, GnnConfig, Learner, ResidualConfig,
    TriangulationConfig, WindowSummaryKind,
};
pub use error::*;
pub use event::*;
pub use ground_truth::GroundTruth;
pub use series::{SensorSeries, TimeWindow};
pub use table::NodeTable;
pub use topology::{Coordinate, Edge, Pipe, Topology};
pub use time::parse_timestamp;
