//! Loaders for SCADA exports, network topology and leak ground truth.

pub mod dataset;
pub mod error;
pub mod ground_truth;
pub mod inp;
pub mod network;
pub mod scada;

pub use dataset::Dataset;
pub use error::{IngestError, Result};
pub use ground_truth::read_ground_truth;
pub use inp::{read_inp, InpNetwork};
pub use network::{read_coordinates, read_edges};
pub use scada::{load_series, read_scada, ScadaTable};
