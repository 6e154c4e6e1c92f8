use std::fs::File;
use std::path::Path;

use tracing::info;

use aquaguard_core::GroundTruth;

use crate::error::{IngestError, Result};
use crate::scada::parse_scada;

/// Read a leakage table: `Timestamp` plus one column per pipe id, in the
/// SCADA export format. Empty cells mean no leak.
pub fn read_ground_truth(path: &Path) -> Result<GroundTruth> {
    let file = File::open(path).map_err(|e| IngestError::io(path, e))?;
    let table = parse_scada(file, &path.display().to_string())?;
    let truth = GroundTruth {
        timestamps: table.timestamps,
        pipes: table
            .columns
            .into_iter()
            .map(|(pipe, values)| {
                let values = values
                    .into_iter()
                    .map(|v| if v.is_nan() { 0.0 } else { v })
                    .collect();
                (pipe, values)
            })
            .collect(),
    };
    info!(
        path = %path.display(),
        pipes = truth.pipes.len(),
        active = truth.active_pipes().len(),
        "Ground truth loaded"
    );
    Ok(truth)
}
