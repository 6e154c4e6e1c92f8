//! Everything one pipeline run needs, loaded from a [`DataConfig`].

use std::path::{Path, PathBuf};

use chrono::Duration;
use tracing::{info, warn};

use aquaguard_core::{DataConfig, GroundTruth, SensorSeries, TimeWindow, Topology};

use crate::error::{IngestError, Result};
use crate::ground_truth::read_ground_truth;
use crate::inp::read_inp;
use crate::network::{read_coordinates, read_edges};
use crate::scada::{load_series, read_scada};

/// Calibration length used when no window is configured.
pub const DEFAULT_CALIBRATION_DAYS: i64 = 14;

#[derive(Debug, Clone)]
pub struct Dataset {
    pub series: SensorSeries,
    pub topology: Topology,
    pub ground_truth: Option<GroundTruth>,
}

impl Dataset {
    /// Load SCADA tables, then assemble the topology: the network model
    /// first, then the coordinate table and edge list, each overriding
    /// what came before.
    pub fn load(config: &DataConfig) -> Result<Self> {
        let pressures = read_scada(&config.pressures_path())?;
        let flows = read_scada(&config.flows_path())?;
        let series = load_series(&pressures, &flows, &config.flow_source)?;

        let mut topology = match &config.inp_file {
            Some(path) => read_inp(&resolve(&config.data_dir, path))?.topology(series.nodes()),
            None => Topology::default(),
        };
        if let Some(path) = &config.coordinates_file {
            let coordinates = read_coordinates(&resolve(&config.data_dir, path))?;
            topology.coordinates.extend(coordinates);
        }
        if let Some(path) = &config.edges_file {
            topology.edges = read_edges(&resolve(&config.data_dir, path), series.nodes())?;
        }

        let unplaced = series
            .nodes()
            .iter()
            .filter(|n| topology.coordinate(n).is_none())
            .count();
        if unplaced > 0 {
            warn!(unplaced, "Sensors without coordinates cannot be localized");
        }

        // Ground truth only feeds evaluation; a bad file must not stop detection.
        let ground_truth = config.ground_truth_file.as_ref().and_then(|path| {
            let path = resolve(&config.data_dir, path);
            match read_ground_truth(&path) {
                Ok(truth) => Some(truth),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ground truth not loaded, evaluation disabled");
                    None
                }
            }
        });

        info!(
            sensors = series.node_count(),
            rows = series.len(),
            edges = topology.edges.len(),
            pipes = topology.pipes.len(),
            ground_truth = ground_truth.is_some(),
            "Dataset ready"
        );
        Ok(Self {
            series,
            topology,
            ground_truth,
        })
    }

    /// The configured calibration window, or the first
    /// [`DEFAULT_CALIBRATION_DAYS`] of the series.
    pub fn calibration(&self, config: &DataConfig) -> Result<TimeWindow> {
        if let Some(window) = config.calibration_window()? {
            return Ok(window);
        }
        let full = self.series.full_window().ok_or_else(|| {
            IngestError::IndexMismatch("series has no rows to calibrate on".to_string())
        })?;
        let end = (full.start + Duration::days(DEFAULT_CALIBRATION_DAYS) - Duration::seconds(1))
            .min(full.end);
        Ok(TimeWindow::new(full.start, end))
    }
}

/// Relative paths that do not exist from the working directory are looked
/// up under the data directory.
fn resolve(data_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() || path.exists() {
        path.to_path_buf()
    } else {
        data_dir.join(path)
    }
}
