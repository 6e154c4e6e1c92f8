//! Leak detection pipeline orchestrator.
//!
//! Wires the stages together over a calibration window and the full series:
//!
//! - **Train**: graph autoencoder and pairwise residual models on calibration.
//! - **Detect**: residual tensor, anomaly aggregation, CUSUM onsets.
//! - **Localize**: triangulation per event, optional ground-truth scoring.

pub mod evaluate;
pub mod metrics;
pub mod residual;
pub mod state;
pub mod triangulate;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use aquaguard_core::{
    DetectorConfig, GroundTruth, LeakError, LocalizedLeak, NodeTable, Result, SensorSeries,
    TimeWindow, Topology,
};

use crate::algorithms::cusum::CusumDetector;
use crate::gnn::GnnDetector;

use self::evaluate::{evaluate, Evaluation};
use self::metrics::PipelineMetrics;
use self::residual::PairwiseResidualModeler;
use self::state::{new_shared_state, DetectorState, SharedDetectorState};
use self::triangulate::Triangulator;

/// Headline numbers of one run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub leaks_detected: usize,
    /// Every pipe leaking at some point in the ground truth, placed or not.
    pub ground_truth_leaks: Option<usize>,
    pub mean_localization_error: Option<f64>,
    pub baseline_error: Option<f64>,
    pub improvement_pct: Option<f64>,
    pub w_gnn: f64,
    pub w_ent: f64,
}

/// Full output of a detection run.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub calibration: TimeWindow,
    /// Node to onset, in column order.
    pub onsets: IndexMap<String, NaiveDateTime>,
    pub leaks: Vec<LocalizedLeak>,
    pub summary: PipelineSummary,
    pub evaluation: Option<Evaluation>,
    pub metrics: PipelineMetrics,
    /// Aggregated residual anomaly series.
    #[serde(skip)]
    pub anomaly: NodeTable,
    /// CUSUM statistic per node.
    #[serde(skip)]
    pub cusum: NodeTable,
}

impl DetectionReport {
    /// Score the localized leaks against ground truth and fill the summary.
    pub fn evaluate_against(
        &mut self,
        truth: &GroundTruth,
        topology: &Topology,
        baseline_error: Option<f64>,
    ) {
        let positions = truth.leak_positions(topology);
        if positions.is_empty() {
            warn!("No ground-truth leak has a known position, skipping evaluation");
        }
        let evaluation = evaluate(&self.leaks, &positions);
        info!(
            mean_error = ?evaluation.mean_error,
            scored = evaluation.distances.len(),
            truth = truth.active_pipes().len(),
            placed = evaluation.placed_leaks,
            "Localization evaluated"
        );
        self.summary.ground_truth_leaks = Some(truth.active_pipes().len());
        self.summary.mean_localization_error = evaluation.mean_error;
        self.summary.baseline_error = baseline_error;
        self.summary.improvement_pct = baseline_error.and_then(|b| evaluation.improvement_pct(b));
        self.evaluation = Some(evaluation);
    }
}

/// Main pipeline orchestrator.
pub struct LeakPipeline {
    config: DetectorConfig,
    state: SharedDetectorState,
    /// Stage metrics of the most recent train/detect calls.
    pub metrics: PipelineMetrics,
}

impl LeakPipeline {
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_state(config, new_shared_state())
    }

    /// Share trained state with other readers.
    pub fn with_state(config: DetectorConfig, state: SharedDetectorState) -> Self {
        Self {
            config,
            state,
            metrics: PipelineMetrics::default(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn state(&self) -> SharedDetectorState {
        self.state.clone()
    }

    /// Fit every model on the calibration window and replace the detector
    /// state. A GNN that cannot be trained is skipped, not fatal.
    pub fn train(
        &mut self,
        series: &SensorSeries,
        calibration: &TimeWindow,
        topology: &Topology,
    ) -> Result<()> {
        validate(series, calibration)?;
        info!(%calibration, nodes = series.node_count(), rows = series.len(), "Training detector");

        let gnn = if self.config.gnn.enabled {
            let timer = self.metrics.timer();
            match GnnDetector::train(series, calibration, topology, &self.config.gnn) {
                Ok(detector) => {
                    let report = detector.report();
                    self.metrics
                        .record_gnn(timer.elapsed(), report.epochs_run, report.best_val_loss);
                    Some(detector)
                }
                Err(e) => {
                    warn!(error = %e, "GNN stage skipped, continuing with CUSUM and entropy");
                    self.metrics.record_gnn_skipped(e.to_string());
                    None
                }
            }
        } else {
            self.metrics.record_gnn_skipped("disabled by configuration");
            None
        };

        let timer = self.metrics.timer();
        let residuals = PairwiseResidualModeler::fit(series, calibration, &self.config.residual)?;
        self.metrics.record_residuals(
            timer.elapsed(),
            residuals.fitted_pairs(),
            residuals.failed_pairs(),
        );

        let mut state = self
            .state
            .write()
            .map_err(|e| LeakError::LockPoisoned(e.to_string()))?;
        *state = DetectorState {
            calibration: Some(*calibration),
            nodes: series.nodes().to_vec(),
            residuals: Some(residuals),
            gnn,
        };
        Ok(())
    }

    /// Detect and localize leaks over the whole series with the trained state.
    pub fn detect(&mut self, series: &SensorSeries, topology: &Topology) -> Result<DetectionReport> {
        if series.is_empty() || series.node_count() == 0 {
            return Err(LeakError::EmptySeries);
        }
        let state = self
            .state
            .read()
            .map_err(|e| LeakError::LockPoisoned(e.to_string()))?;
        let (Some(calibration), Some(residuals)) = (state.calibration, state.residuals.as_ref())
        else {
            return Err(LeakError::NotTrained);
        };
        state.check_nodes(series.nodes())?;

        let timer = self.metrics.timer();
        let anomaly = residuals.residuals(series).aggregate();
        self.metrics.record_residual_prediction(timer.elapsed());

        let timer = self.metrics.timer();
        let outcome = CusumDetector::new(&self.config.cusum).detect(&anomaly);
        self.metrics.record_cusum(timer.elapsed(), outcome.events.len());
        info!(events = outcome.events.len(), "CUSUM onsets detected");

        let timer = self.metrics.timer();
        let gnn = state.gnn.as_ref();
        let triangulator = Triangulator::new(
            self.config.triangulation.clone(),
            self.config.cusum.est_length(),
        );
        let leaks: Vec<LocalizedLeak> = outcome
            .events
            .values()
            .collect::<Vec<_>>()
            .par_iter()
            .map(|event| LocalizedLeak {
                detected_node: event.node.clone(),
                estimated_start_time: event.onset,
                estimated_cusum_severity: event.severity,
                localization: triangulator.localize(
                    event,
                    &outcome.statistic,
                    series,
                    topology,
                    gnn,
                ),
            })
            .collect();
        let localized = leaks.iter().filter(|l| l.localization.is_some()).count();
        self.metrics.record_triangulation(timer.elapsed(), localized);
        info!(
            events = leaks.len(),
            localized,
            gnn = gnn.is_some(),
            "Triangulation complete"
        );

        Ok(DetectionReport {
            calibration,
            onsets: outcome
                .events
                .iter()
                .map(|(node, e)| (node.clone(), e.onset))
                .collect(),
            summary: PipelineSummary {
                leaks_detected: leaks.len(),
                ground_truth_leaks: None,
                mean_localization_error: None,
                baseline_error: None,
                improvement_pct: None,
                w_gnn: self.config.triangulation.w_gnn,
                w_ent: self.config.triangulation.w_ent,
            },
            leaks,
            evaluation: None,
            metrics: self.metrics.clone(),
            anomaly,
            cusum: outcome.statistic,
        })
    }

    /// Train, detect and, when ground truth is supplied, evaluate.
    pub fn run(
        &mut self,
        series: &SensorSeries,
        calibration: &TimeWindow,
        topology: &Topology,
        ground_truth: Option<&GroundTruth>,
        baseline_error: Option<f64>,
    ) -> Result<DetectionReport> {
        self.train(series, calibration, topology)?;
        let mut report = self.detect(series, topology)?;
        if let Some(truth) = ground_truth {
            report.evaluate_against(truth, topology, baseline_error);
        }
        Ok(report)
    }
}

fn validate(series: &SensorSeries, calibration: &TimeWindow) -> Result<()> {
    if series.is_empty() || series.node_count() == 0 {
        return Err(LeakError::EmptySeries);
    }
    if series.range(calibration).is_empty() {
        return Err(LeakError::EmptyCalibration(calibration.to_string()));
    }
    Ok(())
}
