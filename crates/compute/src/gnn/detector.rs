use chrono::{Duration, NaiveDateTime};
use ndarray::Array2;
use tracing::{debug, info, warn};

use aquaguard_core::{GnnConfig, SensorSeries, TimeWindow, Topology};

use super::features::{window_starts, WindowSummary};
use super::graph::SensorGraph;
use super::layer::{GatLayer, MessagePassing};
use super::model::{GraphAutoencoder, ModelShape};
use super::scaler::StandardScaler;
use super::trainer::{train_autoencoder, TrainingReport};
use super::GnnError;

/// A trained autoencoder together with everything needed to score new
/// windows: the sensor graph, the feature scaler and the window summary.
#[derive(Debug, Clone)]
pub struct GnnDetector<L: MessagePassing = GatLayer> {
    model: GraphAutoencoder<L>,
    scaler: StandardScaler,
    graph: SensorGraph,
    summary: WindowSummary,
    window_size: usize,
    lookback: Duration,
    report: TrainingReport,
}

impl<L: MessagePassing> GnnDetector<L> {
    /// Fit on sliding windows taken from the calibration period only.
    pub fn train(
        series: &SensorSeries,
        calibration: &TimeWindow,
        topology: &Topology,
        config: &GnnConfig,
    ) -> Result<Self, GnnError> {
        let graph = SensorGraph::from_topology(topology, series.nodes())?;
        let rows = series.range(calibration);
        if rows.is_empty() {
            return Err(GnnError::EmptyCalibration(calibration.to_string()));
        }

        let summary = WindowSummary::from_kind(config.summary, config.window_size);
        let starts = window_starts(rows.len(), config.window_size, config.stride);
        if starts.is_empty() {
            return Err(GnnError::InsufficientData {
                rows: rows.len(),
                window: config.window_size,
            });
        }

        let columns: Vec<&[f64]> = (0..series.node_count())
            .map(|n| &series.pressure(n)[rows.clone()])
            .collect();
        let raw: Vec<Array2<f64>> = starts
            .iter()
            .map(|&s| summary.window_matrix(&columns, s, config.window_size))
            .collect();
        let scaler = StandardScaler::fit(&raw);
        let samples: Vec<Array2<f64>> = raw.iter().map(|m| scaler.transform(m)).collect();
        debug!(
            windows = samples.len(),
            nodes = graph.num_nodes(),
            features = summary.dim(),
            "Built calibration windows"
        );

        let shape = ModelShape {
            feature_dim: summary.dim(),
            hidden_dim: config.hidden_dim,
            heads: config.heads,
            num_layers: config.num_layers,
            edge_dim: graph.edge_dim(),
        };
        let mut model = GraphAutoencoder::new(shape, config.seed);
        info!(params = model.param_count(), "Training graph autoencoder");
        let report = train_autoencoder(&mut model, &samples, &graph, config);

        Ok(Self {
            model,
            scaler,
            graph,
            summary,
            window_size: config.window_size,
            lookback: config.lookback(),
            report,
        })
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }

    pub fn model(&self) -> &GraphAutoencoder<L> {
        &self.model
    }

    /// Per-node reconstruction error of the window ending at `at`.
    ///
    /// The window is the last `window_size` rows within `[at - lookback, at]`.
    /// Returns `None` when that span holds too few rows or the series does
    /// not match the trained graph.
    pub fn node_errors(&self, series: &SensorSeries, at: NaiveDateTime) -> Option<Vec<f64>> {
        if series.node_count() != self.graph.num_nodes() {
            warn!(
                series = series.node_count(),
                graph = self.graph.num_nodes(),
                "Series does not match trained graph"
            );
            return None;
        }
        let span = series.range(&TimeWindow::new(at - self.lookback, at));
        if span.len() < self.window_size {
            debug!(%at, rows = span.len(), needed = self.window_size, "Not enough history for GNN window");
            return None;
        }
        let start = span.end - self.window_size;
        let columns: Vec<&[f64]> = (0..series.node_count()).map(|n| series.pressure(n)).collect();
        let raw = self.summary.window_matrix(&columns, start, self.window_size);
        let x = self.scaler.transform(&raw);
        let errors = self.model.reconstruction_error(&x, &self.graph);
        Some(errors.into_iter().map(|e| if e.is_finite() { e } else { 0.0 }).collect())
    }
}
