use std::time::{Duration, Instant};

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;

/// Pipeline performance metrics, updated by each stage as it completes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineMetrics {
    /// When the last run finished.
    pub last_run: Option<NaiveDateTime>,

    // GNN training
    /// Duration of autoencoder training in milliseconds.
    pub gnn_train_ms: u64,
    pub gnn_epochs: usize,
    pub gnn_best_val_loss: Option<f64>,
    /// Why the GNN stage was skipped, if it was.
    pub gnn_skipped: Option<String>,

    // Residual modeling
    /// Duration of fitting the pairwise models in milliseconds.
    pub residual_ms: u64,
    /// Duration of the latest residual prediction over the detection series.
    pub residual_predict_ms: u64,
    pub pairs_fitted: usize,
    pub pairs_failed: usize,

    // CUSUM
    pub cusum_ms: u64,
    pub events_detected: usize,

    // Triangulation
    pub triangulation_ms: u64,
    pub events_localized: usize,
}

impl PipelineMetrics {
    pub fn record_gnn(&mut self, elapsed: Duration, epochs: usize, best_val_loss: f64) {
        self.gnn_train_ms = elapsed.as_millis() as u64;
        self.gnn_epochs = epochs;
        self.gnn_best_val_loss = best_val_loss.is_finite().then_some(best_val_loss);
        self.gnn_skipped = None;
    }

    pub fn record_gnn_skipped(&mut self, reason: impl Into<String>) {
        self.gnn_skipped = Some(reason.into());
        self.gnn_epochs = 0;
        self.gnn_best_val_loss = None;
    }

    pub fn record_residuals(&mut self, elapsed: Duration, fitted: usize, failed: usize) {
        self.residual_ms = elapsed.as_millis() as u64;
        self.pairs_fitted = fitted;
        self.pairs_failed = failed;
    }

    pub fn record_residual_prediction(&mut self, elapsed: Duration) {
        self.residual_predict_ms = elapsed.as_millis() as u64;
    }

    pub fn record_cusum(&mut self, elapsed: Duration, events: usize) {
        self.cusum_ms = elapsed.as_millis() as u64;
        self.events_detected = events;
    }

    pub fn record_triangulation(&mut self, elapsed: Duration, localized: usize) {
        self.triangulation_ms = elapsed.as_millis() as u64;
        self.events_localized = localized;
        self.last_run = Some(Utc::now().naive_utc());
    }

    /// Start a stage timer.
    pub fn timer(&self) -> StageTimer {
        StageTimer {
            start: Instant::now(),
        }
    }
}

/// A scoped timer for one pipeline stage.
pub struct StageTimer {
    start: Instant,
}

impl StageTimer {
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
