use aquaguard_core::WindowSummaryKind;
use ndarray::Array2;

use crate::algorithms::stats::{mean, population_std};

/// How a window of raw pressures becomes a node feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSummary {
    /// The window itself; feature width equals the window length.
    RawSequence { len: usize },
    /// `[mean, max, min, std]` of the window.
    RollingStats,
}

impl WindowSummary {
    pub fn from_kind(kind: WindowSummaryKind, window_size: usize) -> Self {
        match kind {
            WindowSummaryKind::RawSequence => Self::RawSequence { len: window_size },
            WindowSummaryKind::RollingStats => Self::RollingStats,
        }
    }

    pub fn dim(&self) -> usize {
        match self {
            Self::RawSequence { len } => *len,
            Self::RollingStats => 4,
        }
    }

    /// Summarize one node's window. Non-finite samples are ignored by the
    /// statistics and replaced by the finite mean in raw sequences.
    pub fn extract(&self, window: &[f64]) -> Vec<f64> {
        let finite: Vec<f64> = window.iter().copied().filter(|v| v.is_finite()).collect();
        let fill = if finite.is_empty() { 0.0 } else { mean(&finite) };
        match self {
            Self::RawSequence { len } => {
                let mut out: Vec<f64> = window
                    .iter()
                    .map(|v| if v.is_finite() { *v } else { fill })
                    .collect();
                out.resize(*len, fill);
                out
            }
            Self::RollingStats => {
                if finite.is_empty() {
                    return vec![0.0; 4];
                }
                let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
                vec![fill, max, min, population_std(&finite)]
            }
        }
    }

    /// Build the node-feature matrix for rows `start..start + window` of
    /// column-wise pressures.
    pub fn window_matrix(&self, columns: &[&[f64]], start: usize, window: usize) -> Array2<f64> {
        let mut m = Array2::zeros((columns.len(), self.dim()));
        for (mut row, col) in m.rows_mut().into_iter().zip(columns) {
            for (dst, v) in row.iter_mut().zip(self.extract(&col[start..start + window])) {
                *dst = v;
            }
        }
        m
    }
}

/// Start offsets of every full window of `window` rows taken every `stride`
/// rows from a span of `len` rows.
pub fn window_starts(len: usize, window: usize, stride: usize) -> Vec<usize> {
    if window == 0 || len < window {
        return Vec::new();
    }
    (0..=len - window).step_by(stride.max(1)).collect()
}
