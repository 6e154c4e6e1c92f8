//! Weighted-centroid leak localization over the most alarmed sensors.

use chrono::Duration;
use tracing::debug;

use aquaguard_core::{
    Coordinate, LeakEvent, NodeTable, SensorSeries, TimeWindow, Topology, TriangulationConfig,
    TriangulationResult,
};

use crate::algorithms::entropy::EntropyFeature;
use crate::algorithms::stats::{min_max_scale, sanitize};
use crate::gnn::GnnDetector;

/// Per-node raw signals gathered for one event.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalVectors {
    pub cusum: Vec<f64>,
    pub gnn: Vec<f64>,
    pub entropy: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Triangulator {
    config: TriangulationConfig,
    entropy_window: Duration,
}

impl Triangulator {
    /// `entropy_window` is the trailing span scored for entropy, normally the
    /// CUSUM baseline length.
    pub fn new(config: TriangulationConfig, entropy_window: Duration) -> Self {
        Self {
            config,
            entropy_window,
        }
    }

    pub fn config(&self) -> &TriangulationConfig {
        &self.config
    }

    /// Localize one event. `None` when the top sensors carry no CUSUM signal
    /// or none of them has a known position.
    pub fn localize(
        &self,
        event: &LeakEvent,
        cusum: &NodeTable,
        series: &SensorSeries,
        topology: &Topology,
        gnn: Option<&GnnDetector>,
    ) -> Option<TriangulationResult> {
        let row: Vec<f64> = cusum.row(event.onset_index).into_iter().map(sanitize).collect();
        let top = top_k(&row, self.config.top_k);
        if top.iter().map(|&i| row[i]).sum::<f64>() == 0.0 {
            debug!(node = %event.node, "No CUSUM signal at onset");
            return None;
        }

        let located: Vec<(usize, Coordinate)> = top
            .into_iter()
            .filter_map(|i| topology.coordinate(&cusum.nodes[i]).map(|c| (i, c)))
            .collect();
        if located.is_empty() {
            debug!(node = %event.node, "Top sensors have no coordinates");
            return None;
        }

        let gnn_errors = gnn.and_then(|g| g.node_errors(series, event.onset));
        let signals = SignalVectors {
            cusum: located.iter().map(|(i, _)| row[*i]).collect(),
            gnn: located
                .iter()
                .map(|(i, _)| {
                    gnn_errors
                        .as_ref()
                        .and_then(|e| e.get(*i))
                        .copied()
                        .map_or(0.0, sanitize)
                })
                .collect(),
            entropy: located
                .iter()
                .map(|(i, _)| self.entropy_score(series, &cusum.nodes[*i], event))
                .collect(),
        };

        let weights = blend_weights(&signals, self.config.w_gnn, self.config.w_ent);
        let coordinate = weighted_centroid(
            &located.iter().map(|(_, c)| *c).collect::<Vec<_>>(),
            &weights,
        );
        debug!(
            node = %event.node,
            x = coordinate.x,
            y = coordinate.y,
            ?signals,
            "Event triangulated"
        );

        Some(TriangulationResult {
            coordinate,
            nodes: located.iter().map(|(i, _)| cusum.nodes[*i].clone()).collect(),
            weights,
        })
    }

    /// Combined entropy of the node's pressure over `[onset - window, onset]`.
    fn entropy_score(&self, series: &SensorSeries, node: &str, event: &LeakEvent) -> f64 {
        let Some(idx) = series.node_index(node) else {
            return 0.0;
        };
        let rows = series.range(&TimeWindow::new(
            event.onset - self.entropy_window,
            event.onset,
        ));
        if rows.len() <= self.config.min_entropy_samples {
            return 0.0;
        }
        EntropyFeature::extract(
            &series.pressure(idx)[rows],
            self.config.permutation_order,
            self.config.permutation_delay,
            self.config.permutation_decimation,
        )
        .combined()
    }
}

/// Indices of the `k` largest values, descending; earlier index wins ties.
pub fn top_k(values: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    order.truncate(k);
    order
}

/// Normalized per-node weights.
///
/// When neither auxiliary signal separates the nodes (each is constant,
/// zero included) the CUSUM severities are used proportionally. Otherwise
/// each vector is min-max scaled and blended as
/// `cusum + w_gnn * gnn + w_ent * entropy`. All-zero weights become uniform.
pub fn blend_weights(signals: &SignalVectors, w_gnn: f64, w_ent: f64) -> Vec<f64> {
    let k = signals.cusum.len();
    if k == 0 {
        return Vec::new();
    }

    let raw: Vec<f64> = if flat(&signals.gnn) && flat(&signals.entropy) {
        signals.cusum.iter().map(|v| sanitize(*v).max(0.0)).collect()
    } else {
        let sc = min_max_scale(&signals.cusum);
        let sg = min_max_scale(&signals.gnn);
        let se = min_max_scale(&signals.entropy);
        (0..k)
            .map(|i| sanitize(sc[i] + w_gnn * sg[i] + w_ent * se[i]).max(0.0))
            .collect()
    };

    let total: f64 = raw.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return vec![1.0 / k as f64; k];
    }
    raw.iter().map(|w| w / total).collect()
}

/// No spread between the (sanitized) values.
fn flat(values: &[f64]) -> bool {
    let (min, max) = values
        .iter()
        .map(|v| sanitize(*v))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    max - min <= 0.0
}

pub fn weighted_centroid(coordinates: &[Coordinate], weights: &[f64]) -> Coordinate {
    let (x, y) = coordinates
        .iter()
        .zip(weights)
        .fold((0.0, 0.0), |(x, y), (c, w)| (x + c.x * w, y + c.y * w));
    Coordinate::new(x, y)
}
