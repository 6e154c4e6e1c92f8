//! Pairwise residual modeling.
//!
//! Each target sensor is predicted from a few reference sensors plus the
//! source flow. Positive deviations from each prediction form the residual
//! tensor `E[i, j, t]`, which is reduced to one sparse anomaly series per node.

use std::fmt;
use std::time::Instant;

use chrono::NaiveDateTime;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use aquaguard_core::{LeakError, NodeTable, ResidualConfig, Result, SensorSeries, TimeWindow};

use crate::algorithms::regression::{fit_regressor, FitError, Regressor, Sample};
use crate::algorithms::stats::{argmax, l2_norm};

/// Deterministic reference set of `target` among `n` sensors: predecessor,
/// successor and the sensor half way round. Self and duplicates are dropped.
pub fn reference_nodes(target: usize, n: usize) -> Vec<usize> {
    if n < 2 {
        return Vec::new();
    }
    let candidates = [(target + n - 1) % n, (target + 1) % n, (target + n / 2) % n];
    let mut refs = Vec::with_capacity(3);
    for j in candidates {
        if j != target && !refs.contains(&j) {
            refs.push(j);
        }
    }
    refs
}

fn features(reference_pressure: f64, flow: f64, epsilon: f64) -> Sample {
    [
        reference_pressure,
        flow,
        flow / (reference_pressure + epsilon),
    ]
}

struct PairModel {
    target: usize,
    reference: usize,
    model: Box<dyn Regressor>,
}

/// Fitted pair models in a flat arena, addressable by `(target, reference)`.
pub struct ModelArena {
    nodes: usize,
    index: Vec<Option<usize>>,
    models: Vec<PairModel>,
}

impl ModelArena {
    fn new(nodes: usize) -> Self {
        Self {
            nodes,
            index: vec![None; nodes * nodes],
            models: Vec::new(),
        }
    }

    fn insert(&mut self, target: usize, reference: usize, model: Box<dyn Regressor>) {
        self.index[target * self.nodes + reference] = Some(self.models.len());
        self.models.push(PairModel {
            target,
            reference,
            model,
        });
    }

    pub fn get(&self, target: usize, reference: usize) -> Option<&dyn Regressor> {
        if target >= self.nodes || reference >= self.nodes {
            return None;
        }
        self.index[target * self.nodes + reference].map(|k| self.models[k].model.as_ref())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Fitted `(target, reference)` pairs in fit order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.models.iter().map(|m| (m.target, m.reference))
    }
}

impl fmt::Debug for ModelArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelArena")
            .field("nodes", &self.nodes)
            .field("models", &self.models.len())
            .finish()
    }
}

/// Residuals `E[i, j, t]` for every fitted pair; unfitted pairs read as zero.
#[derive(Debug, Clone)]
pub struct ResidualTensor {
    nodes: Vec<String>,
    timestamps: Vec<NaiveDateTime>,
    index: Vec<Option<usize>>,
    /// One residual series per fitted pair.
    series: Vec<Vec<f64>>,
    /// References of each target with a fitted model, as series indices.
    by_target: Vec<Vec<usize>>,
}

impl ResidualTensor {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn get(&self, target: usize, reference: usize, t: usize) -> f64 {
        let n = self.nodes.len();
        self.index[target * n + reference].map_or(0.0, |k| self.series[k][t])
    }

    /// Sum and L2 norm of `E[target, :, t]`.
    fn row_summary(&self, target: usize, t: usize) -> (f64, f64) {
        let row: Vec<f64> = self.by_target[target]
            .iter()
            .map(|&k| self.series[k][t])
            .collect();
        (row.iter().sum(), l2_norm(&row))
    }

    /// Reduce to the per-node anomaly table: at each timestamp only the node
    /// with the largest summed residual (first on ties) gets a value, the L2
    /// norm of its residual row.
    pub fn aggregate(&self) -> NodeTable {
        let mut table = NodeTable::zeros(self.timestamps.clone(), self.nodes.clone());
        for t in 0..self.timestamps.len() {
            let summaries: Vec<(f64, f64)> = (0..self.nodes.len())
                .map(|i| self.row_summary(i, t))
                .collect();
            let sums: Vec<f64> = summaries.iter().map(|(s, _)| *s).collect();
            if let Some(worst) = argmax(&sums) {
                table.columns[worst][t] = summaries[worst].1;
            }
        }
        table
    }
}

/// Owns the pair models fitted on the calibration window.
#[derive(Debug)]
pub struct PairwiseResidualModeler {
    config: ResidualConfig,
    arena: ModelArena,
    failed: usize,
}

impl PairwiseResidualModeler {
    /// Fit one regressor per `(target, reference)` pair on the calibration
    /// rows. Pairs that cannot be fitted are logged and skipped.
    pub fn fit(
        series: &SensorSeries,
        calibration: &TimeWindow,
        config: &ResidualConfig,
    ) -> Result<Self> {
        let rows = series.range(calibration);
        if rows.is_empty() {
            return Err(LeakError::EmptyCalibration(calibration.to_string()));
        }
        let n = series.node_count();
        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| reference_nodes(i, n).into_iter().map(move |j| (i, j)))
            .collect();

        let start = Instant::now();
        let flow = series.flow();
        let fitted: Vec<(usize, usize, std::result::Result<Box<dyn Regressor>, FitError>)> = pairs
            .par_iter()
            .map(|&(i, j)| {
                let target = series.pressure(i);
                let reference = series.pressure(j);
                let mut xs = Vec::with_capacity(rows.len());
                let mut ys = Vec::with_capacity(rows.len());
                for t in rows.clone() {
                    let x = features(reference[t], flow[t], config.ratio_epsilon);
                    if target[t].is_finite() && x.iter().all(|v| v.is_finite()) {
                        xs.push(x);
                        ys.push(target[t]);
                    }
                }
                let stream = (i * n + j) as u64;
                (i, j, fit_regressor(config, stream, &xs, &ys))
            })
            .collect();

        let mut arena = ModelArena::new(n);
        let mut failed = 0;
        for (i, j, result) in fitted {
            match result {
                Ok(model) => arena.insert(i, j, model),
                Err(e) => {
                    warn!(
                        target_node = %series.nodes()[i],
                        reference_node = %series.nodes()[j],
                        error = %e,
                        "Pair model not fitted, using zero residual"
                    );
                    failed += 1;
                }
            }
        }

        info!(
            pairs = pairs.len(),
            fitted = arena.len(),
            failed,
            learner = ?config.learner,
            "Pair models fitted in {}ms",
            start.elapsed().as_millis()
        );

        Ok(Self {
            config: config.clone(),
            arena,
            failed,
        })
    }

    pub fn arena(&self) -> &ModelArena {
        &self.arena
    }

    pub fn fitted_pairs(&self) -> usize {
        self.arena.len()
    }

    pub fn failed_pairs(&self) -> usize {
        self.failed
    }

    /// Predict over the whole series and build the clipped residual tensor.
    pub fn residuals(&self, series: &SensorSeries) -> ResidualTensor {
        let n = series.node_count();
        let flow = series.flow();
        let eps = self.config.ratio_epsilon;

        let computed: Vec<Vec<f64>> = self
            .arena
            .models
            .par_iter()
            .map(|pair| {
                let target = series.pressure(pair.target);
                let reference = series.pressure(pair.reference);
                (0..series.len())
                    .map(|t| {
                        let x = features(reference[t], flow[t], eps);
                        if !target[t].is_finite() || x.iter().any(|v| !v.is_finite()) {
                            return 0.0;
                        }
                        clip_residual(target[t] - pair.model.predict(&x))
                    })
                    .collect()
            })
            .collect();

        let mut by_target = vec![Vec::new(); n];
        for (k, pair) in self.arena.models.iter().enumerate() {
            by_target[pair.target].push(k);
        }
        debug!(pairs = computed.len(), rows = series.len(), "Residual tensor built");

        ResidualTensor {
            nodes: series.nodes().to_vec(),
            timestamps: series.timestamps().to_vec(),
            index: self.arena.index.clone(),
            series: computed,
            by_target,
        }
    }
}

/// Keep only the positive part of `actual - predicted`, clipped to `[0, 1]`.
fn clip_residual(residual: f64) -> f64 {
    if !residual.is_finite() {
        return 0.0;
    }
    residual.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquaguard_core::Learner;
    use chrono::{Duration, NaiveDate};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    /// Four sensors tracking a demand cycle; sensor 2 is offset by `shift`
    /// from row `leak_at` onwards.
    fn series(rows: usize, leak_at: usize, shift: f64) -> SensorSeries {
        let timestamps: Vec<NaiveDateTime> = (0..rows)
            .map(|t| start() + Duration::minutes(5 * t as i64))
            .collect();
        let flow: Vec<f64> = (0..rows)
            .map(|t| 100.0 + 20.0 * (t as f64 * 0.05).sin())
            .collect();
        let pressures: Vec<Vec<f64>> = (0..4)
            .map(|node| {
                flow.iter()
                    .enumerate()
                    .map(|(t, f)| {
                        let wobble = 0.2 * (t as f64 * 0.13 + node as f64).cos();
                        let base = 60.0 - node as f64 - 0.05 * f + wobble;
                        if node == 2 && t >= leak_at {
                            base + shift
                        } else {
                            base
                        }
                    })
                    .collect()
            })
            .collect();
        let nodes = (1..=4).map(|i| format!("n{i}")).collect();
        SensorSeries::new(timestamps, nodes, pressures, "PUMP_1", flow).unwrap()
    }

    fn linear() -> ResidualConfig {
        ResidualConfig {
            learner: Learner::Linear,
            ..Default::default()
        }
    }

    #[test]
    fn reference_sets() {
        assert_eq!(reference_nodes(0, 4), vec![3, 1, 2]);
        assert_eq!(reference_nodes(1, 2), vec![0]);
        assert_eq!(reference_nodes(2, 3), vec![1, 0]);
        assert!(reference_nodes(0, 1).is_empty());
    }

    #[test]
    fn residuals_are_clipped_and_flag_the_shift() {
        let s = series(400, 300, 0.5);
        let calibration = TimeWindow::new(s.timestamps()[0], s.timestamps()[299]);
        let modeler = PairwiseResidualModeler::fit(&s, &calibration, &linear()).unwrap();
        assert_eq!(modeler.fitted_pairs() + modeler.failed_pairs(), 12);

        let tensor = modeler.residuals(&s);
        for i in 0..4 {
            for j in 0..4 {
                for t in 0..tensor.len() {
                    let e = tensor.get(i, j, t);
                    assert!((0.0..=1.0).contains(&e));
                }
            }
        }

        let mre = tensor.aggregate();
        // Every row has at most one non-zero entry.
        for t in 0..mre.rows() {
            assert!(mre.row(t).iter().filter(|v| **v != 0.0).count() <= 1);
        }
        assert_eq!(modeler.failed_pairs(), 0);
        assert!(modeler.arena().get(2, 1).is_some());
        assert!(tensor.get(2, 1, 350) > 0.2);
        assert!(mre.get(2, 350) > 0.0);
    }

    #[test]
    fn forest_pairs_fit_in_parallel() {
        let s = series(200, 150, 0.3);
        let calibration = TimeWindow::new(s.timestamps()[0], s.timestamps()[149]);
        let config = ResidualConfig {
            n_estimators: 10,
            ..Default::default()
        };
        let modeler = PairwiseResidualModeler::fit(&s, &calibration, &config).unwrap();
        assert_eq!(modeler.fitted_pairs(), 12);
        assert_eq!(modeler.failed_pairs(), 0);
        let pairs: Vec<(usize, usize)> = modeler.arena().pairs().collect();
        assert!(pairs.contains(&(0, 2)));
        assert!(modeler.arena().get(0, 0).is_none());
    }

    #[test]
    fn unfitted_pairs_read_zero() {
        let mut s = series(100, 100, 0.0);
        // Node 0 has no finite calibration data, so its pairs cannot be fitted.
        let nodes = s.nodes().to_vec();
        let mut pressures: Vec<Vec<f64>> = (0..4).map(|i| s.pressure(i).to_vec()).collect();
        pressures[0] = vec![f64::NAN; 100];
        s = SensorSeries::new(s.timestamps().to_vec(), nodes, pressures, "PUMP_1", s.flow().to_vec())
            .unwrap();
        let calibration = TimeWindow::new(s.timestamps()[0], s.timestamps()[99]);
        let modeler = PairwiseResidualModeler::fit(&s, &calibration, &linear()).unwrap();
        assert!(modeler.failed_pairs() >= 3);
        let tensor = modeler.residuals(&s);
        assert_eq!(tensor.get(0, 1, 10), 0.0);
        assert_eq!(tensor.aggregate().column(0).iter().sum::<f64>(), 0.0);
    }

    #[test]
    fn empty_calibration_is_an_error() {
        let s = series(50, 50, 0.0);
        let late = s.timestamps()[49] + Duration::days(1);
        let calibration = TimeWindow::new(late, late + Duration::days(1));
        assert!(matches!(
            PairwiseResidualModeler::fit(&s, &calibration, &linear()),
            Err(LeakError::EmptyCalibration(_))
        ));
    }
}
