//! One-sided (upward) CUSUM change-point detection over per-node anomaly series.
//!
//! For each node a baseline mean/std is estimated from the first
//! `est_length` of non-zero history. Zeros in the aggregated anomaly series
//! mean "not currently the worst node", not a measured zero, so they are
//! excluded from the baseline but still drive the recurrence.

use chrono::{Duration, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use aquaguard_core::config::CusumConfig;
use aquaguard_core::{LeakEvent, NodeTable};

use super::stats::{mean, sample_std};

/// Baseline statistics and derived allowance/threshold for one node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CusumBaseline {
    pub mean: f64,
    pub std: f64,
    /// Allowance K = delta / 2 * std.
    pub allowance: f64,
    /// Alarm threshold H = c_thr * std.
    pub threshold: f64,
}

/// Alarm state of a single node. `Alarmed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlarmState {
    BelowThreshold,
    Alarmed { onset_index: usize },
}

/// Running CUSUM for one node.
#[derive(Debug, Clone)]
pub struct NodeCusum {
    baseline: CusumBaseline,
    statistic: f64,
    steps: usize,
    state: AlarmState,
}

impl NodeCusum {
    pub fn new(baseline: CusumBaseline) -> Self {
        Self {
            baseline,
            statistic: 0.0,
            steps: 0,
            state: AlarmState::BelowThreshold,
        }
    }

    /// Feed the next sample and return the updated statistic.
    ///
    /// The first sample only initializes (S[0] = 0). Non-finite samples hold
    /// the statistic.
    pub fn update(&mut self, value: f64) -> f64 {
        let t = self.steps;
        self.steps += 1;
        if t > 0 && value.is_finite() {
            let excess = value - self.baseline.mean - self.baseline.allowance;
            self.statistic = (self.statistic + excess).max(0.0);
        }
        if self.state == AlarmState::BelowThreshold && self.statistic > self.baseline.threshold {
            self.state = AlarmState::Alarmed { onset_index: t };
        }
        self.statistic
    }

    pub fn statistic(&self) -> f64 {
        self.statistic
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }
}

/// Result of running CUSUM over a table of anomaly series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CusumOutcome {
    /// First crossing per node, in column order. Nodes that never cross are absent.
    pub events: IndexMap<String, LeakEvent>,
    /// Full statistic table, same shape as the input.
    pub statistic: NodeTable,
    /// Baseline per node; `None` when there was too little non-zero history.
    pub baselines: Vec<Option<CusumBaseline>>,
}

impl CusumOutcome {
    /// Node to onset timestamp.
    pub fn onsets(&self) -> IndexMap<&str, NaiveDateTime> {
        self.events
            .iter()
            .map(|(node, e)| (node.as_str(), e.onset))
            .collect()
    }
}

/// CUSUM detector parameters.
#[derive(Debug, Clone)]
pub struct CusumDetector {
    delta: f64,
    c_thr: f64,
    est_length: Duration,
}

impl CusumDetector {
    pub fn new(config: &CusumConfig) -> Self {
        Self {
            delta: config.delta,
            c_thr: config.c_thr,
            est_length: config.est_length(),
        }
    }

    /// Build a baseline from explicit mean/std.
    pub fn baseline_from(&self, mean: f64, std: f64) -> CusumBaseline {
        let std = std.max(f64::EPSILON);
        CusumBaseline {
            mean,
            std,
            allowance: self.delta / 2.0 * std,
            threshold: self.c_thr * std,
        }
    }

    /// Estimate the baseline from the first `est_length` of non-zero history.
    pub fn estimate_baseline(
        &self,
        timestamps: &[NaiveDateTime],
        values: &[f64],
    ) -> Option<CusumBaseline> {
        let mut history = timestamps
            .iter()
            .zip(values)
            .filter(|(_, v)| v.is_finite() && **v != 0.0);
        let (&first_ts, &first) = history.next()?;
        let window_end = first_ts + self.est_length;

        let mut sample = vec![first];
        sample.extend(
            history
                .take_while(|(ts, _)| **ts <= window_end)
                .map(|(_, v)| *v),
        );

        let std = sample_std(&sample)?;
        if !std.is_finite() {
            return None;
        }
        Some(self.baseline_from(mean(&sample), std))
    }

    /// Run the recurrence over one series with a known baseline.
    ///
    /// Returns the statistic and the first crossing index, if any.
    pub fn run_series(values: &[f64], baseline: CusumBaseline) -> (Vec<f64>, Option<usize>) {
        let mut node = NodeCusum::new(baseline);
        let statistic: Vec<f64> = values.iter().map(|&v| node.update(v)).collect();
        let onset = match node.state() {
            AlarmState::Alarmed { onset_index } => Some(onset_index),
            AlarmState::BelowThreshold => None,
        };
        (statistic, onset)
    }

    /// Run CUSUM over every column of the table.
    pub fn detect(&self, table: &NodeTable) -> CusumOutcome {
        let mut statistic = NodeTable::zeros(table.timestamps.clone(), table.nodes.clone());
        let mut events = IndexMap::new();
        let mut baselines = Vec::with_capacity(table.nodes.len());

        for (idx, node) in table.nodes.iter().enumerate() {
            let Some(baseline) = self.estimate_baseline(&table.timestamps, table.column(idx))
            else {
                debug!(node = %node, "no usable baseline, node skipped");
                baselines.push(None);
                continue;
            };

            let (s, onset) = Self::run_series(table.column(idx), baseline);
            if let Some(t) = onset {
                debug!(node = %node, onset = %table.timestamps[t], severity = s[t], "cusum alarm");
                events.insert(
                    node.clone(),
                    LeakEvent {
                        node: node.clone(),
                        node_index: idx,
                        onset: table.timestamps[t],
                        onset_index: t,
                        severity: s[t],
                    },
                );
            }
            statistic.columns[idx] = s;
            baselines.push(Some(baseline));
        }

        CusumOutcome {
            events,
            statistic,
            baselines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(hours: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::hours(hours)
    }

    fn detector() -> CusumDetector {
        CusumDetector::new(&CusumConfig::default())
    }

    #[test]
    fn step_scenario_alarms_on_first_elevated_sample() {
        // mean 50, std 5, delta 4 -> K = 10; C_thr 3 -> H = 15.
        let baseline = detector().baseline_from(50.0, 5.0);
        assert_eq!(baseline.allowance, 10.0);
        assert_eq!(baseline.threshold, 15.0);

        let values = [50.0, 50.0, 50.0, 80.0, 80.0, 80.0];
        let (s, onset) = CusumDetector::run_series(&values, baseline);
        assert_eq!(onset, Some(3));
        assert_eq!(s[3], 20.0);
        assert_eq!(s[5], 60.0);
    }

    #[test]
    fn statistic_follows_recurrence() {
        let baseline = detector().baseline_from(1.0, 0.5);
        let values = [5.0, 0.0, 3.0, 0.2, 4.0, 0.0, 0.0, 2.5];
        let (s, _) = CusumDetector::run_series(&values, baseline);
        assert_eq!(s[0], 0.0);
        for t in 1..values.len() {
            let expected = (s[t - 1] + values[t] - baseline.mean - baseline.allowance).max(0.0);
            assert!((s[t] - expected).abs() < 1e-12);
            assert!(s[t] >= 0.0);
        }
    }

    #[test]
    fn alarm_is_terminal() {
        let baseline = detector().baseline_from(0.0, 1.0);
        // Crosses at t=1, decays to zero, crosses again at t=5.
        let values = [0.0, 10.0, 0.0, 0.0, 0.0, 10.0];
        let (s, onset) = CusumDetector::run_series(&values, baseline);
        assert_eq!(onset, Some(1));
        assert!(s[4] < s[1]);
    }

    #[test]
    fn baseline_ignores_zeros_and_respects_est_length() {
        let timestamps: Vec<_> = (0..200).map(ts).collect();
        let mut values = vec![0.0; 200];
        // Non-zero history starts at hour 10; 72 h window covers hours 10..=82.
        for (i, v) in values.iter_mut().enumerate().skip(10) {
            *v = if i <= 82 { 1.0 + (i % 2) as f64 } else { 100.0 };
        }
        let b = detector().estimate_baseline(&timestamps, &values).unwrap();
        assert!((b.mean - 1.5).abs() < 0.01, "mean = {}", b.mean);
    }

    #[test]
    fn detect_is_idempotent_and_skips_empty_nodes() {
        let timestamps: Vec<_> = (0..120).map(ts).collect();
        let mut table = NodeTable::zeros(timestamps, vec!["quiet".into(), "leaky".into(), "nan".into()]);
        for t in 0..120 {
            table.columns[1][t] = if t < 80 { 0.1 + 0.01 * (t % 3) as f64 } else { 0.9 };
            table.columns[2][t] = f64::NAN;
        }

        let d = detector();
        let a = d.detect(&table);
        let b = d.detect(&table);

        assert_eq!(a.events, b.events);
        assert_eq!(a.statistic, b.statistic);
        assert!(!a.events.contains_key("quiet"));
        assert!(!a.events.contains_key("nan"));
        let event = &a.events["leaky"];
        assert_eq!(event.onset_index, 80);
        assert_eq!(event.severity, a.statistic.get(1, 80));
        assert_eq!(a.onsets()["leaky"], ts(80));
    }

    #[test]
    fn empty_table_has_no_events() {
        let table = NodeTable::zeros(Vec::new(), vec!["a".into()]);
        let out = detector().detect(&table);
        assert!(out.events.is_empty());
    }
}
