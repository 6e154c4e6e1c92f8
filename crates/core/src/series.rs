use std::fmt;
use std::ops::Range;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{LeakError, Result};

/// Inclusive `[start, end]` timestamp range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts <= self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.start, self.end)
    }
}

/// Time-indexed pressure readings per sensor node plus the flow of one source.
///
/// Pressures are stored column-wise (`pressures[node][t]`) so per-node slices
/// are contiguous. Missing readings are `NaN`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorSeries {
    timestamps: Vec<NaiveDateTime>,
    nodes: Vec<String>,
    pressures: Vec<Vec<f64>>,
    flow_source: String,
    flow: Vec<f64>,
}

impl SensorSeries {
    /// Build a series, validating that every column matches the time index
    /// and that the index is strictly increasing.
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        nodes: Vec<String>,
        pressures: Vec<Vec<f64>>,
        flow_source: impl Into<String>,
        flow: Vec<f64>,
    ) -> Result<Self> {
        if nodes.len() != pressures.len() {
            return Err(LeakError::ShapeMismatch(format!(
                "{} node names for {} pressure columns",
                nodes.len(),
                pressures.len()
            )));
        }
        for (name, column) in nodes.iter().zip(&pressures) {
            if column.len() != timestamps.len() {
                return Err(LeakError::ShapeMismatch(format!(
                    "pressure column {name} has {} rows, index has {}",
                    column.len(),
                    timestamps.len()
                )));
            }
        }
        if flow.len() != timestamps.len() {
            return Err(LeakError::ShapeMismatch(format!(
                "flow column has {} rows, index has {}",
                flow.len(),
                timestamps.len()
            )));
        }
        if let Some(pos) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(LeakError::UnorderedIndex(pos + 1));
        }

        Ok(Self {
            timestamps,
            nodes,
            pressures,
            flow_source: flow_source.into(),
            flow,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty() || self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn flow_source(&self) -> &str {
        &self.flow_source
    }

    pub fn flow(&self) -> &[f64] {
        &self.flow
    }

    pub fn pressure(&self, node_index: usize) -> &[f64] {
        &self.pressures[node_index]
    }

    pub fn node_index(&self, node: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n == node)
    }

    /// Index of the exact timestamp, if present.
    pub fn time_index(&self, ts: NaiveDateTime) -> Option<usize> {
        self.timestamps.binary_search(&ts).ok()
    }

    /// Row range covered by an inclusive time window.
    pub fn range(&self, window: &TimeWindow) -> Range<usize> {
        let start = self.timestamps.partition_point(|t| *t < window.start);
        let end = self.timestamps.partition_point(|t| *t <= window.end);
        start..end.max(start)
    }

    /// Full row range as a window, or `None` for an empty series.
    pub fn full_window(&self) -> Option<TimeWindow> {
        Some(TimeWindow::new(
            *self.timestamps.first()?,
            *self.timestamps.last()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn ts(minutes: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::minutes(minutes)
    }

    fn series(rows: usize) -> SensorSeries {
        let timestamps: Vec<_> = (0..rows as i64).map(|i| ts(i * 5)).collect();
        SensorSeries::new(
            timestamps,
            vec!["n1".into(), "n2".into()],
            vec![vec![1.0; rows], vec![2.0; rows]],
            "PUMP_1",
            vec![10.0; rows],
        )
        .unwrap()
    }

    #[test]
    fn range_is_inclusive() {
        let s = series(10);
        let r = s.range(&TimeWindow::new(ts(5), ts(20)));
        assert_eq!(r, 1..5);
    }

    #[test]
    fn range_outside_index_is_empty() {
        let s = series(10);
        let r = s.range(&TimeWindow::new(ts(1000), ts(2000)));
        assert!(r.is_empty());
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = SensorSeries::new(
            vec![ts(0), ts(5)],
            vec!["n1".into()],
            vec![vec![1.0]],
            "PUMP_1",
            vec![1.0, 2.0],
        );
        assert!(matches!(err, Err(LeakError::ShapeMismatch(_))));
    }

    #[test]
    fn rejects_unordered_index() {
        let err = SensorSeries::new(
            vec![ts(5), ts(0)],
            vec!["n1".into()],
            vec![vec![1.0, 2.0]],
            "PUMP_1",
            vec![1.0, 2.0],
        );
        assert!(matches!(err, Err(LeakError::UnorderedIndex(1))));
    }

    #[test]
    fn node_lookup() {
        let s = series(3);
        assert_eq!(s.node_index("n2"), Some(1));
        assert_eq!(s.node_index("missing"), None);
        assert_eq!(s.time_index(ts(10)), Some(2));
    }
}
