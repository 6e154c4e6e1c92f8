use chrono::{Duration, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;

use aquaguard_core::{
    Coordinate, DetectorConfig, Edge, GnnConfig, GroundTruth, Learner, Pipe, SensorSeries,
    TimeWindow, Topology,
};

pub const NODES: usize = 6;
/// Rows per day at 5-minute sampling.
pub const DAY: usize = 288;
/// Calibration covers the first four days.
pub const CALIBRATION_ROWS: usize = 4 * DAY;
/// The anomaly at `n4` starts half way through day five.
pub const ANOMALY_ROW: usize = 4 * DAY + DAY / 2;
pub const TOTAL_ROWS: usize = 6 * DAY;

pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2019, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn ts(row: usize) -> NaiveDateTime {
    start() + Duration::minutes(5 * row as i64)
}

pub fn node(i: usize) -> String {
    format!("n{}", i + 1)
}

/// Six sensors sharing a daily demand cycle, each with its own periodic
/// disturbance. From `ANOMALY_ROW` on, `n4` reads 2 m above normal.
pub fn series() -> SensorSeries {
    let periods = [37.0, 41.0, 43.0, 47.0, 53.0, 59.0];
    let flow: Vec<f64> = (0..TOTAL_ROWS)
        .map(|t| {
            let day_phase = t as f64 / DAY as f64 * std::f64::consts::TAU;
            100.0 + 30.0 * day_phase.sin()
        })
        .collect();
    let pressures: Vec<Vec<f64>> = (0..NODES)
        .map(|i| {
            flow.iter()
                .enumerate()
                .map(|(t, f)| {
                    let wobble = 0.3 * (t as f64 / periods[i] * std::f64::consts::TAU).sin();
                    let base = 55.0 - 1.5 * i as f64 - 0.08 * f + wobble;
                    if i == 3 && t >= ANOMALY_ROW {
                        base + 2.0
                    } else {
                        base
                    }
                })
                .collect()
        })
        .collect();
    SensorSeries::new(
        (0..TOTAL_ROWS).map(ts).collect(),
        (0..NODES).map(node).collect(),
        pressures,
        "PUMP_1",
        flow,
    )
    .unwrap()
}

/// Rebuild `series` from the given `(node, pressures)` columns.
pub fn with_columns(series: &SensorSeries, columns: Vec<(String, Vec<f64>)>) -> SensorSeries {
    let (nodes, pressures) = columns.into_iter().unzip();
    SensorSeries::new(
        series.timestamps().to_vec(),
        nodes,
        pressures,
        series.flow_source(),
        series.flow().to_vec(),
    )
    .unwrap()
}

/// The columns of `series` at `indices`, in that order.
pub fn select_columns(series: &SensorSeries, indices: &[usize]) -> SensorSeries {
    let columns = indices
        .iter()
        .map(|&i| (series.nodes()[i].clone(), series.pressure(i).to_vec()))
        .collect();
    with_columns(series, columns)
}

pub fn calibration() -> TimeWindow {
    TimeWindow::new(ts(0), ts(CALIBRATION_ROWS - 1))
}

/// Sensors on a circle of radius 100, ring edges with pipe attributes and
/// one pipe per ring segment.
pub fn topology() -> Topology {
    let mut coordinates = IndexMap::new();
    for i in 0..NODES {
        let angle = i as f64 / NODES as f64 * std::f64::consts::TAU;
        coordinates.insert(node(i), Coordinate::new(100.0 * angle.cos(), 100.0 * angle.sin()));
    }
    let mut edges = Vec::new();
    let mut pipes = IndexMap::new();
    for i in 0..NODES {
        let j = (i + 1) % NODES;
        edges.push(Edge {
            source: node(i),
            target: node(j),
            attributes: vec![100.0 + 10.0 * i as f64, 0.3, 120.0],
        });
        let id = format!("p{}{}", i + 1, j + 1);
        pipes.insert(
            id.clone(),
            Pipe {
                id,
                start_node: node(i),
                end_node: node(j),
                length: 100.0,
                diameter: 0.3,
                roughness: 120.0,
            },
        );
    }
    Topology {
        coordinates,
        edges,
        pipes,
    }
}

/// Ground truth flagging the pipe between `n4` and `n5`.
pub fn ground_truth() -> GroundTruth {
    let mut pipes = IndexMap::new();
    pipes.insert(
        "p45".to_string(),
        (0..TOTAL_ROWS)
            .map(|t| if t >= ANOMALY_ROW { 1.0 } else { 0.0 })
            .collect(),
    );
    pipes.insert("p12".to_string(), vec![0.0; TOTAL_ROWS]);
    GroundTruth {
        timestamps: (0..TOTAL_ROWS).map(ts).collect(),
        pipes,
    }
}

/// Fast settings: linear pair models and a small autoencoder.
pub fn config() -> DetectorConfig {
    let mut config = DetectorConfig::default();
    config.residual.learner = Learner::Linear;
    config.gnn = GnnConfig {
        window_size: 24,
        stride: 12,
        hidden_dim: 4,
        heads: 2,
        num_layers: 1,
        epochs: 2,
        batch_size: 32,
        ..Default::default()
    };
    config
}
