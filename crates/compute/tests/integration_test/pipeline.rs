use aquaguard_compute::LeakPipeline;
use aquaguard_core::{LeakError, SensorSeries, TimeWindow, Topology};

use crate::helpers::{
    calibration, config, ground_truth, node, series, topology, ts, with_columns, ANOMALY_ROW,
    NODES, TOTAL_ROWS,
};

#[test]
fn detects_and_localizes_the_anomaly() {
    let series = series();
    let topology = topology();
    let mut pipeline = LeakPipeline::new(config());

    let report = pipeline
        .run(&series, &calibration(), &topology, Some(&ground_truth()), Some(150.0))
        .unwrap();

    let onset = report.onsets.get("n4").copied().expect("n4 should alarm");
    assert!(onset <= ts(ANOMALY_ROW + 12));
    assert_eq!(report.summary.leaks_detected, report.leaks.len());
    assert_eq!(report.onsets.len(), report.leaks.len());

    for leak in &report.leaks {
        if let Some(loc) = &leak.localization {
            assert!(!loc.nodes.is_empty() && loc.nodes.len() <= 3);
            assert!(loc.weights.iter().all(|w| *w >= 0.0));
            let total: f64 = loc.weights.iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
            assert!(loc.coordinate.x.is_finite() && loc.coordinate.y.is_finite());
        }
    }

    // Anomaly and CUSUM tables cover the whole series.
    assert_eq!(report.anomaly.rows(), series.len());
    assert_eq!(report.cusum.rows(), series.len());
    assert!(report.cusum.columns.iter().flatten().all(|s| *s >= 0.0));

    assert_eq!(report.summary.ground_truth_leaks, Some(1));
    let evaluation = report.evaluation.as_ref().unwrap();
    assert_eq!(evaluation.placed_leaks, 1);
    if report.leaks.iter().any(|l| l.localization.is_some()) {
        let mean = report.summary.mean_localization_error.unwrap();
        assert!(mean.is_finite() && mean >= 0.0);
        assert_eq!(evaluation.distances.len(), pipeline.metrics.events_localized);
        assert!(report.summary.improvement_pct.is_some());
    }

    assert!(pipeline.metrics.gnn_skipped.is_none());
    assert!(pipeline.metrics.gnn_epochs >= 1);
    assert_eq!(pipeline.metrics.pairs_fitted + pipeline.metrics.pairs_failed, 18);
}

#[test]
fn dead_sensor_never_alarms() {
    let healthy = series();
    let columns = (0..NODES)
        .map(|i| {
            let values = if i == 1 {
                vec![f64::NAN; TOTAL_ROWS]
            } else {
                healthy.pressure(i).to_vec()
            };
            (node(i), values)
        })
        .collect();
    let series = with_columns(&healthy, columns);
    let mut pipeline = LeakPipeline::new(config());

    let report = pipeline
        .run(&series, &calibration(), &topology(), None, None)
        .unwrap();

    // Three pairs target n2 and three use it as reference.
    assert_eq!(pipeline.metrics.pairs_failed, 6);
    assert!(!report.onsets.contains_key("n2"));
    assert!(report.anomaly.column(1).iter().all(|v| *v == 0.0));
    assert!(report.onsets.contains_key("n4"));
    for leak in report.leaks.iter().filter_map(|l| l.localization.as_ref()) {
        assert!(leak.coordinate.x.is_finite() && leak.coordinate.y.is_finite());
    }
}

#[test]
fn missing_topology_skips_the_gnn() {
    let series = series();
    let mut topology = topology();
    topology.edges.clear();
    let mut pipeline = LeakPipeline::new(config());

    let report = pipeline
        .run(&series, &calibration(), &topology, None, None)
        .unwrap();
    assert!(pipeline.metrics.gnn_skipped.is_some());
    assert!(report.onsets.contains_key("n4"));
    assert!(report.evaluation.is_none());
    assert_eq!(report.summary.mean_localization_error, None);
}

#[test]
fn mismatched_graph_skips_the_gnn() {
    let series = series();
    let mut topology = topology();
    topology.edges[0].source = "unknown".into();
    let mut pipeline = LeakPipeline::new(config());

    pipeline.run(&series, &calibration(), &topology, None, None).unwrap();
    let reason = pipeline.metrics.gnn_skipped.clone().unwrap();
    assert!(reason.contains("unknown"), "{reason}");
}

#[test]
fn empty_calibration_is_fatal() {
    let series = series();
    let late = ts(10_000);
    let window = TimeWindow::new(late, late + chrono::Duration::days(1));
    let mut pipeline = LeakPipeline::new(config());
    let err = pipeline
        .run(&series, &window, &Topology::default(), None, None)
        .unwrap_err();
    assert!(matches!(err, LeakError::EmptyCalibration(_)));
}

#[test]
fn empty_series_is_fatal() {
    let empty = SensorSeries::new(Vec::new(), Vec::new(), Vec::new(), "PUMP_1", Vec::new()).unwrap();
    let mut pipeline = LeakPipeline::new(config());
    let err = pipeline
        .run(&empty, &calibration(), &Topology::default(), None, None)
        .unwrap_err();
    assert!(matches!(err, LeakError::EmptySeries));
}

#[test]
fn report_serializes_without_tables() {
    let series = series();
    let topology = topology();
    let mut pipeline = LeakPipeline::new(config());
    let report = pipeline
        .run(&series, &calibration(), &topology, Some(&ground_truth()), None)
        .unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert!(json.get("leaks").unwrap().is_array());
    assert!(json.get("summary").unwrap().get("w_gnn").is_some());
    assert!(json.get("metrics").unwrap().get("pairs_fitted").is_some());
    assert!(json.get("cusum").is_none());
    assert!(json.get("anomaly").is_none());
}
