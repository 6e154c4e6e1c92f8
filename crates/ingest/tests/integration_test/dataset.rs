use std::fs;

use aquaguard_core::{parse_timestamp, Coordinate};
use aquaguard_ingest::{Dataset, IngestError};

use crate::helpers::data_dir;

#[test]
fn loads_series_topology_and_truth() {
    let dir = tempfile::tempdir().unwrap();
    let config = data_dir(dir.path());
    let data = Dataset::load(&config).unwrap();

    assert_eq!(data.series.nodes(), &["n1", "n2", "n3"]);
    assert_eq!(data.series.len(), 4);
    assert!(data.series.pressure(2)[1].is_nan());
    assert_eq!(data.series.flow()[1], 101.0);

    // Only p1 joins two sensors directly.
    assert_eq!(data.topology.edges.len(), 1);
    assert_eq!(data.topology.pipes.len(), 3);

    let truth = data.ground_truth.as_ref().unwrap();
    assert_eq!(truth.active_pipes(), vec!["p3"]);
    let positions = truth.leak_positions(&data.topology);
    assert_eq!(positions[0].1, Coordinate::new(175.0, 0.0));
}

#[test]
fn unreadable_ground_truth_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = data_dir(dir.path());
    config.ground_truth_file = Some("missing.csv".into());
    let data = Dataset::load(&config).unwrap();
    assert!(data.ground_truth.is_none());
    assert_eq!(data.series.len(), 4);

    fs::write(dir.path().join("broken.csv"), "Timestamp;p1\nnot-a-time;1\n").unwrap();
    config.ground_truth_file = Some("broken.csv".into());
    assert!(Dataset::load(&config).unwrap().ground_truth.is_none());
}

#[test]
fn edge_list_and_coordinates_override_the_model() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = data_dir(dir.path());
    fs::write(dir.path().join("edges.csv"), "Node1,Node2\n1,2\n2,3\n").unwrap();
    fs::write(dir.path().join("xy.csv"), "Node,X,Y\nn3,210,5\n").unwrap();
    config.edges_file = Some(dir.path().join("edges.csv"));
    config.coordinates_file = Some("xy.csv".into());

    let data = Dataset::load(&config).unwrap();
    assert_eq!(data.topology.edges.len(), 2);
    assert_eq!(data.topology.edges[1].target, "n3");
    assert_eq!(data.topology.coordinate("n3"), Some(Coordinate::new(210.0, 5.0)));
    assert_eq!(data.topology.coordinate("n1"), Some(Coordinate::new(0.0, 0.0)));
}

#[test]
fn default_calibration_is_clipped_to_the_series() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = data_dir(dir.path());
    let data = Dataset::load(&config).unwrap();

    let window = data.calibration(&config).unwrap();
    assert_eq!(window.start, parse_timestamp("2019-01-01 00:00").unwrap());
    assert_eq!(window.end, parse_timestamp("2019-01-02 00:00").unwrap());

    config.calibration_start = Some("2019-01-01 00:00".into());
    config.calibration_end = Some("2019-01-01 00:05".into());
    let window = data.calibration(&config).unwrap();
    assert_eq!(window.end, parse_timestamp("2019-01-01 00:05").unwrap());
}

#[test]
fn missing_pressures_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = aquaguard_core::DataConfig {
        data_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    assert!(matches!(
        Dataset::load(&config).unwrap_err(),
        IngestError::Io { .. }
    ));
}
