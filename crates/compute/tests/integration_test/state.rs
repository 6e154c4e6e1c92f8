use std::thread;

use aquaguard_compute::{new_shared_state, LeakPipeline};
use aquaguard_core::LeakError;

use crate::helpers::{calibration, config, select_columns, series, topology};

#[test]
fn detect_requires_training() {
    let mut pipeline = LeakPipeline::new(config());
    let err = pipeline.detect(&series(), &topology()).unwrap_err();
    assert!(matches!(err, LeakError::NotTrained));
}

#[test]
fn detect_rejects_series_with_other_columns() {
    let series = series();
    let topology = topology();
    let mut pipeline = LeakPipeline::new(config());
    pipeline.train(&series, &calibration(), &topology).unwrap();
    assert_eq!(pipeline.state().read().unwrap().nodes, series.nodes());

    let fewer = select_columns(&series, &[0, 1, 2, 3]);
    let err = pipeline.detect(&fewer, &topology).unwrap_err();
    assert!(matches!(err, LeakError::ShapeMismatch(_)), "{err}");

    let reordered = select_columns(&series, &[1, 0, 2, 3, 4, 5]);
    let err = pipeline.detect(&reordered, &topology).unwrap_err();
    assert!(matches!(err, LeakError::ShapeMismatch(ref msg) if msg.contains("'n2'")), "{err}");

    // The trained columns still detect.
    assert!(pipeline.detect(&series, &topology).is_ok());
}

#[test]
fn trained_state_is_shared_between_pipelines() {
    let state = new_shared_state();
    let series = series();
    let topology = topology();

    let mut trainer = LeakPipeline::with_state(config(), state.clone());
    trainer.train(&series, &calibration(), &topology).unwrap();
    {
        let guard = state.read().unwrap();
        assert!(guard.is_trained());
        assert_eq!(guard.calibration, Some(calibration()));
        assert!(guard.gnn.is_some());
    }

    // Concurrent readers see the same trained models.
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let state = state.clone();
            let series = series.clone();
            let topology = topology.clone();
            thread::spawn(move || {
                let mut reader = LeakPipeline::with_state(config(), state);
                reader.detect(&series, &topology).unwrap().onsets
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results[0], results[1]);

    // Detection is deterministic for a fixed trained state.
    let again = trainer.detect(&series, &topology).unwrap();
    assert_eq!(again.onsets, results[0]);
}
