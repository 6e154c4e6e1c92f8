use serde::{Deserialize, Serialize};

use aquaguard_core::{Coordinate, LocalizedLeak};

/// Localization accuracy against ground-truth leak positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Mean distance from each localized event to its nearest true leak.
    pub mean_error: Option<f64>,
    /// Distance per localized event, in report order.
    pub distances: Vec<f64>,
    /// Ground-truth leaks with a known position, the ones scored against.
    pub placed_leaks: usize,
}

impl Evaluation {
    /// Relative improvement over `baseline` in percent; positive is better.
    pub fn improvement_pct(&self, baseline: f64) -> Option<f64> {
        let mean = self.mean_error?;
        (baseline > 0.0).then(|| (baseline - mean) / baseline * 100.0)
    }
}

/// Score every localized event by the Euclidean distance to the closest
/// ground-truth position. Events without a localization are skipped; with
/// no positions or no localized events the mean is `None`.
pub fn evaluate(leaks: &[LocalizedLeak], truth: &[(String, Coordinate)]) -> Evaluation {
    let distances: Vec<f64> = if truth.is_empty() {
        Vec::new()
    } else {
        leaks
            .iter()
            .filter_map(|leak| leak.localization.as_ref())
            .map(|loc| {
                truth
                    .iter()
                    .map(|(_, c)| loc.coordinate.distance(c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect()
    };

    let mean_error = (!distances.is_empty())
        .then(|| distances.iter().sum::<f64>() / distances.len() as f64);
    Evaluation {
        mean_error,
        distances,
        placed_leaks: truth.len(),
    }
}
