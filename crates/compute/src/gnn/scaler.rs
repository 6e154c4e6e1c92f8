use ndarray::{aview1, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-feature standardization fitted on calibration windows only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit over every row of every sample. Zero-variance features get scale 1.
    pub fn fit(samples: &[Array2<f64>]) -> Self {
        let dim = samples.first().map_or(0, Array2::ncols);
        let rows: usize = samples.iter().map(Array2::nrows).sum();
        let n = rows.max(1) as f64;

        let mut sums = Array1::<f64>::zeros(dim);
        for m in samples {
            sums += &m.sum_axis(Axis(0));
        }
        let means = sums / n;

        let mut sq = Array1::<f64>::zeros(dim);
        for m in samples {
            sq += &(m - &means).mapv(|v| v * v).sum_axis(Axis(0));
        }
        let scales = sq.mapv(|s: f64| {
            let std = (s / n).sqrt();
            if std > f64::EPSILON && std.is_finite() {
                std
            } else {
                1.0
            }
        });
        Self {
            means: means.to_vec(),
            scales: scales.to_vec(),
        }
    }

    pub fn transform(&self, m: &Array2<f64>) -> Array2<f64> {
        (m - &aview1(&self.means)) / &aview1(&self.scales)
    }

    pub fn dim(&self) -> usize {
        self.means.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn standardizes_columns() {
        let samples = vec![array![[1.0, 5.0], [3.0, 5.0]], array![[5.0, 5.0], [7.0, 5.0]]];
        let scaler = StandardScaler::fit(&samples);
        let t = scaler.transform(&samples[0]);
        // Column 0: mean 4, population std sqrt(5).
        assert!((t[[0, 0]] + 3.0 / 5f64.sqrt()).abs() < 1e-12);
        // Constant column is centred but not rescaled.
        assert_eq!(t[[1, 1]], 0.0);
    }
}
