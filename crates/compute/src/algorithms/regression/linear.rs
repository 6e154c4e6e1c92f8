use super::{FitError, Regressor, Sample, FEATURES};

/// Pivot magnitude, relative to the largest diagonal of `X'X`, below which the
/// normal equations are treated as singular.
const RELATIVE_PIVOT_EPSILON: f64 = 1e-10;

/// Ordinary least squares with an intercept term.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRegression {
    pub intercept: f64,
    pub coefficients: [f64; FEATURES],
}

impl LinearRegression {
    /// Solve the normal equations `(X'X) b = X'y` by Gaussian elimination
    /// with partial pivoting.
    pub fn fit(xs: &[Sample], ys: &[f64]) -> Result<Self, FitError> {
        if xs.len() != ys.len() {
            return Err(FitError::LengthMismatch(xs.len(), ys.len()));
        }
        const DIM: usize = FEATURES + 1;
        if xs.len() < DIM {
            return Err(FitError::TooFewRows { got: xs.len(), need: DIM });
        }

        // Augmented system [X'X | X'y].
        let mut a = [[0.0; DIM + 1]; DIM];
        for (x, &y) in xs.iter().zip(ys) {
            let row = [1.0, x[0], x[1], x[2]];
            for i in 0..DIM {
                for j in 0..DIM {
                    a[i][j] += row[i] * row[j];
                }
                a[i][DIM] += row[i] * y;
            }
        }

        let scale = (0..DIM).map(|i| a[i][i].abs()).fold(0.0, f64::max);
        let tolerance = scale * RELATIVE_PIVOT_EPSILON;

        for col in 0..DIM {
            let pivot = (col..DIM)
                .max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))
                .unwrap_or(col);
            if a[pivot][col].abs() <= tolerance {
                return Err(FitError::Singular);
            }
            a.swap(col, pivot);
            for r in 0..DIM {
                if r == col {
                    continue;
                }
                let factor = a[r][col] / a[col][col];
                let pivot_row = a[col];
                for c in col..=DIM {
                    a[r][c] -= factor * pivot_row[c];
                }
            }
        }

        let solve = |i: usize| a[i][DIM] / a[i][i];
        let model = Self {
            intercept: solve(0),
            coefficients: [solve(1), solve(2), solve(3)],
        };
        if !model.intercept.is_finite() || model.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(FitError::Singular);
        }
        Ok(model)
    }
}

impl Regressor for LinearRegression {
    fn predict(&self, x: &Sample) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(x)
                .map(|(c, v)| c * v)
                .sum::<f64>()
    }
}
