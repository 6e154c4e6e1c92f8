use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::tree::RegressionTree;
use super::{FitError, Regressor, Sample};

/// Minimum training rows for a forest.
const MIN_ROWS: usize = 2;

#[derive(Debug, Clone)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

/// Bootstrap-aggregated regression trees. Prediction is the mean of the trees.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    /// Fit `n_estimators` trees, each on a bootstrap resample of the rows.
    /// The same seed always produces the same forest.
    pub fn fit(xs: &[Sample], ys: &[f64], params: &ForestParams) -> Result<Self, FitError> {
        if xs.len() != ys.len() {
            return Err(FitError::LengthMismatch(xs.len(), ys.len()));
        }
        if xs.len() < MIN_ROWS {
            return Err(FitError::TooFewRows { got: xs.len(), need: MIN_ROWS });
        }

        let n = xs.len();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut rows = vec![0usize; n];
        let mut trees = Vec::with_capacity(params.n_estimators.max(1));

        for _ in 0..params.n_estimators.max(1) {
            for r in rows.iter_mut() {
                *r = rng.gen_range(0..n);
            }
            trees.push(RegressionTree::fit(
                xs,
                ys,
                &rows,
                params.max_depth,
                params.min_samples_split,
            )?);
        }

        Ok(Self { trees })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForest {
    fn predict(&self, x: &Sample) -> f64 {
        self.trees.iter().map(|t| t.predict(x)).sum::<f64>() / self.trees.len() as f64
    }
}
