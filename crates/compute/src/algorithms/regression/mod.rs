//! Regression learners for the pairwise sensor models.
//!
//! Sub-modules:
//! - [`linear`]: ordinary least squares with intercept
//! - [`tree`]: depth-limited CART regression tree
//! - [`forest`]: bootstrap-aggregated regression trees

pub mod forest;
pub mod linear;
pub mod tree;

use aquaguard_core::config::{Learner, ResidualConfig};

pub use forest::RandomForest;
pub use linear::LinearRegression;
pub use tree::RegressionTree;

/// Number of input features per sample: reference pressure, source flow,
/// flow/pressure ratio.
pub const FEATURES: usize = 3;

pub type Sample = [f64; FEATURES];

/// Error raised when a single model cannot be fitted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("not enough training rows: {got} < {need}")]
    TooFewRows { got: usize, need: usize },
    #[error("feature/target length mismatch: {0} vs {1}")]
    LengthMismatch(usize, usize),
    #[error("normal equations are singular")]
    Singular,
}

/// A fitted regressor mapping one feature row to a predicted pressure.
///
/// Implementations are immutable after fitting and shared across threads.
pub trait Regressor: Send + Sync {
    fn predict(&self, x: &Sample) -> f64;

    fn predict_batch(&self, xs: &[Sample]) -> Vec<f64> {
        xs.iter().map(|x| self.predict(x)).collect()
    }
}

/// Fit the learner selected by configuration. `stream` decorrelates the
/// random state of independently fitted models.
pub fn fit_regressor(
    config: &ResidualConfig,
    stream: u64,
    xs: &[Sample],
    ys: &[f64],
) -> Result<Box<dyn Regressor>, FitError> {
    match config.learner {
        Learner::Linear => Ok(Box::new(LinearRegression::fit(xs, ys)?)),
        Learner::Forest => {
            let params = forest::ForestParams {
                n_estimators: config.n_estimators,
                max_depth: config.max_depth,
                min_samples_split: config.min_samples_split,
                seed: config.seed.wrapping_add(stream),
            };
            Ok(Box::new(RandomForest::fit(xs, ys, &params)?))
        }
    }
}
