use super::{FitError, Regressor, Sample, FEATURES};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Depth-limited CART regression tree (squared-error criterion).
///
/// Nodes live in a flat arena; children are referenced by index.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

/// Best split found for a set of rows.
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    /// Grow a tree on the rows selected by `rows` (duplicates allowed, as
    /// produced by bootstrap sampling).
    pub fn fit(
        xs: &[Sample],
        ys: &[f64],
        rows: &[usize],
        max_depth: usize,
        min_samples_split: usize,
    ) -> Result<Self, FitError> {
        if xs.len() != ys.len() {
            return Err(FitError::LengthMismatch(xs.len(), ys.len()));
        }
        if rows.is_empty() {
            return Err(FitError::TooFewRows { got: 0, need: 1 });
        }
        let mut tree = Self { nodes: Vec::new() };
        let mut rows = rows.to_vec();
        tree.grow(xs, ys, &mut rows, 0, max_depth, min_samples_split.max(2));
        Ok(tree)
    }

    fn grow(
        &mut self,
        xs: &[Sample],
        ys: &[f64],
        rows: &mut [usize],
        depth: usize,
        max_depth: usize,
        min_samples_split: usize,
    ) -> usize {
        let id = self.nodes.len();
        let value = rows.iter().map(|&r| ys[r]).sum::<f64>() / rows.len() as f64;
        self.nodes.push(Node::Leaf { value });

        if depth >= max_depth || rows.len() < min_samples_split {
            return id;
        }
        let Some(split) = best_split(xs, ys, rows) else {
            return id;
        };

        // Partition rows in place: left side first.
        let mut boundary = 0;
        for i in 0..rows.len() {
            if xs[rows[i]][split.feature] <= split.threshold {
                rows.swap(i, boundary);
                boundary += 1;
            }
        }
        if boundary == 0 || boundary == rows.len() {
            return id;
        }

        let (left_rows, right_rows) = rows.split_at_mut(boundary);
        let left = self.grow(xs, ys, left_rows, depth + 1, max_depth, min_samples_split);
        let right = self.grow(xs, ys, right_rows, depth + 1, max_depth, min_samples_split);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Find the split maximizing `sum_l^2 / n_l + sum_r^2 / n_r`, which is the
/// same as minimizing the children's summed squared error.
fn best_split(xs: &[Sample], ys: &[f64], rows: &[usize]) -> Option<SplitCandidate> {
    let n = rows.len();
    let total: f64 = rows.iter().map(|&r| ys[r]).sum();
    let parent_score = total * total / n as f64;
    let mut best: Option<SplitCandidate> = None;
    let mut order = rows.to_vec();

    for feature in 0..FEATURES {
        order.sort_by(|&a, &b| xs[a][feature].total_cmp(&xs[b][feature]));
        let mut left_sum = 0.0;
        for i in 0..n - 1 {
            left_sum += ys[order[i]];
            let here = xs[order[i]][feature];
            let next = xs[order[i + 1]][feature];
            if here == next {
                continue;
            }
            let n_left = (i + 1) as f64;
            let n_right = (n - i - 1) as f64;
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / n_left + right_sum * right_sum / n_right;
            if score > parent_score + 1e-12 && best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: here + (next - here) / 2.0,
                    score,
                });
            }
        }
    }
    best
}

impl Regressor for RegressionTree {
    fn predict(&self, x: &Sample) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes[id] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if x[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}
