use ndarray::linalg::general_mat_mul;
use ndarray::{s, Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::Rng;

use super::graph::SensorGraph;

const LEAKY_SLOPE: f64 = 0.2;

/// Shape of one message-passing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerSpec {
    pub in_dim: usize,
    /// Per-head output width.
    pub head_dim: usize,
    pub heads: usize,
    /// Concatenate heads (`heads * head_dim` outputs) or average them.
    pub concat: bool,
    pub edge_dim: usize,
}

impl LayerSpec {
    pub fn out_dim(&self) -> usize {
        if self.concat {
            self.heads * self.head_dim
        } else {
            self.head_dim
        }
    }
}

/// A trainable graph layer with hand-derived gradients.
///
/// Parameters are a fixed list of 2-D tensors so optimizers and snapshots can
/// treat every layer kind the same way. `backward` accumulates into gradient
/// tensors shaped like [`MessagePassing::tensors`], in the same order.
pub trait MessagePassing: Clone + Send + Sync {
    type Cache;

    fn build(spec: LayerSpec, rng: &mut StdRng) -> Self;

    fn spec(&self) -> LayerSpec;

    fn forward(&self, x: &Array2<f64>, graph: &SensorGraph) -> (Array2<f64>, Self::Cache);

    /// Returns the gradient w.r.t. the layer input.
    fn backward(
        &self,
        cache: &Self::Cache,
        grad_out: &Array2<f64>,
        graph: &SensorGraph,
        grads: &mut [Array2<f64>],
    ) -> Array2<f64>;

    fn tensors(&self) -> Vec<&Array2<f64>>;

    fn tensors_mut(&mut self) -> Vec<&mut Array2<f64>>;
}

/// Zeroed gradient buffers shaped like `tensors`.
pub fn zeros_like(tensors: &[&Array2<f64>]) -> Vec<Array2<f64>> {
    tensors.iter().map(|t| Array2::zeros(t.raw_dim())).collect()
}

/// Multi-head graph attention (GAT v1) with an optional edge-attribute term.
///
/// For target `i` and incoming neighbour `j` (self-loop included), per head:
/// `z_j = x_j W`, `s_ij = a_dst.z_i + a_src.z_j + a_edge.e_ij`,
/// `alpha_ij = softmax_j(leaky_relu(s_ij))`, `out_i = sum_j alpha_ij z_j`.
#[derive(Debug, Clone)]
pub struct GatLayer {
    spec: LayerSpec,
    /// Projection for all heads, `in_dim x heads * head_dim`.
    w: Array2<f64>,
    /// `heads x head_dim`.
    att_src: Array2<f64>,
    /// `heads x head_dim`.
    att_dst: Array2<f64>,
    /// `heads x edge_dim`.
    att_edge: Array2<f64>,
    /// `1 x out_dim`.
    bias: Array2<f64>,
}

// Position of each tensor in `tensors()` and in gradient buffers.
const W: usize = 0;
const ATT_SRC: usize = 1;
const ATT_DST: usize = 2;
const ATT_EDGE: usize = 3;
const BIAS: usize = 4;

pub struct GatCache {
    input: Array2<f64>,
    /// Projected features, `nodes x heads * head_dim`.
    projected: Array2<f64>,
    /// Pre-activation attention scores, `slots x heads`.
    scores: Array2<f64>,
    /// Attention coefficients, `slots x heads`.
    alphas: Array2<f64>,
}

fn glorot(rng: &mut StdRng, fan_in: usize, fan_out: usize, shape: (usize, usize)) -> Array2<f64> {
    let bound = (6.0 / (fan_in + fan_out).max(1) as f64).sqrt();
    Array2::from_shape_simple_fn(shape, || rng.gen_range(-bound..bound))
}

fn leaky(s: f64) -> f64 {
    if s > 0.0 {
        s
    } else {
        LEAKY_SLOPE * s
    }
}

impl MessagePassing for GatLayer {
    type Cache = GatCache;

    fn build(spec: LayerSpec, rng: &mut StdRng) -> Self {
        let (heads, d) = (spec.heads, spec.head_dim);
        let w = glorot(rng, spec.in_dim, d, (spec.in_dim, heads * d));
        let att_src = glorot(rng, d, 1, (heads, d));
        let att_dst = glorot(rng, d, 1, (heads, d));
        let att_edge = if spec.edge_dim > 0 {
            glorot(rng, spec.edge_dim, 1, (heads, spec.edge_dim))
        } else {
            Array2::zeros((heads, 0))
        };
        Self {
            spec,
            w,
            att_src,
            att_dst,
            att_edge,
            bias: Array2::zeros((1, spec.out_dim())),
        }
    }

    fn spec(&self) -> LayerSpec {
        self.spec
    }

    fn forward(&self, x: &Array2<f64>, graph: &SensorGraph) -> (Array2<f64>, GatCache) {
        let spec = self.spec;
        let (heads, d) = (spec.heads, spec.head_dim);
        let n = x.nrows();
        let slots = graph.num_slots();

        let projected = x.dot(&self.w);
        let edge_term = if spec.edge_dim > 0 {
            graph.attribute_matrix().dot(&self.att_edge.t())
        } else {
            Array2::zeros((slots, heads))
        };

        let mut scores = Array2::zeros((slots, heads));
        let mut alphas = Array2::zeros((slots, heads));
        let mut out = Array2::zeros((n, spec.out_dim()));
        let scale = if spec.concat { 1.0 } else { 1.0 / heads as f64 };

        for h in 0..heads {
            let z_h = projected.slice(s![.., h * d..(h + 1) * d]);
            let src_term = z_h.dot(&self.att_src.row(h));
            let dst_term = z_h.dot(&self.att_dst.row(h));
            let target = if spec.concat { h * d..(h + 1) * d } else { 0..d };

            for i in 0..n {
                let range = graph.slots(i);
                let mut max_e = f64::NEG_INFINITY;
                for slot in range.clone() {
                    let s = dst_term[i] + src_term[graph.source(slot)] + edge_term[[slot, h]];
                    scores[[slot, h]] = s;
                    max_e = max_e.max(leaky(s));
                }
                let mut total = 0.0;
                for slot in range.clone() {
                    let a = (leaky(scores[[slot, h]]) - max_e).exp();
                    alphas[[slot, h]] = a;
                    total += a;
                }
                let mut out_i = out.slice_mut(s![i, target.clone()]);
                for slot in range {
                    let alpha = alphas[[slot, h]] / total;
                    alphas[[slot, h]] = alpha;
                    out_i.scaled_add(scale * alpha, &z_h.row(graph.source(slot)));
                }
            }
        }
        out += &self.bias;

        (
            out,
            GatCache {
                input: x.clone(),
                projected,
                scores,
                alphas,
            },
        )
    }

    fn backward(
        &self,
        cache: &GatCache,
        grad_out: &Array2<f64>,
        graph: &SensorGraph,
        grads: &mut [Array2<f64>],
    ) -> Array2<f64> {
        let spec = self.spec;
        let (heads, d) = (spec.heads, spec.head_dim);
        let n = grad_out.nrows();

        grads[BIAS] += &grad_out.sum_axis(Axis(0)).insert_axis(Axis(0));

        let mut grad_z = Array2::zeros((n, heads * d));
        let mut d_alpha = Vec::new();
        for h in 0..heads {
            let head = h * d..(h + 1) * d;
            let z_h = cache.projected.slice(s![.., head.clone()]);
            let g_h = if spec.concat {
                grad_out.slice(s![.., head.clone()]).to_owned()
            } else {
                grad_out / heads as f64
            };
            let a_src = self.att_src.row(h);
            let a_dst = self.att_dst.row(h);
            let mut d_score = Array1::zeros(graph.num_slots());

            for i in 0..n {
                let range = graph.slots(i);
                let g_i = g_h.row(i);

                // Gradient through the weighted sum.
                d_alpha.clear();
                for slot in range.clone() {
                    let j = graph.source(slot);
                    d_alpha.push(g_i.dot(&z_h.row(j)));
                    grad_z
                        .slice_mut(s![j, head.clone()])
                        .scaled_add(cache.alphas[[slot, h]], &g_i);
                }

                // Softmax then leaky ReLU.
                let weighted: f64 = range
                    .clone()
                    .zip(&d_alpha)
                    .map(|(slot, da)| cache.alphas[[slot, h]] * da)
                    .sum();
                for (slot, da) in range.zip(&d_alpha) {
                    let de = cache.alphas[[slot, h]] * (da - weighted);
                    let ds = if cache.scores[[slot, h]] > 0.0 {
                        de
                    } else {
                        LEAKY_SLOPE * de
                    };
                    d_score[slot] = ds;
                    let j = graph.source(slot);
                    grads[ATT_DST].row_mut(h).scaled_add(ds, &z_h.row(i));
                    grads[ATT_SRC].row_mut(h).scaled_add(ds, &z_h.row(j));
                    grad_z.slice_mut(s![i, head.clone()]).scaled_add(ds, &a_dst);
                    grad_z.slice_mut(s![j, head.clone()]).scaled_add(ds, &a_src);
                }
            }

            if spec.edge_dim > 0 {
                let d_edge = graph.attribute_matrix().t().dot(&d_score);
                let mut row = grads[ATT_EDGE].row_mut(h);
                row += &d_edge;
            }
        }

        // Through the projection z = x W.
        general_mat_mul(1.0, &cache.input.t(), &grad_z, 1.0, &mut grads[W]);
        grad_z.dot(&self.w.t())
    }

    fn tensors(&self) -> Vec<&Array2<f64>> {
        vec![&self.w, &self.att_src, &self.att_dst, &self.att_edge, &self.bias]
    }

    fn tensors_mut(&mut self) -> Vec<&mut Array2<f64>> {
        vec![
            &mut self.w,
            &mut self.att_src,
            &mut self.att_dst,
            &mut self.att_edge,
            &mut self.bias,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn setup(concat: bool, edge_dim: usize) -> (GatLayer, SensorGraph, Array2<f64>) {
        let mut rng = StdRng::seed_from_u64(3);
        let spec = LayerSpec {
            in_dim: 3,
            head_dim: 2,
            heads: 2,
            concat,
            edge_dim,
        };
        let layer = GatLayer::build(spec, &mut rng);
        let attrs: Vec<Vec<f64>> = (0..3).map(|e| vec![e as f64; edge_dim]).collect();
        let graph = if edge_dim > 0 {
            SensorGraph::new(4, &[(0, 1), (1, 2), (2, 3)], Some(&attrs))
        } else {
            SensorGraph::new(4, &[(0, 1), (1, 2), (2, 3)], None)
        };
        let x = Array2::from_shape_fn((4, 3), |(i, k)| ((i * 3 + k) as f64 * 0.37).sin());
        (layer, graph, x)
    }

    fn weight(r: usize, c: usize, cols: usize) -> f64 {
        1.0 + (r * cols + c) as f64 * 0.1
    }

    /// Loss = sum of outputs weighted by a fixed pattern.
    fn loss(layer: &GatLayer, graph: &SensorGraph, x: &Array2<f64>) -> f64 {
        let (out, _) = layer.forward(x, graph);
        let cols = out.ncols();
        out.indexed_iter()
            .map(|((r, c), v)| v * weight(r, c, cols))
            .sum()
    }

    fn nudge(layer: &mut GatLayer, tensor: usize, k: usize, delta: f64) {
        let mut tensors = layer.tensors_mut();
        if let Some(v) = tensors[tensor].iter_mut().nth(k) {
            *v += delta;
        }
    }

    fn check_gradients(concat: bool, edge_dim: usize) {
        let (mut layer, graph, x) = setup(concat, edge_dim);
        let (out, cache) = layer.forward(&x, &graph);
        let cols = out.ncols();
        let upstream = Array2::from_shape_fn(out.dim(), |(r, c)| weight(r, c, cols));
        let mut grads = zeros_like(&layer.tensors());
        let grad_x = layer.backward(&cache, &upstream, &graph, &mut grads);

        let eps = 1e-6;
        for t in 0..grads.len() {
            for (k, analytic) in grads[t].iter().enumerate() {
                nudge(&mut layer, t, k, eps);
                let up = loss(&layer, &graph, &x);
                nudge(&mut layer, t, k, -2.0 * eps);
                let down = loss(&layer, &graph, &x);
                nudge(&mut layer, t, k, eps);
                let numeric = (up - down) / (2.0 * eps);
                assert!(
                    (numeric - analytic).abs() < 1e-5,
                    "tensor {t} param {k}: numeric {numeric} analytic {analytic}"
                );
            }
        }

        let mut xp = x.clone();
        for ((i, k), analytic) in grad_x.indexed_iter() {
            let orig = xp[[i, k]];
            xp[[i, k]] = orig + eps;
            let up = loss(&layer, &graph, &xp);
            xp[[i, k]] = orig - eps;
            let down = loss(&layer, &graph, &xp);
            xp[[i, k]] = orig;
            let numeric = (up - down) / (2.0 * eps);
            assert!((numeric - analytic).abs() < 1e-5);
        }
    }

    #[test]
    fn gradients_match_finite_differences_concat() {
        check_gradients(true, 0);
    }

    #[test]
    fn gradients_match_finite_differences_mean_with_edges() {
        check_gradients(false, 2);
    }

    #[test]
    fn attention_rows_sum_to_one() {
        let (layer, graph, x) = setup(true, 0);
        let (_, cache) = layer.forward(&x, &graph);
        for i in 0..graph.num_nodes() {
            for h in 0..2 {
                let total: f64 = graph.slots(i).map(|s| cache.alphas[[s, h]]).sum();
                assert!((total - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn tensors_have_declared_shapes() {
        let (layer, _, _) = setup(false, 2);
        let shapes: Vec<_> = layer.tensors().iter().map(|t| t.dim()).collect();
        assert_eq!(shapes, vec![(3, 4), (2, 2), (2, 2), (2, 2), (1, 2)]);
    }
}
