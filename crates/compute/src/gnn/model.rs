use ndarray::{Array2, Axis, Zip};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::graph::SensorGraph;
use super::layer::{zeros_like, GatLayer, LayerSpec, MessagePassing};
use super::norm::{LayerNorm, NormCache};

/// Layer sizes of a [`GraphAutoencoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelShape {
    pub feature_dim: usize,
    pub hidden_dim: usize,
    pub heads: usize,
    pub num_layers: usize,
    pub edge_dim: usize,
}

#[derive(Debug, Clone)]
struct Block<L> {
    layer: L,
    relu: bool,
    norm: Option<LayerNorm>,
}

struct BlockCache<C> {
    layer: C,
    pre_activation: Option<Array2<f64>>,
    norm: Option<NormCache>,
}

/// Activations kept from a forward pass for backpropagation.
pub struct ForwardCache<C> {
    blocks: Vec<BlockCache<C>>,
}

/// Graph autoencoder: stacked message-passing blocks (layer, ReLU, norm)
/// compressing node features to a latent width and reconstructing them.
///
/// Encoder: one multi-head block from the input, `num_layers - 1` multi-head
/// blocks, then a single-head block down to the latent width. Decoder:
/// `num_layers - 1` single-head blocks and a final linear layer back to the
/// feature width.
#[derive(Debug, Clone)]
pub struct GraphAutoencoder<L: MessagePassing = GatLayer> {
    shape: ModelShape,
    blocks: Vec<Block<L>>,
}

impl<L: MessagePassing> GraphAutoencoder<L> {
    pub fn new(shape: ModelShape, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let heads = shape.heads.max(1);
        let hidden = shape.hidden_dim.max(1);
        let layers = shape.num_layers.max(1);
        let wide = hidden * heads;
        let mut blocks = Vec::new();

        let mut push = |spec: LayerSpec, relu: bool, norm: bool, rng: &mut StdRng| {
            let out = spec.out_dim();
            blocks.push(Block {
                layer: L::build(spec, rng),
                relu,
                norm: norm.then(|| LayerNorm::new(out)),
            });
        };
        let spec = |in_dim, head_dim, heads, concat| LayerSpec {
            in_dim,
            head_dim,
            heads,
            concat,
            edge_dim: shape.edge_dim,
        };

        push(spec(shape.feature_dim, hidden, heads, true), true, true, &mut rng);
        for _ in 1..layers {
            push(spec(wide, hidden, heads, true), true, true, &mut rng);
        }
        push(spec(wide, hidden, 1, true), true, false, &mut rng);
        for _ in 1..layers {
            push(spec(hidden, hidden, 1, true), true, true, &mut rng);
        }
        push(spec(hidden, shape.feature_dim, 1, true), false, false, &mut rng);

        Self { shape, blocks }
    }

    pub fn shape(&self) -> ModelShape {
        self.shape
    }

    pub fn param_count(&self) -> usize {
        self.tensors().iter().map(|t| t.len()).sum()
    }

    /// Every parameter tensor in gradient-buffer order.
    pub fn tensors(&self) -> Vec<&Array2<f64>> {
        let mut out = Vec::new();
        for block in &self.blocks {
            out.extend(block.layer.tensors());
            if let Some(norm) = &block.norm {
                out.extend(norm.tensors());
            }
        }
        out
    }

    pub fn tensors_mut(&mut self) -> Vec<&mut Array2<f64>> {
        let mut out = Vec::new();
        for block in &mut self.blocks {
            out.extend(block.layer.tensors_mut());
            if let Some(norm) = &mut block.norm {
                out.extend(norm.tensors_mut());
            }
        }
        out
    }

    /// Zeroed gradient buffers matching [`Self::tensors`].
    pub fn zero_grads(&self) -> Vec<Array2<f64>> {
        zeros_like(&self.tensors())
    }

    pub fn forward(&self, x: &Array2<f64>, graph: &SensorGraph) -> Array2<f64> {
        self.forward_train(x, graph).0
    }

    pub fn forward_train(
        &self,
        x: &Array2<f64>,
        graph: &SensorGraph,
    ) -> (Array2<f64>, ForwardCache<L::Cache>) {
        let mut h = x.clone();
        let mut caches = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let (out, layer_cache) = block.layer.forward(&h, graph);
            let (activated, pre_activation) = if block.relu {
                (out.mapv(|v| v.max(0.0)), Some(out))
            } else {
                (out, None)
            };
            let (next, norm_cache) = match &block.norm {
                Some(norm) => {
                    let (y, c) = norm.forward(&activated);
                    (y, Some(c))
                }
                None => (activated, None),
            };
            caches.push(BlockCache {
                layer: layer_cache,
                pre_activation,
                norm: norm_cache,
            });
            h = next;
        }
        (h, ForwardCache { blocks: caches })
    }

    /// Backpropagate `grad_out` (dL/d reconstruction), accumulating into
    /// `grads`, which must come from [`Self::zero_grads`].
    pub fn backward(
        &self,
        cache: &ForwardCache<L::Cache>,
        grad_out: &Array2<f64>,
        graph: &SensorGraph,
        grads: &mut [Array2<f64>],
    ) {
        let mut offsets = Vec::with_capacity(self.blocks.len());
        let mut offset = 0;
        for block in &self.blocks {
            let layer_len = block.layer.tensors().len();
            let norm_len = block.norm.as_ref().map_or(0, |n| n.tensors().len());
            offsets.push((offset, layer_len, norm_len));
            offset += layer_len + norm_len;
        }

        let mut grad = grad_out.clone();
        for ((block, block_cache), &(start, layer_len, norm_len)) in self
            .blocks
            .iter()
            .zip(&cache.blocks)
            .zip(&offsets)
            .rev()
        {
            let (layer_grads, rest) =
                grads[start..start + layer_len + norm_len].split_at_mut(layer_len);
            if let (Some(norm), Some(norm_cache)) = (&block.norm, &block_cache.norm) {
                grad = norm.backward(norm_cache, &grad, rest);
            }
            if let Some(pre) = &block_cache.pre_activation {
                Zip::from(&mut grad).and(pre).for_each(|g, &p| {
                    if p <= 0.0 {
                        *g = 0.0;
                    }
                });
            }
            grad = block.layer.backward(&block_cache.layer, &grad, graph, layer_grads);
        }
    }

    /// Per-node mean absolute reconstruction error.
    pub fn reconstruction_error(&self, x: &Array2<f64>, graph: &SensorGraph) -> Vec<f64> {
        let diff = (&self.forward(x, graph) - x).mapv(f64::abs);
        diff.mean_axis(Axis(1))
            .map(|m| m.to_vec())
            .unwrap_or_else(|| vec![0.0; x.nrows()])
    }
}
