use ndarray::{Array2, Zip};

use super::layer::MessagePassing;
use super::model::GraphAutoencoder;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;

/// Adam with decoupled weight decay.
#[derive(Debug, Clone)]
pub struct AdamW {
    learning_rate: f64,
    weight_decay: f64,
    step: i32,
    m: Vec<Array2<f64>>,
    v: Vec<Array2<f64>>,
}

impl AdamW {
    pub fn new<L: MessagePassing>(
        model: &GraphAutoencoder<L>,
        learning_rate: f64,
        weight_decay: f64,
    ) -> Self {
        Self {
            learning_rate,
            weight_decay,
            step: 0,
            m: model.zero_grads(),
            v: model.zero_grads(),
        }
    }

    pub fn step<L: MessagePassing>(
        &mut self,
        model: &mut GraphAutoencoder<L>,
        grads: &[Array2<f64>],
    ) {
        self.step += 1;
        let lr = self.learning_rate;
        let wd = self.weight_decay;
        let bias1 = 1.0 - BETA1.powi(self.step);
        let bias2 = 1.0 - BETA2.powi(self.step);

        for (((p, g), m), v) in model
            .tensors_mut()
            .into_iter()
            .zip(grads)
            .zip(&mut self.m)
            .zip(&mut self.v)
        {
            Zip::from(p).and(g).and(m).and(v).for_each(|p, &g, m, v| {
                *m = BETA1 * *m + (1.0 - BETA1) * g;
                *v = BETA2 * *v + (1.0 - BETA2) * g * g;
                let m_hat = *m / bias1;
                let v_hat = *v / bias2;
                *p -= lr * wd * *p;
                *p -= lr * m_hat / (v_hat.sqrt() + ADAM_EPSILON);
            });
        }
    }
}

/// Rescale `grads` in place so their global L2 norm is at most `max_norm`.
/// Returns the norm before clipping.
pub fn clip_grad_norm(grads: &mut [Array2<f64>], max_norm: f64) -> f64 {
    let norm = grads
        .iter()
        .map(|g| g.iter().map(|v| v * v).sum::<f64>())
        .sum::<f64>()
        .sqrt();
    if norm > max_norm && norm.is_finite() && max_norm > 0.0 {
        let scale = max_norm / (norm + 1e-6);
        for g in grads.iter_mut() {
            *g *= scale;
        }
    }
    norm
}
