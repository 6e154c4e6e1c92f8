use ndarray::{Array1, Array2, Axis, Zip};

const NORM_EPSILON: f64 = 1e-5;

/// Per-node layer normalization with learned scale and shift.
///
/// `gamma` and `beta` are `1 x dim` rows broadcast over the nodes.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    gamma: Array2<f64>,
    beta: Array2<f64>,
}

pub struct NormCache {
    normalized: Array2<f64>,
    inv_std: Array1<f64>,
}

impl LayerNorm {
    pub fn new(dim: usize) -> Self {
        Self {
            gamma: Array2::ones((1, dim)),
            beta: Array2::zeros((1, dim)),
        }
    }

    pub fn forward(&self, x: &Array2<f64>) -> (Array2<f64>, NormCache) {
        let dim = x.ncols().max(1) as f64;
        let mut normalized = x.clone();
        let mut inv_std = Array1::zeros(x.nrows());
        for (mut row, inv) in normalized.rows_mut().into_iter().zip(inv_std.iter_mut()) {
            let mu = row.sum() / dim;
            row -= mu;
            let var = row.mapv(|v| v * v).sum() / dim;
            *inv = 1.0 / (var + NORM_EPSILON).sqrt();
            row *= *inv;
        }
        let out = &normalized * &self.gamma + &self.beta;
        (out, NormCache { normalized, inv_std })
    }

    pub fn backward(
        &self,
        cache: &NormCache,
        grad_out: &Array2<f64>,
        grads: &mut [Array2<f64>],
    ) -> Array2<f64> {
        let dim = grad_out.ncols().max(1) as f64;
        grads[0] += &(grad_out * &cache.normalized)
            .sum_axis(Axis(0))
            .insert_axis(Axis(0));
        grads[1] += &grad_out.sum_axis(Axis(0)).insert_axis(Axis(0));

        let mut grad_x = grad_out * &self.gamma;
        for ((mut g, xhat), &inv) in grad_x
            .rows_mut()
            .into_iter()
            .zip(cache.normalized.rows())
            .zip(&cache.inv_std)
        {
            let mean_g = g.sum() / dim;
            let mean_gx = g.dot(&xhat) / dim;
            Zip::from(&mut g)
                .and(&xhat)
                .for_each(|gv, &xv| *gv = inv * (*gv - mean_g - xv * mean_gx));
        }
        grad_x
    }

    pub fn tensors(&self) -> Vec<&Array2<f64>> {
        vec![&self.gamma, &self.beta]
    }

    pub fn tensors_mut(&mut self) -> Vec<&mut Array2<f64>> {
        vec![&mut self.gamma, &mut self.beta]
    }
}
