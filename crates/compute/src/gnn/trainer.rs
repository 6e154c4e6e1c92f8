use std::time::Instant;

use aquaguard_core::GnnConfig;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::graph::SensorGraph;
use super::layer::MessagePassing;
use super::model::GraphAutoencoder;
use super::optimizer::{clip_grad_norm, AdamW};

/// Outcome of one autoencoder training run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs_run: usize,
    pub best_epoch: usize,
    pub best_val_loss: f64,
    pub train_losses: Vec<f64>,
    pub val_losses: Vec<f64>,
    pub train_samples: usize,
    pub val_samples: usize,
    pub elapsed_ms: u64,
}

/// Train `model` to reconstruct `samples` (already scaled) and restore the
/// weights of the epoch with the lowest validation loss.
///
/// The last `val_fraction` of the samples (chronological order) are held out.
/// Training stops once validation loss fails to improve for `patience`
/// consecutive epochs.
pub fn train_autoencoder<L: MessagePassing>(
    model: &mut GraphAutoencoder<L>,
    samples: &[Array2<f64>],
    graph: &SensorGraph,
    config: &GnnConfig,
) -> TrainingReport {
    let start = Instant::now();
    let val_len = ((samples.len() as f64) * config.val_fraction.clamp(0.0, 0.9)).floor() as usize;
    let split = samples.len() - val_len;
    let (train, val) = samples.split_at(split);

    let mut report = TrainingReport {
        best_val_loss: f64::INFINITY,
        train_samples: train.len(),
        val_samples: val.len(),
        ..Default::default()
    };
    if train.is_empty() {
        return report;
    }

    let mut optimizer = AdamW::new(model, config.learning_rate, config.weight_decay);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut order: Vec<usize> = (0..train.len()).collect();
    let mut best = model.clone();
    let mut stale = 0;

    for epoch in 0..config.epochs {
        order.shuffle(&mut rng);
        let mut epoch_loss = 0.0;
        for batch in order.chunks(config.batch_size.max(1)) {
            let (loss, mut grads) = batch_gradients(model, train, batch, graph);
            epoch_loss += loss;
            if config.grad_clip > 0.0 {
                clip_grad_norm(&mut grads, config.grad_clip);
            }
            optimizer.step(model, &grads);
        }
        let train_loss = epoch_loss / train.len() as f64;
        let monitored = if val.is_empty() {
            train_loss
        } else {
            mean_loss(model, val, graph)
        };

        report.epochs_run = epoch + 1;
        report.train_losses.push(train_loss);
        report.val_losses.push(monitored);
        debug!(epoch, train_loss, val_loss = monitored, "Autoencoder epoch");

        if monitored < report.best_val_loss {
            report.best_val_loss = monitored;
            report.best_epoch = epoch;
            best = model.clone();
            stale = 0;
        } else {
            stale += 1;
            if stale >= config.patience.max(1) {
                debug!(epoch, "Early stopping");
                break;
            }
        }
    }

    *model = best;
    report.elapsed_ms = start.elapsed().as_millis() as u64;
    info!(
        epochs = report.epochs_run,
        best_epoch = report.best_epoch,
        best_val_loss = report.best_val_loss,
        train = report.train_samples,
        val = report.val_samples,
        "Autoencoder trained in {}ms",
        report.elapsed_ms
    );
    report
}

/// Mean squared difference between two equally shaped matrices.
pub(crate) fn mse(a: &Array2<f64>, b: &Array2<f64>) -> f64 {
    (a - b).mapv(|v| v * v).mean().unwrap_or(0.0)
}

/// Summed MSE over the batch and the batch-mean gradient.
fn batch_gradients<L: MessagePassing>(
    model: &GraphAutoencoder<L>,
    samples: &[Array2<f64>],
    batch: &[usize],
    graph: &SensorGraph,
) -> (f64, Vec<Array2<f64>>) {
    let scale = 1.0 / batch.len() as f64;
    batch
        .par_iter()
        .fold(
            || (0.0, model.zero_grads()),
            |(loss, mut grads), &idx| {
                let x = &samples[idx];
                let (y, cache) = model.forward_train(x, graph);
                let count = y.len().max(1) as f64;
                let grad_out = (&y - x) * (2.0 / count * scale);
                model.backward(&cache, &grad_out, graph, &mut grads);
                (loss + mse(&y, x), grads)
            },
        )
        .reduce(
            || (0.0, model.zero_grads()),
            |(la, mut ga), (lb, gb)| {
                for (a, b) in ga.iter_mut().zip(&gb) {
                    *a += b;
                }
                (la + lb, ga)
            },
        )
}

fn mean_loss<L: MessagePassing>(
    model: &GraphAutoencoder<L>,
    samples: &[Array2<f64>],
    graph: &SensorGraph,
) -> f64 {
    let total: f64 = samples
        .par_iter()
        .map(|x| mse(&model.forward(x, graph), x))
        .sum();
    total / samples.len().max(1) as f64
}
