//! Spectral and ordinal (permutation) entropy of short pressure windows.
//!
//! Both are Shannon entropies in bits. A leak changes the texture of the
//! pressure signal near the sensor, which shows up as a shift in how spread
//! the power spectrum is and how varied the local ordering patterns are.

use std::collections::HashMap;
use std::f64::consts::PI;

use super::stats::sanitize;

/// Offset added to the permutation entropy before combining, so a perfectly
/// regular ordinal structure does not zero out the spectral term.
const PERMUTATION_FLOOR: f64 = 1e-3;

/// Shannon entropy (base 2) of a discrete distribution. Zero terms are skipped.
fn shannon_bits(probs: impl Iterator<Item = f64>) -> f64 {
    -probs.filter(|p| *p > 0.0).map(|p| p * p.log2()).sum::<f64>()
}

/// Entropy of the normalized DFT power spectrum.
///
/// Returns 0.0 when the series has no energy. Non-finite input propagates
/// to a non-finite result; callers sanitize.
pub fn spectral_entropy(series: &[f64]) -> f64 {
    let n = series.len();
    if n == 0 {
        return 0.0;
    }

    // Twiddle table indexed by (k * t) mod n keeps the angles exact.
    let twiddles: Vec<(f64, f64)> = (0..n)
        .map(|m| {
            let angle = -2.0 * PI * m as f64 / n as f64;
            (angle.cos(), angle.sin())
        })
        .collect();

    let power: Vec<f64> = (0..n)
        .map(|k| {
            let (mut re, mut im) = (0.0, 0.0);
            for (t, &x) in series.iter().enumerate() {
                let (c, s) = twiddles[(k * t) % n];
                re += x * c;
                im += x * s;
            }
            re * re + im * im
        })
        .collect();

    let total: f64 = power.iter().sum();
    if total == 0.0 {
        return 0.0;
    }
    shannon_bits(power.iter().map(|p| p / total))
}

/// Permutation entropy with embedding dimension `m` and delay `tau`.
///
/// Each embedded vector `x[i], x[i + tau], ..., x[i + (m-1) tau]` is reduced to
/// the permutation that sorts it (stable, NaN last). Series too short to hold
/// one vector give 0.0.
pub fn permutation_entropy(series: &[f64], m: usize, tau: usize) -> f64 {
    let n = series.len();
    if m == 0 || tau == 0 || n <= (m - 1) * tau {
        return 0.0;
    }

    let count = n - (m - 1) * tau;
    let mut patterns: HashMap<Vec<usize>, usize> = HashMap::new();
    let mut pattern = Vec::with_capacity(m);
    for i in 0..count {
        pattern.clear();
        pattern.extend(0..m);
        pattern.sort_by(|&a, &b| series[i + a * tau].total_cmp(&series[i + b * tau]));
        *patterns.entry(pattern.clone()).or_insert(0) += 1;
    }

    shannon_bits(patterns.values().map(|&c| c as f64 / count as f64))
}

/// Entropy pair for one node window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntropyFeature {
    pub spectral: f64,
    pub permutation: f64,
}

impl EntropyFeature {
    /// Compute both entropies. Permutation entropy runs on the series
    /// decimated by `decimation`. Non-finite results are replaced with zero.
    pub fn extract(series: &[f64], m: usize, tau: usize, decimation: usize) -> Self {
        let step = decimation.max(1);
        let decimated: Vec<f64> = series.iter().step_by(step).copied().collect();
        Self {
            spectral: sanitize(spectral_entropy(series)),
            permutation: sanitize(permutation_entropy(&decimated, m, tau)),
        }
    }

    /// Single discriminative score: spectral * (permutation + floor).
    pub fn combined(&self) -> f64 {
        sanitize(self.spectral * (self.permutation + PERMUTATION_FLOOR))
    }
}
