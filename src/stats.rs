//! Acceptance bookkeeping and posterior summaries of recorded traces.

use ndarray::prelude::*;
use ndarray::s;
use ndarray_stats::QuantileExt;
use rustfft::{num_complex::Complex, FftPlanner};
use std::cmp::Ordering;

/// Proposal and acceptance counts of one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptanceStats {
    pub proposed: u64,
    pub accepted: u64,
}

impl AcceptanceStats {
    pub fn record(&mut self, accepted: bool) {
        self.proposed += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    pub fn rate(&self) -> Option<f64> {
        if self.proposed == 0 {
            None
        } else {
            Some(self.accepted as f64 / self.proposed as f64)
        }
    }
}

/// Quantile levels reported by [`summarize`].
pub const QUANTILES: [f64; 5] = [0.025, 0.25, 0.5, 0.75, 0.975];

/// Posterior summary of one scalar sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub n: usize,
    pub mean: f64,
    pub sd: f64,
    /// Monte Carlo standard error from batch means.
    pub mc_error: f64,
    pub min: f64,
    pub max: f64,
    /// Values at the levels of [`QUANTILES`].
    pub quantiles: [f64; 5],
    /// Effective sample size.
    pub ess: f64,
}

/// Summarizes a sequence of draws. Returns `None` for an empty sequence.
pub fn summarize(x: ArrayView1<f64>) -> Option<Summary> {
    let n = x.len();
    let mean = x.mean()?;
    let sd = if n > 1 { x.var(1.0).sqrt() } else { 0.0 };
    let min = x.min().map(|v| *v).unwrap_or(f64::NAN);
    let max = x.max().map(|v| *v).unwrap_or(f64::NAN);

    let mut sorted = x.to_vec();
    sorted.sort_unstable_by(cmp_f64);
    let quantiles = QUANTILES.map(|q| quantile_sorted(&sorted, q));

    Some(Summary {
        n,
        mean,
        sd,
        mc_error: batch_means_error(x, 5),
        min,
        max,
        quantiles,
        ess: effective_sample_size(x),
    })
}

fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// Linear-interpolation quantile of an ascending slice.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Standard error of the mean estimated from `batches` contiguous batch means.
pub fn batch_means_error(x: ArrayView1<f64>, batches: usize) -> f64 {
    let n = x.len();
    if n == 0 {
        return f64::NAN;
    }
    if batches < 2 || n < batches {
        let sd = if n > 1 { x.var(1.0).sqrt() } else { 0.0 };
        return sd / (n as f64).sqrt();
    }
    let size = n / batches;
    let means: Array1<f64> = (0..batches)
        .map(|b| {
            x.slice(s![b * size..(b + 1) * size])
                .mean()
                .unwrap_or(f64::NAN)
        })
        .collect();
    means.var(1.0).sqrt() / (batches as f64).sqrt()
}

/// Autocovariance of `x` at lags `0..n`, normalized by `n`.
pub fn autocov(x: ArrayView1<f64>) -> Array1<f64> {
    if x.len() <= 100 {
        autocov_bf(x)
    } else {
        autocov_fft(x)
    }
}

/// Zero-padded FFT autocovariance; padding to at least `2n - 1` avoids wrap-around.
fn autocov_fft(x: ArrayView1<f64>) -> Array1<f64> {
    let n = x.len();
    let mean = x.mean().unwrap_or(0.0);
    let mut n_padded = 1;
    while n_padded < 2 * n - 1 {
        n_padded <<= 1;
    }
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n_padded);
    let ffti = planner.plan_fft_inverse(n_padded);

    let mut buffer: Vec<Complex<f64>> = x
        .iter()
        .map(|&xi| Complex::new(xi - mean, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)).take(n_padded - n))
        .collect();
    fft.process(&mut buffer);
    buffer.iter_mut().for_each(|xi| *xi *= xi.conj());
    ffti.process(&mut buffer);
    // rustfft leaves the inverse transform unnormalized
    buffer
        .iter()
        .take(n)
        .map(|xi| xi.re / n_padded as f64 / n as f64)
        .collect()
}

fn autocov_bf(x: ArrayView1<f64>) -> Array1<f64> {
    let n = x.len();
    let mean = x.mean().unwrap_or(0.0);
    let centered = x.mapv(|xi| xi - mean);
    (0..n)
        .map(|lag| {
            let head = centered.slice(s![..n - lag]);
            let tail = centered.slice(s![lag..]);
            head.dot(&tail) / n as f64
        })
        .collect()
}

/**
Effective sample size of a single chain, using Geyer's initial monotone
sequence estimator on the autocorrelations.

A constant chain has no variance to decorrelate and reports `n`.
*/
pub fn effective_sample_size(x: ArrayView1<f64>) -> f64 {
    let n = x.len();
    if n < 4 {
        return n as f64;
    }
    let acov = autocov(x);
    let c0 = acov[0];
    if c0 <= 0.0 || !c0.is_finite() {
        return n as f64;
    }

    let mut min_pair = f64::INFINITY;
    let mut sum = 0.0;
    for t in (0..n - 1).step_by(2) {
        let mut pair = (acov[t] + acov[t + 1]) / c0;
        if pair <= 0.0 {
            break;
        }
        if pair > min_pair {
            pair = min_pair;
        }
        min_pair = pair;
        sum += pair;
    }
    let tau = -1.0 + 2.0 * sum;
    if tau <= 0.0 {
        return n as f64;
    }
    n as f64 / tau
}
