/*!
Log-density helpers for writing node closures.

Every function returns `f64::NEG_INFINITY` for values (or parameters) outside
the support, which the step engine treats as a rejection, and propagates
`NaN` inputs as `NaN`, which the graph reports as a numeric instability.

# Examples

```rust
use mini_pgm::distributions::{exponential_lpdf, normal_lpdf, poisson_lpmf};

assert!((normal_lpdf(0.0, 0.0, 1.0) + 0.9189385332046727).abs() < 1e-12);
assert_eq!(exponential_lpdf(-1.0, 2.0), f64::NEG_INFINITY);
assert_eq!(poisson_lpmf(0, 0.0), 0.0);
```
*/

use std::f64::consts::PI;

/// Normal density with mean `mu` and standard deviation `sigma`.
pub fn normal_lpdf(x: f64, mu: f64, sigma: f64) -> f64 {
    if x.is_nan() || mu.is_nan() || sigma.is_nan() {
        return f64::NAN;
    }
    if sigma <= 0.0 || sigma.is_infinite() {
        return f64::NEG_INFINITY;
    }
    let z = (x - mu) / sigma;
    -0.5 * (2.0 * PI).ln() - sigma.ln() - 0.5 * z * z
}

/// Continuous uniform density on `[lower, upper]`.
pub fn uniform_lpdf(x: f64, lower: f64, upper: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if !(lower < upper) || x < lower || x > upper {
        return f64::NEG_INFINITY;
    }
    -(upper - lower).ln()
}

/// Exponential density with rate `rate` (mean `1 / rate`).
pub fn exponential_lpdf(x: f64, rate: f64) -> f64 {
    if x.is_nan() || rate.is_nan() {
        return f64::NAN;
    }
    if rate <= 0.0 || x < 0.0 {
        return f64::NEG_INFINITY;
    }
    rate.ln() - rate * x
}

/// Half-normal density with scale `sigma`, supported on `x >= 0`.
pub fn half_normal_lpdf(x: f64, sigma: f64) -> f64 {
    if x.is_nan() || sigma.is_nan() {
        return f64::NAN;
    }
    if x < 0.0 {
        return f64::NEG_INFINITY;
    }
    normal_lpdf(x, 0.0, sigma) + 2.0_f64.ln()
}

/// `ln(k!)` by direct summation.
pub fn ln_factorial(k: u64) -> f64 {
    if k < 2 {
        0.0
    } else {
        (2..=k).map(|i| (i as f64).ln()).sum()
    }
}

/// Poisson mass at `k` with mean `lambda`.
pub fn poisson_lpmf(k: i64, lambda: f64) -> f64 {
    if lambda.is_nan() {
        return f64::NAN;
    }
    if k < 0 || lambda < 0.0 {
        return f64::NEG_INFINITY;
    }
    if lambda == 0.0 {
        return if k == 0 { 0.0 } else { f64::NEG_INFINITY };
    }
    let kf = k as f64;
    -lambda + kf * lambda.ln() - ln_factorial(k as u64)
}

/// Uniform mass over the integers `lower..=upper`.
pub fn discrete_uniform_lpmf(k: i64, lower: i64, upper: i64) -> f64 {
    if upper < lower || k < lower || k > upper {
        return f64::NEG_INFINITY;
    }
    -((upper - lower + 1) as f64).ln()
}

/// Bernoulli mass at `k` (0 or 1) with success probability `p`.
pub fn bernoulli_lpmf(k: i64, p: f64) -> f64 {
    if p.is_nan() {
        return f64::NAN;
    }
    if !(0.0..=1.0).contains(&p) {
        return f64::NEG_INFINITY;
    }
    match k {
        1 => p.ln(),
        0 => (1.0 - p).ln(),
        _ => f64::NEG_INFINITY,
    }
}

/// Categorical mass at index `k`. The weights are normalized to sum to one.
pub fn categorical_lpmf(k: i64, weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    if total.is_nan() {
        return f64::NAN;
    }
    if total <= 0.0 || weights.iter().any(|&w| w < 0.0) {
        return f64::NEG_INFINITY;
    }
    match usize::try_from(k).ok().and_then(|i| weights.get(i)) {
        Some(&w) => (w / total).ln(),
        None => f64::NEG_INFINITY,
    }
}

#[cfg(test)]
mod distributions_tests {
    use super::*;

    #[test]
    fn normal_lpdf_matches_reference() {
        // N(1; 0, 1) = 0.24197072451914337
        let p = normal_lpdf(1.0, 0.0, 1.0).exp();
        assert!((p - 0.24197072451914337).abs() < 1e-12, "got {p}");
        // N(3; 1, 2) = 0.12098536225957168
        let p = normal_lpdf(3.0, 1.0, 2.0).exp();
        assert!((p - 0.12098536225957168).abs() < 1e-12, "got {p}");
        assert_eq!(normal_lpdf(0.0, 0.0, 0.0), f64::NEG_INFINITY);
        assert!(normal_lpdf(f64::NAN, 0.0, 1.0).is_nan());
    }

    #[test]
    fn poisson_lpmf_matches_reference() {
        // Poisson(2; 3) = 0.22404180765538775
        let p = poisson_lpmf(2, 3.0).exp();
        assert!((p - 0.22404180765538775).abs() < 1e-12, "got {p}");
        assert_eq!(poisson_lpmf(-1, 3.0), f64::NEG_INFINITY);
        assert_eq!(poisson_lpmf(1, 0.0), f64::NEG_INFINITY);
    }

    #[test]
    fn support_boundaries() {
        assert_eq!(uniform_lpdf(0.5, 0.0, 2.0), -(2.0_f64).ln());
        assert_eq!(uniform_lpdf(2.5, 0.0, 2.0), f64::NEG_INFINITY);
        assert_eq!(exponential_lpdf(0.0, 2.0), 2.0_f64.ln());
        assert_eq!(half_normal_lpdf(-0.1, 1.0), f64::NEG_INFINITY);
        assert_eq!(discrete_uniform_lpmf(3, 0, 3), -(4.0_f64).ln());
        assert_eq!(discrete_uniform_lpmf(4, 0, 3), f64::NEG_INFINITY);
        assert_eq!(bernoulli_lpmf(2, 0.5), f64::NEG_INFINITY);
    }

    #[test]
    fn categorical_normalizes() {
        let w = [2.0, 3.0, 5.0];
        assert!((categorical_lpmf(2, &w) - 0.5_f64.ln()).abs() < 1e-12);
        assert_eq!(categorical_lpmf(3, &w), f64::NEG_INFINITY);
        assert_eq!(categorical_lpmf(-1, &w), f64::NEG_INFINITY);
    }

    #[test]
    fn ln_factorial_small_values() {
        assert_eq!(ln_factorial(0), 0.0);
        assert!((ln_factorial(5) - 120.0_f64.ln()).abs() < 1e-12);
    }
}
