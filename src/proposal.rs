/*!
Proposal strategies used by the Metropolis step engine.

Every strategy is symmetric, so the acceptance rule needs no Hastings
correction. The random source is passed in explicitly; a strategy never owns
a generator, which keeps one seeded stream per chain.

```rust
use mini_pgm::proposal::{DiscreteUniform, Proposal, RandomWalk};
use mini_pgm::value::Value;
use rand::rngs::SmallRng;
use rand::SeedableRng;

let mut rng = SmallRng::seed_from_u64(42);
let walk = RandomWalk::new(0.5);
assert!(matches!(walk.propose(&Value::Real(1.0), &mut rng), Value::Real(_)));

let uniform = DiscreteUniform::new(3);
let k = uniform.propose(&Value::Int(0), &mut rng).as_int().unwrap();
assert!((0..3).contains(&k));
```
*/

use std::fmt::Debug;

use rand::{Rng, RngCore};
use rand_distr::StandardNormal;

use crate::value::Value;

/// A pluggable policy that perturbs one node's value.
pub trait Proposal: Debug + Send {
    /// Draws a candidate from `q(· | current)`. Must not mutate anything but `rng`.
    fn propose(&self, current: &Value, rng: &mut dyn RngCore) -> Value;

    /// Whether this strategy can produce candidates for `value`'s type.
    fn supports(&self, value: &Value) -> bool;

    /// Current proposal scale, for strategies that have one.
    fn scale(&self) -> Option<f64> {
        None
    }

    /// Sets the proposal scale; ignored by strategies without one.
    fn set_scale(&mut self, _scale: f64) {}

    /// Whether the sampler's tuning schedule should adjust the scale.
    fn is_adaptive(&self) -> bool {
        false
    }
}

fn gaussian_jump(rng: &mut dyn RngCore, scale: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    scale * z
}

fn perturb_real(current: &Value, scale: f64, rng: &mut dyn RngCore) -> Value {
    match current {
        Value::Real(x) => Value::Real(x + gaussian_jump(rng, scale)),
        Value::RealVec(v) => Value::RealVec(v.iter().map(|x| x + gaussian_jump(rng, scale)).collect()),
        other => other.clone(),
    }
}

/// Largest scale an integer walk accepts from the tuner.
const MAX_INTEGER_SCALE: f64 = i64::MAX as f64;

fn valid_scale(scale: f64) -> bool {
    scale.is_finite() && scale > 0.0
}

/// Gaussian random walk with a fixed scale.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomWalk {
    scale: f64,
}

impl RandomWalk {
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }
}

impl Proposal for RandomWalk {
    fn propose(&self, current: &Value, rng: &mut dyn RngCore) -> Value {
        perturb_real(current, self.scale, rng)
    }

    fn supports(&self, value: &Value) -> bool {
        matches!(value, Value::Real(_) | Value::RealVec(_))
    }

    fn scale(&self) -> Option<f64> {
        Some(self.scale)
    }
}

/// Gaussian random walk whose scale is retuned by the sampler during burn-in.
///
/// The strategy itself never changes its scale; see [`TuningPolicy`](crate::tuning::TuningPolicy).
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveRandomWalk {
    scale: f64,
}

impl AdaptiveRandomWalk {
    pub fn new(initial_scale: f64) -> Self {
        Self {
            scale: initial_scale,
        }
    }
}

impl Proposal for AdaptiveRandomWalk {
    fn propose(&self, current: &Value, rng: &mut dyn RngCore) -> Value {
        perturb_real(current, self.scale, rng)
    }

    fn supports(&self, value: &Value) -> bool {
        matches!(value, Value::Real(_) | Value::RealVec(_))
    }

    fn scale(&self) -> Option<f64> {
        Some(self.scale)
    }

    fn set_scale(&mut self, scale: f64) {
        if valid_scale(scale) {
            self.scale = scale;
        }
    }

    fn is_adaptive(&self) -> bool {
        true
    }
}

/**
Uniform draw from the category set `{0, .., categories-1}`.

With `allow_current` (the default) the current category may be re-selected,
which is a valid no-op proposal. Without it the draw is over the other
`categories - 1` values; a single-category node then always proposes itself.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscreteUniform {
    categories: usize,
    allow_current: bool,
}

impl DiscreteUniform {
    pub fn new(categories: usize) -> Self {
        Self {
            categories,
            allow_current: true,
        }
    }

    pub fn allow_current(mut self, allow: bool) -> Self {
        self.allow_current = allow;
        self
    }

    pub fn categories(&self) -> usize {
        self.categories
    }

    fn draw(&self, current: i64, rng: &mut dyn RngCore) -> i64 {
        let k = self.categories as i64;
        if k == 0 {
            return current;
        }
        let in_range = (0..k).contains(&current);
        if self.allow_current || k == 1 || !in_range {
            return rng.gen_range(0..k);
        }
        let d = rng.gen_range(0..k - 1);
        if d >= current {
            d + 1
        } else {
            d
        }
    }
}

impl Proposal for DiscreteUniform {
    fn propose(&self, current: &Value, rng: &mut dyn RngCore) -> Value {
        match current {
            Value::Int(k) => Value::Int(self.draw(*k, rng)),
            Value::IntVec(v) => Value::IntVec(v.iter().map(|&k| self.draw(k, rng)).collect()),
            other => other.clone(),
        }
    }

    fn supports(&self, value: &Value) -> bool {
        value.is_discrete() && self.categories > 0
    }
}

/// Integer random walk: current plus a rounded Gaussian jump. Used for
/// unbounded counts such as imputed Poisson observations.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteRandomWalk {
    scale: f64,
    adaptive: bool,
}

impl DiscreteRandomWalk {
    pub fn new(scale: f64) -> Self {
        Self {
            scale,
            adaptive: false,
        }
    }

    pub fn adaptive(initial_scale: f64) -> Self {
        Self {
            scale: initial_scale,
            adaptive: true,
        }
    }

    /// A jump that would overflow `i64` proposes `k` itself.
    fn jump(&self, k: i64, rng: &mut dyn RngCore) -> i64 {
        let step = gaussian_jump(rng, self.scale).round() as i64;
        k.checked_add(step).unwrap_or(k)
    }
}

impl Proposal for DiscreteRandomWalk {
    fn propose(&self, current: &Value, rng: &mut dyn RngCore) -> Value {
        match current {
            Value::Int(k) => Value::Int(self.jump(*k, rng)),
            Value::IntVec(v) => Value::IntVec(v.iter().map(|&k| self.jump(k, rng)).collect()),
            other => other.clone(),
        }
    }

    fn supports(&self, value: &Value) -> bool {
        value.is_discrete()
    }

    fn scale(&self) -> Option<f64> {
        Some(self.scale)
    }

    fn set_scale(&mut self, scale: f64) {
        if valid_scale(scale) && scale <= MAX_INTEGER_SCALE {
            self.scale = scale;
        }
    }

    fn is_adaptive(&self) -> bool {
        self.adaptive
    }
}

/// The strategy a node gets when the run configuration does not override it.
pub fn default_proposal(value: &Value, categories: Option<usize>, scale: f64) -> Box<dyn Proposal> {
    match (value.is_discrete(), categories) {
        (false, _) => Box::new(AdaptiveRandomWalk::new(scale)),
        (true, Some(k)) => Box::new(DiscreteUniform::new(k)),
        (true, None) => Box::new(DiscreteRandomWalk::adaptive(scale)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_walk_is_centered() {
        let mut rng = SmallRng::seed_from_u64(42);
        let walk = RandomWalk::new(2.0);
        let n = 20_000;
        let draws: Vec<f64> = (0..n)
            .map(|_| walk.propose(&Value::Real(3.0), &mut rng).as_real().unwrap())
            .collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        assert!((mean - 3.0).abs() < 0.05, "mean {mean}");
        assert!((var - 4.0).abs() < 0.2, "var {var}");
    }

    #[test]
    fn test_vector_walk_keeps_length() {
        let mut rng = SmallRng::seed_from_u64(1);
        let walk = AdaptiveRandomWalk::new(0.1);
        let out = walk.propose(&Value::RealVec(vec![0.0; 4]), &mut rng);
        assert!(out.same_shape(&Value::RealVec(vec![0.0; 4])));
        assert!(out.to_f64_vec().iter().all(|x| x.abs() < 1.0));
    }

    #[test]
    fn test_adaptive_scale_rejects_invalid() {
        let mut walk = AdaptiveRandomWalk::new(1.0);
        walk.set_scale(0.25);
        assert_eq!(walk.scale(), Some(0.25));
        walk.set_scale(0.0);
        walk.set_scale(f64::NAN);
        assert_eq!(walk.scale(), Some(0.25));
        assert!(walk.is_adaptive());
        assert!(!RandomWalk::new(1.0).is_adaptive());
    }

    #[test]
    fn test_discrete_uniform_excluding_current() {
        let mut rng = SmallRng::seed_from_u64(7);
        let proposal = DiscreteUniform::new(3).allow_current(false);
        let mut seen = [0usize; 3];
        for _ in 0..3_000 {
            let k = proposal.propose(&Value::Int(1), &mut rng).as_int().unwrap();
            assert_ne!(k, 1);
            seen[k as usize] += 1;
        }
        assert_eq!(seen[1], 0);
        assert!(seen[0] > 1_300 && seen[2] > 1_300, "{seen:?}");
    }

    #[test]
    fn test_discrete_uniform_may_reselect_current() {
        let mut rng = SmallRng::seed_from_u64(7);
        let proposal = DiscreteUniform::new(2);
        let repeats = (0..1_000)
            .filter(|_| proposal.propose(&Value::Int(0), &mut rng) == Value::Int(0))
            .count();
        assert!(repeats > 400 && repeats < 600, "{repeats}");
    }

    #[test]
    fn test_supports() {
        assert!(RandomWalk::new(1.0).supports(&Value::RealVec(vec![1.0])));
        assert!(!RandomWalk::new(1.0).supports(&Value::Int(1)));
        assert!(DiscreteUniform::new(4).supports(&Value::IntVec(vec![0, 1])));
        assert!(!DiscreteUniform::new(0).supports(&Value::Int(0)));
        assert!(!DiscreteRandomWalk::new(1.0).supports(&Value::Real(0.0)));
    }

    #[test]
    fn test_integer_walk_never_overflows() {
        let mut rng = SmallRng::seed_from_u64(3);
        let walk = DiscreteRandomWalk::new(1e19);
        for start in [i64::MAX - 5, i64::MIN + 5, 0] {
            for _ in 0..100 {
                assert!(matches!(walk.propose(&Value::Int(start), &mut rng), Value::Int(_)));
            }
        }

        let mut tuned = DiscreteRandomWalk::adaptive(1.0);
        tuned.set_scale(1e18);
        tuned.set_scale(1e30);
        assert_eq!(tuned.scale(), Some(1e18));
    }

    #[test]
    fn test_default_assignment() {
        assert!(default_proposal(&Value::Real(0.0), None, 1.0).is_adaptive());
        let cat = default_proposal(&Value::Int(0), Some(3), 1.0);
        assert!(!cat.is_adaptive());
        assert_eq!(cat.scale(), None);
        let count = default_proposal(&Value::Int(0), None, 1.0);
        assert!(count.is_adaptive());
        assert_eq!(count.scale(), Some(1.0));
    }
}
