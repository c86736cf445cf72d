/*!
Run configuration for a [`Sampler`](crate::sampler::Sampler).

```rust
use mini_pgm::config::RunConfig;
use mini_pgm::proposal::RandomWalk;

let config = RunConfig::new(10_000)
    .burn_in(2_000)
    .thin(4)
    .set_seed(42)
    .step_override("mu", RandomWalk::new(0.3));
assert_eq!(config.retained(), 2_000);
assert!(config.validate().is_ok());
```
*/

use indexmap::IndexMap;
use rand::{thread_rng, Rng};

use crate::errors::{PgmError, Result};
use crate::proposal::Proposal;
use crate::tuning::TuningPolicy;

#[derive(Debug)]
pub struct RunConfig {
    /// Total number of sweeps, burn-in included.
    pub iterations: usize,
    /// Leading sweeps that are not recorded.
    pub burn_in: usize,
    /// Record every `thin`-th sweep after burn-in.
    pub thin: usize,
    pub seed: u64,
    pub tuning: TuningPolicy,
    /// Keep tuning after burn-in.
    pub tune_throughout: bool,
    /// Starting scale of the default random-walk proposals.
    pub initial_scale: f64,
    /// Also record deterministic nodes in the trace.
    pub trace_deterministic: bool,
    pub(crate) overrides: IndexMap<String, Box<dyn Proposal>>,
}

impl RunConfig {
    /// A configuration with `iterations` sweeps, no burn-in, no thinning and a
    /// random seed.
    pub fn new(iterations: usize) -> Self {
        Self {
            iterations,
            burn_in: 0,
            thin: 1,
            seed: thread_rng().gen::<u64>(),
            tuning: TuningPolicy::default(),
            tune_throughout: false,
            initial_scale: 1.0,
            trace_deterministic: false,
            overrides: IndexMap::new(),
        }
    }

    pub fn burn_in(mut self, burn_in: usize) -> Self {
        self.burn_in = burn_in;
        self
    }

    pub fn thin(mut self, thin: usize) -> Self {
        self.thin = thin;
        self
    }

    /// Fixes the seed of the chain's random source for reproducible traces.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn tuning(mut self, tuning: TuningPolicy) -> Self {
        self.tuning = tuning;
        self
    }

    pub fn tune_interval(mut self, interval: usize) -> Self {
        self.tuning.interval = interval;
        self
    }

    pub fn tune_throughout(mut self, on: bool) -> Self {
        self.tune_throughout = on;
        self
    }

    pub fn initial_scale(mut self, scale: f64) -> Self {
        self.initial_scale = scale;
        self
    }

    pub fn trace_deterministic(mut self, on: bool) -> Self {
        self.trace_deterministic = on;
        self
    }

    /// Replaces the default proposal strategy of node `name`.
    pub fn step_override<P: Proposal + 'static>(mut self, name: &str, proposal: P) -> Self {
        self.overrides.insert(name.to_string(), Box::new(proposal));
        self
    }

    /// Number of sweeps the trace will hold.
    pub fn retained(&self) -> usize {
        if self.thin == 0 {
            return 0;
        }
        self.iterations.saturating_sub(self.burn_in) / self.thin
    }

    /// Checks the schedule before any sampling happens.
    pub fn validate(&self) -> Result<()> {
        if self.thin == 0 {
            return Err(PgmError::InvalidConfiguration(
                "thin interval must be at least 1".to_string(),
            ));
        }
        if self.burn_in > self.iterations {
            return Err(PgmError::InvalidConfiguration(format!(
                "burn-in ({}) exceeds iterations ({})",
                self.burn_in, self.iterations
            )));
        }
        if self.tuning.interval == 0 {
            return Err(PgmError::InvalidConfiguration(
                "tuning interval must be at least 1".to_string(),
            ));
        }
        if !(self.initial_scale.is_finite() && self.initial_scale > 0.0) {
            return Err(PgmError::InvalidConfiguration(format!(
                "initial proposal scale must be positive, got {}",
                self.initial_scale
            )));
        }
        Ok(())
    }
}
