/*!
# Sampler

The chain controller: owns a [`Graph`], one [`MetropolisStep`] per
unobserved node and a seeded random source, and runs the sweep schedule of a
[`RunConfig`].

A sweep applies every step once, in the graph's node order. The sampler moves
through [`Phase::Idle`], [`Phase::BurningIn`], [`Phase::Sampling`] and ends in
[`Phase::Finished`] after the configured number of sweeps. During burn-in
nothing is recorded; afterwards every `thin`-th sweep is appended to the
[`Trace`]. Adaptive proposals are retuned every tuning interval while burning
in (and afterwards too with `tune_throughout`).

# Examples

```rust
use mini_pgm::config::RunConfig;
use mini_pgm::distributions::{discrete_uniform_lpmf, exponential_lpdf};
use mini_pgm::graph::Graph;
use mini_pgm::node::NodeSpec;
use mini_pgm::sampler::{Phase, Sampler};

let graph = Graph::build(vec![
    NodeSpec::stochastic("rate", &[], 1.0, |v, _| exponential_lpdf(v.as_real().unwrap_or(f64::NAN), 1.0)),
    NodeSpec::stochastic("k", &[], 0i64, |v, _| discrete_uniform_lpmf(v.as_int().unwrap_or(-1), 0, 3))
        .with_categories(4),
])
.unwrap();

let config = RunConfig::new(500).burn_in(100).thin(2).set_seed(7);
let mut sampler = Sampler::new(graph, config).unwrap();
assert_eq!(sampler.phase(), Phase::Idle);

let trace = sampler.run().unwrap();
assert_eq!(trace.len(), 200);
assert_eq!(sampler.phase(), Phase::Finished);
assert!(sampler.acceptance_rate("k").unwrap() > 0.0);
```
*/

use indicatif::ProgressBar;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::config::RunConfig;
use crate::core::{progress_style, run_chain, run_chain_progress, MarkovChain};
use crate::errors::{PgmError, Result};
use crate::graph::Graph;
use crate::metropolis_hastings::MetropolisStep;
use crate::node::NodeKind;
use crate::proposal::default_proposal;
use crate::trace::Trace;
use crate::tuning::TuningPolicy;

/// Where the sampler is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    BurningIn,
    Sampling,
    Finished,
}

#[derive(Debug)]
pub struct Sampler {
    graph: Graph,
    steps: Vec<MetropolisStep>,
    /// Nodes copied into the trace, in node order.
    recorded: Vec<usize>,
    iterations: usize,
    burn_in: usize,
    thin: usize,
    tuning: TuningPolicy,
    tune_throughout: bool,
    seed: u64,
    rng: SmallRng,
    sweep: usize,
    phase: Phase,
    trace: Trace,
}

impl Sampler {
    /**
    Prepares a run of `config` over `graph`.

    # Errors

    [`PgmError::InvalidConfiguration`] for an invalid schedule, for a step
    override naming a node the sampler does not step, or for a proposal that
    cannot handle its node's value. [`PgmError::NumericInstability`] if the
    initial state has a NaN density.
    */
    pub fn new(mut graph: Graph, config: RunConfig) -> Result<Self> {
        config.validate()?;
        let RunConfig {
            iterations,
            burn_in,
            thin,
            seed,
            tuning,
            tune_throughout,
            initial_scale,
            trace_deterministic,
            mut overrides,
        } = config;

        if let Some(name) = overrides.keys().find(|name| !graph.contains(name)) {
            return Err(PgmError::InvalidConfiguration(format!(
                "step override for unknown node `{name}`"
            )));
        }

        let stepped = graph.unobserved_ids().to_vec();
        let mut steps = Vec::with_capacity(stepped.len());
        for id in stepped.iter().copied() {
            let node = graph.node(id);
            let proposal = overrides
                .shift_remove(node.name.as_str())
                .unwrap_or_else(|| default_proposal(&node.value, node.categories, initial_scale));
            steps.push(MetropolisStep::new(&graph, &node.name, proposal)?);
        }
        if let Some(name) = overrides.keys().next() {
            return Err(PgmError::InvalidConfiguration(format!(
                "step override for `{name}`, which is not a stochastic node"
            )));
        }

        let mut recorded = stepped;
        if trace_deterministic {
            recorded.extend(graph.ids_of_kind(NodeKind::Deterministic));
            recorded.sort_unstable();
        }
        let trace = Trace::new(recorded.iter().map(|&id| graph.node(id).name.as_str()));

        log::info!(
            "sampler over {} nodes ({} stepped): {} sweeps, burn-in {}, thin {}, seed {}",
            graph.len(),
            steps.len(),
            iterations,
            burn_in,
            thin,
            seed
        );
        if graph.joint_log_density()? == f64::NEG_INFINITY {
            log::warn!("initial state has zero probability; the chain starts outside the support");
        }

        Ok(Self {
            graph,
            steps,
            recorded,
            iterations,
            burn_in,
            thin,
            tuning,
            tune_throughout,
            seed,
            rng: SmallRng::seed_from_u64(seed),
            sweep: 0,
            phase: Phase::Idle,
            trace,
        })
    }

    /// Runs all remaining sweeps and returns the trace.
    pub fn run(&mut self) -> Result<&Trace> {
        run_chain(self)?;
        self.finish();
        Ok(&self.trace)
    }

    /// Like [`Sampler::run`], with a progress bar on the terminal.
    pub fn run_progress(&mut self) -> Result<&Trace> {
        let pb = ProgressBar::new(self.remaining() as u64);
        pb.set_prefix("Sampler");
        pb.set_style(progress_style());
        run_chain_progress(self, &pb)?;
        self.finish();
        Ok(&self.trace)
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn into_trace(self) -> Trace {
        self.trace
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Sweeps completed so far.
    pub fn sweep_count(&self) -> usize {
        self.sweep
    }

    pub fn steps(&self) -> &[MetropolisStep] {
        &self.steps
    }

    /// Acceptance rate of the node's proposals so far.
    pub fn acceptance_rate(&self, name: &str) -> Option<f64> {
        self.find_step(name).and_then(|s| s.stats().rate())
    }

    /// Current scale of the node's proposal.
    pub fn proposal_scale(&self, name: &str) -> Option<f64> {
        self.find_step(name).and_then(|s| s.proposal().scale())
    }

    fn find_step(&self, name: &str) -> Option<&MetropolisStep> {
        self.steps.iter().find(|s| s.name() == name)
    }

    fn retains(&self, sweep: usize) -> bool {
        sweep > self.burn_in && (sweep - self.burn_in) % self.thin == 0
    }

    fn sweep_once(&mut self) -> Result<()> {
        self.sweep += 1;
        let sweep = self.sweep;
        self.phase = if sweep <= self.burn_in {
            Phase::BurningIn
        } else {
            Phase::Sampling
        };

        let (graph, rng) = (&mut self.graph, &mut self.rng);
        let outcome = self
            .steps
            .iter_mut()
            .try_for_each(|step| step.step(graph, rng).map(|_| ()));
        if let Err(e) = outcome {
            self.record_diagnostics();
            return Err(e);
        }

        if (sweep <= self.burn_in || self.tune_throughout) && self.tuning.is_due(sweep) {
            for step in self.steps.iter_mut() {
                step.tune(sweep, &self.tuning);
            }
        }

        if self.retains(sweep) {
            self.trace.push(
                sweep,
                self.recorded.iter().map(|&id| &self.graph.node(id).value),
            );
        }

        if sweep == self.iterations {
            self.finish();
        }
        Ok(())
    }

    fn finish(&mut self) {
        if self.phase == Phase::Finished || self.sweep < self.iterations {
            return;
        }
        self.phase = Phase::Finished;
        self.record_diagnostics();
    }

    /// Copies each step's acceptance counts and final scale into the trace.
    fn record_diagnostics(&mut self) {
        for step in &self.steps {
            let stats = step.stats();
            self.trace
                .set_diagnostics(step.name(), stats, step.proposal().scale());
            log::info!(
                "`{}`: accepted {}/{} proposals ({:.3})",
                step.name(),
                stats.accepted,
                stats.proposed,
                stats.rate().unwrap_or(0.0)
            );
        }
    }
}

impl MarkovChain for Sampler {
    fn step(&mut self) -> Result<()> {
        if self.remaining() == 0 {
            self.finish();
            return Ok(());
        }
        self.sweep_once()
    }

    fn remaining(&self) -> usize {
        self.iterations - self.sweep
    }
}
