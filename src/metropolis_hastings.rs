/*!
# Metropolis Step Engine

A [`MetropolisStep`] updates a single node of a [`Graph`] with a symmetric
[`Proposal`]:

1. evaluate the log-density terms that depend on the node (`ld_before`),
2. save the node and every value its change would refresh,
3. draw a candidate, assign it and refresh deterministic descendants,
4. evaluate the same terms again (`ld_after`),
5. accept with probability `min(1, exp(ld_after - ld_before))`,
6. on rejection restore the saved values exactly.

Because every proposal is symmetric, no Hastings correction is applied. A move
into a zero-probability state (`ld_after == -inf`) is never accepted; a move out
of one is always accepted.
*/

use rand::rngs::SmallRng;
use rand::Rng;

use crate::errors::{PgmError, Result};
use crate::graph::Graph;
use crate::proposal::Proposal;
use crate::stats::AcceptanceStats;
use crate::tuning::{AdaptiveState, TuningPolicy};

/**
The Metropolis acceptance rule for symmetric proposals.

`u` is a uniform draw from `[0, 1)`. Moves that do not decrease the
log-density are always accepted; moves into `-inf` are always rejected.

```rust
use mini_pgm::metropolis_hastings::accept;

assert!(accept(-3.0, -1.0, 0.999));
assert!(!accept(-1.0, f64::NEG_INFINITY, 0.0));
assert!(accept(f64::NEG_INFINITY, -1e6, 0.999));
assert!(!accept(0.0, -2.0, 0.5));
```
*/
pub fn accept(ld_before: f64, ld_after: f64, u: f64) -> bool {
    if ld_after == f64::NEG_INFINITY {
        return false;
    }
    if ld_after >= ld_before {
        return true;
    }
    u < (ld_after - ld_before).exp()
}

/// Applies one proposal strategy to one node.
#[derive(Debug)]
pub struct MetropolisStep {
    node: usize,
    name: String,
    proposal: Box<dyn Proposal>,
    stats: AcceptanceStats,
    adaptive: Option<AdaptiveState>,
}

impl MetropolisStep {
    /// Creates a step for the stochastic node `name`.
    ///
    /// # Errors
    ///
    /// [`PgmError::UnknownNode`] for a name the graph does not know, and
    /// [`PgmError::InvalidConfiguration`] if the node is not stepped by the
    /// sampler or the strategy cannot handle its value type.
    pub fn new(graph: &Graph, name: &str, proposal: Box<dyn Proposal>) -> Result<Self> {
        let node = graph.id(name)?;
        if !graph.node(node).is_unobserved() {
            return Err(PgmError::InvalidConfiguration(format!(
                "node `{name}` is {:?} and cannot be stepped",
                graph.node(node).kind
            )));
        }
        if !proposal.supports(&graph.node(node).value) {
            return Err(PgmError::InvalidConfiguration(format!(
                "proposal {proposal:?} does not support the value of node `{name}`"
            )));
        }
        let adaptive = proposal.is_adaptive().then(AdaptiveState::default);
        Ok(Self {
            node,
            name: name.to_string(),
            proposal,
            stats: AcceptanceStats::default(),
            adaptive,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn proposal(&self) -> &dyn Proposal {
        self.proposal.as_ref()
    }

    /// Acceptance counts over the whole run.
    pub fn stats(&self) -> AcceptanceStats {
        self.stats
    }

    pub fn adaptive_state(&self) -> Option<&AdaptiveState> {
        self.adaptive.as_ref()
    }

    /// Performs one Metropolis update of the node and reports whether the
    /// candidate was accepted. Rejection is a normal outcome, not an error.
    ///
    /// # Errors
    ///
    /// [`PgmError::NumericInstability`] if a density or computed value is NaN.
    /// The graph is restored to its pre-step values before the error returns.
    pub fn step(&mut self, graph: &mut Graph, rng: &mut SmallRng) -> Result<bool> {
        let ld_before = graph.local_log_density(self.node)?;
        let snapshot = graph.snapshot(self.node);
        let candidate = self.proposal.propose(&graph.node(self.node).value, rng);
        if candidate.has_nan() {
            return Err(PgmError::NumericInstability {
                node: self.name.clone(),
                detail: "proposal produced NaN".to_string(),
            });
        }

        let node = self.node;
        let outcome = graph
            .assign(node, candidate)
            .and_then(|_| graph.local_log_density(node));
        let ld_after = match outcome {
            Ok(ld) => ld,
            Err(e) => {
                graph.restore(snapshot);
                return Err(e);
            }
        };

        let u: f64 = rng.gen();
        let accepted = accept(ld_before, ld_after, u);
        if !accepted {
            graph.restore(snapshot);
        }

        self.stats.record(accepted);
        if let Some(state) = self.adaptive.as_mut() {
            state.record(accepted);
        }
        Ok(accepted)
    }

    /// Retunes the proposal scale from the acceptance rate since the last
    /// adjustment. Returns `(old, new)` when the scale changed.
    pub fn tune(&mut self, sweep: usize, policy: &TuningPolicy) -> Option<(f64, f64)> {
        let state = self.adaptive.as_mut()?;
        let old = self.proposal.scale()?;
        let rate = state.rate();
        let new = state.tune(sweep, policy, old);
        if new == old {
            return None;
        }
        self.proposal.set_scale(new);
        log::debug!(
            "sweep {sweep}: retuned `{}` scale {old:.4} -> {:.4} (acceptance {:.3})",
            self.name,
            self.proposal.scale().unwrap_or(new),
            rate.unwrap_or(f64::NAN)
        );
        Some((old, new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::{normal_lpdf, uniform_lpdf};
    use crate::node::NodeSpec;
    use crate::proposal::RandomWalk;
    use crate::value::Value;
    use rand::{RngCore, SeedableRng};

    fn real(v: &Value) -> f64 {
        v.as_real().unwrap_or(f64::NAN)
    }

    /// Always proposes a fixed value.
    #[derive(Debug)]
    struct Fixed(f64);

    impl Proposal for Fixed {
        fn propose(&self, _current: &Value, _rng: &mut dyn RngCore) -> Value {
            Value::Real(self.0)
        }

        fn supports(&self, value: &Value) -> bool {
            matches!(value, Value::Real(_))
        }
    }

    fn model() -> Graph {
        Graph::build(vec![
            NodeSpec::stochastic("x", &[], 0.3, |v, _| uniform_lpdf(real(v), 0.0, 1.0)),
            NodeSpec::deterministic("y", &["x"], |p| Value::Real(p.real(0).sqrt() * 3.7)),
            NodeSpec::deterministic("z", &["y", "x"], |p| Value::Real(p.real(0) / 7.0 + p.real(1))),
            NodeSpec::observed("obs", &["z"], 1.0, |v, p| normal_lpdf(real(v), p.real(0), 0.5)),
        ])
        .unwrap()
    }

    #[test]
    fn test_uphill_moves_always_accepted() {
        for _ in 0..1_000 {
            let u: f64 = rand::thread_rng().gen();
            assert!(accept(-5.0, -5.0, u));
            assert!(accept(-5.0, -1.0, u));
            assert!(accept(f64::NEG_INFINITY, -100.0, u));
        }
    }

    #[test]
    fn test_moves_into_zero_probability_rejected() {
        assert!(!accept(-1.0, f64::NEG_INFINITY, 0.0));
        assert!(!accept(f64::NEG_INFINITY, f64::NEG_INFINITY, 0.0));
    }

    #[test]
    fn test_downhill_acceptance_probability() {
        let p = (-1.0f64).exp();
        assert!(accept(0.0, -1.0, p - 1e-9));
        assert!(!accept(0.0, -1.0, p + 1e-9));
    }

    #[test]
    fn test_rejection_restores_state_exactly() {
        let mut graph = model();
        let before: Vec<Value> = ["x", "y", "z"]
            .iter()
            .map(|n| graph.value(n).unwrap().clone())
            .collect();
        let mut step = MetropolisStep::new(&graph, "x", Box::new(Fixed(5.0))).unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..10 {
            assert!(!step.step(&mut graph, &mut rng).unwrap());
        }
        for (name, expected) in ["x", "y", "z"].iter().zip(&before) {
            let got = graph.value(name).unwrap();
            assert_eq!(
                got.to_f64_vec()[0].to_bits(),
                expected.to_f64_vec()[0].to_bits(),
                "{name} drifted"
            );
        }
        assert_eq!(step.stats().accepted, 0);
        assert_eq!(step.stats().proposed, 10);
    }

    #[test]
    fn test_accepted_move_refreshes_descendants() {
        let mut graph = model();
        let mut step = MetropolisStep::new(&graph, "x", Box::new(Fixed(0.64))).unwrap();
        let mut rng = SmallRng::seed_from_u64(3);
        let mut accepted = false;
        for _ in 0..50 {
            accepted |= step.step(&mut graph, &mut rng).unwrap();
        }
        assert!(accepted);
        assert_eq!(graph.value("x").unwrap(), &Value::Real(0.64));
        let y = 0.64f64.sqrt() * 3.7;
        assert_eq!(graph.value("y").unwrap(), &Value::Real(y));
        assert_eq!(graph.value("z").unwrap(), &Value::Real(y / 7.0 + 0.64));
    }

    #[test]
    fn test_observed_and_deterministic_cannot_be_stepped() {
        let graph = model();
        for name in ["y", "obs"] {
            assert!(matches!(
                MetropolisStep::new(&graph, name, Box::new(RandomWalk::new(1.0))),
                Err(PgmError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_nan_density_aborts_and_restores() {
        let mut graph = Graph::build(vec![NodeSpec::stochastic("w", &[], 1.0, |v, _| {
            let x = real(v);
            if x > 2.0 {
                f64::NAN
            } else {
                0.0
            }
        })])
        .unwrap();
        let mut step = MetropolisStep::new(&graph, "w", Box::new(Fixed(3.0))).unwrap();
        let mut rng = SmallRng::seed_from_u64(0);
        assert!(matches!(
            step.step(&mut graph, &mut rng),
            Err(PgmError::NumericInstability { .. })
        ));
        assert_eq!(graph.value("w").unwrap(), &Value::Real(1.0));
    }
}
