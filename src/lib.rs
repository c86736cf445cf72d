/*!
# Mini PGM

Metropolis-within-Gibbs sampling over small probabilistic graphical models.

A model is a list of [`NodeSpec`](node::NodeSpec)s: stochastic nodes with a
prior density, deterministic nodes computed from their parents and observed
nodes carrying data (optionally with missing entries, which become latent
nodes of their own). [`Graph::build`](graph::Graph::build) validates and
orders them; a [`Sampler`](sampler::Sampler) steps every unobserved node once
per sweep and records the retained sweeps in a [`Trace`](trace::Trace).

```rust
use mini_pgm::config::RunConfig;
use mini_pgm::distributions::normal_lpdf;
use mini_pgm::graph::Graph;
use mini_pgm::node::NodeSpec;
use mini_pgm::sampler::Sampler;

let graph = Graph::build(vec![
    NodeSpec::stochastic("mu", &[], 0.0, |v, _| normal_lpdf(v.as_real().unwrap_or(f64::NAN), 0.0, 10.0)),
    NodeSpec::observed("y", &["mu"], vec![4.8, 5.1, 5.3], |v, p| {
        v.to_f64_vec().iter().map(|&y| normal_lpdf(y, p.real(0), 1.0)).sum()
    }),
])
.unwrap();

let config = RunConfig::new(5_000).burn_in(1_000).set_seed(42);
let mut sampler = Sampler::new(graph, config).unwrap();
let trace = sampler.run().unwrap();
let mu = &trace.summary("mu").unwrap()[0];
assert!((mu.mean - 5.07).abs() < 0.3);
```
*/

pub mod config;
pub mod core;
pub mod distributions;
pub mod errors;
pub mod graph;
pub mod io;
pub mod metropolis_hastings;
pub mod node;
pub mod proposal;
pub mod sampler;
pub mod stats;
pub mod trace;
pub mod tuning;
pub mod value;
