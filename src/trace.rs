/*!
# Trace Store

Append-only record of node values, one entry per retained sweep, plus the
per-node acceptance diagnostics of the run that produced it.

Every recorded sequence has the same length as [`Trace::sweeps`] at all times.

```rust
use mini_pgm::distributions::normal_lpdf;
use mini_pgm::graph::Graph;
use mini_pgm::node::NodeSpec;
use mini_pgm::config::RunConfig;
use mini_pgm::sampler::Sampler;

let graph = Graph::build(vec![NodeSpec::stochastic("x", &[], 0.0, |v, _| {
    normal_lpdf(v.as_real().unwrap_or(f64::NAN), 0.0, 1.0)
})])
.unwrap();
let mut sampler = Sampler::new(graph, RunConfig::new(50).burn_in(10).thin(2).set_seed(1)).unwrap();
let trace = sampler.run().unwrap();

assert_eq!(trace.len(), 20);
assert_eq!(trace.sweeps()[0], 12);
assert_eq!(trace.to_array("x").unwrap().dim(), (20, 1));
```
*/

use std::ops::Range;

use indexmap::IndexMap;
use ndarray::{Array1, Array2};

use crate::errors::{PgmError, Result};
use crate::stats::{summarize, AcceptanceStats, Summary};
use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct Trace {
    sweeps: Vec<usize>,
    records: IndexMap<String, Vec<Value>>,
    acceptance: IndexMap<String, AcceptanceStats>,
    scales: IndexMap<String, f64>,
}

impl Trace {
    /// An empty trace recording the given nodes, in order.
    pub fn new<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            records: names
                .into_iter()
                .map(|n| (n.as_ref().to_string(), Vec::new()))
                .collect(),
            ..Self::default()
        }
    }

    /// Appends one record. `values` follow the order of [`Trace::names`].
    pub(crate) fn push<'a>(&mut self, sweep: usize, values: impl IntoIterator<Item = &'a Value>) {
        self.sweeps.push(sweep);
        for (sequence, value) in self.records.values_mut().zip(values) {
            sequence.push(value.clone());
        }
    }

    pub(crate) fn set_diagnostics(&mut self, name: &str, stats: AcceptanceStats, scale: Option<f64>) {
        self.acceptance.insert(name.to_string(), stats);
        if let Some(scale) = scale {
            self.scales.insert(name.to_string(), scale);
        }
    }

    /// Number of retained sweeps.
    pub fn len(&self) -> usize {
        self.sweeps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sweeps.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// The 1-based sweep index of each record.
    pub fn sweeps(&self) -> &[usize] {
        &self.sweeps
    }

    /// All recorded values of `name`.
    pub fn get(&self, name: &str) -> Result<&[Value]> {
        self.records
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| PgmError::UnknownNode(name.to_string()))
    }

    /// Recorded values of `name` in `range`.
    pub fn slice(&self, name: &str, range: Range<usize>) -> Result<&[Value]> {
        let values = self.get(name)?;
        if range.start > range.end || range.end > values.len() {
            return Err(PgmError::TraceRange {
                node: name.to_string(),
                start: range.start,
                end: range.end,
                len: values.len(),
            });
        }
        Ok(&values[range])
    }

    /// Recorded values of `name` as a records × elements array. Integers are
    /// converted to `f64`.
    pub fn to_array(&self, name: &str) -> Result<Array2<f64>> {
        let values = self.get(name)?;
        let width = values.first().map_or(0, Value::len);
        let flat: Vec<f64> = values.iter().flat_map(Value::to_f64_vec).collect();
        Array2::from_shape_vec((values.len(), width), flat).map_err(|e| PgmError::InvalidNode {
            node: name.to_string(),
            reason: format!("recorded values have inconsistent shapes: {e}"),
        })
    }

    /// The sequence of element `element` of `name`.
    pub fn column(&self, name: &str, element: usize) -> Result<Array1<f64>> {
        let values = self.get(name)?;
        values
            .iter()
            .map(|v| v.real_at(element))
            .collect::<Option<Array1<f64>>>()
            .ok_or_else(|| PgmError::InvalidNode {
                node: name.to_string(),
                reason: format!("element {element} is out of range"),
            })
    }

    /// One summary per element of `name`. Empty for an empty trace.
    pub fn summary(&self, name: &str) -> Result<Vec<Summary>> {
        let array = self.to_array(name)?;
        Ok(array
            .columns()
            .into_iter()
            .filter_map(summarize)
            .collect())
    }

    /// Proposal counts of a stepped node over the whole run, burn-in included.
    pub fn acceptance(&self, name: &str) -> Option<AcceptanceStats> {
        self.acceptance.get(name).copied()
    }

    pub fn acceptance_rate(&self, name: &str) -> Option<f64> {
        self.acceptance(name).and_then(|s| s.rate())
    }

    /// Final scale of a stepped node's proposal, for strategies that have one.
    pub fn proposal_scale(&self, name: &str) -> Option<f64> {
        self.scales.get(name).copied()
    }
}
