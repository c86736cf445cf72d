/*!
Node descriptors for building a [`Graph`](crate::graph::Graph).

A model is an ordered list of [`NodeSpec`]s. Each descriptor names its parents
explicitly and carries a host-supplied closure: a log-density for stochastic
and observed nodes, a compute function for deterministic nodes. The engine
never inspects these closures; it calls them with the current parent values
and expects `-inf` (not a panic) for values outside the support.

# Examples

```rust
use mini_pgm::distributions::normal_lpdf;
use mini_pgm::node::NodeSpec;
use mini_pgm::value::Value;

let mu = NodeSpec::stochastic("mu", &[], 0.0, |v, _| normal_lpdf(v.as_real().unwrap_or(f64::NAN), 0.0, 10.0));
let twice = NodeSpec::deterministic("twice", &["mu"], |p| Value::Real(2.0 * p.real(0)));
let y = NodeSpec::observed_elementwise("y", &["twice"], vec![1.9, 2.2, 0.0], |_, v, p| {
    normal_lpdf(v.as_real().unwrap_or(f64::NAN), p.real(0), 1.0)
})
.with_mask(vec![true, true, false]);
assert_eq!(y.name(), "y");
```
*/

use std::fmt;
use std::sync::Arc;

use crate::value::{ParentValues, Value};

/// `log p(value | parents)`.
pub type LogDensityFn = Arc<dyn Fn(&Value, &ParentValues) -> f64 + Send + Sync>;

/// `log p(element | parents)` for element `index` of a vector-valued node.
pub type ElementLogDensityFn = Arc<dyn Fn(usize, &Value, &ParentValues) -> f64 + Send + Sync>;

/// `value = f(parents)` for deterministic nodes.
pub type ComputeFn = Arc<dyn Fn(&ParentValues) -> Value + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Latent quantity with a prior; stepped by the sampler.
    Stochastic,
    /// Pure function of its parents; never stepped.
    Deterministic,
    /// Fixed by measurement, possibly with masked (missing) entries.
    Observed,
}

/// How a node relates to its parents.
#[derive(Clone)]
pub(crate) enum NodeBody {
    Density(LogDensityFn),
    Elementwise(ElementLogDensityFn),
    Compute(ComputeFn),
}

impl fmt::Debug for NodeBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeBody::Density(_) => f.write_str("Density(..)"),
            NodeBody::Elementwise(_) => f.write_str("Elementwise(..)"),
            NodeBody::Compute(_) => f.write_str("Compute(..)"),
        }
    }
}

/// Descriptor of a single node, consumed by [`Graph::build`](crate::graph::Graph::build).
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) parents: Vec<String>,
    pub(crate) body: NodeBody,
    pub(crate) initial: Option<Value>,
    pub(crate) mask: Option<Vec<bool>>,
    pub(crate) categories: Option<usize>,
}

impl NodeSpec {
    /// A latent node with prior (or conditional) density `log_density`.
    pub fn stochastic<F>(name: &str, parents: &[&str], initial: impl Into<Value>, log_density: F) -> Self
    where
        F: Fn(&Value, &ParentValues) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            kind: NodeKind::Stochastic,
            parents: to_strings(parents),
            body: NodeBody::Density(Arc::new(log_density)),
            initial: Some(initial.into()),
            mask: None,
            categories: None,
        }
    }

    /// A node whose value is `compute(parents)`. Its value is filled in at build time.
    pub fn deterministic<F>(name: &str, parents: &[&str], compute: F) -> Self
    where
        F: Fn(&ParentValues) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            kind: NodeKind::Deterministic,
            parents: to_strings(parents),
            body: NodeBody::Compute(Arc::new(compute)),
            initial: None,
            mask: None,
            categories: None,
        }
    }

    /// A fully observed node with a density over its whole value.
    pub fn observed<F>(name: &str, parents: &[&str], data: impl Into<Value>, log_density: F) -> Self
    where
        F: Fn(&Value, &ParentValues) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            kind: NodeKind::Observed,
            parents: to_strings(parents),
            body: NodeBody::Density(Arc::new(log_density)),
            initial: Some(data.into()),
            mask: None,
            categories: None,
        }
    }

    /// An observed node whose density factorizes over elements. Only this form
    /// accepts a mask, since each masked entry becomes its own latent node.
    pub fn observed_elementwise<F>(
        name: &str,
        parents: &[&str],
        data: impl Into<Value>,
        element_log_density: F,
    ) -> Self
    where
        F: Fn(usize, &Value, &ParentValues) -> f64 + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            kind: NodeKind::Observed,
            parents: to_strings(parents),
            body: NodeBody::Elementwise(Arc::new(element_log_density)),
            initial: Some(data.into()),
            mask: None,
            categories: None,
        }
    }

    /// Marks which entries are fixed (`true`) and which are missing (`false`).
    /// Values at missing positions are placeholders and are never read.
    pub fn with_mask(mut self, mask: Vec<bool>) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Declares the finite category set `{0, .., k-1}` of an integer node.
    pub fn with_categories(mut self, k: usize) -> Self {
        self.categories = Some(k);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn parents(&self) -> &[String] {
        &self.parents
    }
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// A node as owned by the graph, with parents resolved to indices.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub parents: Vec<usize>,
    pub body: NodeBody,
    pub value: Value,
    pub categories: Option<usize>,
    /// For observed nodes: which entries contribute a density term.
    pub mask: Option<Vec<bool>>,
    /// For observed nodes: `(element, latent node)` pairs filling masked entries.
    pub imputed: Vec<(usize, usize)>,
    /// For imputation nodes: `(observed node, element)` they fill.
    pub owner: Option<(usize, usize)>,
}

impl Node {
    /// Whether the sampler steps this node.
    pub fn is_unobserved(&self) -> bool {
        self.kind == NodeKind::Stochastic
    }

    /// Log-density of the current value given `parents`. Observed nodes with a
    /// mask only count their fixed entries. Deterministic nodes contribute zero.
    pub fn log_density(&self, parents: &ParentValues) -> f64 {
        match &self.body {
            NodeBody::Density(f) => f(&self.value, parents),
            NodeBody::Elementwise(f) => {
                if let Some((_, element)) = self.owner {
                    return f(element, &self.value, parents);
                }
                let mut lp = 0.0;
                for i in 0..self.value.len() {
                    if let Some(mask) = &self.mask {
                        if !mask[i] {
                            continue;
                        }
                    }
                    if let Some(x) = self.value.element(i) {
                        lp += f(i, &x, parents);
                    }
                }
                lp
            }
            NodeBody::Compute(_) => 0.0,
        }
    }
}
