/*!
# Model Graph

The [`Graph`] owns every node of a model, resolves the dependency order once at
construction and evaluates log-densities over current values.

- Nodes are kept in insertion order; lookups by name go through an
  [`IndexMap`].
- An observed node with masked entries gets one latent scalar node per masked
  entry, named `<observed>[<index>]`, inserted right after it. The latent node
  shares the observed node's parents and elementwise density, and its value is
  written back into the observed node so children of the observed node see it.
- For each stepped node a *step plan* lists the nodes to refresh after a change
  (deterministic descendants and imputed observed nodes, in topological order)
  and the density terms that can change. Nodes outside the plan are untouched
  by a step, so the step engine only evaluates local terms.

# Examples

```rust
use mini_pgm::distributions::normal_lpdf;
use mini_pgm::graph::Graph;
use mini_pgm::node::NodeSpec;
use mini_pgm::value::Value;

let graph = Graph::build(vec![
    NodeSpec::stochastic("mu", &[], 0.0, |v, _| normal_lpdf(v.as_real().unwrap_or(f64::NAN), 0.0, 1.0)),
    NodeSpec::deterministic("shifted", &["mu"], |p| Value::Real(p.real(0) + 1.0)),
    NodeSpec::observed("y", &["shifted"], 1.2, |v, p| normal_lpdf(v.as_real().unwrap_or(f64::NAN), p.real(0), 1.0)),
])
.unwrap();
assert_eq!(graph.value("shifted").unwrap(), &Value::Real(1.0));
assert_eq!(graph.unobserved().collect::<Vec<_>>(), vec!["mu"]);
```
*/

use std::collections::VecDeque;

use indexmap::IndexMap;

use crate::errors::{PgmError, Result};
use crate::node::{Node, NodeBody, NodeKind, NodeSpec};
use crate::value::{ParentValues, Value};

/// Nodes to refresh and density terms to sum when one node changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct StepPlan {
    pub refresh: Vec<usize>,
    pub terms: Vec<usize>,
}

/// Saved values of a stepped node and everything its plan refreshes.
#[derive(Debug, Clone)]
pub(crate) struct Snapshot {
    values: Vec<(usize, Value)>,
}

#[derive(Debug, Clone)]
pub struct Graph {
    nodes: IndexMap<String, Node>,
    /// Children by node, including imputation edges (latent -> observed).
    children: Vec<Vec<usize>>,
    order: Vec<usize>,
    unobserved: Vec<usize>,
    plans: Vec<StepPlan>,
}

impl Graph {
    /**
    Builds a graph from node descriptors.

    # Errors

    * [`PgmError::DuplicateIdentity`] if two nodes (including synthesized
      imputation nodes) share a name.
    * [`PgmError::UnknownParent`] if a parent name is not declared.
    * [`PgmError::InvalidNode`] for a malformed descriptor.
    * [`PgmError::CyclicGraph`] if the dependencies have no topological order.
    * [`PgmError::NumericInstability`] if a deterministic node computes `NaN`
      from the initial values.
    */
    pub fn build<I>(specs: I) -> Result<Self>
    where
        I: IntoIterator<Item = NodeSpec>,
    {
        let mut nodes: IndexMap<String, Node> = IndexMap::new();
        let mut parent_names: Vec<Vec<String>> = Vec::new();

        for spec in specs {
            validate_spec(&spec)?;
            let id = nodes.len();
            let value = spec.initial.clone().unwrap_or(Value::Real(0.0));
            let latents = match &spec.mask {
                Some(mask) => masked_latents(&spec, &value, mask),
                None => Vec::new(),
            };
            let node = Node {
                name: spec.name.clone(),
                kind: spec.kind,
                parents: Vec::new(),
                body: spec.body.clone(),
                value,
                categories: spec.categories,
                mask: spec.mask.clone(),
                imputed: Vec::new(),
                owner: None,
            };
            insert_unique(&mut nodes, node)?;
            parent_names.push(spec.parents.clone());

            for (element, initial) in latents {
                let latent_id = nodes.len();
                let latent = Node {
                    name: format!("{}[{}]", spec.name, element),
                    kind: NodeKind::Stochastic,
                    parents: Vec::new(),
                    body: spec.body.clone(),
                    value: initial,
                    categories: spec.categories,
                    mask: None,
                    imputed: Vec::new(),
                    owner: Some((id, element)),
                };
                insert_unique(&mut nodes, latent)?;
                parent_names.push(spec.parents.clone());
                nodes[id].imputed.push((element, latent_id));
            }
        }

        let mut children = vec![Vec::new(); nodes.len()];
        for (id, names) in parent_names.iter().enumerate() {
            let mut parents = Vec::with_capacity(names.len());
            for name in names {
                let parent = nodes
                    .get_index_of(name)
                    .ok_or_else(|| PgmError::UnknownParent {
                        node: nodes[id].name.clone(),
                        parent: name.clone(),
                    })?;
                parents.push(parent);
                if !children[parent].contains(&id) {
                    children[parent].push(id);
                }
            }
            nodes[id].parents = parents;
            if let Some((owner, _)) = nodes[id].owner {
                children[id].push(owner);
            }
        }

        let order = topological_order(&nodes, &children)?;
        let unobserved = (0..nodes.len())
            .filter(|&id| nodes[id].is_unobserved())
            .collect();

        let mut graph = Self {
            nodes,
            children,
            order,
            unobserved,
            plans: Vec::new(),
        };
        graph.refresh_all()?;
        graph.plans = (0..graph.nodes.len()).map(|id| graph.plan_for(id)).collect();
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// All node names in insertion order (imputation nodes follow their observed node).
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Names of the nodes the sampler steps, in sweep order.
    pub fn unobserved(&self) -> impl Iterator<Item = &str> {
        self.unobserved.iter().map(|&id| self.nodes[id].name.as_str())
    }

    pub fn topological_order(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&id| self.nodes[id].name.as_str())
            .collect()
    }

    pub fn value(&self, name: &str) -> Result<&Value> {
        self.id(name).map(|id| &self.nodes[id].value)
    }

    pub fn kind(&self, name: &str) -> Result<NodeKind> {
        self.id(name).map(|id| self.nodes[id].kind)
    }

    pub fn categories(&self, name: &str) -> Result<Option<usize>> {
        self.id(name).map(|id| self.nodes[id].categories)
    }

    /// Overwrites the value of a stochastic node and refreshes its dependents.
    pub fn set_value(&mut self, name: &str, value: Value) -> Result<()> {
        let id = self.id(name)?;
        let node = &self.nodes[id];
        if node.kind != NodeKind::Stochastic {
            return Err(PgmError::InvalidNode {
                node: name.to_string(),
                reason: format!("cannot assign a value to a {:?} node", node.kind),
            });
        }
        if !node.value.same_shape(&value) || value.has_nan() {
            return Err(PgmError::InvalidNode {
                node: name.to_string(),
                reason: format!("value {value} does not match current value {}", node.value),
            });
        }
        self.assign(id, value)
    }

    /**
    Joint log-density of all stochastic and observed nodes at the current values.

    Every deterministic node is recomputed first, in topological order. Returns
    `-inf` when any node is outside its support.

    # Errors

    [`PgmError::NumericInstability`] if a density or a computed value is `NaN`.
    */
    pub fn joint_log_density(&mut self) -> Result<f64> {
        self.refresh_all()?;
        let terms: Vec<usize> = (0..self.nodes.len())
            .filter(|&id| self.nodes[id].kind != NodeKind::Deterministic)
            .collect();
        self.sum_terms(&terms)
    }

    pub(crate) fn id(&self, name: &str) -> Result<usize> {
        self.nodes
            .get_index_of(name)
            .ok_or_else(|| PgmError::UnknownNode(name.to_string()))
    }

    pub(crate) fn node(&self, id: usize) -> &Node {
        &self.nodes[id]
    }

    pub(crate) fn unobserved_ids(&self) -> &[usize] {
        &self.unobserved
    }

    pub(crate) fn ids_of_kind(&self, kind: NodeKind) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|&id| self.nodes[id].kind == kind)
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn plan(&self, id: usize) -> &StepPlan {
        &self.plans[id]
    }

    /// Sum of the density terms that depend on node `id`'s value.
    pub(crate) fn local_log_density(&self, id: usize) -> Result<f64> {
        self.sum_terms(&self.plans[id].terms)
    }

    pub(crate) fn snapshot(&self, id: usize) -> Snapshot {
        let values = std::iter::once(id)
            .chain(self.plans[id].refresh.iter().copied())
            .map(|i| (i, self.nodes[i].value.clone()))
            .collect();
        Snapshot { values }
    }

    pub(crate) fn restore(&mut self, snapshot: Snapshot) {
        for (id, value) in snapshot.values {
            self.nodes[id].value = value;
        }
    }

    /// Sets node `id` and refreshes every value that depends on it.
    pub(crate) fn assign(&mut self, id: usize, value: Value) -> Result<()> {
        self.nodes[id].value = value;
        for i in 0..self.plans[id].refresh.len() {
            let target = self.plans[id].refresh[i];
            self.refresh(target)?;
        }
        Ok(())
    }

    fn sum_terms(&self, terms: &[usize]) -> Result<f64> {
        let mut total = 0.0;
        let mut impossible = false;
        for &id in terms {
            let lp = self.term(id)?;
            if lp == f64::NEG_INFINITY {
                impossible = true;
            } else {
                total += lp;
            }
        }
        if impossible {
            Ok(f64::NEG_INFINITY)
        } else {
            Ok(total)
        }
    }

    fn term(&self, id: usize) -> Result<f64> {
        let node = &self.nodes[id];
        let values = self.parent_values(node);
        let lp = node.log_density(&ParentValues::new(&values));
        if lp.is_nan() {
            return Err(PgmError::NumericInstability {
                node: node.name.clone(),
                detail: format!("log-density is NaN at value {}", node.value),
            });
        }
        Ok(lp)
    }

    fn parent_values(&self, node: &Node) -> Vec<&Value> {
        node.parents.iter().map(|&p| &self.nodes[p].value).collect()
    }

    fn refresh_all(&mut self) -> Result<()> {
        for i in 0..self.order.len() {
            let id = self.order[i];
            self.refresh(id)?;
        }
        Ok(())
    }

    /// Recomputes a deterministic node, or copies latent values into an observed node.
    fn refresh(&mut self, id: usize) -> Result<()> {
        let node = &self.nodes[id];
        match (&node.body, node.kind) {
            (NodeBody::Compute(compute), _) => {
                let value = {
                    let values = self.parent_values(node);
                    compute(&ParentValues::new(&values))
                };
                if value.has_nan() {
                    return Err(PgmError::NumericInstability {
                        node: node.name.clone(),
                        detail: "computed value contains NaN".to_string(),
                    });
                }
                self.nodes[id].value = value;
            }
            (_, NodeKind::Observed) if !node.imputed.is_empty() => {
                let filled: Vec<(usize, Value)> = node
                    .imputed
                    .iter()
                    .map(|&(element, latent)| (element, self.nodes[latent].value.clone()))
                    .collect();
                let target = &mut self.nodes[id].value;
                for (element, value) in filled {
                    target.set_element(element, &value);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn plan_for(&self, id: usize) -> StepPlan {
        if !self.nodes[id].is_unobserved() {
            return StepPlan::default();
        }
        let mut position = vec![0; self.nodes.len()];
        for (pos, &node) in self.order.iter().enumerate() {
            position[node] = pos;
        }

        let mut refresh = Vec::new();
        let mut terms = vec![id];
        let mut queue = VecDeque::from([id]);
        while let Some(changed) = queue.pop_front() {
            for &child in &self.children[changed] {
                let fills_owner = self.nodes[changed].owner.map(|(owner, _)| owner) == Some(child);
                let node = &self.nodes[child];
                if fills_owner || node.kind == NodeKind::Deterministic {
                    if !refresh.contains(&child) {
                        refresh.push(child);
                        queue.push_back(child);
                    }
                } else if !terms.contains(&child) {
                    terms.push(child);
                }
            }
        }
        refresh.sort_by_key(|&node| position[node]);
        terms.sort_unstable();
        StepPlan { refresh, terms }
    }
}

fn insert_unique(nodes: &mut IndexMap<String, Node>, node: Node) -> Result<()> {
    if nodes.contains_key(&node.name) {
        return Err(PgmError::DuplicateIdentity(node.name));
    }
    nodes.insert(node.name.clone(), node);
    Ok(())
}

fn invalid(spec: &NodeSpec, reason: impl Into<String>) -> PgmError {
    PgmError::InvalidNode {
        node: spec.name.clone(),
        reason: reason.into(),
    }
}

fn validate_spec(spec: &NodeSpec) -> Result<()> {
    if let Some(k) = spec.categories {
        if k == 0 {
            return Err(invalid(spec, "category set must not be empty"));
        }
        let discrete = spec.initial.as_ref().map_or(true, Value::is_discrete);
        if !discrete {
            return Err(invalid(spec, "categories require an integer value"));
        }
    }
    let Some(value) = &spec.initial else {
        return Ok(());
    };
    match &spec.mask {
        None => {
            if value.has_nan() {
                return Err(invalid(spec, "value contains NaN"));
            }
        }
        Some(mask) => {
            if spec.kind != NodeKind::Observed {
                return Err(invalid(spec, "only observed nodes can be masked"));
            }
            if !matches!(spec.body, NodeBody::Elementwise(_)) {
                return Err(invalid(spec, "a mask requires an elementwise density"));
            }
            if value.is_empty() {
                return Err(invalid(spec, "a mask requires a non-empty value"));
            }
            if mask.len() != value.len() {
                return Err(invalid(
                    spec,
                    format!("mask has {} entries for {} values", mask.len(), value.len()),
                ));
            }
            let fixed_nan = (0..value.len())
                .any(|i| mask[i] && value.real_at(i).map_or(true, f64::is_nan));
            if fixed_nan {
                return Err(invalid(spec, "an observed entry is NaN"));
            }
        }
    }
    Ok(())
}

/// Masked elements with their initial imputed values: the mean of the fixed
/// entries, rounded for integer data.
fn masked_latents(spec: &NodeSpec, value: &Value, mask: &[bool]) -> Vec<(usize, Value)> {
    let fixed: Vec<f64> = (0..value.len())
        .filter(|&i| mask[i])
        .filter_map(|i| value.real_at(i))
        .collect();
    let mean = if fixed.is_empty() {
        0.0
    } else {
        fixed.iter().sum::<f64>() / fixed.len() as f64
    };
    let initial = if value.is_discrete() {
        let k = mean.round() as i64;
        let k = match spec.categories {
            Some(n) => k.clamp(0, n as i64 - 1),
            None => k,
        };
        Value::Int(k)
    } else {
        Value::Real(mean)
    };
    (0..mask.len())
        .filter(|&i| !mask[i])
        .map(|i| (i, initial.clone()))
        .collect()
}

fn topological_order(nodes: &IndexMap<String, Node>, children: &[Vec<usize>]) -> Result<Vec<usize>> {
    let mut indegree = vec![0usize; nodes.len()];
    for edges in children {
        for &child in edges {
            indegree[child] += 1;
        }
    }
    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&id| indegree[id] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(id) = queue.pop_front() {
        order.push(id);
        for &child in &children[id] {
            indegree[child] -= 1;
            if indegree[child] == 0 {
                queue.push_back(child);
            }
        }
    }
    if order.len() < nodes.len() {
        let stuck = (0..nodes.len())
            .filter(|&id| indegree[id] > 0)
            .map(|id| nodes[id].name.clone())
            .collect();
        return Err(PgmError::CyclicGraph(stuck));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::{normal_lpdf, uniform_lpdf};

    fn real(v: &Value) -> f64 {
        v.as_real().unwrap_or(f64::NAN)
    }

    fn chain_model() -> Vec<NodeSpec> {
        vec![
            NodeSpec::stochastic("a", &[], 0.5, |v, _| uniform_lpdf(real(v), 0.0, 1.0)),
            NodeSpec::deterministic("b", &["a"], |p| Value::Real(2.0 * p.real(0))),
            NodeSpec::deterministic("c", &["b"], |p| Value::Real(p.real(0) + 1.0)),
            NodeSpec::observed("y", &["c"], 2.5, |v, p| normal_lpdf(real(v), p.real(0), 1.0)),
        ]
    }

    #[test]
    fn test_build_computes_deterministic_values() {
        let graph = Graph::build(chain_model()).unwrap();
        assert_eq!(graph.value("b").unwrap(), &Value::Real(1.0));
        assert_eq!(graph.value("c").unwrap(), &Value::Real(2.0));
        assert_eq!(graph.topological_order(), vec!["a", "b", "c", "y"]);
        assert_eq!(graph.unobserved().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_duplicate_identity() {
        let mut specs = chain_model();
        specs.push(NodeSpec::stochastic("a", &[], 0.0, |_, _| 0.0));
        assert_eq!(
            Graph::build(specs).unwrap_err(),
            PgmError::DuplicateIdentity("a".to_string())
        );
    }

    #[test]
    fn test_cycle_detected() {
        let specs = vec![
            NodeSpec::stochastic("root", &[], 0.0, |_, _| 0.0),
            NodeSpec::deterministic("p", &["q", "root"], |p| Value::Real(p.real(0))),
            NodeSpec::deterministic("q", &["p"], |p| Value::Real(p.real(0))),
        ];
        match Graph::build(specs) {
            Err(PgmError::CyclicGraph(names)) => assert_eq!(names, vec!["p", "q"]),
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_parent() {
        let specs = vec![NodeSpec::deterministic("d", &["ghost"], |_| Value::Real(0.0))];
        assert!(matches!(
            Graph::build(specs),
            Err(PgmError::UnknownParent { ref parent, .. }) if parent == "ghost"
        ));
    }

    #[test]
    fn test_joint_log_density_and_support() {
        let mut graph = Graph::build(chain_model()).unwrap();
        let expected = uniform_lpdf(0.5, 0.0, 1.0) + normal_lpdf(2.5, 2.0, 1.0);
        assert!((graph.joint_log_density().unwrap() - expected).abs() < 1e-12);

        graph.set_value("a", Value::Real(1.5)).unwrap();
        assert_eq!(graph.value("c").unwrap(), &Value::Real(4.0));
        assert_eq!(graph.joint_log_density().unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_nan_density_is_reported() {
        let specs = vec![NodeSpec::stochastic("bad", &[], 1.0, |_, _| f64::NAN)];
        let mut graph = Graph::build(specs).unwrap();
        assert!(matches!(
            graph.joint_log_density(),
            Err(PgmError::NumericInstability { ref node, .. }) if node == "bad"
        ));
    }

    #[test]
    fn test_set_value_rejects_observed_and_shape_mismatch() {
        let mut graph = Graph::build(chain_model()).unwrap();
        assert!(graph.set_value("y", Value::Real(0.0)).is_err());
        assert!(graph.set_value("a", Value::Int(0)).is_err());
        assert!(graph.set_value("nope", Value::Real(0.0)).is_err());
    }

    #[test]
    fn test_masked_observation_synthesizes_latents() {
        let specs = vec![
            NodeSpec::stochastic("m", &[], 0.0, |v, _| normal_lpdf(real(v), 0.0, 10.0)),
            NodeSpec::observed_elementwise("y", &["m"], vec![1.0, -1.0, 3.0, 0.0, 5.0], |_, v, p| {
                normal_lpdf(real(v), p.real(0), 1.0)
            })
            .with_mask(vec![true, false, true, false, true]),
            NodeSpec::deterministic("y_sum", &["y"], |p| {
                Value::Real(p.get(0).map_or(f64::NAN, |v| v.to_f64_vec().iter().sum()))
            }),
        ];
        let graph = Graph::build(specs).unwrap();
        assert_eq!(
            graph.names().collect::<Vec<_>>(),
            vec!["m", "y", "y[1]", "y[3]", "y_sum"]
        );
        assert_eq!(graph.unobserved().collect::<Vec<_>>(), vec!["m", "y[1]", "y[3]"]);
        // Latents start at the mean of the fixed entries (3.0) and are visible through `y`.
        assert_eq!(graph.value("y[1]").unwrap(), &Value::Real(3.0));
        assert_eq!(
            graph.value("y").unwrap(),
            &Value::RealVec(vec![1.0, 3.0, 3.0, 3.0, 5.0])
        );
        assert_eq!(graph.value("y_sum").unwrap(), &Value::Real(15.0));

        let latent = graph.id("y[1]").unwrap();
        let plan = graph.plan(latent);
        assert_eq!(plan.refresh, vec![graph.id("y").unwrap(), graph.id("y_sum").unwrap()]);
        assert_eq!(plan.terms, vec![latent]);

        let m = graph.id("m").unwrap();
        let plan = graph.plan(m);
        assert!(plan.refresh.is_empty());
        assert_eq!(
            plan.terms,
            vec![m, graph.id("y").unwrap(), latent, graph.id("y[3]").unwrap()]
        );
    }

    #[test]
    fn test_mask_validation() {
        let too_short = NodeSpec::observed_elementwise("y", &[], vec![1.0, 2.0], |_, _, _| 0.0)
            .with_mask(vec![true]);
        assert!(matches!(Graph::build(vec![too_short]), Err(PgmError::InvalidNode { .. })));

        let empty = NodeSpec::observed_elementwise("y", &[], Vec::<f64>::new(), |_, _, _| 0.0)
            .with_mask(vec![]);
        assert!(matches!(Graph::build(vec![empty]), Err(PgmError::InvalidNode { .. })));

        let whole = NodeSpec::observed("y", &[], vec![1.0, 2.0], |_, _| 0.0).with_mask(vec![true, false]);
        assert!(matches!(Graph::build(vec![whole]), Err(PgmError::InvalidNode { .. })));

        let clash = vec![
            NodeSpec::observed_elementwise("y", &[], vec![1.0, 2.0], |_, _, _| 0.0)
                .with_mask(vec![true, false]),
            NodeSpec::stochastic("y[1]", &[], 0.0, |_, _| 0.0),
        ];
        assert_eq!(
            Graph::build(clash).unwrap_err(),
            PgmError::DuplicateIdentity("y[1]".to_string())
        );
    }

    #[test]
    fn test_masked_placeholders_may_be_nan() {
        let spec = NodeSpec::observed_elementwise("y", &[], vec![2.0, f64::NAN, 4.0], |_, v, _| {
            normal_lpdf(real(v), 0.0, 5.0)
        })
        .with_mask(vec![true, false, true]);
        let mut graph = Graph::build(vec![spec]).unwrap();
        assert_eq!(graph.value("y[1]").unwrap(), &Value::Real(3.0));
        assert!(graph.joint_log_density().unwrap().is_finite());
    }
}
