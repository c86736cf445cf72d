//! Error types for graph construction, run configuration and sampling.

use thiserror::Error;

/// Errors raised by this crate.
///
/// Structural errors (`CyclicGraph`, `DuplicateIdentity`, `UnknownParent`,
/// `InvalidNode`) surface from [`Graph::build`](crate::graph::Graph::build).
/// `InvalidConfiguration` surfaces from [`Sampler::new`](crate::sampler::Sampler::new)
/// before any sweep runs. A density that leaves its support is not an error:
/// it is `-inf` and simply leads to a rejected proposal.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PgmError {
    /// The parent relation has no topological order.
    #[error("cyclic dependency among nodes: {}", .0.join(", "))]
    CyclicGraph(Vec<String>),

    /// Two nodes (possibly a synthesized imputation node) share a name.
    #[error("duplicate node identity `{0}`")]
    DuplicateIdentity(String),

    /// A node lists a parent that is not part of the graph.
    #[error("node `{node}` depends on unknown parent `{parent}`")]
    UnknownParent { node: String, parent: String },

    /// A node descriptor is malformed (e.g. mask length mismatch).
    #[error("invalid node `{node}`: {reason}")]
    InvalidNode { node: String, reason: String },

    /// Run configuration rejected before sampling.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A density or computed value turned out NaN.
    #[error("numeric instability in node `{node}`: {detail}")]
    NumericInstability { node: String, detail: String },

    /// Lookup of a name the graph or trace does not know.
    #[error("unknown node `{0}`")]
    UnknownNode(String),

    /// Trace slice outside of the recorded range.
    #[error("range {start}..{end} out of bounds for trace `{node}` of length {len}")]
    TraceRange {
        node: String,
        start: usize,
        end: usize,
        len: usize,
    },
}

pub type Result<T> = std::result::Result<T, PgmError>;
