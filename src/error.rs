//! Crate-wide error types.
//!
//! Graph construction and binding resolution fail atomically: a build error
//! never returns a partially wired graph, and a resolution error surfaces
//! before any draw command could observe an unbound slot. Every error names
//! the offending node or slot so failures stay diagnosable in graphs with
//! hundreds of nodes.

use thiserror::Error;

use crate::graph::ResourceKind;

/// Errors produced by graph construction, scheduling and binding resolution.
#[derive(Error, Debug)]
pub enum GraphError {
    /// The render-group document could not be parsed (malformed JSON, an
    /// unknown `type` tag, or a structurally invalid item).
    #[error("invalid render group description: {0}")]
    InvalidDescription(String),

    /// The description file could not be read.
    #[error("failed to read render group description: {0}")]
    Io(#[from] std::io::Error),

    /// A `reference` item or an explicit dependency names a subpass or
    /// resource that was never declared.
    #[error("'{name}' referenced from subpass '{subpass}' does not name a declared node")]
    MissingReference { name: String, subpass: String },

    /// The graph is not a DAG: the leveling queue drained while some nodes
    /// still had unresolved dependencies.
    #[error("render graph contains a cycle; unreachable nodes: {}", .unvisited.join(", "))]
    CycleDetected { unvisited: Vec<String> },

    /// A declared `(set, binding)` slot has no concrete resource for some
    /// frame after resolution. For frame 0 this usually means a missing
    /// external bind call.
    #[error("pass '{pass}' has no resource for set {set} binding {binding} at frame {frame}")]
    UnresolvedBinding {
        pass: String,
        set: u32,
        binding: u32,
        frame: usize,
    },

    /// A slot's declared resource kind does not match the bound resource.
    #[error("resource '{name}' resolves to a {actual} where a {expected} is expected")]
    TypeMismatch {
        name: String,
        expected: ResourceKind,
        actual: ResourceKind,
    },
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidDescription(err.to_string())
    }
}

pub type GraphResult<T> = Result<T, GraphError>;
