//! Frame-graph construction and compilation.
//!
//! A [`Graph`] is built once from a declarative
//! [`RenderGroupDescription`](crate::description::RenderGroupDescription) and
//! is immutable afterwards. Compilation happens in three stages:
//!
//! 1. **Build** ([`builder`]) - subpasses and resource items become arena
//!    nodes, `reference` items are merged into their named targets, and each
//!    pass's descriptor table is indexed.
//! 2. **Leveling** ([`topo`]) - Kahn-style breadth-first leveling produces
//!    the execution order and flags concurrent-write hazards. The result is
//!    computed during the build (the graph never changes afterwards, so the
//!    eager result is the cache) and a cycle aborts construction.
//! 3. **Dependency derivation** ([`dependency`]) - the leveled graph is
//!    scanned for read-after-write and write-after-write relations between
//!    passes, producing the synchronization requirements the executor layer
//!    turns into native barriers.

mod builder;
mod dependency;
mod node;
mod topo;

pub use dependency::{
    derive_dependencies, AccessFlags, AttachmentLayout, AttachmentOps, AttachmentRefs, LoadOp,
    PassDependency, StageFlags, StoreOp,
};
pub use node::{
    AttachmentNode, BindingSlot, BufferNode, ComputePassNode, GraphNode, GraphicPassNode,
    NodeHandle, NodeKind, ResourceKind, SamplerNode,
};
pub use topo::{ConcurrentWrite, TopoResult};

use std::collections::BTreeSet;

use crate::description::RenderGroupDescription;
use crate::error::GraphResult;

/// A compiled frame graph: passes, resources and their edges, plus the
/// cached leveling result.
#[derive(Debug)]
pub struct Graph {
    name: String,
    nodes: Vec<GraphNode>,
    /// Names of attachments flagged `shared`, importable by sibling graphs.
    shared_attachments: BTreeSet<String>,
    topo: TopoResult,
}

impl Graph {
    /// Build a graph from a declarative description.
    ///
    /// Fails with [`MissingReference`](crate::GraphError::MissingReference)
    /// when a `reference` or dependency names an undeclared node, and with
    /// [`CycleDetected`](crate::GraphError::CycleDetected) when the
    /// description does not form a DAG. No partial graph is ever returned.
    pub fn from_description(description: &RenderGroupDescription) -> GraphResult<Self> {
        builder::build(description)
    }

    /// Parse a JSON document and build a graph from it.
    pub fn from_json(json: &str) -> GraphResult<Self> {
        Self::from_description(&RenderGroupDescription::from_json(json)?)
    }

    pub(crate) fn assemble(
        name: String,
        nodes: Vec<GraphNode>,
        shared_attachments: BTreeSet<String>,
        topo: TopoResult,
    ) -> Self {
        Self {
            name,
            nodes,
            shared_attachments,
            topo,
        }
    }

    /// The render-group name from the description.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self, handle: NodeHandle) -> &GraphNode {
        &self.nodes[handle.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Iterate all nodes with their handles, in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeHandle, &GraphNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeHandle::new(index as u32), node))
    }

    /// Iterate the pass nodes only.
    pub fn passes(&self) -> impl Iterator<Item = (NodeHandle, &GraphNode)> {
        self.nodes().filter(|(_, node)| node.is_pass())
    }

    /// Find a pass node by subpass name.
    pub fn pass(&self, name: &str) -> Option<NodeHandle> {
        self.passes()
            .find(|(_, node)| node.name() == name)
            .map(|(handle, _)| handle)
    }

    /// Find a node by local name. When several nodes share a local name the
    /// first declared one wins, matching reference resolution.
    pub fn find_node(&self, name: &str) -> Option<NodeHandle> {
        self.nodes()
            .find(|(_, node)| node.name() == name)
            .map(|(handle, _)| handle)
    }

    /// The cached leveling result.
    pub fn topo(&self) -> &TopoResult {
        &self.topo
    }

    /// Attachment names flagged `shared` in the description.
    pub fn shared_attachments(&self) -> &BTreeSet<String> {
        &self.shared_attachments
    }

    /// Direct successor passes of `pass`: exactly one hop through each
    /// written resource to the passes consuming it, never deeper.
    pub fn direct_successor_passes(&self, pass: NodeHandle) -> Vec<NodeHandle> {
        let mut successors = Vec::new();
        for &resource in self.node(pass).outputs() {
            if self.node(resource).is_pass() {
                // Scheduling-only edge straight to another pass.
                if resource != pass && !successors.contains(&resource) {
                    successors.push(resource);
                }
                continue;
            }
            for &consumer in self.node(resource).outputs() {
                if self.node(consumer).is_pass()
                    && consumer != pass
                    && !successors.contains(&consumer)
                {
                    successors.push(consumer);
                }
            }
        }
        successors
    }
}
