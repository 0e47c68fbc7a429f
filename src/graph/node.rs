//! Graph node model.
//!
//! Nodes live in an arena owned by [`Graph`](crate::graph::Graph) and are
//! addressed by [`NodeHandle`], a stable integer index. Edges are handle
//! lists on each node, kept bidirectionally consistent by the graph's edge
//! primitive: if A lists B as an input, B lists A as an output.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::types::TextureFormat;

/// Handle to a node in a [`Graph`](crate::graph::Graph).
///
/// `NodeHandle` is `Copy` and cheap to pass around. It is only valid within
/// the graph that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(u32);

impl NodeHandle {
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind of resource a descriptor slot expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Attachment,
    Buffer,
    Sampler,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Attachment => write!(f, "attachment"),
            Self::Buffer => write!(f, "buffer"),
            Self::Sampler => write!(f, "sampler"),
        }
    }
}

/// Descriptor placement of one resource bound to a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingSlot {
    pub set: u32,
    pub binding: u32,
    pub kind: ResourceKind,
}

/// Payload of a graphic pass node.
#[derive(Debug, Clone, Default)]
pub struct GraphicPassNode {
    pub vertex_shader: String,
    pub fragment_shader: String,
    /// Ordered map from each bound input resource to its descriptor slot.
    /// Key order follows the pass's input edge order.
    pub binding_sets: IndexMap<NodeHandle, BindingSlot>,
}

/// Payload of a compute pass node.
#[derive(Debug, Clone, Default)]
pub struct ComputePassNode {
    pub compute_shader: String,
    pub binding_sets: IndexMap<NodeHandle, BindingSlot>,
}

/// Payload of an image-like resource node.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttachmentNode {
    pub format: TextureFormat,
    pub depth_stencil: bool,
    /// Backed by the presentable surface instead of an allocated image.
    pub swap_chain: bool,
    /// Imported across independently compiled graphs.
    pub shared: bool,
    /// Load op clears instead of loading previous contents.
    pub clear: bool,
    /// Derived: written as a non-depth output by some pass.
    pub color: bool,
    /// Derived: consumed as a pass input, i.e. needs read access.
    pub input: bool,
}

/// Payload of a buffer resource node.
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferNode {
    /// Implicitly allocated by the resolver, one instance per frame in
    /// flight. External buffers must be bound by the caller for frame 0.
    pub internal: bool,
    /// Content does not change frame-to-frame; later frames alias frame 0.
    pub immutable: bool,
    pub size: u64,
}

/// Payload of a sampler resource node.
#[derive(Debug, Clone, Copy, Default)]
pub struct SamplerNode {
    pub internal: bool,
    pub immutable: bool,
}

/// The closed set of node variants.
///
/// `reference` items from the document never materialize here: they are
/// transient builder records merged into their named target before the
/// graph is frozen.
#[derive(Debug, Clone)]
pub enum NodeKind {
    GraphicPass(GraphicPassNode),
    ComputePass(ComputePassNode),
    Attachment(AttachmentNode),
    Buffer(BufferNode),
    Sampler(SamplerNode),
}

/// A node of the frame graph: a pass or a resource.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub(crate) name: String,
    /// Name of the subpass that declared this node; empty for pass nodes.
    pub(crate) pass_scope: String,
    pub(crate) kind: NodeKind,
    pub(crate) inputs: Vec<NodeHandle>,
    pub(crate) outputs: Vec<NodeHandle>,
    /// Names of the subpasses that read this node as an input.
    pub(crate) input_subpasses: BTreeSet<String>,
}

impl GraphNode {
    pub(crate) fn new(name: impl Into<String>, pass_scope: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            pass_scope: pass_scope.into(),
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            input_subpasses: BTreeSet::new(),
        }
    }

    /// Node name, local to its declaring subpass.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully qualified `scope::name`, for diagnostics.
    pub fn global_name(&self) -> String {
        if self.pass_scope.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.pass_scope, self.name)
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn inputs(&self) -> &[NodeHandle] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[NodeHandle] {
        &self.outputs
    }

    /// Subpasses that consume this node as an input.
    pub fn input_subpasses(&self) -> &BTreeSet<String> {
        &self.input_subpasses
    }

    pub fn is_pass(&self) -> bool {
        matches!(self.kind, NodeKind::GraphicPass(_) | NodeKind::ComputePass(_))
    }

    pub fn is_resource(&self) -> bool {
        !self.is_pass()
    }

    /// The resource kind of this node, or `None` for pass nodes.
    pub fn resource_kind(&self) -> Option<ResourceKind> {
        match self.kind {
            NodeKind::Attachment(_) => Some(ResourceKind::Attachment),
            NodeKind::Buffer(_) => Some(ResourceKind::Buffer),
            NodeKind::Sampler(_) => Some(ResourceKind::Sampler),
            NodeKind::GraphicPass(_) | NodeKind::ComputePass(_) => None,
        }
    }

    pub fn as_attachment(&self) -> Option<&AttachmentNode> {
        match &self.kind {
            NodeKind::Attachment(attachment) => Some(attachment),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&BufferNode> {
        match &self.kind {
            NodeKind::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn as_sampler(&self) -> Option<&SamplerNode> {
        match &self.kind {
            NodeKind::Sampler(sampler) => Some(sampler),
            _ => None,
        }
    }

    /// The descriptor table of a pass node, or `None` for resources.
    pub fn binding_sets(&self) -> Option<&IndexMap<NodeHandle, BindingSlot>> {
        match &self.kind {
            NodeKind::GraphicPass(pass) => Some(&pass.binding_sets),
            NodeKind::ComputePass(pass) => Some(&pass.binding_sets),
            _ => None,
        }
    }

    pub(crate) fn binding_sets_mut(&mut self) -> Option<&mut IndexMap<NodeHandle, BindingSlot>> {
        match &mut self.kind {
            NodeKind::GraphicPass(pass) => Some(&mut pass.binding_sets),
            NodeKind::ComputePass(pass) => Some(&mut pass.binding_sets),
            _ => None,
        }
    }

    pub(crate) fn as_attachment_mut(&mut self) -> Option<&mut AttachmentNode> {
        match &mut self.kind {
            NodeKind::Attachment(attachment) => Some(attachment),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_name() {
        let node = GraphNode::new(
            "depth",
            "gbuffer",
            NodeKind::Attachment(AttachmentNode::default()),
        );
        assert_eq!(node.global_name(), "gbuffer::depth");

        let pass = GraphNode::new("gbuffer", "", NodeKind::GraphicPass(GraphicPassNode::default()));
        assert_eq!(pass.global_name(), "gbuffer");
    }

    #[test]
    fn test_kind_predicates() {
        let pass = GraphNode::new("main", "", NodeKind::ComputePass(ComputePassNode::default()));
        assert!(pass.is_pass());
        assert!(!pass.is_resource());
        assert_eq!(pass.resource_kind(), None);

        let buffer = GraphNode::new("camera", "main", NodeKind::Buffer(BufferNode::default()));
        assert!(buffer.is_resource());
        assert_eq!(buffer.resource_kind(), Some(ResourceKind::Buffer));
    }
}
