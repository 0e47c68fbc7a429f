//! Graph construction from declarative descriptions.
//!
//! Building is an explicit two-phase collect-then-merge:
//!
//! - **Collect**: every subpass and every concrete input/output item becomes
//!   an arena node, registered by name. `reference` items stay as pending
//!   by-name records - no placeholder node is ever created for them.
//! - **Merge and freeze**: once every name is known, pending edges are wired
//!   in document order. A reference resolves to the node registered under
//!   its name, so several subpasses naming the same resource all end up
//!   connected to the single declared instance. Edge insertion is a set
//!   union, which makes resolving the same reference twice idempotent.
//!
//! After wiring, each pass's descriptor table is indexed from its inputs,
//! derived attachment flags are fixed up, and the graph is leveled. A cycle
//! aborts the build; no partial graph escapes this module.

use std::collections::{BTreeSet, HashMap};

use crate::description::{
    RenderGroupDescription, ResourceItem, ResourceItemKind, SubpassDescription, SubpassKind,
};
use crate::error::{GraphError, GraphResult};
use crate::graph::node::{
    AttachmentNode, BindingSlot, BufferNode, ComputePassNode, GraphNode, GraphicPassNode,
    NodeHandle, NodeKind, SamplerNode,
};
use crate::graph::{topo, Graph};
use crate::types::TextureFormat;

/// Pending edge endpoint: a node created during the collect phase, or a
/// by-name reference resolved during the merge phase.
enum ItemTarget {
    Node(NodeHandle),
    Reference(String),
}

struct PendingInput {
    target: ItemTarget,
    set: u32,
    binding: Option<u32>,
}

struct PendingSubpass {
    pass: NodeHandle,
    name: String,
    inputs: Vec<PendingInput>,
    outputs: Vec<ItemTarget>,
    dependencies: Vec<String>,
}

pub(crate) fn build(description: &RenderGroupDescription) -> GraphResult<Graph> {
    let mut nodes: Vec<GraphNode> = Vec::new();
    let mut resolved: HashMap<String, NodeHandle> = HashMap::new();
    let mut shared_attachments: BTreeSet<String> = BTreeSet::new();
    let mut pending: Vec<PendingSubpass> = Vec::new();

    // Collect phase.
    for subpass in &description.subpasses {
        let pass = push_node(&mut nodes, make_pass_node(subpass));
        register(&mut resolved, &subpass.name, pass);

        let mut inputs = Vec::with_capacity(subpass.inputs.len());
        for item in &subpass.inputs {
            inputs.push(PendingInput {
                target: collect_item(
                    item,
                    &subpass.name,
                    &mut nodes,
                    &mut resolved,
                    &mut shared_attachments,
                ),
                set: item.set,
                binding: item.binding,
            });
        }

        let mut outputs = Vec::with_capacity(subpass.outputs.len());
        for item in &subpass.outputs {
            outputs.push(collect_item(
                item,
                &subpass.name,
                &mut nodes,
                &mut resolved,
                &mut shared_attachments,
            ));
        }

        pending.push(PendingSubpass {
            pass,
            name: subpass.name.clone(),
            inputs,
            outputs,
            dependencies: subpass.dependencies.clone(),
        });
    }

    // Merge phase: wire edges now that every name is known.
    for subpass in &pending {
        let mut slots: Vec<(NodeHandle, BindingSlot)> = Vec::new();

        for (position, input) in subpass.inputs.iter().enumerate() {
            let handle = resolve_target(&input.target, &subpass.name, &resolved)?;
            add_edge(&mut nodes, handle, subpass.pass);
            let node = &mut nodes[handle.index()];
            node.input_subpasses.insert(subpass.name.clone());

            // Outputs are deliberately not indexed: the descriptor table
            // covers exactly the pass's input resources.
            if let Some(kind) = node.resource_kind() {
                slots.push((
                    handle,
                    BindingSlot {
                        set: input.set,
                        binding: input.binding.unwrap_or(position as u32),
                        kind,
                    },
                ));
            }
        }

        let binding_sets = nodes[subpass.pass.index()]
            .binding_sets_mut()
            .expect("pending subpass always maps to a pass node");
        for (handle, slot) in slots {
            // First declaration wins when the same resource appears twice.
            binding_sets.entry(handle).or_insert(slot);
        }

        for output in &subpass.outputs {
            let handle = resolve_target(output, &subpass.name, &resolved)?;
            add_edge(&mut nodes, subpass.pass, handle);
        }

        // Scheduling-only edges; these never enter any descriptor table.
        for dependency in &subpass.dependencies {
            let handle = resolved.get(dependency.as_str()).copied().ok_or_else(|| {
                GraphError::MissingReference {
                    name: dependency.clone(),
                    subpass: subpass.name.clone(),
                }
            })?;
            add_edge(&mut nodes, handle, subpass.pass);
        }
    }

    finalize_attachment_flags(&mut nodes);

    let topo = topo::level_graph(&nodes)?;

    log::debug!(
        "built graph '{}': {} nodes, {} levels",
        description.name,
        nodes.len(),
        topo.levels().len()
    );

    Ok(Graph::assemble(
        description.name.clone(),
        nodes,
        shared_attachments,
        topo,
    ))
}

fn push_node(nodes: &mut Vec<GraphNode>, node: GraphNode) -> NodeHandle {
    let handle = NodeHandle::new(nodes.len() as u32);
    nodes.push(node);
    handle
}

/// Register a node under a name. The first declaration wins; references and
/// dependencies always resolve to it.
fn register(resolved: &mut HashMap<String, NodeHandle>, name: &str, handle: NodeHandle) {
    if resolved.contains_key(name) {
        log::warn!("'{name}' declared more than once; references resolve to the first declaration");
        return;
    }
    resolved.insert(name.to_string(), handle);
}

fn make_pass_node(subpass: &SubpassDescription) -> GraphNode {
    let kind = match subpass.kind {
        SubpassKind::Graphic => NodeKind::GraphicPass(GraphicPassNode {
            vertex_shader: subpass.shaders.vertex.clone(),
            fragment_shader: subpass.shaders.fragment.clone(),
            binding_sets: Default::default(),
        }),
        SubpassKind::Compute => NodeKind::ComputePass(ComputePassNode {
            compute_shader: subpass.shaders.compute.clone(),
            binding_sets: Default::default(),
        }),
    };
    GraphNode::new(subpass.name.as_str(), "", kind)
}

/// Create the arena node for a concrete item, or a pending reference record.
fn collect_item(
    item: &ResourceItem,
    scope: &str,
    nodes: &mut Vec<GraphNode>,
    resolved: &mut HashMap<String, NodeHandle>,
    shared_attachments: &mut BTreeSet<String>,
) -> ItemTarget {
    let kind = match item.kind {
        ResourceItemKind::Reference => return ItemTarget::Reference(item.name.clone()),
        ResourceItemKind::Attachment => {
            if item.shared {
                shared_attachments.insert(item.name.clone());
            }
            NodeKind::Attachment(AttachmentNode {
                format: TextureFormat::parse(&item.format),
                depth_stencil: item.depth_stencil,
                swap_chain: item.swap_chain,
                shared: item.shared,
                clear: item.clear,
                color: false,
                input: false,
            })
        }
        ResourceItemKind::Buffer | ResourceItemKind::Ssbo => NodeKind::Buffer(BufferNode {
            internal: item.internal,
            immutable: item.immutable,
            size: item.size,
        }),
        ResourceItemKind::Sampler => NodeKind::Sampler(SamplerNode {
            internal: item.internal,
            immutable: item.immutable,
        }),
    };

    let handle = push_node(nodes, GraphNode::new(item.name.as_str(), scope, kind));
    register(resolved, &item.name, handle);
    ItemTarget::Node(handle)
}

fn resolve_target(
    target: &ItemTarget,
    subpass: &str,
    resolved: &HashMap<String, NodeHandle>,
) -> GraphResult<NodeHandle> {
    match target {
        ItemTarget::Node(handle) => Ok(*handle),
        ItemTarget::Reference(name) => {
            resolved
                .get(name.as_str())
                .copied()
                .ok_or_else(|| GraphError::MissingReference {
                    name: name.clone(),
                    subpass: subpass.to_string(),
                })
        }
    }
}

/// Insert the edge `from -> to`, keeping both adjacency lists consistent.
/// Insertion is a set union: wiring the same edge twice is a no-op, which is
/// what makes reference merging idempotent.
fn add_edge(nodes: &mut [GraphNode], from: NodeHandle, to: NodeHandle) {
    if !nodes[to.index()].inputs.contains(&from) {
        nodes[to.index()].inputs.push(from);
    }
    if !nodes[from.index()].outputs.contains(&to) {
        nodes[from.index()].outputs.push(to);
    }
}

/// Fix up the derived attachment flags once all edges exist: `color` means
/// written by some pass and not depth-stencil, `input` means consumed as a
/// pass input.
fn finalize_attachment_flags(nodes: &mut [GraphNode]) {
    let mut derived: Vec<(usize, bool, bool)> = Vec::new();
    for (index, node) in nodes.iter().enumerate() {
        if let Some(attachment) = node.as_attachment() {
            let written = node
                .inputs
                .iter()
                .any(|&producer| nodes[producer.index()].is_pass());
            let color = written && !attachment.depth_stencil;
            let input = !node.input_subpasses.is_empty();
            derived.push((index, color, input));
        }
    }
    for (index, color, input) in derived {
        let attachment = nodes[index]
            .as_attachment_mut()
            .expect("index collected from an attachment node");
        attachment.color = color;
        attachment.input = input;
    }
}
