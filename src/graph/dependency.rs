//! Synchronization dependency derivation.
//!
//! Consumes the leveled graph and synthesizes the ordering requirements the
//! executor layer turns into native barriers: read-after-write and
//! write-after-write relations between directly connected passes, plus the
//! boundary dependencies every pass needs against work outside the schedule
//! (a previous frame's leftover writes, the undefined layout of a freshly
//! acquired swapchain image).
//!
//! Only *direct* successors are considered - one hop through each written
//! resource to the passes consuming it. Transitive ordering is already
//! guaranteed by the level order, so deriving deeper edges would only
//! over-synchronize.
//!
//! Stage and access masks are API-neutral; backends map them onto their own
//! pipeline stage and access enums.

use std::collections::HashSet;

use bitflags::bitflags;
use indexmap::IndexMap;

use crate::graph::node::{NodeHandle, NodeKind};
use crate::graph::Graph;

bitflags! {
    /// Pipeline stages a dependency can gate.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StageFlags: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const FRAGMENT_SHADER = 1 << 1;
        const EARLY_FRAGMENT_TESTS = 1 << 2;
        const LATE_FRAGMENT_TESTS = 1 << 3;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 4;
        const COMPUTE_SHADER = 1 << 5;
    }
}

bitflags! {
    /// Memory access kinds a dependency can order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const COLOR_ATTACHMENT_READ = 1 << 0;
        const COLOR_ATTACHMENT_WRITE = 1 << 1;
        const DEPTH_STENCIL_READ = 1 << 2;
        const DEPTH_STENCIL_WRITE = 1 << 3;
        const SHADER_READ = 1 << 4;
        const MEMORY_WRITE = 1 << 5;
    }
}

/// Operation performed on an attachment when a pass begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadOp {
    /// Clear to the attachment's clear value.
    Clear,
    /// Load the existing contents.
    #[default]
    Load,
}

/// Operation performed on an attachment when a pass ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreOp {
    /// Store the contents for later use.
    #[default]
    Store,
    /// Contents are consumed within the schedule and need not survive.
    DontCare,
}

/// Load/store pair derived for one attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentOps {
    pub load: LoadOp,
    pub store: StoreOp,
}

/// Attachment reference indices of one pass, pointing into
/// [`AttachmentLayout::attachments`].
#[derive(Debug, Clone, Default)]
pub struct AttachmentRefs {
    /// Attachments read as shader inputs.
    pub input_refs: Vec<u32>,
    /// Color attachments written.
    pub color_refs: Vec<u32>,
    /// Depth/stencil attachment written, if any.
    pub depth_ref: Option<u32>,
}

/// Global attachment index assignment plus per-pass references, in pass
/// execution order. This is the attachment-facing half of the interface
/// handed to the pass-compilation layer.
#[derive(Debug, Default)]
pub struct AttachmentLayout {
    attachments: Vec<NodeHandle>,
    refs: IndexMap<NodeHandle, AttachmentRefs>,
}

impl AttachmentLayout {
    /// Assign attachment indices in first-use order across the leveled
    /// passes and collect each pass's references.
    pub fn build(graph: &Graph) -> Self {
        let mut layout = Self::default();

        for pass in graph.topo().pass_order() {
            let mut refs = AttachmentRefs::default();

            for &input in graph.node(pass).inputs() {
                if graph.node(input).as_attachment().is_some() {
                    refs.input_refs.push(layout.index_or_insert(input));
                }
            }

            for &output in graph.node(pass).outputs() {
                if let Some(attachment) = graph.node(output).as_attachment() {
                    let index = layout.index_or_insert(output);
                    if attachment.depth_stencil {
                        refs.depth_ref = Some(index);
                    } else {
                        refs.color_refs.push(index);
                    }
                }
            }

            layout.refs.insert(pass, refs);
        }

        layout
    }

    fn index_or_insert(&mut self, attachment: NodeHandle) -> u32 {
        if let Some(index) = self.index_of(attachment) {
            return index;
        }
        self.attachments.push(attachment);
        (self.attachments.len() - 1) as u32
    }

    /// All referenced attachments in index order.
    pub fn attachments(&self) -> &[NodeHandle] {
        &self.attachments
    }

    pub fn index_of(&self, attachment: NodeHandle) -> Option<u32> {
        self.attachments
            .iter()
            .position(|&handle| handle == attachment)
            .map(|index| index as u32)
    }

    /// References of one pass, if it was part of the leveled graph.
    pub fn refs(&self, pass: NodeHandle) -> Option<&AttachmentRefs> {
        self.refs.get(&pass)
    }

    /// Derive the load/store pair for an attachment: `clear` selects the
    /// load op, and a color attachment consumed as an input inside the
    /// schedule does not need its contents stored.
    pub fn ops(graph: &Graph, attachment: NodeHandle) -> Option<AttachmentOps> {
        let node = graph.node(attachment).as_attachment()?;
        let load = if node.clear { LoadOp::Clear } else { LoadOp::Load };
        let store = if !node.depth_stencil && node.input {
            StoreOp::DontCare
        } else {
            StoreOp::Store
        };
        Some(AttachmentOps { load, store })
    }
}

/// One synthesized ordering requirement between a producer and a consumer,
/// or between the outside world and a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassDependency {
    /// Producer pass; `None` marks an external boundary dependency.
    pub src: Option<NodeHandle>,
    pub dst: NodeHandle,
    pub src_stages: StageFlags,
    pub src_access: AccessFlags,
    pub dst_stages: StageFlags,
    pub dst_access: AccessFlags,
    /// The dependency only needs framebuffer-local ordering.
    pub by_region: bool,
}

impl PassDependency {
    /// Whether this is a pass-to-external-boundary dependency.
    pub fn is_boundary(&self) -> bool {
        self.src.is_none()
    }
}

/// Derive the complete dependency set for a compiled graph.
///
/// A pass-pair dependency is emitted only when the producer's written
/// attachments intersect the consumer's reads or writes; passes sharing no
/// attachment stay unordered beyond the level order itself.
pub fn derive_dependencies(graph: &Graph) -> Vec<PassDependency> {
    let layout = AttachmentLayout::build(graph);
    let mut dependencies = Vec::new();

    for pass in graph.topo().pass_order() {
        let Some(from) = layout.refs(pass) else {
            continue;
        };

        for successor in graph.direct_successor_passes(pass) {
            let Some(to) = layout.refs(successor) else {
                continue;
            };
            if let Some(dependency) = pass_pair_dependency(pass, successor, from, to) {
                dependencies.push(dependency);
            }
        }

        boundary_dependencies(graph, pass, &mut dependencies);
    }

    log::debug!(
        "derived {} dependencies for graph '{}'",
        dependencies.len(),
        graph.name()
    );
    dependencies
}

/// Classify the producer/consumer attachment sets and build the merged
/// dependency, or nothing when no hazard relates the two passes.
fn pass_pair_dependency(
    src: NodeHandle,
    dst: NodeHandle,
    from: &AttachmentRefs,
    to: &AttachmentRefs,
) -> Option<PassDependency> {
    let mut written: HashSet<u32> = from.color_refs.iter().copied().collect();
    let written_depth = from.depth_ref;
    if let Some(depth) = written_depth {
        written.insert(depth);
    }

    let raw_color = to
        .input_refs
        .iter()
        .any(|index| from.color_refs.contains(index));
    let raw_depth = to
        .input_refs
        .iter()
        .any(|&index| written_depth == Some(index));
    let waw = to.color_refs.iter().any(|index| written.contains(index));
    let depth_waw = matches!(to.depth_ref, Some(index) if written.contains(&index));

    if !raw_color && !raw_depth && !waw && !depth_waw {
        return None;
    }

    let mut dependency = PassDependency {
        src: Some(src),
        dst,
        src_stages: StageFlags::empty(),
        src_access: AccessFlags::empty(),
        dst_stages: StageFlags::empty(),
        dst_access: AccessFlags::empty(),
        by_region: true,
    };

    if raw_color {
        dependency.src_stages |= StageFlags::COLOR_ATTACHMENT_OUTPUT;
        dependency.src_access |= AccessFlags::COLOR_ATTACHMENT_WRITE;
        dependency.dst_stages |= StageFlags::FRAGMENT_SHADER;
        dependency.dst_access |= AccessFlags::SHADER_READ;
    }

    if raw_depth {
        dependency.src_stages |=
            StageFlags::EARLY_FRAGMENT_TESTS | StageFlags::LATE_FRAGMENT_TESTS;
        dependency.src_access |= AccessFlags::DEPTH_STENCIL_WRITE;
        dependency.dst_stages |= StageFlags::FRAGMENT_SHADER;
        dependency.dst_access |= AccessFlags::SHADER_READ;
    }

    if waw {
        dependency.src_stages |= StageFlags::COLOR_ATTACHMENT_OUTPUT;
        dependency.src_access |= AccessFlags::COLOR_ATTACHMENT_WRITE;
        dependency.dst_stages |= StageFlags::COLOR_ATTACHMENT_OUTPUT;
        dependency.dst_access |= AccessFlags::COLOR_ATTACHMENT_WRITE;
    }

    if depth_waw {
        let tests = StageFlags::EARLY_FRAGMENT_TESTS | StageFlags::LATE_FRAGMENT_TESTS;
        dependency.src_stages |= tests;
        dependency.src_access |= AccessFlags::DEPTH_STENCIL_WRITE;
        dependency.dst_stages |= tests;
        dependency.dst_access |= AccessFlags::DEPTH_STENCIL_WRITE;
    }

    Some(dependency)
}

/// Boundary dependencies against out-of-schedule work: attachment writes
/// must wait out the layout transition of a freshly acquired or reused
/// image, and input attachment reads must wait out any leftover writer.
fn boundary_dependencies(graph: &Graph, pass: NodeHandle, dependencies: &mut Vec<PassDependency>) {
    for &output in graph.node(pass).outputs() {
        let Some(attachment) = graph.node(output).as_attachment() else {
            continue;
        };

        if attachment.swap_chain || attachment.color {
            dependencies.push(PassDependency {
                src: None,
                dst: pass,
                src_stages: StageFlags::TOP_OF_PIPE,
                src_access: AccessFlags::empty(),
                dst_stages: StageFlags::COLOR_ATTACHMENT_OUTPUT,
                dst_access: AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE,
                by_region: true,
            });
        }

        if attachment.depth_stencil {
            dependencies.push(PassDependency {
                src: None,
                dst: pass,
                src_stages: StageFlags::TOP_OF_PIPE,
                src_access: AccessFlags::empty(),
                dst_stages: StageFlags::EARLY_FRAGMENT_TESTS | StageFlags::LATE_FRAGMENT_TESTS,
                dst_access: AccessFlags::DEPTH_STENCIL_READ | AccessFlags::DEPTH_STENCIL_WRITE,
                by_region: true,
            });
        }
    }

    for &input in graph.node(pass).inputs() {
        if let NodeKind::Attachment(attachment) = graph.node(input).kind() {
            if attachment.input {
                dependencies.push(PassDependency {
                    src: None,
                    dst: pass,
                    src_stages: StageFlags::TOP_OF_PIPE,
                    src_access: AccessFlags::MEMORY_WRITE,
                    dst_stages: StageFlags::FRAGMENT_SHADER,
                    dst_access: AccessFlags::SHADER_READ,
                    by_region: true,
                });
                // One read boundary per pass is enough.
                break;
            }
        }
    }
}
