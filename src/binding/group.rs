//! Render group: a compiled graph plus its per-frame binding state.
//!
//! A [`RenderGroup`] owns the graph, the synthesized dependency set, the
//! per-frame attachment images and one [`DrawState`] per registered
//! pipeline. Its job is the binding resolution contract: after
//! [`prepare`](RenderGroup::prepare) succeeds, every `(set, binding)` slot
//! declared by every registered pipeline is backed by a physical resource
//! for every frame in flight - frame-local images for attachments, fresh
//! clones for mutable buffers, virtual copies of frame 0 for immutable
//! resources.
//!
//! After a swapchain or device resize, call [`reset`](RenderGroup::reset)
//! (once the device is idle - the group cannot wait for the GPU itself) and
//! then `prepare` again with the new extent.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::binding::resources::{
    BufferResource, ImageResource, PerFrameBuffers, PhysicalResource, SamplerResource,
};
use crate::binding::state::{DrawState, SlotBinding};
use crate::error::{GraphError, GraphResult};
use crate::graph::{
    derive_dependencies, AttachmentLayout, Graph, GraphNode, NodeHandle, NodeKind, PassDependency,
    ResourceKind,
};
use crate::types::Extent2d;

/// The image (and sampler, for input-read attachments) backing one
/// attachment for one frame in flight.
#[derive(Debug, Clone)]
pub struct FrameImage {
    pub image: Arc<ImageResource>,
    /// Present when the attachment is read as a pass input.
    pub sampler: Option<Arc<SamplerResource>>,
}

/// A compiled render group ready for binding resolution and recording.
#[derive(Debug)]
pub struct RenderGroup {
    graph: Graph,
    dependencies: Vec<PassDependency>,
    attachment_layout: AttachmentLayout,
    draw_states: IndexMap<String, DrawState>,
    /// Per-frame images for every attachment, keyed by attachment node.
    frame_images: IndexMap<NodeHandle, Vec<FrameImage>>,
    frame_count: usize,
    extent: Option<Extent2d>,
}

impl RenderGroup {
    /// Wrap a compiled graph, deriving its synchronization requirements.
    pub fn new(graph: Graph) -> Self {
        let dependencies = derive_dependencies(&graph);
        let attachment_layout = AttachmentLayout::build(&graph);
        Self {
            graph,
            dependencies,
            attachment_layout,
            draw_states: IndexMap::new(),
            frame_images: IndexMap::new(),
            frame_count: 0,
            extent: None,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// The synthesized pass-pair and boundary dependencies, for the
    /// pass-compilation layer.
    pub fn dependencies(&self) -> &[PassDependency] {
        &self.dependencies
    }

    pub fn attachment_layout(&self) -> &AttachmentLayout {
        &self.attachment_layout
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn extent(&self) -> Option<Extent2d> {
        self.extent
    }

    /// Register a pipeline for a subpass and get its draw state.
    ///
    /// Registering the same name twice is not an error: the duplicate is
    /// rejected with a warning and `None`, leaving the existing state
    /// untouched. An unknown subpass also yields `None`.
    pub fn register_pipeline(&mut self, subpass: &str) -> Option<&mut DrawState> {
        if self.draw_states.contains_key(subpass) {
            log::warn!(
                "pipeline '{}' already registered in render group '{}'",
                subpass,
                self.graph.name()
            );
            return None;
        }
        let Some(pass) = self.graph.pass(subpass) else {
            log::warn!(
                "render group '{}' has no subpass named '{}'",
                self.graph.name(),
                subpass
            );
            return None;
        };

        let state = DrawState::new(pass, subpass);
        Some(
            self.draw_states
                .entry(subpass.to_string())
                .or_insert(state),
        )
    }

    pub fn draw_state(&self, name: &str) -> Option<&DrawState> {
        self.draw_states.get(name)
    }

    pub fn draw_state_mut(&mut self, name: &str) -> Option<&mut DrawState> {
        self.draw_states.get_mut(name)
    }

    /// Per-frame images of an attachment, available after `prepare`.
    pub fn attachment_images(&self, attachment: NodeHandle) -> Option<&[FrameImage]> {
        self.frame_images.get(&attachment).map(Vec::as_slice)
    }

    /// Allocate per-frame attachment images and resolve every registered
    /// draw state to a fixed point.
    ///
    /// `swapchain_images` backs attachments flagged `swapChain`; it must
    /// hold at least `frame_count` images when any such attachment exists.
    /// Must run before the first frame is recorded, and again after
    /// [`reset`](Self::reset).
    pub fn prepare(
        &mut self,
        extent: Extent2d,
        frame_count: usize,
        swapchain_images: &[Arc<ImageResource>],
    ) -> GraphResult<()> {
        assert!(frame_count > 0, "at least one frame in flight is required");

        self.frame_count = frame_count;
        self.extent = Some(extent);
        self.prepare_frame_images(extent, frame_count, swapchain_images);
        self.resolve_draw_states()
    }

    /// Drop all per-frame attachment images and every attachment-backed
    /// binding. Buffer and sampler bindings - in particular the virtual
    /// copies of immutable resources - survive untouched.
    ///
    /// The caller must ensure the device is idle first: in-flight GPU work
    /// may still reference the images being dropped.
    pub fn reset(&mut self) {
        log::debug!("resetting render group '{}'", self.graph.name());
        self.frame_images.clear();
        for state in self.draw_states.values_mut() {
            state.clear_image_slots();
        }
        self.extent = None;
    }

    /// One image per frame in flight for every attachment, regardless of
    /// mutability: attachment images are inherently per-frame render
    /// targets. Swapchain attachments reference the presentable images
    /// instead of allocating.
    fn prepare_frame_images(
        &mut self,
        extent: Extent2d,
        frame_count: usize,
        swapchain_images: &[Arc<ImageResource>],
    ) {
        self.frame_images.clear();

        for &handle in self.attachment_layout.attachments() {
            let node = self.graph.node(handle);
            let Some(attachment) = node.as_attachment() else {
                continue;
            };

            if attachment.swap_chain {
                assert!(
                    swapchain_images.len() >= frame_count,
                    "swapchain attachment '{}' needs {} presentable images, got {}",
                    node.name(),
                    frame_count,
                    swapchain_images.len()
                );
            }

            let mut images = Vec::with_capacity(frame_count);
            for frame in 0..frame_count {
                if attachment.swap_chain {
                    images.push(FrameImage {
                        image: swapchain_images[frame].clone(),
                        sampler: None,
                    });
                    continue;
                }

                log::debug!("frame {} creating {}", frame, node.global_name());
                let label = format!("{}/frame{}", node.global_name(), frame);
                let image = ImageResource::new(&label, attachment.format, extent);
                let sampler = attachment
                    .input
                    .then(|| SamplerResource::new(format!("{label}/sampler")));
                images.push(FrameImage { image, sampler });
            }
            self.frame_images.insert(handle, images);
        }
    }

    /// Fill every unbound slot of every draw state, frame by frame.
    /// Explicit binds always win; frame 0 supplies the default that later
    /// frames alias or clone.
    fn resolve_draw_states(&mut self) -> GraphResult<()> {
        let graph = &self.graph;
        let frame_images = &self.frame_images;
        let frame_count = self.frame_count;

        for state in self.draw_states.values_mut() {
            state.ensure_frames(frame_count);
            let pass = state.pass();
            let binding_sets = graph
                .node(pass)
                .binding_sets()
                .expect("draw states are only registered for pass nodes");

            for (&resource, slot) in binding_sets {
                let node = graph.node(resource);
                log::trace!(
                    "checking resource {} at set {} binding {}",
                    node.global_name(),
                    slot.set,
                    slot.binding
                );

                for frame in 0..frame_count {
                    let existing = state.binding(frame, slot.set, slot.binding);
                    if let Some(bound) = existing.resource() {
                        // Explicitly bound (externally or by an earlier
                        // resolution); only validate the resource kind.
                        if bound.kind() != slot.kind {
                            return Err(GraphError::TypeMismatch {
                                name: node.global_name(),
                                expected: slot.kind,
                                actual: bound.kind(),
                            });
                        }
                        continue;
                    }

                    let binding = match node.kind() {
                        NodeKind::Attachment(_) => {
                            let images = frame_images.get(&resource).ok_or_else(|| {
                                GraphError::UnresolvedBinding {
                                    pass: state.name().to_string(),
                                    set: slot.set,
                                    binding: slot.binding,
                                    frame,
                                }
                            })?;
                            SlotBinding::Internal(PhysicalResource::Image(
                                images[frame].image.clone(),
                            ))
                        }
                        NodeKind::Buffer(buffer) => {
                            if frame == 0 {
                                if !buffer.internal {
                                    // External resources must be wired by the
                                    // caller before resolution.
                                    return Err(GraphError::UnresolvedBinding {
                                        pass: state.name().to_string(),
                                        set: slot.set,
                                        binding: slot.binding,
                                        frame,
                                    });
                                }
                                SlotBinding::Internal(PhysicalResource::Buffer(
                                    BufferResource::new(node.global_name(), buffer.size),
                                ))
                            } else {
                                let default = frame_zero_resource(state, slot.set, slot.binding)?;
                                if buffer.immutable {
                                    SlotBinding::AliasedFromFrame0(default)
                                } else {
                                    let default = expect_buffer(&default, node)?;
                                    let array = state
                                        .mutable_buffers
                                        .entry((slot.set, slot.binding))
                                        .or_insert_with(|| PerFrameBuffers::new(default));
                                    array.resize(frame);
                                    SlotBinding::Internal(PhysicalResource::Buffer(
                                        array.buffer(frame).clone(),
                                    ))
                                }
                            }
                        }
                        NodeKind::Sampler(sampler) => {
                            if frame == 0 {
                                if !sampler.internal {
                                    return Err(GraphError::UnresolvedBinding {
                                        pass: state.name().to_string(),
                                        set: slot.set,
                                        binding: slot.binding,
                                        frame,
                                    });
                                }
                                SlotBinding::Internal(PhysicalResource::Sampler(
                                    SamplerResource::new(node.global_name()),
                                ))
                            } else if sampler.immutable {
                                SlotBinding::AliasedFromFrame0(frame_zero_resource(
                                    state,
                                    slot.set,
                                    slot.binding,
                                )?)
                            } else {
                                let label = format!("{}/frame{}", node.global_name(), frame);
                                SlotBinding::Internal(PhysicalResource::Sampler(
                                    SamplerResource::new(label),
                                ))
                            }
                        }
                        NodeKind::GraphicPass(_) | NodeKind::ComputePass(_) => {
                            // Pass nodes never appear in descriptor tables.
                            continue;
                        }
                    };

                    *state.slot_mut(frame, slot.set, slot.binding) = binding;
                }
            }
        }
        Ok(())
    }
}

/// Frame 0's resource for a slot; resolution order guarantees it exists by
/// the time any later frame needs it.
fn frame_zero_resource(state: &DrawState, set: u32, binding: u32) -> GraphResult<PhysicalResource> {
    state
        .binding(0, set, binding)
        .resource()
        .cloned()
        .ok_or_else(|| GraphError::UnresolvedBinding {
            pass: state.name().to_string(),
            set,
            binding,
            frame: 0,
        })
}

fn expect_buffer(resource: &PhysicalResource, node: &GraphNode) -> GraphResult<Arc<BufferResource>> {
    resource
        .as_buffer()
        .cloned()
        .ok_or_else(|| GraphError::TypeMismatch {
            name: node.global_name(),
            expected: ResourceKind::Buffer,
            actual: resource.kind(),
        })
}
