//! Per-pipeline resource binding state.
//!
//! A [`DrawState`] tracks, for every frame in flight, which physical
//! resource fills each `(set, binding)` slot of one pipeline, plus the draw
//! or dispatch operations to record with those bindings. Callers wire the
//! external resources (frame 0 at minimum); the resolver fills everything
//! else before any command is recorded.

use std::collections::BTreeMap;

use glam::{IVec2, UVec2};

use crate::binding::resources::{PerFrameBuffers, PhysicalResource};
use crate::graph::NodeHandle;

/// How a descriptor slot got its resource, per frame.
#[derive(Debug, Clone, Default)]
pub enum SlotBinding {
    /// Nothing bound yet. Never survives a successful resolution.
    #[default]
    Unbound,
    /// Caller-supplied resource.
    External(PhysicalResource),
    /// Allocated by the resolver (frame-local image, internal buffer,
    /// grow-on-demand clone).
    Internal(PhysicalResource),
    /// Virtual copy of frame 0's resource: the handle is cloned, the
    /// underlying allocation is not.
    AliasedFromFrame0(PhysicalResource),
}

impl SlotBinding {
    pub fn is_bound(&self) -> bool {
        !matches!(self, Self::Unbound)
    }

    /// The bound resource, if any.
    pub fn resource(&self) -> Option<&PhysicalResource> {
        match self {
            Self::Unbound => None,
            Self::External(resource)
            | Self::Internal(resource)
            | Self::AliasedFromFrame0(resource) => Some(resource),
        }
    }
}

/// One recorded draw.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrawOp {
    pub scissor_offset: IVec2,
    pub scissor_extent: UVec2,
    pub index_count: u32,
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}

/// One recorded compute dispatch.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOp {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

/// Binding state for one registered pipeline.
#[derive(Debug)]
pub struct DrawState {
    pass: NodeHandle,
    name: String,
    /// Slot tables, one per frame in flight, keyed by `(set, binding)`.
    frames: Vec<BTreeMap<(u32, u32), SlotBinding>>,
    /// Grow-on-demand buffer arrays for mutable buffer slots.
    pub(crate) mutable_buffers: BTreeMap<(u32, u32), PerFrameBuffers>,
    draw_ops: Vec<DrawOp>,
    dispatch_ops: Vec<DispatchOp>,
}

impl DrawState {
    pub(crate) fn new(pass: NodeHandle, name: impl Into<String>) -> Self {
        Self {
            pass,
            name: name.into(),
            frames: vec![BTreeMap::new()],
            mutable_buffers: BTreeMap::new(),
            draw_ops: Vec::new(),
            dispatch_ops: Vec::new(),
        }
    }

    /// The pass node this pipeline draws for.
    pub fn pass(&self) -> NodeHandle {
        self.pass
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Bind an external resource for frame 0. Frames beyond 0 pick it up
    /// through resolution (aliased or cloned depending on mutability).
    pub fn bind(&mut self, set: u32, binding: u32, resource: PhysicalResource) {
        self.bind_at(0, set, binding, resource);
    }

    /// Bind an external resource for a specific frame. Resolution never
    /// overrides an explicitly bound slot.
    pub fn bind_at(&mut self, frame: usize, set: u32, binding: u32, resource: PhysicalResource) {
        self.ensure_frames(frame + 1);
        self.frames[frame].insert((set, binding), SlotBinding::External(resource));
    }

    /// Current binding of a slot; `Unbound` when nothing was resolved.
    pub fn binding(&self, frame: usize, set: u32, binding: u32) -> SlotBinding {
        self.frames
            .get(frame)
            .and_then(|slots| slots.get(&(set, binding)))
            .cloned()
            .unwrap_or_default()
    }

    /// The fully resolved `(set, binding) -> resource` table for a frame.
    /// Complete only after a successful resolution.
    pub fn resolved_table(&self, frame: usize) -> BTreeMap<(u32, u32), PhysicalResource> {
        let Some(slots) = self.frames.get(frame) else {
            return BTreeMap::new();
        };
        slots
            .iter()
            .filter_map(|(&slot, binding)| binding.resource().map(|r| (slot, r.clone())))
            .collect()
    }

    /// Record the draws to issue with this pipeline.
    pub fn set_draw_ops(&mut self, ops: Vec<DrawOp>) {
        self.draw_ops = ops;
    }

    pub fn draw_ops(&self) -> &[DrawOp] {
        &self.draw_ops
    }

    /// Record the dispatches to issue with this pipeline.
    pub fn set_dispatch_ops(&mut self, ops: Vec<DispatchOp>) {
        self.dispatch_ops = ops;
    }

    pub fn dispatch_ops(&self) -> &[DispatchOp] {
        &self.dispatch_ops
    }

    pub(crate) fn ensure_frames(&mut self, frame_count: usize) {
        while self.frames.len() < frame_count {
            self.frames.push(BTreeMap::new());
        }
    }

    pub(crate) fn slot_mut(&mut self, frame: usize, set: u32, binding: u32) -> &mut SlotBinding {
        self.frames[frame].entry((set, binding)).or_default()
    }

    /// Drop every slot (all frames) bound to an attachment image. Used by
    /// reset: attachment images are reallocated per swapchain generation,
    /// while buffer and sampler bindings stay valid.
    pub(crate) fn clear_image_slots(&mut self) {
        for slots in &mut self.frames {
            for binding in slots.values_mut() {
                let is_image = binding
                    .resource()
                    .map(|resource| resource.as_image().is_some())
                    .unwrap_or(false);
                if is_image {
                    *binding = SlotBinding::Unbound;
                }
            }
        }
    }
}
