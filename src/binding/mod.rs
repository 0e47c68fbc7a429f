//! Per-frame resource binding resolution.
//!
//! A double- or triple-buffered renderer mutates frame `N+1` while frame
//! `N` still drains on the device, so every mutable resource needs one
//! physical instance per frame in flight. This module decides, for every
//! `(set, binding)` slot of every registered pipeline, what backs the slot
//! at each frame index:
//!
//! | Resource | Frame 0 | Frames > 0 |
//! |----------|---------|------------|
//! | Attachment | frame-local image | frame-local image |
//! | Buffer (external) | caller-bound, required | clone of frame 0 (mutable) or alias (immutable) |
//! | Buffer (internal) | allocated | clone of frame 0 (mutable) or alias (immutable) |
//! | Sampler | caller-bound or allocated | fresh (mutable) or alias (immutable) |
//!
//! An *alias* is a virtual copy: the binding record is replicated but the
//! underlying allocation is not, so static uniform data is never duplicated
//! across frames.

mod group;
mod resources;
mod state;

pub use group::{FrameImage, RenderGroup};
pub use resources::{
    BufferResource, ImageResource, PerFrameBuffers, PhysicalResource, SamplerResource,
};
pub use state::{DispatchOp, DrawOp, DrawState, SlotBinding};
