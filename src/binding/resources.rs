//! Physical resource model for binding resolution.
//!
//! The compiler does not talk to a GPU; it decides which *physical* resource
//! backs each descriptor slot of each frame in flight. These types stand in
//! for the backend objects: identity is the `Arc` pointer, so an "aliased"
//! binding is literally a clone of the frame-0 handle while an "allocated"
//! binding is a fresh `Arc`. Backends wrap their native objects in the same
//! shapes.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::graph::ResourceKind;
use crate::types::{Extent2d, TextureFormat};

/// A GPU image backing an attachment for one frame in flight.
#[derive(Debug)]
pub struct ImageResource {
    label: String,
    format: TextureFormat,
    extent: Extent2d,
}

impl ImageResource {
    pub fn new(label: impl Into<String>, format: TextureFormat, extent: Extent2d) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            format,
            extent,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn extent(&self) -> Extent2d {
        self.extent
    }
}

/// A GPU buffer with host-visible contents.
///
/// Contents are interior-mutable so that every frame holding the same `Arc`
/// observes writes made through any clone of the handle - this is exactly
/// the sharing the resolver exploits for immutable resources.
#[derive(Debug)]
pub struct BufferResource {
    label: String,
    data: RwLock<Vec<u8>>,
}

impl BufferResource {
    pub fn new(label: impl Into<String>, size: u64) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            data: RwLock::new(vec![0; size as usize]),
        })
    }

    /// Allocate a new buffer with a copy of this buffer's contents.
    pub fn clone_contents(&self, label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            data: RwLock::new(self.data.read().clone()),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn size(&self) -> u64 {
        self.data.read().len() as u64
    }

    /// Write raw bytes at an offset. Writes past the end are truncated.
    pub fn write(&self, offset: u64, bytes: &[u8]) {
        let mut data = self.data.write();
        let offset = offset as usize;
        if offset >= data.len() {
            return;
        }
        let length = bytes.len().min(data.len() - offset);
        data[offset..offset + length].copy_from_slice(&bytes[..length]);
    }

    /// Write a plain-old-data value at an offset.
    pub fn write_pod<T: bytemuck::NoUninit>(&self, offset: u64, value: &T) {
        self.write(offset, bytemuck::bytes_of(value));
    }

    /// Snapshot the buffer contents.
    pub fn contents(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

/// A texture sampler. Created implicitly for attachments that are read as
/// pass inputs, or declared as a descriptor resource.
#[derive(Debug)]
pub struct SamplerResource {
    label: String,
}

impl SamplerResource {
    pub fn new(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// A physical resource bound into a descriptor slot.
#[derive(Debug, Clone)]
pub enum PhysicalResource {
    Image(Arc<ImageResource>),
    Buffer(Arc<BufferResource>),
    Sampler(Arc<SamplerResource>),
}

impl PhysicalResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Image(_) => ResourceKind::Attachment,
            Self::Buffer(_) => ResourceKind::Buffer,
            Self::Sampler(_) => ResourceKind::Sampler,
        }
    }

    /// Pointer identity: true when both handles refer to the same physical
    /// allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Image(a), Self::Image(b)) => Arc::ptr_eq(a, b),
            (Self::Buffer(a), Self::Buffer(b)) => Arc::ptr_eq(a, b),
            (Self::Sampler(a), Self::Sampler(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_image(&self) -> Option<&Arc<ImageResource>> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_buffer(&self) -> Option<&Arc<BufferResource>> {
        match self {
            Self::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn as_sampler(&self) -> Option<&Arc<SamplerResource>> {
        match self {
            Self::Sampler(sampler) => Some(sampler),
            _ => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Image(image) => image.label(),
            Self::Buffer(buffer) => buffer.label(),
            Self::Sampler(sampler) => sampler.label(),
        }
    }
}

/// Frame-indexed buffer array for a mutable resource.
///
/// Slot 0 is the caller-supplied (or internally allocated) default buffer.
/// Growing to frame `n` clones the default's contents into fresh
/// allocations, so each frame in flight ends up with an independent copy it
/// can mutate without coordination.
#[derive(Debug, Clone)]
pub struct PerFrameBuffers {
    buffers: Vec<Arc<BufferResource>>,
}

impl PerFrameBuffers {
    pub fn new(default: Arc<BufferResource>) -> Self {
        Self {
            buffers: vec![default],
        }
    }

    /// Ensure a buffer exists for frame `frame`, cloning the default for
    /// every missing slot. Shrinking drops the trailing clones.
    pub fn resize(&mut self, frame: usize) {
        if self.buffers.len() > frame + 1 {
            self.buffers.truncate(frame + 1);
            return;
        }
        for index in self.buffers.len()..=frame {
            let label = format!("{}/frame{}", self.buffers[0].label(), index);
            self.buffers.push(self.buffers[0].clone_contents(label));
        }
    }

    pub fn buffer(&self, frame: usize) -> &Arc<BufferResource> {
        &self.buffers[frame]
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
