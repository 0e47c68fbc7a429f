//! Declarative render-group documents.
//!
//! A render group is described by a JSON document listing subpasses with
//! their shaders, inputs, outputs and explicit scheduling dependencies.
//! The document is the only persisted input of the compiler; everything
//! else (levels, synchronization, bindings) is derived from it.
//!
//! # Example
//!
//! ```json
//! {
//!     "name": "deferred",
//!     "subpasses": [
//!         {
//!             "name": "gbuffer",
//!             "type": "graphic",
//!             "shaders": { "vertex": "gbuffer.vert", "fragment": "gbuffer.frag" },
//!             "inputs": [
//!                 { "name": "camera", "type": "buffer", "binding": 0 }
//!             ],
//!             "outputs": [
//!                 { "name": "albedo", "type": "attachment", "format": "FORMAT_B8G8R8A8_UNORM", "clear": true },
//!                 { "name": "depth", "type": "attachment", "format": "FORMAT_D16_UNORM", "depthStencil": true, "clear": true }
//!             ]
//!         },
//!         {
//!             "name": "shading",
//!             "type": "graphic",
//!             "shaders": { "vertex": "quad.vert", "fragment": "shading.frag" },
//!             "inputs": [
//!                 { "name": "albedo", "type": "reference" }
//!             ],
//!             "outputs": [
//!                 { "name": "swapchain", "type": "attachment", "format": "FORMAT_B8G8R8A8_SRGB", "swapChain": true }
//!             ]
//!         }
//!     ]
//! }
//! ```
//!
//! Items are resolved in document order; `reference` items are resolved only
//! after every subpass has been scanned once, so a resource may be declared
//! in a later subpass than the one referencing it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GraphResult;

/// A complete render-group document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderGroupDescription {
    pub name: String,
    #[serde(default)]
    pub subpasses: Vec<SubpassDescription>,
}

impl RenderGroupDescription {
    /// Create an empty description, to be filled through the builder methods.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subpasses: Vec::new(),
        }
    }

    /// Parse a description from a JSON string.
    pub fn from_json(json: &str) -> GraphResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a description from a file.
    pub fn from_path(path: impl AsRef<Path>) -> GraphResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Add a subpass.
    pub fn with_subpass(mut self, subpass: SubpassDescription) -> Self {
        self.subpasses.push(subpass);
        self
    }
}

/// Whether a subpass records draw or dispatch work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubpassKind {
    Graphic,
    Compute,
}

/// Shader source paths for a subpass.
///
/// Graphic subpasses use `vertex` + `fragment`; compute subpasses use
/// `compute`. Unused entries stay empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShaderPaths {
    #[serde(default)]
    pub vertex: String,
    #[serde(default)]
    pub fragment: String,
    #[serde(default)]
    pub compute: String,
}

/// One subpass of a render group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubpassDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SubpassKind,
    #[serde(default)]
    pub shaders: ShaderPaths,
    /// Explicit scheduling-only edges to other subpasses. These order
    /// execution without implying any resource binding.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<ResourceItem>,
    #[serde(default)]
    pub outputs: Vec<ResourceItem>,
}

impl SubpassDescription {
    /// Create a graphic subpass with the given shader pair.
    pub fn graphic(
        name: impl Into<String>,
        vertex: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: SubpassKind::Graphic,
            shaders: ShaderPaths {
                vertex: vertex.into(),
                fragment: fragment.into(),
                compute: String::new(),
            },
            dependencies: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Create a compute subpass with the given shader.
    pub fn compute(name: impl Into<String>, compute: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SubpassKind::Compute,
            shaders: ShaderPaths {
                vertex: String::new(),
                fragment: String::new(),
                compute: compute.into(),
            },
            dependencies: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_input(mut self, item: ResourceItem) -> Self {
        self.inputs.push(item);
        self
    }

    pub fn with_output(mut self, item: ResourceItem) -> Self {
        self.outputs.push(item);
        self
    }

    /// Add an explicit scheduling dependency on another subpass.
    pub fn with_dependency(mut self, subpass: impl Into<String>) -> Self {
        self.dependencies.push(subpass.into());
        self
    }
}

/// Discriminator for input/output items.
///
/// `Ssbo` is accepted as an alias for a storage buffer and produces the same
/// node as `Buffer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceItemKind {
    Attachment,
    Buffer,
    Sampler,
    Ssbo,
    Reference,
}

/// One input or output item of a subpass.
///
/// Attachment-specific and descriptor-specific fields are meaningful only
/// for the corresponding kinds; everything defaults off.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceItem {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ResourceItemKind,

    // Attachment fields.
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub depth_stencil: bool,
    #[serde(default)]
    pub swap_chain: bool,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub clear: bool,

    // Descriptor placement fields.
    #[serde(default)]
    pub set: u32,
    /// Explicit binding index. When absent the binding defaults to the
    /// item's positional index among the subpass inputs.
    #[serde(default)]
    pub binding: Option<u32>,
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub immutable: bool,
    #[serde(default)]
    pub size: u64,
}

impl ResourceItem {
    fn new(name: impl Into<String>, kind: ResourceItemKind) -> Self {
        Self {
            name: name.into(),
            kind,
            format: String::new(),
            depth_stencil: false,
            swap_chain: false,
            shared: false,
            clear: false,
            set: 0,
            binding: None,
            internal: false,
            immutable: false,
            size: 0,
        }
    }

    pub fn attachment(name: impl Into<String>, format: impl Into<String>) -> Self {
        let mut item = Self::new(name, ResourceItemKind::Attachment);
        item.format = format.into();
        item
    }

    pub fn buffer(name: impl Into<String>) -> Self {
        Self::new(name, ResourceItemKind::Buffer)
    }

    pub fn sampler(name: impl Into<String>) -> Self {
        Self::new(name, ResourceItemKind::Sampler)
    }

    /// Reference a resource declared by another subpass.
    pub fn reference(name: impl Into<String>) -> Self {
        Self::new(name, ResourceItemKind::Reference)
    }

    pub fn depth_stencil(mut self) -> Self {
        self.depth_stencil = true;
        self
    }

    pub fn swap_chain(mut self) -> Self {
        self.swap_chain = true;
        self
    }

    pub fn shared(mut self) -> Self {
        self.shared = true;
        self
    }

    pub fn clear(mut self) -> Self {
        self.clear = true;
        self
    }

    /// Place the descriptor at an explicit `(set, binding)`.
    pub fn at(mut self, set: u32, binding: u32) -> Self {
        self.set = set;
        self.binding = Some(binding);
        self
    }

    /// Mark the resource as implicitly allocated, one instance per frame.
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }

    /// Mark the resource content as stable across frames in flight.
    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }
}
