//! # Prism Graph
//!
//! Frame-graph compiler and per-frame resource binding resolver for the
//! Prism render engine.
//!
//! A rendering pipeline is described declaratively - subpasses with typed
//! inputs and outputs - and compiled into everything a multi-pass renderer
//! needs before it records a single command:
//!
//! - [`Graph`] - the node/edge form of the description, with `reference`
//!   items merged into their shared targets
//! - [`TopoResult`](graph::TopoResult) - level-ordered execution schedule
//!   with concurrent-write diagnostics
//! - [`PassDependency`](graph::PassDependency) - synthesized RAW/WAW and
//!   boundary synchronization requirements
//! - [`RenderGroup`] - per-frame-in-flight binding resolution: attachments
//!   get frame-local images, mutable buffers get clones, immutable
//!   resources alias frame 0
//!
//! ## Example
//!
//! ```ignore
//! use prism_graph::{Graph, RenderGroup, Extent2d};
//!
//! let graph = Graph::from_json(&std::fs::read_to_string("deferred.json")?)?;
//! let mut group = RenderGroup::new(graph);
//!
//! let state = group.register_pipeline("gbuffer").unwrap();
//! state.bind(0, 0, camera_buffer);
//!
//! group.prepare(Extent2d::new(1920, 1080), 2, &swapchain_images)?;
//! // Every (set, binding) slot of every frame is now backed.
//! ```

pub mod binding;
pub mod description;
pub mod error;
pub mod graph;
pub mod types;

// Re-export main types for convenience
pub use binding::{DrawState, PhysicalResource, RenderGroup};
pub use description::{RenderGroupDescription, ResourceItem, SubpassDescription};
pub use error::{GraphError, GraphResult};
pub use graph::{Graph, NodeHandle, PassDependency, TopoResult};
pub use types::{Extent2d, TextureFormat};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library.
///
/// Optional; only emits a startup log line.
pub fn init() {
    log::info!("Prism Graph v{} initialized", VERSION);
}
