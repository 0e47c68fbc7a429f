//! End-to-end tests for the frame-graph compiler and binding resolver.
//!
//! These tests drive the full pipeline the way an embedding renderer does:
//! parse or build a description, compile it to a graph, wrap it in a
//! [`RenderGroup`], wire the external resources and resolve bindings for
//! several frames in flight.

use std::sync::Arc;

use rstest::rstest;

use prism_graph::binding::{BufferResource, ImageResource, PhysicalResource, SamplerResource};
use prism_graph::description::{RenderGroupDescription, ResourceItem, SubpassDescription};
use prism_graph::graph::StageFlags;
use prism_graph::{Extent2d, Graph, GraphError, RenderGroup, TextureFormat};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn swapchain(extent: Extent2d, count: usize) -> Vec<Arc<ImageResource>> {
    (0..count)
        .map(|index| {
            ImageResource::new(
                format!("swapchain/{index}"),
                TextureFormat::Bgra8UnormSrgb,
                extent,
            )
        })
        .collect()
}

// ============================================================================
// Graph shape
// ============================================================================

/// A single pass with four descriptor inputs and three attachment outputs
/// levels into resources -> pass -> outputs, and indexes all four inputs.
#[test]
fn test_single_pass_graph_shape() {
    init_logs();

    let graph = Graph::from_json(
        r#"{
            "name": "forward",
            "subpasses": [
                {
                    "name": "main",
                    "type": "graphic",
                    "shaders": { "vertex": "main.vert", "fragment": "main.frag" },
                    "inputs": [
                        { "name": "camera", "type": "buffer", "binding": 0, "immutable": true },
                        { "name": "lights", "type": "buffer", "binding": 1, "internal": true, "size": 256 },
                        { "name": "albedo_sampler", "type": "sampler", "binding": 2, "internal": true, "immutable": true },
                        { "name": "normal_sampler", "type": "sampler", "binding": 3, "internal": true, "immutable": true }
                    ],
                    "outputs": [
                        { "name": "hdr", "type": "attachment", "format": "FORMAT_R16G16B16A16_SFLOAT", "clear": true },
                        { "name": "velocity", "type": "attachment", "format": "FORMAT_B8G8R8A8_UNORM", "clear": true },
                        { "name": "depth", "type": "attachment", "format": "FORMAT_D16_UNORM", "depthStencil": true, "clear": true }
                    ]
                }
            ]
        }"#,
    )
    .unwrap();

    let topo = graph.topo();
    assert_eq!(topo.levels().len(), 3);
    assert_eq!(topo.levels()[0].len(), 4); // the four descriptor inputs
    assert_eq!(topo.levels()[1].len(), 1); // the pass
    assert_eq!(topo.levels()[2].len(), 3); // the three attachments

    let main = graph.pass("main").unwrap();
    assert_eq!(graph.node(main).binding_sets().unwrap().len(), 4);

    // Pass-only view collapses to a single level.
    assert_eq!(topo.pass_levels().len(), 1);
}

/// A resource declared once and referenced from two other subpasses stays a
/// single node instance, readable by both.
#[test]
fn test_reference_merges_across_subpasses() {
    init_logs();

    let graph = Graph::from_json(
        r#"{
            "name": "shadowed",
            "subpasses": [
                {
                    "name": "shadow",
                    "type": "graphic",
                    "shaders": { "vertex": "shadow.vert", "fragment": "shadow.frag" },
                    "outputs": [
                        { "name": "shadowmap", "type": "attachment", "format": "FORMAT_D16_UNORM", "depthStencil": true, "clear": true }
                    ]
                },
                {
                    "name": "opaque",
                    "type": "graphic",
                    "shaders": { "vertex": "opaque.vert", "fragment": "opaque.frag" },
                    "inputs": [ { "name": "shadowmap", "type": "reference" } ],
                    "outputs": [
                        { "name": "color", "type": "attachment", "format": "FORMAT_B8G8R8A8_UNORM", "clear": true }
                    ]
                },
                {
                    "name": "transparent",
                    "type": "graphic",
                    "shaders": { "vertex": "transparent.vert", "fragment": "transparent.frag" },
                    "inputs": [ { "name": "shadowmap", "type": "reference" } ],
                    "outputs": [ { "name": "color", "type": "reference" } ],
                    "dependencies": [ "opaque" ]
                }
            ]
        }"#,
    )
    .unwrap();

    let instances: Vec<_> = graph
        .nodes()
        .filter(|(_, node)| node.name() == "shadowmap")
        .collect();
    assert_eq!(instances.len(), 1);

    let (shadowmap, node) = instances[0];
    assert!(node.input_subpasses().contains("opaque"));
    assert!(node.input_subpasses().contains("transparent"));

    // Both consumers index the identical handle in their descriptor tables.
    for consumer in ["opaque", "transparent"] {
        let pass = graph.pass(consumer).unwrap();
        assert!(graph.node(pass).binding_sets().unwrap().contains_key(&shadowmap));
    }
}

/// A dependency ring drains the leveling queue early and fails the build.
#[test]
fn test_cycle_detected_at_build_time() {
    init_logs();

    let result = Graph::from_json(
        r#"{
            "name": "ring",
            "subpasses": [
                { "name": "a", "type": "compute", "shaders": { "compute": "a.comp" }, "dependencies": ["c"] },
                { "name": "b", "type": "compute", "shaders": { "compute": "b.comp" }, "dependencies": ["a"] },
                { "name": "c", "type": "compute", "shaders": { "compute": "c.comp" }, "dependencies": ["b"] }
            ]
        }"#,
    );

    match result {
        Err(GraphError::CycleDetected { unvisited }) => assert_eq!(unvisited.len(), 3),
        other => panic!("expected CycleDetected, got {other:?}"),
    }
}

// ============================================================================
// Dependency synthesis
// ============================================================================

/// Two passes sharing one color attachment as output/input produce exactly
/// one read-after-write dependency and nothing else between them.
#[test]
fn test_single_raw_dependency_synthesized() {
    init_logs();

    let desc = RenderGroupDescription::new("chain")
        .with_subpass(
            SubpassDescription::graphic("scene", "scene.vert", "scene.frag").with_output(
                ResourceItem::attachment("scene_color", "FORMAT_B8G8R8A8_UNORM").clear(),
            ),
        )
        .with_subpass(
            SubpassDescription::graphic("post", "quad.vert", "post.frag")
                .with_input(ResourceItem::reference("scene_color"))
                .with_output(
                    ResourceItem::attachment("present", "FORMAT_B8G8R8A8_SRGB").swap_chain(),
                ),
        );
    let graph = Graph::from_description(&desc).unwrap();
    let group = RenderGroup::new(graph);

    let scene = group.graph().pass("scene").unwrap();
    let post = group.graph().pass("post").unwrap();

    let pair_deps: Vec<_> = group
        .dependencies()
        .iter()
        .filter(|dep| !dep.is_boundary())
        .collect();
    assert_eq!(pair_deps.len(), 1);
    assert_eq!(pair_deps[0].src, Some(scene));
    assert_eq!(pair_deps[0].dst, post);
    assert!(pair_deps[0].dst_stages.contains(StageFlags::FRAGMENT_SHADER));

    // The producer level strictly precedes the consumer level.
    let topo = group.graph().topo();
    assert!(topo.level_of(scene) < topo.level_of(post));
}

// ============================================================================
// Binding resolution
// ============================================================================

fn deferred_group() -> RenderGroup {
    let desc = RenderGroupDescription::new("deferred")
        .with_subpass(
            SubpassDescription::graphic("gbuffer", "g.vert", "g.frag")
                .with_input(ResourceItem::buffer("camera").at(0, 0).immutable())
                .with_input(ResourceItem::buffer("objects").at(0, 1).with_size(512))
                .with_output(
                    ResourceItem::attachment("albedo", "FORMAT_B8G8R8A8_UNORM").clear(),
                )
                .with_output(
                    ResourceItem::attachment("depth", "FORMAT_D16_UNORM")
                        .depth_stencil()
                        .clear(),
                ),
        )
        .with_subpass(
            SubpassDescription::graphic("shading", "q.vert", "s.frag")
                .with_input(ResourceItem::reference("albedo"))
                .with_output(
                    ResourceItem::attachment("present", "FORMAT_B8G8R8A8_SRGB").swap_chain(),
                ),
        );
    RenderGroup::new(Graph::from_description(&desc).unwrap())
}

const EXTENT: Extent2d = Extent2d {
    width: 1280,
    height: 720,
};

/// After a successful prepare, every declared slot of every pipeline holds a
/// resource for every frame in flight.
#[rstest]
#[case::double_buffered(2)]
#[case::triple_buffered(3)]
fn test_resolution_fills_every_slot(#[case] frame_count: usize) {
    init_logs();

    let mut group = deferred_group();

    let gbuffer = group.register_pipeline("gbuffer").unwrap();
    gbuffer.bind(0, 0, PhysicalResource::Buffer(BufferResource::new("camera", 128)));
    gbuffer.bind(0, 1, PhysicalResource::Buffer(BufferResource::new("objects", 512)));
    group.register_pipeline("shading").unwrap();

    group
        .prepare(EXTENT, frame_count, &swapchain(EXTENT, frame_count))
        .unwrap();

    for pipeline in ["gbuffer", "shading"] {
        let state = group.draw_state(pipeline).unwrap();
        let pass = state.pass();
        let declared = group.graph().node(pass).binding_sets().unwrap();
        for frame in 0..frame_count {
            let table = state.resolved_table(frame);
            for slot in declared.values() {
                assert!(
                    table.contains_key(&(slot.set, slot.binding)),
                    "{pipeline} frame {frame} missing (set {}, binding {})",
                    slot.set,
                    slot.binding
                );
            }
        }
    }
}

/// An immutable buffer bound only at frame 0 aliases the identical physical
/// allocation for every later frame, so a write through frame 0 is visible
/// through frame 2.
#[test]
fn test_immutable_buffer_aliases_frame_zero() {
    init_logs();

    let mut group = deferred_group();
    let camera = BufferResource::new("camera", 128);

    let gbuffer = group.register_pipeline("gbuffer").unwrap();
    gbuffer.bind(0, 0, PhysicalResource::Buffer(camera.clone()));
    gbuffer.bind(0, 1, PhysicalResource::Buffer(BufferResource::new("objects", 512)));
    group.register_pipeline("shading").unwrap();

    group.prepare(EXTENT, 3, &swapchain(EXTENT, 3)).unwrap();

    let state = group.draw_state("gbuffer").unwrap();
    let frame0 = state.binding(0, 0, 0);
    for frame in 1..3 {
        let aliased = state.binding(frame, 0, 0);
        assert!(
            aliased
                .resource()
                .unwrap()
                .ptr_eq(frame0.resource().unwrap()),
            "frame {frame} should alias frame 0"
        );
    }

    // Visibility through the alias: write via the frame-0 handle, read via
    // the frame-2 binding.
    camera.write(0, &[0xAB]);
    let via_frame2 = state.binding(2, 0, 0);
    let buffer = via_frame2.resource().unwrap().as_buffer().unwrap().clone();
    assert_eq!(buffer.contents()[0], 0xAB);
}

/// A mutable buffer gets an independent clone per frame, seeded with the
/// frame-0 contents at resolution time.
#[test]
fn test_mutable_buffer_cloned_per_frame() {
    init_logs();

    let mut group = deferred_group();
    let objects = BufferResource::new("objects", 512);
    objects.write(0, &[0x5A]);

    let gbuffer = group.register_pipeline("gbuffer").unwrap();
    gbuffer.bind(0, 0, PhysicalResource::Buffer(BufferResource::new("camera", 128)));
    gbuffer.bind(0, 1, PhysicalResource::Buffer(objects.clone()));
    group.register_pipeline("shading").unwrap();

    group.prepare(EXTENT, 3, &swapchain(EXTENT, 3)).unwrap();

    let state = group.draw_state("gbuffer").unwrap();
    let frame0 = state.binding(0, 0, 1);
    for frame in 1..3 {
        let cloned = state.binding(frame, 0, 1);
        assert!(
            !cloned
                .resource()
                .unwrap()
                .ptr_eq(frame0.resource().unwrap()),
            "frame {frame} must own a distinct allocation"
        );
        // Seeded from frame 0.
        let buffer = cloned.resource().unwrap().as_buffer().unwrap().clone();
        assert_eq!(buffer.contents()[0], 0x5A);
    }

    // Mutating frame 2's copy leaves frame 0 untouched.
    let frame2 = state.binding(2, 0, 1);
    frame2
        .resource()
        .unwrap()
        .as_buffer()
        .unwrap()
        .write(0, &[0x11]);
    assert_eq!(objects.contents()[0], 0x5A);
}

/// Attachments resolve to the frame-local image for every frame, including
/// frame 0 - render targets are inherently per-frame.
#[test]
fn test_attachments_resolve_to_frame_local_images() {
    init_logs();

    let mut group = deferred_group();
    let gbuffer = group.register_pipeline("gbuffer").unwrap();
    gbuffer.bind(0, 0, PhysicalResource::Buffer(BufferResource::new("camera", 128)));
    gbuffer.bind(0, 1, PhysicalResource::Buffer(BufferResource::new("objects", 512)));
    group.register_pipeline("shading").unwrap();

    group.prepare(EXTENT, 2, &swapchain(EXTENT, 2)).unwrap();

    // "shading" reads the albedo attachment; its slot 0 is the per-frame image.
    let albedo = group.graph().find_node("albedo").unwrap();
    let images = group.attachment_images(albedo).unwrap().to_vec();
    assert_eq!(images.len(), 2);
    // Read as a pass input, so each frame image carries a sampler.
    assert!(images.iter().all(|frame| frame.sampler.is_some()));

    let state = group.draw_state("shading").unwrap();
    for frame in 0..2 {
        let bound = state.binding(frame, 0, 0);
        let image = bound.resource().unwrap().as_image().unwrap().clone();
        assert!(Arc::ptr_eq(&image, &images[frame].image));
    }
    assert!(!Arc::ptr_eq(&images[0].image, &images[1].image));
}

/// An external buffer never bound at frame 0 is a fatal resolution error.
#[test]
fn test_unbound_external_resource_fails() {
    init_logs();

    let mut group = deferred_group();
    // Bind only the camera; "objects" stays unbound.
    let gbuffer = group.register_pipeline("gbuffer").unwrap();
    gbuffer.bind(0, 0, PhysicalResource::Buffer(BufferResource::new("camera", 128)));
    group.register_pipeline("shading").unwrap();

    match group.prepare(EXTENT, 2, &swapchain(EXTENT, 2)) {
        Err(GraphError::UnresolvedBinding {
            pass,
            set,
            binding,
            frame,
        }) => {
            assert_eq!(pass, "gbuffer");
            assert_eq!((set, binding, frame), (0, 1, 0));
        }
        other => panic!("expected UnresolvedBinding, got {other:?}"),
    }
}

/// Binding a sampler where the description declares a buffer is caught
/// before any descriptor write.
#[test]
fn test_kind_mismatch_is_detected() {
    init_logs();

    let mut group = deferred_group();
    let gbuffer = group.register_pipeline("gbuffer").unwrap();
    gbuffer.bind(0, 0, PhysicalResource::Buffer(BufferResource::new("camera", 128)));
    gbuffer.bind(
        0,
        1,
        PhysicalResource::Sampler(SamplerResource::new("oops")),
    );
    group.register_pipeline("shading").unwrap();

    assert!(matches!(
        group.prepare(EXTENT, 2, &swapchain(EXTENT, 2)),
        Err(GraphError::TypeMismatch { .. })
    ));
}

/// Registering the same pipeline twice is rejected without failing.
#[test]
fn test_duplicate_pipeline_registration_is_non_fatal() {
    init_logs();

    let mut group = deferred_group();
    assert!(group.register_pipeline("gbuffer").is_some());
    assert!(group.register_pipeline("gbuffer").is_none());
    assert!(group.register_pipeline("no_such_subpass").is_none());
    // The original registration survives.
    assert!(group.draw_state("gbuffer").is_some());
}

// ============================================================================
// Reset / re-prepare
// ============================================================================

/// A reset drops every attachment image and re-preparing with a new extent
/// re-resolves all attachment slots to fresh images, while immutable buffer
/// aliases survive untouched.
#[test]
fn test_reset_and_reprepare_after_resize() {
    init_logs();

    let mut group = deferred_group();
    let gbuffer = group.register_pipeline("gbuffer").unwrap();
    gbuffer.bind(0, 0, PhysicalResource::Buffer(BufferResource::new("camera", 128)));
    gbuffer.bind(0, 1, PhysicalResource::Buffer(BufferResource::new("objects", 512)));
    group.register_pipeline("shading").unwrap();

    group.prepare(EXTENT, 2, &swapchain(EXTENT, 2)).unwrap();

    let shading = group.draw_state("shading").unwrap();
    let old_image = shading
        .binding(1, 0, 0)
        .resource()
        .unwrap()
        .as_image()
        .unwrap()
        .clone();
    let gbuffer = group.draw_state("gbuffer").unwrap();
    let camera_before = gbuffer.binding(1, 0, 0).resource().unwrap().clone();

    // Device-idle wait happens outside the group; then resize.
    group.reset();
    let resized = Extent2d::new(2560, 1440);
    group.prepare(resized, 2, &swapchain(resized, 2)).unwrap();

    let shading = group.draw_state("shading").unwrap();
    for frame in 0..2 {
        let image = shading
            .binding(frame, 0, 0)
            .resource()
            .unwrap()
            .as_image()
            .unwrap()
            .clone();
        assert_eq!(image.extent(), resized);
        assert!(!Arc::ptr_eq(&image, &old_image));
    }

    // Immutable binding survived the reset without reallocation.
    let gbuffer = group.draw_state("gbuffer").unwrap();
    let camera_after = gbuffer.binding(1, 0, 0);
    assert!(camera_after.resource().unwrap().ptr_eq(&camera_before));
}
