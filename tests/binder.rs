use std::collections::HashSet;

use anyhow::Result;
use ash::vk;
use ash::vk::Handle;

use strata::prelude::*;

mod framework;

use framework::MockDevice;

/// Image writes of the descriptor sets of one pipeline, per frame.
fn image_views(device: &MockDevice, sets: &[vk::DescriptorSet], binding: u32) -> Vec<vk::ImageView> {
    sets.iter()
        .map(|&set| {
            device
                .descriptor_writes()
                .into_iter()
                .rev()
                .find(|w| w.set() == set && w.binding() == binding)
                .and_then(|w| w.image_view())
                .unwrap()
        })
        .collect()
}

#[test]
pub fn sampled_attachments_bind_resolve_views() -> Result<()> {
    let device = MockDevice::new();
    let graph = framework::build_four_pass(&device, framework::surface(3, 800, 600))?;

    let scene_color = graph.attachment("scene_pass", "scene_color")?.unwrap();
    let tonemap = graph.pipeline("postprocess_pass", "tonemap")?;
    assert_eq!(image_views(&device, &tonemap.descriptor_sets, 0), scene_color.resolve_views);

    let composite = graph.pipeline("composite_pass", "composite")?;
    assert_eq!(image_views(&device, &composite.descriptor_sets, 0), graph.attachment("postprocess_pass", "post_color")?.unwrap().views);
    assert_eq!(image_views(&device, &composite.descriptor_sets, 1), graph.attachment("ui_pass", "ui_color")?.unwrap().views);

    let sampler = scene_color.sampler.unwrap();
    for write in device.descriptor_writes() {
        if let DescriptorWrite::Image {
            set,
            info,
            ty,
            ..
        } = write
        {
            assert_eq!(ty, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
            assert_eq!(info.image_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
            if tonemap.descriptor_sets.contains(&set) {
                assert_eq!(info.sampler, sampler);
            }
        }
    }
    Ok(())
}

#[test]
pub fn uniform_buffers_are_bound_per_frame() -> Result<()> {
    let device = MockDevice::new();
    let graph = framework::build_four_pass(&device, framework::surface(3, 800, 600))?;
    let mesh = graph.pipeline("scene_pass", "mesh")?;
    let writes = device.descriptor_writes();
    let buffers = mesh
        .descriptor_sets
        .iter()
        .map(|&set| writes.iter().find(|w| w.set() == set && w.binding() == 0).and_then(|w| w.buffer()).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(buffers, vec![vk::Buffer::from_raw(0xB000_0001), vk::Buffer::from_raw(0xB000_0002)]);
    // Binding 1 of the mesh pipeline has no resource and is left to the scene.
    assert!(!writes.iter().any(|w| mesh.descriptor_sets.contains(&w.set()) && w.binding() == 1));
    Ok(())
}

#[test]
pub fn recreate_rebinds_to_new_images() -> Result<()> {
    let device = MockDevice::new();
    let mut graph = framework::build_four_pass(&device, framework::surface(3, 800, 600))?;
    let old_views = graph
        .attachments()
        .iter()
        .flat_map(|a| a.images.iter().chain(a.resolve_images.iter()))
        .map(|i| i.view)
        .collect::<HashSet<_>>();
    let old_images = graph
        .attachments()
        .iter()
        .flat_map(|a| a.images.iter().chain(a.resolve_images.iter()))
        .map(|i| i.image)
        .collect::<Vec<_>>();

    device.clear_calls();
    graph.recreate(framework::surface(3, 1920, 1080))?;

    assert!(old_images.iter().all(|&i| !device.is_alive(i)));
    let writes = device.descriptor_writes();
    assert!(!writes.is_empty());
    for view in writes.iter().filter_map(DescriptorWrite::image_view) {
        assert!(!old_views.contains(&view), "descriptor still points at a destroyed view");
    }

    let tonemap = graph.pipeline("postprocess_pass", "tonemap")?;
    let scene_color = graph.attachment("scene_pass", "scene_color")?.unwrap();
    assert_eq!(image_views(&device, &tonemap.descriptor_sets, 0), scene_color.resolve_views);
    assert_eq!(scene_color.extent, vk::Extent2D { width: 1920, height: 1080 });
    Ok(())
}

#[test]
pub fn recreate_keeps_pipelines_and_render_passes() -> Result<()> {
    let device = MockDevice::new();
    let mut graph = framework::build_four_pass(&device, framework::surface(3, 800, 600))?;
    let pipeline = graph.pipeline("scene_pass", "mesh")?.pipeline;
    let render_pass = graph.render_target("scene_pass")?.render_pass;
    let sets = graph.pipeline("scene_pass", "mesh")?.descriptor_sets.clone();

    graph.recreate(framework::surface(2, 640, 480))?;
    assert_eq!(graph.pipeline("scene_pass", "mesh")?.pipeline, pipeline);
    assert_eq!(graph.render_target("scene_pass")?.render_pass, render_pass);
    assert_eq!(graph.pipeline("scene_pass", "mesh")?.descriptor_sets, sets);
    assert!(device.is_alive(pipeline));
    // The terminal pass follows the new image count.
    assert_eq!(graph.render_target("composite_pass")?.framebuffers.len(), 2);
    Ok(())
}

#[test]
pub fn missing_external_resource_is_reported() {
    let device = MockDevice::new();
    let err = RenderGraph::build(
        device.clone(),
        &framework::four_pass_description(),
        framework::surface(2, 800, 600),
        framework::settings(),
        &framework::loader(),
        ResourceRegistry::new(),
        framework::executors::<()>(),
    )
    .unwrap_err();
    match err.downcast_ref::<Error>() {
        Some(Error::ResourceNotFound {
            pass,
            pipeline,
            resource,
        }) => {
            assert_eq!(pass, "scene_pass");
            assert_eq!(pipeline, "mesh");
            assert_eq!(resource, "camera");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(device.live_objects(), 0);
}

const EXTERNAL: &str = r#"[{
    "name": "main",
    "outputs": [{ "name": "swapchain", "kind": "Color", "format": "VK_FORMAT_B8G8R8A8_SRGB" }],
    "pipelineGroups": [[{
        "name": "lit",
        "shaderVert": "lit.vert.spv",
        "shaderFrag": "lit.frag.spv",
        "descriptorSets": [{ "bindings": [
            { "binding": 0, "type": "VK_DESCRIPTOR_TYPE_COMBINED_IMAGE_SAMPLER", "stage": "FRAGMENT", "resource": "albedo" },
            { "binding": 1, "type": "VK_DESCRIPTOR_TYPE_STORAGE_BUFFER", "stage": "VERTEX|FRAGMENT", "resource": "lights" },
            { "binding": 2, "type": "VK_DESCRIPTOR_TYPE_UNIFORM_BUFFER_DYNAMIC", "stage": "VERTEX", "resource": "objects" }
        ]}]
    }]]
}]"#;

fn external_registry(lights: u64) -> ResourceRegistry {
    let mut registry = ResourceRegistry::new();
    registry
        .add_texture("albedo", vk::ImageView::from_raw(0xA000_0001), vk::Sampler::from_raw(0xA000_0002))
        .unwrap();
    registry
        .add_storage_buffers("lights", vec![BufferBinding::whole(vk::Buffer::from_raw(lights))])
        .unwrap();
    registry
        .add_uniform_buffers("objects", vec![BufferBinding::new(vk::Buffer::from_raw(0xC000_0001), 0, 256)])
        .unwrap();
    registry
}

fn build_external(device: &std::sync::Arc<MockDevice>, registry: ResourceRegistry) -> Result<RenderGraph<MockDevice>> {
    let mut executors = PipelineExecutors::<MockDevice, ()>::new();
    executors.register_fn("lit", |cmd, _ctx, _scene| Ok(cmd.draw(3, 1, 0, 0)));
    RenderGraph::build(
        device.clone(),
        &GraphDescription::from_json(EXTERNAL)?,
        framework::surface(2, 800, 600),
        framework::settings(),
        &framework::loader(),
        registry,
        executors,
    )
}

#[test]
pub fn external_resources_are_bound() -> Result<()> {
    let device = MockDevice::new();
    let graph = build_external(&device, external_registry(0xD000_0001))?;
    let sets = graph.pipeline("main", "lit")?.descriptor_sets.clone();
    assert_eq!(sets.len(), 2);

    let writes = device.descriptor_writes();
    for set in sets {
        let of_set = writes.iter().filter(|w| w.set() == set).collect::<Vec<_>>();
        assert_eq!(of_set.len(), 3);
        assert_eq!(of_set[0].image_view(), Some(vk::ImageView::from_raw(0xA000_0001)));
        assert_eq!(of_set[1].buffer(), Some(vk::Buffer::from_raw(0xD000_0001)));
        match of_set[2] {
            DescriptorWrite::Buffer {
                ty,
                info,
                ..
            } => {
                assert_eq!(*ty, vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC);
                assert_eq!(info.range, 256);
            }
            other => panic!("unexpected write {other:?}"),
        }
    }
    Ok(())
}

#[test]
pub fn replacing_the_provider_rebinds() -> Result<()> {
    let device = MockDevice::new();
    let mut graph = build_external(&device, external_registry(0xD000_0001))?;
    device.clear_calls();
    graph.set_resource_provider(external_registry(0xD000_0002))?;
    let lights = device
        .descriptor_writes()
        .into_iter()
        .filter(|w| w.binding() == 1)
        .map(|w| w.buffer())
        .collect::<Vec<_>>();
    assert_eq!(lights, vec![Some(vk::Buffer::from_raw(0xD000_0002)); 2]);

    // Removing a resource fails the next rebind.
    let mut registry = external_registry(0xD000_0002);
    assert!(registry.remove("albedo"));
    let err = graph.set_resource_provider(registry).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ResourceNotFound { resource, .. }) if resource == "albedo"));
    Ok(())
}

const SAME_NAMES: &str = r#"[{
    "name": "main",
    "outputs": [{ "name": "swapchain", "kind": "Color", "format": "VK_FORMAT_B8G8R8A8_SRGB" }],
    "pipelineGroups": [
        [{ "name": "first", "shaderVert": "fs.vert.spv", "shaderFrag": "a.frag.spv",
           "descriptorSets": [{ "bindings": [{ "binding": 0, "type": "VK_DESCRIPTOR_TYPE_COMBINED_IMAGE_SAMPLER", "stage": "FRAGMENT", "resource": "albedo" }] }] }],
        [{ "name": "second", "shaderVert": "fs.vert.spv", "shaderFrag": "b.frag.spv",
           "descriptorSets": [{ "bindings": [{ "binding": 0, "type": "VK_DESCRIPTOR_TYPE_COMBINED_IMAGE_SAMPLER", "stage": "FRAGMENT", "resource": "albedo" }] }] }]
    ]
}]"#;

#[test]
pub fn every_pipeline_of_a_pass_is_written() -> Result<()> {
    let device = MockDevice::new();
    let mut passes = GraphDescription::from_json(SAME_NAMES)?.parse()?;
    // Parsed descriptions reject this, but hand built passes can still share a pipeline name.
    passes[0].pipeline_groups[1][0].name = "first".to_owned();
    let mut executors = PipelineExecutors::<MockDevice, ()>::new();
    executors.register_fn("first", |cmd, _ctx, _scene| Ok(cmd.draw(3, 1, 0, 0)));
    let _graph = RenderGraph::from_passes(
        device.clone(),
        passes,
        framework::surface(2, 800, 600),
        framework::settings(),
        &framework::loader(),
        external_registry(0xD000_0001),
        executors,
    )?;

    let written = device
        .descriptor_writes()
        .iter()
        .map(DescriptorWrite::set)
        .collect::<HashSet<_>>();
    // Two pipelines with one set per frame in flight.
    assert_eq!(written.len(), 4);
    Ok(())
}
