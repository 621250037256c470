#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once};

use anyhow::Result;
use ash::vk;
use ash::vk::Handle;

use strata::command_buffer::{CommandBufferBeginInfo, RenderPassBeginInfo};
use strata::descriptor::{DescriptorPoolSize, DescriptorWrite};
use strata::device::{AllocatedImage, DeviceInterface, FramebufferCreateInfo, ImageCreateInfo, RenderPassCreateInfo};
use strata::pipeline::{DescriptorSetLayoutCreateInfo, PipelineCreateInfo, PipelineLayoutCreateInfo};
use strata::prelude::*;

/// Every call the graph made on a [`MockDevice`], in order.
#[derive(Debug, Clone)]
pub enum Call {
    CreateImage { info: ImageCreateInfo, image: AllocatedImage },
    DestroyImage(vk::Image),
    CreateRenderPass { render_pass: vk::RenderPass, info: RenderPassCreateInfo },
    DestroyRenderPass(vk::RenderPass),
    CreateFramebuffer { framebuffer: vk::Framebuffer, info: FramebufferCreateInfo },
    DestroyFramebuffer(vk::Framebuffer),
    CreateSampler(vk::Sampler),
    DestroySampler(vk::Sampler),
    CreateShaderModule(vk::ShaderModule),
    DestroyShaderModule(vk::ShaderModule),
    CreateSetLayout(vk::DescriptorSetLayout),
    DestroySetLayout(vk::DescriptorSetLayout),
    CreatePipelineLayout { layout: vk::PipelineLayout, info: PipelineLayoutCreateInfo },
    DestroyPipelineLayout(vk::PipelineLayout),
    CreatePipeline { pipeline: vk::Pipeline, name: String, samples: vk::SampleCountFlags, render_pass: vk::RenderPass },
    DestroyPipeline(vk::Pipeline),
    CreateDescriptorPool { pool: vk::DescriptorPool, total: u32, max_sets: u32 },
    DestroyDescriptorPool(vk::DescriptorPool),
    AllocateDescriptorSets(Vec<vk::DescriptorSet>),
    UpdateDescriptorSets(Vec<DescriptorWrite>),
    CreateCommandPool(vk::CommandPool),
    DestroyCommandPool(vk::CommandPool),
    AllocateCommandBuffers { level: vk::CommandBufferLevel, buffers: Vec<vk::CommandBuffer> },
    ResetCommandBuffer(vk::CommandBuffer),
    Begin { cmd: vk::CommandBuffer, info: CommandBufferBeginInfo },
    End(vk::CommandBuffer),
    BeginRenderPass { cmd: vk::CommandBuffer, render_pass: vk::RenderPass, framebuffer: vk::Framebuffer, contents: vk::SubpassContents },
    EndRenderPass(vk::CommandBuffer),
    ExecuteCommands { cmd: vk::CommandBuffer, secondaries: Vec<vk::CommandBuffer> },
    BindPipeline { cmd: vk::CommandBuffer, pipeline: vk::Pipeline },
    SetViewport { cmd: vk::CommandBuffer, viewport: vk::Viewport },
    SetScissor { cmd: vk::CommandBuffer, scissor: vk::Rect2D },
    BindDescriptorSets { cmd: vk::CommandBuffer, sets: Vec<vk::DescriptorSet> },
    PushConstants { cmd: vk::CommandBuffer, size: usize },
    BindVertexBuffers(vk::CommandBuffer),
    BindIndexBuffer(vk::CommandBuffer),
    Draw { cmd: vk::CommandBuffer, vertex_count: u32 },
    DrawIndexed { cmd: vk::CommandBuffer, index_count: u32 },
    SetDebugName(String),
    BeginLabel { cmd: vk::CommandBuffer, name: String },
    EndLabel(vk::CommandBuffer),
}

/// A device that records calls and mints unique handles instead of talking to a GPU.
#[derive(Debug, Default)]
pub struct MockDevice {
    next_handle: AtomicU64,
    calls: Mutex<Vec<Call>>,
    live: Mutex<HashSet<u64>>,
    failures: Mutex<HashSet<&'static str>>,
}

impl MockDevice {
    pub fn new() -> Arc<Self> {
        init_logging();
        Arc::new(Self {
            next_handle: AtomicU64::new(1),
            ..Default::default()
        })
    }

    fn handle<H: Handle>(&self) -> H {
        H::from_raw(self.next_handle.fetch_add(1, Ordering::SeqCst))
    }

    /// A fresh handle that tracks as a live object until destroyed.
    fn create<H: Handle + Copy>(&self) -> H {
        let handle = self.handle::<H>();
        self.live.lock().unwrap().insert(handle.as_raw());
        handle
    }

    fn release<H: Handle + Copy>(&self, handle: H) {
        let removed = self.live.lock().unwrap().remove(&handle.as_raw());
        assert!(removed, "destroyed {:?} {:#x} that is not alive", H::TYPE, handle.as_raw());
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, op: &'static str) -> Result<()> {
        if self.failures.lock().unwrap().contains(op) {
            Err(strata::Error::VkError(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY).into())
        } else {
            Ok(())
        }
    }

    /// Make every following call to `op` fail.
    pub fn fail(&self, op: &'static str) {
        self.failures.lock().unwrap().insert(op);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Number of objects created and not yet destroyed.
    pub fn live_objects(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    pub fn is_alive<H: Handle>(&self, handle: H) -> bool {
        self.live.lock().unwrap().contains(&handle.as_raw())
    }

    /// All descriptor writes issued so far, flattened.
    pub fn descriptor_writes(&self) -> Vec<DescriptorWrite> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::UpdateDescriptorSets(writes) => Some(writes),
                _ => None,
            })
            .flatten()
            .collect()
    }

    pub fn created_images(&self) -> Vec<(ImageCreateInfo, AllocatedImage)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CreateImage {
                    info,
                    image,
                } => Some((info, image)),
                _ => None,
            })
            .collect()
    }
}

impl DeviceInterface for MockDevice {
    fn create_image(&self, info: &ImageCreateInfo) -> Result<AllocatedImage> {
        self.check("create_image")?;
        let image = AllocatedImage {
            image: self.create(),
            view: self.handle(),
            format: info.format,
            extent: info.extent,
            samples: info.samples,
        };
        self.push(Call::CreateImage {
            info: info.clone(),
            image,
        });
        Ok(image)
    }

    fn destroy_image(&self, image: &AllocatedImage) {
        self.release(image.image);
        self.push(Call::DestroyImage(image.image));
    }

    fn create_render_pass(&self, info: &RenderPassCreateInfo) -> Result<vk::RenderPass> {
        self.check("create_render_pass")?;
        let render_pass = self.create();
        self.push(Call::CreateRenderPass {
            render_pass,
            info: info.clone(),
        });
        Ok(render_pass)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.release(render_pass);
        self.push(Call::DestroyRenderPass(render_pass));
    }

    fn create_framebuffer(&self, info: &FramebufferCreateInfo) -> Result<vk::Framebuffer> {
        self.check("create_framebuffer")?;
        let framebuffer = self.create();
        self.push(Call::CreateFramebuffer {
            framebuffer,
            info: info.clone(),
        });
        Ok(framebuffer)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.release(framebuffer);
        self.push(Call::DestroyFramebuffer(framebuffer));
    }

    fn create_sampler(&self, _info: &SamplerCreateInfo) -> Result<vk::Sampler> {
        self.check("create_sampler")?;
        let sampler = self.create();
        self.push(Call::CreateSampler(sampler));
        Ok(sampler)
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        self.release(sampler);
        self.push(Call::DestroySampler(sampler));
    }

    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule> {
        self.check("create_shader_module")?;
        assert!(!code.is_empty());
        let module = self.create();
        self.push(Call::CreateShaderModule(module));
        Ok(module)
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.release(module);
        self.push(Call::DestroyShaderModule(module));
    }

    fn create_descriptor_set_layout(&self, _info: &DescriptorSetLayoutCreateInfo) -> Result<vk::DescriptorSetLayout> {
        self.check("create_descriptor_set_layout")?;
        let layout = self.create();
        self.push(Call::CreateSetLayout(layout));
        Ok(layout)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.release(layout);
        self.push(Call::DestroySetLayout(layout));
    }

    fn create_pipeline_layout(&self, info: &PipelineLayoutCreateInfo) -> Result<vk::PipelineLayout> {
        self.check("create_pipeline_layout")?;
        let layout = self.create();
        self.push(Call::CreatePipelineLayout {
            layout,
            info: info.clone(),
        });
        Ok(layout)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.release(layout);
        self.push(Call::DestroyPipelineLayout(layout));
    }

    fn create_graphics_pipeline(&self, info: &PipelineCreateInfo, _layout: vk::PipelineLayout, render_pass: vk::RenderPass) -> Result<vk::Pipeline> {
        self.check("create_graphics_pipeline")?;
        let pipeline = self.create();
        self.push(Call::CreatePipeline {
            pipeline,
            name: info.name().to_owned(),
            samples: info.samples(),
            render_pass,
        });
        Ok(pipeline)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.release(pipeline);
        self.push(Call::DestroyPipeline(pipeline));
    }

    fn create_descriptor_pool(&self, size: &DescriptorPoolSize, max_sets: u32) -> Result<vk::DescriptorPool> {
        self.check("create_descriptor_pool")?;
        let pool = self.create();
        self.push(Call::CreateDescriptorPool {
            pool,
            total: size.total(),
            max_sets,
        });
        Ok(pool)
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.release(pool);
        self.push(Call::DestroyDescriptorPool(pool));
    }

    fn allocate_descriptor_sets(&self, _pool: vk::DescriptorPool, layouts: &[vk::DescriptorSetLayout]) -> Result<Vec<vk::DescriptorSet>> {
        self.check("allocate_descriptor_sets")?;
        let sets = layouts.iter().map(|_| self.handle()).collect::<Vec<_>>();
        self.push(Call::AllocateDescriptorSets(sets.clone()));
        Ok(sets)
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) {
        self.push(Call::UpdateDescriptorSets(writes.to_vec()));
    }

    fn create_command_pool(&self) -> Result<vk::CommandPool> {
        self.check("create_command_pool")?;
        let pool = self.create();
        self.push(Call::CreateCommandPool(pool));
        Ok(pool)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.release(pool);
        self.push(Call::DestroyCommandPool(pool));
    }

    fn allocate_command_buffers(&self, _pool: vk::CommandPool, level: vk::CommandBufferLevel, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        self.check("allocate_command_buffers")?;
        let buffers = (0..count).map(|_| self.handle()).collect::<Vec<_>>();
        self.push(Call::AllocateCommandBuffers {
            level,
            buffers: buffers.clone(),
        });
        Ok(buffers)
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        self.check("reset_command_buffer")?;
        self.push(Call::ResetCommandBuffer(cmd));
        Ok(())
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer, info: &CommandBufferBeginInfo) -> Result<()> {
        self.check("begin_command_buffer")?;
        self.push(Call::Begin {
            cmd,
            info: *info,
        });
        Ok(())
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        self.check("end_command_buffer")?;
        self.push(Call::End(cmd));
        Ok(())
    }

    fn cmd_begin_render_pass(&self, cmd: vk::CommandBuffer, info: &RenderPassBeginInfo, contents: vk::SubpassContents) {
        self.push(Call::BeginRenderPass {
            cmd,
            render_pass: info.render_pass,
            framebuffer: info.framebuffer,
            contents,
        });
    }

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        self.push(Call::EndRenderPass(cmd));
    }

    fn cmd_execute_commands(&self, cmd: vk::CommandBuffer, secondaries: &[vk::CommandBuffer]) {
        self.push(Call::ExecuteCommands {
            cmd,
            secondaries: secondaries.to_vec(),
        });
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.push(Call::BindPipeline {
            cmd,
            pipeline,
        });
    }

    fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewport: vk::Viewport) {
        self.push(Call::SetViewport {
            cmd,
            viewport,
        });
    }

    fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissor: vk::Rect2D) {
        self.push(Call::SetScissor {
            cmd,
            scissor,
        });
    }

    fn cmd_bind_descriptor_sets(&self, cmd: vk::CommandBuffer, _layout: vk::PipelineLayout, _first_set: u32, sets: &[vk::DescriptorSet], _dynamic_offsets: &[u32]) {
        self.push(Call::BindDescriptorSets {
            cmd,
            sets: sets.to_vec(),
        });
    }

    fn cmd_push_constants(&self, cmd: vk::CommandBuffer, _layout: vk::PipelineLayout, _stages: vk::ShaderStageFlags, _offset: u32, data: &[u8]) {
        self.push(Call::PushConstants {
            cmd,
            size: data.len(),
        });
    }

    fn cmd_bind_vertex_buffers(&self, cmd: vk::CommandBuffer, _first_binding: u32, _buffers: &[vk::Buffer], _offsets: &[vk::DeviceSize]) {
        self.push(Call::BindVertexBuffers(cmd));
    }

    fn cmd_bind_index_buffer(&self, cmd: vk::CommandBuffer, _buffer: vk::Buffer, _offset: vk::DeviceSize, _ty: vk::IndexType) {
        self.push(Call::BindIndexBuffer(cmd));
    }

    fn cmd_draw(&self, cmd: vk::CommandBuffer, vertex_count: u32, _instance_count: u32, _first_vertex: u32, _first_instance: u32) {
        self.push(Call::Draw {
            cmd,
            vertex_count,
        });
    }

    fn cmd_draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32, _instance_count: u32, _first_index: u32, _vertex_offset: i32, _first_instance: u32) {
        self.push(Call::DrawIndexed {
            cmd,
            index_count,
        });
    }

    fn set_debug_name(&self, _object: vk::ObjectType, _handle: u64, name: &str) -> Result<()> {
        self.push(Call::SetDebugName(name.to_owned()));
        Ok(())
    }

    fn cmd_begin_label(&self, cmd: vk::CommandBuffer, name: &str, _color: [f32; 4]) {
        self.push(Call::BeginLabel {
            cmd,
            name: name.to_owned(),
        });
    }

    fn cmd_end_label(&self, cmd: vk::CommandBuffer) {
        self.push(Call::EndLabel(cmd));
    }
}

static LOGGER: Once = Once::new();

pub fn init_logging() {
    LOGGER.call_once(|| {
        let _ = pretty_env_logger::try_init();
    });
}

/// Shader loader returning a minimal SPIR-V header for any location.
pub fn loader() -> impl ShaderLoader {
    |location: &str| -> Result<Vec<u32>> {
        if location.is_empty() {
            anyhow::bail!("empty shader location");
        }
        Ok(vec![0x0723_0203, 0x0001_0000, 0, 1, 0])
    }
}

pub fn surface(images: usize, width: u32, height: u32) -> SurfaceInfo {
    SurfaceInfo {
        format: vk::Format::B8G8R8A8_SRGB,
        extent: vk::Extent2D {
            width,
            height,
        },
        views: (0..images).map(|i| vk::ImageView::from_raw(0xF000_0000 + (width as u64) * 16 + i as u64)).collect(),
    }
}

pub fn settings() -> GraphSettings {
    GraphSettingsBuilder::new()
        .frames_in_flight(2)
        .msaa_samples(vk::SampleCountFlags::TYPE_4)
        .build()
}

/// A pass without pipelines that writes a single color output.
pub fn pass(name: &str, inputs: &[&str], outputs: &[&str]) -> PassSpec {
    PassSpec {
        name: name.to_owned(),
        uses_multisampling: false,
        inputs: inputs.iter().map(|s| s.to_string()).collect(),
        outputs: outputs
            .iter()
            .map(|o| OutputSpec {
                name: o.to_string(),
                kind: ResourceKind::Color,
                format: vk::Format::R8G8B8A8_UNORM,
                clear: None,
                consumed: false,
            })
            .collect(),
        pipeline_groups: vec![],
        extent: None,
    }
}

/// Four passes: a multisampled scene, a postprocess reading the scene, an independent ui pass and a composite of both.
pub const FOUR_PASS_GRAPH: &str = r#"[
    {
        "name": "scene_pass",
        "useMultisampling": true,
        "inputs": [],
        "outputs": [
            { "name": "scene_color", "kind": "Color", "format": "VK_FORMAT_R16G16B16A16_SFLOAT", "consumed": true },
            { "name": "scene_depth", "kind": "Depth", "format": "VK_FORMAT_D32_SFLOAT", "consumed": true }
        ],
        "pipelineGroups": [
            [{
                "name": "mesh",
                "shaderVert": "mesh.vert.spv",
                "shaderFrag": "mesh.frag.spv",
                "descriptorSets": [{ "bindings": [
                    { "binding": 0, "type": "VK_DESCRIPTOR_TYPE_UNIFORM_BUFFER", "stage": "VERTEX", "resource": "camera" },
                    { "binding": 1, "type": "VK_DESCRIPTOR_TYPE_COMBINED_IMAGE_SAMPLER", "stage": "FRAGMENT" }
                ]}],
                "vertexInput": { "stride": 20, "attributes": [
                    { "name": "position", "format": "Vec3", "location": 0, "offset": 0 },
                    { "name": "uv", "format": "Vec2", "location": 1, "offset": 12 }
                ]},
                "depthState": { "testEnable": true, "writeEnable": true },
                "pushConstantSize": 64
            }],
            [{
                "name": "skybox",
                "shaderVert": "skybox.vert.spv",
                "shaderFrag": "skybox.frag.spv",
                "depthState": { "testEnable": true, "writeEnable": false, "compareOp": "LESS_OR_EQUAL" },
                "rasterState": { "cullMode": "NONE" }
            }]
        ]
    },
    {
        "name": "postprocess_pass",
        "inputs": ["scene_color"],
        "outputs": [{ "name": "post_color", "kind": "Color", "format": "VK_FORMAT_R8G8B8A8_UNORM" }],
        "pipelineGroups": [[{
            "name": "tonemap",
            "shaderVert": "fullscreen.vert.spv",
            "shaderFrag": "tonemap.frag.spv",
            "descriptorSets": [{ "bindings": [
                { "binding": 0, "type": "VK_DESCRIPTOR_TYPE_COMBINED_IMAGE_SAMPLER", "stage": "FRAGMENT", "resource": "scene_color" }
            ]}],
            "rasterState": { "cullMode": "NONE" }
        }]]
    },
    {
        "name": "ui_pass",
        "inputs": [],
        "outputs": [{ "name": "ui_color", "kind": "Color", "format": "VK_FORMAT_R8G8B8A8_UNORM" }],
        "pipelineGroups": [[{
            "name": "ui",
            "shaderVert": "ui.vert.spv",
            "shaderFrag": "ui.frag.spv",
            "enableBlending": true,
            "rasterState": { "cullMode": "NONE" }
        }]]
    },
    {
        "name": "composite_pass",
        "inputs": ["post_color", "ui_color"],
        "outputs": [{ "name": "swapchain_color", "kind": "Color", "format": "VK_FORMAT_B8G8R8A8_SRGB" }],
        "pipelineGroups": [[{
            "name": "composite",
            "shaderVert": "fullscreen.vert.spv",
            "shaderFrag": "composite.frag.spv",
            "descriptorSets": [{ "bindings": [
                { "binding": 0, "type": "VK_DESCRIPTOR_TYPE_COMBINED_IMAGE_SAMPLER", "stage": "FRAGMENT", "resource": "post_color" },
                { "binding": 1, "type": "VK_DESCRIPTOR_TYPE_COMBINED_IMAGE_SAMPLER", "stage": "FRAGMENT", "resource": "ui_color" }
            ]}],
            "rasterState": { "cullMode": "NONE" }
        }]]
    }
]"#;

pub const PIPELINES: [&str; 5] = ["mesh", "skybox", "tonemap", "ui", "composite"];

pub fn four_pass_description() -> GraphDescription {
    GraphDescription::from_json(FOUR_PASS_GRAPH).unwrap()
}

/// Registry with the camera uniform buffer of the four pass graph.
pub fn registry() -> ResourceRegistry {
    let mut registry = ResourceRegistry::new();
    registry
        .add_uniform_buffers(
            "camera",
            vec![
                BufferBinding::whole(vk::Buffer::from_raw(0xB000_0001)),
                BufferBinding::whole(vk::Buffer::from_raw(0xB000_0002)),
            ],
        )
        .unwrap();
    registry
}

/// Executors drawing a fullscreen triangle for every pipeline of the four pass graph.
pub fn executors<U: 'static>() -> PipelineExecutors<MockDevice, U> {
    let mut executors = PipelineExecutors::<MockDevice, U>::new();
    for name in PIPELINES {
        executors.register_fn(name, |cmd, ctx, _scene| {
            let cmd = match ctx.descriptor_set {
                Some(set) => cmd.bind_descriptor_set(0, set)?,
                None => cmd,
            };
            Ok(cmd.draw(3, 1, 0, 0))
        });
    }
    executors
}

pub fn build_four_pass(device: &Arc<MockDevice>, surface: SurfaceInfo) -> Result<RenderGraph<MockDevice>> {
    RenderGraph::build(
        device.clone(),
        &four_pass_description(),
        surface,
        settings(),
        &loader(),
        registry(),
        executors(),
    )
}
