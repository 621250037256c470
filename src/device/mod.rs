//! The device interface is the only way the render graph talks to the GPU. Every object the graph creates,
//! and every command it records, goes through [`DeviceInterface`]. [`VulkanDevice`](crate::VulkanDevice) implements
//! it on top of `ash` and `gpu-allocator`. Other implementations can wrap an existing engine device, or record calls
//! for testing.
//!
//! All handle types are plain `ash` handles. The graph owns every handle it receives and hands it back through the
//! matching `destroy_*` call exactly once.

use anyhow::Result;
use ash::vk;

use crate::command_buffer::{CommandBufferBeginInfo, RenderPassBeginInfo};
use crate::descriptor::{DescriptorPoolSize, DescriptorWrite};
use crate::pipeline::{DescriptorSetLayoutCreateInfo, PipelineCreateInfo, PipelineLayoutCreateInfo};
use crate::resource::SamplerCreateInfo;

pub mod vulkan;

/// Describes a 2D render target image together with its default view.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCreateInfo {
    pub extent: vk::Extent2D,
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub usage: vk::ImageUsageFlags,
    pub aspect: vk::ImageAspectFlags,
}

/// An image with bound memory and a view covering the whole image.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AllocatedImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub samples: vk::SampleCountFlags,
}

/// Describes a single-subpass render pass.
#[derive(Debug, Clone)]
pub struct RenderPassCreateInfo {
    /// All attachments, ordered color, resolve, depth.
    pub attachments: Vec<vk::AttachmentDescription>,
    pub color_refs: Vec<vk::AttachmentReference>,
    /// Empty, or exactly as long as `color_refs`.
    pub resolve_refs: Vec<vk::AttachmentReference>,
    pub depth_ref: Option<vk::AttachmentReference>,
    pub dependencies: Vec<vk::SubpassDependency>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FramebufferCreateInfo {
    pub render_pass: vk::RenderPass,
    /// Views in the same order as the render pass attachments.
    pub attachments: Vec<vk::ImageView>,
    pub extent: vk::Extent2D,
}

/// Abstraction over the GPU device used by the render graph.
///
/// Methods take `&self` so a device can be shared between the graph and the rest of an engine, and between
/// recording threads. Implementations must be internally synchronized.
pub trait DeviceInterface: Send + Sync {
    /// Create a 2D image, allocate and bind device local memory for it, and create a view.
    fn create_image(&self, info: &ImageCreateInfo) -> Result<AllocatedImage>;
    /// Destroy the view and image and free its memory.
    fn destroy_image(&self, image: &AllocatedImage);

    fn create_render_pass(&self, info: &RenderPassCreateInfo) -> Result<vk::RenderPass>;
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    fn create_framebuffer(&self, info: &FramebufferCreateInfo) -> Result<vk::Framebuffer>;
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    fn create_sampler(&self, info: &SamplerCreateInfo) -> Result<vk::Sampler>;
    fn destroy_sampler(&self, sampler: vk::Sampler);

    /// Create a shader module from SPIR-V words.
    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule>;
    fn destroy_shader_module(&self, module: vk::ShaderModule);

    fn create_descriptor_set_layout(&self, info: &DescriptorSetLayoutCreateInfo) -> Result<vk::DescriptorSetLayout>;
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    fn create_pipeline_layout(&self, info: &PipelineLayoutCreateInfo) -> Result<vk::PipelineLayout>;
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);

    /// Create a graphics pipeline for subpass 0 of `render_pass`. The shader modules in `info` stay owned by the caller.
    fn create_graphics_pipeline(
        &self,
        info: &PipelineCreateInfo,
        layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
    ) -> Result<vk::Pipeline>;
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    fn create_descriptor_pool(&self, size: &DescriptorPoolSize, max_sets: u32) -> Result<vk::DescriptorPool>;
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    /// Allocate one descriptor set per layout.
    fn allocate_descriptor_sets(&self, pool: vk::DescriptorPool, layouts: &[vk::DescriptorSetLayout]) -> Result<Vec<vk::DescriptorSet>>;
    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]);

    /// Create a command pool whose buffers can be reset individually.
    fn create_command_pool(&self) -> Result<vk::CommandPool>;
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    fn allocate_command_buffers(&self, pool: vk::CommandPool, level: vk::CommandBufferLevel, count: u32) -> Result<Vec<vk::CommandBuffer>>;
    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()>;
    fn begin_command_buffer(&self, cmd: vk::CommandBuffer, info: &CommandBufferBeginInfo) -> Result<()>;
    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()>;

    fn cmd_begin_render_pass(&self, cmd: vk::CommandBuffer, info: &RenderPassBeginInfo, contents: vk::SubpassContents);
    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer);
    fn cmd_execute_commands(&self, cmd: vk::CommandBuffer, secondaries: &[vk::CommandBuffer]);
    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline);
    fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewport: vk::Viewport);
    fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissor: vk::Rect2D);
    fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    );
    fn cmd_push_constants(&self, cmd: vk::CommandBuffer, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, offset: u32, data: &[u8]);
    fn cmd_bind_vertex_buffers(&self, cmd: vk::CommandBuffer, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]);
    fn cmd_bind_index_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer, offset: vk::DeviceSize, ty: vk::IndexType);
    fn cmd_draw(&self, cmd: vk::CommandBuffer, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn cmd_draw_indexed(
        &self,
        cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );

    /// Attach a debug name to an object. The default implementation does nothing.
    fn set_debug_name(&self, _object: vk::ObjectType, _handle: u64, _name: &str) -> Result<()> {
        Ok(())
    }

    /// Open a labelled debug region. The default implementation does nothing.
    fn cmd_begin_label(&self, _cmd: vk::CommandBuffer, _name: &str, _color: [f32; 4]) {}

    /// Close the innermost debug region. The default implementation does nothing.
    fn cmd_end_label(&self, _cmd: vk::CommandBuffer) {}
}

/// Name an object through `device` if debug names are enabled. Failures are logged, never fatal.
pub(crate) fn name_object<D: DeviceInterface + ?Sized, H: vk::Handle>(device: &D, enabled: bool, handle: H, name: impl AsRef<str>) {
    if !enabled {
        return;
    }
    let name = name.as_ref();
    if let Err(e) = device.set_debug_name(H::TYPE, handle.as_raw(), name) {
        warn!("Failed to set debug name `{name}`: {e}");
    }
}
