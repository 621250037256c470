use anyhow::Result;
use ash::vk;

use crate::command_buffer::{CommandBufferBeginInfo, RenderPassBeginInfo};
use crate::{DeviceInterface, Error};

/// A command buffer that is currently recording.
///
/// All commands consume and return `self` so they can be chained. Commands that depend on the bound pipeline
/// (descriptor sets, push constants) return an error if no pipeline was bound yet.
/// # Example
/// ```
/// # use strata::prelude::*;
/// # use anyhow::Result;
/// fn draw_triangle<D: DeviceInterface>(cmd: IncompleteCommandBuffer<'_, D>, pipeline: &CompiledPipeline, set: vk::DescriptorSet) -> Result<vk::CommandBuffer> {
///     cmd.bind_pipeline(pipeline.pipeline, pipeline.layout)
///         .bind_descriptor_set(0, set)?
///         .draw(3, 1, 0, 0)
///         .finish()
/// }
/// ```
#[derive(Derivative)]
#[derivative(Debug)]
pub struct IncompleteCommandBuffer<'d, D: DeviceInterface + ?Sized> {
    #[derivative(Debug = "ignore")]
    device: &'d D,
    handle: vk::CommandBuffer,
    current_pipeline: vk::Pipeline,
    current_pipeline_layout: vk::PipelineLayout,
}

impl<'d, D: DeviceInterface + ?Sized> IncompleteCommandBuffer<'d, D> {
    /// Begin recording into `handle`.
    pub fn begin(device: &'d D, handle: vk::CommandBuffer, info: &CommandBufferBeginInfo) -> Result<Self> {
        device.begin_command_buffer(handle, info)?;
        Ok(Self::continue_recording(device, handle))
    }

    /// Wrap a command buffer that is already recording.
    pub(crate) fn continue_recording(device: &'d D, handle: vk::CommandBuffer) -> Self {
        Self {
            device,
            handle,
            current_pipeline: vk::Pipeline::null(),
            current_pipeline_layout: vk::PipelineLayout::null(),
        }
    }

    /// Get the raw command buffer handle.
    pub fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    pub fn current_pipeline(&self) -> vk::Pipeline {
        self.current_pipeline
    }

    fn layout(&self) -> Result<vk::PipelineLayout> {
        if self.current_pipeline_layout == vk::PipelineLayout::null() {
            Err(Error::NoPipelineBound.into())
        } else {
            Ok(self.current_pipeline_layout)
        }
    }

    /// Bind a graphics pipeline. Later descriptor set and push constant commands use `layout`.
    pub fn bind_pipeline(mut self, pipeline: vk::Pipeline, layout: vk::PipelineLayout) -> Self {
        self.device.cmd_bind_pipeline(self.handle, pipeline);
        self.current_pipeline = pipeline;
        self.current_pipeline_layout = layout;
        self
    }

    pub fn viewport(self, viewport: vk::Viewport) -> Self {
        self.device.cmd_set_viewport(self.handle, viewport);
        self
    }

    pub fn scissor(self, scissor: vk::Rect2D) -> Self {
        self.device.cmd_set_scissor(self.handle, scissor);
        self
    }

    /// Set viewport and scissor to cover `extent` entirely.
    pub fn full_viewport_scissor(self, extent: vk::Extent2D) -> Self {
        self.viewport(vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        })
        .scissor(vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        })
    }

    pub fn bind_descriptor_set(self, index: u32, set: vk::DescriptorSet) -> Result<Self> {
        self.bind_descriptor_set_dynamic(index, set, &[])
    }

    /// Bind a descriptor set with dynamic offsets for its dynamic uniform buffers, in binding order.
    pub fn bind_descriptor_set_dynamic(self, index: u32, set: vk::DescriptorSet, offsets: &[u32]) -> Result<Self> {
        let layout = self.layout()?;
        self.device
            .cmd_bind_descriptor_sets(self.handle, layout, index, std::slice::from_ref(&set), offsets);
        Ok(self)
    }

    /// Update push constants of the bound pipeline.
    pub fn push_constants(self, stages: vk::ShaderStageFlags, offset: u32, data: &[u8]) -> Result<Self> {
        let layout = self.layout()?;
        self.device.cmd_push_constants(self.handle, layout, stages, offset, data);
        Ok(self)
    }

    pub fn bind_vertex_buffer(self, binding: u32, buffer: vk::Buffer, offset: vk::DeviceSize) -> Self {
        self.device.cmd_bind_vertex_buffers(
            self.handle,
            binding,
            std::slice::from_ref(&buffer),
            std::slice::from_ref(&offset),
        );
        self
    }

    pub fn bind_index_buffer(self, buffer: vk::Buffer, offset: vk::DeviceSize, ty: vk::IndexType) -> Self {
        self.device.cmd_bind_index_buffer(self.handle, buffer, offset, ty);
        self
    }

    pub fn draw(self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) -> Self {
        self.device
            .cmd_draw(self.handle, vertex_count, instance_count, first_vertex, first_instance);
        self
    }

    pub fn draw_indexed(self, index_count: u32, instance_count: u32, first_index: u32, vertex_offset: i32, first_instance: u32) -> Self {
        self.device.cmd_draw_indexed(
            self.handle,
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        );
        self
    }

    /// Begin a render pass. Pipeline state is forgotten, since it does not carry over into a new render pass.
    pub fn begin_render_pass(mut self, info: &RenderPassBeginInfo, contents: vk::SubpassContents) -> Self {
        self.device.cmd_begin_render_pass(self.handle, info, contents);
        self.current_pipeline = vk::Pipeline::null();
        self.current_pipeline_layout = vk::PipelineLayout::null();
        self
    }

    pub fn end_render_pass(self) -> Self {
        self.device.cmd_end_render_pass(self.handle);
        self
    }

    /// Execute secondary command buffers, in order. Does nothing if `secondaries` is empty.
    pub fn execute_commands(self, secondaries: &[vk::CommandBuffer]) -> Self {
        if !secondaries.is_empty() {
            self.device.cmd_execute_commands(self.handle, secondaries);
        }
        self
    }

    /// Open a labelled debug region.
    pub fn begin_label(self, name: &str, color: [f32; 4]) -> Self {
        self.device.cmd_begin_label(self.handle, name, color);
        self
    }

    pub fn end_label(self) -> Self {
        self.device.cmd_end_label(self.handle);
        self
    }

    /// Finish recording. The returned handle can be executed or submitted.
    pub fn finish(self) -> Result<vk::CommandBuffer> {
        self.device.end_command_buffer(self.handle)?;
        Ok(self.handle)
    }
}
