//! [`DeviceInterface`] implementation on top of `ash`, with image memory managed by an [`Allocator`].

use std::collections::HashMap;
use std::ffi::CString;
use std::sync::Mutex;

use anyhow::Result;
use ash::extensions::ext::DebugUtils;
use ash::vk;

use crate::allocator::traits::{Allocation, Allocator};
use crate::command_buffer::{CommandBufferBeginInfo, RenderPassBeginInfo};
use crate::descriptor::{DescriptorPoolSize, DescriptorWrite};
use crate::device::{AllocatedImage, DeviceInterface, FramebufferCreateInfo, ImageCreateInfo, RenderPassCreateInfo};
use crate::pipeline::{DescriptorSetLayoutCreateInfo, PipelineCreateInfo, PipelineLayoutCreateInfo};
use crate::resource::SamplerCreateInfo;
use crate::{DefaultAllocator, Error};

/// A Vulkan device the render graph can create objects on.
///
/// The `ash::Device` is not owned: it must outlive this struct and is never destroyed by it. Memory for images is
/// taken from `A` and returned when the image is destroyed.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct VulkanDevice<A: Allocator = DefaultAllocator> {
    #[derivative(Debug = "ignore")]
    handle: ash::Device,
    #[derivative(Debug = "ignore")]
    allocator: A,
    queue_family: u32,
    #[derivative(Debug = "ignore")]
    debug_utils: Option<DebugUtils>,
    #[derivative(Debug = "ignore")]
    allocations: Mutex<HashMap<vk::Image, A::Allocation>>,
}

impl<A: Allocator> VulkanDevice<A> {
    /// Wrap an existing device. Command pools are created for `queue_family`, which must support graphics.
    pub fn new(handle: ash::Device, allocator: A, queue_family: u32) -> Self {
        Self {
            handle,
            allocator,
            queue_family,
            debug_utils: None,
            allocations: Mutex::new(HashMap::new()),
        }
    }

    /// Enable object names and command buffer labels through `VK_EXT_debug_utils`.
    pub fn with_debug_utils(mut self, debug_utils: DebugUtils) -> Self {
        self.debug_utils = Some(debug_utils);
        self
    }

    /// Get unsafe access to the underlying device.
    /// # Safety
    /// Destroying objects owned by the render graph through this handle leads to double frees.
    pub unsafe fn handle(&self) -> &ash::Device {
        &self.handle
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }
}

impl VulkanDevice<DefaultAllocator> {
    /// Wrap an existing device and create a [`DefaultAllocator`] for it.
    pub fn with_default_allocator(instance: &ash::Instance, handle: ash::Device, physical_device: vk::PhysicalDevice, queue_family: u32) -> Result<Self> {
        let allocator = DefaultAllocator::new(instance, &handle, physical_device)?;
        Ok(Self::new(handle, allocator, queue_family))
    }
}

impl<A: Allocator> VulkanDevice<A> {
    fn bind_and_create_view(&self, image: vk::Image, memory: &A::Allocation, info: &ImageCreateInfo) -> Result<vk::ImageView> {
        unsafe {
            self.handle
                .bind_image_memory(image, memory.memory(), memory.offset())
                .map_err(Error::from)?
        };
        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(info.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: info.aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        Ok(unsafe { self.handle.create_image_view(&view_info, None).map_err(Error::from)? })
    }

    /// Release a partially created image and its memory.
    fn discard_image(&self, image: vk::Image, view: Option<vk::ImageView>, memory: A::Allocation) {
        unsafe {
            if let Some(view) = view {
                self.handle.destroy_image_view(view, None);
            }
            self.handle.destroy_image(image, None);
        }
        let mut allocator = self.allocator.clone();
        if let Err(e) = allocator.free(memory) {
            error!("Failed to free memory of discarded image {image:?}: {e}");
        }
    }
}

impl<A: Allocator> DeviceInterface for VulkanDevice<A> {
    fn create_image(&self, info: &ImageCreateInfo) -> Result<AllocatedImage> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(info.format)
            .extent(vk::Extent3D {
                width: info.extent.width,
                height: info.extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(info.samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(info.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe { self.handle.create_image(&image_info, None).map_err(Error::from)? };
        let requirements = unsafe { self.handle.get_image_memory_requirements(image) };
        let mut allocator = self.allocator.clone();
        let memory = match allocator.allocate("render_target", &requirements) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.handle.destroy_image(image, None) };
                return Err(e);
            }
        };
        let view = match self.bind_and_create_view(image, &memory, info) {
            Ok(view) => view,
            Err(e) => {
                self.discard_image(image, None, memory);
                return Err(e);
            }
        };
        match self.allocations.lock() {
            Ok(mut allocations) => {
                allocations.insert(image, memory);
            }
            Err(_) => {
                self.discard_image(image, Some(view), memory);
                return Err(Error::PoisonError.into());
            }
        }

        #[cfg(feature = "log-objects")]
        trace!("Created new VkImage {image:p} with view {view:p}");

        Ok(AllocatedImage {
            image,
            view,
            format: info.format,
            extent: info.extent,
            samples: info.samples,
        })
    }

    fn destroy_image(&self, image: &AllocatedImage) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkImage {:p}", image.image);
        unsafe {
            self.handle.destroy_image_view(image.view, None);
            self.handle.destroy_image(image.image, None);
        }
        match self.allocations.lock() {
            Ok(mut allocations) => {
                if let Some(memory) = allocations.remove(&image.image) {
                    let mut allocator = self.allocator.clone();
                    if let Err(e) = allocator.free(memory) {
                        error!("Failed to free image memory: {e}");
                    }
                }
            }
            Err(_) => error!("Allocation table poisoned, leaking memory of image {:?}", image.image),
        }
    }

    fn create_render_pass(&self, info: &RenderPassCreateInfo) -> Result<vk::RenderPass> {
        let mut subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&info.color_refs);
        if !info.resolve_refs.is_empty() {
            subpass = subpass.resolve_attachments(&info.resolve_refs);
        }
        if let Some(depth) = &info.depth_ref {
            subpass = subpass.depth_stencil_attachment(depth);
        }
        let subpass = subpass.build();
        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&info.attachments)
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(&info.dependencies);
        let handle = unsafe { self.handle.create_render_pass(&create_info, None).map_err(Error::from)? };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkRenderPass {handle:p}");
        Ok(handle)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkRenderPass {render_pass:p}");
        unsafe { self.handle.destroy_render_pass(render_pass, None) }
    }

    fn create_framebuffer(&self, info: &FramebufferCreateInfo) -> Result<vk::Framebuffer> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(info.render_pass)
            .attachments(&info.attachments)
            .width(info.extent.width)
            .height(info.extent.height)
            .layers(1);
        let handle = unsafe { self.handle.create_framebuffer(&create_info, None).map_err(Error::from)? };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkFramebuffer {handle:p}");
        Ok(handle)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkFramebuffer {framebuffer:p}");
        unsafe { self.handle.destroy_framebuffer(framebuffer, None) }
    }

    fn create_sampler(&self, info: &SamplerCreateInfo) -> Result<vk::Sampler> {
        let handle = unsafe { self.handle.create_sampler(&info.to_vk(), None).map_err(Error::from)? };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkSampler {handle:p}");
        Ok(handle)
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkSampler {sampler:p}");
        unsafe { self.handle.destroy_sampler(sampler, None) }
    }

    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule> {
        let info = vk::ShaderModuleCreateInfo::builder().code(code);
        Ok(unsafe { self.handle.create_shader_module(&info, None).map_err(Error::from)? })
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        unsafe { self.handle.destroy_shader_module(module, None) }
    }

    fn create_descriptor_set_layout(&self, info: &DescriptorSetLayoutCreateInfo) -> Result<vk::DescriptorSetLayout> {
        let bindings = info.to_vk();
        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let handle = unsafe { self.handle.create_descriptor_set_layout(&create_info, None).map_err(Error::from)? };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkDescriptorSetLayout {handle:p}");
        Ok(handle)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkDescriptorSetLayout {layout:p}");
        unsafe { self.handle.destroy_descriptor_set_layout(layout, None) }
    }

    fn create_pipeline_layout(&self, info: &PipelineLayoutCreateInfo) -> Result<vk::PipelineLayout> {
        let push_constants = info.vk_push_constants();
        let create_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&info.set_layouts)
            .push_constant_ranges(&push_constants);
        let handle = unsafe { self.handle.create_pipeline_layout(&create_info, None).map_err(Error::from)? };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkPipelineLayout {handle:p}");
        Ok(handle)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkPipelineLayout {layout:p}");
        unsafe { self.handle.destroy_pipeline_layout(layout, None) }
    }

    fn create_graphics_pipeline(&self, info: &PipelineCreateInfo, layout: vk::PipelineLayout, render_pass: vk::RenderPass) -> Result<vk::Pipeline> {
        let entry = CString::new("main")?;
        let stages = info
            .shaders()
            .iter()
            .map(|shader| {
                vk::PipelineShaderStageCreateInfo::builder()
                    .stage(shader.stage)
                    .module(shader.module)
                    .name(&entry)
                    .build()
            })
            .collect::<Vec<_>>();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(info.vertex_input_bindings())
            .vertex_attribute_descriptions(info.vertex_attributes());
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);
        // Both are dynamic, only the count matters.
        let viewport = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);
        let rasterization = vk::PipelineRasterizationStateCreateInfo::builder()
            .polygon_mode(info.polygon_mode())
            .cull_mode(info.cull_mode())
            .front_face(info.front_face())
            .line_width(1.0);
        let multisample = vk::PipelineMultisampleStateCreateInfo::builder().rasterization_samples(info.samples());
        let (depth_test, depth_write, depth_op) = info.depth();
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(depth_test)
            .depth_write_enable(depth_write)
            .depth_compare_op(depth_op)
            .min_depth_bounds(0.0)
            .max_depth_bounds(1.0);
        let blend = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(info.blend_attachments());
        let dynamic = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(info.dynamic_states());

        let create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&blend)
            .dynamic_state(&dynamic)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0)
            .build();
        let pipelines = unsafe {
            self.handle
                .create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&create_info), None)
                .map_err(|(_, e)| Error::from(e))?
        };
        let handle = pipelines.into_iter().next().ok_or(Error::VkError(vk::Result::ERROR_UNKNOWN))?;
        #[cfg(feature = "log-objects")]
        trace!("Created new VkPipeline {handle:p} ({})", info.name());
        Ok(handle)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkPipeline {pipeline:p}");
        unsafe { self.handle.destroy_pipeline(pipeline, None) }
    }

    fn create_descriptor_pool(&self, size: &DescriptorPoolSize, max_sets: u32) -> Result<vk::DescriptorPool> {
        let sizes = size.to_vk();
        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(&sizes);
        let handle = unsafe { self.handle.create_descriptor_pool(&create_info, None).map_err(Error::from)? };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkDescriptorPool {handle:p}");
        Ok(handle)
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkDescriptorPool {pool:p}");
        unsafe { self.handle.destroy_descriptor_pool(pool, None) }
    }

    fn allocate_descriptor_sets(&self, pool: vk::DescriptorPool, layouts: &[vk::DescriptorSetLayout]) -> Result<Vec<vk::DescriptorSet>> {
        let info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(layouts);
        Ok(unsafe { self.handle.allocate_descriptor_sets(&info).map_err(Error::from)? })
    }

    fn update_descriptor_sets(&self, writes: &[DescriptorWrite]) {
        // The infos must stay alive until the update call, so collect them before building the writes.
        let buffers = writes
            .iter()
            .map(|w| match w {
                DescriptorWrite::Buffer {
                    info, ..
                } => *info,
                DescriptorWrite::Image {
                    ..
                } => vk::DescriptorBufferInfo::default(),
            })
            .collect::<Vec<_>>();
        let images = writes
            .iter()
            .map(|w| match w {
                DescriptorWrite::Image {
                    info, ..
                } => *info,
                DescriptorWrite::Buffer {
                    ..
                } => vk::DescriptorImageInfo::default(),
            })
            .collect::<Vec<_>>();
        let vk_writes = writes
            .iter()
            .enumerate()
            .map(|(i, w)| {
                let builder = vk::WriteDescriptorSet::builder()
                    .dst_set(w.set())
                    .dst_binding(w.binding())
                    .dst_array_element(0);
                match w {
                    DescriptorWrite::Buffer {
                        ty, ..
                    } => builder
                        .descriptor_type(*ty)
                        .buffer_info(std::slice::from_ref(&buffers[i]))
                        .build(),
                    DescriptorWrite::Image {
                        ty, ..
                    } => builder
                        .descriptor_type(*ty)
                        .image_info(std::slice::from_ref(&images[i]))
                        .build(),
                }
            })
            .collect::<Vec<_>>();
        unsafe { self.handle.update_descriptor_sets(&vk_writes, &[]) }
    }

    fn create_command_pool(&self) -> Result<vk::CommandPool> {
        let info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(self.queue_family);
        let handle = unsafe { self.handle.create_command_pool(&info, None).map_err(Error::from)? };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkCommandPool {handle:p}");
        Ok(handle)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkCommandPool {pool:p}");
        unsafe { self.handle.destroy_command_pool(pool, None) }
    }

    fn allocate_command_buffers(&self, pool: vk::CommandPool, level: vk::CommandBufferLevel, count: u32) -> Result<Vec<vk::CommandBuffer>> {
        let info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(level)
            .command_buffer_count(count);
        Ok(unsafe { self.handle.allocate_command_buffers(&info).map_err(Error::from)? })
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        unsafe {
            self.handle
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(Error::from)?
        };
        Ok(())
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer, info: &CommandBufferBeginInfo) -> Result<()> {
        let inheritance = info.inheritance.map(|inheritance| {
            vk::CommandBufferInheritanceInfo::builder()
                .render_pass(inheritance.render_pass)
                .subpass(inheritance.subpass)
                .framebuffer(inheritance.framebuffer)
                .build()
        });
        let mut begin_info = vk::CommandBufferBeginInfo::builder().flags(info.flags);
        if let Some(inheritance) = &inheritance {
            begin_info = begin_info.inheritance_info(inheritance);
        }
        unsafe { self.handle.begin_command_buffer(cmd, &begin_info).map_err(Error::from)? };
        Ok(())
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<()> {
        unsafe { self.handle.end_command_buffer(cmd).map_err(Error::from)? };
        Ok(())
    }

    fn cmd_begin_render_pass(&self, cmd: vk::CommandBuffer, info: &RenderPassBeginInfo, contents: vk::SubpassContents) {
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(info.render_pass)
            .framebuffer(info.framebuffer)
            .render_area(info.render_area)
            .clear_values(&info.clear_values);
        unsafe { self.handle.cmd_begin_render_pass(cmd, &begin_info, contents) }
    }

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.handle.cmd_end_render_pass(cmd) }
    }

    fn cmd_execute_commands(&self, cmd: vk::CommandBuffer, secondaries: &[vk::CommandBuffer]) {
        unsafe { self.handle.cmd_execute_commands(cmd, secondaries) }
    }

    fn cmd_bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe {
            self.handle
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline)
        }
    }

    fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewport: vk::Viewport) {
        unsafe { self.handle.cmd_set_viewport(cmd, 0, std::slice::from_ref(&viewport)) }
    }

    fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissor: vk::Rect2D) {
        unsafe { self.handle.cmd_set_scissor(cmd, 0, std::slice::from_ref(&scissor)) }
    }

    fn cmd_bind_descriptor_sets(&self, cmd: vk::CommandBuffer, layout: vk::PipelineLayout, first_set: u32, sets: &[vk::DescriptorSet], dynamic_offsets: &[u32]) {
        unsafe {
            self.handle
                .cmd_bind_descriptor_sets(cmd, vk::PipelineBindPoint::GRAPHICS, layout, first_set, sets, dynamic_offsets)
        }
    }

    fn cmd_push_constants(&self, cmd: vk::CommandBuffer, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, offset: u32, data: &[u8]) {
        unsafe { self.handle.cmd_push_constants(cmd, layout, stages, offset, data) }
    }

    fn cmd_bind_vertex_buffers(&self, cmd: vk::CommandBuffer, first_binding: u32, buffers: &[vk::Buffer], offsets: &[vk::DeviceSize]) {
        unsafe {
            self.handle
                .cmd_bind_vertex_buffers(cmd, first_binding, buffers, offsets)
        }
    }

    fn cmd_bind_index_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer, offset: vk::DeviceSize, ty: vk::IndexType) {
        unsafe { self.handle.cmd_bind_index_buffer(cmd, buffer, offset, ty) }
    }

    fn cmd_draw(&self, cmd: vk::CommandBuffer, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        unsafe {
            self.handle
                .cmd_draw(cmd, vertex_count, instance_count, first_vertex, first_instance)
        }
    }

    fn cmd_draw_indexed(&self, cmd: vk::CommandBuffer, index_count: u32, instance_count: u32, first_index: u32, vertex_offset: i32, first_instance: u32) {
        unsafe {
            self.handle
                .cmd_draw_indexed(cmd, index_count, instance_count, first_index, vertex_offset, first_instance)
        }
    }

    fn set_debug_name(&self, object: vk::ObjectType, handle: u64, name: &str) -> Result<()> {
        let Some(debug_utils) = &self.debug_utils else { return Ok(()); };
        let name = CString::new(name)?;
        let info = vk::DebugUtilsObjectNameInfoEXT::builder()
            .object_type(object)
            .object_handle(handle)
            .object_name(&name);
        unsafe { debug_utils.set_debug_utils_object_name(self.handle.handle(), &info).map_err(Error::from)? };
        Ok(())
    }

    fn cmd_begin_label(&self, cmd: vk::CommandBuffer, name: &str, color: [f32; 4]) {
        let Some(debug_utils) = &self.debug_utils else { return; };
        let Ok(name) = CString::new(name) else { return; };
        let label = vk::DebugUtilsLabelEXT::builder().label_name(&name).color(color);
        unsafe { debug_utils.cmd_begin_debug_utils_label(cmd, &label) }
    }

    fn cmd_end_label(&self, cmd: vk::CommandBuffer) {
        if let Some(debug_utils) = &self.debug_utils {
            unsafe { debug_utils.cmd_end_debug_utils_label(cmd) }
        }
    }
}
