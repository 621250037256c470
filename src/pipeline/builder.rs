//! The pipeline builder is used to easily create graphics pipelines correctly.

use anyhow::Result;
use ash::vk;

use crate::pipeline::create_info::*;
use crate::{ByteSize, Error};

/// Used to facilitate creating a graphics pipeline.
///
/// For information on each method, please check the Vulkan spec for
/// [`VkGraphicsPipelineCreateInfo`](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/VkGraphicsPipelineCreateInfo.html).
/// All builder methods correspond to entries directly, with minimal utilities added on top to enforce some invariants.
/// # Example
/// ```
/// # use strata::prelude::*;
/// let pci = PipelineBuilder::new("sample")
///     .vertex_input(0, 20, vk::VertexInputRate::VERTEX)
///     .vertex_attribute(0, 0, 0, vk::Format::R32G32B32_SFLOAT)?
///     .vertex_attribute(0, 1, 12, vk::Format::R32G32_SFLOAT)?
///     .dynamic_states(&[vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR])
///     .blend_attachment_none()
///     .cull_mask(vk::CullModeFlags::NONE)
///     .build();
/// assert_eq!(pci.vertex_attributes().len(), 2);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct PipelineBuilder {
    inner: PipelineCreateInfo,
}

impl PipelineBuilder {
    /// Create a new empty pipeline with default settings for everything.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: PipelineCreateInfo {
                name: name.into(),
                shaders: vec![],
                vertex_input_bindings: vec![],
                vertex_attributes: vec![],
                depth_test: false,
                depth_write: false,
                depth_op: vk::CompareOp::LESS,
                polygon_mode: vk::PolygonMode::FILL,
                cull_mode: vk::CullModeFlags::NONE,
                front_face: vk::FrontFace::COUNTER_CLOCKWISE,
                samples: vk::SampleCountFlags::TYPE_1,
                blend_attachments: vec![],
                dynamic_states: vec![],
            },
        }
    }

    /// Add a vertex input binding. These are the binding indices for `vkCmdBindVertexBuffers`
    pub fn vertex_input(mut self, binding: u32, stride: u32, rate: vk::VertexInputRate) -> Self {
        self.inner.vertex_input_bindings.push(vk::VertexInputBindingDescription {
            binding,
            stride,
            input_rate: rate,
        });
        self
    }

    /// Add a vertex attribute at an explicit offset to the specified binding.
    /// # Errors
    /// Fails if the binding was not added first, or if the attribute does not fit inside the binding stride.
    pub fn vertex_attribute(mut self, binding: u32, location: u32, offset: u32, format: vk::Format) -> Result<Self> {
        let descr = self
            .inner
            .vertex_input_bindings
            .iter()
            .find(|b| b.binding == binding)
            .ok_or_else(|| Error::PipelineCompilation {
                pipeline: self.inner.name.clone(),
                reason: format!("vertex attribute {location} uses binding {binding}, which does not exist"),
            })?;
        if offset as usize + format.byte_size() > descr.stride as usize {
            return Err(Error::PipelineCompilation {
                pipeline: self.inner.name.clone(),
                reason: format!("vertex attribute {location} at offset {offset} exceeds stride {}", descr.stride),
            }
            .into());
        }
        self.inner.vertex_attributes.push(vk::VertexInputAttributeDescription {
            location,
            binding,
            format,
            offset,
        });
        Ok(self)
    }

    /// Add a shader to the pipeline.
    pub fn attach_shader(mut self, stage: vk::ShaderStageFlags, module: vk::ShaderModule) -> Self {
        self.inner.shaders.push(ShaderStage {
            stage,
            module,
        });
        self
    }

    /// Set depth testing mode.
    pub fn depth_test(mut self, enable: bool) -> Self {
        self.inner.depth_test = enable;
        self
    }

    /// Set depth write mode.
    pub fn depth_write(mut self, enable: bool) -> Self {
        self.inner.depth_write = enable;
        self
    }

    /// Set the depth compare operation.
    pub fn depth_op(mut self, op: vk::CompareOp) -> Self {
        self.inner.depth_op = op;
        self
    }

    /// Configure all depth state in one call.
    pub fn depth(self, test: bool, write: bool, op: vk::CompareOp) -> Self {
        self.depth_test(test).depth_write(write).depth_op(op)
    }

    /// Add a dynamic state to the pipeline.
    pub fn dynamic_state(mut self, state: vk::DynamicState) -> Self {
        if !self.inner.dynamic_states.contains(&state) {
            self.inner.dynamic_states.push(state);
        }
        self
    }

    /// Add dynamic states to the pipeline.
    pub fn dynamic_states(mut self, states: &[vk::DynamicState]) -> Self {
        for state in states {
            self = self.dynamic_state(*state);
        }
        self
    }

    /// Set the polygon mode.
    pub fn polygon_mode(mut self, mode: vk::PolygonMode) -> Self {
        self.inner.polygon_mode = mode;
        self
    }

    /// Set the face culling mask.
    pub fn cull_mask(mut self, cull: vk::CullModeFlags) -> Self {
        self.inner.cull_mode = cull;
        self
    }

    /// Set the front face.
    pub fn front_face(mut self, face: vk::FrontFace) -> Self {
        self.inner.front_face = face;
        self
    }

    /// Set the amount of MSAA samples.
    pub fn samples(mut self, samples: vk::SampleCountFlags) -> Self {
        self.inner.samples = samples;
        self
    }

    /// Add a blend attachment, but with no blending enabled.
    pub fn blend_attachment_none(mut self) -> Self {
        self.inner.blend_attachments.push(vk::PipelineColorBlendAttachmentState {
            blend_enable: vk::FALSE,
            src_color_blend_factor: vk::BlendFactor::ONE,
            dst_color_blend_factor: vk::BlendFactor::ZERO,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ZERO,
            alpha_blend_op: vk::BlendOp::ADD,
            color_write_mask: vk::ColorComponentFlags::RGBA,
        });
        self
    }

    /// Add a blend attachment writing to each color component
    pub fn blend_attachment(
        mut self,
        src_color: vk::BlendFactor,
        dst_color: vk::BlendFactor,
        color_op: vk::BlendOp,
        src_alpha: vk::BlendFactor,
        dst_alpha: vk::BlendFactor,
        alpha_op: vk::BlendOp,
    ) -> Self {
        self.inner.blend_attachments.push(vk::PipelineColorBlendAttachmentState {
            blend_enable: vk::TRUE,
            src_color_blend_factor: src_color,
            dst_color_blend_factor: dst_color,
            color_blend_op: color_op,
            src_alpha_blend_factor: src_alpha,
            dst_alpha_blend_factor: dst_alpha,
            alpha_blend_op: alpha_op,
            color_write_mask: vk::ColorComponentFlags::RGBA,
        });
        self
    }

    /// Add a standard alpha blend attachment.
    pub fn blend_attachment_alpha(self) -> Self {
        self.blend_attachment(
            vk::BlendFactor::SRC_ALPHA,
            vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            vk::BlendOp::ADD,
            vk::BlendFactor::ONE,
            vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
            vk::BlendOp::ADD,
        )
    }

    /// Build the pipeline create info structure.
    pub fn build(self) -> PipelineCreateInfo {
        self.inner
    }

    /// Obtain the pipeline name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }
}
