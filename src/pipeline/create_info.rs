//! Plain data description of a graphics pipeline. Everything here is owned and `Send`, the raw Vulkan
//! create info chain is only assembled by the device at creation time.

use ash::vk;

/// A shader module bound to a pipeline stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ShaderStage {
    pub stage: vk::ShaderStageFlags,
    pub module: vk::ShaderModule,
}

/// Defines a full graphics pipeline. Use the [`PipelineBuilder`](crate::PipelineBuilder) to construct this properly.
/// Viewport and scissor are always dynamic, the topology is always a triangle list and every shader uses `main`
/// as its entry point.
#[derive(Debug, Clone)]
pub struct PipelineCreateInfo {
    pub(crate) name: String,
    pub(crate) shaders: Vec<ShaderStage>,
    pub(crate) vertex_input_bindings: Vec<vk::VertexInputBindingDescription>,
    pub(crate) vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    pub(crate) depth_test: bool,
    pub(crate) depth_write: bool,
    pub(crate) depth_op: vk::CompareOp,
    pub(crate) polygon_mode: vk::PolygonMode,
    pub(crate) cull_mode: vk::CullModeFlags,
    pub(crate) front_face: vk::FrontFace,
    pub(crate) samples: vk::SampleCountFlags,
    pub(crate) blend_attachments: Vec<vk::PipelineColorBlendAttachmentState>,
    pub(crate) dynamic_states: Vec<vk::DynamicState>,
}

impl PipelineCreateInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shaders(&self) -> &[ShaderStage] {
        &self.shaders
    }

    pub fn vertex_input_bindings(&self) -> &[vk::VertexInputBindingDescription] {
        &self.vertex_input_bindings
    }

    pub fn vertex_attributes(&self) -> &[vk::VertexInputAttributeDescription] {
        &self.vertex_attributes
    }

    /// Depth test, depth write and compare op.
    pub fn depth(&self) -> (bool, bool, vk::CompareOp) {
        (self.depth_test, self.depth_write, self.depth_op)
    }

    pub fn polygon_mode(&self) -> vk::PolygonMode {
        self.polygon_mode
    }

    pub fn cull_mode(&self) -> vk::CullModeFlags {
        self.cull_mode
    }

    pub fn front_face(&self) -> vk::FrontFace {
        self.front_face
    }

    pub fn samples(&self) -> vk::SampleCountFlags {
        self.samples
    }

    /// One entry per color attachment of the render pass.
    pub fn blend_attachments(&self) -> &[vk::PipelineColorBlendAttachmentState] {
        &self.blend_attachments
    }

    pub fn dynamic_states(&self) -> &[vk::DynamicState] {
        &self.dynamic_states
    }
}
