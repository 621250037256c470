//! Pipeline layout descriptions.

use ash::vk;

/// Defines a range of Vulkan push constants.
#[derive(Debug, Clone, Default, Copy, PartialEq, Eq, Hash)]
pub struct PushConstantRange {
    /// Shader stages where this push constant range is used
    pub stage_flags: vk::ShaderStageFlags,
    /// Offset into the global push constant block of this range
    pub offset: u32,
    /// Size of this push constant range
    pub size: u32,
}

/// Define a pipeline layout, this includes all descriptor set layouts and push constant ranges used by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PipelineLayoutCreateInfo {
    /// Descriptor set layouts for this pipeline layout.
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    /// Push constant ranges used in this pipeline
    pub push_constants: Vec<PushConstantRange>,
}

impl PipelineLayoutCreateInfo {
    /// A layout with one descriptor set and a single push constant block of `push_constant_size` bytes visible to
    /// the vertex and fragment stages. A size of zero means no push constants.
    pub fn new(set_layout: vk::DescriptorSetLayout, push_constant_size: u32) -> Self {
        let push_constants = if push_constant_size > 0 {
            vec![PushConstantRange {
                stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                offset: 0,
                size: push_constant_size,
            }]
        } else {
            vec![]
        };
        Self {
            set_layouts: vec![set_layout],
            push_constants,
        }
    }

    pub(crate) fn vk_push_constants(&self) -> Vec<vk::PushConstantRange> {
        self.push_constants
            .iter()
            .map(|pc| vk::PushConstantRange {
                stage_flags: pc.stage_flags,
                offset: pc.offset,
                size: pc.size,
            })
            .collect()
    }
}
