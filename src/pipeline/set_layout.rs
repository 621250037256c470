use ash::vk;

use crate::description::BindingSpec;

/// One binding of a descriptor set layout.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DescriptorSetLayoutBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub count: u32,
    pub stages: vk::ShaderStageFlags,
}

/// Describes a descriptor set layout. An empty binding list is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DescriptorSetLayoutCreateInfo {
    pub bindings: Vec<DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutCreateInfo {
    /// Concatenate the bindings of every declared set into one layout.
    pub fn from_bindings<'a>(bindings: impl IntoIterator<Item = &'a BindingSpec>) -> Self {
        Self {
            bindings: bindings
                .into_iter()
                .map(|b| DescriptorSetLayoutBinding {
                    binding: b.slot,
                    descriptor_type: b.kind.descriptor_type(),
                    count: 1,
                    stages: b.stages,
                })
                .collect(),
        }
    }

    pub(crate) fn to_vk(&self) -> Vec<vk::DescriptorSetLayoutBinding> {
        self.bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(b.binding)
                    .descriptor_type(b.descriptor_type)
                    .descriptor_count(b.count)
                    .stage_flags(b.stages)
                    .build()
            })
            .collect()
    }
}
