//! Descriptor pools are sized exactly once per pass from the bindings its pipelines declare.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use ash::vk;

use crate::description::PipelineSpec;

/// Defines how many descriptors a descriptor pool should be able to hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorPoolSize(pub HashMap<vk::DescriptorType, u32>);

impl DescriptorPoolSize {
    /// Size a pool for one descriptor set per frame in flight for every pipeline in `pipelines`.
    /// Returns the sizes and the number of sets.
    pub fn for_pipelines<'a>(pipelines: impl IntoIterator<Item = &'a PipelineSpec>, frames_in_flight: u32) -> (Self, u32) {
        let mut sizes = HashMap::new();
        let mut max_sets = 0;
        for pipeline in pipelines {
            max_sets += frames_in_flight;
            for binding in pipeline.bindings() {
                *sizes.entry(binding.kind.descriptor_type()).or_insert(0) += frames_in_flight;
            }
        }
        (Self(sizes), max_sets)
    }

    /// Total number of descriptors across all types.
    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    pub(crate) fn to_vk(&self) -> Vec<vk::DescriptorPoolSize> {
        self.0
            .iter()
            .map(|(descriptor_type, count)| vk::DescriptorPoolSize {
                ty: *descriptor_type,
                descriptor_count: *count,
            })
            .collect()
    }
}

impl Display for DescriptorPoolSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut result = writeln!(f, "DescriptorPoolSize (");
        for (ty, size) in &self.0 {
            result = result.and_then(|_| writeln!(f, "{ty:?} => {size}"))
        }
        result.and_then(|_| write!(f, ")"))
    }
}
