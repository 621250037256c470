//! Descriptor pool sizing and descriptor set writes.
//!
//! Every pipeline owns one descriptor set per frame in flight, allocated from a pool owned by its pass. The sets are
//! written by the [`binder`](crate::graph::binder) after every build and recreate.

use ash::vk;

pub use descriptor_pool::DescriptorPoolSize;

pub mod descriptor_pool;

/// A single descriptor update. Converted to `VkWriteDescriptorSet` by the device.
#[derive(Debug, Copy, Clone)]
pub enum DescriptorWrite {
    Buffer {
        set: vk::DescriptorSet,
        binding: u32,
        ty: vk::DescriptorType,
        info: vk::DescriptorBufferInfo,
    },
    Image {
        set: vk::DescriptorSet,
        binding: u32,
        ty: vk::DescriptorType,
        info: vk::DescriptorImageInfo,
    },
}

impl DescriptorWrite {
    pub fn set(&self) -> vk::DescriptorSet {
        match self {
            DescriptorWrite::Buffer {
                set, ..
            }
            | DescriptorWrite::Image {
                set, ..
            } => *set,
        }
    }

    pub fn binding(&self) -> u32 {
        match self {
            DescriptorWrite::Buffer {
                binding, ..
            }
            | DescriptorWrite::Image {
                binding, ..
            } => *binding,
        }
    }

    /// The image view written, if this is an image write.
    pub fn image_view(&self) -> Option<vk::ImageView> {
        match self {
            DescriptorWrite::Image {
                info, ..
            } => Some(info.image_view),
            DescriptorWrite::Buffer {
                ..
            } => None,
        }
    }

    /// The buffer written, if this is a buffer write.
    pub fn buffer(&self) -> Option<vk::Buffer> {
        match self {
            DescriptorWrite::Buffer {
                info, ..
            } => Some(info.buffer),
            DescriptorWrite::Image {
                ..
            } => None,
        }
    }
}
