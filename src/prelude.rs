pub use ash::vk;

pub use crate::core::error::Error;
pub use crate::core::settings::*;

pub use crate::allocator::default_allocator;
pub use crate::allocator::default_allocator::DefaultAllocator;
pub use crate::allocator::traits::*;

pub use crate::command_buffer::{CommandBufferBeginInfo, IncompleteCommandBuffer, InheritanceInfo, RenderPassBeginInfo};

pub use crate::description::*;
pub use crate::descriptor::{DescriptorPoolSize, DescriptorWrite};

pub use crate::device::vulkan::VulkanDevice;
pub use crate::device::{AllocatedImage, DeviceInterface, FramebufferCreateInfo, ImageCreateInfo, RenderPassCreateInfo};

pub use crate::graph::attachment::{Attachment, Attachments};
pub use crate::graph::dag::{Dag, DagNode, GraphViz};
pub use crate::graph::executor::{DrawContext, PipelineExecutor, PipelineExecutors};
pub use crate::graph::record::{FrameRecordState, FrameRecorder, RecordState};
pub use crate::graph::render_graph::RenderGraph;
pub use crate::graph::render_target::RenderTarget;

pub use crate::pipeline::*;

pub use crate::resource::{BufferBinding, ResourceProvider, ResourceRegistry, SamplerCreateInfo};

pub use crate::util::byte_size::ByteSize;

pub mod traits {
    pub use crate::allocator::traits::*;
    pub use crate::device::DeviceInterface;
    pub use crate::graph::dag::GraphViz;
    pub use crate::graph::executor::PipelineExecutor;
    pub use crate::pipeline::ShaderLoader;
    pub use crate::resource::ResourceProvider;
    pub use crate::util::byte_size::ByteSize;
}
