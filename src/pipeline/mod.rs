//! Graphics pipelines of the render graph.
//!
//! Pipelines are declared in the graph description and compiled once per graph by [`compiler`]. Shader code is
//! loaded through a [`ShaderLoader`], so the graph never needs to know where SPIR-V comes from.
//!
//! The [`PipelineBuilder`] can also be used on its own to assemble a [`PipelineCreateInfo`].
//!
//! # Example
//! ```
//! # use strata::prelude::*;
//! let pci = PipelineBuilder::new("fullscreen")
//!     // Viewport and scissor are set by the frame recorder for every pipeline.
//!     .dynamic_states(&[vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR])
//!     // No vertex input, the triangle is generated in the vertex shader.
//!     .blend_attachment_none()
//!     .cull_mask(vk::CullModeFlags::NONE)
//!     .build();
//! assert!(pci.vertex_input_bindings().is_empty());
//! ```

pub use builder::PipelineBuilder;
pub use compiler::{CompiledPipeline, PassPipelines};
pub use create_info::{PipelineCreateInfo, ShaderStage};
pub use pipeline_layout::{PipelineLayoutCreateInfo, PushConstantRange};
pub use set_layout::{DescriptorSetLayoutBinding, DescriptorSetLayoutCreateInfo};
pub use shader::{ShaderCreateInfo, ShaderLoader, SpirvFileLoader};

pub mod builder;
pub mod compiler;
pub mod create_info;
pub mod pipeline_layout;
pub mod set_layout;
pub mod shader;
