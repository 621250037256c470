//! Command buffer recording for the frame executor.
//!
//! Every frame records one primary command buffer that begins and ends the render pass of each pass, and one
//! secondary command buffer per pipeline group that holds the actual draws. Secondary buffers inherit the render pass
//! and framebuffer of their pass, so they can be recorded on any thread.
//!
//! # Incomplete command buffers
//!
//! A command buffer needs `vkEndCommandBuffer` before it can be executed. [`IncompleteCommandBuffer`] still accepts
//! commands, and consumes itself on [`IncompleteCommandBuffer::finish`], after which no more commands can be recorded.

use ash::vk;

pub use incomplete::IncompleteCommandBuffer;

pub mod incomplete;

/// Render pass state a secondary command buffer continues.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InheritanceInfo {
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    pub framebuffer: vk::Framebuffer,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CommandBufferBeginInfo {
    pub flags: vk::CommandBufferUsageFlags,
    /// Must be set for secondary command buffers.
    pub inheritance: Option<InheritanceInfo>,
}

impl CommandBufferBeginInfo {
    /// Begin info for a primary command buffer that is re-recorded every frame.
    pub fn primary() -> Self {
        Self {
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            inheritance: None,
        }
    }

    /// Begin info for a secondary command buffer executed entirely inside subpass 0 of `render_pass`.
    pub fn secondary(render_pass: vk::RenderPass, framebuffer: vk::Framebuffer) -> Self {
        Self {
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT | vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE,
            inheritance: Some(InheritanceInfo {
                render_pass,
                subpass: 0,
                framebuffer,
            }),
        }
    }
}

#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct RenderPassBeginInfo {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub render_area: vk::Rect2D,
    /// One clear value per attachment, in attachment order.
    #[derivative(Debug = "ignore")]
    pub clear_values: Vec<vk::ClearValue>,
}
