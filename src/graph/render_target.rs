//! Render passes and framebuffers.
//!
//! Every pass renders in a single subpass. Attachments are always ordered colors first, then resolves, then depth.
//! The render pass only depends on formats and sample counts, so it survives a recreate. Framebuffers are rebuilt.

use anyhow::Result;
use ash::vk;

use crate::description::{ClearValue, PassSpec, ResourceKind};
use crate::device::{name_object, DeviceInterface, FramebufferCreateInfo, RenderPassCreateInfo};
use crate::graph::attachment::Attachments;

/// The render pass of a pass together with one framebuffer per frame (or per surface image for the terminal pass).
#[derive(Debug, Clone)]
pub struct RenderTarget {
    pub render_pass: vk::RenderPass,
    pub framebuffers: Vec<vk::Framebuffer>,
    pub extent: vk::Extent2D,
    /// One per attachment, in attachment order.
    pub clear_values: Vec<ClearValue>,
}

impl RenderTarget {
    pub fn vk_clear_values(&self) -> Vec<vk::ClearValue> {
        self.clear_values.iter().map(ClearValue::to_vk).collect()
    }

    pub(crate) fn render_area(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent: self.extent,
        }
    }
}

/// Describe the single-subpass render pass of `pass`.
pub fn describe_render_pass(pass: &PassSpec, terminal: bool, samples: vk::SampleCountFlags) -> RenderPassCreateInfo {
    let multisampled = samples != vk::SampleCountFlags::TYPE_1;
    let read_layout = if terminal {
        vk::ImageLayout::PRESENT_SRC_KHR
    } else {
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
    };

    let mut attachments = Vec::new();
    let mut color_refs = Vec::new();
    let mut resolve_refs = Vec::new();

    for output in pass.color_outputs() {
        color_refs.push(vk::AttachmentReference {
            attachment: attachments.len() as u32,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        });
        attachments.push(vk::AttachmentDescription {
            format: output.format,
            samples,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: if multisampled {
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
            } else {
                read_layout
            },
            ..Default::default()
        });
    }

    if multisampled {
        for output in pass.color_outputs() {
            resolve_refs.push(vk::AttachmentReference {
                attachment: attachments.len() as u32,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            });
            attachments.push(vk::AttachmentDescription {
                format: output.format,
                samples: vk::SampleCountFlags::TYPE_1,
                load_op: vk::AttachmentLoadOp::DONT_CARE,
                store_op: vk::AttachmentStoreOp::STORE,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: read_layout,
                ..Default::default()
            });
        }
    }

    let depth_ref = pass.depth_output().map(|output| {
        let reference = vk::AttachmentReference {
            attachment: attachments.len() as u32,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        attachments.push(vk::AttachmentDescription {
            format: output.format,
            samples,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ..Default::default()
        });
        reference
    });

    let writes = vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
    let dependency = vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
        dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        src_access_mask: writes,
        dst_access_mask: writes,
        dependency_flags: vk::DependencyFlags::empty(),
    };

    RenderPassCreateInfo {
        attachments,
        color_refs,
        resolve_refs,
        depth_ref,
        dependencies: vec![dependency],
    }
}

/// Create the render pass of `pass`. Framebuffers are added by [`create_framebuffers`].
pub(crate) fn create_render_target<D: DeviceInterface + ?Sized>(
    device: &D,
    pass: &PassSpec,
    terminal: bool,
    samples: vk::SampleCountFlags,
    debug_names: bool,
) -> Result<RenderTarget> {
    let info = describe_render_pass(pass, terminal, samples);
    let render_pass = device.create_render_pass(&info)?;
    name_object(device, debug_names, render_pass, format!("{}_RenderPass", pass.name));
    Ok(RenderTarget {
        render_pass,
        framebuffers: vec![],
        extent: vk::Extent2D::default(),
        clear_values: vec![],
    })
}

/// (Re)create the framebuffers of a render target from the current attachments of pass `index`.
pub(crate) fn create_framebuffers<D: DeviceInterface + ?Sized>(
    device: &D,
    target: &mut RenderTarget,
    index: usize,
    pass: &PassSpec,
    attachments: &Attachments,
    extent: vk::Extent2D,
    debug_names: bool,
) -> Result<()> {
    let owned = attachments.of_pass(index).collect::<Vec<_>>();
    let colors = owned.iter().filter(|a| a.kind == ResourceKind::Color).collect::<Vec<_>>();
    let depth = owned.iter().find(|a| a.kind == ResourceKind::Depth);
    let has_resolve = colors.iter().any(|a| !a.resolve_views.is_empty());

    target.extent = extent;
    target.clear_values = colors
        .iter()
        .map(|a| a.clear)
        .chain(colors.iter().filter(|_| has_resolve).map(|a| a.clear))
        .chain(depth.map(|a| a.clear))
        .collect();

    let count = owned.iter().map(|a| a.count()).max().unwrap_or_default();
    for i in 0..count {
        let views = colors
            .iter()
            .map(|a| a.views[i % a.views.len()])
            .chain(
                colors
                    .iter()
                    .filter(|_| has_resolve)
                    .map(|a| a.resolve_views[i % a.resolve_views.len()]),
            )
            .chain(depth.map(|a| a.views[i % a.views.len()]))
            .collect::<Vec<_>>();
        let framebuffer = device.create_framebuffer(&FramebufferCreateInfo {
            render_pass: target.render_pass,
            attachments: views,
            extent,
        })?;
        name_object(device, debug_names, framebuffer, format!("{}_Framebuffer_{i}", pass.name));
        target.framebuffers.push(framebuffer);
    }
    Ok(())
}

/// Destroy the framebuffers, keeping the render pass.
pub(crate) fn destroy_framebuffers<D: DeviceInterface + ?Sized>(device: &D, target: &mut RenderTarget) {
    for framebuffer in target.framebuffers.drain(..) {
        device.destroy_framebuffer(framebuffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::OutputSpec;

    fn output(name: &str, kind: ResourceKind, format: vk::Format) -> OutputSpec {
        OutputSpec {
            name: name.to_owned(),
            kind,
            format,
            clear: None,
            consumed: true,
        }
    }

    fn scene(multisampled: bool) -> PassSpec {
        PassSpec {
            name: "scene".to_owned(),
            uses_multisampling: multisampled,
            inputs: vec![],
            outputs: vec![
                output("depth", ResourceKind::Depth, vk::Format::D32_SFLOAT),
                output("color", ResourceKind::Color, vk::Format::R16G16B16A16_SFLOAT),
            ],
            pipeline_groups: vec![],
            extent: None,
        }
    }

    #[test]
    fn multisampled_attachments_are_ordered_color_resolve_depth() {
        let info = describe_render_pass(&scene(true), false, vk::SampleCountFlags::TYPE_4);
        assert_eq!(info.attachments.len(), 3);
        assert_eq!(info.color_refs[0].attachment, 0);
        assert_eq!(info.resolve_refs[0].attachment, 1);
        assert_eq!(info.depth_ref.map(|r| r.attachment), Some(2));
        assert_eq!(info.attachments[0].samples, vk::SampleCountFlags::TYPE_4);
        assert_eq!(info.attachments[0].final_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(info.attachments[1].samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(info.attachments[1].load_op, vk::AttachmentLoadOp::DONT_CARE);
        assert_eq!(info.attachments[1].final_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(info.attachments[2].final_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    }

    #[test]
    fn terminal_single_sampled_presents() {
        let info = describe_render_pass(&scene(false), true, vk::SampleCountFlags::TYPE_1);
        assert_eq!(info.attachments.len(), 2);
        assert!(info.resolve_refs.is_empty());
        assert_eq!(info.attachments[0].final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(info.attachments[0].load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(info.dependencies.len(), 1);
        assert_eq!(info.dependencies[0].src_subpass, vk::SUBPASS_EXTERNAL);
    }
}
