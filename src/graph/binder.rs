//! Writes descriptor sets once every attachment exists.
//!
//! Binding has to wait until all passes are allocated, because a pipeline may sample an output of a pass declared
//! later in the description. It must also run again after every recreate, since the images behind each attachment
//! are replaced.

use anyhow::Result;
use ash::vk;

use crate::description::{BindingKind, BindingSpec, PassSpec};
use crate::descriptor::DescriptorWrite;
use crate::device::DeviceInterface;
use crate::graph::attachment::Attachments;
use crate::pipeline::PassPipelines;
use crate::resource::ResourceProvider;
use crate::Error;

fn not_found(pass: &PassSpec, pipeline: &str, resource: &str) -> anyhow::Error {
    Error::ResourceNotFound {
        pass: pass.name.clone(),
        pipeline: pipeline.to_owned(),
        resource: resource.to_owned(),
    }
    .into()
}

/// Resolve a single binding for `frame`. Returns `None` for bindings the scene binds per draw.
pub fn resolve_binding(
    pass: &PassSpec,
    pipeline: &str,
    binding: &BindingSpec,
    set: vk::DescriptorSet,
    frame: usize,
    attachments: &Attachments,
    provider: &dyn ResourceProvider,
) -> Result<Option<DescriptorWrite>> {
    let Some(resource) = &binding.resource else { return Ok(None); };
    let ty = binding.kind.descriptor_type();
    let write = match binding.kind {
        BindingKind::CombinedImageSampler => {
            // A pass never samples its own outputs.
            let attachment = attachments.get(resource).filter(|a| a.pass != pass.name);
            let (image_view, sampler) = match attachment {
                Some(attachment) => {
                    let view = attachment
                        .sampled_view(frame)
                        .ok_or_else(|| not_found(pass, pipeline, resource))?;
                    let sampler = attachment.sampler.ok_or_else(|| not_found(pass, pipeline, resource))?;
                    (view, sampler)
                }
                None => provider
                    .texture(resource)
                    .ok_or_else(|| not_found(pass, pipeline, resource))?,
            };
            DescriptorWrite::Image {
                set,
                binding: binding.slot,
                ty,
                info: vk::DescriptorImageInfo {
                    sampler,
                    image_view,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                },
            }
        }
        BindingKind::UniformBuffer | BindingKind::UniformBufferDynamic => {
            let buffer = provider
                .uniform_buffer(resource, frame)
                .ok_or_else(|| not_found(pass, pipeline, resource))?;
            DescriptorWrite::Buffer {
                set,
                binding: binding.slot,
                ty,
                info: buffer.to_vk(),
            }
        }
        BindingKind::StorageBuffer => {
            let buffer = provider
                .storage_buffer(resource, frame)
                .ok_or_else(|| not_found(pass, pipeline, resource))?;
            DescriptorWrite::Buffer {
                set,
                binding: binding.slot,
                ty,
                info: buffer.to_vk(),
            }
        }
    };
    Ok(Some(write))
}

/// Write the descriptor sets of every pipeline in a pass, for every frame in flight.
pub(crate) fn bind_pass<D: DeviceInterface + ?Sized>(
    device: &D,
    pass: &PassSpec,
    pipelines: &PassPipelines,
    attachments: &Attachments,
    provider: &dyn ResourceProvider,
) -> Result<usize> {
    if pipelines.len() != pass.pipelines().count() {
        return Err(Error::InvalidPassConfiguration {
            pass: pass.name.clone(),
            reason: format!(
                "{} pipelines declared, but {} were compiled",
                pass.pipelines().count(),
                pipelines.len()
            ),
        }
        .into());
    }
    let mut total = 0;
    // Compiled pipelines are laid out exactly like the declared groups.
    for (spec, compiled) in pass.pipelines().zip(pipelines.iter()) {
        for (frame, &set) in compiled.descriptor_sets.iter().enumerate() {
            let mut writes = Vec::new();
            for binding in spec.bindings() {
                if let Some(write) = resolve_binding(pass, &spec.name, binding, set, frame, attachments, provider)? {
                    writes.push(write);
                }
            }
            if !writes.is_empty() {
                total += writes.len();
                device.update_descriptor_sets(&writes);
            }
        }
    }
    Ok(total)
}
