//! Allocation of the images backing pass outputs.
//!
//! Every output becomes an [`Attachment`] with one image per frame in flight. The terminal pass has one image per
//! presentable surface image instead, and renders its color output straight into the surface (or resolves into it,
//! when multisampled). Multisampled passes get an extra single-sampled resolve image per color output, which is what
//! later passes sample from.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use ash::vk;

use crate::core::settings::{GraphSettings, SurfaceInfo};
use crate::description::{parse, BindingKind, ClearValue, PassSpec, ResourceKind};
use crate::device::{name_object, AllocatedImage, DeviceInterface, ImageCreateInfo};
use crate::graph::dag::Dag;
use crate::resource::SamplerCreateInfo;
use crate::Error;

/// The images backing one pass output.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub pass: String,
    pub output: String,
    pub kind: ResourceKind,
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub extent: vk::Extent2D,
    pub clear: ClearValue,
    /// Images owned by this attachment. Empty when the attachment renders directly into the surface.
    pub images: Vec<AllocatedImage>,
    /// One view per frame (or per surface image for the terminal pass).
    pub views: Vec<vk::ImageView>,
    /// Single sampled resolve images, only for color outputs of multisampled non-terminal passes.
    pub resolve_images: Vec<AllocatedImage>,
    /// Views the multisampled image resolves into. These are surface views for the terminal pass.
    pub resolve_views: Vec<vk::ImageView>,
    /// Present when another pass samples this attachment.
    pub sampler: Option<vk::Sampler>,
}

impl Attachment {
    /// Number of per-frame instances.
    pub fn count(&self) -> usize {
        self.views.len()
    }

    pub fn is_multisampled(&self) -> bool {
        self.samples != vk::SampleCountFlags::TYPE_1
    }

    /// The view another pass samples for `frame`. This is the resolve image if there is one.
    pub fn sampled_view(&self, frame: usize) -> Option<vk::ImageView> {
        let views = if self.resolve_views.is_empty() {
            &self.views
        } else {
            &self.resolve_views
        };
        if views.is_empty() {
            None
        } else {
            views.get(frame % views.len()).copied()
        }
    }
}

/// All attachments of a graph, keyed by output name.
#[derive(Debug, Default)]
pub struct Attachments {
    attachments: Vec<Attachment>,
    by_output: HashMap<String, usize>,
    by_pass: HashMap<usize, Vec<usize>>,
}

/// Output names another pass binds as a sampled image.
fn sampled_outputs(passes: &[PassSpec]) -> HashSet<&str> {
    let mut sampled = HashSet::new();
    for pass in passes {
        for binding in pass.pipelines().flat_map(|p| p.bindings()) {
            if binding.kind != BindingKind::CombinedImageSampler {
                continue;
            }
            if let Some(resource) = &binding.resource {
                if !pass.outputs.iter().any(|o| &o.name == resource) {
                    sampled.insert(resource.as_str());
                }
            }
        }
    }
    sampled
}

/// Sample count a pass renders with.
pub(crate) fn pass_samples(pass: &PassSpec, settings: &GraphSettings) -> vk::SampleCountFlags {
    if pass.uses_multisampling {
        settings.msaa_samples
    } else {
        vk::SampleCountFlags::TYPE_1
    }
}

fn default_clear(kind: ResourceKind, settings: &GraphSettings) -> ClearValue {
    match kind {
        ResourceKind::Color => ClearValue::Color(settings.default_clear_color),
        ResourceKind::Depth => ClearValue::DepthStencil {
            depth: settings.default_clear_depth.0,
            stencil: settings.default_clear_depth.1,
        },
    }
}

impl Attachments {
    /// Allocate the attachments of every pass, in layer order. Anything created before a failure stays in `self`
    /// so it can be destroyed.
    pub(crate) fn allocate<D: DeviceInterface + ?Sized>(
        &mut self,
        device: &D,
        passes: &[PassSpec],
        dag: &Dag,
        surface: &SurfaceInfo,
        settings: &GraphSettings,
    ) -> Result<()> {
        if surface.image_count() == 0 {
            return Err(Error::InvalidPassConfiguration {
                pass: dag.terminal().to_owned(),
                reason: String::from("the surface has no images to render to"),
            }
            .into());
        }
        let sampled = sampled_outputs(passes);
        for &index in dag.layer_indices().iter().flatten() {
            self.allocate_pass(device, index, &passes[index], dag.is_terminal(index), &sampled, surface, settings)?;
        }
        info!(
            "Allocated {} attachments ({} images) for {} passes",
            self.attachments.len(),
            self.attachments
                .iter()
                .map(|a| a.images.len() + a.resolve_images.len())
                .sum::<usize>(),
            passes.len()
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn allocate_pass<D: DeviceInterface + ?Sized>(
        &mut self,
        device: &D,
        index: usize,
        pass: &PassSpec,
        terminal: bool,
        sampled: &HashSet<&str>,
        surface: &SurfaceInfo,
        settings: &GraphSettings,
    ) -> Result<()> {
        let samples = pass_samples(pass, settings);
        let multisampled = samples != vk::SampleCountFlags::TYPE_1;
        let extent = pass.resolved_extent(surface.extent);
        let count = if terminal {
            surface.image_count()
        } else {
            settings.frames_in_flight
        };

        for output in &pass.outputs {
            if terminal && output.kind == ResourceKind::Color && output.format != surface.format {
                warn!(
                    "Terminal output `{}` has format {:?}, but the surface uses {:?}.",
                    output.name, output.format, surface.format
                );
            }
            let attachment_index = self.attachments.len();
            self.attachments.push(Attachment {
                pass: pass.name.clone(),
                output: output.name.clone(),
                kind: output.kind,
                format: output.format,
                samples,
                extent,
                clear: output.clear.unwrap_or_else(|| default_clear(output.kind, settings)),
                images: vec![],
                views: vec![],
                resolve_images: vec![],
                resolve_views: vec![],
                sampler: None,
            });
            self.by_output.insert(output.name.clone(), attachment_index);
            self.by_pass.entry(index).or_default().push(attachment_index);
            let attachment = &mut self.attachments[attachment_index];

            match output.kind {
                ResourceKind::Color if terminal && !multisampled => {
                    attachment.views = surface.views.clone();
                }
                ResourceKind::Color => {
                    let usage = if multisampled {
                        vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT
                    } else {
                        vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED
                    };
                    let info = ImageCreateInfo {
                        extent,
                        format: output.format,
                        samples,
                        usage,
                        aspect: vk::ImageAspectFlags::COLOR,
                    };
                    for i in 0..count {
                        let image = device.create_image(&info)?;
                        name_object(device, settings.debug_names, image.image, format!("{}_{}_Image_{i}", pass.name, output.name));
                        attachment.images.push(image);
                        attachment.views.push(image.view);
                    }

                    if multisampled && terminal {
                        attachment.resolve_views = surface.views.clone();
                    } else if multisampled {
                        let info = ImageCreateInfo {
                            extent,
                            format: output.format,
                            samples: vk::SampleCountFlags::TYPE_1,
                            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
                            aspect: vk::ImageAspectFlags::COLOR,
                        };
                        for i in 0..count {
                            let image = device.create_image(&info)?;
                            name_object(
                                device,
                                settings.debug_names,
                                image.image,
                                format!("{}_{}_ResolveImage_{i}", pass.name, output.name),
                            );
                            attachment.resolve_images.push(image);
                            attachment.resolve_views.push(image.view);
                        }
                    }
                }
                ResourceKind::Depth => {
                    let aspect = if parse::has_stencil(output.format) {
                        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
                    } else {
                        vk::ImageAspectFlags::DEPTH
                    };
                    let info = ImageCreateInfo {
                        extent,
                        format: output.format,
                        samples,
                        usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                        aspect,
                    };
                    for i in 0..count {
                        let image = device.create_image(&info)?;
                        name_object(device, settings.debug_names, image.image, format!("{}_{}_Depth_{i}", pass.name, output.name));
                        attachment.images.push(image);
                        attachment.views.push(image.view);
                    }
                }
            }

            if sampled.contains(output.name.as_str()) {
                let sampler = device.create_sampler(&SamplerCreateInfo::attachment())?;
                name_object(device, settings.debug_names, sampler, format!("{}_{}_Sampler", pass.name, output.name));
                attachment.sampler = Some(sampler);
            }
        }
        Ok(())
    }

    /// Look up the attachment backing an output.
    pub fn get(&self, output: &str) -> Option<&Attachment> {
        self.by_output.get(output).map(|&i| &self.attachments[i])
    }

    /// Attachments of a pass, in output declaration order.
    pub fn of_pass(&self, pass: usize) -> impl Iterator<Item = &Attachment> {
        self.by_pass
            .get(&pass)
            .into_iter()
            .flatten()
            .map(|&i| &self.attachments[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attachment> {
        self.attachments.iter()
    }

    pub fn len(&self) -> usize {
        self.attachments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attachments.is_empty()
    }

    /// Destroy all samplers and owned images. Surface views are not touched.
    pub(crate) fn destroy<D: DeviceInterface + ?Sized>(&mut self, device: &D) {
        for attachment in self.attachments.iter().rev() {
            if let Some(sampler) = attachment.sampler {
                device.destroy_sampler(sampler);
            }
        }
        for attachment in self.attachments.drain(..).rev() {
            for image in attachment.resolve_images.iter().chain(attachment.images.iter()) {
                device.destroy_image(image);
            }
        }
        self.by_output.clear();
        self.by_pass.clear();
    }
}
