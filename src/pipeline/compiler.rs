//! Turns the pipeline descriptions of a pass into Vulkan objects.
//!
//! Per pipeline this creates a descriptor set layout, a pipeline layout, the pipeline itself and one descriptor
//! set per frame in flight. Descriptor sets come from a single pool per pass. None of these objects depend on the
//! surface extent, so they are kept when the graph is recreated.

use anyhow::Result;
use ash::vk;

use crate::description::{PassSpec, PipelineSpec};
use crate::descriptor::DescriptorPoolSize;
use crate::device::{name_object, DeviceInterface};
use crate::pipeline::{DescriptorSetLayoutCreateInfo, PipelineBuilder, PipelineLayoutCreateInfo, ShaderCreateInfo, ShaderLoader};
use crate::Error;

/// A compiled graphics pipeline with its layouts and per-frame descriptor sets.
#[derive(Debug, Clone)]
pub struct CompiledPipeline {
    pub name: String,
    pub set_layout: vk::DescriptorSetLayout,
    pub layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
    /// One per frame in flight. Empty if the pipeline declares no bindings.
    pub descriptor_sets: Vec<vk::DescriptorSet>,
}

/// All pipelines of one pass, grouped the same way as the description.
#[derive(Debug, Default)]
pub struct PassPipelines {
    /// `None` when no pipeline of the pass declares a binding.
    pub pool: Option<vk::DescriptorPool>,
    pub groups: Vec<Vec<CompiledPipeline>>,
}

impl PassPipelines {
    pub fn get(&self, name: &str) -> Option<&CompiledPipeline> {
        self.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledPipeline> {
        self.groups.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Destroy pipelines, then layouts, then the descriptor pool (which frees the sets).
    pub(crate) fn destroy<D: DeviceInterface + ?Sized>(&mut self, device: &D) {
        let pipelines = self.groups.drain(..).flatten().collect::<Vec<_>>();
        for pipeline in &pipelines {
            device.destroy_pipeline(pipeline.pipeline);
        }
        for pipeline in &pipelines {
            device.destroy_pipeline_layout(pipeline.layout);
            device.destroy_descriptor_set_layout(pipeline.set_layout);
        }
        if let Some(pool) = self.pool.take() {
            device.destroy_descriptor_pool(pool);
        }
    }
}

fn compilation_error(pipeline: &str, reason: impl ToString) -> anyhow::Error {
    Error::PipelineCompilation {
        pipeline: pipeline.to_owned(),
        reason: reason.to_string(),
    }
    .into()
}

#[allow(clippy::too_many_arguments)]
fn compile_group<D: DeviceInterface + ?Sized>(
    device: &D,
    pass: &PassSpec,
    group: &[PipelineSpec],
    render_pass: vk::RenderPass,
    samples: vk::SampleCountFlags,
    loader: &dyn ShaderLoader,
    pool: Option<vk::DescriptorPool>,
    frames_in_flight: usize,
    debug_names: bool,
    out: &mut Vec<CompiledPipeline>,
) -> Result<()> {
    for spec in group {
        out.push(compile_pipeline(device, pass, spec, render_pass, samples, loader, debug_names)?);
        if spec.bindings().next().is_none() {
            continue;
        }
        let pool = pool.ok_or_else(|| compilation_error(&spec.name, "no descriptor pool"))?;
        if let Some(compiled) = out.last_mut() {
            let layouts = vec![compiled.set_layout; frames_in_flight];
            compiled.descriptor_sets = device.allocate_descriptor_sets(pool, &layouts)?;
            for (i, set) in compiled.descriptor_sets.iter().enumerate() {
                name_object(device, debug_names, *set, format!("{}_{}_DescriptorSet_{i}", pass.name, spec.name));
            }
        }
    }
    Ok(())
}

/// Compile every pipeline of `pass` against its render pass. Objects created before a failure are left in `out`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn compile_pass<D: DeviceInterface + ?Sized>(
    device: &D,
    pass: &PassSpec,
    render_pass: vk::RenderPass,
    samples: vk::SampleCountFlags,
    loader: &dyn ShaderLoader,
    frames_in_flight: usize,
    debug_names: bool,
    out: &mut PassPipelines,
) -> Result<()> {
    let (size, max_sets) = DescriptorPoolSize::for_pipelines(pass.pipelines(), frames_in_flight as u32);
    if size.total() > 0 {
        trace!("Descriptor pool for pass `{}`: {size}", pass.name);
        out.pool = Some(device.create_descriptor_pool(&size, max_sets)?);
    }

    for group in &pass.pipeline_groups {
        let mut compiled = Vec::with_capacity(group.len());
        let result = compile_group(device, pass, group, render_pass, samples, loader, out.pool, frames_in_flight, debug_names, &mut compiled);
        // Keep whatever was created so it is released with the rest of the pass.
        out.groups.push(compiled);
        result?;
    }
    debug!("Compiled {} pipelines for pass `{}`", out.len(), pass.name);
    Ok(())
}

fn load_shader<D: DeviceInterface + ?Sized>(
    device: &D,
    loader: &dyn ShaderLoader,
    pipeline: &str,
    stage: vk::ShaderStageFlags,
    location: &str,
) -> Result<(ShaderCreateInfo, vk::ShaderModule)> {
    let code = loader
        .load(location)
        .map_err(|e| compilation_error(pipeline, format!("failed to load `{location}`: {e}")))?;
    if code.is_empty() {
        return Err(compilation_error(pipeline, format!("`{location}` contains no SPIR-V")));
    }
    let info = ShaderCreateInfo::from_spirv(stage, code);
    let module = device
        .create_shader_module(info.code())
        .map_err(|e| compilation_error(pipeline, format!("invalid shader module `{location}`: {e}")))?;
    Ok((info, module))
}

fn compile_pipeline<D: DeviceInterface + ?Sized>(
    device: &D,
    pass: &PassSpec,
    spec: &PipelineSpec,
    render_pass: vk::RenderPass,
    samples: vk::SampleCountFlags,
    loader: &dyn ShaderLoader,
    debug_names: bool,
) -> Result<CompiledPipeline> {
    let set_layout = device.create_descriptor_set_layout(&DescriptorSetLayoutCreateInfo::from_bindings(spec.bindings()))?;
    let layout = match device.create_pipeline_layout(&PipelineLayoutCreateInfo::new(set_layout, spec.push_constant_size)) {
        Ok(layout) => layout,
        Err(e) => {
            device.destroy_descriptor_set_layout(set_layout);
            return Err(e);
        }
    };

    let pipeline = build_pipeline(device, pass, spec, layout, render_pass, samples, loader);
    match pipeline {
        Ok(pipeline) => {
            name_object(device, debug_names, pipeline, format!("{}_{}_Pipeline", pass.name, spec.name));
            Ok(CompiledPipeline {
                name: spec.name.clone(),
                set_layout,
                layout,
                pipeline,
                descriptor_sets: vec![],
            })
        }
        Err(e) => {
            device.destroy_pipeline_layout(layout);
            device.destroy_descriptor_set_layout(set_layout);
            Err(e)
        }
    }
}

fn build_pipeline<D: DeviceInterface + ?Sized>(
    device: &D,
    pass: &PassSpec,
    spec: &PipelineSpec,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    samples: vk::SampleCountFlags,
    loader: &dyn ShaderLoader,
) -> Result<vk::Pipeline> {
    let mut modules = Vec::with_capacity(2);
    let result = (|| {
        let (vertex, vertex_module) = load_shader(device, loader, &spec.name, vk::ShaderStageFlags::VERTEX, &spec.vertex_shader)?;
        modules.push(vertex_module);
        let (fragment, fragment_module) = load_shader(device, loader, &spec.name, vk::ShaderStageFlags::FRAGMENT, &spec.fragment_shader)?;
        modules.push(fragment_module);

        let mut builder = PipelineBuilder::new(spec.name.clone())
            .attach_shader(vertex.stage(), vertex_module)
            .attach_shader(fragment.stage(), fragment_module)
            .dynamic_states(&[vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR])
            .depth(spec.depth.test_enable, spec.depth.write_enable, spec.depth.compare_op)
            .cull_mask(spec.raster.cull_mode)
            .front_face(spec.raster.front_face)
            .polygon_mode(spec.raster.polygon_mode)
            .samples(samples);
        if let Some(vertex_layout) = &spec.vertex_layout {
            builder = builder.vertex_input(0, vertex_layout.stride, vk::VertexInputRate::VERTEX);
            for attribute in &vertex_layout.attributes {
                builder = builder.vertex_attribute(0, attribute.location, attribute.offset, attribute.format)?;
            }
        }
        for _ in pass.color_outputs() {
            builder = if spec.blend_enable {
                builder.blend_attachment_alpha()
            } else {
                builder.blend_attachment_none()
            };
        }
        let info = builder.build();
        device
            .create_graphics_pipeline(&info, layout, render_pass)
            .map_err(|e| compilation_error(&spec.name, e))
    })();

    // Modules are only needed while creating the pipeline.
    for module in modules {
        device.destroy_shader_module(module);
    }
    result
}
