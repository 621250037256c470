//! Typed pass and pipeline descriptions. These are produced once by [`GraphDescription::parse`](crate::GraphDescription::parse)
//! and are read-only for the lifetime of the graph.

use ash::vk;

/// What an output is rendered as.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum ResourceKind {
    #[default]
    Color,
    Depth,
}

/// Clear value of an output. Converted to [`vk::ClearValue`] when beginning the render pass.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ClearValue {
    Color([f32; 4]),
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    pub fn to_vk(&self) -> vk::ClearValue {
        match *self {
            ClearValue::Color(float32) => vk::ClearValue {
                color: vk::ClearColorValue {
                    float32,
                },
            },
            ClearValue::DepthStencil {
                depth,
                stencil,
            } => vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth,
                    stencil,
                },
            },
        }
    }
}

/// A named render target written by a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSpec {
    pub name: String,
    pub kind: ResourceKind,
    pub format: vk::Format,
    pub clear: Option<ClearValue>,
    /// Authoring hint that a later pass reads this output. Only used to silence the dead output warning.
    pub consumed: bool,
}

/// Descriptor types a binding may declare.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BindingKind {
    UniformBuffer,
    UniformBufferDynamic,
    StorageBuffer,
    CombinedImageSampler,
}

impl BindingKind {
    pub fn descriptor_type(&self) -> vk::DescriptorType {
        match self {
            BindingKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            BindingKind::UniformBufferDynamic => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            BindingKind::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
            BindingKind::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        }
    }
}

/// One slot in a descriptor set.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingSpec {
    pub slot: u32,
    pub kind: BindingKind,
    pub stages: vk::ShaderStageFlags,
    /// Name of the resource bound once per frame. `None` means the scene binds it per draw.
    pub resource: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorSetSpec {
    pub name: Option<String>,
    pub bindings: Vec<BindingSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexAttribute {
    pub name: String,
    pub format: vk::Format,
    pub location: u32,
    pub offset: u32,
}

/// Layout of the single per-vertex buffer a pipeline reads.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DepthState {
    pub test_enable: bool,
    pub write_enable: bool,
    pub compare_op: vk::CompareOp,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            test_enable: true,
            write_enable: true,
            compare_op: vk::CompareOp::LESS,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RasterState {
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub polygon_mode: vk::PolygonMode,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            polygon_mode: vk::PolygonMode::FILL,
        }
    }
}

/// A graphics pipeline that runs inside a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSpec {
    pub name: String,
    pub vertex_shader: String,
    pub fragment_shader: String,
    pub descriptor_sets: Vec<DescriptorSetSpec>,
    pub vertex_layout: Option<VertexLayout>,
    pub depth: DepthState,
    pub raster: RasterState,
    pub blend_enable: bool,
    pub push_constant_size: u32,
}

impl PipelineSpec {
    /// All bindings of all sets, in declaration order.
    pub fn bindings(&self) -> impl Iterator<Item = &BindingSpec> {
        self.descriptor_sets.iter().flat_map(|set| set.bindings.iter())
    }
}

/// Pipelines recorded together into one secondary command buffer.
pub type PipelineGroup = Vec<PipelineSpec>;

/// One stage of rendering with a fixed set of outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct PassSpec {
    pub name: String,
    pub uses_multisampling: bool,
    pub inputs: Vec<String>,
    pub outputs: Vec<OutputSpec>,
    pub pipeline_groups: Vec<PipelineGroup>,
    /// Fixed render extent. `None` follows the surface extent.
    pub extent: Option<vk::Extent2D>,
}

impl PassSpec {
    /// Iterate over every pipeline in every group.
    pub fn pipelines(&self) -> impl Iterator<Item = &PipelineSpec> {
        self.pipeline_groups.iter().flat_map(|group| group.iter())
    }

    /// Color outputs, in declaration order.
    pub fn color_outputs(&self) -> impl Iterator<Item = &OutputSpec> {
        self.outputs.iter().filter(|o| o.kind == ResourceKind::Color)
    }

    /// The depth output, if any.
    pub fn depth_output(&self) -> Option<&OutputSpec> {
        self.outputs.iter().find(|o| o.kind == ResourceKind::Depth)
    }

    /// The extent this pass renders at.
    pub fn resolved_extent(&self, surface: vk::Extent2D) -> vk::Extent2D {
        self.extent.unwrap_or(surface)
    }
}
