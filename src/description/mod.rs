//! The graph description is the authoring format of a render graph: a JSON list of passes with their
//! inputs, outputs and pipelines. Enumerated values are written as strings (e.g. `VK_FORMAT_D32_SFLOAT`)
//! and resolved into Vulkan types exactly once, by [`GraphDescription::parse`].
//!
//! # Example
//! ```
//! # use strata::prelude::*;
//! let json = r#"[
//!     {
//!         "name": "main",
//!         "useMultisampling": false,
//!         "inputs": [],
//!         "outputs": [{ "name": "swapchain_color", "kind": "Color", "format": "VK_FORMAT_B8G8R8A8_SRGB" }],
//!         "pipelineGroups": [[{
//!             "name": "triangle",
//!             "shaderVert": "triangle.vert.spv",
//!             "shaderFrag": "triangle.frag.spv",
//!             "rasterState": { "cullMode": "NONE" }
//!         }]]
//!     }
//! ]"#;
//! let passes = GraphDescription::from_json(json)?.parse()?;
//! assert_eq!(passes[0].outputs[0].format, vk::Format::B8G8R8A8_SRGB);
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use anyhow::Result;
use ash::vk;
use serde::{Deserialize, Serialize};

pub use types::*;

use crate::Error;

pub mod parse;
pub mod types;

/// A complete render graph as authored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphDescription {
    pub passes: Vec<PassDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassDescription {
    pub name: String,
    #[serde(default, alias = "useMultiSampling")]
    pub use_multisampling: bool,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<OutputDescription>,
    #[serde(default)]
    pub pipeline_groups: Vec<Vec<PipelineDescription>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<ExtentDescription>,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct ExtentDescription {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDescription {
    pub name: String,
    #[serde(default)]
    pub kind: ResourceKind,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear: Option<ClearDescription>,
    #[serde(default)]
    pub consumed: bool,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClearDescription {
    Color {
        color: [f32; 4],
    },
    DepthStencil {
        depth: f32,
        #[serde(default)]
        stencil: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDescription {
    pub name: String,
    pub shader_vert: String,
    pub shader_frag: String,
    #[serde(default)]
    pub descriptor_sets: Vec<DescriptorSetDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertex_input: Option<VertexInputDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_state: Option<DepthStateDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raster_state: Option<RasterStateDescription>,
    #[serde(default)]
    pub enable_blending: bool,
    #[serde(default)]
    pub push_constant_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptorSetDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub bindings: Vec<BindingDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingDescription {
    pub binding: u32,
    #[serde(rename = "type")]
    pub ty: String,
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexInputDescription {
    pub attributes: Vec<VertexAttributeDescription>,
    pub stride: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexAttributeDescription {
    pub name: String,
    pub format: String,
    pub location: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthStateDescription {
    #[serde(default)]
    pub test_enable: bool,
    #[serde(default)]
    pub write_enable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_op: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterStateDescription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cull_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front_face: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon_mode: Option<String>,
}

impl GraphDescription {
    /// Deserialize a graph description from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::from(e).into())
    }

    /// Deserialize a graph description from any reader.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        serde_json::from_reader(reader).map_err(|e| Error::from(e).into())
    }

    /// Read and deserialize a graph description file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(Error::from)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Serialize back to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::from(e).into())
    }

    /// Resolve every string enum and validate each pass in isolation. Cross-pass validation
    /// (dependencies, cycles, duplicate outputs) happens in [`Dag::build`](crate::Dag::build).
    /// # Errors
    /// - [`Error::DuplicatePass`] if two passes share a name.
    /// - [`Error::UnsupportedFormat`], [`Error::UnsupportedBindingType`], [`Error::UnsupportedShaderStage`] or
    ///   [`Error::UnsupportedValue`] on an unknown string.
    /// - [`Error::InvalidPassConfiguration`] if a pass declares more than one depth output, an output whose format does
    ///   not match its kind, two pipelines with the same name, or two bindings on the same slot of a pipeline.
    pub fn parse(&self) -> Result<Vec<PassSpec>> {
        let mut names = HashSet::new();
        self.passes
            .iter()
            .map(|pass| {
                if !names.insert(pass.name.as_str()) {
                    return Err(Error::DuplicatePass(pass.name.clone()).into());
                }
                pass.parse()
            })
            .collect()
    }
}

impl PassDescription {
    fn parse(&self) -> Result<PassSpec> {
        let invalid = |reason: String| -> anyhow::Error {
            Error::InvalidPassConfiguration {
                pass: self.name.clone(),
                reason,
            }
            .into()
        };

        let outputs = self
            .outputs
            .iter()
            .map(|output| {
                let format = parse::format(&output.format)?;
                let is_depth = parse::is_depth_format(format);
                match output.kind {
                    ResourceKind::Depth if !is_depth => {
                        return Err(invalid(format!("depth output `{}` uses color format {format:?}", output.name)));
                    }
                    ResourceKind::Color if is_depth => {
                        return Err(invalid(format!("color output `{}` uses depth format {format:?}", output.name)));
                    }
                    _ => {}
                }
                Ok(OutputSpec {
                    name: output.name.clone(),
                    kind: output.kind,
                    format,
                    clear: output.clear.map(|clear| match clear {
                        ClearDescription::Color {
                            color,
                        } => ClearValue::Color(color),
                        ClearDescription::DepthStencil {
                            depth,
                            stencil,
                        } => ClearValue::DepthStencil {
                            depth,
                            stencil,
                        },
                    }),
                    consumed: output.consumed,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let depth_count = outputs.iter().filter(|o| o.kind == ResourceKind::Depth).count();
        if depth_count > 1 {
            return Err(invalid(format!("{depth_count} depth outputs declared, at most one is allowed")));
        }

        let pipeline_groups = self
            .pipeline_groups
            .iter()
            .map(|group| group.iter().map(|p| p.parse(&self.name)).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;

        // Pipelines are looked up by name within their pass.
        let mut pipeline_names = HashSet::new();
        for pipeline in pipeline_groups.iter().flatten() {
            if !pipeline_names.insert(pipeline.name.as_str()) {
                return Err(invalid(format!("pipeline `{}` is declared more than once", pipeline.name)));
            }
        }

        Ok(PassSpec {
            name: self.name.clone(),
            uses_multisampling: self.use_multisampling,
            inputs: self.inputs.clone(),
            outputs,
            pipeline_groups,
            extent: self.extent.map(|e| vk::Extent2D {
                width: e.width,
                height: e.height,
            }),
        })
    }
}

impl PipelineDescription {
    fn parse(&self, pass: &str) -> Result<PipelineSpec> {
        if self.name.is_empty() {
            return Err(Error::InvalidPassConfiguration {
                pass: pass.to_owned(),
                reason: "pipeline without a name".to_owned(),
            }
            .into());
        }

        let mut slots = HashSet::new();
        let descriptor_sets = self
            .descriptor_sets
            .iter()
            .map(|set| {
                let bindings = set
                    .bindings
                    .iter()
                    .map(|b| {
                        if !slots.insert(b.binding) {
                            return Err(Error::InvalidPassConfiguration {
                                pass: pass.to_owned(),
                                reason: format!("pipeline `{}` binds slot {} twice", self.name, b.binding),
                            }
                            .into());
                        }
                        Ok(BindingSpec {
                            slot: b.binding,
                            kind: parse::binding_kind(&b.ty)?,
                            stages: parse::shader_stages(&b.stage)?,
                            resource: b.resource.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(DescriptorSetSpec {
                    name: set.name.clone(),
                    bindings,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let vertex_layout = match &self.vertex_input {
            None => None,
            Some(input) => Some(VertexLayout {
                stride: input.stride,
                attributes: input
                    .attributes
                    .iter()
                    .map(|a| {
                        Ok(VertexAttribute {
                            name: a.name.clone(),
                            format: parse::vertex_format(&a.format)?,
                            location: a.location,
                            offset: a.offset,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
            }),
        };

        let depth = match &self.depth_state {
            None => DepthState::default(),
            Some(state) => DepthState {
                test_enable: state.test_enable,
                write_enable: state.write_enable,
                compare_op: match &state.compare_op {
                    Some(op) => parse::compare_op(op)?,
                    None => vk::CompareOp::LESS,
                },
            },
        };

        let raster_desc = self.raster_state.clone().unwrap_or_default();
        let defaults = RasterState::default();
        let raster = RasterState {
            cull_mode: raster_desc.cull_mode.as_deref().map(parse::cull_mode).transpose()?.unwrap_or(defaults.cull_mode),
            front_face: raster_desc.front_face.as_deref().map(parse::front_face).transpose()?.unwrap_or(defaults.front_face),
            polygon_mode: raster_desc
                .polygon_mode
                .as_deref()
                .map(parse::polygon_mode)
                .transpose()?
                .unwrap_or(defaults.polygon_mode),
        };

        Ok(PipelineSpec {
            name: self.name.clone(),
            vertex_shader: self.shader_vert.clone(),
            fragment_shader: self.shader_frag.clone(),
            descriptor_sets,
            vertex_layout,
            depth,
            raster,
            blend_enable: self.enable_blending,
            push_constant_size: self.push_constant_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASS: &str = r#"[{
        "name": "scene_pass",
        "useMultiSampling": true,
        "outputs": [
            { "name": "scene_color", "kind": "Color", "format": "VK_FORMAT_B8G8R8A8_SRGB", "clear": { "color": [0.1, 0.2, 0.3, 1.0] } },
            { "name": "scene_depth", "kind": "Depth", "format": "VK_FORMAT_D32_SFLOAT", "clear": { "depth": 1.0 } }
        ],
        "pipelineGroups": [[{
            "name": "mesh",
            "shaderVert": "mesh.vert.spv",
            "shaderFrag": "mesh.frag.spv",
            "descriptorSets": [{ "bindings": [
                { "binding": 0, "type": "VK_DESCRIPTOR_TYPE_UNIFORM_BUFFER", "stage": "VERTEX", "resource": "camera" },
                { "binding": 1, "type": "VK_DESCRIPTOR_TYPE_COMBINED_IMAGE_SAMPLER", "stage": "FRAGMENT" }
            ]}],
            "vertexInput": { "stride": 20, "attributes": [
                { "name": "position", "format": "Vec3", "location": 0, "offset": 0 },
                { "name": "uv", "format": "Vec2", "location": 1, "offset": 12 }
            ]},
            "depthState": { "testEnable": true, "writeEnable": false, "compareOp": "LESS_OR_EQUAL" },
            "pushConstantSize": 64
        }]]
    }]"#;

    #[test]
    fn parses_full_pass() {
        let passes = GraphDescription::from_json(PASS).unwrap().parse().unwrap();
        let pass = &passes[0];
        assert!(pass.uses_multisampling);
        assert_eq!(pass.outputs.len(), 2);
        assert_eq!(pass.outputs[0].clear, Some(ClearValue::Color([0.1, 0.2, 0.3, 1.0])));
        assert_eq!(
            pass.outputs[1].clear,
            Some(ClearValue::DepthStencil {
                depth: 1.0,
                stencil: 0
            })
        );
        let pipeline = &pass.pipeline_groups[0][0];
        assert_eq!(pipeline.bindings().count(), 2);
        assert_eq!(pipeline.bindings().nth(1).unwrap().resource, None);
        assert_eq!(pipeline.vertex_layout.as_ref().unwrap().attributes[1].format, vk::Format::R32G32_SFLOAT);
        assert_eq!(pipeline.depth.compare_op, vk::CompareOp::LESS_OR_EQUAL);
        assert!(!pipeline.depth.write_enable);
        assert_eq!(pipeline.raster, RasterState::default());
        assert_eq!(pipeline.push_constant_size, 64);
    }

    #[test]
    fn json_roundtrip_preserves_structure() {
        let desc = GraphDescription::from_json(PASS).unwrap();
        let again = GraphDescription::from_json(&desc.to_json().unwrap()).unwrap();
        assert_eq!(desc.parse().unwrap(), again.parse().unwrap());
    }

    #[test]
    fn two_depth_outputs_are_rejected() {
        let json = r#"[{ "name": "p", "outputs": [
            { "name": "a", "kind": "Depth", "format": "D32_SFLOAT" },
            { "name": "b", "kind": "Depth", "format": "D16_UNORM" }
        ]}]"#;
        let err = GraphDescription::from_json(json).unwrap().parse().unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidPassConfiguration { .. })));
    }

    #[test]
    fn unknown_binding_type_is_rejected() {
        let json = r#"[{ "name": "p", "pipelineGroups": [[{
            "name": "x", "shaderVert": "a", "shaderFrag": "b",
            "descriptorSets": [{ "bindings": [{ "binding": 0, "type": "VK_DESCRIPTOR_TYPE_SAMPLER", "stage": "FRAGMENT" }] }]
        }]]}]"#;
        let err = GraphDescription::from_json(json).unwrap().parse().unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::UnsupportedBindingType(_))));
    }

    #[test]
    fn duplicate_pipeline_names_are_rejected() {
        let json = r#"[{ "name": "p", "pipelineGroups": [
            [{ "name": "fs", "shaderVert": "a", "shaderFrag": "b" }],
            [{ "name": "fs", "shaderVert": "c", "shaderFrag": "d" }]
        ]}]"#;
        let err = GraphDescription::from_json(json).unwrap().parse().unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::InvalidPassConfiguration {
                pass,
                reason,
            }) => {
                assert_eq!(pass, "p");
                assert!(reason.contains("fs"), "{reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn duplicate_pass_names_are_rejected() {
        let json = r#"[{ "name": "p" }, { "name": "p" }]"#;
        let err = GraphDescription::from_json(json).unwrap().parse().unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::DuplicatePass(_))));
    }
}
