//! Resolves the string enums of the authoring format into Vulkan values. Every function here is total over
//! a closed set and fails with a typed [`Error`] on anything else.

use anyhow::Result;
use ash::vk;

use crate::description::types::BindingKind;
use crate::Error;

/// Uppercases `value` and removes `prefix` if present, so both `VK_FORMAT_D32_SFLOAT` and `d32_sfloat` are accepted.
fn normalize(value: &str, prefix: &str) -> String {
    let upper = value.trim().to_ascii_uppercase();
    match upper.strip_prefix(prefix) {
        Some(stripped) => stripped.to_owned(),
        None => upper,
    }
}

/// Parse an image format string such as `VK_FORMAT_B8G8R8A8_SRGB`.
pub fn format(value: &str) -> Result<vk::Format> {
    let format = match normalize(value, "VK_FORMAT_").as_str() {
        "R8G8B8A8_UNORM" => vk::Format::R8G8B8A8_UNORM,
        "R8G8B8A8_SRGB" => vk::Format::R8G8B8A8_SRGB,
        "B8G8R8A8_UNORM" => vk::Format::B8G8R8A8_UNORM,
        "B8G8R8A8_SRGB" => vk::Format::B8G8R8A8_SRGB,
        "R16G16B16A16_SFLOAT" => vk::Format::R16G16B16A16_SFLOAT,
        "R32G32B32A32_SFLOAT" => vk::Format::R32G32B32A32_SFLOAT,
        "D32_SFLOAT" => vk::Format::D32_SFLOAT,
        "D24_UNORM_S8_UINT" => vk::Format::D24_UNORM_S8_UINT,
        "D16_UNORM" => vk::Format::D16_UNORM,
        _ => return Err(Error::UnsupportedFormat(value.to_owned()).into()),
    };
    Ok(format)
}

/// Whether `format` has a depth aspect.
pub fn is_depth_format(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT
            | vk::Format::D24_UNORM_S8_UINT
            | vk::Format::D16_UNORM
            | vk::Format::D32_SFLOAT_S8_UINT
            | vk::Format::D16_UNORM_S8_UINT
    )
}

/// Whether `format` has a stencil aspect.
pub fn has_stencil(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D16_UNORM_S8_UINT
    )
}

/// Parse a descriptor type string such as `VK_DESCRIPTOR_TYPE_COMBINED_IMAGE_SAMPLER`.
pub fn binding_kind(value: &str) -> Result<BindingKind> {
    let kind = match normalize(value, "VK_DESCRIPTOR_TYPE_").as_str() {
        "UNIFORM_BUFFER" => BindingKind::UniformBuffer,
        "UNIFORM_BUFFER_DYNAMIC" => BindingKind::UniformBufferDynamic,
        "STORAGE_BUFFER" => BindingKind::StorageBuffer,
        "COMBINED_IMAGE_SAMPLER" => BindingKind::CombinedImageSampler,
        _ => return Err(Error::UnsupportedBindingType(value.to_owned()).into()),
    };
    Ok(kind)
}

/// Parse a shader stage mask. Multiple stages are separated by `|`, e.g. `VERTEX|FRAGMENT`.
pub fn shader_stages(value: &str) -> Result<vk::ShaderStageFlags> {
    let mut flags = vk::ShaderStageFlags::empty();
    for part in value.split('|') {
        flags |= match normalize(part, "VK_SHADER_STAGE_").trim_end_matches("_BIT") {
            "VERTEX" => vk::ShaderStageFlags::VERTEX,
            "FRAGMENT" => vk::ShaderStageFlags::FRAGMENT,
            "ALL_GRAPHICS" => vk::ShaderStageFlags::ALL_GRAPHICS,
            _ => return Err(Error::UnsupportedShaderStage(value.to_owned()).into()),
        };
    }
    Ok(flags)
}

pub fn cull_mode(value: &str) -> Result<vk::CullModeFlags> {
    let mode = match normalize(value, "VK_CULL_MODE_").as_str() {
        "NONE" => vk::CullModeFlags::NONE,
        "FRONT" | "FRONT_BIT" => vk::CullModeFlags::FRONT,
        "BACK" | "BACK_BIT" => vk::CullModeFlags::BACK,
        "FRONT_AND_BACK" => vk::CullModeFlags::FRONT_AND_BACK,
        _ => return Err(unsupported("cullMode", value)),
    };
    Ok(mode)
}

pub fn front_face(value: &str) -> Result<vk::FrontFace> {
    let face = match normalize(value, "VK_FRONT_FACE_").as_str() {
        "CLOCKWISE" => vk::FrontFace::CLOCKWISE,
        "COUNTER_CLOCKWISE" => vk::FrontFace::COUNTER_CLOCKWISE,
        _ => return Err(unsupported("frontFace", value)),
    };
    Ok(face)
}

pub fn polygon_mode(value: &str) -> Result<vk::PolygonMode> {
    let mode = match normalize(value, "VK_POLYGON_MODE_").as_str() {
        "FILL" => vk::PolygonMode::FILL,
        "LINE" => vk::PolygonMode::LINE,
        _ => return Err(unsupported("polygonMode", value)),
    };
    Ok(mode)
}

pub fn compare_op(value: &str) -> Result<vk::CompareOp> {
    let op = match normalize(value, "VK_COMPARE_OP_").as_str() {
        "NEVER" => vk::CompareOp::NEVER,
        "LESS" => vk::CompareOp::LESS,
        "EQUAL" => vk::CompareOp::EQUAL,
        "LESS_OR_EQUAL" => vk::CompareOp::LESS_OR_EQUAL,
        "GREATER" => vk::CompareOp::GREATER,
        "NOT_EQUAL" => vk::CompareOp::NOT_EQUAL,
        "GREATER_OR_EQUAL" => vk::CompareOp::GREATER_OR_EQUAL,
        "ALWAYS" => vk::CompareOp::ALWAYS,
        _ => return Err(unsupported("compareOp", value)),
    };
    Ok(op)
}

/// Parse a vertex attribute format. Accepts the shader-style names (`Float`, `Vec2`, `Vec3`, `Vec4`)
/// as well as the matching 32-bit float Vulkan formats.
pub fn vertex_format(value: &str) -> Result<vk::Format> {
    let format = match normalize(value, "VK_FORMAT_").as_str() {
        "FLOAT" | "R32_SFLOAT" => vk::Format::R32_SFLOAT,
        "VEC2" | "R32G32_SFLOAT" => vk::Format::R32G32_SFLOAT,
        "VEC3" | "R32G32B32_SFLOAT" => vk::Format::R32G32B32_SFLOAT,
        "VEC4" | "R32G32B32A32_SFLOAT" => vk::Format::R32G32B32A32_SFLOAT,
        _ => return Err(unsupported("vertex attribute format", value)),
    };
    Ok(format)
}

fn unsupported(field: &'static str, value: &str) -> anyhow::Error {
    Error::UnsupportedValue {
        field,
        value: value.to_owned(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_accept_optional_prefix() {
        assert_eq!(format("VK_FORMAT_B8G8R8A8_SRGB").unwrap(), vk::Format::B8G8R8A8_SRGB);
        assert_eq!(format("d32_sfloat").unwrap(), vk::Format::D32_SFLOAT);
        let err = format("VK_FORMAT_ASTC_4x4_UNORM_BLOCK").unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn depth_formats() {
        assert!(is_depth_format(vk::Format::D32_SFLOAT));
        assert!(is_depth_format(vk::Format::D24_UNORM_S8_UINT));
        assert!(!is_depth_format(vk::Format::B8G8R8A8_UNORM));
        assert!(has_stencil(vk::Format::D24_UNORM_S8_UINT));
        assert!(!has_stencil(vk::Format::D32_SFLOAT));
    }

    #[test]
    fn binding_kinds() {
        assert_eq!(binding_kind("VK_DESCRIPTOR_TYPE_UNIFORM_BUFFER").unwrap(), BindingKind::UniformBuffer);
        assert_eq!(
            binding_kind("VK_DESCRIPTOR_TYPE_COMBINED_IMAGE_SAMPLER").unwrap(),
            BindingKind::CombinedImageSampler
        );
        let err = binding_kind("VK_DESCRIPTOR_TYPE_INPUT_ATTACHMENT").unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::UnsupportedBindingType(_))));
    }

    #[test]
    fn stage_masks_combine() {
        assert_eq!(shader_stages("VERTEX").unwrap(), vk::ShaderStageFlags::VERTEX);
        assert_eq!(
            shader_stages("VERTEX|FRAGMENT").unwrap(),
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT
        );
        assert_eq!(shader_stages("VK_SHADER_STAGE_FRAGMENT_BIT").unwrap(), vk::ShaderStageFlags::FRAGMENT);
        assert!(shader_stages("COMPUTE").is_err());
    }

    #[test]
    fn raster_and_depth_values() {
        assert_eq!(cull_mode("VK_CULL_MODE_NONE").unwrap(), vk::CullModeFlags::NONE);
        assert_eq!(front_face("clockwise").unwrap(), vk::FrontFace::CLOCKWISE);
        assert_eq!(compare_op("LESS_OR_EQUAL").unwrap(), vk::CompareOp::LESS_OR_EQUAL);
        assert_eq!(vertex_format("Vec3").unwrap(), vk::Format::R32G32B32_SFLOAT);
        assert!(cull_mode("SIDEWAYS").is_err());
    }
}
