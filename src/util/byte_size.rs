use std::mem::size_of;

use ash::vk;

/// Size in bytes of one element of a format.
pub trait ByteSize {
    /// Returns `0` for formats without a fixed per-element size, such as block compressed formats.
    fn byte_size(&self) -> usize;
}

impl ByteSize for vk::Format {
    fn byte_size(&self) -> usize {
        match *self {
            vk::Format::R32_SFLOAT | vk::Format::R32_UINT | vk::Format::R32_SINT => size_of::<f32>(),
            vk::Format::R32G32_SFLOAT | vk::Format::R32G32_UINT | vk::Format::R32G32_SINT => 2 * size_of::<f32>(),
            vk::Format::R32G32B32_SFLOAT | vk::Format::R32G32B32_UINT | vk::Format::R32G32B32_SINT => 3 * size_of::<f32>(),
            vk::Format::R32G32B32A32_SFLOAT | vk::Format::R32G32B32A32_UINT | vk::Format::R32G32B32A32_SINT => 4 * size_of::<f32>(),
            vk::Format::R16G16B16A16_SFLOAT => 8,
            vk::Format::R8_UNORM => 1,
            vk::Format::R8G8_UNORM => 2,
            vk::Format::R8G8B8_UNORM => 3,
            vk::Format::R8G8B8A8_UNORM
            | vk::Format::R8G8B8A8_SRGB
            | vk::Format::B8G8R8A8_UNORM
            | vk::Format::B8G8R8A8_SRGB
            | vk::Format::A2B10G10R10_UNORM_PACK32
            | vk::Format::D32_SFLOAT
            | vk::Format::D24_UNORM_S8_UINT => 4,
            vk::Format::D16_UNORM => 2,
            vk::Format::D32_SFLOAT_S8_UINT => 8,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_formats() {
        assert_eq!(vk::Format::R32G32B32_SFLOAT.byte_size(), 12);
        assert_eq!(vk::Format::R32G32_SFLOAT.byte_size(), 8);
        assert_eq!(vk::Format::BC7_UNORM_BLOCK.byte_size(), 0);
    }
}
