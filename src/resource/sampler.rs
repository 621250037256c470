use ash::vk;

/// Settings for a `VkSampler`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SamplerCreateInfo {
    pub mag_filter: vk::Filter,
    pub min_filter: vk::Filter,
    pub mipmap_mode: vk::SamplerMipmapMode,
    pub address_mode: vk::SamplerAddressMode,
    pub mip_lod_bias: f32,
    /// `Some(max)` enables anisotropic filtering.
    pub max_anisotropy: Option<f32>,
    pub min_lod: f32,
    pub max_lod: f32,
    pub border_color: vk::BorderColor,
}

impl SamplerCreateInfo {
    /// The sampler every attachment read by a later pass is sampled with. These settings are:
    /// - `LINEAR` min/mag filters
    /// - `LINEAR` mipmap mode
    /// - `CLAMP_TO_EDGE` address mode on all axes
    /// - Anisotropic filtering off
    /// - Sampler compare op off
    /// - Min and max lod `0.0`
    pub fn attachment() -> Self {
        Self {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
            address_mode: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            mip_lod_bias: 0.0,
            max_anisotropy: None,
            min_lod: 0.0,
            max_lod: 0.0,
            border_color: vk::BorderColor::INT_OPAQUE_BLACK,
        }
    }

    pub(crate) fn to_vk(&self) -> vk::SamplerCreateInfo {
        vk::SamplerCreateInfo::builder()
            .mag_filter(self.mag_filter)
            .min_filter(self.min_filter)
            .mipmap_mode(self.mipmap_mode)
            .address_mode_u(self.address_mode)
            .address_mode_v(self.address_mode)
            .address_mode_w(self.address_mode)
            .mip_lod_bias(self.mip_lod_bias)
            .anisotropy_enable(self.max_anisotropy.is_some())
            .max_anisotropy(self.max_anisotropy.unwrap_or(1.0))
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .min_lod(self.min_lod)
            .max_lod(self.max_lod)
            .border_color(self.border_color)
            .unnormalized_coordinates(false)
            .build()
    }
}

impl Default for SamplerCreateInfo {
    fn default() -> Self {
        Self::attachment()
    }
}
