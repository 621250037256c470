//! Exposes all structs needed to store render graph build parameters.

use ash::vk;

/// Settings that apply to the whole render graph. Use [`GraphSettingsBuilder`] to construct these.
#[derive(Debug, Clone)]
pub struct GraphSettings {
    /// Number of frames that can be recorded while earlier ones are still executing. Every
    /// non-terminal attachment, descriptor set and command buffer is allocated once per frame in flight.
    pub frames_in_flight: usize,
    /// Sample count used by passes that enable multisampling.
    pub msaa_samples: vk::SampleCountFlags,
    /// Clear color for color outputs that do not declare one.
    pub default_clear_color: [f32; 4],
    /// Clear depth and stencil for depth outputs that do not declare one.
    pub default_clear_depth: (f32, u32),
    /// Attach readable names to created Vulkan objects.
    pub debug_names: bool,
    /// Record the pipeline groups of one layer concurrently. Only has an effect with the `rayon` feature.
    pub parallel_recording: bool,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            msaa_samples: vk::SampleCountFlags::TYPE_4,
            default_clear_color: [0.0, 0.0, 0.0, 1.0],
            default_clear_depth: (1.0, 0),
            debug_names: true,
            parallel_recording: false,
        }
    }
}

/// The settings builder is a convenience struct to easily create [`GraphSettings`].
/// # Example
/// ```
/// # use strata::prelude::*;
/// let settings = GraphSettingsBuilder::new()
///     .frames_in_flight(3)
///     .msaa_samples(vk::SampleCountFlags::TYPE_8)
///     .build();
/// assert_eq!(settings.frames_in_flight, 3);
/// ```
#[derive(Debug, Default)]
pub struct GraphSettingsBuilder {
    inner: GraphSettings,
}

impl GraphSettingsBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of frames in flight. Values below one are clamped to one.
    pub fn frames_in_flight(mut self, count: usize) -> Self {
        self.inner.frames_in_flight = count.max(1);
        self
    }

    /// Set the sample count for multisampled passes.
    pub fn msaa_samples(mut self, samples: vk::SampleCountFlags) -> Self {
        self.inner.msaa_samples = samples;
        self
    }

    /// Set the fallback clear color.
    pub fn clear_color(mut self, color: [f32; 4]) -> Self {
        self.inner.default_clear_color = color;
        self
    }

    /// Set the fallback depth and stencil clear values.
    pub fn clear_depth(mut self, depth: f32, stencil: u32) -> Self {
        self.inner.default_clear_depth = (depth, stencil);
        self
    }

    /// Enable or disable debug object names.
    pub fn debug_names(mut self, enabled: bool) -> Self {
        self.inner.debug_names = enabled;
        self
    }

    /// Enable or disable parallel recording of pipeline groups.
    pub fn parallel_recording(mut self, enabled: bool) -> Self {
        self.inner.parallel_recording = enabled;
        self
    }

    /// Build the resulting settings.
    pub fn build(self) -> GraphSettings {
        self.inner
    }
}

/// The presentable surface the terminal pass renders into. Supplied at build time and again on every
/// recreate.
#[derive(Debug, Clone)]
pub struct SurfaceInfo {
    /// Pixel format of the surface images.
    pub format: vk::Format,
    /// Current extent of the surface. Passes that do not declare an extent use this.
    pub extent: vk::Extent2D,
    /// Ordered views of the presentable images. The terminal pass gets one framebuffer per view.
    pub views: Vec<vk::ImageView>,
}

impl SurfaceInfo {
    /// Number of presentable images.
    pub fn image_count(&self) -> usize {
        self.views.len()
    }
}
