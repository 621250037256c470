//! External resources that pipelines bind by name.
//!
//! Attachments produced by passes are owned by the graph. Everything else a binding refers to (textures loaded by
//! the application, per-frame uniform and storage buffers) is looked up through a [`ResourceProvider`]. The
//! [`ResourceRegistry`] is a simple provider backed by hash maps.

use std::collections::HashMap;

use anyhow::Result;
use ash::vk;

pub use sampler::SamplerCreateInfo;

use crate::Error;

pub mod sampler;

/// A range of a buffer bound to a descriptor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BufferBinding {
    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
    pub range: vk::DeviceSize,
}

impl BufferBinding {
    pub fn new(buffer: vk::Buffer, offset: vk::DeviceSize, range: vk::DeviceSize) -> Self {
        Self {
            buffer,
            offset,
            range,
        }
    }

    /// Bind the entire buffer.
    pub fn whole(buffer: vk::Buffer) -> Self {
        Self::new(buffer, 0, vk::WHOLE_SIZE)
    }

    pub(crate) fn to_vk(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer,
            offset: self.offset,
            range: self.range,
        }
    }
}

/// Resolves the names used by descriptor bindings to Vulkan objects.
///
/// Attachment names always take precedence over names resolved here.
pub trait ResourceProvider: Send + Sync {
    /// A sampled texture, as image view and sampler.
    fn texture(&self, name: &str) -> Option<(vk::ImageView, vk::Sampler)>;
    /// The uniform buffer to bind for `frame`.
    fn uniform_buffer(&self, name: &str, frame: usize) -> Option<BufferBinding>;
    /// The storage buffer to bind for `frame`.
    fn storage_buffer(&self, name: &str, frame: usize) -> Option<BufferBinding>;
}

/// Resources registered ahead of graph construction.
#[derive(Debug, Default, Clone)]
pub struct ResourceRegistry {
    textures: HashMap<String, (vk::ImageView, vk::Sampler)>,
    uniform_buffers: HashMap<String, Vec<BufferBinding>>,
    storage_buffers: HashMap<String, Vec<BufferBinding>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_unique(&self, name: &str) -> Result<()> {
        if self.textures.contains_key(name) || self.uniform_buffers.contains_key(name) || self.storage_buffers.contains_key(name) {
            Err(Error::DuplicateResource(name.to_owned()).into())
        } else {
            Ok(())
        }
    }

    /// Register a texture. The same view and sampler are bound for every frame.
    pub fn add_texture(&mut self, name: impl Into<String>, view: vk::ImageView, sampler: vk::Sampler) -> Result<()> {
        let name = name.into();
        self.ensure_unique(&name)?;
        self.textures.insert(name, (view, sampler));
        Ok(())
    }

    /// Register a uniform buffer with one binding per frame in flight. If fewer bindings than frames are given,
    /// frames wrap around.
    pub fn add_uniform_buffers(&mut self, name: impl Into<String>, buffers: Vec<BufferBinding>) -> Result<()> {
        let name = name.into();
        self.ensure_unique(&name)?;
        self.uniform_buffers.insert(name, buffers);
        Ok(())
    }

    /// Register a storage buffer with one binding per frame in flight.
    pub fn add_storage_buffers(&mut self, name: impl Into<String>, buffers: Vec<BufferBinding>) -> Result<()> {
        let name = name.into();
        self.ensure_unique(&name)?;
        self.storage_buffers.insert(name, buffers);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.textures.remove(name).is_some() | self.uniform_buffers.remove(name).is_some() | self.storage_buffers.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.textures.len() + self.uniform_buffers.len() + self.storage_buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn per_frame(buffers: &[BufferBinding], frame: usize) -> Option<BufferBinding> {
    if buffers.is_empty() {
        None
    } else {
        Some(buffers[frame % buffers.len()])
    }
}

impl ResourceProvider for ResourceRegistry {
    fn texture(&self, name: &str) -> Option<(vk::ImageView, vk::Sampler)> {
        self.textures.get(name).copied()
    }

    fn uniform_buffer(&self, name: &str, frame: usize) -> Option<BufferBinding> {
        self.uniform_buffers.get(name).and_then(|b| per_frame(b, frame))
    }

    fn storage_buffer(&self, name: &str, frame: usize) -> Option<BufferBinding> {
        self.storage_buffers.get(name).and_then(|b| per_frame(b, frame))
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;

    #[test]
    fn duplicate_names_are_rejected_across_kinds() {
        let mut registry = ResourceRegistry::new();
        registry
            .add_texture("albedo", vk::ImageView::from_raw(1), vk::Sampler::from_raw(2))
            .unwrap();
        let err = registry
            .add_uniform_buffers("albedo", vec![BufferBinding::whole(vk::Buffer::from_raw(3))])
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::DuplicateResource(name)) if name == "albedo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn buffers_wrap_per_frame() {
        let mut registry = ResourceRegistry::new();
        let a = BufferBinding::new(vk::Buffer::from_raw(10), 0, 64);
        let b = BufferBinding::new(vk::Buffer::from_raw(11), 0, 64);
        registry.add_uniform_buffers("camera", vec![a, b]).unwrap();
        assert_eq!(registry.uniform_buffer("camera", 0), Some(a));
        assert_eq!(registry.uniform_buffer("camera", 1), Some(b));
        assert_eq!(registry.uniform_buffer("camera", 2), Some(a));
        assert_eq!(registry.storage_buffer("camera", 0), None);
        assert!(registry.remove("camera"));
        assert!(registry.is_empty());
    }
}
