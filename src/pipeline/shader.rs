use std::fs::File;
use std::path::PathBuf;

use anyhow::Result;
use ash::vk;

use crate::Error;

/// Info required to create a shader. Use [`ShaderCreateInfo::from_spirv`] to construct this.
#[derive(Debug, Clone)]
pub struct ShaderCreateInfo {
    stage: vk::ShaderStageFlags,
    code: Vec<u32>,
}

impl ShaderCreateInfo {
    /// Load in a spirv binary into a shader create info structure.
    pub fn from_spirv(stage: vk::ShaderStageFlags, code: Vec<u32>) -> Self {
        Self {
            stage,
            code,
        }
    }

    pub fn stage(&self) -> vk::ShaderStageFlags {
        self.stage
    }

    pub fn code(&self) -> &[u32] {
        self.code.as_slice()
    }
}

/// Turns a shader source location from the graph description into SPIR-V words.
///
/// This is implemented for any `Fn(&str) -> Result<Vec<u32>>` closure, so an engine can plug in its own asset system.
pub trait ShaderLoader: Send + Sync {
    fn load(&self, location: &str) -> Result<Vec<u32>>;
}

impl<F> ShaderLoader for F
where
    F: Fn(&str) -> Result<Vec<u32>> + Send + Sync,
{
    fn load(&self, location: &str) -> Result<Vec<u32>> {
        self(location)
    }
}

/// Loads precompiled `.spv` files from disk, optionally relative to a root directory.
#[derive(Debug, Clone, Default)]
pub struct SpirvFileLoader {
    root: Option<PathBuf>,
}

impl SpirvFileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative shader locations against `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, location: &str) -> PathBuf {
        let location = location.trim_start_matches('/');
        match &self.root {
            Some(root) => root.join(location),
            None => PathBuf::from(location),
        }
    }
}

impl ShaderLoader for SpirvFileLoader {
    fn load(&self, location: &str) -> Result<Vec<u32>> {
        let path = self.resolve(location);
        let mut file = File::open(&path).map_err(Error::from)?;
        let code = ash::util::read_spv(&mut file).map_err(Error::from)?;
        Ok(code)
    }
}
