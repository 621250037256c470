//! Draw logic supplied by the scene.
//!
//! The graph binds pipelines, descriptor sets and viewports, but it does not know what to draw. For every pipeline
//! name a [`PipelineExecutor`] is registered that records the actual draw calls.
//!
//! # Example
//! ```
//! # use strata::prelude::*;
//! struct Scene {
//!     triangles: u32,
//! }
//!
//! let mut executors = PipelineExecutors::<VulkanDevice, Scene>::new();
//! executors.register_fn("fullscreen", |cmd, ctx, scene| {
//!     let cmd = match ctx.descriptor_set {
//!         Some(set) => cmd.bind_descriptor_set(0, set)?,
//!         None => cmd,
//!     };
//!     Ok(cmd.draw(3 * scene.triangles, 1, 0, 0))
//! });
//! assert!(executors.contains("fullscreen"));
//! ```

use std::collections::HashMap;

use anyhow::Result;
use ash::vk;

use crate::command_buffer::IncompleteCommandBuffer;
use crate::device::DeviceInterface;

/// Everything an executor needs to know about the pipeline it draws with.
#[derive(Debug, Copy, Clone)]
pub struct DrawContext<'a> {
    pub pass: &'a str,
    pub pipeline: &'a str,
    /// Frame in flight slot.
    pub frame: usize,
    /// Index of the surface image being rendered to.
    pub image_index: usize,
    pub layout: vk::PipelineLayout,
    /// The descriptor set of this frame, already written by the graph. `None` if the pipeline declares no bindings.
    pub descriptor_set: Option<vk::DescriptorSet>,
    pub extent: vk::Extent2D,
}

/// Records the draw calls for one pipeline. The pipeline is bound and viewport and scissor are set before this is
/// called.
pub trait PipelineExecutor<D: DeviceInterface + ?Sized, U>: Send + Sync {
    fn execute<'d>(&self, cmd: IncompleteCommandBuffer<'d, D>, ctx: &DrawContext<'_>, scene: &U) -> Result<IncompleteCommandBuffer<'d, D>>;
}

impl<D, U, F> PipelineExecutor<D, U> for F
where
    D: DeviceInterface + ?Sized,
    F: for<'d> Fn(IncompleteCommandBuffer<'d, D>, &DrawContext<'_>, &U) -> Result<IncompleteCommandBuffer<'d, D>> + Send + Sync,
{
    fn execute<'d>(&self, cmd: IncompleteCommandBuffer<'d, D>, ctx: &DrawContext<'_>, scene: &U) -> Result<IncompleteCommandBuffer<'d, D>> {
        self(cmd, ctx, scene)
    }
}

/// Executors keyed by pipeline name.
#[derive(Derivative)]
#[derivative(Debug(bound = ""), Default(bound = ""))]
pub struct PipelineExecutors<D: DeviceInterface + ?Sized, U> {
    #[derivative(Debug = "ignore")]
    executors: HashMap<String, Box<dyn PipelineExecutor<D, U>>>,
}

impl<D: DeviceInterface + ?Sized, U> PipelineExecutors<D, U> {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Register an executor. Replaces any executor previously registered under the same name.
    pub fn register(&mut self, pipeline: impl Into<String>, executor: impl PipelineExecutor<D, U> + 'static) -> &mut Self {
        self.executors.insert(pipeline.into(), Box::new(executor));
        self
    }

    /// Register a closure as executor.
    pub fn register_fn<F>(&mut self, pipeline: impl Into<String>, f: F) -> &mut Self
    where
        F: for<'d> Fn(IncompleteCommandBuffer<'d, D>, &DrawContext<'_>, &U) -> Result<IncompleteCommandBuffer<'d, D>> + Send + Sync + 'static, {
        self.register(pipeline, f)
    }

    pub fn get(&self, pipeline: &str) -> Option<&dyn PipelineExecutor<D, U>> {
        self.executors.get(pipeline).map(|e| e.as_ref())
    }

    pub fn contains(&self, pipeline: &str) -> bool {
        self.executors.contains_key(pipeline)
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}
