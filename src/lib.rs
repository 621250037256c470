//! Declarative Vulkan render graph compiler and frame executor
//!
//! Strata turns a JSON description of render passes into a ready-to-record Vulkan render graph. It works out the
//! dependency order of the passes, allocates every attachment once per frame in flight, builds render passes,
//! framebuffers, pipelines and descriptor sets, and records every frame into a primary command buffer that executes
//! one secondary command buffer per pipeline group.
//!
//! To get started, the easiest way is to simply
//! ```
//! // Import all important traits
//! use strata::prelude::traits;
//! // Import types under a namespace.
//! use strata::prelude as st;
//!
//! // Or, if you dont care about using the types under a namespace
//! use strata::prelude::*;
//! ```
//!
//! # Example
//!
//! Strata never creates a Vulkan instance, device or swapchain. All GPU work goes through the
//! [`DeviceInterface`](crate::DeviceInterface) trait, which [`VulkanDevice`](crate::VulkanDevice) implements on top of
//! an existing `ash::Device`.
//! ```no_run
//! use std::sync::Arc;
//! use strata::prelude::*;
//!
//! # fn run(instance: &ash::Instance, device: ash::Device, physical_device: vk::PhysicalDevice, swapchain_views: Vec<vk::ImageView>) -> anyhow::Result<()> {
//! let device = Arc::new(VulkanDevice::with_default_allocator(instance, device, physical_device, 0)?);
//! let surface = SurfaceInfo {
//!     format: vk::Format::B8G8R8A8_SRGB,
//!     extent: vk::Extent2D { width: 1280, height: 720 },
//!     views: swapchain_views,
//! };
//! let settings = GraphSettingsBuilder::new()
//!     .frames_in_flight(2)
//!     .msaa_samples(vk::SampleCountFlags::TYPE_4)
//!     .build();
//! # Ok(())
//! # }
//! ```
//! Every pipeline in the description needs an executor that records its draw calls.
//! ```no_run
//! # use std::sync::Arc;
//! # use strata::prelude::*;
//! # fn run(device: Arc<VulkanDevice>, surface: SurfaceInfo, settings: GraphSettings) -> anyhow::Result<()> {
//! let mut executors = PipelineExecutors::<VulkanDevice, ()>::new();
//! executors.register_fn("fullscreen", |cmd, ctx, _scene| {
//!     let cmd = match ctx.descriptor_set {
//!         Some(set) => cmd.bind_descriptor_set(0, set)?,
//!         None => cmd,
//!     };
//!     Ok(cmd.draw(3, 1, 0, 0))
//! });
//! let mut graph = RenderGraph::build(
//!     device,
//!     &GraphDescription::from_file("graph.json")?,
//!     surface,
//!     settings,
//!     &SpirvFileLoader::with_root("shaders"),
//!     ResourceRegistry::new(),
//!     executors,
//! )?;
//! let cmd = graph.record(0, 0, &())?;
//! # Ok(())
//! # }
//! ```
//! For further example code, check out the following modules
//! - [`description`] for the graph description format.
//! - [`graph`] for layering, allocation and recording.
//! - [`pipeline`] for pipeline creation and shader loading.
//! - [`resource`] for resources that live outside the graph.
//! - [`command_buffer`] for the commands available to pipeline executors.
//! - [`device`] for the device boundary.
//! - [`allocator`] for image memory allocation.

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;

pub mod prelude;
pub use crate::prelude::*;

pub mod allocator;
pub mod command_buffer;
pub mod core;
pub mod description;
pub mod descriptor;
pub mod device;
pub mod graph;
pub mod pipeline;
pub mod resource;
pub mod util;
