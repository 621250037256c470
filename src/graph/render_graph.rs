//! The compiled render graph.
//!
//! Building a graph runs every phase in order: parse the description, layer the passes, allocate attachments,
//! create render passes and framebuffers, compile pipelines, write descriptor sets and finally allocate command
//! buffers. If any phase fails the partially built graph is dropped, which destroys everything created so far.
//!
//! # Example
//! ```no_run
//! # use std::sync::Arc;
//! # use strata::prelude::*;
//! # fn build(device: Arc<VulkanDevice>, surface: SurfaceInfo) -> anyhow::Result<()> {
//! let description = GraphDescription::from_file("graph.json")?;
//! let mut executors = PipelineExecutors::<VulkanDevice, ()>::new();
//! executors.register_fn("triangle", |cmd, _ctx, _scene| Ok(cmd.draw(3, 1, 0, 0)));
//!
//! let mut graph = RenderGraph::build(
//!     device,
//!     &description,
//!     surface,
//!     GraphSettingsBuilder::new().frames_in_flight(2).build(),
//!     &SpirvFileLoader::with_root("shaders"),
//!     ResourceRegistry::new(),
//!     executors,
//! )?;
//! let cmd = graph.record(0, 0, &())?;
//! // Submit `cmd`, wait for it, then:
//! graph.mark_idle(0)?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use anyhow::Result;
use ash::vk;

use crate::core::settings::{GraphSettings, SurfaceInfo};
use crate::description::{GraphDescription, PassSpec};
use crate::device::DeviceInterface;
use crate::graph::attachment::{pass_samples, Attachment, Attachments};
use crate::graph::binder::bind_pass;
use crate::graph::dag::Dag;
use crate::graph::executor::PipelineExecutors;
use crate::graph::record::{FrameRecorder, RecordInputs, RecordState};
use crate::graph::render_target::{create_framebuffers, create_render_target, destroy_framebuffers, RenderTarget};
use crate::pipeline::compiler::compile_pass;
use crate::pipeline::{CompiledPipeline, PassPipelines, ShaderLoader};
use crate::resource::ResourceProvider;
use crate::Error;

/// A compiled render graph, ready to record frames.
///
/// `U` is the scene type handed to every [`PipelineExecutor`](crate::PipelineExecutor) while recording.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct RenderGraph<D: DeviceInterface, U = ()> {
    #[derivative(Debug = "ignore")]
    device: Arc<D>,
    passes: Vec<PassSpec>,
    dag: Dag,
    settings: GraphSettings,
    surface: SurfaceInfo,
    attachments: Attachments,
    /// Indexed by pass index.
    targets: Vec<RenderTarget>,
    /// Indexed by pass index.
    pipelines: Vec<PassPipelines>,
    recorder: FrameRecorder,
    #[derivative(Debug = "ignore")]
    provider: Box<dyn ResourceProvider>,
    executors: PipelineExecutors<D, U>,
}

impl<D: DeviceInterface, U> RenderGraph<D, U> {
    /// Parse `description` and build the graph.
    /// # Errors
    /// Any error from parsing, layering, allocation, pipeline compilation or descriptor binding. Additionally
    /// [`Error::MissingPipelineExecutor`] if a pipeline has no registered executor.
    pub fn build(
        device: Arc<D>,
        description: &GraphDescription,
        surface: SurfaceInfo,
        settings: GraphSettings,
        loader: &dyn ShaderLoader,
        provider: impl ResourceProvider + 'static,
        executors: PipelineExecutors<D, U>,
    ) -> Result<Self> {
        let passes = description.parse()?;
        Self::from_passes(device, passes, surface, settings, loader, provider, executors)
    }

    /// Build the graph from already parsed passes.
    pub fn from_passes(
        device: Arc<D>,
        passes: Vec<PassSpec>,
        surface: SurfaceInfo,
        settings: GraphSettings,
        loader: &dyn ShaderLoader,
        provider: impl ResourceProvider + 'static,
        executors: PipelineExecutors<D, U>,
    ) -> Result<Self> {
        let dag = Dag::build(&passes)?;
        if let Some(pipeline) = passes.iter().flat_map(|p| p.pipelines()).find(|p| !executors.contains(&p.name)) {
            return Err(Error::MissingPipelineExecutor(pipeline.name.clone()).into());
        }

        let mut graph = Self {
            device,
            passes,
            dag,
            settings,
            surface,
            attachments: Attachments::default(),
            targets: vec![],
            pipelines: vec![],
            recorder: FrameRecorder::default(),
            provider: Box::new(provider),
            executors,
        };
        // On error, dropping `graph` releases whatever was created.
        graph.compile(loader)?;
        info!(
            "Built render graph with {} passes in {} layers, {} attachments and {} pipelines",
            graph.passes.len(),
            graph.dag.num_layers(),
            graph.attachments.len(),
            graph.pipelines.iter().map(PassPipelines::len).sum::<usize>()
        );
        Ok(graph)
    }

    fn compile(&mut self, loader: &dyn ShaderLoader) -> Result<()> {
        let device = self.device.clone();
        let device = device.as_ref();
        let debug_names = self.settings.debug_names;

        self.attachments
            .allocate(device, &self.passes, &self.dag, &self.surface, &self.settings)?;

        for (index, pass) in self.passes.iter().enumerate() {
            let samples = pass_samples(pass, &self.settings);
            let target = create_render_target(device, pass, self.dag.is_terminal(index), samples, debug_names)?;
            self.targets.push(target);
        }
        self.create_framebuffers()?;

        for (index, pass) in self.passes.iter().enumerate() {
            let samples = pass_samples(pass, &self.settings);
            self.pipelines.push(PassPipelines::default());
            let out = &mut self.pipelines[index];
            compile_pass(
                device,
                pass,
                self.targets[index].render_pass,
                samples,
                loader,
                self.settings.frames_in_flight,
                debug_names,
                out,
            )?;
        }

        self.update_all_descriptor_sets()?;
        self.recorder = FrameRecorder::new(device, &self.passes, &self.dag, self.settings.frames_in_flight, debug_names)?;
        Ok(())
    }

    fn create_framebuffers(&mut self) -> Result<()> {
        for (index, pass) in self.passes.iter().enumerate() {
            let extent = pass.resolved_extent(self.surface.extent);
            create_framebuffers(
                self.device.as_ref(),
                &mut self.targets[index],
                index,
                pass,
                &self.attachments,
                extent,
                self.settings.debug_names,
            )?;
        }
        Ok(())
    }

    /// Rebuild every attachment and framebuffer for a new surface, then rewrite all descriptor sets.
    ///
    /// Render passes, pipelines and command buffers are kept. The caller must make sure no frame is still executing.
    pub fn recreate(&mut self, surface: SurfaceInfo) -> Result<()> {
        debug!(
            "Recreating render graph for a {}x{} surface with {} images",
            surface.extent.width,
            surface.extent.height,
            surface.image_count()
        );
        let device = self.device.clone();
        for target in &mut self.targets {
            destroy_framebuffers(device.as_ref(), target);
        }
        self.attachments.destroy(device.as_ref());

        self.surface = surface;
        self.attachments
            .allocate(device.as_ref(), &self.passes, &self.dag, &self.surface, &self.settings)?;
        self.create_framebuffers()?;
        self.update_all_descriptor_sets()?;
        self.recorder.reset_states();
        Ok(())
    }

    /// Write every descriptor set of every pass for every frame in flight.
    ///
    /// This runs automatically on build and recreate. Call it again after external resources changed.
    pub fn update_all_descriptor_sets(&self) -> Result<()> {
        let mut writes = 0;
        for (index, pass) in self.passes.iter().enumerate() {
            let Some(pipelines) = self.pipelines.get(index) else { continue; };
            writes += bind_pass(self.device.as_ref(), pass, pipelines, &self.attachments, self.provider.as_ref())?;
        }
        debug!("Wrote {writes} descriptors");
        Ok(())
    }

    /// Replace the resource provider and rebind all descriptor sets against it.
    pub fn set_resource_provider(&mut self, provider: impl ResourceProvider + 'static) -> Result<()> {
        self.provider = Box::new(provider);
        self.update_all_descriptor_sets()
    }

    /// Record frame slot `frame`, rendering the terminal pass into surface image `image_index`.
    ///
    /// Returns the primary command buffer, ready to be submitted. The slot stays `Submitted` until
    /// [`RenderGraph::mark_idle`] is called for it.
    /// # Errors
    /// - [`Error::InvalidFrameIndex`] if `frame` or `image_index` is out of range.
    /// - [`Error::InvalidRecordState`] if the slot is already recording.
    /// - Any error returned by a pipeline executor. [`Error::SurfaceOutOfDate`] is passed through unchanged.
    pub fn record(&mut self, frame: usize, image_index: usize, scene: &U) -> Result<vk::CommandBuffer>
    where
        U: Sync, {
        let inputs = RecordInputs {
            passes: &self.passes,
            dag: &self.dag,
            targets: &self.targets,
            pipelines: &self.pipelines,
            executors: &self.executors,
            parallel: self.settings.parallel_recording,
        };
        self.recorder.record(self.device.as_ref(), &inputs, frame, image_index, scene)
    }

    /// Mark a frame slot as no longer in use by the GPU.
    pub fn mark_idle(&mut self, frame: usize) -> Result<()> {
        self.recorder.mark_idle(frame)
    }

    pub fn frame_state(&self, frame: usize) -> Option<RecordState> {
        self.recorder.state(frame)
    }

    pub fn recorder(&self) -> &FrameRecorder {
        &self.recorder
    }

    fn pass_index(&self, name: &str) -> Result<usize> {
        self.dag
            .index_of(name)
            .ok_or_else(|| Error::PassNotFound(name.to_owned()).into())
    }

    /// Look up a pass by name.
    pub fn pass(&self, name: &str) -> Result<&PassSpec> {
        let index = self.pass_index(name)?;
        Ok(&self.passes[index])
    }

    pub fn passes(&self) -> &[PassSpec] {
        &self.passes
    }

    /// The attachment backing `output` of `pass`.
    pub fn attachment(&self, pass: &str, output: &str) -> Result<Option<&Attachment>> {
        self.pass_index(pass)?;
        Ok(self.attachments.get(output).filter(|a| a.pass == pass))
    }

    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    pub fn render_target(&self, pass: &str) -> Result<&RenderTarget> {
        let index = self.pass_index(pass)?;
        Ok(&self.targets[index])
    }

    /// Look up a compiled pipeline by pass and pipeline name.
    pub fn pipeline(&self, pass: &str, pipeline: &str) -> Result<&CompiledPipeline> {
        let index = self.pass_index(pass)?;
        self.pipelines[index].get(pipeline).ok_or_else(|| {
            Error::PipelineNotFound {
                pass: pass.to_owned(),
                pipeline: pipeline.to_owned(),
            }
            .into()
        })
    }

    /// The descriptor set of a pipeline for frame slot `frame`. `None` if the pipeline declares no bindings.
    pub fn descriptor_set(&self, pass: &str, pipeline: &str, frame: usize) -> Result<Option<vk::DescriptorSet>> {
        let compiled = self.pipeline(pass, pipeline)?;
        if frame >= self.settings.frames_in_flight {
            return Err(Error::InvalidFrameIndex {
                index: frame,
                count: self.settings.frames_in_flight,
            }
            .into());
        }
        Ok(compiled.descriptor_sets.get(frame).copied())
    }

    pub fn dag(&self) -> &Dag {
        &self.dag
    }

    /// Pass names ordered by layer, authoring order within a layer.
    pub fn sorted_pass_names(&self) -> Vec<&str> {
        self.dag.sorted_names()
    }

    pub fn nodes_in_layer(&self, layer: usize) -> Vec<&str> {
        self.dag.nodes_in_layer(layer)
    }

    pub fn num_layers(&self) -> usize {
        self.dag.num_layers()
    }

    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    pub fn surface(&self) -> &SurfaceInfo {
        &self.surface
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Destroy every object owned by the graph, in reverse creation order. Called automatically on drop, calling it
    /// twice is harmless.
    pub fn destroy(&mut self) {
        let device = self.device.clone();
        let device = device.as_ref();
        self.recorder.destroy(device);
        for pipelines in self.pipelines.iter_mut().rev() {
            pipelines.destroy(device);
        }
        self.pipelines.clear();
        for target in self.targets.iter_mut().rev() {
            destroy_framebuffers(device, target);
            device.destroy_render_pass(target.render_pass);
        }
        self.targets.clear();
        self.attachments.destroy(device);
    }
}

impl<D: DeviceInterface, U> Drop for RenderGraph<D, U> {
    fn drop(&mut self) {
        self.destroy();
    }
}
