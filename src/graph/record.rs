//! Recording a compiled graph into command buffers.
//!
//! Every frame slot owns one primary command buffer and one secondary command buffer per pipeline group. Recording
//! walks the layers in order. The groups of a layer are recorded first, then the primary buffer begins the render
//! pass of each pass in the layer and executes its group buffers in group order.

use std::collections::HashMap;

use anyhow::Result;
use ash::vk;

use crate::command_buffer::{CommandBufferBeginInfo, IncompleteCommandBuffer, RenderPassBeginInfo};
use crate::description::PassSpec;
use crate::device::{name_object, DeviceInterface};
use crate::graph::dag::Dag;
use crate::graph::executor::{DrawContext, PipelineExecutors};
use crate::graph::render_target::RenderTarget;
use crate::pipeline::PassPipelines;
use crate::Error;

/// Lifecycle of a frame slot.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecordState {
    /// Ready to be recorded.
    Idle,
    /// Currently being recorded.
    Recording,
    /// Recorded and handed out for submission.
    Submitted,
}

/// Command buffers of a single frame slot.
#[derive(Debug)]
pub struct FrameRecordState {
    pub primary: vk::CommandBuffer,
    /// Secondary buffers keyed by `(layer, position of the pass within the layer)`, one per pipeline group.
    pub secondaries: HashMap<(usize, usize), Vec<vk::CommandBuffer>>,
    state: RecordState,
}

impl FrameRecordState {
    pub fn state(&self) -> RecordState {
        self.state
    }

    fn all_buffers(&self) -> impl Iterator<Item = vk::CommandBuffer> + '_ {
        std::iter::once(self.primary).chain(self.secondaries.values().flatten().copied())
    }
}

/// Everything the recorder reads from the compiled graph.
pub(crate) struct RecordInputs<'a, D: DeviceInterface + ?Sized, U> {
    pub passes: &'a [PassSpec],
    pub dag: &'a Dag,
    pub targets: &'a [RenderTarget],
    pub pipelines: &'a [PassPipelines],
    pub executors: &'a PipelineExecutors<D, U>,
    pub parallel: bool,
}

/// One secondary command buffer to record.
#[derive(Debug, Copy, Clone)]
struct GroupTask {
    pass: usize,
    group: usize,
    cmd: vk::CommandBuffer,
}

/// Owns the command pools and per-frame command buffers.
#[derive(Debug, Default)]
pub struct FrameRecorder {
    /// The first pool holds all primary buffers. Every secondary slot `(pass, group)` has its own pool, shared by
    /// all frames, so groups can be recorded on different threads.
    pools: Vec<vk::CommandPool>,
    frames: Vec<FrameRecordState>,
}

/// Framebuffer a pass renders into. The terminal pass renders into the surface image, every other pass into the
/// frame slot.
fn framebuffer(target: &RenderTarget, terminal: bool, frame: usize, image_index: usize) -> Result<vk::Framebuffer> {
    let index = if terminal {
        image_index
    } else {
        frame
    };
    target.framebuffers.get(index).copied().ok_or_else(|| {
        Error::InvalidFrameIndex {
            index,
            count: target.framebuffers.len(),
        }
        .into()
    })
}

fn record_group<D: DeviceInterface + ?Sized, U>(
    device: &D,
    inputs: &RecordInputs<'_, D, U>,
    task: GroupTask,
    frame: usize,
    image_index: usize,
    scene: &U,
) -> Result<()> {
    let pass = &inputs.passes[task.pass];
    let target = &inputs.targets[task.pass];
    let fb = framebuffer(target, inputs.dag.is_terminal(task.pass), frame, image_index)?;
    let mut cmd = IncompleteCommandBuffer::begin(device, task.cmd, &CommandBufferBeginInfo::secondary(target.render_pass, fb))?;
    let group = inputs.pipelines[task.pass].groups.get(task.group).map(Vec::as_slice).unwrap_or_default();
    for pipeline in group {
        let executor = inputs
            .executors
            .get(&pipeline.name)
            .ok_or_else(|| Error::MissingPipelineExecutor(pipeline.name.clone()))?;
        let ctx = DrawContext {
            pass: &pass.name,
            pipeline: &pipeline.name,
            frame,
            image_index,
            layout: pipeline.layout,
            descriptor_set: pipeline.descriptor_sets.get(frame).copied(),
            extent: target.extent,
        };
        cmd = cmd
            .bind_pipeline(pipeline.pipeline, pipeline.layout)
            .full_viewport_scissor(target.extent);
        cmd = executor.execute(cmd, &ctx, scene)?;
    }
    cmd.finish()?;
    Ok(())
}

impl FrameRecorder {
    /// Allocate command pools and buffers for `frames_in_flight` slots.
    pub(crate) fn new<D: DeviceInterface + ?Sized>(
        device: &D,
        passes: &[PassSpec],
        dag: &Dag,
        frames_in_flight: usize,
        debug_names: bool,
    ) -> Result<Self> {
        let mut recorder = Self::default();
        if let Err(e) = recorder.allocate(device, passes, dag, frames_in_flight, debug_names) {
            recorder.destroy(device);
            return Err(e);
        }
        Ok(recorder)
    }

    fn allocate<D: DeviceInterface + ?Sized>(
        &mut self,
        device: &D,
        passes: &[PassSpec],
        dag: &Dag,
        frames_in_flight: usize,
        debug_names: bool,
    ) -> Result<()> {
        let pool = device.create_command_pool()?;
        self.pools.push(pool);
        let primaries = device.allocate_command_buffers(pool, vk::CommandBufferLevel::PRIMARY, frames_in_flight as u32)?;
        for (i, primary) in primaries.into_iter().enumerate() {
            name_object(device, debug_names, primary, format!("PrimaryCommandBuffer_{i}"));
            self.frames.push(FrameRecordState {
                primary,
                secondaries: HashMap::new(),
                state: RecordState::Idle,
            });
        }

        for (layer, indices) in dag.layer_indices().iter().enumerate() {
            for (position, &index) in indices.iter().enumerate() {
                let pass = &passes[index];
                for group in 0..pass.pipeline_groups.len() {
                    let pool = device.create_command_pool()?;
                    self.pools.push(pool);
                    let buffers = device.allocate_command_buffers(pool, vk::CommandBufferLevel::SECONDARY, frames_in_flight as u32)?;
                    for (i, (frame, cmd)) in self.frames.iter_mut().zip(buffers).enumerate() {
                        name_object(device, debug_names, cmd, format!("SecondaryCommandBuffer_{i}_{}_Group_{group}", pass.name));
                        frame.secondaries.entry((layer, position)).or_default().push(cmd);
                    }
                }
            }
        }
        #[cfg(feature = "log-objects")]
        trace!("Created {} command pools for {} frames in flight", self.pools.len(), self.frames.len());
        Ok(())
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, frame: usize) -> Option<&FrameRecordState> {
        self.frames.get(frame)
    }

    pub fn state(&self, frame: usize) -> Option<RecordState> {
        self.frames.get(frame).map(FrameRecordState::state)
    }

    fn slot_mut(&mut self, frame: usize) -> Result<&mut FrameRecordState> {
        let count = self.frames.len();
        self.frames.get_mut(frame).ok_or_else(|| {
            Error::InvalidFrameIndex {
                index: frame,
                count,
            }
            .into()
        })
    }

    /// Record frame slot `frame`, rendering the terminal pass into surface image `image_index`. Returns the primary
    /// command buffer, ready for submission.
    pub(crate) fn record<D: DeviceInterface + ?Sized, U: Sync>(
        &mut self,
        device: &D,
        inputs: &RecordInputs<'_, D, U>,
        frame: usize,
        image_index: usize,
        scene: &U,
    ) -> Result<vk::CommandBuffer> {
        let slot = self.slot_mut(frame)?;
        if slot.state == RecordState::Recording {
            return Err(Error::InvalidRecordState {
                expected: "Idle or Submitted",
                actual: slot.state,
            }
            .into());
        }
        slot.state = RecordState::Recording;
        let result = Self::record_frame(device, slot, inputs, frame, image_index, scene);
        slot.state = match &result {
            Ok(_) => RecordState::Submitted,
            Err(_) => RecordState::Idle,
        };
        result
    }

    fn record_frame<D: DeviceInterface + ?Sized, U: Sync>(
        device: &D,
        slot: &FrameRecordState,
        inputs: &RecordInputs<'_, D, U>,
        frame: usize,
        image_index: usize,
        scene: &U,
    ) -> Result<vk::CommandBuffer> {
        // Validate the image index before touching any command buffer.
        framebuffer(&inputs.targets[inputs.dag.terminal_index()], true, frame, image_index)?;

        for cmd in slot.all_buffers() {
            device.reset_command_buffer(cmd)?;
        }

        let mut primary = IncompleteCommandBuffer::begin(device, slot.primary, &CommandBufferBeginInfo::primary())?;
        for (layer, indices) in inputs.dag.layer_indices().iter().enumerate() {
            let mut tasks = Vec::new();
            for (position, &pass) in indices.iter().enumerate() {
                let buffers = slot.secondaries.get(&(layer, position)).map(Vec::as_slice).unwrap_or_default();
                tasks.extend(buffers.iter().enumerate().map(|(group, &cmd)| GroupTask {
                    pass,
                    group,
                    cmd,
                }));
            }
            Self::record_groups(device, inputs, &tasks, frame, image_index, scene)?;

            for (position, &index) in indices.iter().enumerate() {
                let target = &inputs.targets[index];
                let info = RenderPassBeginInfo {
                    render_pass: target.render_pass,
                    framebuffer: framebuffer(target, inputs.dag.is_terminal(index), frame, image_index)?,
                    render_area: target.render_area(),
                    clear_values: target.vk_clear_values(),
                };
                let secondaries = slot.secondaries.get(&(layer, position)).map(Vec::as_slice).unwrap_or_default();
                #[cfg(feature = "debug-markers")]
                {
                    primary = primary.begin_label(&inputs.passes[index].name, [0.3, 0.6, 1.0, 1.0]);
                }
                primary = primary
                    .begin_render_pass(&info, vk::SubpassContents::SECONDARY_COMMAND_BUFFERS)
                    .execute_commands(secondaries)
                    .end_render_pass();
                #[cfg(feature = "debug-markers")]
                {
                    primary = primary.end_label();
                }
            }
        }
        primary.finish()
    }

    #[cfg(feature = "rayon")]
    fn record_groups<D: DeviceInterface + ?Sized, U: Sync>(
        device: &D,
        inputs: &RecordInputs<'_, D, U>,
        tasks: &[GroupTask],
        frame: usize,
        image_index: usize,
        scene: &U,
    ) -> Result<()> {
        use rayon::prelude::*;

        if inputs.parallel && tasks.len() > 1 {
            return tasks
                .par_iter()
                .map(|&task| record_group(device, inputs, task, frame, image_index, scene))
                .collect::<Result<Vec<_>>>()
                .map(|_| ());
        }
        for &task in tasks {
            record_group(device, inputs, task, frame, image_index, scene)?;
        }
        Ok(())
    }

    #[cfg(not(feature = "rayon"))]
    fn record_groups<D: DeviceInterface + ?Sized, U: Sync>(
        device: &D,
        inputs: &RecordInputs<'_, D, U>,
        tasks: &[GroupTask],
        frame: usize,
        image_index: usize,
        scene: &U,
    ) -> Result<()> {
        for &task in tasks {
            record_group(device, inputs, task, frame, image_index, scene)?;
        }
        Ok(())
    }

    /// Mark a submitted frame slot as safe to record again.
    pub(crate) fn mark_idle(&mut self, frame: usize) -> Result<()> {
        let slot = self.slot_mut(frame)?;
        if slot.state == RecordState::Recording {
            return Err(Error::InvalidRecordState {
                expected: "Idle or Submitted",
                actual: slot.state,
            }
            .into());
        }
        slot.state = RecordState::Idle;
        Ok(())
    }

    /// Reset every frame slot to idle. Only valid when the device is idle.
    pub(crate) fn reset_states(&mut self) {
        for frame in &mut self.frames {
            frame.state = RecordState::Idle;
        }
    }

    /// Destroy all command pools, which frees their command buffers.
    pub(crate) fn destroy<D: DeviceInterface + ?Sized>(&mut self, device: &D) {
        self.frames.clear();
        for pool in self.pools.drain(..).rev() {
            device.destroy_command_pool(pool);
        }
    }
}
