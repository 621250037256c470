//! Exposes the strata error type

use std::sync::PoisonError;

use ash;
use gpu_allocator::AllocationError;
use thiserror::Error;

/// Error type that strata can return. All public functions return an [`anyhow::Result`], use
/// `err.downcast_ref::<Error>()` to inspect the cause.
#[derive(Error, Debug)]
pub enum Error {
    /// Generic Vulkan error type.
    #[error("Vulkan error: `{0}`")]
    VkError(ash::vk::Result),
    /// Vulkan allocation error.
    #[error("Vulkan allocation error: `{0}`")]
    AllocationError(AllocationError),
    /// The graph description could not be deserialized.
    #[error("Invalid graph description: `{0}`")]
    ParseError(serde_json::Error),
    /// Reading a graph description or shader file failed.
    #[error("I/O error: `{0}`")]
    IoError(std::io::Error),
    /// The graph has no passes.
    #[error("Render graph has no passes.")]
    EmptyGraph,
    /// Two passes share a name.
    #[error("Pass `{0}` is declared more than once.")]
    DuplicatePass(String),
    /// A pass (transitively) depends on its own output.
    #[error("Render graph contains a cycle through pass `{pass}`.")]
    CyclicDependency { pass: String },
    /// A pass input is not produced by any pass.
    #[error("Input `{input}` of pass `{pass}` is not produced by any pass.")]
    UnresolvedInput { pass: String, input: String },
    /// Two passes claim the same output name.
    #[error("Output `{output}` is produced by both `{first}` and `{second}`.")]
    DuplicateOutput { output: String, first: String, second: String },
    /// The graph does not converge into exactly one terminal pass.
    #[error("Render graph must have exactly one terminal pass, found {terminals:?}.")]
    DisconnectedGraph { terminals: Vec<String> },
    /// A pass is not valid on its own, for example because it declares two depth outputs.
    #[error("Invalid configuration for pass `{pass}`: {reason}")]
    InvalidPassConfiguration { pass: String, reason: String },
    /// Unknown pixel format string.
    #[error("Unsupported format `{0}`.")]
    UnsupportedFormat(String),
    /// Unknown or unhandled descriptor binding type.
    #[error("Unsupported descriptor binding type `{0}`.")]
    UnsupportedBindingType(String),
    /// Unknown shader stage string.
    #[error("Unsupported shader stage `{0}`.")]
    UnsupportedShaderStage(String),
    /// Unknown value for an enumerated pipeline state field.
    #[error("Unsupported value `{value}` for `{field}`.")]
    UnsupportedValue { field: &'static str, value: String },
    /// A binding names a resource that is neither an attachment nor an external resource.
    #[error("Resource `{resource}` bound in `{pass}::{pipeline}` was not found.")]
    ResourceNotFound { pass: String, pipeline: String, resource: String },
    /// An external resource was registered twice.
    #[error("Resource `{0}` is already registered.")]
    DuplicateResource(String),
    /// Shader loading or pipeline creation failed.
    #[error("Failed to compile pipeline `{pipeline}`: {reason}")]
    PipelineCompilation { pipeline: String, reason: String },
    /// No draw logic was registered for a pipeline.
    #[error("No pipeline executor registered for pipeline `{0}`.")]
    MissingPipelineExecutor(String),
    /// Pass lookup by name failed.
    #[error("Pass `{0}` not found.")]
    PassNotFound(String),
    /// Pipeline lookup by name failed.
    #[error("Pipeline `{pipeline}` not found in pass `{pass}`.")]
    PipelineNotFound { pass: String, pipeline: String },
    /// A command that needs a pipeline layout was recorded before any pipeline was bound.
    #[error("No pipeline bound.")]
    NoPipelineBound,
    /// Frame slot or presentable image index out of range.
    #[error("Index {index} out of range, only {count} available.")]
    InvalidFrameIndex { index: usize, count: usize },
    /// Frame slot used in the wrong state.
    #[error("Frame slot is `{actual:?}`, expected `{expected}`.")]
    InvalidRecordState { expected: &'static str, actual: crate::graph::record::RecordState },
    /// The presentable surface is stale and the graph must be recreated.
    #[error("Surface is out of date.")]
    SurfaceOutOfDate,
    /// Poisoned mutex
    #[error("Poisoned mutex")]
    PoisonError,
}

impl From<ash::vk::Result> for Error {
    fn from(value: ash::vk::Result) -> Self {
        match value {
            ash::vk::Result::ERROR_OUT_OF_DATE_KHR => Error::SurfaceOutOfDate,
            other => Error::VkError(other),
        }
    }
}

impl From<AllocationError> for Error {
    fn from(value: AllocationError) -> Self {
        Error::AllocationError(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::ParseError(value)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::IoError(value)
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::PoisonError
    }
}
