use anyhow::Result;
use ash::vk;

/// A memory allocator for render target images. All allocations are device local.
pub trait Allocator: Clone + Send + Sync {
    type Allocation: Allocation;

    /// Allocate memory satisfying `requirements`. `name` is used for tracking and debug output.
    fn allocate(&mut self, name: &str, requirements: &vk::MemoryRequirements) -> Result<Self::Allocation>;
    fn free(&mut self, allocation: Self::Allocation) -> Result<()>;
}

pub trait Allocation: Send + Sync {
    /// # Safety
    /// The memory must not be freed or accessed outside of `offset()..offset() + size`.
    unsafe fn memory(&self) -> vk::DeviceMemory;
    fn offset(&self) -> vk::DeviceSize;
}
