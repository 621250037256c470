//! Contains a default allocator type based on the [`gpu_allocator`] crate.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use ash::vk;
use gpu_allocator::vulkan as vk_alloc;
use gpu_allocator::vulkan::AllocationScheme;

use crate::allocator::traits;
use crate::Error;

/// The default allocator. This calls into the `gpu_allocator` crate.
/// It's important to note that this allocator is `Clone`, `Send` and `Sync`. All its internal state is safely
/// wrapped inside an `Arc<Mutex<T>>`.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct DefaultAllocator {
    #[derivative(Debug = "ignore")]
    alloc: Arc<Mutex<vk_alloc::Allocator>>,
}

/// Allocation returned from the default allocator. Freed when dropped.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Allocation {
    #[derivative(Debug = "ignore")]
    allocator: DefaultAllocator,
    // Always `Some` until freed.
    allocation: Option<vk_alloc::Allocation>,
}

impl DefaultAllocator {
    /// Create a new default allocator.
    /// # Errors
    /// * May fail if creating the internal `gpu_allocator` fails.
    pub fn new(instance: &ash::Instance, device: &ash::Device, physical_device: vk::PhysicalDevice) -> Result<Self> {
        Ok(Self {
            alloc: Arc::new(Mutex::new(vk_alloc::Allocator::new(&vk_alloc::AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
            })?)),
        })
    }

    fn free_impl(&self, allocation: &mut Allocation) -> Result<()> {
        let mut alloc = self.alloc.lock().map_err(|_| Error::PoisonError)?;
        if let Some(allocation) = allocation.allocation.take() {
            alloc.free(allocation)?;
        }
        Ok(())
    }
}

impl traits::Allocator for DefaultAllocator {
    type Allocation = Allocation;

    /// Allocates device local memory. To get proper requirements, call `vkGetImageMemoryRequirements` on the image.
    /// # Errors
    /// * May fail if the device is out of memory
    /// * May fail if invalid [`vk::MemoryRequirements`] were passed in.
    fn allocate(&mut self, name: &str, requirements: &vk::MemoryRequirements) -> Result<Self::Allocation> {
        let mut alloc = self.alloc.lock().map_err(|_| Error::PoisonError)?;
        let allocation = alloc
            .allocate(&vk_alloc::AllocationCreateDesc {
                name,
                requirements: *requirements,
                location: gpu_allocator::MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(Error::from)?;

        Ok(Allocation {
            allocator: self.clone(),
            allocation: Some(allocation),
        })
    }

    /// Explicitly free memory owned by this allocator. Dropping the allocation does the same.
    fn free(&mut self, mut allocation: Self::Allocation) -> Result<()> {
        self.free_impl(&mut allocation)
    }
}

impl traits::Allocation for Allocation {
    unsafe fn memory(&self) -> vk::DeviceMemory {
        self.allocation.as_ref().map(|a| a.memory()).unwrap_or_default()
    }

    fn offset(&self) -> vk::DeviceSize {
        self.allocation.as_ref().map(|a| a.offset()).unwrap_or_default()
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        let allocator = self.allocator.clone();
        if let Err(e) = allocator.free_impl(self) {
            error!("Failed to free image memory: {e}");
        }
    }
}
