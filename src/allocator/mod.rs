//! Device memory for render graph images.
//! # Allocator traits
//! These are defined in [`traits`], and can be implemented to supply a custom allocator to [`VulkanDevice`](crate::VulkanDevice).
//! # Default allocator
//! A default allocator based on the `gpu_allocator` crate. [`VulkanDevice`](crate::VulkanDevice) uses it unless told otherwise.

pub mod default_allocator;
pub mod traits;
