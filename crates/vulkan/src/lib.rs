//! Vulkan renderer backend.
//!
//! A safe abstraction over Vulkan built on the `ash` crate. It owns:
//! - Instance and device creation, queue selection
//! - Swapchain creation/recreation and the shared depth attachment
//! - Command pool/buffer lifecycle with a verified state machine
//! - Per-frame synchronization (semaphores, fences, image ownership)
//! - The bootstrap render pass and its framebuffers
//! - The begin-frame/end-frame orchestration in [`VulkanBackend`]

mod error;

pub mod backend;
pub mod command;
pub mod device;
pub mod framebuffer;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod renderpass;
pub mod swapchain;
pub mod sync;

pub use backend::VulkanBackend;
pub use error::{VulkanError, VulkanResult};

// Re-export ash types that callers might need
pub use ash::vk;
