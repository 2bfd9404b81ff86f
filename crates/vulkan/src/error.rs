//! Backend-specific error types.

use thiserror::Error;

use crate::command::CommandBufferState;

/// Vulkan backend error type.
#[derive(Error, Debug)]
pub enum VulkanError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] ash::vk::Result),

    /// Failed to load the Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    Allocator(#[from] gpu_allocator::AllocationError),

    /// No GPU with graphics + present + transfer support was found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// None of the preferred depth formats is supported by the device
    #[error("No supported depth format found")]
    NoSupportedDepthFormat,

    /// Surface creation or query error
    #[error("Surface error: {0}")]
    Surface(String),

    /// Swapchain creation error
    #[error("Swapchain error: {0}")]
    Swapchain(String),

    /// A command buffer operation was attempted from a state in which it
    /// is not legal
    #[error("Illegal command buffer transition: {op} from {from:?}")]
    InvalidCommandBufferTransition {
        from: CommandBufferState,
        op: &'static str,
    },
}

/// Result type alias for backend operations.
pub type VulkanResult<T> = std::result::Result<T, VulkanError>;

impl From<VulkanError> for prism_render::RenderError {
    fn from(err: VulkanError) -> Self {
        prism_render::RenderError::Backend(err.to_string())
    }
}
