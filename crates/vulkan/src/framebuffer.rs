//! Framebuffers binding swapchain image views to the render pass.
//!
//! Strictly one framebuffer per swapchain image; all of them are
//! destroyed and rebuilt whenever the swapchain is recreated.

use std::sync::Arc;

use ash::vk;

use crate::device::Device;
use crate::error::VulkanResult;
use crate::renderpass::RenderPass;

/// A framebuffer binding an image's color view plus the shared depth
/// view to the bootstrap render pass.
pub struct Framebuffer {
    device: Arc<Device>,
    handle: vk::Framebuffer,
    // Kept so the attachment list outlives the Vulkan object
    attachments: Vec<vk::ImageView>,
}

impl Framebuffer {
    /// Creates a framebuffer for `renderpass` over `attachments`.
    pub fn new(
        device: Arc<Device>,
        renderpass: &RenderPass,
        width: u32,
        height: u32,
        attachments: &[vk::ImageView],
    ) -> VulkanResult<Self> {
        let attachments = attachments.to_vec();

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(renderpass.handle())
            .attachments(&attachments)
            .width(width)
            .height(height)
            .layers(1);

        let handle = unsafe { device.handle().create_framebuffer(&create_info, None)? };

        Ok(Self {
            device,
            handle,
            attachments,
        })
    }

    /// The Vulkan framebuffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.handle
    }

    /// Number of bound attachments.
    #[inline]
    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_framebuffer(self.handle, None);
        }
    }
}
