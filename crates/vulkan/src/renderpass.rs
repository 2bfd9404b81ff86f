//! The bootstrap render pass.
//!
//! A single fixed pass with one color attachment (cleared, stored,
//! transitioned to present) and one depth attachment (cleared,
//! discarded). The stored render area is refreshed whenever the
//! swapchain is recreated; everything else is immutable.

use std::sync::Arc;

use ash::vk;
use tracing::info;

use crate::device::Device;
use crate::error::VulkanResult;

/// The single clear-screen render pass and its clear values.
pub struct RenderPass {
    device: Arc<Device>,
    handle: vk::RenderPass,
    render_area: vk::Rect2D,
    clear_color: [f32; 4],
    depth: f32,
    stencil: u32,
}

impl RenderPass {
    /// Creates the bootstrap pass for the given color/depth formats.
    ///
    /// `render_area` covers the current framebuffer; `clear_color`,
    /// `depth`, and `stencil` are the per-frame clear values.
    pub fn new(
        device: Arc<Device>,
        color_format: vk::Format,
        depth_format: vk::Format,
        render_area: vk::Rect2D,
        clear_color: [f32; 4],
        depth: f32,
        stencil: u32,
    ) -> VulkanResult<Self> {
        let attachments = [
            // Color: cleared, stored, handed to the presentation engine
            vk::AttachmentDescription::default()
                .format(color_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
            // Depth: cleared, contents not needed after the pass
            vk::AttachmentDescription::default()
                .format(depth_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ];

        let color_refs = [vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];
        let depth_ref = vk::AttachmentReference::default()
            .attachment(1)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)];

        // Don't write color until the acquired image is actually available
        let dependencies = [vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            )];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let handle = unsafe { device.handle().create_render_pass(&create_info, None)? };

        info!("Bootstrap render pass created");

        Ok(Self {
            device,
            handle,
            render_area,
            clear_color,
            depth,
            stencil,
        })
    }

    /// The Vulkan render pass handle.
    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.handle
    }

    /// The current render area.
    #[inline]
    pub fn render_area(&self) -> vk::Rect2D {
        self.render_area
    }

    /// Updates the stored render area; called on swapchain recreation.
    pub fn set_render_area(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.render_area = vk::Rect2D {
            offset: vk::Offset2D { x, y },
            extent: vk::Extent2D { width, height },
        };
    }

    /// Begins the pass on `cmd`, bound to `framebuffer`.
    pub fn begin(&self, cmd: vk::CommandBuffer, framebuffer: vk::Framebuffer) {
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: self.depth,
                    stencil: self.stencil,
                },
            },
        ];

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.handle)
            .framebuffer(framebuffer)
            .render_area(self.render_area)
            .clear_values(&clear_values);

        unsafe {
            self.device.handle().cmd_begin_render_pass(
                cmd,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
        }
    }

    /// Ends the pass on `cmd`.
    pub fn end(&self, cmd: vk::CommandBuffer) {
        unsafe {
            self.device.handle().cmd_end_render_pass(cmd);
        }
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_render_pass(self.handle, None);
        }
        info!("Render pass destroyed");
    }
}
