//! The Vulkan renderer backend and its frame orchestration.
//!
//! [`VulkanBackend`] ties the device, swapchain, render pass,
//! framebuffers, command buffers, and synchronization together into the
//! begin-frame/end-frame protocol, and owns the resize/recreate state
//! machine.
//!
//! # Frame sequence
//!
//! ```text
//! begin_frame:
//!   recreation in flight?      -> wait idle, decline
//!   resize pending?            -> wait idle, recreate swapchain, decline
//!   wait in-flight fence       (backpressure: bounds CPU run-ahead)
//!   acquire image              (out-of-date -> recreate, decline)
//!   reset + begin cmd buffer, set viewport/scissor, begin render pass
//! end_frame:
//!   end render pass + recording
//!   wait fence that last wrote this image, claim it, reset own fence
//!   submit (wait image-available at color-output, signal queue-complete)
//!   present (wait queue-complete); advance frame slot
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, error, info, warn};

use prism_platform::{Surface, Window};
use prism_render::{RenderResult, RendererBackend};

use crate::command::{CommandBuffer, CommandPool};
use crate::device::Device;
use crate::error::{VulkanError, VulkanResult};
use crate::framebuffer::Framebuffer;
use crate::instance::Instance;
use crate::physical_device::select_physical_device;
use crate::renderpass::RenderPass;
use crate::swapchain::{ImageAcquire, PresentOutcome, Swapchain};
use crate::sync::FrameSync;

/// Clear color of the bootstrap pass (dark blue).
const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.2, 1.0];

/// Lazily processed resize state.
///
/// The resize notification handler only records the newest dimensions and
/// bumps a generation counter; the render thread compares generations at
/// the top of the next frame and performs the actual recreation there.
/// This keeps all GPU structural changes on the render thread and lets
/// bursts of notifications collapse into a single recreation.
#[derive(Debug)]
pub(crate) struct ResizeSignal {
    width: u32,
    height: u32,
    generation: u64,
    last_generation: u64,
}

impl ResizeSignal {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            generation: 0,
            last_generation: 0,
        }
    }

    /// Records new dimensions and bumps the generation. No GPU work.
    pub(crate) fn notify(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.generation = self.generation.wrapping_add(1);
    }

    /// True when a notification has arrived since the last processed one.
    pub(crate) fn pending(&self) -> bool {
        self.generation != self.last_generation
    }

    /// Marks the current generation as processed.
    pub(crate) fn mark_processed(&mut self) {
        self.last_generation = self.generation;
    }

    /// The most recently reported dimensions.
    pub(crate) fn dims(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True while either dimension is zero (minimized window).
    pub(crate) fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// The Vulkan implementation of [`RendererBackend`].
///
/// Owned by the application's `Renderer`; all GPU handles are mutated
/// only by the render thread driving `begin_frame`/`end_frame`.
pub struct VulkanBackend {
    // Field order doubles as destruction order: synchronization and
    // command state first, then pass/framebuffer objects, then the
    // swapchain, and only then the device, surface, and instance.
    sync: FrameSync,
    command_buffers: Vec<CommandBuffer>,
    graphics_command_pool: CommandPool,
    framebuffers: Vec<Framebuffer>,
    main_renderpass: RenderPass,
    swapchain: Swapchain,
    device: Arc<Device>,
    surface: Surface,
    instance: Instance,

    resize: ResizeSignal,
    recreating_swapchain: bool,
    image_index: u32,
    frame_delta: f32,
}

impl VulkanBackend {
    /// Initializes the full backend for `window`.
    ///
    /// Builds instance, surface, device, swapchain, the bootstrap render
    /// pass with one framebuffer and one command buffer per swapchain
    /// image, and the frame synchronization state. Any failure here is
    /// fatal to startup.
    pub fn new(app_name: &str, window: &Window) -> VulkanResult<Self> {
        let (width, height) = window.framebuffer_size();
        info!("Initializing Vulkan backend ({}x{})", width, height);

        let instance = Instance::new(app_name, cfg!(debug_assertions))?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| VulkanError::Surface(e.to_string()))?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;

        let device = Device::new(&instance, &physical_device_info)?;

        let swapchain = Swapchain::new(&instance, device.clone(), surface.handle(), width, height)?;
        let extent = swapchain.extent();

        let main_renderpass = RenderPass::new(
            device.clone(),
            swapchain.format().format,
            device.depth_format(),
            vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            CLEAR_COLOR,
            1.0,
            0,
        )?;

        let framebuffers = Self::create_framebuffers(&device, &swapchain, &main_renderpass)?;

        let graphics_family = device
            .queue_families()
            .graphics_family
            .ok_or(VulkanError::NoSuitableGpu)?;
        let graphics_command_pool = CommandPool::new(device.clone(), graphics_family)?;

        let command_buffers = Self::create_command_buffers(
            &device,
            &graphics_command_pool,
            swapchain.image_count() as usize,
        )?;

        let sync = FrameSync::new(device.clone(), swapchain.image_count() as usize)?;

        info!(
            "Vulkan backend initialized: {} swapchain images, {}x{}",
            swapchain.image_count(),
            extent.width,
            extent.height
        );

        Ok(Self {
            sync,
            command_buffers,
            graphics_command_pool,
            framebuffers,
            main_renderpass,
            swapchain,
            device,
            surface,
            instance,
            resize: ResizeSignal::new(extent.width, extent.height),
            recreating_swapchain: false,
            image_index: 0,
            frame_delta: 0.0,
        })
    }

    /// One framebuffer per swapchain image, binding the image's color
    /// view and the shared depth view.
    fn create_framebuffers(
        device: &Arc<Device>,
        swapchain: &Swapchain,
        renderpass: &RenderPass,
    ) -> VulkanResult<Vec<Framebuffer>> {
        let extent = swapchain.extent();
        let depth_view = swapchain.depth().view();

        let mut framebuffers = Vec::with_capacity(swapchain.image_count() as usize);
        for &color_view in swapchain.views() {
            let attachments = [color_view, depth_view];
            framebuffers.push(Framebuffer::new(
                device.clone(),
                renderpass,
                extent.width,
                extent.height,
                &attachments,
            )?);
        }

        debug!("Created {} framebuffers", framebuffers.len());
        Ok(framebuffers)
    }

    /// One primary command buffer per swapchain image.
    fn create_command_buffers(
        device: &Arc<Device>,
        pool: &CommandPool,
        count: usize,
    ) -> VulkanResult<Vec<CommandBuffer>> {
        let mut buffers = Vec::with_capacity(count);
        for _ in 0..count {
            buffers.push(CommandBuffer::allocate(device.clone(), pool, true)?);
        }
        debug!("Allocated {} command buffers", count);
        Ok(buffers)
    }

    /// Recreates the swapchain and everything keyed to its images.
    ///
    /// Returns `Ok(false)` when recreation cannot run (already in
    /// progress, or the window is minimized); `Ok(true)` on success.
    fn recreate_swapchain(&mut self) -> VulkanResult<bool> {
        if self.recreating_swapchain {
            debug!("recreate_swapchain called while already recreating");
            return Ok(false);
        }

        let (width, height) = self.resize.dims();
        if width == 0 || height == 0 {
            debug!("Refusing swapchain recreation with zero extent ({}x{})", width, height);
            return Ok(false);
        }

        self.recreating_swapchain = true;

        // Nothing may reference the old images past this point
        self.device.wait_idle()?;
        self.sync.release_images();

        self.swapchain
            .recreate(&self.instance, self.surface.handle(), width, height)?;

        let extent = self.swapchain.extent();
        self.main_renderpass
            .set_render_area(0, 0, extent.width, extent.height);
        self.resize.mark_processed();

        // Per-image resources follow the (possibly changed) image count
        for buffer in &mut self.command_buffers {
            buffer.free(&self.graphics_command_pool)?;
        }
        self.command_buffers.clear();
        self.framebuffers.clear();

        self.framebuffers =
            Self::create_framebuffers(&self.device, &self.swapchain, &self.main_renderpass)?;
        self.command_buffers = Self::create_command_buffers(
            &self.device,
            &self.graphics_command_pool,
            self.swapchain.image_count() as usize,
        )?;
        self.sync
            .set_image_count(self.swapchain.image_count() as usize);

        self.recreating_swapchain = false;
        info!("Swapchain recreated at {}x{}", extent.width, extent.height);
        Ok(true)
    }

    fn begin_frame_impl(&mut self, delta_time: f32) -> VulkanResult<bool> {
        self.frame_delta = delta_time;

        if self.recreating_swapchain {
            self.device.wait_idle()?;
            debug!("Frame declined: swapchain recreation in progress");
            return Ok(false);
        }

        if self.resize.pending() {
            if self.resize.is_zero() {
                debug!("Frame declined: window minimized");
                return Ok(false);
            }

            self.device.wait_idle()?;
            if !self.recreate_swapchain()? {
                return Ok(false);
            }
            debug!("Frame declined: swapchain recreated after resize");
            return Ok(false);
        }

        // Backpressure: block until the GPU has released this frame slot
        if !self.sync.wait_current(u64::MAX)? {
            warn!("In-flight fence wait timed out; declining frame");
            return Ok(false);
        }

        let image_index = match self
            .swapchain
            .acquire_next_image(u64::MAX, self.sync.image_available_handle())?
        {
            ImageAcquire::Acquired { index, suboptimal } => {
                if suboptimal {
                    debug!("Acquired suboptimal swapchain image {}", index);
                }
                index
            }
            ImageAcquire::OutOfDate => {
                self.recreate_swapchain()?;
                return Ok(false);
            }
        };
        self.image_index = image_index;

        let extent = self.swapchain.extent();
        let cmd = &mut self.command_buffers[image_index as usize];
        cmd.reset()?;
        cmd.begin(false, false, false)?;

        // Flip Y so the scene keeps a top-left origin regardless of the
        // API's clip-space convention
        let viewport = vk::Viewport {
            x: 0.0,
            y: extent.height as f32,
            width: extent.width as f32,
            height: -(extent.height as f32),
            min_depth: 0.0,
            max_depth: 1.0,
        };
        cmd.set_viewport(&viewport);

        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        cmd.set_scissor(&scissor);

        self.main_renderpass
            .begin(cmd.handle(), self.framebuffers[image_index as usize].handle());

        Ok(true)
    }

    fn end_frame_impl(&mut self, delta_time: f32) -> VulkanResult<()> {
        self.frame_delta = delta_time;
        let image = self.image_index as usize;

        {
            let cmd = &mut self.command_buffers[image];
            self.main_renderpass.end(cmd.handle());
            cmd.end()?;
        }

        // The per-frame fence alone is not enough: image count and
        // frames-in-flight can differ, so wait for whichever frame last
        // wrote this particular image.
        if !self.sync.wait_image_owner(image, u64::MAX)? {
            warn!("Timed out waiting for previous frame using image {}", image);
        }
        self.sync.claim_image(image);
        self.sync.reset_current()?;

        let wait_semaphores = [self.sync.image_available_handle()];
        // Color writes wait for the image; earlier pipeline stages run
        // before the image is actually available
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.sync.queue_complete_handle()];
        let command_buffers = [self.command_buffers[image].handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.device.handle().queue_submit(
                self.device.graphics_queue(),
                &[submit_info],
                self.sync.current_fence_handle(),
            )?;
        }
        self.command_buffers[image].update_submitted()?;

        match self.swapchain.present(
            self.device.present_queue(),
            self.image_index,
            self.sync.queue_complete_handle(),
        )? {
            PresentOutcome::Presented => {}
            PresentOutcome::NeedsRecreate => {
                debug!("Present requested swapchain recreation");
                self.recreate_swapchain()?;
            }
        }

        self.sync.advance_frame();
        Ok(())
    }

    /// Delta time of the frame currently being recorded.
    #[inline]
    pub fn frame_delta(&self) -> f32 {
        self.frame_delta
    }

    /// The swapchain image count currently in use.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.swapchain.image_count()
    }
}

impl RendererBackend for VulkanBackend {
    fn begin_frame(&mut self, delta_time: f32) -> RenderResult<bool> {
        Ok(self.begin_frame_impl(delta_time)?)
    }

    fn end_frame(&mut self, delta_time: f32) -> RenderResult<()> {
        Ok(self.end_frame_impl(delta_time)?)
    }

    fn on_resized(&mut self, width: u32, height: u32) {
        self.resize.notify(width, height);
        debug!("Resize recorded: {}x{}", width, height);
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle during shutdown: {:?}", e);
        }

        for buffer in &mut self.command_buffers {
            if let Err(e) = buffer.free(&self.graphics_command_pool) {
                error!("Failed to free command buffer during shutdown: {e}");
            }
        }
        self.command_buffers.clear();

        // Remaining teardown runs in field declaration order
        info!("Vulkan backend shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_signal_starts_processed() {
        let resize = ResizeSignal::new(1280, 720);
        assert!(!resize.pending());
        assert_eq!(resize.dims(), (1280, 720));
    }

    #[test]
    fn notification_makes_resize_pending() {
        let mut resize = ResizeSignal::new(1280, 720);
        resize.notify(1920, 1080);
        assert!(resize.pending());
        assert_eq!(resize.dims(), (1920, 1080));

        resize.mark_processed();
        assert!(!resize.pending());
    }

    #[test]
    fn consecutive_notifications_collapse_into_one() {
        // Two resizes before the next frame must produce exactly one
        // recreation, using the most recent dimensions
        let mut resize = ResizeSignal::new(800, 600);
        resize.notify(1024, 768);
        resize.notify(1920, 1080);

        assert!(resize.pending());
        assert_eq!(resize.dims(), (1920, 1080));

        resize.mark_processed();
        assert!(!resize.pending());
    }

    #[test]
    fn zero_dimensions_are_flagged_until_restored() {
        let mut resize = ResizeSignal::new(800, 600);
        resize.notify(0, 0);
        assert!(resize.pending());
        assert!(resize.is_zero());

        // A later nonzero resize clears the minimized state and still
        // reads as a single pending recreation
        resize.notify(800, 600);
        assert!(resize.pending());
        assert!(!resize.is_zero());

        resize.mark_processed();
        assert!(!resize.pending());
    }

    #[test]
    fn partial_zero_counts_as_minimized() {
        let mut resize = ResizeSignal::new(800, 600);
        resize.notify(800, 0);
        assert!(resize.is_zero());
    }
}
