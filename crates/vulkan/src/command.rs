//! Command pool and command buffer management.
//!
//! Wraps VkCommandPool and VkCommandBuffer. Every command buffer carries
//! an explicit lifecycle state machine; operations attempted from an
//! illegal state are rejected with an error instead of trusting the
//! caller.
//!
//! # Lifecycle
//!
//! ```text
//! NotAllocated --begin--> Recording --end--> RecordingEnded
//!      ^  ^                   ^                    |
//!      |  |                   |                 submit
//!      |  +----- reset -------+----------+        |
//!      |                                 |        v
//!      +-------------- free ------------ Ready  Submitted
//! ```
//!
//! `reset` returns any allocated buffer to `Ready` so the slot can be
//! re-recorded each frame without reallocation.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{VulkanError, VulkanResult};

/// Vulkan command pool wrapper.
///
/// Allocates command buffers for a single queue family. Created with
/// `RESET_COMMAND_BUFFER` so individual buffers can be reset without
/// resetting the whole pool.
///
/// Not thread-safe; use one pool per recording thread.
pub struct CommandPool {
    device: Arc<Device>,
    pool: vk::CommandPool,
    queue_family_index: u32,
}

impl CommandPool {
    /// Creates a command pool for the given queue family.
    pub fn new(device: Arc<Device>, queue_family_index: u32) -> VulkanResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe { device.handle().create_command_pool(&create_info, None)? };

        info!("Command pool created for queue family {}", queue_family_index);

        Ok(Self {
            device,
            pool,
            queue_family_index,
        })
    }

    /// The Vulkan command pool handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// The queue family this pool allocates for.
    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_command_pool(self.pool, None);
        }
        info!(
            "Command pool destroyed for queue family {}",
            self.queue_family_index
        );
    }
}

/// Lifecycle states of a command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandBufferState {
    /// Freshly allocated (or freed); no recording has started yet.
    NotAllocated,
    /// Ready to begin recording.
    Ready,
    /// Recording is in progress.
    Recording,
    /// Recording has ended; the buffer can be submitted.
    RecordingEnded,
    /// The buffer has been submitted and is owned by the GPU until its
    /// fence signals.
    Submitted,
}

/// Operations that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommandBufferOp {
    Begin,
    End,
    Submit,
    Reset,
    Free,
}

impl CommandBufferState {
    /// Computes the successor state for `op`, or `None` when the
    /// transition is illegal from this state.
    pub(crate) fn transition(self, op: CommandBufferOp) -> Option<CommandBufferState> {
        use CommandBufferOp::*;
        use CommandBufferState::*;

        match (self, op) {
            (NotAllocated | Ready, Begin) => Some(Recording),
            (Recording, End) => Some(RecordingEnded),
            (RecordingEnded, Submit) => Some(Submitted),
            (_, Reset) => Some(Ready),
            (_, Free) => Some(NotAllocated),
            _ => None,
        }
    }
}

/// Vulkan command buffer wrapper with lifecycle tracking.
///
/// The buffer is exclusively owned by its slot (one per swapchain image
/// in the backend); only one recording is in flight per slot at a time.
pub struct CommandBuffer {
    device: Arc<Device>,
    handle: vk::CommandBuffer,
    state: CommandBufferState,
}

impl CommandBuffer {
    /// Allocates a command buffer from `pool`.
    ///
    /// The buffer starts in [`CommandBufferState::NotAllocated`] until its
    /// first `begin`.
    pub fn allocate(
        device: Arc<Device>,
        pool: &CommandPool,
        is_primary: bool,
    ) -> VulkanResult<Self> {
        let level = if is_primary {
            vk::CommandBufferLevel::PRIMARY
        } else {
            vk::CommandBufferLevel::SECONDARY
        };

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool.handle())
            .level(level)
            .command_buffer_count(1);

        let buffers = unsafe { device.handle().allocate_command_buffers(&alloc_info)? };

        Ok(Self {
            device,
            handle: buffers[0],
            state: CommandBufferState::NotAllocated,
        })
    }

    /// The raw Vulkan command buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    /// The current lifecycle state.
    #[inline]
    pub fn state(&self) -> CommandBufferState {
        self.state
    }

    fn advance(&mut self, op: CommandBufferOp, name: &'static str) -> VulkanResult<CommandBufferState> {
        self.state
            .transition(op)
            .ok_or(VulkanError::InvalidCommandBufferTransition {
                from: self.state,
                op: name,
            })
    }

    /// Begins recording.
    ///
    /// The three flags are independent usage hints, not mutually
    /// exclusive:
    /// * `single_use` - recorded once, then discarded
    /// * `renderpass_continue` - a secondary buffer entirely inside a
    ///   render pass
    /// * `simultaneous_use` - may be resubmitted while pending
    pub fn begin(
        &mut self,
        single_use: bool,
        renderpass_continue: bool,
        simultaneous_use: bool,
    ) -> VulkanResult<()> {
        let next = self.advance(CommandBufferOp::Begin, "begin")?;

        let mut flags = vk::CommandBufferUsageFlags::empty();
        if single_use {
            flags |= vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT;
        }
        if renderpass_continue {
            flags |= vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE;
        }
        if simultaneous_use {
            flags |= vk::CommandBufferUsageFlags::SIMULTANEOUS_USE;
        }

        let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);

        unsafe {
            self.device
                .handle()
                .begin_command_buffer(self.handle, &begin_info)?;
        }

        self.state = next;
        Ok(())
    }

    /// Ends recording. Rejected unless the buffer is `Recording`.
    pub fn end(&mut self) -> VulkanResult<()> {
        let next = self.advance(CommandBufferOp::End, "end")?;

        unsafe {
            self.device.handle().end_command_buffer(self.handle)?;
        }

        self.state = next;
        Ok(())
    }

    /// Marks the buffer as submitted. Rejected unless recording has
    /// ended.
    pub fn update_submitted(&mut self) -> VulkanResult<()> {
        let next = self.advance(CommandBufferOp::Submit, "submit")?;
        self.state = next;
        Ok(())
    }

    /// Resets the buffer back to `Ready` so the slot can be reused
    /// without reallocation.
    pub fn reset(&mut self) -> VulkanResult<()> {
        let next = self.advance(CommandBufferOp::Reset, "reset")?;

        unsafe {
            self.device
                .handle()
                .reset_command_buffer(self.handle, vk::CommandBufferResetFlags::empty())?;
        }

        self.state = next;
        Ok(())
    }

    /// Returns the buffer to the pool.
    pub fn free(&mut self, pool: &CommandPool) -> VulkanResult<()> {
        let next = self.advance(CommandBufferOp::Free, "free")?;

        if self.handle != vk::CommandBuffer::null() {
            let buffers = [self.handle];
            unsafe {
                self.device
                    .handle()
                    .free_command_buffers(pool.handle(), &buffers);
            }
            self.handle = vk::CommandBuffer::null();
        }

        self.state = next;
        Ok(())
    }

    /// Sets the dynamic viewport.
    pub fn set_viewport(&self, viewport: &vk::Viewport) {
        unsafe {
            self.device
                .handle()
                .cmd_set_viewport(self.handle, 0, std::slice::from_ref(viewport));
        }
    }

    /// Sets the dynamic scissor rectangle.
    pub fn set_scissor(&self, scissor: &vk::Rect2D) {
        unsafe {
            self.device
                .handle()
                .cmd_set_scissor(self.handle, 0, std::slice::from_ref(scissor));
        }
    }

    /// Allocates a primary buffer and immediately begins a single-use
    /// recording. Pair with [`end_single_use`](Self::end_single_use).
    pub fn allocate_and_begin_single_use(
        device: Arc<Device>,
        pool: &CommandPool,
    ) -> VulkanResult<Self> {
        let mut buffer = Self::allocate(device, pool, true)?;
        buffer.begin(true, false, false)?;
        Ok(buffer)
    }

    /// Ends a single-use recording: submits to `queue`, waits for the
    /// work to complete, and frees the buffer.
    ///
    /// The buffer is freed on every exit path, including submit failure.
    pub fn end_single_use(mut self, pool: &CommandPool, queue: vk::Queue) -> VulkanResult<()> {
        let submit_result = self.submit_and_wait(queue);
        let free_result = self.free(pool);
        submit_result.and(free_result)
    }

    fn submit_and_wait(&mut self, queue: vk::Queue) -> VulkanResult<()> {
        self.end()?;

        let command_buffers = [self.handle];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

        unsafe {
            self.device
                .handle()
                .queue_submit(queue, &[submit_info], vk::Fence::null())?;
            self.device.handle().queue_wait_idle(queue)?;
        }

        self.update_submitted()?;
        debug!("Single-use command buffer completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use CommandBufferOp::*;
    use CommandBufferState::*;

    #[test]
    fn fresh_buffer_may_begin() {
        assert_eq!(NotAllocated.transition(Begin), Some(Recording));
        assert_eq!(Ready.transition(Begin), Some(Recording));
    }

    #[test]
    fn begin_is_illegal_while_recording_or_pending() {
        assert_eq!(Recording.transition(Begin), None);
        assert_eq!(RecordingEnded.transition(Begin), None);
        assert_eq!(Submitted.transition(Begin), None);
    }

    #[test]
    fn end_requires_an_active_recording() {
        assert_eq!(Recording.transition(End), Some(RecordingEnded));
        assert_eq!(NotAllocated.transition(End), None);
        assert_eq!(Ready.transition(End), None);
        assert_eq!(RecordingEnded.transition(End), None);
        assert_eq!(Submitted.transition(End), None);
    }

    #[test]
    fn submit_requires_ended_recording() {
        assert_eq!(RecordingEnded.transition(Submit), Some(Submitted));
        assert_eq!(Recording.transition(Submit), None);
        assert_eq!(Ready.transition(Submit), None);
    }

    #[test]
    fn reset_returns_any_state_to_ready() {
        for state in [NotAllocated, Ready, Recording, RecordingEnded, Submitted] {
            assert_eq!(state.transition(Reset), Some(Ready));
        }
    }

    #[test]
    fn free_returns_any_state_to_not_allocated() {
        for state in [NotAllocated, Ready, Recording, RecordingEnded, Submitted] {
            assert_eq!(state.transition(Free), Some(NotAllocated));
        }
    }

    #[test]
    fn full_frame_cycle_is_legal() {
        let mut state = NotAllocated;
        for op in [Begin, End, Submit, Reset, Begin, End, Submit] {
            state = state.transition(op).expect("legal frame cycle");
        }
        assert_eq!(state, Submitted);
    }
}
