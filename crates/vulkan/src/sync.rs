//! Synchronization primitives and per-frame synchronization state.
//!
//! - [`Semaphore`] - GPU-to-GPU ordering between queue operations
//! - [`Fence`] - GPU-to-CPU completion, observable via a blocking wait
//! - [`FrameSync`] - the per-frame-in-flight semaphore pairs and fence
//!   arena, plus the per-image "which fence last wrote this image" table
//!
//! # Backpressure
//!
//! Frame `N + MAX_FRAMES_IN_FLIGHT` cannot begin until frame `N`'s fence
//! signals: waiting on the current frame slot's fence at the top of each
//! frame bounds how far the CPU can run ahead of the GPU.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::VulkanResult;

/// Maximum number of frames processed concurrently.
///
/// Two lets the CPU prepare the next frame while the GPU renders the
/// current one.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Vulkan semaphore wrapper (GPU-to-GPU synchronization).
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new semaphore in the unsignaled state.
    pub fn new(device: Arc<Device>) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };
        Ok(Self { device, semaphore })
    }

    /// The Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Vulkan fence wrapper (GPU-to-CPU synchronization).
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a new fence.
    ///
    /// `start_signaled` creates the fence already signaled — required for
    /// in-flight fences so the very first frame never blocks waiting for
    /// a previous frame that does not exist.
    pub fn new(device: Arc<Device>, start_signaled: bool) -> VulkanResult<Self> {
        let flags = if start_signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);
        let fence = unsafe { device.handle().create_fence(&create_info, None)? };

        Ok(Self { device, fence })
    }

    /// The Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until the fence signals or `timeout` (nanoseconds) expires.
    ///
    /// Returns `Ok(true)` when the fence signaled and `Ok(false)` on
    /// timeout — a timeout is a per-frame soft failure, not an error.
    pub fn wait(&self, timeout: u64) -> VulkanResult<bool> {
        let fences = [self.fence];
        let result = unsafe { self.device.handle().wait_for_fences(&fences, true, timeout) };

        match result {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Resets the fence to the unsignaled state. The fence must not be in
    /// use by any queue operation.
    pub fn reset(&self) -> VulkanResult<()> {
        let fences = [self.fence];
        unsafe { self.device.handle().reset_fences(&fences)? };
        Ok(())
    }

    /// Non-blocking signaled check.
    pub fn is_signaled(&self) -> bool {
        let result = unsafe { self.device.handle().get_fence_status(self.fence) };
        matches!(result, Ok(true))
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

/// Tracks which in-flight fence most recently wrote each swapchain image.
///
/// This is a lookup table only: entries are *indices* into the fence
/// arena, never owners of the fences themselves. Image count and
/// frame-in-flight count can differ, so the per-frame fence wait alone is
/// not enough to know an image is free — this table closes that gap.
#[derive(Debug, Default)]
pub struct ImageOwners {
    owners: Vec<Option<usize>>,
}

impl ImageOwners {
    /// Creates a table for `image_count` images, every slot unowned.
    pub fn new(image_count: usize) -> Self {
        Self {
            owners: vec![None; image_count],
        }
    }

    /// The fence index that last wrote `image`, if any.
    #[inline]
    pub fn owner(&self, image: usize) -> Option<usize> {
        self.owners.get(image).copied().flatten()
    }

    /// Records `fence_index` as the owner of `image`, replacing any
    /// previous owner (each image has at most one).
    pub fn claim(&mut self, image: usize, fence_index: usize) {
        if let Some(slot) = self.owners.get_mut(image) {
            *slot = Some(fence_index);
        }
    }

    /// Clears all ownership, e.g. after a device idle-wait during
    /// swapchain recreation.
    pub fn release_all(&mut self) {
        for slot in &mut self.owners {
            *slot = None;
        }
    }

    /// Resizes the table for a new image count; all slots become unowned.
    pub fn set_image_count(&mut self, image_count: usize) {
        self.owners.clear();
        self.owners.resize(image_count, None);
    }

    /// Number of tracked images.
    #[inline]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// True when no images are tracked.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Per-frame-in-flight synchronization state.
///
/// Owns [`MAX_FRAMES_IN_FLIGHT`] "image available" / "queue complete"
/// semaphore pairs and an arena of in-flight fences (created signaled),
/// plus the [`ImageOwners`] table mapping swapchain images to the fence
/// that last wrote them.
pub struct FrameSync {
    image_available: Vec<Semaphore>,
    queue_complete: Vec<Semaphore>,
    in_flight: Vec<Fence>,
    image_owners: ImageOwners,
    current_frame: usize,
}

impl FrameSync {
    /// Creates synchronization state for `image_count` swapchain images.
    pub fn new(device: Arc<Device>, image_count: usize) -> VulkanResult<Self> {
        let mut image_available = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut queue_complete = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut in_flight = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);

        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            image_available.push(Semaphore::new(device.clone())?);
            queue_complete.push(Semaphore::new(device.clone())?);
            // Signaled so the first frame's wait returns immediately
            in_flight.push(Fence::new(device.clone(), true)?);
        }

        debug!(
            "Frame synchronization created: {} frames in flight, {} images",
            MAX_FRAMES_IN_FLIGHT, image_count
        );

        Ok(Self {
            image_available,
            queue_complete,
            in_flight,
            image_owners: ImageOwners::new(image_count),
            current_frame: 0,
        })
    }

    /// The current frame slot index in `[0, MAX_FRAMES_IN_FLIGHT)`.
    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Advances to the next frame slot.
    pub fn advance_frame(&mut self) {
        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
    }

    /// The current frame's "image available" semaphore handle.
    #[inline]
    pub fn image_available_handle(&self) -> vk::Semaphore {
        self.image_available[self.current_frame].handle()
    }

    /// The current frame's "queue complete" semaphore handle.
    #[inline]
    pub fn queue_complete_handle(&self) -> vk::Semaphore {
        self.queue_complete[self.current_frame].handle()
    }

    /// The current frame's in-flight fence handle.
    #[inline]
    pub fn current_fence_handle(&self) -> vk::Fence {
        self.in_flight[self.current_frame].handle()
    }

    /// Waits on the current frame's in-flight fence. This is the
    /// principal backpressure point bounding CPU run-ahead.
    ///
    /// Returns `Ok(false)` on timeout.
    pub fn wait_current(&self, timeout: u64) -> VulkanResult<bool> {
        self.in_flight[self.current_frame].wait(timeout)
    }

    /// Resets the current frame's fence for reuse.
    pub fn reset_current(&self) -> VulkanResult<()> {
        self.in_flight[self.current_frame].reset()
    }

    /// Waits on whichever fence last wrote `image`, if any.
    ///
    /// Returns `Ok(false)` on timeout.
    pub fn wait_image_owner(&self, image: usize, timeout: u64) -> VulkanResult<bool> {
        match self.image_owners.owner(image) {
            Some(fence_index) => self.in_flight[fence_index].wait(timeout),
            None => Ok(true),
        }
    }

    /// Records the current frame's fence as the new owner of `image`.
    pub fn claim_image(&mut self, image: usize) {
        self.image_owners.claim(image, self.current_frame);
    }

    /// Clears all image ownership. Call after a device idle-wait, before
    /// swapchain recreation.
    pub fn release_images(&mut self) {
        self.image_owners.release_all();
    }

    /// Resizes the image ownership table after recreation changed the
    /// image count.
    pub fn set_image_count(&mut self, image_count: usize) {
        self.image_owners.set_image_count(image_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn max_frames_in_flight_is_two() {
        assert_eq!(MAX_FRAMES_IN_FLIGHT, 2);
    }

    #[test]
    fn frame_index_cycles_modulo_frames_in_flight() {
        let mut frame = 0usize;
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(frame);
            frame = (frame + 1) % MAX_FRAMES_IN_FLIGHT;
        }
        assert_eq!(seen, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn new_table_has_no_owners() {
        let owners = ImageOwners::new(3);
        assert_eq!(owners.len(), 3);
        for image in 0..3 {
            assert_eq!(owners.owner(image), None);
        }
    }

    #[test]
    fn claim_replaces_previous_owner() {
        let mut owners = ImageOwners::new(3);
        owners.claim(1, 0);
        assert_eq!(owners.owner(1), Some(0));

        // The image can have at most one owner at a time
        owners.claim(1, 1);
        assert_eq!(owners.owner(1), Some(1));
    }

    #[test]
    fn release_all_clears_every_slot() {
        let mut owners = ImageOwners::new(2);
        owners.claim(0, 0);
        owners.claim(1, 1);
        owners.release_all();
        assert_eq!(owners.owner(0), None);
        assert_eq!(owners.owner(1), None);
    }

    #[test]
    fn set_image_count_resets_ownership() {
        let mut owners = ImageOwners::new(2);
        owners.claim(0, 1);
        owners.set_image_count(4);
        assert_eq!(owners.len(), 4);
        assert_eq!(owners.owner(0), None);
    }

    #[test]
    fn out_of_range_claims_are_ignored() {
        let mut owners = ImageOwners::new(2);
        owners.claim(7, 0);
        assert_eq!(owners.owner(7), None);
    }

    #[test]
    fn sync_types_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Semaphore>();
        assert_send::<Fence>();
        assert_send::<FrameSync>();
    }
}
