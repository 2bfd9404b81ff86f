//! Vulkan logical device and queue management.
//!
//! Handles VkDevice creation, queue retrieval, depth format detection,
//! and gpu-allocator initialization.
//!
//! # Overview
//!
//! The [`Device`] struct provides a safe abstraction over the Vulkan
//! logical device:
//! - Logical device creation with the swapchain extension
//! - Queue retrieval for graphics, presentation, and transfer
//! - Depth format detection from a preferred list
//! - Memory allocation via gpu-allocator

use std::sync::{Arc, Mutex};

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use tracing::{debug, info};

use crate::error::VulkanError;
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, QueueFamilyIndices};

/// Required device extensions.
const DEVICE_EXTENSIONS: &[&std::ffi::CStr] = &[ash::khr::swapchain::NAME];

/// Depth formats in preference order. The first one the device supports
/// for optimal-tiling depth/stencil attachments wins.
const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Vulkan logical device wrapper.
///
/// Manages the lifetime of the logical device, its queues, and the memory
/// allocator. Shared across the backend behind an `Arc`; the allocator is
/// protected by a `Mutex`.
pub struct Device {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    allocator: Mutex<Option<Allocator>>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    transfer_queue: vk::Queue,
    queue_families: QueueFamilyIndices,
    depth_format: vk::Format,
}

impl Device {
    /// Creates the logical device and retrieves its queues.
    ///
    /// Also detects the depth attachment format from the preferred list
    /// and initializes the gpu-allocator.
    ///
    /// # Errors
    ///
    /// Returns an error if device creation or allocator initialization
    /// fails, or [`VulkanError::NoSupportedDepthFormat`] if the device
    /// supports none of the candidate depth formats.
    pub fn new(
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
    ) -> Result<Arc<Self>, VulkanError> {
        let queue_families = physical_device_info.queue_families;

        let depth_format =
            detect_depth_format(instance.handle(), physical_device_info.device)
                .ok_or(VulkanError::NoSupportedDepthFormat)?;
        debug!("Detected depth format: {:?}", depth_format);

        let unique_families = queue_families.unique_families();
        let queue_priorities = [1.0f32];

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        debug!(
            "Creating {} queue(s) for families: {:?}",
            queue_create_infos.len(),
            unique_families
        );

        let extension_names: Vec<*const i8> =
            DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device_info.device, &create_info, None)?
        };

        info!("Logical device created");

        // Queue family indices are guaranteed present by device selection
        let graphics_family = queue_families.graphics_family.ok_or(VulkanError::NoSuitableGpu)?;
        let present_family = queue_families.present_family.ok_or(VulkanError::NoSuitableGpu)?;
        let transfer_family = queue_families.transfer_family.ok_or(VulkanError::NoSuitableGpu)?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        let transfer_queue = unsafe { device.get_device_queue(transfer_family, 0) };
        debug!(
            "Queues retrieved (graphics: {}, present: {}, transfer: {})",
            graphics_family, present_family, transfer_family
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: device.clone(),
            physical_device: physical_device_info.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;

        info!("GPU memory allocator initialized");

        Ok(Arc::new(Self {
            device,
            physical_device: physical_device_info.device,
            allocator: Mutex::new(Some(allocator)),
            graphics_queue,
            present_queue,
            transfer_queue,
            queue_families,
            depth_format,
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Returns the graphics queue handle.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the presentation queue handle.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Returns the transfer queue handle. May be the same as the graphics
    /// queue when the device has no dedicated transfer family.
    #[inline]
    pub fn transfer_queue(&self) -> vk::Queue {
        self.transfer_queue
    }

    /// Returns the queue family indices.
    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.queue_families
    }

    /// The depth attachment format detected at device creation.
    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Returns the GPU memory allocator.
    #[inline]
    pub fn allocator(&self) -> &Mutex<Option<Allocator>> {
        &self.allocator
    }

    /// Blocks until all outstanding operations on all queues complete.
    ///
    /// Required before any structural change (swapchain recreation,
    /// shutdown). Recreating resources while GPU work still references
    /// them is undefined behavior.
    pub fn wait_idle(&self) -> Result<(), VulkanError> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                tracing::error!("Failed to wait for device idle during drop: {:?}", e);
            }

            // The allocator must be torn down while the device is alive
            if let Ok(mut guard) = self.allocator.lock() {
                drop(guard.take());
            }

            self.device.destroy_device(None);
        }
        info!("Logical device destroyed");
    }
}

// Safety: ash::Device is Send+Sync, queue/physical-device handles are Copy,
// the allocator is behind a Mutex, and QueueFamilyIndices is Copy.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

/// Finds the first candidate depth format the device supports for
/// optimal-tiling depth/stencil attachments.
fn detect_depth_format(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> Option<vk::Format> {
    let required = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;

    DEPTH_FORMAT_CANDIDATES.into_iter().find(|&format| {
        let props =
            unsafe { instance.get_physical_device_format_properties(physical_device, format) };
        props.optimal_tiling_features.contains(required)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_extensions_include_swapchain() {
        assert!(DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
    }

    #[test]
    fn depth_candidates_are_depth_formats() {
        for format in DEPTH_FORMAT_CANDIDATES {
            assert!(matches!(
                format,
                vk::Format::D32_SFLOAT
                    | vk::Format::D32_SFLOAT_S8_UINT
                    | vk::Format::D24_UNORM_S8_UINT
            ));
        }
    }

    #[test]
    fn device_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Device>();
    }
}
