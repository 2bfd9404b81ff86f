//! Physical device (GPU) selection.
//!
//! Enumerates available GPUs and selects one exposing graphics, present,
//! and transfer queue support plus adequate swapchain support. Failure to
//! find a suitable device is fatal to startup and is not retried.

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::VulkanError;
use crate::swapchain::SwapchainSupport;

/// Queue family indices for the queue types the renderer needs.
///
/// Graphics and present may coincide or differ; the swapchain image
/// sharing mode depends on which (see the swapchain module).
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueFamilyIndices {
    /// Index of the queue family supporting graphics operations.
    pub graphics_family: Option<u32>,
    /// Index of the queue family supporting presentation to the surface.
    pub present_family: Option<u32>,
    /// Index of the queue family supporting transfer operations.
    pub transfer_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// True when every required queue family has been found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some()
            && self.present_family.is_some()
            && self.transfer_family.is_some()
    }

    /// The distinct queue family indices, for logical device creation.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(3);
        for family in [
            self.graphics_family,
            self.present_family,
            self.transfer_family,
        ]
        .into_iter()
        .flatten()
        {
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }
}

/// Information about a selected physical device.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version).
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family indices for the required operations.
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// The device name as a string.
    pub fn device_name(&self) -> &str {
        unsafe {
            CStr::from_ptr(self.properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("Unknown Device")
        }
    }

    /// Human-readable device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Selects the most suitable physical device for rendering.
///
/// Requires graphics + present + transfer queue families and a surface
/// with at least one format and one present mode. Discrete GPUs are
/// preferred over integrated ones.
///
/// # Errors
///
/// Returns [`VulkanError::NoSuitableGpu`] if no device qualifies.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, VulkanError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(VulkanError::NoSuitableGpu);
    }

    info!("Found {} GPU(s)", devices.len());

    let mut best: Option<(PhysicalDeviceInfo, u32)> = None;

    for device in devices {
        let info = match check_device(instance, device, surface, surface_loader)? {
            Some(info) => info,
            None => continue,
        };

        let score = rate_device(&info);
        debug!(
            "GPU '{}' ({}) - score {}",
            info.device_name(),
            info.device_type_name(),
            score
        );

        let better = match &best {
            Some((_, best_score)) => score > *best_score,
            None => true,
        };
        if better {
            best = Some((info, score));
        }
    }

    let (selected, score) = best.ok_or(VulkanError::NoSuitableGpu)?;

    info!(
        "Selected GPU: '{}' ({}) - score {}",
        selected.device_name(),
        selected.device_type_name(),
        score
    );

    Ok(selected)
}

/// Checks a device for the required queue families and swapchain support.
fn check_device(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<Option<PhysicalDeviceInfo>, VulkanError> {
    let queue_families = find_queue_families(instance, device, surface, surface_loader)?;
    if !queue_families.is_complete() {
        return Ok(None);
    }

    let support = SwapchainSupport::query(device, surface, surface_loader)?;
    if !support.is_adequate() {
        return Ok(None);
    }

    let properties = unsafe { instance.get_physical_device_properties(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    Ok(Some(PhysicalDeviceInfo {
        device,
        properties,
        memory_properties,
        queue_families,
    }))
}

/// Locates graphics, present, and transfer queue families.
///
/// A dedicated transfer family (transfer without graphics) is preferred
/// so transfer-heavy work can run off the graphics queue; otherwise the
/// graphics family is used since graphics queues implicitly support
/// transfer.
fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<QueueFamilyIndices, VulkanError> {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilyIndices::default();
    let mut dedicated_transfer: Option<u32> = None;

    for (i, family) in families.iter().enumerate() {
        let index = i as u32;

        if indices.graphics_family.is_none()
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            indices.graphics_family = Some(index);
        }

        if family.queue_flags.contains(vk::QueueFlags::TRANSFER)
            && !family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            && dedicated_transfer.is_none()
        {
            dedicated_transfer = Some(index);
        }

        if indices.present_family.is_none() {
            let supported = unsafe {
                surface_loader.get_physical_device_surface_support(device, index, surface)?
            };
            if supported {
                indices.present_family = Some(index);
            }
        }
    }

    indices.transfer_family = dedicated_transfer.or(indices.graphics_family);

    Ok(indices)
}

/// Scores a device for selection; higher is better.
fn rate_device(info: &PhysicalDeviceInfo) -> u32 {
    let mut score = match info.properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 50,
        _ => 10,
    };

    // A dedicated transfer family is a mild bonus
    if info.queue_families.transfer_family != info.queue_families.graphics_family {
        score += 50;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_families_deduplicates_shared_indices() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
            transfer_family: Some(1),
        };
        assert_eq!(indices.unique_families(), vec![0, 1]);
    }

    #[test]
    fn unique_families_keeps_distinct_indices() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(1),
            transfer_family: Some(2),
        };
        assert_eq!(indices.unique_families(), vec![0, 1, 2]);
    }

    #[test]
    fn incomplete_indices_are_rejected() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: None,
            transfer_family: Some(0),
        };
        assert!(!indices.is_complete());
    }
}
