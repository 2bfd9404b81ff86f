//! Depth attachment image management.
//!
//! The swapchain owns exactly one depth attachment: an image, its memory
//! allocation, and an image view. Unlike the color images (owned by the
//! presentation engine), the depth attachment is created and freed here.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use tracing::debug;

use crate::device::Device;
use crate::error::{VulkanError, VulkanResult};

/// GPU-only depth attachment: image + memory + view.
pub struct DepthImage {
    device: Arc<Device>,
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<Allocation>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl DepthImage {
    /// Creates a depth attachment with the given dimensions and format.
    ///
    /// # Errors
    ///
    /// Returns an error if image creation, memory allocation, or view
    /// creation fails. Zero dimensions are rejected.
    pub fn new(
        device: Arc<Device>,
        width: u32,
        height: u32,
        format: vk::Format,
    ) -> VulkanResult<Self> {
        if width == 0 || height == 0 {
            return Err(VulkanError::Swapchain(
                "depth attachment dimensions must be nonzero".to_string(),
            ));
        }

        let extent = vk::Extent2D { width, height };

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { device.handle().create_image(&image_info, None)? };

        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = {
            let mut guard = device.allocator().lock().unwrap();
            let allocator = guard
                .as_mut()
                .expect("allocator torn down while device still in use");
            allocator.allocate(&AllocationCreateDesc {
                name: "depth_attachment",
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };

        unsafe {
            device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())?;
        }

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::DEPTH)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let view = unsafe { device.handle().create_image_view(&view_info, None)? };

        debug!("Created depth attachment: {}x{} ({:?})", width, height, format);

        Ok(Self {
            device,
            image,
            view,
            allocation: Some(allocation),
            format,
            extent,
        })
    }

    /// The Vulkan image handle.
    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// The Vulkan image view handle.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// The depth format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// The attachment extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for DepthImage {
    fn drop(&mut self) {
        // View, then image, then the allocation behind them
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            let mut guard = self.device.allocator().lock().unwrap();
            if let Some(allocator) = guard.as_mut() {
                if let Err(e) = allocator.free(allocation) {
                    tracing::error!("Failed to free depth attachment memory: {:?}", e);
                }
            }
        }

        debug!(
            "Destroyed depth attachment: {}x{}",
            self.extent.width, self.extent.height
        );
    }
}
