//! Swapchain management.
//!
//! Handles VkSwapchainKHR creation, image acquisition, presentation, and
//! in-place recreation after a resize or surface invalidation.
//!
//! # Overview
//!
//! The [`Swapchain`] owns:
//! - the presentation handle and its chosen format/present mode
//! - one image view per presentable image (the images themselves belong
//!   to the presentation engine and are never freed individually)
//! - the shared depth attachment
//!
//! Surface support is re-queried on every (re)creation, so a recreation
//! always reflects the current surface capabilities.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{VulkanError, VulkanResult};
use crate::image::DepthImage;
use crate::instance::Instance;

/// Snapshot of what the surface supports for swapchain creation.
#[derive(Debug, Clone)]
pub struct SwapchainSupport {
    /// Surface capabilities (min/max image count, extents, transforms).
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// Queries swapchain support for a physical device and surface.
    ///
    /// Callable repeatedly; must be re-invoked after any surface-affecting
    /// event before recreating the swapchain.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> VulkanResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "uncapped".to_string()
            } else {
                capabilities.max_image_count.to_string()
            }
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// True when at least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Outcome of an image acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAcquire {
    /// An image was acquired. `suboptimal` marks a swapchain that still
    /// works but no longer matches the surface exactly.
    Acquired { index: u32, suboptimal: bool },
    /// The surface is out of date; the caller must recreate the swapchain
    /// and abandon the current frame.
    OutOfDate,
}

/// Outcome of a presentation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// The image was queued for display.
    Presented,
    /// The image was handed to the presentation engine, but the swapchain
    /// is out of date or suboptimal and should be recreated. Not an error.
    NeedsRecreate,
}

/// Vulkan swapchain wrapper.
///
/// Not thread-safe; driven from the single render thread only.
pub struct Swapchain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    depth: DepthImage,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Creates a new swapchain sized against the requested dimensions.
    ///
    /// Chooses the preferred surface format and present mode, clamps the
    /// extent to what the surface reports, and builds the per-image views
    /// plus the shared depth attachment.
    ///
    /// # Errors
    ///
    /// Returns an error if surface queries fail, support is inadequate,
    /// or any Vulkan object creation fails.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> VulkanResult<Self> {
        Self::create_internal(instance, device, surface, width, height, vk::SwapchainKHR::null())
    }

    fn create_internal(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        old_swapchain: vk::SwapchainKHR,
    ) -> VulkanResult<Self> {
        let loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let surface_loader =
            ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        // Requery support so the capability snapshot reflects the surface
        // as it is right now
        let support = SwapchainSupport::query(device.physical_device(), surface, &surface_loader)?;

        if !support.is_adequate() {
            return Err(VulkanError::Swapchain(
                "inadequate swapchain support (no formats or present modes)".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, width, height);
        let image_count = choose_image_count(&support.capabilities);

        info!(
            "Creating swapchain: {}x{}, format {:?}, present mode {:?}, {} images",
            extent.width, extent.height, surface_format.format, present_mode, image_count
        );

        // Concurrent sharing is only needed when graphics and present live
        // in different queue families
        let queue_families = device.queue_families();
        let graphics_family = queue_families.graphics_family.ok_or(VulkanError::NoSuitableGpu)?;
        let present_family = queue_families.present_family.ok_or(VulkanError::NoSuitableGpu)?;
        let family_indices = [graphics_family, present_family];

        let (sharing_mode, family_indices_slice) = if graphics_family != present_family {
            debug!(
                "CONCURRENT image sharing (graphics {} / present {})",
                graphics_family, present_family
            );
            (vk::SharingMode::CONCURRENT, family_indices.as_slice())
        } else {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(family_indices_slice)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let handle = unsafe { loader.create_swapchain(&create_info, None)? };

        let images = unsafe { loader.get_swapchain_images(handle)? };
        info!("Swapchain created with {} images", images.len());

        let views = create_image_views(&device, &images, surface_format.format)?;

        let depth = DepthImage::new(
            device.clone(),
            extent.width,
            extent.height,
            device.depth_format(),
        )?;

        Ok(Self {
            device,
            loader,
            handle,
            images,
            views,
            depth,
            format: surface_format,
            present_mode,
            extent,
        })
    }

    /// Recreates the swapchain in place for a new size or an invalidated
    /// surface.
    ///
    /// Tears down the depth attachment and image views (the color images
    /// are released implicitly when the old handle is destroyed), then
    /// re-runs creation with freshly queried surface support.
    ///
    /// # Safety contract
    ///
    /// The caller must have performed a full device idle-wait: recreation
    /// while GPU work still references the old images is undefined
    /// behavior and must never be attempted.
    pub fn recreate(
        &mut self,
        instance: &Instance,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> VulkanResult<()> {
        info!("Recreating swapchain at {}x{}", width, height);

        self.destroy_views();

        let old_handle = self.handle;
        let mut new = Self::create_internal(
            instance,
            self.device.clone(),
            surface,
            width,
            height,
            old_handle,
        )?;

        unsafe {
            self.loader.destroy_swapchain(old_handle, None);
        }

        self.handle = new.handle;
        self.images = std::mem::take(&mut new.images);
        self.views = std::mem::take(&mut new.views);
        std::mem::swap(&mut self.depth, &mut new.depth);
        self.format = new.format;
        self.present_mode = new.present_mode;
        self.extent = new.extent;

        // Null out the donor's handle so its Drop frees only the old depth
        // attachment
        new.handle = vk::SwapchainKHR::null();

        Ok(())
    }

    /// Acquires the next presentable image, signaling `semaphore` when it
    /// becomes available.
    ///
    /// An out-of-date surface is reported as [`ImageAcquire::OutOfDate`]
    /// rather than an error; a suboptimal acquire still counts as
    /// acquired. Any other failure is fatal for the frame.
    pub fn acquire_next_image(
        &self,
        timeout: u64,
        semaphore: vk::Semaphore,
    ) -> VulkanResult<ImageAcquire> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.handle, timeout, semaphore, vk::Fence::null())
        };

        match result {
            Ok((index, suboptimal)) => Ok(ImageAcquire::Acquired { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date during acquire");
                Ok(ImageAcquire::OutOfDate)
            }
            Err(e) => Err(VulkanError::Vulkan(e)),
        }
    }

    /// Presents a rendered image, waiting on `wait_semaphore` first.
    ///
    /// Out-of-date and suboptimal results are mapped to
    /// [`PresentOutcome::NeedsRecreate`]; the frame itself is still
    /// considered presented.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> VulkanResult<PresentOutcome> {
        let swapchains = [self.handle];
        let image_indices = [image_index];
        let wait_semaphores = [wait_semaphore];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.loader.queue_present(queue, &present_info) };

        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => {
                debug!("Swapchain suboptimal during present");
                Ok(PresentOutcome::NeedsRecreate)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date during present");
                Ok(PresentOutcome::NeedsRecreate)
            }
            Err(e) => Err(VulkanError::Vulkan(e)),
        }
    }

    /// The swapchain handle.
    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    /// The chosen surface format.
    #[inline]
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// The chosen present mode.
    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// The current extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// The number of presentable images.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// The image view for the image at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn view(&self, index: usize) -> vk::ImageView {
        self.views[index]
    }

    /// All image views, in image order.
    #[inline]
    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }

    /// The shared depth attachment.
    #[inline]
    pub fn depth(&self) -> &DepthImage {
        &self.depth
    }

    fn destroy_views(&mut self) {
        for &view in &self.views {
            unsafe {
                self.device.handle().destroy_image_view(view, None);
            }
        }
        self.views.clear();
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_views();

        // Images are owned by the presentation engine; destroying the
        // handle releases them. Skip a nulled handle (donor after
        // recreation).
        if self.handle != vk::SwapchainKHR::null() {
            unsafe {
                self.loader.destroy_swapchain(self.handle, None);
            }
            info!(
                "Swapchain destroyed (was {}x{}, {} images)",
                self.extent.width,
                self.extent.height,
                self.images.len()
            );
        }
    }
}

/// Chooses the surface format, preferring `B8G8R8A8_UNORM` with the
/// sRGB-nonlinear color space; falls back to the first supported format.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_UNORM
            && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    match preferred {
        Some(&format) => format,
        None => {
            warn!(
                "Preferred surface format unavailable, using {:?}",
                formats[0].format
            );
            formats[0]
        }
    }
}

/// Chooses the present mode, preferring MAILBOX (replace-latest, low
/// latency, no tearing). FIFO is the mandatory fallback.
fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        debug!("Selected MAILBOX present mode");
        return vk::PresentModeKHR::MAILBOX;
    }

    // Guaranteed by the Vulkan spec
    debug!("Selected FIFO present mode (vsync)");
    vk::PresentModeKHR::FIFO
}

/// Resolves the swapchain extent.
///
/// When the surface reports an authoritative current extent it takes
/// precedence; otherwise the requested size is clamped to the reported
/// min/max.
fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    width: u32,
    height: u32,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Resolves the image count: one more than the minimum, clamped to the
/// maximum when the device declares one (0 means uncapped).
fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;

    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

/// Creates one color view per swapchain image.
fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> VulkanResult<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());

    for &image in images {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let view = unsafe { device.handle().create_image_view(&create_info, None)? };
        views.push(view);
    }

    debug!("Created {} swapchain image views", views.len());
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_format_prefers_bgra_unorm_srgb_nonlinear() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(selected.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn surface_format_falls_back_to_first_supported() {
        let formats = vec![vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::R8G8B8A8_SRGB);
    }

    #[test]
    fn present_mode_prefers_mailbox() {
        let modes = vec![
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let modes = vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn extent_uses_authoritative_current_extent() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };

        let extent = choose_extent(&capabilities, 800, 600);
        assert_eq!(extent.width, 1920);
        assert_eq!(extent.height, 1080);
    }

    #[test]
    fn extent_clamps_requested_size_to_limits() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 2000,
                height: 2000,
            },
            ..Default::default()
        };

        let too_big = choose_extent(&capabilities, 3000, 3000);
        assert_eq!((too_big.width, too_big.height), (2000, 2000));

        let too_small = choose_extent(&capabilities, 50, 50);
        assert_eq!((too_small.width, too_small.height), (100, 100));

        let in_range = choose_extent(&capabilities, 800, 600);
        assert_eq!((in_range.width, in_range.height), (800, 600));
    }

    #[test]
    fn image_count_is_min_plus_one_when_uncapped() {
        // max_image_count == 0 means no cap, so min+1 stands
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 1,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capabilities), 2);
    }

    #[test]
    fn image_count_is_clamped_by_device_cap() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 2,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capabilities), 2);
    }

    #[test]
    fn image_count_typical_triple_buffer() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capabilities), 3);
    }

    #[test]
    fn support_adequacy_requires_formats_and_modes() {
        let adequate = SwapchainSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(adequate.is_adequate());

        let no_formats = SwapchainSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(!no_formats.is_adequate());
    }

    #[test]
    fn selection_is_deterministic_for_identical_support() {
        // create-then-recreate with unchanged support must pick identical
        // format, present mode, and image count
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let modes = vec![vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            current_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            ..Default::default()
        };

        let first = (
            choose_surface_format(&formats),
            choose_present_mode(&modes),
            choose_extent(&capabilities, 1280, 720),
            choose_image_count(&capabilities),
        );
        let second = (
            choose_surface_format(&formats),
            choose_present_mode(&modes),
            choose_extent(&capabilities, 1280, 720),
            choose_image_count(&capabilities),
        );

        assert_eq!(first.0.format, second.0.format);
        assert_eq!(first.1, second.1);
        assert_eq!(first.2.width, second.2.width);
        assert_eq!(first.3, second.3);
    }
}
