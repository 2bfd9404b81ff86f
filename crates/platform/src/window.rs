//! Window management using winit.
//!
//! Provides window creation and Vulkan surface creation. The renderer
//! consumes two things from this layer: an opaque [`Surface`] and the
//! current framebuffer size.

use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use prism_core::{Error, Result};

/// RAII wrapper for a Vulkan presentation surface.
///
/// Owns a `vk::SurfaceKHR` handle and destroys it on drop. The surface
/// loader is stored internally for cleanup and capability queries.
/// The Vulkan instance must outlive this surface.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    /// The raw Vulkan surface handle.
    ///
    /// Valid only as long as this `Surface` exists; do not store it beyond
    /// the surface's lifetime.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// The surface extension loader, for capability/format/present-mode
    /// queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: the handle was created by ash_window::create_surface and
        // the loader comes from the same instance. This is the only place
        // the surface is destroyed.
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}

/// A window wrapper exposing the underlying winit window and the raw
/// handles Vulkan surface creation needs.
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
}

impl Window {
    /// Create a new resizable window with the given dimensions and title.
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let attrs = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(true);

        let window = event_loop
            .create_window(attrs)
            .map_err(|e| Error::Window(e.to_string()))?;

        tracing::info!("Window created: {}x{}", width, height);

        Ok(Self {
            window: Arc::new(window),
            width,
            height,
        })
    }

    /// Reference to the underlying winit window.
    pub fn inner(&self) -> &WinitWindow {
        &self.window
    }

    /// Current cached width of the window.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Current cached height of the window.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// The current drawable framebuffer size in pixels.
    ///
    /// This is what the swapchain should be sized against; during a live
    /// resize it can differ from the cached dimensions.
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    /// Update the cached dimensions (call when handling resize events).
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        tracing::debug!("Window resized: {}x{}", width, height);
    }

    /// Request a redraw of the window.
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Create a Vulkan surface for this window.
    ///
    /// Returns a RAII [`Surface`] that destroys the underlying
    /// `vk::SurfaceKHR` when dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the window/display handles cannot be obtained
    /// or Vulkan surface creation fails.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let display_handle = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;

        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {}", e)))?;

        // SAFETY: entry and instance are valid, and the handles come from a
        // live winit window. Destruction happens in Surface::drop.
        let handle = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| Error::Renderer(format!("Failed to create Vulkan surface: {}", e)))?
        };

        let loader = ash::khr::surface::Instance::new(entry, instance);

        tracing::info!("Vulkan surface created");

        Ok(Surface { handle, loader })
    }
}
