//! Renderer frontend.
//!
//! Owns the active backend and drives the per-frame begin/end protocol on
//! behalf of the application loop.

use tracing::error;

use crate::backend::RendererBackend;

/// Per-frame data handed from the application loop to the renderer.
#[derive(Debug, Clone, Copy)]
pub struct RenderPacket {
    /// Seconds elapsed since the previous frame.
    pub delta_time: f32,
}

/// The rendering frontend.
///
/// Holds the selected [`RendererBackend`] and a monotonically increasing
/// frame counter. All state lives in this object — there is no global
/// renderer context; the application owns the `Renderer` and passes it
/// wherever rendering is driven from.
pub struct Renderer {
    backend: Box<dyn RendererBackend>,
    frame_number: u64,
}

impl Renderer {
    /// Create a frontend around an already-initialized backend.
    pub fn new(backend: Box<dyn RendererBackend>) -> Self {
        Self {
            backend,
            frame_number: 0,
        }
    }

    /// Draw one frame.
    ///
    /// Returns `false` only on unrecoverable failure. Frames declined by
    /// the backend (mid-resize, minimized window, swapchain recreation)
    /// are skipped and still return `true`.
    pub fn draw_frame(&mut self, packet: &RenderPacket) -> bool {
        match self.backend.begin_frame(packet.delta_time) {
            Ok(true) => {
                // Mid-frame draw commands are recorded here once the
                // engine grows passes beyond the bootstrap clear.
                match self.backend.end_frame(packet.delta_time) {
                    Ok(()) => {
                        self.frame_number += 1;
                        true
                    }
                    Err(e) => {
                        error!("end_frame failed: {e}");
                        false
                    }
                }
            }
            Ok(false) => true,
            Err(e) => {
                error!("begin_frame failed: {e}");
                false
            }
        }
    }

    /// Forward a resize notification to the backend.
    pub fn on_resized(&mut self, width: u32, height: u32) {
        self.backend.on_resized(width, height);
    }

    /// Number of frames completed so far.
    #[inline]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RenderError, RenderResult};
    use crate::null::NullBackend;

    struct FailingBackend {
        fail_begin: bool,
    }

    impl RendererBackend for FailingBackend {
        fn begin_frame(&mut self, _delta_time: f32) -> RenderResult<bool> {
            if self.fail_begin {
                Err(RenderError::Backend("device lost".into()))
            } else {
                Ok(true)
            }
        }

        fn end_frame(&mut self, _delta_time: f32) -> RenderResult<()> {
            Err(RenderError::Backend("submit failed".into()))
        }

        fn on_resized(&mut self, _width: u32, _height: u32) {}
    }

    #[test]
    fn frame_number_advances_on_completed_frames() {
        let mut renderer = Renderer::new(Box::new(NullBackend::new(800, 600)));
        let packet = RenderPacket { delta_time: 0.016 };

        assert!(renderer.draw_frame(&packet));
        assert!(renderer.draw_frame(&packet));
        assert_eq!(renderer.frame_number(), 2);
    }

    #[test]
    fn declined_frames_are_skipped_not_failed() {
        let mut renderer = Renderer::new(Box::new(NullBackend::new(800, 600)));
        let packet = RenderPacket { delta_time: 0.016 };

        // A minimized window declines every frame
        renderer.on_resized(0, 0);
        assert!(renderer.draw_frame(&packet));
        assert_eq!(renderer.frame_number(), 0);

        // Restoring the window resumes rendering
        renderer.on_resized(800, 600);
        assert!(renderer.draw_frame(&packet));
        assert_eq!(renderer.frame_number(), 1);
    }

    #[test]
    fn begin_failure_is_unrecoverable() {
        let mut renderer = Renderer::new(Box::new(FailingBackend { fail_begin: true }));
        assert!(!renderer.draw_frame(&RenderPacket { delta_time: 0.016 }));
        assert_eq!(renderer.frame_number(), 0);
    }

    #[test]
    fn end_failure_is_unrecoverable() {
        let mut renderer = Renderer::new(Box::new(FailingBackend { fail_begin: false }));
        assert!(!renderer.draw_frame(&RenderPacket { delta_time: 0.016 }));
        assert_eq!(renderer.frame_number(), 0);
    }
}
