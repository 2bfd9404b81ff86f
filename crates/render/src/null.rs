//! No-op renderer backend.

use tracing::debug;

use crate::backend::RendererBackend;
use crate::error::{RenderError, RenderResult};

/// A backend that performs no GPU work.
///
/// Implements the same frame protocol as a real backend — including
/// declining frames while the window is minimized — so the frontend and
/// application loop can be exercised headlessly.
pub struct NullBackend {
    width: u32,
    height: u32,
    frame_open: bool,
    frames_begun: u64,
    frames_ended: u64,
}

impl NullBackend {
    /// Create a null backend for a window of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_open: false,
            frames_begun: 0,
            frames_ended: 0,
        }
    }

    /// Frames for which `begin_frame` returned `Ok(true)`.
    #[inline]
    pub fn frames_begun(&self) -> u64 {
        self.frames_begun
    }

    /// Frames completed through `end_frame`.
    #[inline]
    pub fn frames_ended(&self) -> u64 {
        self.frames_ended
    }
}

impl RendererBackend for NullBackend {
    fn begin_frame(&mut self, _delta_time: f32) -> RenderResult<bool> {
        if self.width == 0 || self.height == 0 {
            debug!("null backend: window minimized, declining frame");
            return Ok(false);
        }

        self.frame_open = true;
        self.frames_begun += 1;
        Ok(true)
    }

    fn end_frame(&mut self, _delta_time: f32) -> RenderResult<()> {
        if !self.frame_open {
            return Err(RenderError::Backend(
                "end_frame called without an open frame".into(),
            ));
        }

        self.frame_open = false;
        self.frames_ended += 1;
        Ok(())
    }

    fn on_resized(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_end_counts_stay_in_step() {
        let mut backend = NullBackend::new(640, 480);
        for _ in 0..3 {
            assert!(backend.begin_frame(0.016).unwrap());
            backend.end_frame(0.016).unwrap();
        }
        assert_eq!(backend.frames_begun(), 3);
        assert_eq!(backend.frames_ended(), 3);
    }

    #[test]
    fn minimized_window_declines_frames() {
        let mut backend = NullBackend::new(640, 480);
        backend.on_resized(0, 120);
        assert!(!backend.begin_frame(0.016).unwrap());
        assert_eq!(backend.frames_begun(), 0);
    }

    #[test]
    fn end_without_begin_is_an_error() {
        let mut backend = NullBackend::new(640, 480);
        assert!(backend.end_frame(0.016).is_err());
    }
}
