//! Platform abstraction layer for the prism engine.
//!
//! This crate provides platform-specific functionality:
//! - Window management via winit
//! - Vulkan surface creation from raw window handles
//! - Input handling (keyboard, mouse)

mod input;
mod window;

pub use input::{InputState, KeyCode, MouseButton};
pub use window::{Surface, Window};

// Re-export winit types that callers need for the event loop
pub use winit::event::WindowEvent;
pub use winit::event_loop::EventLoop;
