//! Backend-agnostic rendering frontend.
//!
//! This crate defines the boundary between the application loop and a
//! concrete GPU backend:
//! - [`RendererBackend`] — the trait a backend implements
//! - [`Renderer`] — the frontend driving the per-frame begin/end protocol
//! - [`NullBackend`] — a no-op backend for tests and headless runs

mod backend;
mod error;
mod frontend;
mod null;

pub use backend::RendererBackend;
pub use error::{RenderError, RenderResult};
pub use frontend::{RenderPacket, Renderer};
pub use null::NullBackend;
