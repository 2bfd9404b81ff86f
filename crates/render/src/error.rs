//! Frontend-facing error types.

use thiserror::Error;

/// Errors surfaced by a renderer backend to the frontend.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Backend initialization failed (no device, no surface, missing
    /// capability). Fatal to startup, never retried.
    #[error("Backend initialization error: {0}")]
    Initialization(String),

    /// A GPU-call failure outside the expected swapchain-invalidation
    /// codes. Fatal for the application.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type alias for frontend operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
