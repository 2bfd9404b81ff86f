//! Application-level error types.

use thiserror::Error;

/// Top-level engine error.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// Renderer initialization or frame errors
    #[error("Renderer error: {0}")]
    Renderer(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using the engine's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;
