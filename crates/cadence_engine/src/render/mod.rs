//! Rendering boundary
//!
//! The game loop only knows the [`RenderBackend`] trait: `init` once at
//! engine start, `load` awaited before the first frame, and `render` once per
//! render pass after every render system has run. Drawing itself is left to
//! the backend.

use std::future::Future;
use std::pin::Pin;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, RenderError>;

/// Future returned by [`RenderBackend::load`]
pub type LoadFuture<'a> = Pin<Box<dyn Future<Output = BackendResult<()>> + 'a>>;

/// Rendering errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Renderer initialization failed during setup
    ///
    /// Occurs when the drawing surface cannot be prepared.
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// Loading resources failed before the first frame
    #[error("Resource loading failed: {0}")]
    LoadFailed(String),

    /// A rendering operation failed during execution
    #[error("Rendering failed: {0}")]
    RenderingFailed(String),
}

/// Rendering backend driven by the game loop
pub trait RenderBackend {
    /// Prepare the drawing surface
    fn init(&mut self) -> BackendResult<()>;

    /// Load the resources needed before the first frame
    fn load(&mut self) -> LoadFuture<'_> {
        Box::pin(std::future::ready(Ok(())))
    }

    /// Draw the current frame
    fn render(&mut self, delta_time: f64) -> BackendResult<()>;
}

/// Headless backend that only counts frames
#[derive(Debug, Default, Clone)]
pub struct NullRenderer {
    initialized: bool,
    frames: u64,
    last_delta: Option<f64>,
}

impl NullRenderer {
    /// Create a headless backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `init` has been called
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of rendered frames
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Delta time of the last rendered frame
    pub fn last_delta(&self) -> Option<f64> {
        self.last_delta
    }
}

impl RenderBackend for NullRenderer {
    fn init(&mut self) -> BackendResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn render(&mut self, delta_time: f64) -> BackendResult<()> {
        if !self.initialized {
            return Err(RenderError::RenderingFailed("renderer not initialized".to_string()));
        }
        self.frames += 1;
        self.last_delta = Some(delta_time);
        Ok(())
    }
}
