//! Error types for the renderer core.

use thiserror::Error;

/// Errors raised by scene indexing, the task scheduler and the render engine.
///
/// A ray being absorbed and a render being cancelled are normal outcomes and
/// never show up here.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Cannot build a BVH over zero primitives")]
    EmptyBvh,

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid render settings: {0}")]
    InvalidSettings(String),

    #[error("Work unit panicked: {0}")]
    TaskPanicked(String),

    #[error("Work unit was dropped before it ran (scheduler shut down)")]
    TaskAbandoned,

    #[error("A render is in flight")]
    Busy,

    #[error("Failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl RenderError {
    /// True for the configuration class of errors (bad settings, empty BVH).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::EmptyBvh | Self::InvalidDimensions { .. } | Self::InvalidSettings(_)
        )
    }
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;
