//! Error types for the render crate.

use thiserror::Error;

/// Errors that can occur during compositing operations.
///
/// Degenerate geometry (empty clips, disjoint regions) is never an error; these
/// variants report contract violations by callers. The operation that fails
/// leaves its object unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// `restore` was called on a painter holding only its base state.
    #[error("painter state stack underflow")]
    PainterStackUnderflow,

    /// `leave` was called without a matching successful `enter`.
    #[error("renderer region stack underflow")]
    RegionUnderflow,

    /// `begin_resize` was called while a resize was already in progress.
    #[error("buffer resize already in progress")]
    ResizeInProgress,

    /// `end_resize` was called without a matching `begin_resize`.
    #[error("no buffer resize in progress")]
    NoResizeInProgress,

    /// The buffer cannot be resized while painters are open on it.
    #[error("buffer has {count} open painter(s)")]
    PaintersOpen { count: usize },

    /// The buffer handle does not refer to a live buffer.
    #[error("invalid or destroyed buffer")]
    InvalidBuffer,

    /// The painter handle does not refer to a live painter.
    #[error("invalid or destroyed painter")]
    InvalidPainter,

    /// Failed to export surface contents.
    #[error("capture failed: {0}")]
    Capture(String),
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;
