//! Error types for the compositor crate.

use horizon_compositor_core::CoreError;
use horizon_compositor_render::RenderError;
use thiserror::Error;

use crate::viewport::ViewportId;

/// Errors raised while managing viewports and video outputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositorError {
    /// A buffer, painter or renderer was misused.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// The event-loop core rejected an operation.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// No viewport with this id is attached.
    #[error("unknown viewport {0:?}")]
    UnknownViewport(ViewportId),

    /// The video driver cannot switch to this resolution.
    #[error("unsupported resolution: {width}x{height}")]
    UnsupportedResolution { width: i32, height: i32 },
}

/// Result type for compositor operations.
pub type CompositorResult<T> = Result<T, CompositorError>;

#[cfg(test)]
mod tests {
    use horizon_compositor_core::{TimerError, TimerManager};
    use std::time::Duration;

    use super::*;

    fn stop_twice(timers: &mut TimerManager) -> CompositorResult<()> {
        let timer = timers.start_one_shot(Duration::from_millis(5));
        timers.stop(timer)?;
        timers.stop(timer)?;
        Ok(())
    }

    #[test]
    fn test_timer_errors_propagate() {
        let mut timers = TimerManager::new();
        assert_eq!(
            stop_twice(&mut timers),
            Err(CompositorError::Core(TimerError::InvalidTimerId.into()))
        );
        assert_eq!(
            CompositorError::Core(TimerError::InvalidTimerId.into()).to_string(),
            "core error: Timer error: Invalid or expired timer ID"
        );
    }
}
