//! Compositor configuration.

use std::time::Duration;

/// Tunables for viewports and their redraw scheduling.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use horizon_compositor::CompositorConfig;
///
/// let config = CompositorConfig::default()
///     .with_coalesce_delay(Duration::from_millis(5))
///     .with_fallback_size(1024, 768);
/// assert_eq!(config.fallback_width, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositorConfig {
    /// How long damage accumulates before a viewport redraws.
    pub coalesce_delay: Duration,
    /// Viewport width used when a driver reports no usable width.
    pub fallback_width: i32,
    /// Viewport height used when a driver reports no usable height.
    pub fallback_height: i32,
}

impl CompositorConfig {
    /// Default delay between the first invalidation and the redraw.
    pub const DEFAULT_COALESCE_DELAY: Duration = Duration::from_millis(20);

    /// Set the damage coalescing delay.
    pub fn with_coalesce_delay(mut self, delay: Duration) -> Self {
        self.coalesce_delay = delay;
        self
    }

    /// Set the size used for drivers that report no dimensions.
    pub fn with_fallback_size(mut self, width: i32, height: i32) -> Self {
        self.fallback_width = width;
        self.fallback_height = height;
        self
    }
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            coalesce_delay: Self::DEFAULT_COALESCE_DELAY,
            fallback_width: 800,
            fallback_height: 600,
        }
    }
}
