//! Logging facilities for Horizon Compositor.
//!
//! Horizon Compositor uses the `tracing` crate for instrumentation. To see logs,
//! install a subscriber in the hosting application:
//!
//! ```ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! Every event emitted by the compositing crates carries one of the
//! [`targets`] below so subsystems can be filtered independently, e.g.
//! `RUST_LOG=horizon_compositor::viewport=trace`.

/// Target names for log filtering.
pub mod targets {
    /// Core framework target.
    pub const CORE: &str = "horizon_compositor_core";
    /// Timer system target.
    pub const TIMER: &str = "horizon_compositor_core::timer";
    /// Damage accumulation and coalescing.
    pub const DAMAGE: &str = "horizon_compositor_render::damage";
    /// Pixel buffers and their painter registry.
    pub const BUFFER: &str = "horizon_compositor_render::buffer";
    /// Painter state stack and clipping.
    pub const PAINTER: &str = "horizon_compositor_render::painter";
    /// Renderer region stack and draw dispatch.
    pub const RENDERER: &str = "horizon_compositor_render::renderer";
    /// Viewport redraw passes.
    pub const VIEWPORT: &str = "horizon_compositor::viewport";
    /// Screen-level viewport management.
    pub const SCREEN: &str = "horizon_compositor::screen";
    /// Video driver boundary.
    pub const VIDEO: &str = "horizon_compositor::video";
}

/// Span names used for tracing.
pub mod span_names {
    /// A full viewport redraw pass.
    pub const REDRAW: &str = "horizon_compositor::redraw";
    /// Timer processing span.
    pub const TIMER: &str = "horizon_compositor::timer";
}

/// A guard that measures an operation for profiling.
///
/// The span stays entered until the guard is dropped.
///
/// ```
/// use horizon_compositor_core::PerfSpan;
///
/// {
///     let _span = PerfSpan::new("redraw");
///     // ... work ...
/// }
/// ```
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "horizon_compositor::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perf_span_with_subscriber() {
        let subscriber = tracing_subscriber::fmt().with_test_writer().finish();
        tracing::subscriber::with_default(subscriber, || {
            let _span = PerfSpan::new("test_operation");
            tracing::debug!(target: targets::VIEWPORT, "inside span");
        });
    }

    #[test]
    fn test_targets_are_namespaced() {
        for target in [targets::DAMAGE, targets::BUFFER, targets::PAINTER, targets::RENDERER] {
            assert!(target.starts_with("horizon_compositor_render::"));
        }
        assert!(targets::VIEWPORT.starts_with("horizon_compositor::"));
    }
}
