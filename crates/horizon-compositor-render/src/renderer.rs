//! The renderer: a region stack plus compositing primitives over a backend.
//!
//! A [`Renderer`] lives for one redraw pass. The widget tree walks it with
//! [`enter`](Renderer::enter)/[`leave`](Renderer::leave), each region adding a
//! translation and narrowing the clip, and issues buffer blits and solid fills
//! in between. The renderer performs all translation and clipping itself and
//! hands a [`RenderBackend`] only the visible part of each operation, so
//! backends for different output technologies stay small.
//!
//! # Pass Lifecycle
//!
//! ```ignore
//! let mut renderer = driver.renderer(damage)?;   // Active
//! if renderer.enter(widget_rect, widget_x, widget_y) {
//!     renderer.render_buffer(buffer, 0, 0);
//!     renderer.leave()?;
//! }
//! let stats = renderer.complete();               // Completed
//! drop(renderer);                                // Destroyed
//! ```
//!
//! Dropping a renderer without calling [`complete`](Renderer::complete) leaves
//! the backend's output in an undefined state.

use std::collections::HashMap;
use std::sync::Arc;

use horizon_compositor_core::logging::targets;
use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::buffer::Buffer;
use crate::color::Color;
use crate::error::{RenderError, RenderResult};
use crate::rect::Rect;
use crate::surface::Surface;

/// An output technology a [`Renderer`] can drive.
///
/// All coordinates are device pixels, already translated and clipped.
pub trait RenderBackend {
    /// Alpha-composite `visible` (relative to the source's top-left) of
    /// `source` over the output, with the source's top-left at `(x, y)`.
    fn render_buffer(&mut self, source: &Arc<Mutex<Surface>>, x: i32, y: i32, visible: Rect);

    /// Like [`render_buffer`](Self::render_buffer) but replacing the output
    /// pixels instead of blending.
    fn copy_buffer(&mut self, source: &Arc<Mutex<Surface>>, x: i32, y: i32, visible: Rect);

    /// Fill `rect` with a solid colour.
    fn draw_filled_rectangle(&mut self, color: Color, rect: Rect);

    /// Flush buffered output.
    fn complete(&mut self) {}
}

/// One nested region: a clip in device space and the cumulative translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRegion {
    pub clip: Rect,
    pub translate_x: i32,
    pub translate_y: i32,
}

/// Counters for one redraw pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Buffer blits dispatched to the backend.
    pub blits: u32,
    /// Solid fills dispatched to the backend.
    pub fills: u32,
    /// Operations culled because nothing was visible.
    pub skipped: u32,
}

impl RenderStats {
    /// Add another pass's counters to these.
    pub fn accumulate(&mut self, other: &RenderStats) {
        self.blits += other.blits;
        self.fills += other.fills;
        self.skipped += other.skipped;
    }
}

/// Where a renderer is in its pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    /// Accepting regions and draw calls.
    Active,
    /// The backend has been flushed; further draws are rejected.
    Completed,
}

#[derive(Debug, Clone, Copy)]
enum BlitMode {
    Over,
    Copy,
}

/// A renderer for one redraw pass.
pub struct Renderer {
    regions: Vec<RenderRegion>,
    /// Regions established by whoever created the renderer; `leave` never pops them.
    baseline: usize,
    options: HashMap<String, String>,
    backend: Box<dyn RenderBackend>,
    phase: RenderPhase,
    stats: RenderStats,
}

impl Renderer {
    /// Create a renderer with an empty region stack.
    pub fn new(backend: Box<dyn RenderBackend>) -> Self {
        Self {
            regions: Vec::new(),
            baseline: 0,
            options: HashMap::new(),
            backend,
            phase: RenderPhase::Active,
            stats: RenderStats::default(),
        }
    }

    /// Create a renderer whose baseline region clips to `rect` with translation `(dx, dy)`.
    ///
    /// The baseline region cannot be left.
    pub fn scoped(backend: Box<dyn RenderBackend>, rect: Rect, dx: i32, dy: i32) -> Self {
        let mut renderer = Self::new(backend);
        renderer.enter(rect, dx, dy);
        renderer.baseline = renderer.regions.len();
        renderer
    }

    /// Enter a nested region.
    ///
    /// `rect` is translated by the current cumulative translation and
    /// intersected with the current clip; the new translation is the current
    /// one plus `(dx, dy)`. Returns `false`, pushing nothing, when the new clip
    /// would be empty. The caller must only [`leave`](Self::leave) after a
    /// successful enter. The first region takes `rect` as-is.
    pub fn enter(&mut self, rect: Rect, dx: i32, dy: i32) -> bool {
        let region = match self.regions.last() {
            None => RenderRegion {
                clip: rect,
                translate_x: dx,
                translate_y: dy,
            },
            Some(prev) => {
                let clip = rect
                    .translated(prev.translate_x, prev.translate_y)
                    .intersection(&prev.clip);
                if clip.is_empty() {
                    trace!(target: targets::RENDERER, ?rect, "region fully clipped");
                    return false;
                }
                RenderRegion {
                    clip,
                    translate_x: prev.translate_x.saturating_add(dx),
                    translate_y: prev.translate_y.saturating_add(dy),
                }
            }
        };
        self.regions.push(region);
        true
    }

    /// Leave the innermost region entered by the caller.
    pub fn leave(&mut self) -> RenderResult<()> {
        if self.regions.len() <= self.baseline {
            error!(target: targets::RENDERER, depth = self.regions.len(), "unmatched renderer leave");
            return Err(RenderError::RegionUnderflow);
        }
        self.regions.pop();
        Ok(())
    }

    /// Number of regions on the stack, including the baseline.
    #[inline]
    pub fn depth(&self) -> usize {
        self.regions.len()
    }

    /// The innermost region.
    #[inline]
    pub fn current_region(&self) -> Option<RenderRegion> {
        self.regions.last().copied()
    }

    /// The current pass phase.
    #[inline]
    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    /// Counters so far.
    #[inline]
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Alpha-composite a buffer with its top-left at `(x, y)` in the current region.
    pub fn render_buffer(&mut self, buffer: &Buffer, x: i32, y: i32) {
        self.blit(buffer, x, y, BlitMode::Over);
    }

    /// Copy a buffer, replacing what is underneath, with its top-left at `(x, y)`.
    pub fn copy_buffer(&mut self, buffer: &Buffer, x: i32, y: i32) {
        self.blit(buffer, x, y, BlitMode::Copy);
    }

    fn blit(&mut self, buffer: &Buffer, x: i32, y: i32, mode: BlitMode) {
        if !self.accepting_draws() {
            return;
        }
        let (width, height) = buffer.size();
        let Some(footprint) = self.visible(Rect::new(x, y, width, height)) else {
            return;
        };
        let (full, visible) = footprint;
        let relative = Rect::new(
            visible.x.saturating_sub(full.x),
            visible.y.saturating_sub(full.y),
            visible.width,
            visible.height,
        );

        self.stats.blits += 1;
        match mode {
            BlitMode::Over => self
                .backend
                .render_buffer(buffer.surface(), full.x, full.y, relative),
            BlitMode::Copy => self
                .backend
                .copy_buffer(buffer.surface(), full.x, full.y, relative),
        }
    }

    /// Fill a rectangle in the current region with a solid colour.
    ///
    /// With no region entered the rectangle is used untranslated and unclipped.
    pub fn draw_filled_rectangle(&mut self, color: Color, x: i32, y: i32, width: i32, height: i32) {
        if !self.accepting_draws() {
            return;
        }
        let Some((_, visible)) = self.visible(Rect::new(x, y, width, height)) else {
            return;
        };
        self.stats.fills += 1;
        self.backend.draw_filled_rectangle(color, visible);
    }

    /// Translate `rect` into device space and clip it. Returns the full
    /// translated rectangle and its visible part, or `None` if nothing shows.
    fn visible(&mut self, rect: Rect) -> Option<(Rect, Rect)> {
        let (full, visible) = match self.regions.last() {
            None => (rect, rect),
            Some(region) => {
                let full = rect.translated(region.translate_x, region.translate_y);
                (full, full.intersection(&region.clip))
            }
        };
        if visible.is_empty() {
            self.stats.skipped += 1;
            return None;
        }
        Some((full, visible))
    }

    fn accepting_draws(&self) -> bool {
        if self.phase == RenderPhase::Completed {
            error!(target: targets::RENDERER, "draw issued on a completed renderer");
            return false;
        }
        true
    }

    /// Set a backend-specific option, or remove it with `None`.
    pub fn set_option(&mut self, key: &str, value: Option<&str>) {
        match value {
            Some(value) => {
                self.options.insert(key.to_owned(), value.to_owned());
            }
            None => {
                self.options.remove(key);
            }
        }
    }

    /// Look up an option.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Flush the backend and finish the pass.
    ///
    /// Calling this again has no further effect.
    pub fn complete(&mut self) -> RenderStats {
        if self.phase == RenderPhase::Completed {
            warn!(target: targets::RENDERER, "renderer completed twice");
            return self.stats;
        }
        if self.regions.len() != self.baseline {
            warn!(
                target: targets::RENDERER,
                open = self.regions.len() - self.baseline.min(self.regions.len()),
                "renderer completed with regions still entered"
            );
        }
        self.backend.complete();
        self.phase = RenderPhase::Completed;
        debug!(target: targets::RENDERER, stats = ?self.stats, "render pass complete");
        self.stats
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if self.phase != RenderPhase::Completed {
            warn!(target: targets::RENDERER, "renderer destroyed without complete; output undefined");
        }
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("regions", &self.regions)
            .field("baseline", &self.baseline)
            .field("options", &self.options)
            .field("phase", &self.phase)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::PixelFormat;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Render { x: i32, y: i32, visible: Rect },
        Copy { x: i32, y: i32, visible: Rect },
        Fill { rect: Rect },
        Complete,
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Call>>>);

    impl RenderBackend for Recorder {
        fn render_buffer(&mut self, _: &Arc<Mutex<Surface>>, x: i32, y: i32, visible: Rect) {
            self.0.lock().push(Call::Render { x, y, visible });
        }

        fn copy_buffer(&mut self, _: &Arc<Mutex<Surface>>, x: i32, y: i32, visible: Rect) {
            self.0.lock().push(Call::Copy { x, y, visible });
        }

        fn draw_filled_rectangle(&mut self, _: Color, rect: Rect) {
            self.0.lock().push(Call::Fill { rect });
        }

        fn complete(&mut self) {
            self.0.lock().push(Call::Complete);
        }
    }

    fn renderer() -> (Renderer, Arc<Mutex<Vec<Call>>>) {
        let recorder = Recorder::default();
        let calls = recorder.0.clone();
        (Renderer::new(Box::new(recorder)), calls)
    }

    #[test]
    fn test_first_enter_takes_rect() {
        let (mut r, _) = renderer();
        assert!(r.enter(Rect::new(10, 10, 100, 100), 5, 6));
        assert_eq!(
            r.current_region(),
            Some(RenderRegion {
                clip: Rect::new(10, 10, 100, 100),
                translate_x: 5,
                translate_y: 6,
            })
        );
        r.complete();
    }

    #[test]
    fn test_disjoint_enter_rejected() {
        let (mut r, _) = renderer();
        assert!(r.enter(Rect::new(0, 0, 100, 100), 0, 0));
        assert!(!r.enter(Rect::new(200, 200, 50, 50), 0, 0));
        assert_eq!(r.depth(), 1);
        r.complete();
    }

    #[test]
    fn test_nested_enter_translates_and_clips() {
        let (mut r, _) = renderer();
        r.enter(Rect::new(0, 0, 100, 100), 10, 10);
        assert!(r.enter(Rect::new(80, 80, 50, 50), 80, 80));
        assert_eq!(
            r.current_region(),
            Some(RenderRegion {
                clip: Rect::new(90, 90, 10, 10),
                translate_x: 90,
                translate_y: 90,
            })
        );
        r.complete();
    }

    #[test]
    fn test_translation_near_i32_max() {
        let (mut r, calls) = renderer();
        r.enter(Rect::new(i32::MAX - 100, 0, 100, 100), i32::MAX - 50, 0);
        assert!(r.enter(Rect::new(-60, 0, 20, 20), i32::MAX, 0));
        assert_eq!(
            r.current_region(),
            Some(RenderRegion {
                clip: Rect::new(i32::MAX - 100, 0, 10, 20),
                translate_x: i32::MAX,
                translate_y: 0,
            })
        );

        r.draw_filled_rectangle(Color::WHITE, 0, 0, 10, 10);
        assert_eq!(r.stats().skipped, 1);
        assert!(calls.lock().is_empty());
        r.complete();
    }

    #[test]
    fn test_enter_leave_restores_region() {
        let (mut r, _) = renderer();
        r.enter(Rect::new(0, 0, 100, 100), 3, 4);
        let before = r.current_region();
        assert!(r.enter(Rect::new(10, 10, 20, 20), 10, 10));
        r.leave().unwrap();
        assert_eq!(r.current_region(), before);
        r.complete();
    }

    #[test]
    fn test_leave_underflow() {
        let (mut r, _) = renderer();
        assert_eq!(r.leave(), Err(RenderError::RegionUnderflow));

        let mut scoped = Renderer::scoped(Box::new(Recorder::default()), Rect::new(0, 0, 10, 10), 0, 0);
        assert_eq!(scoped.depth(), 1);
        assert_eq!(scoped.leave(), Err(RenderError::RegionUnderflow));
        assert_eq!(scoped.depth(), 1);
        scoped.complete();
        r.complete();
    }

    #[test]
    fn test_render_buffer_visible_part() {
        let (mut r, calls) = renderer();
        let buffer = Buffer::new(PixelFormat::Argb32, 40, 40);
        r.enter(Rect::new(0, 0, 100, 100), 0, 0);
        assert!(r.enter(Rect::new(50, 50, 100, 100), 50, 50));

        // Footprint (80, 80, 40, 40) clipped to (50, 50, 50, 50).
        r.render_buffer(&buffer, 30, 30);
        assert_eq!(
            calls.lock()[0],
            Call::Render {
                x: 80,
                y: 80,
                visible: Rect::new(0, 0, 20, 20),
            }
        );
        r.complete();
    }

    #[test]
    fn test_render_buffer_relative_offset() {
        let (mut r, calls) = renderer();
        let buffer = Buffer::new(PixelFormat::Argb32, 40, 40);
        r.enter(Rect::new(10, 20, 100, 100), 0, 0);
        r.copy_buffer(&buffer, 0, 0);
        assert_eq!(
            calls.lock()[0],
            Call::Copy {
                x: 0,
                y: 0,
                visible: Rect::new(10, 20, 30, 20),
            }
        );
        r.complete();
    }

    #[test]
    fn test_clipped_draws_are_skipped() {
        let (mut r, calls) = renderer();
        let buffer = Buffer::new(PixelFormat::Argb32, 10, 10);
        r.enter(Rect::new(0, 0, 10, 10), 0, 0);
        r.render_buffer(&buffer, 50, 50);
        r.draw_filled_rectangle(Color::RED, 20, 0, 5, 5);

        let stats = r.complete();
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.blits, 0);
        assert_eq!(*calls.lock(), vec![Call::Complete]);
    }

    #[test]
    fn test_fill_without_region_is_unclipped() {
        let (mut r, calls) = renderer();
        r.draw_filled_rectangle(Color::RED, -5, -5, 1000, 1000);
        assert_eq!(
            calls.lock()[0],
            Call::Fill {
                rect: Rect::new(-5, -5, 1000, 1000),
            }
        );
        r.complete();
    }

    #[test]
    fn test_fill_translated_and_clipped() {
        let (mut r, calls) = renderer();
        r.enter(Rect::new(0, 0, 50, 50), -100, -100);
        r.draw_filled_rectangle(Color::RED, 120, 130, 100, 100);
        assert_eq!(
            calls.lock()[0],
            Call::Fill {
                rect: Rect::new(20, 30, 30, 20),
            }
        );
        r.complete();
    }

    #[test]
    fn test_options() {
        let (mut r, _) = renderer();
        assert_eq!(r.option("debug"), None);
        r.set_option("debug", Some("1"));
        assert_eq!(r.option("debug"), Some("1"));
        r.set_option("debug", Some("2"));
        assert_eq!(r.option("debug"), Some("2"));
        r.set_option("debug", None);
        assert_eq!(r.option("debug"), None);
        r.complete();
    }

    #[test]
    fn test_complete_is_idempotent() {
        let (mut r, calls) = renderer();
        r.draw_filled_rectangle(Color::RED, 0, 0, 1, 1);
        let first = r.complete();
        let second = r.complete();
        assert_eq!(first, second);
        assert_eq!(r.phase(), RenderPhase::Completed);

        // Draws after completion are rejected.
        r.draw_filled_rectangle(Color::RED, 0, 0, 1, 1);
        assert_eq!(r.stats().fills, 1);
        let complete_calls = calls.lock().iter().filter(|c| **c == Call::Complete).count();
        assert_eq!(complete_calls, 1);
    }
}
