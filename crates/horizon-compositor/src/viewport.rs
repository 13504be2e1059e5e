//! Viewports: one video output bound to a rectangle of desktop space.
//!
//! A [`Viewport`] collects damage in desktop coordinates and, once its
//! coalescing timer fires, repaints the damaged part of its output in a single
//! batched update:
//!
//! 1. overlapping damage is merged ([`DamageBuffer::coalesce`]);
//! 2. each merged rectangle is clipped to the viewport and the driver's
//!    output, then converted to device pixels;
//! 3. the driver hands out a [`Renderer`] for that device rectangle, the
//!    viewport enters a region mapping desktop to device coordinates, and the
//!    widget tree renders into it;
//! 4. the renderer is completed and destroyed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use horizon_compositor_core::logging::{span_names, targets};
use horizon_compositor_core::{PerfSpan, TimerId, TimerManager};
use horizon_compositor_render::{BufferStore, DamageBuffer, Rect, RenderStats};
use tracing::{debug, trace, warn};

use crate::config::CompositorConfig;
use crate::error::CompositorResult;
use crate::tree::RenderTree;
use crate::video::{SharedVideoDriver, Value};

/// Counter for generating unique viewport IDs.
static VIEWPORT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-wide, monotonically increasing viewport identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewportId(u64);

impl ViewportId {
    fn next() -> Self {
        Self(VIEWPORT_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Notified when a viewport's desktop rectangle changes.
pub trait GeometryListener {
    fn viewport_geometry_changed(&mut self, id: ViewportId, bounds: Rect);
}

/// What one redraw pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedrawReport {
    /// Damage rectangles left after coalescing.
    pub damage_rects: usize,
    /// Renderers run to completion.
    pub passes: usize,
    /// Rectangles the driver refused to render.
    pub dropped: usize,
    /// Combined renderer statistics.
    pub stats: RenderStats,
}

/// One output's view onto the desktop.
pub struct Viewport {
    id: ViewportId,
    bounds: Rect,
    damage: DamageBuffer,
    driver: SharedVideoDriver,
    pending: Option<TimerId>,
    coalesce_delay: Duration,
}

impl Viewport {
    /// Bind a driver at the desktop origin, sized to the driver's output.
    ///
    /// Drivers reporting a non-positive dimension get the configured
    /// fallback size.
    pub fn new(driver: SharedVideoDriver, config: &CompositorConfig) -> Self {
        let (mut width, mut height) = driver.lock().pixel_dimensions();
        if width <= 0 || height <= 0 {
            debug!(
                target: targets::VIEWPORT,
                width, height, "driver reported no size, using fallback"
            );
            width = config.fallback_width;
            height = config.fallback_height;
        }

        let id = ViewportId::next();
        trace!(target: targets::VIEWPORT, id = id.raw(), width, height, "viewport created");
        Self {
            id,
            bounds: Rect::new(0, 0, width, height),
            damage: DamageBuffer::new(),
            driver,
            pending: None,
            coalesce_delay: config.coalesce_delay,
        }
    }

    /// This viewport's id.
    #[inline]
    pub fn id(&self) -> ViewportId {
        self.id
    }

    /// Current bounds in desktop coordinates.
    #[inline]
    pub fn rectangle(&self) -> Rect {
        self.bounds
    }

    /// Damage collected since the last redraw.
    #[inline]
    pub fn damage(&self) -> &DamageBuffer {
        &self.damage
    }

    /// The scheduled redraw timer, if any.
    #[inline]
    pub fn pending_update(&self) -> Option<TimerId> {
        self.pending
    }

    /// The bound video driver.
    #[inline]
    pub fn driver(&self) -> &SharedVideoDriver {
        &self.driver
    }

    /// Mark a desktop rectangle as needing a redraw.
    ///
    /// Schedules the coalescing timer unless one is already pending, and
    /// returns the timer only when a new one was started.
    pub fn invalidate_rectangle(&mut self, rect: Rect, timers: &mut TimerManager) -> Option<TimerId> {
        if rect.is_empty() {
            return None;
        }
        self.damage.add(rect);

        if self.pending.is_some() {
            return None;
        }
        let timer = timers.start_one_shot(self.coalesce_delay);
        self.pending = Some(timer);
        trace!(target: targets::VIEWPORT, id = self.id.raw(), ?timer, "redraw scheduled");
        Some(timer)
    }

    /// Forget the scheduled redraw, stopping its timer if it has not fired yet.
    /// Damage is kept.
    pub fn cancel_pending(&mut self, timers: &mut TimerManager) -> CompositorResult<Option<TimerId>> {
        let Some(timer) = self.pending.take() else {
            return Ok(None);
        };
        if timers.is_active(timer) {
            timers.stop(timer)?;
        }
        Ok(Some(timer))
    }

    /// Repaint all collected damage.
    ///
    /// Any redraw still scheduled for this viewport is cancelled, so a later
    /// invalidation starts a fresh coalescing timer.
    #[tracing::instrument(
        skip_all,
        target = "horizon_compositor::viewport",
        level = "debug",
        fields(viewport = self.id.raw())
    )]
    pub fn update(
        &mut self,
        tree: &mut dyn RenderTree,
        buffers: &BufferStore,
        timers: &mut TimerManager,
    ) -> CompositorResult<RedrawReport> {
        self.cancel_pending(timers)?;
        let mut report = RedrawReport::default();
        if self.damage.is_empty() {
            return Ok(report);
        }
        let _span = PerfSpan::new(span_names::REDRAW);

        self.damage.coalesce();
        let damage = self.damage.take();
        report.damage_rects = damage.len();

        let output = {
            let (width, height) = self.driver.lock().pixel_dimensions();
            if width > 0 && height > 0 {
                Rect::new(0, 0, width, height)
            } else {
                Rect::from_size(self.bounds.width, self.bounds.height)
            }
        };

        self.driver.lock().begin_updates();
        for rect in damage {
            let visible = rect.intersection(&self.bounds);
            if visible.is_empty() {
                continue;
            }
            let device = visible
                .translated(-self.bounds.x, -self.bounds.y)
                .intersection(&output);
            if device.is_empty() {
                continue;
            }

            let Some(mut renderer) = self.driver.lock().renderer(device) else {
                warn!(target: targets::VIEWPORT, ?device, "driver returned no renderer");
                report.dropped += 1;
                continue;
            };

            if renderer.enter(device, -self.bounds.x, -self.bounds.y) {
                let depth = renderer.depth();
                tree.render(&mut renderer, buffers);
                if renderer.depth() != depth {
                    warn!(
                        target: targets::VIEWPORT,
                        expected = depth,
                        actual = renderer.depth(),
                        "render tree left regions unbalanced"
                    );
                }
                while renderer.depth() >= depth {
                    if renderer.leave().is_err() {
                        break;
                    }
                }
            }

            report.stats.accumulate(&renderer.complete());
            report.passes += 1;
        }
        self.driver.lock().end_updates();

        debug!(target: targets::VIEWPORT, id = self.id.raw(), ?report, "redraw complete");
        Ok(report)
    }

    /// Resize the viewport and repaint all of it.
    pub fn set_size(
        &mut self,
        width: i32,
        height: i32,
        timers: &mut TimerManager,
        listener: Option<&mut dyn GeometryListener>,
    ) -> Option<TimerId> {
        self.bounds.width = width;
        self.bounds.height = height;
        self.geometry_changed(timers, listener)
    }

    /// Place the viewport's top-left corner at desktop `(x, y)` and repaint it.
    pub fn move_to(
        &mut self,
        x: i32,
        y: i32,
        timers: &mut TimerManager,
        listener: Option<&mut dyn GeometryListener>,
    ) -> Option<TimerId> {
        self.bounds.x = x;
        self.bounds.y = y;
        self.geometry_changed(timers, listener)
    }

    /// Switch the driver's resolution and resize the viewport to match.
    pub fn set_resolution(
        &mut self,
        width: i32,
        height: i32,
        timers: &mut TimerManager,
        listener: Option<&mut dyn GeometryListener>,
    ) -> CompositorResult<Option<TimerId>> {
        self.driver.lock().set_resolution(width, height)?;
        Ok(self.set_size(width, height, timers, listener))
    }

    fn geometry_changed(
        &mut self,
        timers: &mut TimerManager,
        listener: Option<&mut dyn GeometryListener>,
    ) -> Option<TimerId> {
        debug!(target: targets::VIEWPORT, id = self.id.raw(), bounds = ?self.bounds, "geometry changed");
        if let Some(listener) = listener {
            listener.viewport_geometry_changed(self.id, self.bounds);
        }
        self.invalidate_rectangle(self.bounds, timers)
    }

    /// Pass arguments through to the driver's extension point.
    pub fn special(&self, args: &[Value]) -> Value {
        self.driver.lock().special(args)
    }
}

impl std::fmt::Debug for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Viewport")
            .field("id", &self.id)
            .field("bounds", &self.bounds)
            .field("damage", &self.damage.len())
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use horizon_compositor_render::{Color, Renderer};
    use parking_lot::Mutex;

    use super::*;
    use crate::video::{FramebufferConfig, FramebufferDriver, VideoDriver};

    fn framebuffer_viewport(width: i32, height: i32) -> (Viewport, Arc<Mutex<FramebufferDriver>>) {
        let driver = FramebufferDriver::new(FramebufferConfig::new(width, height)).shared();
        let viewport = Viewport::new(driver.clone(), &CompositorConfig::default());
        (viewport, driver)
    }

    #[test]
    fn test_ids_increase() {
        let (a, _) = framebuffer_viewport(10, 10);
        let (b, _) = framebuffer_viewport(10, 10);
        assert!(b.id() > a.id());
    }

    struct Sizeless;

    impl VideoDriver for Sizeless {
        fn pixel_dimensions(&self) -> (i32, i32) {
            (0, 480)
        }

        fn renderer(&mut self, _rect: Rect) -> Option<Renderer> {
            None
        }
    }

    #[test]
    fn test_fallback_size() {
        let viewport = Viewport::new(Arc::new(Mutex::new(Sizeless)), &CompositorConfig::default());
        assert_eq!(viewport.rectangle(), Rect::new(0, 0, 800, 600));
    }

    #[test]
    fn test_single_pending_timer() {
        let (mut viewport, _) = framebuffer_viewport(100, 100);
        let mut timers = TimerManager::new();

        let first = viewport.invalidate_rectangle(Rect::new(0, 0, 10, 10), &mut timers);
        assert!(first.is_some());
        for i in 0..5 {
            assert!(viewport.invalidate_rectangle(Rect::new(i, i, 10, 10), &mut timers).is_none());
        }
        assert_eq!(timers.active_count(), 1);
        assert_eq!(viewport.pending_update(), first);
        assert_eq!(viewport.damage().len(), 6);
    }

    #[test]
    fn test_empty_invalidation_ignored() {
        let (mut viewport, _) = framebuffer_viewport(100, 100);
        let mut timers = TimerManager::new();
        assert!(viewport.invalidate_rectangle(Rect::new(5, 5, 0, 10), &mut timers).is_none());
        assert!(viewport.damage().is_empty());
        assert_eq!(timers.active_count(), 0);
    }

    #[test]
    fn test_update_without_damage() {
        let (mut viewport, driver) = framebuffer_viewport(100, 100);
        let mut timers = TimerManager::new();
        let mut calls = 0;
        let mut tree = |_: &mut Renderer, _: &BufferStore| calls += 1;
        let report = viewport.update(&mut tree, &BufferStore::new(), &mut timers).unwrap();
        assert_eq!(report, RedrawReport::default());
        assert_eq!(calls, 0);
        assert_eq!(driver.lock().update_count(), 0);
    }

    #[test]
    fn test_update_clips_to_bounds() {
        let (mut viewport, driver) = framebuffer_viewport(800, 600);
        let mut timers = TimerManager::new();
        viewport.invalidate_rectangle(Rect::new(790, 590, 100, 100), &mut timers);

        let mut clips = Vec::new();
        let mut tree = |r: &mut Renderer, _: &BufferStore| {
            clips.push(r.current_region().unwrap().clip);
            r.draw_filled_rectangle(Color::WHITE, 0, 0, 2000, 2000);
        };
        let report = viewport.update(&mut tree, &BufferStore::new(), &mut timers).unwrap();

        assert_eq!(clips, vec![Rect::new(790, 590, 10, 10)]);
        assert_eq!(report.damage_rects, 1);
        assert_eq!(report.passes, 1);
        assert_eq!(report.stats.fills, 1);
        assert!(viewport.damage().is_empty());
        assert!(viewport.pending_update().is_none());

        let driver = driver.lock();
        assert_eq!(driver.update_count(), 1);
        let fb = driver.framebuffer().lock();
        assert_eq!(fb.pixel(795, 595), Some(0xFF_FF_FF_FF));
        assert_eq!(fb.pixel(789, 589), Some(0));
    }

    #[test]
    fn test_desktop_to_device_translation() {
        let (mut viewport, driver) = framebuffer_viewport(100, 100);
        let mut timers = TimerManager::new();
        viewport.move_to(1000, 0, &mut timers, None);
        viewport
            .update(&mut |_: &mut Renderer, _: &BufferStore| {}, &BufferStore::new(), &mut timers)
            .unwrap();

        viewport.invalidate_rectangle(Rect::new(1010, 10, 5, 5), &mut timers);
        let mut tree = |r: &mut Renderer, _: &BufferStore| {
            // Desktop coordinates.
            r.draw_filled_rectangle(Color::RED, 1010, 10, 5, 5);
        };
        viewport.update(&mut tree, &BufferStore::new(), &mut timers).unwrap();

        let driver = driver.lock();
        let fb = driver.framebuffer().lock();
        assert_eq!(fb.pixel(10, 10), Some(0xFF_FF_00_00));
        assert_eq!(fb.pixel(14, 14), Some(0xFF_FF_00_00));
        assert_eq!(fb.pixel(15, 15), Some(0));
    }

    #[test]
    fn test_unbalanced_tree_is_repaired() {
        let (mut viewport, _) = framebuffer_viewport(100, 100);
        let mut timers = TimerManager::new();
        viewport.invalidate_rectangle(Rect::new(0, 0, 50, 50), &mut timers);

        let mut tree = |r: &mut Renderer, _: &BufferStore| {
            r.enter(Rect::new(0, 0, 10, 10), 0, 0);
        };
        let report = viewport.update(&mut tree, &BufferStore::new(), &mut timers).unwrap();
        assert_eq!(report.passes, 1);
    }

    #[test]
    fn test_set_size_notifies_and_invalidates() {
        struct Recorder(Vec<(ViewportId, Rect)>);
        impl GeometryListener for Recorder {
            fn viewport_geometry_changed(&mut self, id: ViewportId, bounds: Rect) {
                self.0.push((id, bounds));
            }
        }

        let (mut viewport, _) = framebuffer_viewport(100, 100);
        let mut timers = TimerManager::new();
        let mut recorder = Recorder(Vec::new());
        let timer = viewport.set_size(200, 150, &mut timers, Some(&mut recorder));

        assert!(timer.is_some());
        assert_eq!(recorder.0, vec![(viewport.id(), Rect::new(0, 0, 200, 150))]);
        assert_eq!(viewport.damage().rects(), &[Rect::new(0, 0, 200, 150)]);
    }

    #[test]
    fn test_cancel_pending_keeps_damage() {
        let (mut viewport, _) = framebuffer_viewport(100, 100);
        let mut timers = TimerManager::new();
        let timer = viewport.invalidate_rectangle(Rect::new(0, 0, 5, 5), &mut timers);
        assert_eq!(viewport.cancel_pending(&mut timers).unwrap(), timer);
        assert!(viewport.pending_update().is_none());
        assert!(!viewport.damage().is_empty());
        assert!(timers.process_expired_at(Instant::now() + Duration::from_secs(1)).is_empty());
        assert_eq!(viewport.cancel_pending(&mut timers).unwrap(), None);
    }

    #[test]
    fn test_cancel_after_timer_fired() {
        let (mut viewport, _) = framebuffer_viewport(100, 100);
        let mut timers = TimerManager::new();
        let timer = viewport.invalidate_rectangle(Rect::new(0, 0, 5, 5), &mut timers);
        let fired = timers.process_expired_at(Instant::now() + Duration::from_secs(1));
        assert_eq!(fired, timer.into_iter().collect::<Vec<_>>());

        assert_eq!(viewport.cancel_pending(&mut timers).unwrap(), timer);
        assert_eq!(timers.active_count(), 0);
    }

    #[test]
    fn test_direct_update_stops_pending_timer() {
        let (mut viewport, _) = framebuffer_viewport(100, 100);
        let mut timers = TimerManager::new();
        let first = viewport.invalidate_rectangle(Rect::new(0, 0, 10, 10), &mut timers);
        assert!(first.is_some());

        viewport
            .update(&mut |_: &mut Renderer, _: &BufferStore| {}, &BufferStore::new(), &mut timers)
            .unwrap();
        assert!(viewport.pending_update().is_none());
        assert_eq!(timers.active_count(), 0);

        let second = viewport.invalidate_rectangle(Rect::new(0, 0, 10, 10), &mut timers);
        assert!(second.is_some());
        assert_ne!(second, first);
        assert_eq!(timers.active_count(), 1);
        assert_eq!(
            timers.process_expired_at(Instant::now() + Duration::from_secs(1)),
            second.into_iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_special_passthrough() {
        let (viewport, _) = framebuffer_viewport(10, 10);
        assert_eq!(viewport.special(&["update-count".into()]), Value::Int(0));
        assert!(viewport.special(&[Value::Bool(true)]).is_unsupported());
    }
}
