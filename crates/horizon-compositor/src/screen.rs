//! The screen: every attached viewport plus the widget root they display.
//!
//! The [`Screen`] is the single owner of compositor state. It fans damage out
//! to the viewports it overlaps, turns fired coalescing timers back into
//! viewport redraws, and keeps the pointer inside the desktop.
//!
//! # Example
//!
//! ```
//! use std::time::{Duration, Instant};
//! use horizon_compositor::{
//!     CompositorConfig, FramebufferConfig, FramebufferDriver, Screen,
//! };
//! use horizon_compositor_render::{BufferStore, Color, Rect, Renderer};
//!
//! let root = |r: &mut Renderer, _: &BufferStore| {
//!     r.draw_filled_rectangle(Color::BLUE, 0, 0, 640, 480);
//! };
//! let mut screen = Screen::new(CompositorConfig::default(), Box::new(root));
//!
//! let driver = FramebufferDriver::new(FramebufferConfig::new(640, 480)).shared();
//! let id = screen.attach_viewport(driver.clone());
//!
//! // The initial full-screen paint runs when the coalescing timer fires.
//! let reports = screen
//!     .process_timers_at(Instant::now() + Duration::from_millis(50))
//!     .unwrap();
//! assert_eq!(reports.len(), 1);
//! assert_eq!(reports[0].0, id);
//! assert_eq!(driver.lock().framebuffer().lock().pixel(0, 0), Some(0xFF_00_00_FF));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use horizon_compositor_core::logging::{span_names, targets};
use horizon_compositor_core::{PerfSpan, TimerId, TimerManager};
use horizon_compositor_render::{BufferId, BufferStore, Rect, RenderError};
use tracing::{debug, trace};

use crate::config::CompositorConfig;
use crate::error::{CompositorError, CompositorResult};
use crate::tree::RenderTree;
use crate::video::SharedVideoDriver;
use crate::viewport::{GeometryListener, RedrawReport, Viewport, ViewportId};

/// Desktop rectangles of the attached viewports.
#[derive(Debug, Default)]
struct DesktopLayout {
    bounds: BTreeMap<ViewportId, Rect>,
}

impl GeometryListener for DesktopLayout {
    fn viewport_geometry_changed(&mut self, id: ViewportId, bounds: Rect) {
        self.bounds.insert(id, bounds);
    }
}

impl DesktopLayout {
    fn union(&self) -> Option<Rect> {
        self.bounds
            .values()
            .copied()
            .reduce(|acc, rect| acc.union(&rect))
    }

    /// The point inside some viewport closest to `(x, y)`.
    fn constrain(&self, x: i32, y: i32) -> (i32, i32) {
        let mut best: Option<((i32, i32), i64)> = None;
        for rect in self.bounds.values().filter(|r| !r.is_empty()) {
            let cx = x.clamp(rect.x, rect.right() - 1);
            let cy = y.clamp(rect.y, rect.bottom() - 1);
            let (dx, dy) = ((cx - x) as i64, (cy - y) as i64);
            let distance = dx * dx + dy * dy;
            if distance == 0 {
                return (x, y);
            }
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some(((cx, cy), distance));
            }
        }
        best.map_or((x, y), |(point, _)| point)
    }
}

/// Owns viewports, their redraw timers, widget buffers and the widget root.
pub struct Screen {
    config: CompositorConfig,
    viewports: BTreeMap<ViewportId, Viewport>,
    layout: DesktopLayout,
    timers: TimerManager,
    /// Coalescing timer to the viewport it belongs to.
    pending: HashMap<TimerId, ViewportId>,
    buffers: BufferStore,
    root: Box<dyn RenderTree>,
    pointer: (i32, i32),
}

impl Screen {
    /// Create a screen with no viewports.
    pub fn new(config: CompositorConfig, root: Box<dyn RenderTree>) -> Self {
        Self {
            config,
            viewports: BTreeMap::new(),
            layout: DesktopLayout::default(),
            timers: TimerManager::new(),
            pending: HashMap::new(),
            buffers: BufferStore::new(),
            root,
            pointer: (0, 0),
        }
    }

    /// The configuration viewports are created with.
    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Replace the widget root and repaint everything.
    pub fn set_root(&mut self, root: Box<dyn RenderTree>) {
        self.root = root;
        if let Some(desktop) = self.desktop_bounds() {
            self.invalidate_rectangle(desktop);
        }
    }

    /// Widget buffers.
    pub fn buffers(&self) -> &BufferStore {
        &self.buffers
    }

    /// Widget buffers, mutably.
    pub fn buffers_mut(&mut self) -> &mut BufferStore {
        &mut self.buffers
    }

    /// Attach an output. Its viewport starts at the desktop origin and is
    /// scheduled for a full repaint.
    pub fn attach_viewport(&mut self, driver: SharedVideoDriver) -> ViewportId {
        let mut viewport = Viewport::new(driver, &self.config);
        let id = viewport.id();
        let bounds = viewport.rectangle();
        self.layout.viewport_geometry_changed(id, bounds);
        if let Some(timer) = viewport.invalidate_rectangle(bounds, &mut self.timers) {
            self.pending.insert(timer, id);
        }
        self.viewports.insert(id, viewport);
        debug!(target: targets::SCREEN, id = id.raw(), ?bounds, "viewport attached");
        id
    }

    /// Detach an output, dropping its pending redraw.
    pub fn detach_viewport(&mut self, id: ViewportId) -> CompositorResult<Viewport> {
        let mut viewport = self
            .viewports
            .remove(&id)
            .ok_or(CompositorError::UnknownViewport(id))?;
        if let Some(timer) = viewport.cancel_pending(&mut self.timers)? {
            self.pending.remove(&timer);
        }
        self.layout.bounds.remove(&id);
        debug!(target: targets::SCREEN, id = id.raw(), "viewport detached");
        Ok(viewport)
    }

    /// Look up a viewport.
    pub fn viewport(&self, id: ViewportId) -> Option<&Viewport> {
        self.viewports.get(&id)
    }

    /// Ids of all attached viewports, in creation order.
    pub fn viewport_ids(&self) -> impl Iterator<Item = ViewportId> + '_ {
        self.viewports.keys().copied()
    }

    /// Number of attached viewports.
    pub fn viewport_count(&self) -> usize {
        self.viewports.len()
    }

    /// Bounding box of every viewport.
    pub fn desktop_bounds(&self) -> Option<Rect> {
        self.layout.union()
    }

    /// Push damage to every viewport it overlaps. Returns how many received it.
    pub fn invalidate_rectangle(&mut self, rect: Rect) -> usize {
        let mut hit = 0;
        for (id, viewport) in &mut self.viewports {
            if rect.intersection(&viewport.rectangle()).is_empty() {
                continue;
            }
            hit += 1;
            if let Some(timer) = viewport.invalidate_rectangle(rect, &mut self.timers) {
                self.pending.insert(timer, *id);
            }
        }
        trace!(target: targets::SCREEN, ?rect, viewports = hit, "damage fanned out");
        hit
    }

    /// Resize a viewport.
    pub fn set_viewport_size(&mut self, id: ViewportId, width: i32, height: i32) -> CompositorResult<()> {
        let viewport = self
            .viewports
            .get_mut(&id)
            .ok_or(CompositorError::UnknownViewport(id))?;
        if let Some(timer) = viewport.set_size(width, height, &mut self.timers, Some(&mut self.layout)) {
            self.pending.insert(timer, id);
        }
        Ok(())
    }

    /// Move a viewport's top-left corner to desktop `(x, y)`.
    pub fn move_viewport(&mut self, id: ViewportId, x: i32, y: i32) -> CompositorResult<()> {
        let viewport = self
            .viewports
            .get_mut(&id)
            .ok_or(CompositorError::UnknownViewport(id))?;
        if let Some(timer) = viewport.move_to(x, y, &mut self.timers, Some(&mut self.layout)) {
            self.pending.insert(timer, id);
        }
        Ok(())
    }

    /// Change a viewport's output resolution.
    pub fn set_viewport_resolution(&mut self, id: ViewportId, width: i32, height: i32) -> CompositorResult<()> {
        let viewport = self
            .viewports
            .get_mut(&id)
            .ok_or(CompositorError::UnknownViewport(id))?;
        if let Some(timer) = viewport.set_resolution(width, height, &mut self.timers, Some(&mut self.layout))? {
            self.pending.insert(timer, id);
        }
        Ok(())
    }

    /// How long until the next scheduled redraw.
    pub fn time_until_next(&mut self) -> Option<Duration> {
        self.timers.time_until_next()
    }

    /// Run the redraws whose coalescing timers are due.
    pub fn process_timers(&mut self) -> CompositorResult<Vec<(ViewportId, RedrawReport)>> {
        self.process_timers_at(Instant::now())
    }

    /// Run the redraws whose coalescing timers are due at `now`.
    pub fn process_timers_at(&mut self, now: Instant) -> CompositorResult<Vec<(ViewportId, RedrawReport)>> {
        let _span = PerfSpan::new(span_names::TIMER);
        let mut reports = Vec::new();
        for timer in self.timers.process_expired_at(now) {
            let Some(id) = self.pending.remove(&timer) else {
                continue;
            };
            let Some(viewport) = self.viewports.get_mut(&id) else {
                continue;
            };
            if viewport.pending_update() != Some(timer) {
                continue;
            }
            let report = viewport.update(self.root.as_mut(), &self.buffers, &mut self.timers)?;
            reports.push((id, report));
        }
        Ok(reports)
    }

    /// Redraw every viewport with damage now, without waiting for its timer.
    pub fn flush(&mut self) -> CompositorResult<Vec<(ViewportId, RedrawReport)>> {
        let mut reports = Vec::new();
        for (id, viewport) in &mut self.viewports {
            if let Some(timer) = viewport.cancel_pending(&mut self.timers)? {
                self.pending.remove(&timer);
            }
            if viewport.damage().is_empty() {
                continue;
            }
            let report = viewport.update(self.root.as_mut(), &self.buffers, &mut self.timers)?;
            reports.push((*id, report));
        }
        Ok(reports)
    }

    /// Clamp a desktop point into the nearest viewport.
    pub fn constrain_pointer(&self, x: i32, y: i32) -> (i32, i32) {
        self.layout.constrain(x, y)
    }

    /// Move the pointer, keeping it on the desktop. Returns where it ended up.
    pub fn set_pointer_position(&mut self, x: i32, y: i32) -> (i32, i32) {
        self.pointer = self.constrain_pointer(x, y);
        self.pointer
    }

    /// The current pointer position.
    pub fn pointer_position(&self) -> (i32, i32) {
        self.pointer
    }

    /// Install a pointer image on every output, or clear it with `None`.
    pub fn set_pointer_image(&mut self, image: Option<BufferId>, hot_x: i32, hot_y: i32) -> CompositorResult<()> {
        let buffer = match image {
            Some(id) => Some(self.buffers.buffer(id).ok_or(RenderError::InvalidBuffer)?),
            None => None,
        };
        for viewport in self.viewports.values() {
            viewport.driver().lock().set_pointer(buffer, hot_x, hot_y);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("viewports", &self.viewports)
            .field("pending", &self.pending.len())
            .field("pointer", &self.pointer)
            .finish_non_exhaustive()
    }
}
