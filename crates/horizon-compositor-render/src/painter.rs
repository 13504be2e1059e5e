//! The clipped painter used by widgets to draw into buffers.
//!
//! A [`Painter`] tracks two things while a widget tree paints itself into a
//! buffer: the *origin* (the cumulative translation from buffer space to the
//! local space currently in effect) and the *clip* (always kept in buffer
//! space). Both are saved and restored as a unit, and every change is mirrored
//! into the painter's [`DrawContext`] so primitives drawn through it honour the
//! same translation and clip.
//!
//! # Example
//!
//! ```
//! use horizon_compositor_render::{Painter, Rect};
//!
//! let mut painter = Painter::new();
//! painter.clip_buffer(Rect::new(5, 5, 50, 50));
//!
//! painter.save();
//! painter.set_origin_local(10, 10);
//! painter.clip_local(Rect::new(0, 0, 5, 5));
//! assert_eq!(painter.clip_rectangle_buffer(), Rect::new(10, 10, 5, 5));
//! painter.restore().unwrap();
//!
//! assert_eq!(painter.clip_rectangle_buffer(), Rect::new(5, 5, 50, 50));
//! ```

use std::sync::Arc;

use glam::IVec2;
use horizon_compositor_core::logging::targets;
use parking_lot::Mutex;
use tracing::warn;

use crate::buffer::{Buffer, BufferId};
use crate::color::Color;
use crate::context::DrawContext;
use crate::error::{RenderError, RenderResult};
use crate::rect::Rect;
use crate::surface::Surface;

/// Identifies the widget that owns a painter state frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(pub u64);

/// One frame of painter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PainterState {
    /// Translation from buffer space to local space.
    pub origin: IVec2,
    /// Whether `clip` is in effect.
    pub clip_active: bool,
    /// Clip rectangle in buffer space.
    pub clip: Rect,
    /// Widget that established this frame, if any.
    pub owner: Option<OwnerId>,
}

/// A drawing cursor over one buffer with a save/restore stack.
///
/// The base state frame always exists; [`restore`](Self::restore) never pops it.
#[derive(Debug, Default)]
pub struct Painter {
    current: PainterState,
    saved: Vec<PainterState>,
    buffer: Option<BufferId>,
    context: Option<DrawContext>,
}

impl Painter {
    /// Create a detached painter: zero origin, no clip, no owner, no drawing context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to a buffer: create the drawing context and clip to the whole buffer.
    pub(crate) fn attach(&mut self, id: BufferId, buffer: &Buffer) {
        let (width, height) = buffer.size();
        self.buffer = Some(id);
        self.context = Some(DrawContext::new(Arc::clone(buffer.surface())));
        self.clip_buffer(Rect::new(0, 0, width, height));
    }

    /// The buffer this painter draws into.
    #[inline]
    pub fn buffer(&self) -> Option<BufferId> {
        self.buffer
    }

    /// The current state frame.
    #[inline]
    pub fn state(&self) -> &PainterState {
        &self.current
    }

    /// Number of state frames, including the base frame.
    #[inline]
    pub fn depth(&self) -> usize {
        self.saved.len() + 1
    }

    /// The drawing context, once attached to a buffer.
    #[inline]
    pub fn context_mut(&mut self) -> Option<&mut DrawContext> {
        self.context.as_mut()
    }

    /// Push a copy of the current state.
    pub fn save(&mut self) {
        self.saved.push(self.current);
        if let Some(ctx) = &mut self.context {
            ctx.save();
        }
    }

    /// Pop back to the previously saved state.
    ///
    /// Restoring the base frame is an underflow: it is reported and the state
    /// is left untouched.
    pub fn restore(&mut self) -> RenderResult<()> {
        let Some(state) = self.saved.pop() else {
            warn!(target: targets::PAINTER, "painter restore without matching save");
            return Err(RenderError::PainterStackUnderflow);
        };
        self.current = state;
        if let Some(ctx) = &mut self.context {
            ctx.restore();
        }
        Ok(())
    }

    /// Map a local point to buffer space.
    #[inline]
    pub fn translate_local_to_buffer(&self, x: i32, y: i32) -> (i32, i32) {
        let p = IVec2::new(x, y) + self.current.origin;
        (p.x, p.y)
    }

    /// The current origin in buffer space.
    #[inline]
    pub fn origin(&self) -> IVec2 {
        self.current.origin
    }

    /// Shift the origin by `(dx, dy)`.
    pub fn set_origin_local(&mut self, dx: i32, dy: i32) {
        self.current.origin += IVec2::new(dx, dy);
        self.sync_origin();
    }

    /// Place the origin at buffer coordinates `(x, y)`.
    pub fn set_origin_buffer(&mut self, x: i32, y: i32) {
        self.current.origin = IVec2::new(x, y);
        self.sync_origin();
    }

    fn sync_origin(&mut self) {
        let origin = self.current.origin;
        if let Some(ctx) = &mut self.context {
            ctx.set_translation(origin.x, origin.y);
        }
    }

    /// Restrict the clip to `rect`, given in buffer space.
    ///
    /// With no clip active, `rect` becomes the clip. An empty result collapses
    /// to zero width and height, after which the painter is fully clipped.
    pub fn clip_buffer(&mut self, rect: Rect) {
        let mut clip = if self.current.clip_active {
            self.current.clip.intersection(&rect)
        } else {
            rect
        };
        if clip.is_empty() {
            clip.width = 0;
            clip.height = 0;
        }

        self.current.clip = clip;
        self.current.clip_active = true;
        if let Some(ctx) = &mut self.context {
            ctx.clip_device(clip);
        }
    }

    /// Restrict the clip to `rect`, given in local space.
    pub fn clip_local(&mut self, rect: Rect) {
        let origin = self.current.origin;
        self.clip_buffer(rect.translated(origin.x, origin.y));
    }

    /// Whether nothing drawn now could be visible.
    #[inline]
    pub fn is_fully_clipped(&self) -> bool {
        self.current.clip_active && (self.current.clip.width <= 0 || self.current.clip.height <= 0)
    }

    /// The clip in buffer space.
    #[inline]
    pub fn clip_rectangle_buffer(&self) -> Rect {
        self.current.clip
    }

    /// The clip in local space, with negative coordinates clamped to zero.
    ///
    /// A clip lying above or left of the local origin is reported as starting
    /// at the origin; use [`clip_rectangle_local_checked`](Self::clip_rectangle_local_checked)
    /// to detect that case.
    pub fn clip_rectangle_local(&self) -> Rect {
        let origin = self.current.origin;
        let clip = self.current.clip;
        Rect::new(
            (clip.x - origin.x).max(0),
            (clip.y - origin.y).max(0),
            clip.width,
            clip.height,
        )
    }

    /// The part of the clip inside the local quadrant, or `None` if there is none.
    pub fn clip_rectangle_local_checked(&self) -> Option<Rect> {
        if self.is_fully_clipped() {
            return None;
        }
        let origin = self.current.origin;
        let local = self.current.clip.translated(-origin.x, -origin.y);
        let visible = local.intersection(&Rect::new(0, 0, i32::MAX, i32::MAX));
        (!visible.is_empty()).then_some(visible)
    }

    /// Record which widget owns the current frame.
    pub fn set_owner(&mut self, owner: Option<OwnerId>) {
        self.current.owner = owner;
    }

    /// The widget that owns the current frame.
    #[inline]
    pub fn owner(&self) -> Option<OwnerId> {
        self.current.owner
    }

    /// Fill a local-space rectangle.
    pub fn fill_rectangle_local(&mut self, color: Color, rect: Rect) {
        if self.is_fully_clipped() {
            return;
        }
        if let Some(ctx) = &mut self.context {
            ctx.fill_rect(color, rect);
        }
    }

    /// Composite a whole surface with its top-left at local `(x, y)`.
    pub fn draw_surface_local(&mut self, source: &Arc<Mutex<Surface>>, x: i32, y: i32) {
        if self.is_fully_clipped() {
            return;
        }
        let bounds = source.lock().bounds();
        if let Some(ctx) = &mut self.context {
            ctx.composite_shared(source, x, y, bounds);
        }
    }
}
