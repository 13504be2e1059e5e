//! A CPU renderer backend compositing straight into a pixel surface.

use std::sync::Arc;

use horizon_compositor_core::logging::targets;
use parking_lot::Mutex;
use tracing::trace;

use crate::color::Color;
use crate::context::{DrawContext, Operator};
use crate::rect::Rect;
use crate::renderer::{RenderBackend, Renderer};
use crate::surface::Surface;

/// Renderer backend drawing through a [`DrawContext`] onto a shared surface,
/// typically a video driver's framebuffer.
#[derive(Debug)]
pub struct SurfaceBackend {
    context: DrawContext,
}

impl SurfaceBackend {
    /// Create a backend drawing onto `target`.
    pub fn new(target: Arc<Mutex<Surface>>) -> Self {
        Self {
            context: DrawContext::new(target),
        }
    }

    /// Create a [`Renderer`] over `target` whose baseline region is `rect`.
    pub fn renderer(target: Arc<Mutex<Surface>>, rect: Rect) -> Renderer {
        Renderer::scoped(Box::new(Self::new(target)), rect, 0, 0)
    }

    /// The surface this backend draws onto.
    pub fn target(&self) -> &Arc<Mutex<Surface>> {
        self.context.target()
    }

    fn composite(
        &mut self,
        operator: Operator,
        source: &Arc<Mutex<Surface>>,
        x: i32,
        y: i32,
        visible: Rect,
    ) {
        self.context.save();
        self.context.set_operator(operator);
        self.context
            .composite_shared(source, x + visible.x, y + visible.y, visible);
        self.context.restore();
    }
}

impl RenderBackend for SurfaceBackend {
    fn render_buffer(&mut self, source: &Arc<Mutex<Surface>>, x: i32, y: i32, visible: Rect) {
        self.composite(Operator::Over, source, x, y, visible);
    }

    fn copy_buffer(&mut self, source: &Arc<Mutex<Surface>>, x: i32, y: i32, visible: Rect) {
        self.composite(Operator::Source, source, x, y, visible);
    }

    fn draw_filled_rectangle(&mut self, color: Color, rect: Rect) {
        let [r, g, b, a] = color.to_straight();
        trace!(target: targets::RENDERER, ?rect, r, g, b, a, "fill");
        self.context.fill_rect(color, rect);
    }
}
