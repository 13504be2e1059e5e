//! The drawing context bound to a single pixel surface.
//!
//! [`DrawContext`] is the primitive drawing backend that painters and the
//! software renderer draw through. It keeps its own save/restore stack of
//! translation, clip and compositing operator so that state applied through
//! the context is reverted together with the owner's state.

use std::sync::Arc;

use glam::IVec2;
use parking_lot::Mutex;

use crate::color::Color;
use crate::rect::Rect;
use crate::surface::Surface;

/// Compositing operator for fills and surface composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operator {
    /// Source-over alpha compositing.
    #[default]
    Over,
    /// Replace the destination with the source, ignoring what was there.
    Source,
}

impl Operator {
    /// Combine a premultiplied source pixel with a destination pixel.
    #[inline]
    pub fn blend(self, src: u32, dst: u32) -> u32 {
        match self {
            Operator::Source => src,
            Operator::Over => {
                let inv = 255 - (src >> 24);
                if inv == 0 {
                    return src;
                }
                let mut out = 0;
                for shift in [0, 8, 16, 24] {
                    let s = (src >> shift) & 0xFF;
                    let d = (dst >> shift) & 0xFF;
                    let c = (s + (d * inv + 127) / 255).min(255);
                    out |= c << shift;
                }
                out
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ContextState {
    translation: IVec2,
    /// Clip in device space; `None` means the whole surface.
    clip: Option<Rect>,
    operator: Operator,
}

impl Default for ContextState {
    fn default() -> Self {
        Self {
            translation: IVec2::ZERO,
            clip: None,
            operator: Operator::Over,
        }
    }
}

/// A drawing context targeting one shared surface.
pub struct DrawContext {
    target: Arc<Mutex<Surface>>,
    current: ContextState,
    stack: Vec<ContextState>,
}

impl DrawContext {
    /// Create a context drawing onto `target`.
    pub fn new(target: Arc<Mutex<Surface>>) -> Self {
        Self {
            target,
            current: ContextState::default(),
            stack: Vec::new(),
        }
    }

    /// The surface this context draws onto.
    #[inline]
    pub fn target(&self) -> &Arc<Mutex<Surface>> {
        &self.target
    }

    /// Save the current state.
    pub fn save(&mut self) {
        self.stack.push(self.current);
    }

    /// Restore the previously saved state.
    ///
    /// Returns `false` and changes nothing if there is no saved state.
    pub fn restore(&mut self) -> bool {
        match self.stack.pop() {
            Some(state) => {
                self.current = state;
                true
            }
            None => false,
        }
    }

    /// Number of saved states.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Offset the user-space origin.
    pub fn translate(&mut self, dx: i32, dy: i32) {
        self.current.translation += IVec2::new(dx, dy);
    }

    /// Set the user-space origin in device coordinates.
    pub fn set_translation(&mut self, x: i32, y: i32) {
        self.current.translation = IVec2::new(x, y);
    }

    /// The current user-space origin in device coordinates.
    #[inline]
    pub fn translation(&self) -> IVec2 {
        self.current.translation
    }

    /// Intersect the clip with a rectangle in user space.
    pub fn clip(&mut self, rect: Rect) {
        let t = self.current.translation;
        self.clip_device(rect.translated(t.x, t.y));
    }

    /// Intersect the clip with a rectangle in device space.
    pub fn clip_device(&mut self, rect: Rect) {
        self.current.clip = Some(match self.current.clip {
            Some(clip) => clip.intersection(&rect),
            None => rect,
        });
    }

    /// The drawable area in device space: the clip limited to the surface.
    pub fn clip_extents(&self) -> Rect {
        let bounds = self.target.lock().bounds();
        match self.current.clip {
            Some(clip) => clip.intersection(&bounds),
            None => bounds,
        }
    }

    /// Set the compositing operator.
    pub fn set_operator(&mut self, operator: Operator) {
        self.current.operator = operator;
    }

    /// The current compositing operator.
    #[inline]
    pub fn operator(&self) -> Operator {
        self.current.operator
    }

    /// Fill a user-space rectangle with a solid colour.
    pub fn fill_rect(&mut self, color: Color, rect: Rect) {
        let t = self.current.translation;
        let area = rect.translated(t.x, t.y).intersection(&self.clip_extents());
        if area.is_empty() {
            return;
        }

        let src = color.to_premultiplied_argb32();
        let op = self.current.operator;
        let mut target = self.target.lock();
        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                let dst = target.pixel(x, y).unwrap_or(0);
                target.set_pixel(x, y, op.blend(src, dst));
            }
        }
    }

    /// Composite the `src` region of `source` with its top-left at user-space `(x, y)`.
    pub fn composite(&mut self, source: &Surface, x: i32, y: i32, src: Rect) {
        let t = self.current.translation;
        let origin = IVec2::new(x, y) + t;
        let area = Rect::new(origin.x, origin.y, src.width, src.height)
            .intersection(&self.clip_extents());
        if area.is_empty() {
            return;
        }

        let op = self.current.operator;
        let mut target = self.target.lock();
        for dy in area.y..area.bottom() {
            for dx in area.x..area.right() {
                let sx = src.x + (dx - origin.x);
                let sy = src.y + (dy - origin.y);
                let pixel = source.pixel(sx, sy).unwrap_or(0);
                let dst = target.pixel(dx, dy).unwrap_or(0);
                target.set_pixel(dx, dy, op.blend(pixel, dst));
            }
        }
    }

    /// Like [`composite`](Self::composite), but accepts a shared surface that
    /// may be this context's own target.
    pub fn composite_shared(&mut self, source: &Arc<Mutex<Surface>>, x: i32, y: i32, src: Rect) {
        if Arc::ptr_eq(source, &self.target) {
            let snapshot = source.lock().clone();
            self.composite(&snapshot, x, y, src);
        } else {
            let source = source.lock();
            self.composite(&source, x, y, src);
        }
    }
}

impl std::fmt::Debug for DrawContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawContext")
            .field("translation", &self.current.translation)
            .field("clip", &self.current.clip)
            .field("operator", &self.current.operator)
            .field("depth", &self.stack.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::PixelFormat;

    fn target(w: i32, h: i32) -> Arc<Mutex<Surface>> {
        Arc::new(Mutex::new(Surface::new(PixelFormat::Argb32, w, h)))
    }

    #[test]
    fn test_blend_over() {
        assert_eq!(Operator::Over.blend(0xFF_11_22_33, 0xFF_FF_FF_FF), 0xFF_11_22_33);
        assert_eq!(Operator::Over.blend(0, 0xFF_44_55_66), 0xFF_44_55_66);
        // 50% black over white -> mid gray.
        assert_eq!(Operator::Over.blend(0x80_00_00_00, 0xFF_FF_FF_FF), 0xFF_7F_7F_7F);
    }

    #[test]
    fn test_blend_source() {
        assert_eq!(Operator::Source.blend(0x80_00_00_00, 0xFF_FF_FF_FF), 0x80_00_00_00);
    }

    #[test]
    fn test_fill_respects_translation_and_clip() {
        let surface = target(10, 10);
        let mut ctx = DrawContext::new(surface.clone());
        ctx.translate(2, 2);
        ctx.clip(Rect::new(0, 0, 3, 3));
        ctx.fill_rect(Color::RED, Rect::new(-5, -5, 100, 100));

        let surface = surface.lock();
        assert_eq!(surface.pixel(2, 2), Some(0xFF_FF_00_00));
        assert_eq!(surface.pixel(4, 4), Some(0xFF_FF_00_00));
        assert_eq!(surface.pixel(5, 5), Some(0));
        assert_eq!(surface.pixel(1, 1), Some(0));
    }

    #[test]
    fn test_save_restore_reverts_state() {
        let mut ctx = DrawContext::new(target(10, 10));
        ctx.save();
        ctx.translate(4, 5);
        ctx.clip_device(Rect::new(1, 1, 2, 2));
        ctx.set_operator(Operator::Source);
        assert_eq!(ctx.depth(), 1);

        assert!(ctx.restore());
        assert_eq!(ctx.translation(), IVec2::ZERO);
        assert_eq!(ctx.clip_extents(), Rect::new(0, 0, 10, 10));
        assert_eq!(ctx.operator(), Operator::Over);
        assert!(!ctx.restore());
    }

    #[test]
    fn test_composite_sub_rect() {
        let mut source = Surface::new(PixelFormat::Argb32, 4, 4);
        source.set_pixel(2, 3, 0xFF_00_00_FF);

        let dest = target(10, 10);
        let mut ctx = DrawContext::new(dest.clone());
        ctx.composite(&source, 5, 5, Rect::new(2, 2, 2, 2));

        let dest = dest.lock();
        assert_eq!(dest.pixel(5, 6), Some(0xFF_00_00_FF));
        assert_eq!(dest.pixel(5, 5), Some(0));
    }

    #[test]
    fn test_composite_onto_self() {
        let surface = target(4, 1);
        surface.lock().set_pixel(0, 0, 0xFF_00_FF_00);
        let mut ctx = DrawContext::new(surface.clone());
        ctx.composite_shared(&surface.clone(), 2, 0, Rect::new(0, 0, 2, 1));
        assert_eq!(surface.lock().pixel(2, 0), Some(0xFF_00_FF_00));
    }
}
