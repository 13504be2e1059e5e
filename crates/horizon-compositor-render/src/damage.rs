//! Damage accumulation for deferred, coalesced repaints.
//!
//! A [`DamageBuffer`] queues invalidated rectangles between redraw passes.
//! Entries are stored exactly as reported; [`DamageBuffer::coalesce`] merges
//! overlapping entries just before a repaint so each pixel is painted once
//! per merged region.

use horizon_compositor_core::logging::targets;
use tracing::trace;

use crate::rect::{self, Rect};

/// A queue of damaged rectangles awaiting repaint.
///
/// # Example
///
/// ```
/// use horizon_compositor_render::{DamageBuffer, Rect};
///
/// let mut damage = DamageBuffer::new();
/// damage.add(Rect::new(0, 0, 50, 50));
/// damage.add(Rect::new(25, 25, 50, 50));
/// damage.coalesce();
///
/// assert_eq!(damage.rects(), &[Rect::new(0, 0, 75, 75)]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DamageBuffer {
    rects: Vec<Rect>,
}

impl DamageBuffer {
    /// Create an empty damage buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a damaged rectangle.
    pub fn add(&mut self, rect: Rect) {
        self.rects.push(rect);
    }

    /// Merge overlapping entries until none overlap.
    pub fn coalesce(&mut self) {
        let before = self.rects.len();
        rect::union_overlaps(&mut self.rects);
        trace!(target: targets::DAMAGE, before, after = self.rects.len(), "damage coalesced");
    }

    /// The queued rectangles.
    #[inline]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Whether any damage is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Number of queued rectangles.
    #[inline]
    pub fn len(&self) -> usize {
        self.rects.len()
    }

    /// Bounding box of all queued damage.
    pub fn bounds(&self) -> Option<Rect> {
        self.rects.iter().copied().reduce(|a, b| a.union(&b))
    }

    /// Drop all queued damage.
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Remove and return all queued damage.
    pub fn take(&mut self) -> Vec<Rect> {
        std::mem::take(&mut self.rects)
    }
}
