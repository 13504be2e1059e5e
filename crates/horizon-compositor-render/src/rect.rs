//! Integer rectangle algebra.
//!
//! Damage tracking and clipping are built on four operations:
//!
//! - [`intersect`]: overlap of two rectangles, treating touching edges as intersecting
//! - [`union`]: bounding box of two rectangles plus an "is merging worthwhile" hint
//! - [`union_overlaps`]: collapse a list until no two entries overlap
//! - [`intersect_with`]: pairwise cross-intersection of two lists
//!
//! All operations are total: zero-area rectangles are valid inputs and produce
//! well-defined (possibly empty) outputs. Far edges saturate at `i32::MAX` and
//! extents are computed in `i64` before being clamped back into range.

/// An axis-aligned rectangle in integer coordinates.
///
/// Width and height are expected to be non-negative; no normalization is
/// performed on negative extents.
///
/// # Example
///
/// ```
/// use horizon_compositor_render::Rect;
///
/// let a = Rect::new(0, 0, 30, 30);
/// let b = Rect::new(10, 10, 30, 30);
/// assert_eq!(a.intersection(&b), Rect::new(10, 10, 20, 20));
/// assert!(a.intersects(&b));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Empty rectangle at the origin.
    pub const ZERO: Self = Self {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle at the origin with the given size.
    #[inline]
    pub const fn from_size(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Right edge (exclusive), saturating at the `i32` bounds.
    #[inline]
    pub const fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    /// Bottom edge (exclusive), saturating at the `i32` bounds.
    #[inline]
    pub const fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Area in pixels, widened so large rectangles cannot overflow.
    #[inline]
    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// Check if the rectangle covers no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Check if a point lies inside the rectangle.
    #[inline]
    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Check if `other` lies entirely within this rectangle.
    #[inline]
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Return this rectangle moved by `(dx, dy)`, saturating at the `i32` bounds.
    #[inline]
    pub const fn translated(&self, dx: i32, dy: i32) -> Self {
        Self::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    /// Overlap with `other`, clamped to a non-negative (possibly empty) extent.
    #[inline]
    pub fn intersection(&self, other: &Rect) -> Rect {
        intersect(self, other).0
    }

    /// Whether the rectangles overlap or touch.
    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        intersect(self, other).1
    }

    /// Bounding box of both rectangles.
    #[inline]
    pub fn union(&self, other: &Rect) -> Rect {
        union(self, other).0
    }
}

impl From<(i32, i32, i32, i32)> for Rect {
    fn from((x, y, width, height): (i32, i32, i32, i32)) -> Self {
        Self::new(x, y, width, height)
    }
}

/// Intersect two rectangles.
///
/// The origin of the result is the larger of the two origins; its extent runs
/// to the smaller of the two far edges, clamped to zero when they do not
/// overlap. The flag is `true` when the far edges are at or beyond the origin,
/// so rectangles sharing only an edge count as intersecting (with a
/// zero-width or zero-height result).
pub fn intersect(a: &Rect, b: &Rect) -> (Rect, bool) {
    let x = a.x.max(b.x);
    let y = a.y.max(b.y);
    let right = a.right().min(b.right());
    let bottom = a.bottom().min(b.bottom());

    let rect = Rect::new(x, y, extent(x, right), extent(y, bottom));
    (rect, right >= x && bottom >= y)
}

/// Compute the bounding box of two rectangles.
///
/// The flag reports whether painting the union costs no more than painting
/// both originals (`union.area <= a.area + b.area`). It is a heuristic for
/// whether merging is worthwhile, not a correctness gate.
pub fn union(a: &Rect, b: &Rect) -> (Rect, bool) {
    let x = a.x.min(b.x);
    let y = a.y.min(b.y);
    let right = a.right().max(b.right());
    let bottom = a.bottom().max(b.bottom());

    let rect = Rect::new(x, y, extent(x, right), extent(y, bottom));
    let worthwhile = rect.area() <= a.area() + b.area();
    (rect, worthwhile)
}

/// Distance from `start` to `end`, clamped to `0..=i32::MAX`.
#[inline]
fn extent(start: i32, end: i32) -> i32 {
    (i64::from(end) - i64::from(start)).clamp(0, i64::from(i32::MAX)) as i32
}

/// Merge intersecting rectangles in place until no two entries intersect.
///
/// Pairs are compared in list order. When `rects[i]` intersects `rects[j]`
/// (`j > i`), `rects[i]` becomes their union and `rects[j]` is removed; the
/// scan repeats until a full pass makes no change.
pub fn union_overlaps(rects: &mut Vec<Rect>) {
    loop {
        let mut merged = false;
        let mut i = 0;
        while i < rects.len() {
            let mut j = i + 1;
            while j < rects.len() {
                if rects[i].intersects(&rects[j]) {
                    let other = rects.remove(j);
                    rects[i] = rects[i].union(&other);
                    merged = true;
                    // rects[i] grew, so earlier candidates may now overlap it.
                    j = i + 1;
                } else {
                    j += 1;
                }
            }
            i += 1;
        }
        if !merged {
            break;
        }
    }
}

/// Cross-intersect two rectangle lists, keeping only non-empty overlaps.
pub fn intersect_with(a: &[Rect], b: &[Rect]) -> Vec<Rect> {
    a.iter()
        .flat_map(|ra| b.iter().map(move |rb| ra.intersection(rb)))
        .filter(|r| !r.is_empty())
        .collect()
}
