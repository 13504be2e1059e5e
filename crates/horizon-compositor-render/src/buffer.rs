//! Pixel buffers and the arena that owns them together with their painters.
//!
//! Buffers and painters reference each other: a painter draws into exactly one
//! buffer, and a buffer keeps the list of painters currently open on it so it
//! can tear them down before it goes away. Both live in a [`BufferStore`] and
//! refer to each other through [`BufferId`] / [`PainterId`] handles that are
//! validated on every use.
//!
//! # Example
//!
//! ```
//! use horizon_compositor_render::{BufferStore, Color, PixelFormat, Rect};
//!
//! let mut store = BufferStore::new();
//! let buffer = store.create_buffer(PixelFormat::Argb32, 64, 32);
//!
//! let painter = store.get_painter(buffer).unwrap();
//! store
//!     .painter_mut(painter)
//!     .unwrap()
//!     .fill_rectangle_local(Color::RED, Rect::new(0, 0, 8, 8));
//! store.destroy_painter(painter).unwrap();
//!
//! // Resizing is only allowed once no painters are open.
//! store.buffer_mut(buffer).unwrap().set_size(128, 32).unwrap();
//! ```

use std::sync::Arc;

use horizon_compositor_core::logging::targets;
use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};
use tracing::{debug, error, trace};

use crate::error::{RenderError, RenderResult};
use crate::painter::Painter;
use crate::surface::{PixelFormat, Surface};

new_key_type! {
    /// Handle to a buffer in a [`BufferStore`].
    pub struct BufferId;

    /// Handle to a painter in a [`BufferStore`].
    pub struct PainterId;
}

/// A pixel surface plus the set of painters open on it.
pub struct Buffer {
    format: PixelFormat,
    width: i32,
    height: i32,
    surface: Arc<Mutex<Surface>>,
    painters: Vec<PainterId>,
    /// Largest expected size while a resize bracket is open.
    resize_hint: Option<(i32, i32)>,
}

impl Buffer {
    /// Allocate a buffer. Negative dimensions are treated as zero.
    pub fn new(format: PixelFormat, width: i32, height: i32) -> Self {
        let surface = Surface::new(format, width, height);
        let (width, height) = surface.size();
        Self {
            format,
            width,
            height,
            surface: Arc::new(Mutex::new(surface)),
            painters: Vec::new(),
            resize_hint: None,
        }
    }

    /// The pixel format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bits per pixel of the buffer's format.
    #[inline]
    pub fn depth(&self) -> u32 {
        self.format.depth()
    }

    /// Current size as `(width, height)`.
    #[inline]
    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    /// The backing surface.
    #[inline]
    pub fn surface(&self) -> &Arc<Mutex<Surface>> {
        &self.surface
    }

    /// Painters currently open on this buffer.
    #[inline]
    pub fn painters(&self) -> &[PainterId] {
        &self.painters
    }

    /// Whether a `begin_resize`/`end_resize` bracket is open.
    #[inline]
    pub fn is_resizing(&self) -> bool {
        self.resize_hint.is_some()
    }

    /// Resize the buffer.
    ///
    /// Painters hold clip state derived from the old size, so resizing with
    /// painters open is refused.
    pub fn set_size(&mut self, width: i32, height: i32) -> RenderResult<()> {
        if !self.painters.is_empty() {
            error!(
                target: targets::BUFFER,
                open = self.painters.len(),
                "refusing to resize buffer with open painters"
            );
            return Err(RenderError::PaintersOpen {
                count: self.painters.len(),
            });
        }

        let mut surface = self.surface.lock();
        surface.resize(width, height);
        (self.width, self.height) = surface.size();
        trace!(target: targets::BUFFER, width = self.width, height = self.height, "buffer resized");
        Ok(())
    }

    /// Open a resize bracket, pre-allocating for sizes up to `max_width` x `max_height`.
    ///
    /// Brackets do not nest.
    pub fn begin_resize(&mut self, max_width: i32, max_height: i32) -> RenderResult<()> {
        if self.resize_hint.is_some() {
            error!(target: targets::BUFFER, "begin_resize called while a resize is in progress");
            return Err(RenderError::ResizeInProgress);
        }
        self.surface.lock().reserve(max_width, max_height);
        self.resize_hint = Some((max_width, max_height));
        debug!(target: targets::BUFFER, max_width, max_height, "resize bracket opened");
        Ok(())
    }

    /// Close the resize bracket and release storage beyond the final size.
    pub fn end_resize(&mut self) -> RenderResult<()> {
        if self.resize_hint.take().is_none() {
            error!(target: targets::BUFFER, "end_resize called without begin_resize");
            return Err(RenderError::NoResizeInProgress);
        }
        self.surface.lock().shrink_to_fit();
        debug!(target: targets::BUFFER, width = self.width, height = self.height, "resize bracket closed");
        Ok(())
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("painters", &self.painters.len())
            .field("resizing", &self.resize_hint.is_some())
            .finish()
    }
}

/// Arena owning buffers and the painters open on them.
#[derive(Default)]
pub struct BufferStore {
    buffers: SlotMap<BufferId, Buffer>,
    painters: SlotMap<PainterId, Painter>,
}

impl BufferStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new buffer.
    pub fn create_buffer(&mut self, format: PixelFormat, width: i32, height: i32) -> BufferId {
        self.insert_buffer(Buffer::new(format, width, height))
    }

    /// Take ownership of an existing buffer (e.g. one produced by an image loader).
    pub fn insert_buffer(&mut self, buffer: Buffer) -> BufferId {
        let id = self.buffers.insert(buffer);
        trace!(target: targets::BUFFER, ?id, "buffer created");
        id
    }

    /// Look up a buffer.
    #[inline]
    pub fn buffer(&self, id: BufferId) -> Option<&Buffer> {
        self.buffers.get(id)
    }

    /// Look up a buffer mutably.
    #[inline]
    pub fn buffer_mut(&mut self, id: BufferId) -> Option<&mut Buffer> {
        self.buffers.get_mut(id)
    }

    /// Open a painter on a buffer.
    ///
    /// The painter starts with its origin at the buffer's top-left corner
    /// and its clip set to the whole buffer.
    pub fn get_painter(&mut self, buffer_id: BufferId) -> RenderResult<PainterId> {
        let buffer = self
            .buffers
            .get_mut(buffer_id)
            .ok_or(RenderError::InvalidBuffer)?;

        let mut painter = Painter::new();
        painter.attach(buffer_id, buffer);
        let id = self.painters.insert(painter);
        buffer.painters.push(id);
        trace!(target: targets::PAINTER, painter = ?id, buffer = ?buffer_id, "painter opened");
        Ok(id)
    }

    /// Look up a painter.
    #[inline]
    pub fn painter(&self, id: PainterId) -> Option<&Painter> {
        self.painters.get(id)
    }

    /// Look up a painter mutably.
    #[inline]
    pub fn painter_mut(&mut self, id: PainterId) -> Option<&mut Painter> {
        self.painters.get_mut(id)
    }

    /// Destroy a painter and detach it from its buffer.
    pub fn destroy_painter(&mut self, id: PainterId) -> RenderResult<()> {
        let painter = self.painters.remove(id).ok_or(RenderError::InvalidPainter)?;
        if let Some(buffer) = painter.buffer().and_then(|b| self.buffers.get_mut(b)) {
            buffer.painters.retain(|p| *p != id);
        }
        trace!(target: targets::PAINTER, painter = ?id, "painter destroyed");
        Ok(())
    }

    /// Force-destroy every painter open on a buffer. Returns how many were destroyed.
    pub fn destroy_all_painters(&mut self, buffer_id: BufferId) -> RenderResult<usize> {
        let buffer = self
            .buffers
            .get_mut(buffer_id)
            .ok_or(RenderError::InvalidBuffer)?;

        // Work from a private copy so teardown never observes a half-edited list.
        let open = std::mem::take(&mut buffer.painters);
        let count = open.len();
        for id in open {
            self.painters.remove(id);
        }
        if count > 0 {
            debug!(target: targets::BUFFER, buffer = ?buffer_id, count, "destroyed open painters");
        }
        Ok(count)
    }

    /// Destroy a buffer, destroying its painters first.
    pub fn destroy_buffer(&mut self, id: BufferId) -> RenderResult<()> {
        self.destroy_all_painters(id)?;
        self.buffers.remove(id);
        trace!(target: targets::BUFFER, ?id, "buffer destroyed");
        Ok(())
    }

    /// Number of live buffers.
    #[inline]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Number of live painters.
    #[inline]
    pub fn painter_count(&self) -> usize {
        self.painters.len()
    }

    /// Iterate over all live buffers.
    pub fn iter(&self) -> impl Iterator<Item = (BufferId, &Buffer)> {
        self.buffers.iter()
    }
}
