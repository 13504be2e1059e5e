//! Region algebra, pixel buffers, painters and renderers for Horizon Compositor.
//!
//! This crate is the compositing layer of the display server. It tracks which
//! parts of the screen are stale, keeps the pixel surfaces widgets paint into,
//! and walks nested clip/translation regions while compositing those surfaces
//! onto an output.
//!
//! # Rectangle Algebra
//!
//! The [`rect`] module holds the geometric primitives everything else builds on:
//!
//! ```
//! use horizon_compositor_render::rect::{self, Rect};
//!
//! let (overlap, hit) = rect::intersect(&Rect::new(0, 0, 30, 30), &Rect::new(10, 10, 30, 30));
//! assert!(hit);
//! assert_eq!(overlap, Rect::new(10, 10, 20, 20));
//!
//! let mut damage = vec![Rect::new(0, 0, 50, 50), Rect::new(25, 25, 50, 50)];
//! rect::union_overlaps(&mut damage);
//! assert_eq!(damage, vec![Rect::new(0, 0, 75, 75)]);
//! ```
//!
//! # Painting Into Buffers
//!
//! Buffers and the painters open on them live in a [`BufferStore`]:
//!
//! ```
//! use horizon_compositor_render::{BufferStore, Color, PixelFormat, Rect};
//!
//! let mut store = BufferStore::new();
//! let buffer = store.create_buffer(PixelFormat::Argb32, 64, 64);
//! let painter = store.get_painter(buffer).unwrap();
//!
//! let p = store.painter_mut(painter).unwrap();
//! p.save();
//! p.set_origin_local(8, 8);
//! p.clip_local(Rect::new(0, 0, 16, 16));
//! p.fill_rectangle_local(Color::RED, Rect::new(0, 0, 100, 100));
//! p.restore().unwrap();
//!
//! store.destroy_painter(painter).unwrap();
//! ```
//!
//! # Compositing
//!
//! A [`Renderer`] drives one redraw pass over a [`RenderBackend`]. The
//! [`SurfaceBackend`] composites directly into a pixel surface:
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use horizon_compositor_render::{Buffer, Color, PixelFormat, Rect, Surface, SurfaceBackend};
//!
//! let framebuffer = Arc::new(Mutex::new(Surface::new(PixelFormat::Argb32, 320, 240)));
//! let mut renderer = SurfaceBackend::renderer(framebuffer.clone(), Rect::new(0, 0, 320, 240));
//!
//! renderer.draw_filled_rectangle(Color::WHITE, 0, 0, 320, 240);
//! if renderer.enter(Rect::new(100, 100, 50, 50), 100, 100) {
//!     let icon = Buffer::new(PixelFormat::Argb32, 16, 16);
//!     renderer.render_buffer(&icon, 4, 4);
//!     renderer.leave().unwrap();
//! }
//! let stats = renderer.complete();
//! assert_eq!(stats.fills, 1);
//! ```

mod buffer;
mod color;
mod context;
mod damage;
mod error;
mod painter;
pub mod rect;
mod renderer;
mod software_renderer;
mod surface;

pub use buffer::{Buffer, BufferId, BufferStore, PainterId};
pub use color::Color;
pub use context::{DrawContext, Operator};
pub use damage::DamageBuffer;
pub use error::{RenderError, RenderResult};
pub use painter::{OwnerId, Painter, PainterState};
pub use rect::Rect;
pub use renderer::{RenderBackend, RenderPhase, RenderRegion, RenderStats, Renderer};
pub use software_renderer::SurfaceBackend;
pub use surface::{PixelFormat, Surface};
