//! Viewports, video drivers and damage-driven redraw for a display server.
//!
//! This crate ties the compositing primitives of
//! [`horizon_compositor_render`] to physical outputs:
//!
//! - **Video drivers** ([`VideoDriver`]) put pixels on one output and hand out
//!   renderers; [`FramebufferDriver`] is an in-memory implementation
//! - **Viewports** ([`Viewport`]) bind a driver to a rectangle of desktop
//!   space, collect damage and run coalesced redraw passes
//! - **The screen** ([`Screen`]) owns the viewports, the widget root and the
//!   timers that trigger redraws
//!
//! # Redraw Flow
//!
//! ```text
//! widget change ──► Screen::invalidate_rectangle
//!                      │  (every overlapping viewport)
//!                      ▼
//!                Viewport damage ──► coalescing timer (one per viewport)
//!                                         │
//!                 Screen::process_timers ◄┘
//!                      │
//!                      ▼
//!        Viewport::update ──► VideoDriver::renderer ──► RenderTree::render
//! ```
//!
//! # Logging
//!
//! Every subsystem logs through `tracing` with the targets in
//! [`horizon_compositor_core::logging::targets`].

mod config;
mod error;
mod screen;
mod tree;
mod video;
mod viewport;

pub use config::CompositorConfig;
pub use error::{CompositorError, CompositorResult};
pub use screen::Screen;
pub use tree::RenderTree;
pub use video::{
    FramebufferConfig, FramebufferDriver, PointerImage, SharedVideoDriver, Value, VideoDriver,
};
pub use viewport::{GeometryListener, RedrawReport, Viewport, ViewportId};

pub use horizon_compositor_render as render;
