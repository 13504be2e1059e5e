//! The video driver boundary.
//!
//! A [`VideoDriver`] puts pixels on one physical output. Viewports only talk
//! to drivers through this trait: they ask for the output size, bracket each
//! redraw pass with [`begin_updates`](VideoDriver::begin_updates) /
//! [`end_updates`](VideoDriver::end_updates), and request one [`Renderer`]
//! per damaged rectangle.
//!
//! [`FramebufferDriver`] is an in-memory driver backed by a software
//! framebuffer, used for headless outputs and tests.

use std::sync::Arc;

use horizon_compositor_core::logging::targets;
use horizon_compositor_render::{Buffer, Color, PixelFormat, Rect, Renderer, Surface, SurfaceBackend};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{CompositorError, CompositorResult};

/// An argument or result of a driver's [`special`](VideoDriver::special) call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Value {
    /// The driver does not understand the request.
    #[default]
    Unsupported,
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
    Tuple(Vec<Value>),
}

impl Value {
    /// Whether this is the "unsupported" sentinel.
    #[inline]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Value::Unsupported)
    }

    /// The string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The integer payload, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// One physical output.
pub trait VideoDriver {
    /// Output size in device pixels. Non-positive values mean "unknown".
    fn pixel_dimensions(&self) -> (i32, i32);

    /// Start a batch of renderer passes.
    fn begin_updates(&mut self) {}

    /// Finish the current batch and present it.
    fn end_updates(&mut self) {}

    /// A renderer whose baseline region is `rect`, in device pixels.
    ///
    /// Returning `None` drops the redraw for this rectangle.
    fn renderer(&mut self, rect: Rect) -> Option<Renderer>;

    /// Resolutions the output can switch to.
    fn resolutions(&self) -> Vec<(i32, i32)> {
        vec![self.pixel_dimensions()]
    }

    /// Switch the output resolution.
    fn set_resolution(&mut self, width: i32, height: i32) -> CompositorResult<()> {
        Err(CompositorError::UnsupportedResolution { width, height })
    }

    /// Backend-specific extension point.
    fn special(&mut self, _args: &[Value]) -> Value {
        Value::Unsupported
    }

    /// Set or clear the pointer image, with its hot spot relative to the image.
    fn set_pointer(&mut self, _image: Option<&Buffer>, _hot_x: i32, _hot_y: i32) {}
}

/// A video driver shared between the viewports bound to it.
pub type SharedVideoDriver = Arc<Mutex<dyn VideoDriver>>;

/// Configuration for a [`FramebufferDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramebufferConfig {
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// Framebuffer pixel format.
    pub format: PixelFormat,
    /// Sizes accepted by `set_resolution`. The initial size is always accepted.
    pub resolutions: Vec<(i32, i32)>,
}

impl FramebufferConfig {
    /// Create a config with the given dimensions.
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Set the framebuffer pixel format.
    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    /// Add a resolution the driver may switch to.
    pub fn with_resolution(mut self, width: i32, height: i32) -> Self {
        self.resolutions.push((width, height));
        self
    }
}

impl Default for FramebufferConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            format: PixelFormat::Argb32,
            resolutions: Vec::new(),
        }
    }
}

/// Pointer image installed on a [`FramebufferDriver`].
#[derive(Debug, Clone)]
pub struct PointerImage {
    pub surface: Arc<Mutex<Surface>>,
    pub hot_x: i32,
    pub hot_y: i32,
}

/// An in-memory video driver rendering into a software framebuffer.
#[derive(Debug)]
pub struct FramebufferDriver {
    framebuffer: Arc<Mutex<Surface>>,
    resolutions: Vec<(i32, i32)>,
    batch_depth: u32,
    update_count: u64,
    pointer: Option<PointerImage>,
}

impl FramebufferDriver {
    /// Create a driver and allocate its framebuffer.
    pub fn new(config: FramebufferConfig) -> Self {
        let mut resolutions = vec![(config.width, config.height)];
        for size in config.resolutions {
            if !resolutions.contains(&size) {
                resolutions.push(size);
            }
        }
        Self {
            framebuffer: Arc::new(Mutex::new(Surface::new(
                config.format,
                config.width,
                config.height,
            ))),
            resolutions,
            batch_depth: 0,
            update_count: 0,
            pointer: None,
        }
    }

    /// Wrap the driver for sharing with viewports.
    pub fn shared(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }

    /// The framebuffer renderers draw into.
    pub fn framebuffer(&self) -> &Arc<Mutex<Surface>> {
        &self.framebuffer
    }

    /// Number of completed update batches.
    #[inline]
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    /// Whether a batch is open.
    #[inline]
    pub fn is_updating(&self) -> bool {
        self.batch_depth > 0
    }

    /// The installed pointer image.
    pub fn pointer(&self) -> Option<&PointerImage> {
        self.pointer.as_ref()
    }
}

impl VideoDriver for FramebufferDriver {
    fn pixel_dimensions(&self) -> (i32, i32) {
        self.framebuffer.lock().size()
    }

    fn begin_updates(&mut self) {
        self.batch_depth += 1;
    }

    fn end_updates(&mut self) {
        match self.batch_depth {
            0 => warn!(target: targets::VIDEO, "end_updates without begin_updates"),
            1 => {
                self.batch_depth = 0;
                self.update_count += 1;
                trace!(target: targets::VIDEO, batch = self.update_count, "framebuffer updated");
            }
            _ => self.batch_depth -= 1,
        }
    }

    fn renderer(&mut self, rect: Rect) -> Option<Renderer> {
        let bounds = self.framebuffer.lock().bounds();
        let visible = rect.intersection(&bounds);
        if visible.is_empty() {
            debug!(target: targets::VIDEO, ?rect, "renderer requested outside framebuffer");
            return None;
        }
        Some(SurfaceBackend::renderer(self.framebuffer.clone(), visible))
    }

    fn resolutions(&self) -> Vec<(i32, i32)> {
        self.resolutions.clone()
    }

    fn set_resolution(&mut self, width: i32, height: i32) -> CompositorResult<()> {
        if !self.resolutions.contains(&(width, height)) {
            warn!(target: targets::VIDEO, width, height, "unsupported resolution");
            return Err(CompositorError::UnsupportedResolution { width, height });
        }
        self.framebuffer.lock().resize(width, height);
        debug!(target: targets::VIDEO, width, height, "resolution changed");
        Ok(())
    }

    /// Understands `("clear", argb)`, `("update-count",)` and `("format",)`.
    fn special(&mut self, args: &[Value]) -> Value {
        match args {
            [Value::Str(cmd), Value::Int(argb)] if cmd == "clear" => {
                let color = Color::from_argb32(*argb as u32);
                self.framebuffer.lock().clear(color);
                Value::Nil
            }
            [Value::Str(cmd)] if cmd == "update-count" => Value::Int(self.update_count as i64),
            [Value::Str(cmd)] if cmd == "format" => {
                Value::Str(format!("{:?}", self.framebuffer.lock().format()))
            }
            _ => Value::Unsupported,
        }
    }

    fn set_pointer(&mut self, image: Option<&Buffer>, hot_x: i32, hot_y: i32) {
        self.pointer = image.map(|buffer| PointerImage {
            surface: buffer.surface().clone(),
            hot_x,
            hot_y,
        });
    }
}
