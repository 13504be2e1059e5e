//! Pixel surfaces in the four supported device formats.
//!
//! A [`Surface`] is the pixel store behind every buffer and every video
//! framebuffer. Rows are padded to a 4-byte stride and the storage is kept
//! as 32-bit words so it can be viewed as bytes without alignment concerns.
//!
//! All pixel access is normalised to premultiplied `0xAARRGGBB`:
//!
//! | Format | Stored as | Read back as |
//! |--------|-----------|--------------|
//! | ARGB32 | premultiplied word | as stored |
//! | RGB24  | word, top byte unused | alpha forced to `0xFF` |
//! | A8     | one byte per pixel | `alpha << 24` |
//! | A1     | one bit per pixel, LSB first | `0xFF000000` or `0` |

use std::path::Path;

use image::RgbaImage;

use crate::color::Color;
use crate::error::{RenderError, RenderResult};
use crate::rect::Rect;

/// Device pixel formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 32-bit premultiplied ARGB.
    #[default]
    Argb32,
    /// 24-bit RGB stored in a 32-bit word.
    Rgb24,
    /// 8-bit alpha mask.
    A8,
    /// 1-bit alpha mask.
    A1,
}

impl PixelFormat {
    /// Bits per pixel.
    #[inline]
    pub const fn depth(self) -> u32 {
        match self {
            PixelFormat::Argb32 => 32,
            PixelFormat::Rgb24 => 24,
            PixelFormat::A8 => 8,
            PixelFormat::A1 => 1,
        }
    }

    /// Decode a wire-level format code (`0` = ARGB32, `1` = RGB24, `2` = A8, `3` = A1).
    pub const fn from_raw(code: u32) -> Option<Self> {
        match code {
            0 => Some(PixelFormat::Argb32),
            1 => Some(PixelFormat::Rgb24),
            2 => Some(PixelFormat::A8),
            3 => Some(PixelFormat::A1),
            _ => None,
        }
    }

    /// Bits per pixel for a wire-level format code.
    ///
    /// Unrecognized codes report 32 bits rather than failing.
    pub const fn depth_of_raw(code: u32) -> u32 {
        match Self::from_raw(code) {
            Some(format) => format.depth(),
            None => 32,
        }
    }

    /// Bytes per row for a surface of this format, padded to 4 bytes.
    pub const fn stride_for_width(self, width: i32) -> usize {
        let width = if width < 0 { 0 } else { width as usize };
        match self {
            PixelFormat::Argb32 | PixelFormat::Rgb24 => width * 4,
            PixelFormat::A8 => width.div_ceil(4) * 4,
            PixelFormat::A1 => width.div_ceil(32) * 4,
        }
    }
}

/// An owned pixel surface.
#[derive(Clone)]
pub struct Surface {
    format: PixelFormat,
    width: i32,
    height: i32,
    stride: usize,
    words: Vec<u32>,
}

impl Surface {
    /// Allocate a zero-filled (fully transparent) surface.
    ///
    /// Negative dimensions are treated as zero.
    pub fn new(format: PixelFormat, width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        let stride = format.stride_for_width(width);
        Self {
            format,
            width,
            height,
            stride,
            words: vec![0; stride / 4 * height as usize],
        }
    }

    /// The surface pixel format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Size as `(width, height)`.
    #[inline]
    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    /// The whole surface as a rectangle at the origin.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw pixel bytes, `stride * height` long.
    #[inline]
    pub fn data(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    /// Bytes currently reserved for pixel storage.
    #[inline]
    pub fn capacity_bytes(&self) -> usize {
        self.words.capacity() * 4
    }

    /// Read a pixel as premultiplied `0xAARRGGBB`.
    ///
    /// Returns `None` outside the surface.
    pub fn pixel(&self, x: i32, y: i32) -> Option<u32> {
        if !self.bounds().contains_point(x, y) {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        let row = y * self.stride;
        let pixel = match self.format {
            PixelFormat::Argb32 => self.words[row / 4 + x],
            PixelFormat::Rgb24 => self.words[row / 4 + x] | 0xFF00_0000,
            PixelFormat::A8 => (self.data()[row + x] as u32) << 24,
            PixelFormat::A1 => {
                let word = self.words[row / 4 + x / 32];
                if word & (1 << (x % 32)) != 0 { 0xFF00_0000 } else { 0 }
            }
        };
        Some(pixel)
    }

    /// Write a premultiplied `0xAARRGGBB` pixel, converting to the surface format.
    ///
    /// Writes outside the surface are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, pixel: u32) {
        if !self.bounds().contains_point(x, y) {
            return;
        }
        let (x, y) = (x as usize, y as usize);
        let row = y * self.stride;
        let alpha = pixel >> 24;
        match self.format {
            PixelFormat::Argb32 => self.words[row / 4 + x] = pixel,
            PixelFormat::Rgb24 => self.words[row / 4 + x] = pixel & 0x00FF_FFFF,
            PixelFormat::A8 => {
                let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.words);
                bytes[row + x] = alpha as u8;
            }
            PixelFormat::A1 => {
                let word = &mut self.words[row / 4 + x / 32];
                if alpha >= 0x80 {
                    *word |= 1 << (x % 32);
                } else {
                    *word &= !(1 << (x % 32));
                }
            }
        }
    }

    /// Fill the whole surface with a colour, replacing existing content.
    pub fn clear(&mut self, color: Color) {
        let pixel = color.to_premultiplied_argb32();
        for y in 0..self.height {
            for x in 0..self.width {
                self.set_pixel(x, y, pixel);
            }
        }
    }

    /// Resize the surface, preserving the overlapping top-left content.
    ///
    /// Rows are moved within the existing storage, so no allocation happens
    /// while the new size fits the capacity set by [`reserve`](Self::reserve).
    /// Newly exposed pixels read back as zero.
    pub fn resize(&mut self, width: i32, height: i32) {
        let width = width.max(0);
        let height = height.max(0);
        if (width, height) == (self.width, self.height) {
            return;
        }

        let old_words = self.stride / 4;
        let stride = self.format.stride_for_width(width);
        let new_words = stride / 4;
        let keep = old_words.min(new_words);
        let rows = self.height.min(height) as usize;
        let len = new_words * height as usize;

        if new_words > old_words {
            // Rows spread out: make room first, then move the last row first.
            if self.words.len() < len {
                self.words.resize(len, 0);
            }
            for row in (0..rows).rev() {
                let src = row * old_words;
                self.words.copy_within(src..src + keep, row * new_words);
            }
        } else {
            for row in 0..rows {
                let src = row * old_words;
                self.words.copy_within(src..src + keep, row * new_words);
            }
        }
        self.words.resize(len, 0);

        let kept_width = self.width.min(width);
        self.width = width;
        self.height = height;
        self.stride = stride;

        // Padding and moved-from rows may still hold old pixels.
        for y in 0..height {
            let from = if (y as usize) < rows { kept_width } else { 0 };
            for x in from..width {
                self.set_pixel(x, y, 0);
            }
        }
    }

    /// Reserve storage for a surface of up to `max_width` x `max_height`.
    pub fn reserve(&mut self, max_width: i32, max_height: i32) {
        let wanted = self.format.stride_for_width(max_width) / 4 * max_height.max(0) as usize;
        self.words.reserve(wanted.saturating_sub(self.words.len()));
    }

    /// Release storage beyond what the current size needs.
    pub fn shrink_to_fit(&mut self) {
        self.words.shrink_to_fit();
    }

    /// Convert to a non-premultiplied RGBA image.
    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let pixel = self.pixel(x as i32, y as i32).unwrap_or(0);
            let [r, g, b, a] = Color::from_premultiplied_argb32(pixel).to_straight();
            let byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
            image::Rgba([byte(r), byte(g), byte(b), byte(a)])
        })
    }

    /// Save the surface as a PNG file.
    pub fn save_png(&self, path: impl AsRef<Path>) -> RenderResult<()> {
        self.to_rgba_image()
            .save_with_format(path.as_ref(), image::ImageFormat::Png)
            .map_err(|e| RenderError::Capture(format!("failed to save PNG: {e}")))
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .finish()
    }
}
