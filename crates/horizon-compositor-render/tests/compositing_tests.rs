//! Integration tests for painting into buffers and compositing them onto a
//! framebuffer through the software renderer.

use std::sync::Arc;

use horizon_compositor_render::{
    rect, Buffer, BufferStore, Color, PixelFormat, Rect, RenderError, Surface, SurfaceBackend,
};
use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

fn framebuffer(width: i32, height: i32) -> Arc<Mutex<Surface>> {
    Arc::new(Mutex::new(Surface::new(PixelFormat::Argb32, width, height)))
}

#[test]
fn test_paint_then_composite() {
    let mut store = BufferStore::new();
    let widget = store.create_buffer(PixelFormat::Argb32, 20, 20);

    // Paint a red square into the middle of the widget buffer.
    let painter = store.get_painter(widget).unwrap();
    {
        let p = store.painter_mut(painter).unwrap();
        p.set_origin_local(5, 5);
        p.clip_local(Rect::new(0, 0, 10, 10));
        p.fill_rectangle_local(Color::RED, Rect::new(-100, -100, 1000, 1000));
    }
    store.destroy_painter(painter).unwrap();

    let fb = framebuffer(100, 100);
    let mut renderer = SurfaceBackend::renderer(fb.clone(), Rect::new(0, 0, 100, 100));
    assert!(renderer.enter(Rect::new(40, 40, 20, 20), 40, 40));
    renderer.render_buffer(store.buffer(widget).unwrap(), 0, 0);
    renderer.leave().unwrap();
    let stats = renderer.complete();
    assert_eq!(stats.blits, 1);
    assert_eq!(stats.skipped, 0);

    let fb = fb.lock();
    assert_eq!(fb.pixel(45, 45), Some(0xFF_FF_00_00));
    assert_eq!(fb.pixel(54, 54), Some(0xFF_FF_00_00));
    assert_eq!(fb.pixel(44, 44), Some(0));
    assert_eq!(fb.pixel(55, 55), Some(0));
}

#[test]
fn test_nested_regions_clip_children() {
    let fb = framebuffer(50, 50);
    let mut renderer = SurfaceBackend::renderer(fb.clone(), Rect::new(0, 0, 50, 50));

    // Container at (10, 10) sized 10x10; its child overflows to the right.
    assert!(renderer.enter(Rect::new(10, 10, 10, 10), 10, 10));
    renderer.draw_filled_rectangle(Color::BLUE, 0, 0, 10, 10);
    assert!(renderer.enter(Rect::new(5, 0, 20, 5), 5, 0));
    renderer.draw_filled_rectangle(Color::GREEN, 0, 0, 20, 5);
    renderer.leave().unwrap();
    renderer.leave().unwrap();
    renderer.complete();

    let fb = fb.lock();
    assert_eq!(fb.pixel(16, 10), Some(0xFF_00_FF_00));
    assert_eq!(fb.pixel(19, 14), Some(0xFF_00_FF_00));
    // Clipped by the container.
    assert_eq!(fb.pixel(20, 10), Some(0));
    assert_eq!(fb.pixel(12, 17), Some(0xFF_00_00_FF));
}

#[test]
fn test_unbalanced_leave_is_reported() {
    let fb = framebuffer(10, 10);
    let mut renderer = SurfaceBackend::renderer(fb, Rect::new(0, 0, 10, 10));
    assert_eq!(renderer.leave(), Err(RenderError::RegionUnderflow));
    assert_eq!(renderer.depth(), 1);
    renderer.complete();
}

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn test_stack_misuse_is_logged() {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(capture.clone())
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let mut renderer = SurfaceBackend::renderer(framebuffer(10, 10), Rect::new(0, 0, 10, 10));
        assert_eq!(renderer.leave(), Err(RenderError::RegionUnderflow));
        renderer.complete();

        let mut store = BufferStore::new();
        let id = store.create_buffer(PixelFormat::A8, 4, 4);
        let painter = store.get_painter(id).unwrap();
        let p = store.painter_mut(painter).unwrap();
        assert_eq!(p.restore(), Err(RenderError::PainterStackUnderflow));
    });

    let logs = String::from_utf8_lossy(&capture.0.lock()).into_owned();
    assert!(logs.contains("unmatched renderer leave"), "{logs}");
    assert!(logs.contains("horizon_compositor_render::renderer"), "{logs}");
    assert!(logs.contains("painter restore without matching save"), "{logs}");
    assert!(!logs.contains("renderer destroyed without complete"), "{logs}");
}

#[test]
fn test_resize_requires_closed_painters() {
    let mut store = BufferStore::new();
    let id = store.create_buffer(PixelFormat::Rgb24, 10, 10);
    let painter = store.get_painter(id).unwrap();

    let err = store.buffer_mut(id).unwrap().set_size(20, 20).unwrap_err();
    assert_eq!(err, RenderError::PaintersOpen { count: 1 });

    store.destroy_painter(painter).unwrap();
    let buffer = store.buffer_mut(id).unwrap();
    buffer.begin_resize(200, 200).unwrap();
    buffer.set_size(50, 40).unwrap();
    buffer.set_size(120, 80).unwrap();
    buffer.end_resize().unwrap();
    assert_eq!(buffer.size(), (120, 80));
    assert_eq!(buffer.depth(), 24);
}

#[test]
fn test_destroying_buffer_destroys_painters() {
    let mut store = BufferStore::new();
    let id = store.create_buffer(PixelFormat::A8, 8, 8);
    let first = store.get_painter(id).unwrap();
    let second = store.get_painter(id).unwrap();
    assert_eq!(store.painter_count(), 2);

    store.destroy_buffer(id).unwrap();
    assert_eq!(store.painter_count(), 0);
    assert!(store.painter(first).is_none());
    assert!(store.painter(second).is_none());
    assert_eq!(store.destroy_painter(first), Err(RenderError::InvalidPainter));
}

#[test]
fn test_damage_to_device_rects() {
    let damage = vec![
        Rect::new(0, 0, 50, 50),
        Rect::new(25, 25, 50, 50),
        Rect::new(300, 300, 10, 10),
    ];
    let outputs = [Rect::new(0, 0, 40, 40), Rect::new(290, 290, 100, 100)];

    let mut merged = damage;
    rect::union_overlaps(&mut merged);
    assert_eq!(merged.len(), 2);

    let visible = rect::intersect_with(&merged, &outputs);
    assert_eq!(visible, vec![Rect::new(0, 0, 40, 40), Rect::new(300, 300, 10, 10)]);
}

#[test]
fn test_capture_framebuffer_png() {
    let fb = framebuffer(16, 16);
    let buffer = Buffer::new(PixelFormat::Argb32, 8, 8);
    buffer.surface().lock().clear(Color::from_rgb8(10, 20, 30));

    let mut renderer = SurfaceBackend::renderer(fb.clone(), Rect::new(0, 0, 16, 16));
    renderer.copy_buffer(&buffer, 4, 4);
    renderer.complete();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    fb.lock().save_png(&path).unwrap();

    let image = image::open(&path).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (16, 16));
    assert_eq!(image.get_pixel(5, 5).0, [10, 20, 30, 255]);
    assert_eq!(image.get_pixel(0, 0).0[3], 0);
}
