//! The widget tree's render entry point.

use horizon_compositor_render::{BufferStore, Renderer};

/// Something that can render itself during a redraw pass.
///
/// The renderer arrives with its current region covering the damaged area in
/// desktop coordinates. Implementations must leave every region they enter,
/// including on early returns.
pub trait RenderTree {
    /// Render into `renderer`, reading widget buffers from `buffers`.
    fn render(&mut self, renderer: &mut Renderer, buffers: &BufferStore);
}

impl<F> RenderTree for F
where
    F: FnMut(&mut Renderer, &BufferStore),
{
    fn render(&mut self, renderer: &mut Renderer, buffers: &BufferStore) {
        self(renderer, buffers)
    }
}
