use mizu_kernel::Frame;
use std::fmt::Write;
use tracing::trace;

use crate::surface::{AsciiCanvas, DrawSurface};

/// Walks a frame and issues draw calls on a surface.
///
/// One `clear`, then every hydrogen, every oxygen and every droplet, each
/// population in slot order.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameRenderer;

impl FrameRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn draw<S: DrawSurface + ?Sized>(&self, frame: &Frame<'_>, surface: &mut S) {
        surface.clear(frame.bounds);
        for p in frame.hydrogen.iter().chain(frame.oxygen) {
            surface.draw_atom(p.label(), p.position, p.size());
        }
        for d in frame.water {
            surface.draw_droplet(d.position, d.size());
        }
        trace!(tick = frame.tick, calls = frame.len() + 1, "frame drawn");
    }
}

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// A renderer reads a borrowed frame and produces output; it never touches
/// the world.
pub trait Renderer {
    type Output;

    fn render(&self, frame: &Frame<'_>) -> Self::Output;
}

/// Human-readable listing of every particle in a frame.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, frame: &Frame<'_>) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== Frame (tick={}, bounds={}) ===",
            frame.tick, frame.bounds
        );
        let _ = writeln!(
            out,
            "H: {}  O: {}  H2O: {}",
            frame.hydrogen.len(),
            frame.oxygen.len(),
            frame.water.len()
        );
        for p in frame.iter() {
            let _ = writeln!(
                out,
                "  {:<3} pos=({:.2}, {:.2}) size={:.2}",
                p.label(),
                p.position.x,
                p.position.y,
                p.size()
            );
        }
        out
    }
}

/// Draws frames onto a fresh [`AsciiCanvas`] of the given size.
#[derive(Debug, Clone, Copy)]
pub struct AsciiRenderer {
    pub cols: usize,
    pub rows: usize,
}

impl Default for AsciiRenderer {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

impl AsciiRenderer {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self { cols, rows }
    }
}

impl Renderer for AsciiRenderer {
    type Output = String;

    fn render(&self, frame: &Frame<'_>) -> String {
        let mut canvas = AsciiCanvas::new(self.cols, self.rows);
        FrameRenderer::new().draw(frame, &mut canvas);
        canvas.to_string()
    }
}
