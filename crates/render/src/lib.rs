//! Rendering adapter: turns simulation frames into draw calls.
//!
//! # Invariants
//! - Renderers only see a borrowed [`Frame`](mizu_kernel::Frame) and can never
//!   mutate the populations.
//! - Draw order is fixed: one clear, then hydrogen, oxygen and water.
//!
//! Pixels are the surface's business. [`DrawSurface`] is the capability a
//! backend implements; [`RecordingSurface`] and [`AsciiCanvas`] are the two
//! in-tree backends.

mod renderer;
mod surface;

pub use renderer::{AsciiRenderer, DebugTextRenderer, FrameRenderer, Renderer};
pub use surface::{AsciiCanvas, DrawCall, DrawSurface, RecordingSurface};
