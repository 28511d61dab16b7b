use glam::DVec2;
use mizu_common::Bounds;
use std::fmt;

/// Drawing capability a backend exposes to the frame renderer.
///
/// Positions are simulation coordinates; `size` is the sprite extent. How
/// labels and droplets look is left entirely to the implementation.
pub trait DrawSurface {
    /// Wipe the surface and take on the simulation area for this frame.
    fn clear(&mut self, bounds: Bounds);

    /// Draw an atom label ("H", "H2", "O") with its top-left corner at
    /// `position`. Hit tests treat the same point as the atom's centre, so
    /// the drawn glyph sits offset from its collision circle.
    fn draw_atom(&mut self, label: &str, position: DVec2, size: f64);

    /// Draw a water droplet anchored at `position`.
    fn draw_droplet(&mut self, position: DVec2, size: f64);
}

/// One captured call on a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Clear(Bounds),
    Atom {
        label: String,
        position: DVec2,
        size: f64,
    },
    Droplet {
        position: DVec2,
        size: f64,
    },
}

/// Surface that keeps every call it receives.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    calls: Vec<DrawCall>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn take(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.calls)
    }
}

impl DrawSurface for RecordingSurface {
    fn clear(&mut self, bounds: Bounds) {
        self.calls.push(DrawCall::Clear(bounds));
    }

    fn draw_atom(&mut self, label: &str, position: DVec2, size: f64) {
        self.calls.push(DrawCall::Atom {
            label: label.to_owned(),
            position,
            size,
        });
    }

    fn draw_droplet(&mut self, position: DVec2, size: f64) {
        self.calls.push(DrawCall::Droplet { position, size });
    }
}

/// Fixed-size character grid. Each particle marks the cell under its
/// position; later draws overwrite earlier ones and anything outside the
/// area is dropped.
#[derive(Debug, Clone)]
pub struct AsciiCanvas {
    cols: usize,
    rows: usize,
    cells: Vec<char>,
    bounds: Option<Bounds>,
}

impl AsciiCanvas {
    const BLANK: char = '.';

    pub fn new(cols: usize, rows: usize) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            cols,
            rows,
            cells: vec![Self::BLANK; cols * rows],
            bounds: None,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Character at `(col, row)`, if inside the grid.
    pub fn get(&self, col: usize, row: usize) -> Option<char> {
        (col < self.cols && row < self.rows).then(|| self.cells[row * self.cols + col])
    }

    fn cell_of(&self, position: DVec2) -> Option<usize> {
        let bounds = self.bounds?;
        let fx = position.x / bounds.width();
        let fy = position.y / bounds.height();
        if !(0.0..1.0).contains(&fx) || !(0.0..1.0).contains(&fy) {
            return None;
        }
        let col = (fx * self.cols as f64) as usize;
        let row = (fy * self.rows as f64) as usize;
        Some(row * self.cols + col)
    }

    fn plot(&mut self, position: DVec2, glyph: char) {
        if let Some(i) = self.cell_of(position) {
            self.cells[i] = glyph;
        }
    }
}

/// Free hydrogen is lowercase so a bonded pair stands out.
fn atom_glyph(label: &str) -> char {
    match label {
        "H" => 'h',
        "H2" => 'H',
        other => other.chars().next().unwrap_or('?'),
    }
}

impl DrawSurface for AsciiCanvas {
    fn clear(&mut self, bounds: Bounds) {
        self.cells.fill(Self::BLANK);
        self.bounds = Some(bounds);
    }

    fn draw_atom(&mut self, label: &str, position: DVec2, _size: f64) {
        self.plot(position, atom_glyph(label));
    }

    fn draw_droplet(&mut self, position: DVec2, _size: f64) {
        self.plot(position, '~');
    }
}

impl fmt::Display for AsciiCanvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.cells.chunks(self.cols).enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            for c in row {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}
