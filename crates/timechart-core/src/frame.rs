// File: crates/timechart-core/src/frame.rs
// Summary: Renderer-agnostic draw list produced by a render pass.

use crate::geometry::{PixelPoint, Rect};
use crate::types::Color;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

/// One drawing instruction, in surface pixels.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Clear(Color),
    Line { from: PixelPoint, to: PixelPoint, color: Color, width: f32 },
    /// Open stroked path through `points`, clipped to `clip`.
    Polyline { points: Vec<PixelPoint>, color: Color, width: f32, clip: Rect },
    Rect { rect: Rect, color: Color, filled: bool },
    Circle { center: PixelPoint, radius: f32, color: Color },
    /// `at` is the baseline anchor.
    Text { at: PixelPoint, text: String, color: Color, size: f32, align: TextAlign },
}

/// Ordered draw list for one surface; later primitives paint over earlier ones.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    pub width: i32,
    pub height: i32,
    pub primitives: Vec<Primitive>,
}

impl Frame {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height, primitives: Vec::new() }
    }

    pub fn push(&mut self, p: Primitive) {
        self.primitives.push(p);
    }

    pub fn line(&mut self, from: PixelPoint, to: PixelPoint, color: Color, width: f32) {
        self.push(Primitive::Line { from, to, color, width });
    }

    pub fn rect(&mut self, rect: Rect, color: Color, filled: bool) {
        self.push(Primitive::Rect { rect, color, filled });
    }

    pub fn text(&mut self, at: PixelPoint, text: impl Into<String>, color: Color, size: f32, align: TextAlign) {
        self.push(Primitive::Text { at, text: text.into(), color, size, align });
    }

    /// All text primitives, in draw order. Handy for assertions.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}
