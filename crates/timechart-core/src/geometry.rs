// File: crates/timechart-core/src/geometry.rs
// Summary: Lightweight geometry helpers for pixel math.

/// A point on the drawing surface. Ephemeral: recomputed on every render pass.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub const fn new(x: f64, y: f64) -> Self { Self { x, y } }

    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }
}

/// Axis-aligned rectangle in pixels, edges inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    pub const fn from_ltrb(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self { left, top, right, bottom }
    }
    pub fn from_ltwh(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, right: left + width, bottom: top + height }
    }
    /// Square of half-size `half` centred on `c`.
    pub fn around(c: PixelPoint, half: f64) -> Self {
        Self::from_ltrb(c.x - half, c.y - half, c.x + half, c.y + half)
    }
    pub fn width(&self) -> f64 { self.right - self.left }
    pub fn height(&self) -> f64 { self.bottom - self.top }

    pub fn contains(&self, p: PixelPoint) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.top && p.y <= self.bottom
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self::from_ltrb(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_contains_edges() {
        let r = Rect::from_ltwh(10.0, 10.0, 5.0, 5.0);
        assert!(r.contains(PixelPoint::new(10.0, 15.0)));
        assert!(!r.contains(PixelPoint::new(15.1, 12.0)));
        assert!(Rect::around(PixelPoint::new(0.0, 0.0), 2.0).contains(PixelPoint::new(-2.0, 2.0)));
    }
}
