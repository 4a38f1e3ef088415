// File: crates/timechart-core/src/axis.rs
// Summary: Time (X) axis domain and the two value (Y) axes that own datasets.

use serde::{Deserialize, Serialize};

use crate::series::Dataset;

/// Which value axis a dataset is drawn against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisSide {
    Left,
    Right,
}

impl AxisSide {
    pub const BOTH: [AxisSide; 2] = [AxisSide::Left, AxisSide::Right];

    pub fn index(self) -> usize {
        match self {
            AxisSide::Left => 0,
            AxisSide::Right => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            AxisSide::Left => AxisSide::Right,
            AxisSide::Right => AxisSide::Left,
        }
    }
}

/// Horizontal time axis. Domain bounds are epoch milliseconds; holds no data.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct XAxis {
    pub domain_start: f64,
    pub domain_end: f64,
    pub pixel_width: f64,
}

impl XAxis {
    pub fn new(domain_start: f64, domain_end: f64, pixel_width: f64) -> Self {
        Self { domain_start, domain_end, pixel_width }
    }

    pub fn width(&self) -> f64 {
        self.domain_end - self.domain_start
    }

    /// Pixels per millisecond.
    pub fn scale(&self) -> f64 {
        let w = self.width();
        if w > 0.0 { self.pixel_width / w } else { 0.0 }
    }

    #[inline]
    pub fn to_px(&self, t_ms: f64) -> f64 {
        self.scale() * (t_ms - self.domain_start)
    }

    #[inline]
    pub fn from_px(&self, px: f64) -> f64 {
        let s = self.scale();
        if s > 0.0 { self.domain_start + px / s } else { self.domain_start }
    }

    pub fn set_domain(&mut self, start: f64, end: f64) {
        self.domain_start = start;
        self.domain_end = end;
    }

    /// Shift the domain so the content follows a pointer moved by `dx_px`.
    pub fn pan_px(&mut self, dx_px: f64) {
        let s = self.scale();
        if s > 0.0 {
            let dt = dx_px / s;
            self.domain_start -= dt;
            self.domain_end -= dt;
        }
    }

    /// Scale the domain width around `pivot_px`, keeping the time under the pivot
    /// fixed. Positive `factor` widens (zooms out), negative narrows (zooms in);
    /// `f` and `-f` are exact inverses. Zooming in is refused once the width is
    /// already below `min_width`. Returns whether the domain changed.
    pub fn zoom_at(&mut self, pivot_px: f64, factor: f64, min_width: f64) -> bool {
        let width = self.width();
        let scale_old = self.scale();
        if !factor.is_finite() || factor == 0.0 || scale_old <= 0.0 {
            return false;
        }
        if factor < 0.0 && width < min_width {
            return false;
        }
        let width_new = width * zoom_multiplier(factor);
        let scale_new = self.pixel_width / width_new;
        let pivot_data = self.domain_start + pivot_px / scale_old;
        self.domain_start = pivot_data - pivot_px / scale_new;
        self.domain_end = self.domain_start + width_new;
        true
    }
}

/// Width multiplier for a signed zoom factor.
pub fn zoom_multiplier(factor: f64) -> f64 {
    if factor >= 0.0 { 1.0 + factor } else { 1.0 / (1.0 - factor) }
}

/// Derived value range of a [`YAxis`] for the current time domain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ValueBounds {
    pub min_value: f64,
    pub max_value: f64,
    /// Pixels per value unit.
    pub scale: f64,
}

impl ValueBounds {
    #[inline]
    pub fn to_px(&self, v: f64) -> f64 {
        self.scale * (self.max_value - v)
    }
}

impl Default for ValueBounds {
    fn default() -> Self {
        Self { min_value: 0.0, max_value: 1.0, scale: 0.0 }
    }
}

/// A value axis and the datasets drawn against it, in insertion order.
#[derive(Clone, Debug)]
pub struct YAxis {
    pub side: AxisSide,
    datasets: Vec<Dataset>,
    bounds: ValueBounds,
}

impl YAxis {
    pub fn new(side: AxisSide) -> Self {
        Self { side, datasets: Vec::new(), bounds: ValueBounds::default() }
    }

    pub fn datasets(&self) -> &[Dataset] { &self.datasets }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.datasets.iter().map(|d| d.id.as_str())
    }

    pub fn owns(&self, id: &str) -> bool {
        self.datasets.iter().any(|d| d.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Dataset> {
        self.datasets.iter_mut().find(|d| d.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.id == id)
    }

    /// Take ownership of `dataset` (appended as most recent).
    pub fn adopt(&mut self, dataset: Dataset) {
        self.datasets.push(dataset);
    }

    /// Give up ownership of `id`, handing the dataset back to the caller.
    pub fn release(&mut self, id: &str) -> Option<Dataset> {
        let idx = self.datasets.iter().position(|d| d.id == id)?;
        Some(self.datasets.remove(idx))
    }

    pub fn bounds(&self) -> ValueBounds { self.bounds }

    pub fn is_empty(&self) -> bool { self.datasets.is_empty() }

    /// Recompute the value range from points inside `[start_ms, end_ms]`, padded by
    /// `padding` of the raw range on each side. An empty window yields `[0, 1]`; a flat
    /// one is widened by `flat_margin` so the range is never zero.
    pub fn rescale(&mut self, start_ms: f64, end_ms: f64, pixel_height: f64, padding: f64, flat_margin: f64) -> ValueBounds {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for d in &self.datasets {
            for p in d.points_within(start_ms, end_ms) {
                lo = lo.min(p.min());
                hi = hi.max(p.max());
            }
        }
        let (min_value, max_value) = if !lo.is_finite() || !hi.is_finite() {
            (0.0, 1.0)
        } else if hi - lo <= 0.0 {
            (lo - flat_margin, hi + flat_margin)
        } else {
            let pad = (hi - lo) * padding;
            (lo - pad, hi + pad)
        };
        let scale = if pixel_height > 0.0 { pixel_height / (max_value - min_value) } else { 0.0 };
        self.bounds = ValueBounds { min_value, max_value, scale };
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::Point;
    use chrono::{TimeZone, Utc};

    fn ds(id: &str, values: &[(i64, f64)]) -> Dataset {
        let pts = values
            .iter()
            .map(|&(s, v)| Point::raw(Utc.timestamp_opt(s, 0).unwrap(), v))
            .collect();
        Dataset::with_points(id, pts)
    }

    #[test]
    fn x_axis_scale_and_pan() {
        let mut x = XAxis::new(0.0, 10_000.0, 100.0);
        assert!((x.scale() - 0.01).abs() < 1e-12);
        assert!((x.to_px(10_000.0) - 100.0).abs() < 1e-9);
        x.pan_px(10.0);
        assert!((x.domain_start + 1_000.0).abs() < 1e-9);
        assert!((x.domain_end - 9_000.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_then_inverse_restores_domain() {
        let mut x = XAxis::new(1_000.0, 61_000.0, 800.0);
        let before = x;
        assert!(x.zoom_at(230.0, -0.25, 10.0));
        assert!(x.width() < before.width());
        assert!(x.zoom_at(230.0, 0.25, 10.0));
        assert!((x.domain_start - before.domain_start).abs() < 1e-6);
        assert!((x.domain_end - before.domain_end).abs() < 1e-6);
    }

    #[test]
    fn zoom_keeps_pivot_time_fixed() {
        let mut x = XAxis::new(0.0, 1_000.0, 100.0);
        let pivot_t = x.from_px(25.0);
        x.zoom_at(25.0, 0.5, 1.0);
        assert!((x.from_px(25.0) - pivot_t).abs() < 1e-9);
        assert!((x.width() - 1_500.0).abs() < 1e-9);
    }

    #[test]
    fn zoom_in_refused_below_minimum() {
        let mut x = XAxis::new(0.0, 5.0, 100.0);
        assert!(!x.zoom_at(50.0, -0.5, 10.0));
        assert_eq!(x.width(), 5.0);
        assert!(x.zoom_at(50.0, 0.5, 10.0));
    }

    #[test]
    fn y_bounds_pad_and_filter_by_window() {
        let mut y = YAxis::new(AxisSide::Left);
        y.adopt(ds("a", &[(0, 0.0), (5, 10.0), (100, 1_000.0)]));
        let b = y.rescale(0.0, 10_000.0, 200.0, 0.05, 1.0);
        assert!((b.min_value + 0.5).abs() < 1e-9);
        assert!((b.max_value - 10.5).abs() < 1e-9);
        assert!((b.scale - 200.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn y_bounds_never_degenerate() {
        let mut y = YAxis::new(AxisSide::Right);
        assert_eq!(y.rescale(0.0, 1.0, 100.0, 0.05, 1.0).min_value, 0.0);
        assert_eq!(y.bounds().max_value, 1.0);
        y.adopt(ds("flat", &[(0, 4.0), (1, 4.0)]));
        let b = y.rescale(0.0, 10_000.0, 100.0, 0.05, 1.0);
        assert!(b.max_value > b.min_value);
        assert_eq!((b.min_value, b.max_value), (3.0, 5.0));
    }

    #[test]
    fn release_transfers_ownership() {
        let mut left = YAxis::new(AxisSide::Left);
        let mut right = YAxis::new(AxisSide::Right);
        left.adopt(ds("a", &[(0, 1.0)]));
        let moved = left.release("a").unwrap();
        right.adopt(moved);
        assert!(!left.owns("a"));
        assert!(right.owns("a"));
        assert!(left.release("a").is_none());
    }
}
