// File: crates/timechart-core/src/color.rs
// Summary: Deterministic, collision-free color assignment for dataset ids.

use std::collections::HashMap;

use crate::types::Color;

const GOLDEN_RATIO_CONJUGATE: f64 = 0.618_033_988_749_895;

/// Color for the `index`-th assigned dataset. Hues follow the golden-ratio sequence,
/// so consecutive entries land far apart on the color wheel and never repeat.
pub fn nth_color(index: usize) -> Color {
    let hue = ((index as f64) * GOLDEN_RATIO_CONJUGATE).fract() * 360.0;
    let (r, g, b) = hsl_to_rgb(hue, 0.7, 0.55);
    Color::rgb(to_u8(r), to_u8(g), to_u8(b))
}

/// Session-long map from dataset id to color.
///
/// Grows monotonically: colors are never reassigned or recycled, even after the
/// dataset is removed from the chart.
#[derive(Clone, Debug, Default)]
pub struct ColorTable {
    assigned: HashMap<String, Color>,
}

impl ColorTable {
    pub fn new() -> Self { Self::default() }

    /// Color for `id`, assigning the next color in the sequence on first use.
    pub fn color_for(&mut self, id: &str) -> Color {
        if let Some(c) = self.assigned.get(id) {
            return *c;
        }
        let c = nth_color(self.assigned.len());
        self.assigned.insert(id.to_string(), c);
        c
    }

    /// Color for `id` without assigning one.
    pub fn get(&self, id: &str) -> Option<Color> {
        self.assigned.get(id).copied()
    }

    pub fn len(&self) -> usize { self.assigned.len() }

    pub fn is_empty(&self) -> bool { self.assigned.is_empty() }
}

fn to_u8(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (l, l, l);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let h = h / 360.0;
    (
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    )
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 { t += 1.0; }
    if t > 1.0 { t -= 1.0; }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_are_stable_per_id() {
        let mut table = ColorTable::new();
        let a = table.color_for("temp");
        let b = table.color_for("load");
        assert_ne!(a, b);
        assert_eq!(table.color_for("temp"), a);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn first_colors_are_distinct() {
        let colors: Vec<Color> = (0..32).map(nth_color).collect();
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn sequence_is_deterministic() {
        let mut t1 = ColorTable::new();
        let mut t2 = ColorTable::new();
        for id in ["a", "b", "c"] {
            assert_eq!(t1.color_for(id), t2.color_for(id));
        }
    }
}
