// File: crates/timechart-core/src/theme.rs
// Summary: Dark and light colour themes for the render pass.

use crate::types::Color;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Theme {
    pub name: &'static str,
    pub background: Color,
    pub grid: Color,
    pub axis_line: Color,
    pub axis_label: Color,
    pub annotation: Color,
    pub annotation_active: Color,
    pub tooltip_bg: Color,
    pub tooltip_text: Color,
    pub zoom_rect: Color,
    pub panel_bg: Color,
    pub invalid: Color,
}

impl Theme {
    pub fn dark() -> Self {
        Self {
            name: "dark",
            background: Color::from_argb(255, 18, 18, 20),
            grid: Color::from_argb(255, 40, 40, 45),
            axis_line: Color::from_argb(255, 180, 180, 190),
            axis_label: Color::from_argb(255, 235, 235, 245),
            annotation: Color::from_argb(255, 255, 230, 70),
            annotation_active: Color::from_argb(255, 255, 140, 40),
            tooltip_bg: Color::from_argb(230, 40, 40, 48),
            tooltip_text: Color::from_argb(255, 235, 235, 245),
            zoom_rect: Color::from_argb(60, 64, 160, 255),
            panel_bg: Color::from_argb(220, 28, 28, 34),
            invalid: Color::from_argb(255, 220, 80, 80),
        }
    }

    pub fn light() -> Self {
        Self {
            name: "light",
            background: Color::from_argb(255, 250, 250, 252),
            grid: Color::from_argb(255, 230, 230, 235),
            axis_line: Color::from_argb(255, 60, 60, 70),
            axis_label: Color::from_argb(255, 20, 20, 30),
            annotation: Color::from_argb(255, 30, 120, 240),
            annotation_active: Color::from_argb(255, 200, 60, 60),
            tooltip_bg: Color::from_argb(235, 255, 255, 255),
            tooltip_text: Color::from_argb(255, 20, 20, 30),
            zoom_rect: Color::from_argb(50, 32, 120, 200),
            panel_bg: Color::from_argb(230, 245, 245, 248),
            invalid: Color::from_argb(255, 200, 60, 60),
        }
    }
}

impl Default for Theme {
    fn default() -> Self { Self::dark() }
}

/// Return a list of built-in theme presets.
pub fn presets() -> Vec<Theme> {
    vec![Theme::dark(), Theme::light()]
}

/// Find a theme by its `name`, falling back to dark.
pub fn find(name: &str) -> Theme {
    presets()
        .into_iter()
        .find(|t| t.name.eq_ignore_ascii_case(name))
        .unwrap_or_else(Theme::dark)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_with_dark_fallback() {
        assert_eq!(find("LIGHT").name, "light");
        assert_eq!(find("solarized"), Theme::dark());
    }
}
