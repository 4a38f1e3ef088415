// File: crates/timechart-core/src/config.rs
// Summary: Engine tuning knobs with defaults; loadable from JSON5.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ChartError;
use crate::interaction::DragMode;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Pointer cycles moving less than this (pixels) are clicks.
    pub click_threshold_px: f64,
    /// Narrowest time domain reachable by zooming, in milliseconds.
    pub min_domain_ms: f64,
    /// Value-axis padding as a fraction of the raw range, on each side.
    pub y_padding_fraction: f64,
    /// Absolute widening applied when all visible values are equal.
    pub flat_range_margin: f64,
    pub x_label_count: usize,
    pub y_label_count: usize,
    /// Half-size of the square searched around the pointer for a data point.
    pub hit_tolerance_px: f64,
    pub annotation_glyph_px: f64,
    pub histogram_max_bars: usize,
    /// Share of the panel height taken by the tallest histogram bar.
    pub histogram_fill_fraction: f64,
    pub max_concurrent_refreshes: usize,
    pub refresh_queue_capacity: usize,
    pub edit_queue_capacity: usize,
    pub wheel_zoom_step: f64,
    pub default_window_secs: i64,
    pub drag_mode: DragMode,
    /// Built-in colour theme by name (`dark` or `light`).
    pub theme: String,
    /// Only annotations carrying all of these tags are fetched.
    pub comment_tags: Vec<String>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            click_threshold_px: 20.0,
            min_domain_ms: 10.0,
            y_padding_fraction: 0.05,
            flat_range_margin: 1.0,
            x_label_count: 8,
            y_label_count: 6,
            hit_tolerance_px: 6.0,
            annotation_glyph_px: 10.0,
            histogram_max_bars: 20,
            histogram_fill_fraction: 0.9,
            max_concurrent_refreshes: 1,
            refresh_queue_capacity: 1,
            edit_queue_capacity: 16,
            wheel_zoom_step: 0.1,
            default_window_secs: 3600,
            drag_mode: DragMode::Zoom,
            theme: "dark".to_string(),
            comment_tags: Vec::new(),
        }
    }
}

impl ChartConfig {
    pub fn from_json5_str(text: &str) -> Result<Self, ChartError> {
        let cfg: Self = json5::from_str(text).map_err(|e| ChartError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ChartError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ChartError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_json5_str(&text)
    }

    pub fn validate(&self) -> Result<(), ChartError> {
        let non_negative = [
            ("click_threshold_px", self.click_threshold_px),
            ("min_domain_ms", self.min_domain_ms),
            ("y_padding_fraction", self.y_padding_fraction),
            ("hit_tolerance_px", self.hit_tolerance_px),
            ("annotation_glyph_px", self.annotation_glyph_px),
            ("wheel_zoom_step", self.wheel_zoom_step),
        ];
        for (name, v) in non_negative {
            if !v.is_finite() || v < 0.0 {
                return Err(ChartError::InvalidConfig(format!("{name} must be a non-negative number, got {v}")));
            }
        }
        if !(self.flat_range_margin.is_finite() && self.flat_range_margin > 0.0) {
            return Err(ChartError::InvalidConfig("flat_range_margin must be positive".into()));
        }
        if !(self.histogram_fill_fraction > 0.0 && self.histogram_fill_fraction <= 1.0) {
            return Err(ChartError::InvalidConfig("histogram_fill_fraction must be in (0, 1]".into()));
        }
        if self.max_concurrent_refreshes == 0 {
            return Err(ChartError::InvalidConfig("max_concurrent_refreshes must be at least 1".into()));
        }
        if self.default_window_secs <= 0 {
            return Err(ChartError::InvalidConfig("default_window_secs must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(ChartConfig::default().validate(), Ok(()));
    }

    #[test]
    fn json5_overrides_merge_with_defaults() {
        let cfg = ChartConfig::from_json5_str(
            "{ click_threshold_px: 8, drag_mode: 'pan', comment_tags: ['ops'], // trailing comma ok\n }",
        )
        .unwrap();
        assert_eq!(cfg.click_threshold_px, 8.0);
        assert_eq!(cfg.drag_mode, DragMode::Pan);
        assert_eq!(cfg.comment_tags, vec!["ops".to_string()]);
        assert_eq!(cfg.histogram_max_bars, 20);
    }

    #[test]
    fn rejects_zero_concurrency() {
        let err = ChartConfig::from_json5_str("{ max_concurrent_refreshes: 0 }").unwrap_err();
        assert!(matches!(err, ChartError::InvalidConfig(_)));
    }
}
