// File: crates/timechart-core/src/render.rs
// Summary: Render pass turning the chart state into an ordered Frame of draw primitives.

use tracing::debug;

use crate::annotation::{self, AnnotationForm};
use crate::axis::AxisSide;
use crate::chart::{Chart, CHAR_ADVANCE_PX, LEGEND_SWATCH_PX};
use crate::frame::{Frame, Primitive, TextAlign};
use crate::geometry::{PixelPoint, Rect};
use crate::grid::{format_value, time_labels, value_labels, TimeLabelFormat};
use crate::interaction::DragMode;
use crate::series::{to_ms, Point};
use crate::types::Color;

const LABEL_PX: f32 = 12.0;
const LINE_HEIGHT: f64 = 16.0;
const MARKER_RADIUS: f32 = 2.5;
/// Markers are drawn only when points are at least this far apart on average.
const MARKER_MIN_SPACING: f64 = 6.0;

impl Chart {
    /// Re-project and draw: grid and axis labels, series, zoom rectangle,
    /// annotations, legend, distribution panel, tooltip, edit form, range fields.
    pub fn render(&mut self) -> Frame {
        self.reproject();
        let plot = self.plot_rect().offset(f64::from(self.insets.left), f64::from(self.insets.top));
        let mut frame = Frame::new(self.width, self.height);
        frame.push(Primitive::Clear(self.theme.background));
        self.draw_grid(&mut frame, plot);
        self.draw_series(&mut frame, plot);
        self.draw_zoom_rect(&mut frame, plot);
        self.draw_annotations(&mut frame, plot);
        self.draw_legend(&mut frame, plot);
        self.draw_distribution(&mut frame, plot);
        self.draw_tooltip(&mut frame, plot);
        self.draw_form(&mut frame, plot);
        self.draw_range_fields(&mut frame, plot);
        debug!(primitives = frame.primitives.len(), "render pass");
        frame
    }

    fn series_color(&self, id: &str) -> Color {
        self.colors.get(id).unwrap_or(self.theme.axis_line)
    }

    fn draw_grid(&self, frame: &mut Frame, plot: Rect) {
        let theme = &self.theme;
        for label in time_labels(self.x_axis.domain_start, self.x_axis.domain_end, self.config.x_label_count) {
            let x = plot.left + self.x_axis.to_px(label.at_ms);
            frame.line(PixelPoint::new(x, plot.top), PixelPoint::new(x, plot.bottom), theme.grid, 1.0);
            frame.text(PixelPoint::new(x, plot.bottom + LINE_HEIGHT), label.text, theme.axis_label, LABEL_PX, TextAlign::Center);
        }

        // horizontal grid follows the left axis unless only the right one has data
        let grid_side = if self.y_axes[0].is_empty() && !self.y_axes[1].is_empty() { AxisSide::Right } else { AxisSide::Left };
        for side in AxisSide::BOTH {
            let axis = &self.y_axes[side.index()];
            if axis.is_empty() && side != grid_side {
                continue;
            }
            let bounds = axis.bounds();
            let values = value_labels(bounds.min_value, bounds.max_value, self.config.y_label_count);
            let spacing = match values.as_slice() {
                [a, b, ..] => b - a,
                _ => bounds.max_value - bounds.min_value,
            };
            for v in values {
                let y = plot.top + bounds.to_px(v);
                if side == grid_side {
                    frame.line(PixelPoint::new(plot.left, y), PixelPoint::new(plot.right, y), theme.grid, 1.0);
                }
                let (x, align) = match side {
                    AxisSide::Left => (plot.left - 6.0, TextAlign::Right),
                    AxisSide::Right => (plot.right + 6.0, TextAlign::Left),
                };
                frame.text(PixelPoint::new(x, y + 4.0), format_value(v, spacing), theme.axis_label, LABEL_PX, align);
            }
        }
        frame.rect(plot, theme.axis_line, false);
    }

    fn draw_series(&self, frame: &mut Frame, plot: Rect) {
        for series in &self.pixels.series {
            let color = self.series_color(&series.id);
            let bounds = self.y_axes[series.side.index()].bounds();
            for p in &series.points {
                if let Point::Aggregate { min, max, .. } = p.source {
                    let x = plot.left + p.px.x;
                    if x < plot.left || x > plot.right {
                        continue;
                    }
                    let top = (plot.top + bounds.to_px(max)).clamp(plot.top, plot.bottom);
                    let bottom = (plot.top + bounds.to_px(min)).clamp(plot.top, plot.bottom);
                    frame.line(PixelPoint::new(x, top), PixelPoint::new(x, bottom), color.with_alpha(90), 1.0);
                }
            }

            let points: Vec<PixelPoint> = series.points.iter().map(|p| p.px.offset(plot.left, plot.top)).collect();
            let sparse = points.len() as f64 <= plot.width() / MARKER_MIN_SPACING;
            if sparse {
                for &center in points.iter().filter(|p| plot.contains(**p)) {
                    frame.push(Primitive::Circle { center, radius: MARKER_RADIUS, color });
                }
            }
            if points.len() > 1 {
                frame.push(Primitive::Polyline { points, color, width: 1.5, clip: plot });
            }
        }
    }

    fn draw_zoom_rect(&self, frame: &mut Frame, plot: Rect) {
        if let Some((from, to)) = self.interaction.zoom_extent() {
            let w = plot.width();
            let rect = Rect::from_ltrb(plot.left + from.clamp(0.0, w), plot.top, plot.left + to.clamp(0.0, w), plot.bottom);
            frame.rect(rect, self.theme.zoom_rect, true);
            frame.rect(rect, self.theme.zoom_rect.with_alpha(200), false);
        }
    }

    fn draw_annotations(&self, frame: &mut Frame, plot: Rect) {
        let glyph = self.config.annotation_glyph_px;
        let active = self.hovered_annotation.or_else(|| self.form.as_ref().and_then(AnnotationForm::editing));
        for (comment, x) in annotation::visible(&self.comments, &self.x_axis) {
            let color = if active == Some(comment.id) { self.theme.annotation_active } else { self.theme.annotation };
            let x = plot.left + x;
            frame.line(PixelPoint::new(x, plot.top), PixelPoint::new(x, plot.bottom), color, 1.0);
            frame.rect(Rect::from_ltwh(x - glyph / 2.0, plot.top, glyph, glyph), color, true);
        }
        if let Some(AnnotationForm::New { at }) = &self.form {
            let x = plot.left + self.x_axis.to_px(to_ms(*at));
            frame.line(PixelPoint::new(x, plot.top), PixelPoint::new(x, plot.bottom), self.theme.annotation_active, 1.0);
        }
    }

    fn draw_legend(&self, frame: &mut Frame, plot: Rect) {
        for entry in &self.legend {
            let r = entry.rect.offset(plot.left, plot.top);
            let color = self.series_color(&entry.id);
            let swatch = Rect::from_ltwh(r.left, r.top + (r.height() - LEGEND_SWATCH_PX) / 2.0, LEGEND_SWATCH_PX, LEGEND_SWATCH_PX);
            frame.rect(swatch, color, true);
            if self.distribution.as_deref() == Some(entry.id.as_str()) {
                frame.rect(r, color, false);
            }
            frame.text(PixelPoint::new(swatch.right + 6.0, r.bottom - 3.0), entry.label(), self.theme.axis_label, LABEL_PX, TextAlign::Left);
        }
    }

    fn draw_distribution(&self, frame: &mut Frame, plot: Rect) {
        let Some((id, hist)) = self.distribution() else { return };
        let color = self.series_color(id);
        let panel = Rect::from_ltwh(plot.right - plot.width() * 0.35 - 8.0, plot.top + 8.0, plot.width() * 0.35, plot.height() * 0.4);
        let inner = Rect::from_ltrb(panel.left + 8.0, panel.top + 22.0, panel.right - 8.0, panel.bottom - 20.0);
        frame.rect(panel, self.theme.panel_bg, true);
        frame.text(
            PixelPoint::new(panel.left + 8.0, panel.top + 15.0),
            format!("{id} distribution (n = {})", hist.total),
            self.theme.tooltip_text,
            LABEL_PX,
            TextAlign::Left,
        );

        let heights = hist.bar_heights(inner.height(), self.config.histogram_fill_fraction);
        let bar_w = inner.width() / heights.len().max(1) as f64;
        for (i, h) in heights.iter().enumerate() {
            let left = inner.left + i as f64 * bar_w;
            frame.rect(Rect::from_ltrb(left + 1.0, inner.bottom - h, left + bar_w - 1.0, inner.bottom), color, true);
        }

        if let (Some(first), Some(last)) = (hist.buckets.first(), hist.buckets.last()) {
            let width = first.upper - first.lower;
            let label_y = panel.bottom - 6.0;
            let text = self.theme.tooltip_text;
            frame.text(PixelPoint::new(inner.left, label_y), format_value(first.lower, width), text, LABEL_PX, TextAlign::Left);
            frame.text(PixelPoint::new(inner.right, label_y), format_value(last.upper, width), text, LABEL_PX, TextAlign::Right);
        }
    }

    fn draw_tooltip(&self, frame: &mut Frame, plot: Rect) {
        if let Some(t) = &self.tooltip {
            let at = t.at.offset(plot.left, plot.top);
            frame.push(Primitive::Circle { center: at, radius: MARKER_RADIUS * 2.0, color: self.series_color(&t.dataset_id) });
            let value = match t.point {
                Point::Raw { value, .. } => format!("{value:.3}"),
                Point::Aggregate { mean, min, max, .. } => format!("{mean:.3} [{min:.3} .. {max:.3}]"),
            };
            let lines = [t.dataset_id.clone(), TimeLabelFormat::Timestamp.format(t.point.time_ms()), value];
            self.text_box(frame, at, &lines, plot);
        } else if let Some(comment) = self.hovered_annotation.and_then(|id| self.comments.iter().find(|c| c.id == id)) {
            let x = plot.left + self.x_axis.to_px(to_ms(comment.date));
            let y = self.pointer.map_or(plot.top, |p| p.y + plot.top);
            let mut lines = vec![TimeLabelFormat::Timestamp.format(to_ms(comment.date)), comment.text.clone()];
            if !comment.tags.is_empty() {
                lines.push(comment.tags.join(", "));
            }
            self.text_box(frame, PixelPoint::new(x, y), &lines, plot);
        }
    }

    fn draw_form(&self, frame: &mut Frame, plot: Rect) {
        let Some(form) = &self.form else { return };
        let x = plot.left + self.x_axis.to_px(to_ms(form.timestamp()));
        let when = TimeLabelFormat::Timestamp.format(to_ms(form.timestamp()));
        let lines = match form {
            AnnotationForm::New { .. } => vec!["New annotation".to_string(), when],
            AnnotationForm::Edit { comment } => vec![format!("Edit annotation #{}", comment.id), when, comment.text.clone()],
        };
        self.text_box(frame, PixelPoint::new(x, plot.top + self.config.annotation_glyph_px + 8.0), &lines, plot);
    }

    fn draw_range_fields(&self, frame: &mut Frame, plot: Rect) {
        let color = if self.fields.invalid { self.theme.invalid } else { self.theme.axis_label };
        let y = f64::from(self.height) - 8.0;
        frame.text(PixelPoint::new(plot.left, y), self.fields.start.clone(), color, LABEL_PX, TextAlign::Left);
        frame.text(PixelPoint::new(plot.right, y), self.fields.end.clone(), color, LABEL_PX, TextAlign::Right);
        let mode = match self.interaction.mode {
            DragMode::Zoom => "zoom",
            DragMode::Pan => "pan",
        };
        frame.text(PixelPoint::new(plot.left + plot.width() / 2.0, y), mode, self.theme.axis_label, LABEL_PX, TextAlign::Center);
    }

    /// Boxed lines of text next to `anchor`, flipped left when they would leave the plot.
    fn text_box(&self, frame: &mut Frame, anchor: PixelPoint, lines: &[String], plot: Rect) {
        let chars = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let width = chars as f64 * CHAR_ADVANCE_PX + 12.0;
        let height = lines.len() as f64 * LINE_HEIGHT + 8.0;
        let mut left = anchor.x + 10.0;
        if left + width > plot.right {
            left = anchor.x - 10.0 - width;
        }
        let top = (anchor.y - height - 6.0).max(plot.top);
        let rect = Rect::from_ltwh(left, top, width, height);
        frame.rect(rect, self.theme.tooltip_bg, true);
        for (i, line) in lines.iter().enumerate() {
            let baseline = PixelPoint::new(rect.left + 6.0, rect.top + 4.0 + (i + 1) as f64 * LINE_HEIGHT - 4.0);
            frame.text(baseline, line.clone(), self.theme.tooltip_text, LABEL_PX, TextAlign::Left);
        }
    }
}
