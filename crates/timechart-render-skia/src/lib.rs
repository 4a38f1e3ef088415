// File: crates/timechart-render-skia/src/lib.rs
// Summary: Rasterizes engine frames on a Skia CPU surface into PNG files, PNG bytes or RGBA8 buffers.

use anyhow::Result;
use skia_safe as skia;
use timechart_core::{Color, Frame, Primitive};
use tracing::debug;

pub mod text;

pub use text::TextShaper;

/// CPU rasterizer for [`Frame`]s. Keeps its font collection between frames.
pub struct SkiaRenderer {
    shaper: TextShaper,
    draw_text: bool,
}

impl Default for SkiaRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SkiaRenderer {
    pub fn new() -> Self {
        Self { shaper: TextShaper::new(), draw_text: true }
    }

    /// Skip text primitives; output then does not depend on installed fonts.
    pub fn without_text(mut self) -> Self {
        self.draw_text = false;
        self
    }

    fn rasterize(&self, frame: &Frame) -> Result<skia::Surface> {
        let mut surface = skia::surfaces::raster_n32_premul((frame.width.max(1), frame.height.max(1)))
            .ok_or_else(|| anyhow::anyhow!("failed to create raster surface"))?;
        let canvas = surface.canvas();
        for p in &frame.primitives {
            self.draw(canvas, p);
        }
        debug!(width = frame.width, height = frame.height, primitives = frame.primitives.len(), "frame rasterized");
        Ok(surface)
    }

    fn draw(&self, canvas: &skia::Canvas, p: &Primitive) {
        match p {
            Primitive::Clear(c) => {
                canvas.clear(to_skia(*c));
            }
            Primitive::Line { from, to, color, width } => {
                let paint = stroke(*color, *width);
                canvas.draw_line(pt(from.x, from.y), pt(to.x, to.y), &paint);
            }
            Primitive::Polyline { points, color, width, clip } => {
                let Some((first, rest)) = points.split_first() else { return };
                let mut path = skia::Path::new();
                path.move_to(pt(first.x, first.y));
                for q in rest {
                    path.line_to(pt(q.x, q.y));
                }
                canvas.save();
                canvas.clip_rect(rect(clip), None, Some(true));
                canvas.draw_path(&path, &stroke(*color, *width));
                canvas.restore();
            }
            Primitive::Rect { rect: r, color, filled } => {
                let paint = if *filled { fill(*color) } else { stroke(*color, 1.0) };
                canvas.draw_rect(rect(r), &paint);
            }
            Primitive::Circle { center, radius, color } => {
                canvas.draw_circle(pt(center.x, center.y), *radius, &fill(*color));
            }
            Primitive::Text { at, text, color, size, align } => {
                if self.draw_text {
                    self.shaper.draw(canvas, text, at.x as f32, at.y as f32, *size, to_skia(*color), *align);
                }
            }
        }
    }

    /// Encode `frame` as PNG bytes.
    pub fn render_png(&self, frame: &Frame) -> Result<Vec<u8>> {
        let mut surface = self.rasterize(frame)?;
        let image = surface.image_snapshot();
        #[allow(deprecated)]
        let data = image
            .encode_to_data(skia::EncodedImageFormat::PNG)
            .ok_or_else(|| anyhow::anyhow!("encode PNG failed"))?;
        Ok(data.as_bytes().to_vec())
    }

    /// Write `frame` as a PNG, creating parent directories.
    pub fn render_to_png(&self, frame: &Frame, path: impl AsRef<std::path::Path>) -> Result<()> {
        let bytes = self.render_png(frame)?;
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        debug!(path = %path.as_ref().display(), "png written");
        Ok(())
    }

    /// Unpremultiplied RGBA8 pixels as `(pixels, width, height, stride)`.
    pub fn render_rgba8(&self, frame: &Frame) -> Result<(Vec<u8>, u32, u32, usize)> {
        let mut surface = self.rasterize(frame)?;
        let (w, h) = (surface.width(), surface.height());
        let info = skia::ImageInfo::new((w, h), skia::ColorType::RGBA8888, skia::AlphaType::Unpremul, None);
        let stride = w as usize * 4;
        let mut pixels = vec![0u8; stride * h as usize];
        if !surface.read_pixels(&info, &mut pixels, stride, (0, 0)) {
            anyhow::bail!("reading back {w}x{h} surface failed");
        }
        Ok((pixels, w as u32, h as u32, stride))
    }
}

fn to_skia(c: Color) -> skia::Color {
    skia::Color::from_argb(c.a, c.r, c.g, c.b)
}

fn pt(x: f64, y: f64) -> skia::Point {
    skia::Point::new(x as f32, y as f32)
}

fn rect(r: &timechart_core::geometry::Rect) -> skia::Rect {
    skia::Rect::from_ltrb(r.left as f32, r.top as f32, r.right as f32, r.bottom as f32)
}

fn stroke(color: Color, width: f32) -> skia::Paint {
    let mut paint = skia::Paint::default();
    paint.set_anti_alias(true);
    paint.set_style(skia::paint::Style::Stroke);
    paint.set_stroke_width(width);
    paint.set_color(to_skia(color));
    paint
}

fn fill(color: Color) -> skia::Paint {
    let mut paint = skia::Paint::default();
    paint.set_anti_alias(true);
    paint.set_style(skia::paint::Style::Fill);
    paint.set_color(to_skia(color));
    paint
}
