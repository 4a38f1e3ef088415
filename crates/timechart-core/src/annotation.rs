// File: crates/timechart-core/src/annotation.rs
// Summary: Annotation markers on the plot: visible subset, hitboxes, and the edit form state.

use chrono::{DateTime, Utc};

use crate::axis::XAxis;
use crate::backend::Comment;
use crate::geometry::{PixelPoint, Rect};
use crate::hit::AnnotationHitbox;
use crate::series::to_ms;

/// Half-width of the clickable band around a marker line.
const MARKER_SLOP_PX: f64 = 2.0;

/// The open annotation form: either drafting a new note or editing an existing one.
#[derive(Clone, Debug, PartialEq)]
pub enum AnnotationForm {
    New { at: DateTime<Utc> },
    Edit { comment: Comment },
}

impl AnnotationForm {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            AnnotationForm::New { at } => *at,
            AnnotationForm::Edit { comment } => comment.date,
        }
    }

    /// Id of the annotation being edited, if any.
    pub fn editing(&self) -> Option<i64> {
        match self {
            AnnotationForm::New { .. } => None,
            AnnotationForm::Edit { comment } => Some(comment.id),
        }
    }
}

/// Marker x-position of every comment inside the current domain.
pub fn visible<'a>(comments: &'a [Comment], x_axis: &'a XAxis) -> impl Iterator<Item = (&'a Comment, f64)> + 'a {
    comments.iter().filter_map(move |c| {
        let t = to_ms(c.date);
        (t >= x_axis.domain_start && t <= x_axis.domain_end).then(|| (c, x_axis.to_px(t)))
    })
}

/// Glyph square at the top of the plot, then the marker line below it, per visible comment.
pub fn hitboxes(comments: &[Comment], x_axis: &XAxis, plot_height: f64, glyph_px: f64) -> Vec<AnnotationHitbox> {
    let half = glyph_px / 2.0;
    visible(comments, x_axis)
        .flat_map(|(c, x)| {
            [
                AnnotationHitbox { id: c.id, rect: Rect::around(PixelPoint::new(x, half), half) },
                AnnotationHitbox { id: c.id, rect: Rect::from_ltrb(x - MARKER_SLOP_PX, 0.0, x + MARKER_SLOP_PX, plot_height) },
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn only_comments_in_domain_get_hitboxes() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let x = XAxis::new(to_ms(t0), to_ms(t0) + 10_000.0, 100.0);
        let mut inside = Comment::new(t0 + chrono::Duration::seconds(5), "in", vec![]);
        inside.id = 1;
        let mut outside = Comment::new(t0 + chrono::Duration::seconds(50), "out", vec![]);
        outside.id = 2;
        let boxes = hitboxes(&[inside, outside], &x, 200.0, 10.0);
        assert_eq!(boxes.len(), 2);
        assert!(boxes.iter().all(|b| b.id == 1));
        assert!(boxes[0].rect.contains(PixelPoint::new(50.0, 9.0)));
        assert!(boxes[1].rect.contains(PixelPoint::new(51.0, 150.0)));
        assert!(!boxes[1].rect.contains(PixelPoint::new(55.0, 150.0)));
    }
}
