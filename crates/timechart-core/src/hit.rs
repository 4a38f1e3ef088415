// File: crates/timechart-core/src/hit.rs
// Summary: Pointer hit-testing against annotation hitboxes and projected series points.

use crate::axis::AxisSide;
use crate::geometry::{PixelPoint, Rect};
use crate::scale::PixelTable;
use crate::series::Point;

/// A rectangle that selects an annotation when the pointer is inside it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnnotationHitbox {
    pub id: i64,
    pub rect: Rect,
}

/// Data shown under the pointer.
#[derive(Clone, Debug, PartialEq)]
pub struct Tooltip {
    pub dataset_id: String,
    pub point: Point,
    /// Where the matched point is drawn (plot coordinates).
    pub at: PixelPoint,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Hit {
    Annotation(i64),
    Point(Tooltip),
}

/// Resolve what lies under `pointer`.
///
/// Annotation hitboxes win and suppress the data tooltip. Otherwise each axis is
/// scanned in turn, newest dataset first, and the first point within `tolerance`
/// pixels on both axes is reported. That is the first match in scan order, not the
/// globally nearest point.
pub fn hit_test(pointer: PixelPoint, annotations: &[AnnotationHitbox], table: &PixelTable, tolerance: f64) -> Option<Hit> {
    if let Some(a) = annotations.iter().find(|a| a.rect.contains(pointer)) {
        return Some(Hit::Annotation(a.id));
    }
    for side in AxisSide::BOTH {
        for series in table.series.iter().rev().filter(|s| s.side == side) {
            let found = series.points.iter().find(|p| {
                (p.px.x - pointer.x).abs() <= tolerance && (p.px.y - pointer.y).abs() <= tolerance
            });
            if let Some(p) = found {
                return Some(Hit::Point(Tooltip { dataset_id: series.id.clone(), point: p.source, at: p.px }));
            }
        }
    }
    None
}
