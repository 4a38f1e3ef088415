// File: crates/timechart-core/src/scale.rs
// Summary: Coordinate transform pipeline mapping dataset points into plot pixels.

use crate::axis::{AxisSide, XAxis, YAxis};
use crate::geometry::PixelPoint;
use crate::series::Point;

/// A dataset point together with where it lands on the plot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectedPoint {
    pub px: PixelPoint,
    pub source: Point,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProjectedSeries {
    pub id: String,
    pub side: AxisSide,
    pub points: Vec<ProjectedPoint>,
}

/// Pixel coordinates for every owned dataset, relative to the plot's top-left
/// corner. Rebuilt before every render and after every view change; never carried
/// across a window change.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PixelTable {
    /// Left-axis series first, each axis in dataset insertion order.
    pub series: Vec<ProjectedSeries>,
}

impl PixelTable {
    pub fn get(&self, id: &str) -> Option<&ProjectedSeries> {
        self.series.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize { self.series.len() }

    pub fn is_empty(&self) -> bool { self.series.is_empty() }
}

/// Project one point: `x = x_scale * (t - domain_start)`, `y = y_scale * (max - v)`.
#[inline]
pub fn project_point(x_axis: &XAxis, y_axis: &YAxis, p: &Point) -> PixelPoint {
    PixelPoint::new(x_axis.to_px(p.time_ms()), y_axis.bounds().to_px(p.value()))
}

/// Map every dataset of both value axes through the current scales.
pub fn project(x_axis: &XAxis, y_axes: &[YAxis; 2]) -> PixelTable {
    let series = AxisSide::BOTH
        .iter()
        .map(|side| &y_axes[side.index()])
        .flat_map(|axis| {
            axis.datasets().iter().map(move |d| ProjectedSeries {
                id: d.id.clone(),
                side: axis.side,
                points: d
                    .points
                    .iter()
                    .map(|p| ProjectedPoint { px: project_point(x_axis, axis, p), source: *p })
                    .collect(),
            })
        })
        .collect();
    PixelTable { series }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{to_ms, Dataset};
    use chrono::{TimeZone, Utc};

    #[test]
    fn second_point_lands_on_right_edge() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 10).unwrap();
        let x = XAxis::new(to_ms(t0), to_ms(t1), 100.0);
        let mut left = YAxis::new(AxisSide::Left);
        left.adopt(Dataset::with_points("temp", vec![Point::raw(t0, 10.0), Point::raw(t1, 20.0)]));
        left.rescale(x.domain_start, x.domain_end, 50.0, 0.05, 1.0);
        let axes = [left, YAxis::new(AxisSide::Right)];
        let table = project(&x, &axes);
        let temp = table.get("temp").unwrap();
        assert_eq!(temp.points[0].px.x, 0.0);
        assert!((temp.points[1].px.x - 100.0).abs() < 1e-9);
        // higher values sit nearer the top
        assert!(temp.points[1].px.y < temp.points[0].px.y);
    }

    #[test]
    fn left_axis_series_come_first() {
        let mut left = YAxis::new(AxisSide::Left);
        let mut right = YAxis::new(AxisSide::Right);
        right.adopt(Dataset::new("r"));
        left.adopt(Dataset::new("l1"));
        left.adopt(Dataset::new("l2"));
        let table = project(&XAxis::new(0.0, 1.0, 10.0), &[left, right]);
        let ids: Vec<&str> = table.series.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["l1", "l2", "r"]);
    }
}
