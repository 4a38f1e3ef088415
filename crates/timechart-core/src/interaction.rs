// File: crates/timechart-core/src/interaction.rs
// Summary: Pointer-drag state machine (idle -> dragging -> idle) with click/zoom/pan classification.

use serde::{Deserialize, Serialize};

use crate::axis::AxisSide;

/// What a horizontal drag over the plot does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragMode {
    /// Drag a rectangle; its x-extent becomes the new domain on release.
    #[default]
    Zoom,
    /// Every move shifts the domain; data is refreshed on release.
    Pan,
}

/// One pointer-down -> pointer-up (or leave) cycle. Cleared when the cycle ends.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DragState {
    pub active: bool,
    /// Set when the drag started over a value-axis gutter rather than the plot.
    pub axis: Option<AxisSide>,
    pub start_x: f64,
    pub start_y: f64,
    pub current_x: f64,
    pub current_y: f64,
    /// Displacement of the most recent move.
    pub delta_x: f64,
    pub delta_y: f64,
}

impl DragState {
    pub fn displacement(&self) -> f64 {
        (self.current_x - self.start_x).hypot(self.current_y - self.start_y)
    }
}

/// Outcome of a completed pointer cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Gesture {
    /// Displacement stayed under the click threshold.
    Click { x: f64, y: f64 },
    /// Zoom-mode drag; pixel extent ordered left to right.
    Zoom { from_px: f64, to_px: f64 },
    /// Pan-mode drag finished; `dx` is the displacement since the last move.
    PanEnd { dx: f64 },
    /// Nothing to apply: no drag was active, or it was on a value-axis gutter.
    Ignored,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Interaction {
    pub mode: DragMode,
    pub click_threshold: f64,
    drag: DragState,
}

impl Interaction {
    pub fn new(mode: DragMode, click_threshold: f64) -> Self {
        Self { mode, click_threshold, drag: DragState::default() }
    }

    pub fn state(&self) -> &DragState { &self.drag }

    pub fn is_dragging(&self) -> bool { self.drag.active }

    /// idle -> dragging.
    pub fn on_pointer_down(&mut self, x: f64, y: f64, axis: Option<AxisSide>) {
        self.drag = DragState {
            active: true,
            axis,
            start_x: x,
            start_y: y,
            current_x: x,
            current_y: y,
            delta_x: 0.0,
            delta_y: 0.0,
        };
    }

    /// dragging -> dragging. Returns the horizontal pixel delta to pan by right
    /// now, when in pan mode over the plot.
    pub fn on_pointer_move(&mut self, x: f64, y: f64) -> Option<f64> {
        if !self.drag.active {
            return None;
        }
        self.track(x, y);
        match (self.mode, self.drag.axis) {
            (DragMode::Pan, None) => Some(self.drag.delta_x),
            _ => None,
        }
    }

    /// dragging -> idle, classifying the gesture.
    pub fn on_pointer_up(&mut self, x: f64, y: f64) -> Gesture {
        if !self.drag.active {
            return Gesture::Ignored;
        }
        self.track(x, y);
        let drag = std::mem::take(&mut self.drag);
        if drag.displacement() < self.click_threshold {
            return Gesture::Click { x, y };
        }
        if drag.axis.is_some() {
            // value-axis zoom/pan is not supported
            return Gesture::Ignored;
        }
        match self.mode {
            DragMode::Zoom => Gesture::Zoom {
                from_px: drag.start_x.min(drag.current_x),
                to_px: drag.start_x.max(drag.current_x),
            },
            DragMode::Pan => Gesture::PanEnd { dx: drag.delta_x },
        }
    }

    /// dragging -> idle without applying anything. Returns whether a drag was
    /// discarded.
    pub fn on_pointer_leave(&mut self) -> bool {
        std::mem::take(&mut self.drag).active
    }

    /// Pixel x-extent of the zoom rectangle while a zoom drag is in progress.
    pub fn zoom_extent(&self) -> Option<(f64, f64)> {
        (self.drag.active && self.mode == DragMode::Zoom && self.drag.axis.is_none())
            .then(|| (self.drag.start_x.min(self.drag.current_x), self.drag.start_x.max(self.drag.current_x)))
    }

    fn track(&mut self, x: f64, y: f64) {
        self.drag.delta_x = x - self.drag.current_x;
        self.drag.delta_y = y - self.drag.current_y;
        self.drag.current_x = x;
        self.drag.current_y = y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_displacement_is_a_click() {
        let mut i = Interaction::new(DragMode::Zoom, 20.0);
        i.on_pointer_down(50.0, 50.0, None);
        assert_eq!(i.on_pointer_up(52.0, 51.0), Gesture::Click { x: 52.0, y: 51.0 });
        assert!(!i.is_dragging());
    }

    #[test]
    fn zoom_drag_reports_ordered_extent() {
        let mut i = Interaction::new(DragMode::Zoom, 5.0);
        i.on_pointer_down(300.0, 40.0, None);
        assert_eq!(i.on_pointer_move(200.0, 45.0), None);
        assert_eq!(i.zoom_extent(), Some((200.0, 300.0)));
        assert_eq!(i.on_pointer_up(120.0, 45.0), Gesture::Zoom { from_px: 120.0, to_px: 300.0 });
        assert_eq!(i.zoom_extent(), None);
    }

    #[test]
    fn pan_moves_emit_per_move_deltas() {
        let mut i = Interaction::new(DragMode::Pan, 5.0);
        i.on_pointer_down(10.0, 10.0, None);
        assert_eq!(i.on_pointer_move(15.0, 10.0), Some(5.0));
        assert_eq!(i.on_pointer_move(45.0, 12.0), Some(30.0));
        assert_eq!(i.state().delta_y, 2.0);
        assert_eq!(i.on_pointer_up(50.0, 12.0), Gesture::PanEnd { dx: 5.0 });
    }

    #[test]
    fn leave_discards_the_drag() {
        let mut i = Interaction::new(DragMode::Zoom, 5.0);
        assert!(!i.on_pointer_leave());
        i.on_pointer_down(0.0, 0.0, None);
        i.on_pointer_move(100.0, 0.0);
        assert!(i.on_pointer_leave());
        assert_eq!(*i.state(), DragState::default());
        assert_eq!(i.on_pointer_up(100.0, 0.0), Gesture::Ignored);
    }

    #[test]
    fn value_axis_drags_are_ignored() {
        let mut i = Interaction::new(DragMode::Pan, 5.0);
        i.on_pointer_down(5.0, 10.0, Some(AxisSide::Left));
        assert_eq!(i.on_pointer_move(5.0, 80.0), None);
        assert_eq!(i.on_pointer_up(5.0, 90.0), Gesture::Ignored);
    }
}
