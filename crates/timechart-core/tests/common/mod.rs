// File: crates/timechart-core/tests/common/mod.rs
// Purpose: Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::rc::Rc;
use std::task::{Context, Poll};

use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::executor::block_on;
use futures::task::noop_waker_ref;
use timechart_core::{Chart, ChartConfig, MemoryBackend, Point};

/// Surface size whose plot area is exactly `PLOT_W` x `PLOT_H` with default insets.
pub const PLOT_W: f64 = 100.0;
pub const PLOT_H: f64 = 200.0;
pub const LEFT: f64 = 72.0;
pub const TOP: f64 = 24.0;

pub fn t(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
}

/// Store with `temp` = [(0s, 10), (10s, 20)].
pub fn temp_backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.insert_points("temp", [Point::raw(t(0), 10.0), Point::raw(t(10), 20.0)]);
    backend
}

/// Chart over `backend` with a 100x200 plot showing [0s, 10s], settled.
pub fn chart_on(backend: &MemoryBackend, config: ChartConfig) -> Chart {
    let mut chart = Chart::new(Rc::new(backend.clone()), config).unwrap();
    chart.resize((LEFT * 2.0 + PLOT_W) as i32, (TOP + PLOT_H + 56.0) as i32);
    chart.set_range(t(0), t(10)).unwrap();
    block_on(chart.settle());
    chart
}

/// Surface coordinates of a plot-relative point.
pub fn at(x: f64, y: f64) -> (f64, f64) {
    (x + LEFT, y + TOP)
}

pub fn click(chart: &mut Chart, x: f64, y: f64) {
    let (sx, sy) = at(x, y);
    chart.on_pointer_down(sx, sy);
    chart.on_pointer_up(sx, sy);
}

pub fn drag(chart: &mut Chart, from: f64, to: f64, y: f64) {
    let (fx, fy) = at(from, y);
    let (tx, ty) = at(to, y);
    chart.on_pointer_down(fx, fy);
    chart.on_pointer_move(tx, ty);
    chart.on_pointer_up(tx, ty);
}

/// One non-blocking pass over pending jobs.
pub fn poll_once(chart: &mut Chart) -> Poll<()> {
    let mut cx = Context::from_waker(noop_waker_ref());
    chart.poll_refresh(&mut cx)
}
