// File: crates/timechart-core/benches/transform_bench.rs
// Summary: Criterion benchmarks for rescaling and projecting large datasets, plus hit-testing.

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use timechart_core::axis::{AxisSide, XAxis, YAxis};
use timechart_core::geometry::PixelPoint;
use timechart_core::hit::hit_test;
use timechart_core::scale::project;
use timechart_core::series::{to_ms, Dataset, Point};

fn build_axes(n: usize) -> (XAxis, [YAxis; 2]) {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let pts = (0..n)
        .map(|i| Point::raw(t0 + Duration::milliseconds(i as i64 * 100), (i as f64 * 0.01).sin() * 10.0))
        .collect();
    let mut left = YAxis::new(AxisSide::Left);
    left.adopt(Dataset::with_points("sine", pts));
    let start = to_ms(t0);
    let x = XAxis::new(start, start + n as f64 * 100.0, 880.0);
    (x, [left, YAxis::new(AxisSide::Right)])
}

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("rescale_and_project");
    for &n in &[10_000usize, 50_000usize] {
        group.bench_function(format!("points_{n}"), |b| {
            let (x, mut axes) = build_axes(n);
            b.iter(|| {
                for axis in &mut axes {
                    axis.rescale(x.domain_start, x.domain_end, 560.0, 0.05, 1.0);
                }
                black_box(project(&x, &axes))
            });
        });
    }
    group.finish();
}

fn bench_hit_test(c: &mut Criterion) {
    let (x, mut axes) = build_axes(50_000);
    axes[0].rescale(x.domain_start, x.domain_end, 560.0, 0.05, 1.0);
    let table = project(&x, &axes);
    c.bench_function("hit_test_miss_50k", |b| {
        b.iter(|| hit_test(black_box(PixelPoint::new(440.0, -100.0)), &[], &table, 6.0))
    });
}

criterion_group!(benches, bench_transform, bench_hit_test);
criterion_main!(benches);
