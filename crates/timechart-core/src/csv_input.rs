// File: crates/timechart-core/src/csv_input.rs
// Summary: Loads `dataset,date,value` CSV rows into per-dataset point lists.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use crate::memory::MemoryBackend;
use crate::series::{parse_timestamp, Point};
use tracing::{info, warn};

pub type Points = BTreeMap<String, Vec<Point>>;

pub fn load(path: &Path) -> Result<Points> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let points = read(file).with_context(|| format!("reading {}", path.display()))?;
    info!(path = %path.display(), datasets = points.len(), points = points.values().map(Vec::len).sum::<usize>(), "csv loaded");
    Ok(points)
}

/// Header names are matched case-insensitively. Rows whose date or value does
/// not parse are skipped.
pub fn read(input: impl Read) -> Result<Points> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_reader(input);
    let headers = rdr.headers()?.iter().map(str::to_lowercase).collect::<Vec<_>>();
    let column = |names: &[&str]| headers.iter().position(|h| names.contains(&h.as_str()));
    let (Some(i_id), Some(i_date), Some(i_value)) = (
        column(&["dataset", "dataset_id", "id"]),
        column(&["date", "time", "timestamp"]),
        column(&["value", "v"]),
    ) else {
        anyhow::bail!("expected dataset, date and value columns, found {headers:?}");
    };

    let mut out = Points::new();
    let mut skipped = 0usize;
    for rec in rdr.records() {
        let rec = rec?;
        let (Some(id), Some(date), Some(value)) = (rec.get(i_id), rec.get(i_date), rec.get(i_value)) else {
            skipped += 1;
            continue;
        };
        match (parse_timestamp(date), value.parse::<f64>()) {
            (Ok(t), Ok(v)) if v.is_finite() => out.entry(id.to_string()).or_default().push(Point::raw(t, v)),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(skipped, "csv rows skipped");
    }
    Ok(out)
}

pub fn into_memory(points: &Points, fidelity: bool) -> MemoryBackend {
    let backend = if fidelity { MemoryBackend::new().with_fidelity() } else { MemoryBackend::new() };
    for (id, pts) in points {
        backend.insert_points(id, pts.iter().copied());
    }
    backend
}
