// File: crates/timechart-core/src/memory.rs
// Summary: In-process store implementing the backend contract; used by tests and the CSV demos.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use futures::future::{self, FutureExt};
use tracing::debug;

use crate::backend::{Backend, BackendFuture, Comment, CommentQuery, MAX_COMMENT_HITS};
use crate::error::BackendError;
use crate::series::{from_ms, to_ms, Dataset, Point};

/// Requests served so far, by kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestCounts {
    pub data: usize,
    pub comments: usize,
    pub edits: usize,
    pub search: usize,
}

#[derive(Debug, Default)]
struct Store {
    datasets: BTreeMap<String, Vec<Point>>,
    /// Sorted by date; equal dates keep insertion order.
    comments: Vec<Comment>,
    last_id: i64,
    offline: bool,
    aggregate: bool,
    malformed: HashSet<String>,
    counts: RequestCounts,
}

/// Cheap-to-clone handle; clones share one store.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    store: Rc<RefCell<Store>>,
}

impl MemoryBackend {
    pub fn new() -> Self { Self::default() }

    /// Serve coarser aggregates for wide windows, like the disk-backed store does.
    pub fn with_fidelity(self) -> Self {
        self.store.borrow_mut().aggregate = true;
        self
    }

    /// Append points to `id`, creating it if needed. Points are kept time-ordered.
    pub fn insert_points(&self, id: &str, points: impl IntoIterator<Item = Point>) {
        let mut store = self.store.borrow_mut();
        let slot = store.datasets.entry(id.to_string()).or_default();
        slot.extend(points);
        slot.sort_by(|a, b| a.timestamp().cmp(&b.timestamp()));
    }

    /// Store a comment directly, assigning an id. Returns the id.
    pub fn insert_comment(&self, comment: Comment) -> Result<i64, BackendError> {
        self.store.borrow_mut().create(comment)
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.store.borrow().comments.clone()
    }

    pub fn dataset_ids(&self) -> Vec<String> {
        self.store.borrow().datasets.keys().cloned().collect()
    }

    /// While offline every request fails with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.store.borrow_mut().offline = offline;
    }

    /// Answer data requests for `id` with an incomplete body.
    pub fn set_malformed(&self, id: &str, malformed: bool) {
        let mut store = self.store.borrow_mut();
        if malformed {
            store.malformed.insert(id.to_string());
        } else {
            store.malformed.remove(id);
        }
    }

    pub fn requests(&self) -> RequestCounts {
        self.store.borrow().counts
    }

    fn serve<T: 'static>(&self, count: fn(&mut RequestCounts), f: impl FnOnce(&mut Store) -> Result<T, BackendError>) -> BackendFuture<T> {
        let mut store = self.store.borrow_mut();
        count(&mut store.counts);
        let result = if store.offline {
            Err(BackendError::Transport("store is offline".into()))
        } else {
            f(&mut store)
        };
        future::ready(result).boxed_local()
    }
}

impl Store {
    fn create(&mut self, mut comment: Comment) -> Result<i64, BackendError> {
        check_separators(&comment)?;
        self.last_id += 1;
        comment.id = self.last_id;
        let at = self.comments.partition_point(|c| c.date <= comment.date);
        self.comments.insert(at, comment);
        Ok(self.last_id)
    }

    fn update(&mut self, comment: Comment) -> Result<(), BackendError> {
        check_separators(&comment)?;
        let slot = self
            .comments
            .iter_mut()
            .find(|c| c.id == comment.id)
            .ok_or_else(|| BackendError::Rejected(format!("no comment with id {}", comment.id)))?;
        *slot = comment;
        self.comments.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(())
    }

    fn delete(&mut self, id: i64) -> Result<(), BackendError> {
        let idx = self
            .comments
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| BackendError::Rejected(format!("no comment with id {id}")))?;
        self.comments.remove(idx);
        Ok(())
    }

    fn query(&self, q: &CommentQuery) -> Vec<Comment> {
        self.comments
            .iter()
            .filter(|c| c.date >= q.start && c.date <= q.end && c.has_tags(&q.tags))
            .take(MAX_COMMENT_HITS)
            .cloned()
            .collect()
    }

    fn fetch(&self, id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Dataset> {
        if self.malformed.contains(id) {
            return None;
        }
        let points: Vec<Point> = self
            .datasets
            .get(id)
            .map(|pts| pts.iter().filter(|p| p.timestamp() >= start && p.timestamp() <= end).copied().collect())
            .unwrap_or_default();
        let span_secs = (end - start).num_milliseconds() as f64 / 1_000.0;
        let points = match bin_seconds(span_secs).filter(|_| self.aggregate) {
            Some(bin) => aggregate(&points, bin),
            None => points,
        };
        Some(Dataset::with_points(id, points))
    }
}

fn check_separators(c: &Comment) -> Result<(), BackendError> {
    if c.text.contains(';') || c.tags.iter().any(|t| t.contains(';')) {
        return Err(BackendError::Rejected("fields may not contain semicolons".into()));
    }
    Ok(())
}

/// Points returned per query at full fidelity, assuming ~10 Hz telemetry.
const MAX_QUERY_POINTS: f64 = 5_000.0;

/// Aggregation bin for a query window, or `None` to serve raw points.
pub fn bin_seconds(span_secs: f64) -> Option<f64> {
    if span_secs < MAX_QUERY_POINTS / 10.0 {
        return None;
    }
    let mut bin = 1.0;
    while bin < 100_000.0 && span_secs >= MAX_QUERY_POINTS * bin {
        bin *= 10.0;
    }
    Some(bin)
}

/// Fold consecutive points into `{mean, min, max}` aggregates per `bin_secs` bucket,
/// stamped with the bucket start.
pub fn aggregate(points: &[Point], bin_secs: f64) -> Vec<Point> {
    let bin_ms = bin_secs * 1_000.0;
    let mut out = Vec::new();
    let mut current: Option<(f64, Vec<f64>)> = None;
    for p in points {
        let slot = (p.time_ms() / bin_ms).floor() * bin_ms;
        if let Some((t, values)) = current.as_mut() {
            if *t == slot {
                values.push(p.value());
                continue;
            }
        }
        if let Some((t, values)) = current.take() {
            out.extend(fold(t, &values));
        }
        current = Some((slot, vec![p.value()]));
    }
    if let Some((t, values)) = current {
        out.extend(fold(t, &values));
    }
    out
}

fn fold(t_ms: f64, values: &[f64]) -> Option<Point> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    from_ms(t_ms).map(|t| Point::aggregate(t, mean, min, max))
}

impl Backend for MemoryBackend {
    fn fetch_dataset(&self, id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> BackendFuture<Option<Dataset>> {
        debug!(dataset = id, start = to_ms(start), end = to_ms(end), "memory fetch");
        let id = id.to_string();
        self.serve(|c| c.data += 1, move |s| Ok(s.fetch(&id, start, end)))
    }

    fn fetch_comments(&self, query: &CommentQuery) -> BackendFuture<Vec<Comment>> {
        let query = query.clone();
        self.serve(|c| c.comments += 1, move |s| Ok(s.query(&query)))
    }

    fn create_comment(&self, comment: &Comment) -> BackendFuture<i64> {
        let comment = comment.clone();
        self.serve(|c| c.edits += 1, move |s| s.create(comment))
    }

    fn update_comment(&self, comment: &Comment) -> BackendFuture<()> {
        let comment = comment.clone();
        self.serve(|c| c.edits += 1, move |s| s.update(comment))
    }

    fn delete_comment(&self, id: i64) -> BackendFuture<()> {
        self.serve(|c| c.edits += 1, move |s| s.delete(id))
    }

    fn search_datasets(&self, text: &str) -> BackendFuture<Vec<String>> {
        let needle = text.trim().to_lowercase();
        self.serve(|c| c.search += 1, move |s| {
            Ok(s.datasets.keys().filter(|id| id.to_lowercase().contains(&needle)).cloned().collect())
        })
    }
}
