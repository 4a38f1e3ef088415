// File: crates/timechart-core/tests/refresh.rs
// Purpose: Refresh scheduling against a store: eviction, stale responses, failures, annotation edits.

mod common;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use common::*;
use futures::channel::oneshot;
use futures::executor::block_on;
use futures::task::{waker, ArcWake};
use futures::FutureExt;
use timechart_core::backend::{Backend, BackendFuture, Comment, CommentQuery};
use timechart_core::{
    Admission, AnnotationForm, AxisSide, BackendError, Chart, ChartConfig, ChartError, Dataset, MemoryBackend, Point,
};

/// Store whose data responses are held until the test releases them, in request order.
struct GatedBackend {
    inner: MemoryBackend,
    gates: RefCell<VecDeque<oneshot::Sender<()>>>,
    windows: RefCell<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
}

impl GatedBackend {
    fn new(inner: MemoryBackend) -> Rc<Self> {
        Rc::new(Self { inner, gates: RefCell::new(VecDeque::new()), windows: RefCell::new(Vec::new()) })
    }

    fn release_next(&self) {
        let gate = self.gates.borrow_mut().pop_front().expect("a held request");
        gate.send(()).unwrap();
    }
}

impl Backend for GatedBackend {
    fn fetch_dataset(&self, id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> BackendFuture<Option<Dataset>> {
        let (tx, rx) = oneshot::channel();
        self.gates.borrow_mut().push_back(tx);
        self.windows.borrow_mut().push((start, end));
        let response = self.inner.fetch_dataset(id, start, end);
        async move {
            let _ = rx.await;
            response.await
        }
        .boxed_local()
    }

    fn fetch_comments(&self, query: &CommentQuery) -> BackendFuture<Vec<Comment>> {
        self.inner.fetch_comments(query)
    }

    fn create_comment(&self, comment: &Comment) -> BackendFuture<i64> {
        self.inner.create_comment(comment)
    }

    fn update_comment(&self, comment: &Comment) -> BackendFuture<()> {
        self.inner.update_comment(comment)
    }

    fn delete_comment(&self, id: i64) -> BackendFuture<()> {
        self.inner.delete_comment(id)
    }

    fn search_datasets(&self, text: &str) -> BackendFuture<Vec<String>> {
        self.inner.search_datasets(text)
    }
}

/// Store that answers every request except data for one broken dataset id.
struct OneBrokenDataset {
    inner: MemoryBackend,
    broken: &'static str,
}

impl Backend for OneBrokenDataset {
    fn fetch_dataset(&self, id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> BackendFuture<Option<Dataset>> {
        if id == self.broken {
            return futures::future::ready(Err(BackendError::Status(400))).boxed_local();
        }
        self.inner.fetch_dataset(id, start, end)
    }

    fn fetch_comments(&self, query: &CommentQuery) -> BackendFuture<Vec<Comment>> {
        self.inner.fetch_comments(query)
    }

    fn create_comment(&self, comment: &Comment) -> BackendFuture<i64> {
        self.inner.create_comment(comment)
    }

    fn update_comment(&self, comment: &Comment) -> BackendFuture<()> {
        self.inner.update_comment(comment)
    }

    fn delete_comment(&self, id: i64) -> BackendFuture<()> {
        self.inner.delete_comment(id)
    }

    fn search_datasets(&self, text: &str) -> BackendFuture<Vec<String>> {
        self.inner.search_datasets(text)
    }
}

#[test]
fn queued_refresh_is_evicted_and_stale_response_still_lands() {
    let gated = GatedBackend::new(temp_backend());
    let mut chart = Chart::new(gated.clone(), ChartConfig::default()).unwrap();
    chart.resize((LEFT * 2.0 + PLOT_W) as i32, (TOP + PLOT_H + 56.0) as i32);
    chart.set_range(t(0), t(10)).unwrap();
    block_on(chart.settle());

    assert!(chart.add_dataset("temp"));
    // first poll sends the [0s, 10s] request and parks on the gate
    assert_eq!(poll_once(&mut chart), Poll::Pending);
    assert_eq!(chart.set_range(t(0), t(5)), Ok(()));
    assert_eq!(chart.request_refresh(), Admission::QueuedEvictingOldest);
    chart.set_range(t(0), t(8)).unwrap();
    assert_eq!(chart.refreshes_evicted(), 2);

    // the slow response for the abandoned window is applied anyway
    gated.release_next();
    assert_eq!(poll_once(&mut chart), Poll::Pending);
    assert_eq!(chart.dataset("temp").unwrap().points.len(), 2);

    gated.release_next();
    assert_eq!(poll_once(&mut chart), Poll::Ready(()));
    assert_eq!(chart.dataset("temp").unwrap().points.len(), 1);

    // only the first and the newest window were ever requested
    let windows = gated.windows.borrow();
    assert_eq!(windows.as_slice(), &[(t(0), t(10)), (t(0), t(8))]);
}

struct Flag(AtomicBool);

impl ArcWake for Flag {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.store(true, Ordering::SeqCst);
    }
}

#[test]
fn landing_response_wakes_the_host() {
    let gated = GatedBackend::new(temp_backend());
    let mut chart = Chart::new(gated.clone(), ChartConfig::default()).unwrap();
    chart.set_range(t(0), t(10)).unwrap();
    block_on(chart.settle());
    chart.add_dataset("temp");

    let flag = Arc::new(Flag(AtomicBool::new(false)));
    let host = waker(flag.clone());
    let mut cx = Context::from_waker(&host);
    assert_eq!(chart.poll_refresh(&mut cx), Poll::Pending);
    assert!(!flag.0.load(Ordering::SeqCst));

    gated.release_next();
    assert!(flag.0.load(Ordering::SeqCst));
    assert_eq!(chart.poll_refresh(&mut cx), Poll::Ready(()));
    assert_eq!(chart.dataset("temp").unwrap().points.len(), 2);
}

#[test]
fn refresh_snapshots_every_owned_dataset() {
    let backend = temp_backend();
    backend.insert_points("load", [Point::raw(t(3), 0.5)]);
    let mut chart = chart_on(&backend, ChartConfig::default());
    chart.add_dataset("temp");
    // queued behind the running refresh, which only knew about temp
    chart.add_dataset_to("load", AxisSide::Right);
    block_on(chart.settle());
    assert_eq!(chart.dataset("temp").unwrap().points.len(), 2);
    assert_eq!(chart.dataset("load").unwrap().points.len(), 1);
}

#[test]
fn network_failure_keeps_the_last_good_state() {
    let backend = temp_backend();
    let mut chart = chart_on(&backend, ChartConfig::default());
    chart.add_dataset("temp");
    block_on(chart.settle());

    backend.set_offline(true);
    chart.set_range(t(0), t(5)).unwrap();
    block_on(chart.settle());
    assert_eq!(chart.refreshes_failed(), 1);
    assert_eq!(chart.dataset("temp").unwrap().points.len(), 2);

    // not retried on its own
    backend.set_offline(false);
    assert_eq!(chart.pending_jobs(), 0);
    chart.request_refresh();
    block_on(chart.settle());
    assert_eq!(chart.dataset("temp").unwrap().points.len(), 1);
}

#[test]
fn one_failing_dataset_does_not_block_the_others() {
    let inner = temp_backend();
    inner.insert_points("bad", [Point::raw(t(1), 1.0)]);
    inner.insert_comment(Comment::new(t(4), "kept", vec![])).unwrap();
    let backend = Rc::new(OneBrokenDataset { inner, broken: "bad" });
    let mut chart = Chart::new(backend, ChartConfig::default()).unwrap();
    chart.resize((LEFT * 2.0 + PLOT_W) as i32, (TOP + PLOT_H + 56.0) as i32);
    chart.set_range(t(0), t(10)).unwrap();

    chart.add_dataset("bad");
    chart.add_dataset("temp");
    block_on(chart.settle());
    assert_eq!(chart.dataset("temp").unwrap().points.len(), 2);
    assert!(chart.dataset("bad").unwrap().points.is_empty());
    assert_eq!(chart.comments().len(), 1);
    assert_eq!(chart.refreshes_failed(), 0);

    // later windows keep refreshing the healthy dataset
    chart.set_range(t(0), t(5)).unwrap();
    block_on(chart.settle());
    assert_eq!(chart.dataset("temp").unwrap().points.len(), 1);
}

#[test]
fn incomplete_response_is_dropped_silently() {
    let backend = temp_backend();
    backend.set_malformed("temp", true);
    backend.insert_comment(Comment::new(t(4), "kept", vec![])).unwrap();
    let mut chart = chart_on(&backend, ChartConfig::default());
    chart.add_dataset("temp");
    block_on(chart.settle());
    assert!(chart.dataset("temp").unwrap().points.is_empty());
    assert_eq!(chart.comments().len(), 1);
    assert_eq!(chart.refreshes_failed(), 0);

    backend.set_malformed("temp", false);
    chart.request_refresh();
    block_on(chart.settle());
    assert_eq!(chart.dataset("temp").unwrap().points.len(), 2);
}

#[test]
fn comments_respect_tag_filter() {
    let backend = temp_backend();
    backend.insert_comment(Comment::new(t(2), "deploy", vec!["ops".into()])).unwrap();
    backend.insert_comment(Comment::new(t(3), "lunch", vec![])).unwrap();
    let config = ChartConfig { comment_tags: vec!["ops".into()], ..ChartConfig::default() };
    let chart = chart_on(&backend, config);
    let texts: Vec<&str> = chart.comments().iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["deploy"]);
}

#[test]
fn annotation_create_edit_delete_round_trip() {
    let backend = temp_backend();
    let config = ChartConfig { comment_tags: vec!["ops".into()], ..ChartConfig::default() };
    let mut chart = chart_on(&backend, config);

    assert_eq!(chart.submit_annotation("nothing open"), Err(ChartError::NoAnnotationForm));

    click(&mut chart, 50.0, 100.0);
    assert!(matches!(chart.form(), Some(AnnotationForm::New { .. })));
    chart.submit_annotation("deploy").unwrap();
    assert!(chart.form().is_none());
    block_on(chart.settle());
    assert_eq!(backend.comments().len(), 1);
    assert_eq!(backend.comments()[0].tags, vec!["ops".to_string()]);
    assert_eq!(chart.comments().len(), 1);
    let id = chart.comments()[0].id;

    // clicking the marker opens it for editing
    click(&mut chart, 50.0, 150.0);
    match chart.form() {
        Some(AnnotationForm::Edit { comment }) => assert_eq!(comment.id, id),
        other => panic!("expected edit form, got {other:?}"),
    }
    chart.submit_annotation("rollback").unwrap();
    block_on(chart.settle());
    assert_eq!(chart.comments()[0].text, "rollback");

    click(&mut chart, 50.0, 3.0);
    assert_eq!(chart.form().and_then(AnnotationForm::editing), Some(id));
    assert!(chart.delete_annotation().unwrap().is_some());
    block_on(chart.settle());
    assert!(backend.comments().is_empty());
    assert!(chart.comments().is_empty());
}

#[test]
fn rejected_edit_is_logged_not_surfaced() {
    let backend = temp_backend();
    let mut chart = chart_on(&backend, ChartConfig::default());
    click(&mut chart, 30.0, 30.0);
    chart.submit_annotation("a;b").unwrap();
    block_on(chart.settle());
    assert!(backend.comments().is_empty());
    assert_eq!(chart.pending_jobs(), 0);

    // discarding a draft sends nothing
    click(&mut chart, 30.0, 30.0);
    assert_eq!(chart.delete_annotation(), Ok(None));
    assert_eq!(backend.requests().edits, 1);
}

#[test]
fn dataset_search_goes_to_the_store() {
    let backend = MemoryBackend::new();
    for id in ["cpu.load", "cpu.temp", "disk.free"] {
        backend.insert_points(id, Vec::<Point>::new());
    }
    let chart = Chart::new(Rc::new(backend.clone()), ChartConfig::default()).unwrap();
    assert_eq!(block_on(chart.search_datasets("cpu")).unwrap(), vec!["cpu.load", "cpu.temp"]);
}
