// File: crates/timechart-core/src/scheduler.rs
// Summary: Bounded-concurrency job scheduler with a capacity-bounded, oldest-evicting wait queue.

use std::collections::VecDeque;
use std::future::Future;
use std::task::{Context, Poll};

use futures::future::LocalBoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;

/// An asynchronous unit of work resolving to success or failure. Synchronous work
/// cannot be scheduled; wrap a ready value in `async move { .. }` if needed.
pub type Job<T> = LocalBoxFuture<'static, anyhow::Result<T>>;

/// What happened to a job on [`Scheduler::enqueue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Started immediately.
    Started,
    /// Waiting for a running slot.
    Queued,
    /// Waiting; the oldest waiting job was dropped to make room.
    QueuedEvictingOldest,
    /// Dropped: the queue holds no jobs at all (capacity 0) and every slot is busy.
    Rejected,
}

/// Runs at most `max_running` jobs at once; up to `capacity` more wait in FIFO order.
///
/// Single-threaded: jobs make progress only while the owner polls
/// [`Scheduler::poll_next`]. Failed jobs are logged and never retried. There is no
/// cancellation of running jobs; only waiting ones can be evicted.
pub struct Scheduler<T> {
    name: &'static str,
    max_running: usize,
    capacity: usize,
    waiting: VecDeque<Job<T>>,
    running: FuturesUnordered<Job<T>>,
    evicted: u64,
    failed: u64,
}

impl<T: 'static> Scheduler<T> {
    pub fn new(name: &'static str, max_running: usize, capacity: usize) -> Self {
        Self {
            name,
            max_running: max_running.max(1),
            capacity,
            waiting: VecDeque::with_capacity(capacity),
            running: FuturesUnordered::new(),
            evicted: 0,
            failed: 0,
        }
    }

    /// Admit `job`, starting it if a slot is free.
    pub fn enqueue<F>(&mut self, job: F) -> Admission
    where
        F: Future<Output = anyhow::Result<T>> + 'static,
    {
        let job = job.boxed_local();
        if self.running.len() < self.max_running {
            self.running.push(job);
            tracing::debug!(scheduler = self.name, running = self.running.len(), "job started");
            return Admission::Started;
        }
        if self.capacity == 0 {
            self.evicted += 1;
            tracing::debug!(scheduler = self.name, "job rejected, no queue capacity");
            return Admission::Rejected;
        }
        let admission = if self.waiting.len() >= self.capacity {
            self.waiting.pop_front();
            self.evicted += 1;
            tracing::debug!(scheduler = self.name, evicted = self.evicted, "evicted oldest waiting job");
            Admission::QueuedEvictingOldest
        } else {
            Admission::Queued
        };
        self.waiting.push_back(job);
        admission
    }

    /// Poll running jobs. `Ready(Some(v))` for each success, `Ready(None)` once
    /// nothing is running or waiting, `Pending` otherwise.
    pub fn poll_next(&mut self, cx: &mut Context<'_>) -> Poll<Option<T>> {
        loop {
            self.launch_waiting();
            match self.running.poll_next_unpin(cx) {
                Poll::Ready(Some(Ok(v))) => {
                    self.launch_waiting();
                    return Poll::Ready(Some(v));
                }
                Poll::Ready(Some(Err(e))) => {
                    self.failed += 1;
                    tracing::warn!(scheduler = self.name, error = %e, "job failed; not retrying");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }

    /// Resolve with the next successful job output, or `None` when idle.
    pub async fn next(&mut self) -> Option<T> {
        futures::future::poll_fn(|cx| self.poll_next(cx)).await
    }

    fn launch_waiting(&mut self) {
        while self.running.len() < self.max_running {
            match self.waiting.pop_front() {
                Some(job) => self.running.push(job),
                None => break,
            }
        }
    }

    pub fn running(&self) -> usize { self.running.len() }

    pub fn waiting(&self) -> usize { self.waiting.len() }

    pub fn is_idle(&self) -> bool { self.running.is_empty() && self.waiting.is_empty() }

    /// Jobs dropped before they started (evicted or rejected).
    pub fn evicted(&self) -> u64 { self.evicted }

    pub fn failed(&self) -> u64 { self.failed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<u32>>>;

    fn recording(log: &Log, id: u32) -> impl Future<Output = anyhow::Result<u32>> {
        let log = log.clone();
        async move {
            log.borrow_mut().push(id);
            Ok(id)
        }
    }

    fn blocked(log: &Log, id: u32) -> (oneshot::Sender<()>, impl Future<Output = anyhow::Result<u32>>) {
        let (tx, rx) = oneshot::channel::<()>();
        let log = log.clone();
        (tx, async move {
            rx.await?;
            log.borrow_mut().push(id);
            Ok(id)
        })
    }

    fn drain(s: &mut Scheduler<u32>) -> Vec<u32> {
        block_on(async {
            let mut out = Vec::new();
            while let Some(v) = s.next().await {
                out.push(v);
            }
            out
        })
    }

    #[test]
    fn overflow_evicts_oldest_waiting_only() {
        let log: Log = Rc::default();
        let mut s = Scheduler::new("test", 1, 2);
        let (release, blocker) = blocked(&log, 0);
        assert_eq!(s.enqueue(blocker), Admission::Started);
        assert_eq!(s.enqueue(recording(&log, 1)), Admission::Queued);
        assert_eq!(s.enqueue(recording(&log, 2)), Admission::Queued);
        // a batch of C + 1 jobs while C are already waiting
        assert_eq!(s.enqueue(recording(&log, 10)), Admission::QueuedEvictingOldest);
        assert_eq!(s.enqueue(recording(&log, 11)), Admission::QueuedEvictingOldest);
        assert_eq!(s.enqueue(recording(&log, 12)), Admission::QueuedEvictingOldest);
        assert_eq!(s.waiting(), 2);
        assert_eq!(s.evicted(), 3);
        release.send(()).unwrap();
        assert_eq!(drain(&mut s), vec![0, 11, 12]);
        assert_eq!(*log.borrow(), vec![0, 11, 12]);
        assert!(s.is_idle());
    }

    #[test]
    fn respects_concurrency_limit() {
        let log: Log = Rc::default();
        let mut s = Scheduler::new("test", 2, 4);
        let (r1, b1) = blocked(&log, 1);
        let (r2, b2) = blocked(&log, 2);
        s.enqueue(b1);
        s.enqueue(b2);
        assert_eq!(s.enqueue(recording(&log, 3)), Admission::Queued);
        assert_eq!((s.running(), s.waiting()), (2, 1));
        r2.send(()).unwrap();
        r1.send(()).unwrap();
        let mut done = drain(&mut s);
        done.sort_unstable();
        assert_eq!(done, vec![1, 2, 3]);
    }

    #[test]
    fn failures_are_logged_and_the_queue_moves_on() {
        let log: Log = Rc::default();
        let mut s: Scheduler<u32> = Scheduler::new("test", 1, 1);
        s.enqueue(async { Err(anyhow::anyhow!("offline")) });
        s.enqueue(recording(&log, 7));
        assert_eq!(drain(&mut s), vec![7]);
        assert_eq!(s.failed(), 1);
    }

    #[test]
    fn zero_capacity_rejects_when_busy() {
        let log: Log = Rc::default();
        let mut s = Scheduler::new("test", 1, 0);
        let (release, blocker) = blocked(&log, 0);
        s.enqueue(blocker);
        assert_eq!(s.enqueue(recording(&log, 1)), Admission::Rejected);
        release.send(()).unwrap();
        assert_eq!(drain(&mut s), vec![0]);
    }
}
