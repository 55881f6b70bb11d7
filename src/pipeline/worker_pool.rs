//! Bounded worker pool over OS threads.
//!
//! Producers submit items into a bounded channel and block when workers
//! fall behind, so a fast reader can never exhaust memory. Each worker
//! holds a private lock while processing an item, which makes idleness
//! observable from outside: if every lock is free and the queue is empty,
//! the pool is idle.
//!
//! The first items are seeded directly to workers, one each, before the
//! shared queue comes into play; a worker's first item never races the
//! queue. `join()` is the phase boundary: it closes the queue, waits for
//! every worker to drain, and returns the counters.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, warn};
use parking_lot::Mutex;

use crate::event::{Event, EventDispatcher, EventPayload, EventType};

/// Errors raised by the pool itself. Item failures are events, not errors.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Failed to start worker pool {name}: {reason}")]
    Startup { name: String, reason: String },

    #[error("Worker pool is shut down")]
    ShutDown,
}

pub type PoolResult<T> = Result<T, PoolError>;

/// Cooperative cancellation flag shared between a pool and its owner.
///
/// Cancelling never tears a worker mid-item; workers observe the token
/// between items.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Processes one kind of item on a pool thread.
///
/// A worker owns its resources (a database connection, caches); the pool
/// never shares one worker between threads. Processing errors are reported
/// and counted, the worker lives on.
pub trait Worker: Send + 'static {
    type Item: Send + fmt::Display + 'static;
    type Error: std::error::Error + Send + 'static;

    /// Process one item. The token is the pool's cancellation token; a
    /// long-running item may poll it and bail out early.
    fn process(&mut self, item: Self::Item, token: &CancellationToken)
        -> Result<(), Self::Error>;

    /// Runs once per worker when its queue is drained, before `join()`
    /// returns. Flush buffers, close connections.
    fn finish(&mut self) {}
}

/// Counters of one pool run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub processed: u64,
    pub failed: u64,
}

struct WorkerHandle<T> {
    thread: JoinHandle<()>,
    /// Held by the worker while it processes an item.
    busy: Arc<Mutex<()>>,
    /// One-shot channel for the worker's first item.
    seed: Option<Sender<T>>,
}

/// The pool. Submit items, then `join()` once; the pool is consumed by the
/// phase boundary.
pub struct WorkerPool<W: Worker> {
    name: String,
    tx: Option<Sender<W::Item>>,
    queue: Receiver<W::Item>,
    workers: Vec<WorkerHandle<W::Item>>,
    token: CancellationToken,
    /// Set by a deferred `interrupt_if_idle`; workers stop at their next
    /// item boundary once it is raised.
    shutdown_requested: Arc<AtomicBool>,
    next_seed: usize,
    processed: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl<W: Worker> WorkerPool<W> {
    /// Spawn `size` workers from a factory. The factory runs on the calling
    /// thread so startup failures surface before any work is accepted.
    pub fn new(
        name: &str,
        size: usize,
        queue_size: usize,
        mut factory: impl FnMut() -> Result<W, Box<dyn std::error::Error + Send + Sync>>,
        dispatcher: Arc<EventDispatcher>,
        token: CancellationToken,
    ) -> PoolResult<Self> {
        if size == 0 || queue_size == 0 {
            return Err(PoolError::Startup {
                name: name.to_string(),
                reason: "pool size and queue size must be positive".into(),
            });
        }

        let (tx, rx) = bounded::<W::Item>(queue_size);
        let processed = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));
        let shutdown_requested = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let worker = factory().map_err(|e| PoolError::Startup {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
            let (seed_tx, seed_rx) = bounded::<W::Item>(1);
            let busy = Arc::new(Mutex::new(()));

            let thread = std::thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(worker_loop(
                    worker,
                    index,
                    seed_rx,
                    rx.clone(),
                    Arc::clone(&busy),
                    token.clone(),
                    Arc::clone(&shutdown_requested),
                    Arc::clone(&dispatcher),
                    Arc::clone(&processed),
                    Arc::clone(&failed),
                ))
                .map_err(|e| PoolError::Startup {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?;

            workers.push(WorkerHandle {
                thread,
                busy,
                seed: Some(seed_tx),
            });
        }

        debug!("worker pool {name}: {size} workers, queue depth {queue_size}");
        Ok(Self {
            name: name.to_string(),
            tx: Some(tx),
            queue: rx,
            workers,
            token,
            shutdown_requested,
            next_seed: 0,
            processed,
            failed,
        })
    }

    /// Submit an item. The first `size` items are seeded one-per-worker;
    /// later items go through the bounded queue and block when it is full.
    pub fn submit(&mut self, item: W::Item) -> PoolResult<()> {
        if self.token.is_cancelled() {
            return Err(PoolError::ShutDown);
        }

        if self.next_seed < self.workers.len() {
            // One-shot seed channel: send, then drop the sender so the
            // worker falls through to the shared queue afterwards.
            if let Some(seed) = self.workers[self.next_seed].seed.take() {
                self.next_seed += 1;
                if seed.send(item).is_ok() {
                    return Ok(());
                }
                return Err(PoolError::ShutDown);
            }
        }

        let tx = self.tx.as_ref().ok_or(PoolError::ShutDown)?;
        tx.send(item).map_err(|_| PoolError::ShutDown)
    }

    /// Whether every worker is between items and the queue is empty.
    pub fn is_idle(&self) -> bool {
        if !self.queue.is_empty() {
            return false;
        }
        self.workers.iter().all(|w| {
            // try_lock succeeds only while the worker is not processing.
            match w.busy.try_lock() {
                Some(_guard) => true,
                None => false,
            }
        })
    }

    /// Cancel the run. Queued items are dropped, in-flight items finish.
    pub fn interrupt(&mut self) {
        self.token.cancel();
        self.close_channels();
        while self.queue.try_recv().is_ok() {}
    }

    /// Interrupt if the pool is currently idle, else defer the shutdown:
    /// no further work is accepted and each worker stops at its next item
    /// boundary, after its in-flight item completes. Returns whether the
    /// pool was idle at call time.
    pub fn interrupt_if_idle(&mut self) -> bool {
        if self.is_idle() {
            self.interrupt();
            return true;
        }
        self.shutdown_requested.store(true, Ordering::SeqCst);
        self.close_channels();
        false
    }

    /// Phase boundary: close the queue, wait for every worker to finish its
    /// backlog, and return the counters.
    pub fn join(mut self) -> PoolStats {
        self.close_channels();
        for handle in self.workers.drain(..) {
            if handle.thread.join().is_err() {
                warn!("worker thread of pool {} panicked", self.name);
            }
        }
        PoolStats {
            processed: self.processed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    fn close_channels(&mut self) {
        self.tx = None;
        for worker in &mut self.workers {
            worker.seed = None;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_loop<W: Worker>(
    mut worker: W,
    index: usize,
    seed: Receiver<W::Item>,
    queue: Receiver<W::Item>,
    busy: Arc<Mutex<()>>,
    token: CancellationToken,
    shutdown_requested: Arc<AtomicBool>,
    dispatcher: Arc<EventDispatcher>,
    processed: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
) -> impl FnOnce() {
    move || {
        // The seeded first item, if any, precedes the shared queue.
        if let Ok(item) = seed.recv() {
            run_item(
                &mut worker,
                index,
                item,
                &busy,
                &token,
                &dispatcher,
                &processed,
                &failed,
            );
        }

        while let Ok(item) = queue.recv() {
            if token.is_cancelled() || shutdown_requested.load(Ordering::SeqCst) {
                break;
            }
            run_item(
                &mut worker,
                index,
                item,
                &busy,
                &token,
                &dispatcher,
                &processed,
                &failed,
            );
        }

        worker.finish();
    }
}

#[allow(clippy::too_many_arguments)]
fn run_item<W: Worker>(
    worker: &mut W,
    index: usize,
    item: W::Item,
    busy: &Mutex<()>,
    token: &CancellationToken,
    dispatcher: &EventDispatcher,
    processed: &AtomicU64,
    failed: &AtomicU64,
) {
    let _guard = busy.lock();
    let label = item.to_string();
    match worker.process(item, token) {
        Ok(()) => {
            processed.fetch_add(1, Ordering::SeqCst);
        }
        Err(e) => {
            failed.fetch_add(1, Ordering::SeqCst);
            warn!("worker {index} failed to process {label}: {e}");
            // A full dispatcher queue is not a reason to kill the worker.
            let _ = dispatcher.propagate(Event::new(
                EventType::Error,
                EventPayload::WorkerError {
                    worker: index,
                    item: label,
                    message: e.to_string(),
                },
            ));
        }
    }
}
