//! Async event dispatch.
//!
//! Pipeline components report progress, broken references and interrupts as
//! events. Listeners register for an event type, either globally or scoped
//! to a channel; one dispatch thread delivers queued events in order, so a
//! listener never sees events out of sequence and slow listeners never
//! block a worker.
//!
//! `propagate()` queues an event and returns immediately. `trigger_now()`
//! delivers on the calling thread and returns after every listener ran,
//! which lets the caller observe a cancellation flag a listener may have
//! set.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Sender};
use dashmap::DashMap;
use log::warn;
use parking_lot::Mutex;

/// Errors raised by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Event dispatcher is shut down")]
    ShutDown,

    #[error("Failed to start event dispatch thread: {0}")]
    Startup(#[from] std::io::Error),
}

pub type EventResult<T> = Result<T, EventError>;

/// Identifies a scope of listeners. Plain value, cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub u64);

/// The channel every listener without an explicit channel belongs to.
/// Events on any channel also reach global listeners.
pub const GLOBAL_CHANNEL: ChannelId = ChannelId(0);

/// The kinds of event the pipeline emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// A top-level feature finished importing.
    FeatureImported,
    /// A top-level feature finished exporting.
    FeatureExported,
    /// A reference could not be resolved after all passes.
    BrokenReference,
    /// A worker failed to process one item.
    Error,
    /// A component requests the run to stop.
    Interrupt,
    /// Free-form progress or status text.
    StatusMessage,
}

/// Data carried by an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    None,
    Message(String),
    Count(u64),
    /// An unresolved reference: which feature pointed where.
    Reference { gmlid: String, target: String },
    /// A failed item: which worker, which item, what went wrong.
    WorkerError {
        worker: usize,
        item: String,
        message: String,
    },
}

/// One dispatched event.
///
/// The cancellation flag is shared between the event and its producer:
/// clone the event (the flag is shared, not copied), deliver it with
/// `trigger_now`, then check `is_cancelled()`.
#[derive(Debug, Clone)]
pub struct Event {
    pub event_type: EventType,
    pub channel: ChannelId,
    pub payload: EventPayload,
    cancelled: Arc<AtomicBool>,
}

impl Event {
    pub fn new(event_type: EventType, payload: EventPayload) -> Self {
        Self {
            event_type,
            channel: GLOBAL_CHANNEL,
            payload,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn on_channel(mut self, channel: ChannelId) -> Self {
        self.channel = channel;
        self
    }

    /// Mark the event as cancelled. Meaningful with `trigger_now`; later
    /// listeners still receive the event and may inspect the flag.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A listener. Implementations must tolerate delivery from the dispatch
/// thread or, for `trigger_now`, from the producing thread.
pub trait EventHandler: Send + Sync {
    fn handle_event(&self, event: &Event);
}

impl<F> EventHandler for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn handle_event(&self, event: &Event) {
        self(event)
    }
}

/// Handle for deregistering a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    channel: ChannelId,
    handler: Arc<dyn EventHandler>,
}

enum DispatchMessage {
    Deliver(Event),
    Shutdown,
}

type ListenerMap = DashMap<EventType, Vec<Registration>>;

/// The dispatcher. One per run; shared via `Arc`.
pub struct EventDispatcher {
    listeners: Arc<ListenerMap>,
    tx: Sender<DispatchMessage>,
    thread: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl EventDispatcher {
    pub fn new() -> EventResult<Self> {
        let listeners: Arc<ListenerMap> = Arc::new(DashMap::new());
        let (tx, rx) = unbounded::<DispatchMessage>();

        let thread_listeners = Arc::clone(&listeners);
        let thread = std::thread::Builder::new()
            .name("event-dispatcher".into())
            .spawn(move || {
                while let Ok(message) = rx.recv() {
                    match message {
                        DispatchMessage::Deliver(event) => {
                            deliver(&thread_listeners, &event);
                        }
                        DispatchMessage::Shutdown => break,
                    }
                }
            })?;

        Ok(Self {
            listeners,
            tx,
            thread: Mutex::new(Some(thread)),
            next_id: AtomicU64::new(1),
        })
    }

    /// Register a listener for an event type on the global channel.
    pub fn add_listener(
        &self,
        event_type: EventType,
        handler: impl EventHandler + 'static,
    ) -> ListenerId {
        self.add_listener_on_channel(event_type, GLOBAL_CHANNEL, handler)
    }

    /// Register a listener scoped to one channel. Global listeners see
    /// events on every channel; scoped listeners only their own.
    pub fn add_listener_on_channel(
        &self,
        event_type: EventType,
        channel: ChannelId,
        handler: impl EventHandler + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.entry(event_type).or_default().push(Registration {
            id,
            channel,
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove a listener. Removing an unknown id is a no-op.
    pub fn remove_listener(&self, id: ListenerId) {
        for mut entry in self.listeners.iter_mut() {
            entry.value_mut().retain(|r| r.id != id);
        }
    }

    /// Queue an event for asynchronous delivery.
    pub fn propagate(&self, event: Event) -> EventResult<()> {
        self.tx
            .send(DispatchMessage::Deliver(event))
            .map_err(|_| EventError::ShutDown)
    }

    /// Deliver an event synchronously on the calling thread. Returns after
    /// every listener ran, so the caller can observe `event.is_cancelled()`.
    pub fn trigger_now(&self, event: &Event) {
        deliver(&self.listeners, event);
    }

    /// Drain the queue and stop the dispatch thread. Idempotent.
    pub fn shutdown(&self) {
        if self.tx.send(DispatchMessage::Shutdown).is_err() {
            return;
        }
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                warn!("event dispatch thread panicked during shutdown");
            }
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn deliver(listeners: &ListenerMap, event: &Event) {
    // Handlers are cloned out so no shard lock is held during delivery;
    // a handler may itself register or remove listeners.
    let handlers: Vec<Arc<dyn EventHandler>> = match listeners.get(&event.event_type) {
        Some(entry) => entry
            .iter()
            .filter(|r| r.channel == GLOBAL_CHANNEL || r.channel == event.channel)
            .map(|r| Arc::clone(&r.handler))
            .collect(),
        None => return,
    };
    for handler in handlers {
        handler.handle_event(event);
    }
}
