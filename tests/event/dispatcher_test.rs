//! Event dispatch: ordering, scoping, sync delivery and shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use citystore::event::{
    ChannelId, Event, EventDispatcher, EventError, EventPayload, EventType, GLOBAL_CHANNEL,
};

fn wait_for(predicate: impl Fn() -> bool) {
    for _ in 0..200 {
        if predicate() {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("condition not met within 1s");
}

#[test]
fn propagate_delivers_asynchronously_in_order() {
    let dispatcher = EventDispatcher::new().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    dispatcher.add_listener(EventType::FeatureImported, move |e: &Event| {
        if let EventPayload::Count(n) = e.payload {
            sink.lock().push(n);
        }
    });

    for n in 0..100 {
        dispatcher
            .propagate(Event::new(EventType::FeatureImported, EventPayload::Count(n)))
            .unwrap();
    }

    wait_for(|| seen.lock().len() == 100);
    assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
}

#[test]
fn listeners_only_see_their_event_type() {
    let dispatcher = EventDispatcher::new().unwrap();
    let count = Arc::new(AtomicUsize::new(0));

    let sink = Arc::clone(&count);
    dispatcher.add_listener(EventType::BrokenReference, move |_: &Event| {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    dispatcher.trigger_now(&Event::new(EventType::StatusMessage, EventPayload::None));
    assert_eq!(count.load(Ordering::SeqCst), 0);

    dispatcher.trigger_now(&Event::new(EventType::BrokenReference, EventPayload::None));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn channel_scoping_filters_scoped_listeners_only() {
    let dispatcher = EventDispatcher::new().unwrap();
    let global = Arc::new(AtomicUsize::new(0));
    let scoped = Arc::new(AtomicUsize::new(0));

    let g = Arc::clone(&global);
    dispatcher.add_listener(EventType::FeatureImported, move |_: &Event| {
        g.fetch_add(1, Ordering::SeqCst);
    });
    let s = Arc::clone(&scoped);
    dispatcher.add_listener_on_channel(
        EventType::FeatureImported,
        ChannelId(3),
        move |_: &Event| {
            s.fetch_add(1, Ordering::SeqCst);
        },
    );

    dispatcher.trigger_now(
        &Event::new(EventType::FeatureImported, EventPayload::None).on_channel(ChannelId(3)),
    );
    dispatcher.trigger_now(
        &Event::new(EventType::FeatureImported, EventPayload::None).on_channel(ChannelId(4)),
    );
    dispatcher.trigger_now(&Event::new(EventType::FeatureImported, EventPayload::None));

    // Global listeners see every channel; scoped ones only their own.
    assert_eq!(global.load(Ordering::SeqCst), 3);
    assert_eq!(scoped.load(Ordering::SeqCst), 1);
}

#[test]
fn events_default_to_the_global_channel() {
    let event = Event::new(EventType::Interrupt, EventPayload::None);
    assert_eq!(event.channel, GLOBAL_CHANNEL);
    assert_eq!(event.channel, ChannelId(0));
}

#[test]
fn removed_listeners_stop_receiving() {
    let dispatcher = EventDispatcher::new().unwrap();
    let count = Arc::new(AtomicUsize::new(0));

    let sink = Arc::clone(&count);
    let id = dispatcher.add_listener(EventType::StatusMessage, move |_: &Event| {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    dispatcher.trigger_now(&Event::new(EventType::StatusMessage, EventPayload::None));
    dispatcher.remove_listener(id);
    dispatcher.trigger_now(&Event::new(EventType::StatusMessage, EventPayload::None));

    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn trigger_now_lets_the_producer_observe_cancellation() {
    let dispatcher = EventDispatcher::new().unwrap();
    dispatcher.add_listener(EventType::Interrupt, |e: &Event| {
        e.cancel();
    });

    let event = Event::new(EventType::Interrupt, EventPayload::None);
    assert!(!event.is_cancelled());
    dispatcher.trigger_now(&event);
    assert!(event.is_cancelled());

    // The flag is shared across clones, not copied.
    let clone = event.clone();
    assert!(clone.is_cancelled());
}

#[test]
fn shutdown_is_idempotent_and_closes_the_queue() {
    let dispatcher = EventDispatcher::new().unwrap();
    dispatcher.shutdown();
    dispatcher.shutdown();

    assert!(matches!(
        dispatcher.propagate(Event::new(EventType::StatusMessage, EventPayload::None)),
        Err(EventError::ShutDown)
    ));

    // Synchronous delivery still works after shutdown.
    let count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&count);
    dispatcher.add_listener(EventType::StatusMessage, move |_: &Event| {
        sink.fetch_add(1, Ordering::SeqCst);
    });
    dispatcher.trigger_now(&Event::new(EventType::StatusMessage, EventPayload::None));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn handlers_may_register_listeners_during_delivery() {
    let dispatcher = Arc::new(EventDispatcher::new().unwrap());
    let count = Arc::new(AtomicUsize::new(0));

    let inner_dispatcher = Arc::clone(&dispatcher);
    let inner_count = Arc::clone(&count);
    dispatcher.add_listener(EventType::StatusMessage, move |_: &Event| {
        let sink = Arc::clone(&inner_count);
        inner_dispatcher.add_listener(EventType::FeatureImported, move |_: &Event| {
            sink.fetch_add(1, Ordering::SeqCst);
        });
    });

    dispatcher.trigger_now(&Event::new(EventType::StatusMessage, EventPayload::None));
    dispatcher.trigger_now(&Event::new(EventType::FeatureImported, EventPayload::None));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
