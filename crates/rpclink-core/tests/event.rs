//! Event dispatcher tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rpclink_core::event::{Event, Listener};

#[test]
fn trigger_reaches_every_listener_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let event = Event::<u32>::new();

    let s1 = Arc::clone(&seen);
    event.listen(move |v| s1.lock().unwrap().push(("a", *v)));
    let s2 = Arc::clone(&seen);
    event.listen(move |v| s2.lock().unwrap().push(("b", *v)));

    event.trigger(&7);
    assert_eq!(*seen.lock().unwrap(), vec![("a", 7), ("b", 7)]);
}

#[test]
fn adding_same_listener_twice_does_not_duplicate() {
    let hits = Arc::new(AtomicUsize::new(0));
    let event = Event::<()>::new();

    let h = Arc::clone(&hits);
    let listener: Listener<()> = Arc::new(move |_| {
        h.fetch_add(1, Ordering::SeqCst);
    });
    event.add(Arc::clone(&listener));
    event.add(Arc::clone(&listener));
    assert_eq!(event.len(), 1);

    event.trigger(&());
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    assert!(event.remove(&listener));
    assert!(!event.remove(&listener));
    assert!(event.is_empty());
}

#[test]
fn panicking_listener_does_not_stop_the_others() {
    let hits = Arc::new(AtomicUsize::new(0));
    let event = Event::<&'static str>::new();

    event.listen(|_| panic!("faulty subscriber"));
    let h = Arc::clone(&hits);
    event.listen(move |_| {
        h.fetch_add(1, Ordering::SeqCst);
    });

    event.trigger(&"first");
    event.trigger(&"second");
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn listener_can_remove_itself_while_triggered() {
    let event = Arc::new(Event::<u8>::new());
    let hits = Arc::new(AtomicUsize::new(0));
    let slot: Arc<Mutex<Option<Listener<u8>>>> = Arc::new(Mutex::new(None));

    let (e, h, s) = (Arc::clone(&event), Arc::clone(&hits), Arc::clone(&slot));
    let handle = event.listen(move |_| {
        h.fetch_add(1, Ordering::SeqCst);
        if let Some(me) = s.lock().unwrap().take() {
            e.remove(&me);
        }
    });
    *slot.lock().unwrap() = Some(handle);

    event.trigger(&1);
    event.trigger(&2);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(event.is_empty());
}

#[test]
fn remove_all_clears() {
    let event = Event::<i32>::new();
    event.listen(|_| {});
    event.listen(|_| {});
    assert_eq!(event.len(), 2);
    event.remove_all();
    assert!(event.is_empty());
    event.trigger(&0);
}
