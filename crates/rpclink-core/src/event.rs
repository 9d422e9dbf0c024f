//! Minimal publish/subscribe primitive.
//!
//! Listeners are shared closures; identity is the `Arc` allocation, so the
//! handle returned by [`Event::listen`] is what you pass to [`Event::remove`].
//! A panicking listener is logged and skipped, never propagated.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

/// Shared listener handle.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct Event<T> {
    listeners: RwLock<Vec<Listener<T>>>,
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("listeners", &self.len())
            .finish()
    }
}

fn same<T>(a: &Listener<T>, b: &Listener<T>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

impl<T> Event<T> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a listener. Adding the same handle twice replaces it in place.
    pub fn add(&self, listener: Listener<T>) {
        let mut list = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        match list.iter_mut().find(|l| same(l, &listener)) {
            Some(slot) => *slot = listener,
            None => list.push(listener),
        }
    }

    /// Wrap `f` into a listener, register it, and return the handle.
    pub fn listen<F>(&self, f: F) -> Listener<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let listener: Listener<T> = Arc::new(f);
        self.add(Arc::clone(&listener));
        listener
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn remove(&self, listener: &Listener<T>) -> bool {
        let mut list = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = list.len();
        list.retain(|l| !same(l, listener));
        list.len() != before
    }

    pub fn remove_all(&self) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every listener with `value`.
    ///
    /// Works on a snapshot, so listeners may add/remove listeners (including
    /// themselves) while being called.
    pub fn trigger(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(value))).is_err() {
                tracing::error!("event listener panicked; continuing with the next one");
            }
        }
    }
}
