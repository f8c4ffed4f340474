//! `ReactiveConfig<T>` — a single-value replay channel ("behavior subject"
//! semantics): new subscribers immediately receive the current value,
//! `next()` delivers to every subscriber in registration order, and
//! `select()` derives a channel that only re-emits when its projection
//! changes (SPEC_FULL.md §4.9).
//!
//! Hand-rolled rather than `tokio::sync::watch`: `watch` has no equivalent
//! to `select(projector)` producing a *derived* channel, and collapses
//! intermediate values, which would silently drop the aggregate-error
//! reporting this type needs on `next()`.

use std::sync::{Arc, Mutex};

type Subscriber<T> = Box<dyn FnMut(&T) -> Result<(), String> + Send + 'static>;

struct Inner<T> {
    current: T,
    subscribers: Vec<(u64, Subscriber<T>)>,
    next_id: u64,
    completed: bool,
    /// Keeps a `select()`-derived channel's upstream subscription alive for
    /// exactly as long as the derived channel itself.
    upstream: Option<Box<dyn std::any::Any + Send>>,
}

/// A handle returned by [`ReactiveConfig::subscribe`]. Dropping it (or
/// calling [`Unsubscribe::unsubscribe`] explicitly) removes the
/// subscriber.
pub struct Unsubscribe<T> {
    inner: Arc<Mutex<Inner<T>>>,
    id: u64,
}

impl<T> Unsubscribe<T> {
    pub fn unsubscribe(self) {
        // Drop runs the removal; this method exists only for call-site
        // clarity over a bare `drop(handle)`.
    }
}

impl<T> Drop for Unsubscribe<T> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.subscribers.retain(|(id, _)| *id != self.id);
        }
    }
}

#[derive(Clone)]
pub struct ReactiveConfig<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T: Clone + Send + 'static> ReactiveConfig<T> {
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self { inner: Arc::new(Mutex::new(Inner { current: initial, subscribers: Vec::new(), next_id: 0, completed: false, upstream: None })) }
    }

    #[must_use]
    pub fn value(&self) -> T {
        self.inner.lock().expect("ReactiveConfig mutex poisoned").current.clone()
    }

    /// Deliver `value` to every subscriber in registration order,
    /// collecting errors and raising them as a single aggregate.
    pub fn next(&self, value: T) -> Result<(), String> {
        let mut inner = self.inner.lock().expect("ReactiveConfig mutex poisoned");
        if inner.completed {
            return Err("ReactiveConfig: next() called after complete()".to_string());
        }
        inner.current = value;
        let current = inner.current.clone();
        let mut errors = Vec::new();
        for (_, subscriber) in &mut inner.subscribers {
            if let Err(message) = subscriber(&current) {
                errors.push(message);
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors.join("; ")) }
    }

    /// Register a subscriber; it is invoked immediately with the current
    /// value (replay semantics), then on every subsequent `next()`.
    pub fn subscribe(&self, mut on_next: impl FnMut(&T) -> Result<(), String> + Send + 'static) -> Unsubscribe<T> {
        let mut inner = self.inner.lock().expect("ReactiveConfig mutex poisoned");
        let id = inner.next_id;
        inner.next_id += 1;
        let _ = on_next(&inner.current);
        inner.subscribers.push((id, Box::new(on_next)));
        Unsubscribe { inner: Arc::clone(&self.inner), id }
    }

    pub fn complete(&self) {
        self.inner.lock().expect("ReactiveConfig mutex poisoned").completed = true;
    }
}

impl<T: Clone + Send + 'static> ReactiveConfig<T> {
    /// Derive a channel of `U` that re-emits only when the projected value
    /// changes under `PartialEq`. Only `U` needs `PartialEq` — the source
    /// channel's own value is never compared, only projected through.
    pub fn select<U: Clone + Send + PartialEq + 'static>(&self, mut projector: impl FnMut(&T) -> U + Send + 'static) -> ReactiveConfig<U> {
        let initial = projector(&self.value());
        let derived = ReactiveConfig::new(initial);
        let derived_for_closure = derived.clone();
        let last = Arc::new(Mutex::new(derived.value()));
        let upstream = self.subscribe(move |value| {
            let projected = projector(value);
            let mut last_guard = last.lock().expect("ReactiveConfig mutex poisoned");
            if *last_guard != projected {
                *last_guard = projected.clone();
                derived_for_closure.next(projected)
            } else {
                Ok(())
            }
        });
        derived.inner.lock().expect("ReactiveConfig mutex poisoned").upstream = Some(Box::new(upstream));
        derived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn subscribe_replays_current_value_immediately() {
        let config = ReactiveConfig::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let _sub = config.subscribe(move |v| {
            seen_clone.lock().unwrap().push(*v);
            Ok(())
        });
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn next_delivers_to_all_subscribers_in_order() {
        let config = ReactiveConfig::new(0);
        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = Arc::clone(&order);
        let _a = config.subscribe(move |v| {
            o1.lock().unwrap().push(("a", *v));
            Ok(())
        });
        let o2 = Arc::clone(&order);
        let _b = config.subscribe(move |v| {
            o2.lock().unwrap().push(("b", *v));
            Ok(())
        });
        config.next(5).unwrap();
        let log = order.lock().unwrap().clone();
        assert_eq!(log, vec![("a", 0), ("b", 0), ("a", 5), ("b", 5)]);
    }

    #[test]
    fn unsubscribe_on_drop_stops_further_delivery() {
        let config = ReactiveConfig::new(0);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        let sub = config.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        drop(sub);
        config.next(1).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn next_after_complete_is_rejected() {
        let config = ReactiveConfig::new(0);
        config.complete();
        assert!(config.next(1).is_err());
    }

    #[test]
    fn select_only_reemits_on_projection_change() {
        let config = ReactiveConfig::new((1, "a".to_string()));
        let derived = config.select(|(n, _)| *n);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let _sub = derived.subscribe(move |v| {
            seen_clone.lock().unwrap().push(*v);
            Ok(())
        });
        config.next((1, "b".to_string())).unwrap();
        config.next((2, "c".to_string())).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}
