#![forbid(unsafe_code)]

//! Cross-context storage change events.
//!
//! When a storage area shared between execution contexts is mutated, every
//! *other* context observes a [`StorageEvent`] on its [`StorageEventBus`].
//! The mutating context never receives the event for its own write, so
//! listeners need no originator filtering; that rule is enforced by
//! whoever dispatches (the [`Origin`](crate::Origin) harness here, the
//! platform in a real embedding).
//!
//! A bus is deliberately dumb: it does not know which areas exist and does
//! no key filtering. Listeners match on [`StorageEvent::area`] and
//! [`StorageEvent::key`] themselves.

use crate::AreaId;
use crate::signal::{Signal, Subscription};

/// A change observed on a storage area from another execution context.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StorageEvent {
    /// Identity of the mutated area's backing store.
    pub area: AreaId,
    /// The storage key that changed (already fully scoped).
    pub key: String,
    /// The new stored string, or `None` when the entry was removed.
    ///
    /// Carried for parity with the platform signal; refresh paths re-read
    /// the area rather than trusting a possibly stale payload.
    pub new_value: Option<String>,
}

/// Per-context receiver for [`StorageEvent`]s.
pub struct StorageEventBus {
    signal: Signal<StorageEvent>,
}

impl StorageEventBus {
    /// Create a bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Register a listener for every event dispatched into this context.
    #[must_use]
    pub fn subscribe(&self, listener: impl Fn(&StorageEvent) + 'static) -> Subscription {
        self.signal.connect(listener)
    }

    /// Deliver `event` to all listeners, synchronously and in
    /// subscription order.
    pub fn dispatch(&self, event: &StorageEvent) {
        tracing::trace!(
            area = %event.area,
            key = %event.key,
            removed = event.new_value.is_none(),
            listeners = self.signal.len(),
            "dispatching storage event"
        );
        self.signal.emit(event);
    }

    /// Number of connected listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.signal.len()
    }
}

impl Default for StorageEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StorageEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sample(area: AreaId) -> StorageEvent {
        StorageEvent {
            area,
            key: "settings.theme".to_owned(),
            new_value: Some("\"dark\"".to_owned()),
        }
    }

    #[test]
    fn dispatch_reaches_listeners() {
        let bus = StorageEventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let s = Rc::clone(&seen);
        let _sub = bus.subscribe(move |e| s.borrow_mut().push(e.clone()));

        let event = sample(AreaId::next());
        bus.dispatch(&event);
        assert_eq!(&*seen.borrow(), &[event]);
    }

    #[test]
    fn dropped_listener_is_not_called() {
        let bus = StorageEventBus::new();
        let seen = Rc::new(RefCell::new(0usize));

        let s = Rc::clone(&seen);
        let sub = bus.subscribe(move |_| *s.borrow_mut() += 1);
        bus.dispatch(&sample(AreaId::next()));
        drop(sub);
        bus.dispatch(&sample(AreaId::next()));

        assert_eq!(*seen.borrow(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn removal_events_carry_no_value() {
        let event = StorageEvent {
            area: AreaId::next(),
            key: "k".to_owned(),
            new_value: None,
        };
        assert!(event.new_value.is_none());
    }
}
