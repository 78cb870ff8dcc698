#![forbid(unsafe_code)]

//! Single-threaded subscriber registry with RAII unsubscription.
//!
//! [`Signal<E>`] holds a list of callbacks and dispatches a payload to all
//! of them synchronously, in subscription order. [`Subscription`] is the
//! RAII guard returned by [`Signal::connect`]; dropping it removes the
//! callback deterministically.
//!
//! # Invariants
//!
//! 1. Callbacks run in subscription order.
//! 2. Dropping a [`Subscription`] removes its callback before the next
//!    dispatch cycle. A callback dropped *during* a dispatch may still run
//!    within that same cycle (dispatch snapshots the list first).
//! 3. Callbacks may connect or drop subscribers on this same signal while
//!    a dispatch is in flight; new subscribers are not called until the
//!    next cycle.
//! 4. A `Signal` never drops a live subscriber on its own; capacity is
//!    unbounded.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Callback<E> = Rc<dyn Fn(&E)>;

struct SignalInner<E: 'static> {
    listeners: Vec<(u64, Callback<E>)>,
    next_id: u64,
}

/// A synchronous, single-threaded broadcast point for payloads of type `E`.
///
/// Cloning the signal is not supported; share it behind an `Rc` instead,
/// which is how the event bus and change hub hold it.
pub struct Signal<E: 'static> {
    inner: Rc<RefCell<SignalInner<E>>>,
}

impl<E: 'static> Default for Signal<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> std::fmt::Debug for Signal<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.len())
            .finish()
    }
}

impl<E: 'static> Signal<E> {
    /// Create an empty signal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SignalInner {
                listeners: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Register a callback; it stays connected for the lifetime of the
    /// returned [`Subscription`].
    #[must_use]
    pub fn connect(&self, callback: impl Fn(&E) + 'static) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, Rc::new(callback)));
            id
        };

        let weak: Weak<RefCell<SignalInner<E>>> = Rc::downgrade(&self.inner);
        Subscription {
            disconnect: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().listeners.retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    /// Dispatch `payload` to every connected callback, in subscription
    /// order. The listener list is snapshotted first so callbacks may
    /// connect or disconnect subscribers without deadlocking the borrow.
    pub fn emit(&self, payload: &E) {
        let snapshot: Vec<Callback<E>> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for cb in snapshot {
            cb(payload);
        }
    }

    /// Number of currently connected callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Whether no callbacks are connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// RAII guard for a [`Signal`] connection.
///
/// Dropping the guard disconnects the callback immediately. If the signal
/// itself was dropped first, dropping the guard is a no-op.
pub struct Subscription {
    disconnect: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Disconnect now instead of waiting for drop.
    pub fn disconnect(mut self) {
        if let Some(f) = self.disconnect.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.disconnect.take() {
            f();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("connected", &self.disconnect.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn emit_reaches_all_listeners_in_order() {
        let signal: Signal<u32> = Signal::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let o1 = Rc::clone(&order);
        let _s1 = signal.connect(move |v| o1.borrow_mut().push(("first", *v)));
        let o2 = Rc::clone(&order);
        let _s2 = signal.connect(move |v| o2.borrow_mut().push(("second", *v)));

        signal.emit(&7);
        assert_eq!(&*order.borrow(), &[("first", 7), ("second", 7)]);
    }

    #[test]
    fn drop_disconnects() {
        let signal: Signal<()> = Signal::new();
        let hits = Rc::new(Cell::new(0));

        let h = Rc::clone(&hits);
        let sub = signal.connect(move |()| h.set(h.get() + 1));
        signal.emit(&());
        assert_eq!(hits.get(), 1);

        drop(sub);
        signal.emit(&());
        assert_eq!(hits.get(), 1, "callback must not fire after drop");
    }

    #[test]
    fn explicit_disconnect() {
        let signal: Signal<()> = Signal::new();
        let hits = Rc::new(Cell::new(0));

        let h = Rc::clone(&hits);
        let sub = signal.connect(move |()| h.set(h.get() + 1));
        sub.disconnect();

        signal.emit(&());
        assert_eq!(hits.get(), 0);
        assert!(signal.is_empty());
    }

    #[test]
    fn listener_may_disconnect_sibling_mid_dispatch() {
        let signal: Rc<Signal<()>> = Rc::new(Signal::new());
        let hits = Rc::new(Cell::new(0));

        let h = Rc::clone(&hits);
        let second = Rc::new(RefCell::new(Some(
            signal.connect(move |()| h.set(h.get() + 1)),
        )));

        // Connected after the counter, so it runs second in each cycle and
        // drops the counter's subscription mid-dispatch.
        let second_slot = Rc::clone(&second);
        let _dropper = signal.connect(move |()| {
            second_slot.borrow_mut().take();
        });

        // First cycle still runs the snapshot taken before the drop.
        signal.emit(&());
        assert_eq!(hits.get(), 1);

        // Next cycle: the second listener is gone.
        signal.emit(&());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn listener_may_connect_mid_dispatch() {
        let signal: Rc<Signal<()>> = Rc::new(Signal::new());
        let late_hits = Rc::new(Cell::new(0));
        let held = Rc::new(RefCell::new(Vec::new()));

        let sig = Rc::clone(&signal);
        let lh = Rc::clone(&late_hits);
        let slot = Rc::clone(&held);
        let _sub = signal.connect(move |()| {
            if slot.borrow().is_empty() {
                let lh = Rc::clone(&lh);
                slot.borrow_mut()
                    .push(sig.connect(move |()| lh.set(lh.get() + 1)));
            }
        });

        signal.emit(&());
        assert_eq!(late_hits.get(), 0, "new listener must wait for next cycle");

        signal.emit(&());
        assert_eq!(late_hits.get(), 1);
    }

    #[test]
    fn subscription_outliving_signal_is_harmless() {
        let signal: Signal<()> = Signal::new();
        let sub = signal.connect(|()| {});
        drop(signal);
        drop(sub); // must not panic
    }
}
